//! Point-in-time snapshots and cursor-stable paginated scanning.
//!
//! # Protocol
//!
//! 1. [`PaginatedScanner::open`] asks the engine for a point-in-time (PIT)
//!    snapshot and returns its id as a [`PointInTime`].
//! 2. [`PaginatedScanner::scan`] returns a lazy [`Scan`] iterator. Each page
//!    request carries the PIT id and keep-alive (extending the snapshot), the
//!    caller's predicate, a total sort order, and the `search_after` cursor of
//!    the last emitted record.
//! 3. An empty page ends the scan ([`ScanState::Exhausted`]). A short but
//!    non-empty page does not. The scan also stops after exactly
//!    `max_records` records ([`ScanState::LimitReached`]), sizing its final
//!    request so it never asks for more than it will emit.
//! 4. [`PaginatedScanner::close`] releases snapshots. Failures there are
//!    reported in the [`CloseReport`], not raised.
//!
//! Holding a [`PointInTime`] is the open-snapshot state; every [`Scan`]
//! drawn from it owns its own cursor, so concurrent scans over one snapshot
//! are independent.
//!
//! ```
//! use elasticutils_core::query::QueryBuilder;
//! use elasticutils_core::scan::{PaginatedScanner, ScanOptions};
//! use elasticutils_core::transport::memory::InMemoryEngine;
//! use serde_json::json;
//!
//! let engine = InMemoryEngine::new("http://es:9200");
//! for ts in 0..25 {
//!     engine.insert("events", json!({ "timestamp": ts }));
//! }
//!
//! let scanner = PaginatedScanner::new(&engine, "http://es:9200");
//! let pit = scanner.open("events", "1m")?;
//! let (records, cursor) = scanner.collect(
//!     &pit,
//!     &QueryBuilder::new().build(),
//!     ScanOptions::new().batch_size(10).max_records(100),
//! )?;
//! assert_eq!(records.len(), 25);
//! assert!(cursor.is_some());
//! scanner.close_pit(&pit)?;
//! # Ok::<(), elasticutils_core::Error>(())
//! ```

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::query::{Query, SortField, SortOrder};
use crate::transport::{Method, Transport};
use crate::urls::{pit_close_url, pit_search_url, resolve, ElasticUrls};

pub const DEFAULT_KEEP_ALIVE: &str = "1m";
pub const DEFAULT_BATCH_SIZE: u64 = 10_000;
pub const DEFAULT_MAX_RECORDS: u64 = 100_000;
pub const DEFAULT_SORT_FIELD: &str = "timestamp";

/// Sort-key tuple of the last emitted document; resume point for `search_after`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Cursor(Vec<Value>);

impl Cursor {
    pub fn new(values: Vec<Value>) -> Self {
        Self(values)
    }

    pub fn values(&self) -> &[Value] {
        &self.0
    }

    pub fn to_value(&self) -> Value {
        Value::Array(self.0.clone())
    }
}

impl From<Vec<Value>> for Cursor {
    fn from(values: Vec<Value>) -> Self {
        Self(values)
    }
}

/// Handle to an open point-in-time snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PointInTime {
    pub id: String,
    pub keep_alive: String,
}

/// Knobs for one [`Scan`].
#[derive(Debug, Clone, PartialEq)]
pub struct ScanOptions {
    /// Upper bound on hits per page request.
    pub batch_size: u64,
    /// Total records to emit before stopping.
    pub max_records: u64,
    /// `_source` projection; empty means full documents.
    pub fields: Vec<String>,
    /// Resume after this sort key.
    pub initial_cursor: Option<Cursor>,
    /// Must be a total, stable order over the snapshot.
    pub sort: Vec<SortField>,
    /// Keep-alive sent with every page request.
    pub keep_alive: String,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            max_records: DEFAULT_MAX_RECORDS,
            fields: Vec::new(),
            initial_cursor: None,
            sort: vec![SortField::new(DEFAULT_SORT_FIELD, SortOrder::Desc)],
            keep_alive: DEFAULT_KEEP_ALIVE.to_string(),
        }
    }
}

impl ScanOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn batch_size(mut self, batch_size: u64) -> Self {
        self.batch_size = batch_size;
        self
    }

    pub fn max_records(mut self, max_records: u64) -> Self {
        self.max_records = max_records;
        self
    }

    pub fn fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.fields = fields.into_iter().map(Into::into).collect();
        self
    }

    pub fn initial_cursor(mut self, cursor: Option<Cursor>) -> Self {
        self.initial_cursor = cursor;
        self
    }

    pub fn sort(mut self, sort: Vec<SortField>) -> Self {
        self.sort = sort;
        self
    }

    pub fn keep_alive(mut self, keep_alive: impl Into<String>) -> Self {
        self.keep_alive = keep_alive.into();
        self
    }

    fn validate(&self) -> Result<()> {
        if self.batch_size == 0 {
            return Err(Error::invalid("batch_size", "0", "a value >= 1"));
        }
        if self.sort.is_empty() {
            return Err(Error::invalid("sort", "[]", "at least one sort field"));
        }
        Ok(())
    }
}

/// One emitted record and its own sort key.
#[derive(Debug, Clone, PartialEq)]
pub struct Hit {
    pub source: Value,
    pub cursor: Cursor,
}

/// Lifecycle of a [`Scan`].
///
/// The states before the first page are not variants: a built
/// [`PaginatedScanner`] is the created state, and holding the
/// [`PointInTime`] returned by [`PaginatedScanner::open`] is the open
/// snapshot. A [`Scan`] starts in `Fetching`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanState {
    /// The next pull issues a page request.
    Fetching,
    /// Records of the current page are buffered.
    HasMore,
    /// The engine returned an empty page.
    Exhausted,
    /// `max_records` records were emitted.
    LimitReached,
    /// A page request failed; the iterator is fused.
    Failed,
}

impl ScanState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ScanState::Exhausted | ScanState::LimitReached | ScanState::Failed
        )
    }
}

/// Outcome of releasing snapshots.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloseReport {
    pub succeeded: bool,
    pub num_freed: u64,
    /// `None` when no request was needed.
    pub status: Option<u16>,
}

/// Opens snapshots and drives cursor-based scans over them.
pub struct PaginatedScanner<T> {
    transport: T,
    base_url: String,
}

impl<T: Transport> PaginatedScanner<T> {
    pub fn new(transport: T, base_url: &str) -> Self {
        Self {
            transport,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Open a snapshot of `index`. An empty `keep_alive` means one minute.
    pub fn open(&self, index: &str, keep_alive: &str) -> Result<PointInTime> {
        let keep_alive = non_empty_or_default(keep_alive);
        let url = ElasticUrls::new(&self.base_url, index).point_in_time(keep_alive);
        self.open_url(&url, keep_alive)
    }

    /// Open a snapshot through a caller-supplied endpoint, absolute or
    /// relative to the base URL. `keep_alive` is recorded for page requests.
    pub fn open_at(&self, endpoint: &str, keep_alive: &str) -> Result<PointInTime> {
        let url = resolve(&self.base_url, endpoint);
        self.open_url(&url, non_empty_or_default(keep_alive))
    }

    fn open_url(&self, url: &str, keep_alive: &str) -> Result<PointInTime> {
        let resp = self.transport.send(Method::Post, url, None)?;
        if !resp.is_success() {
            return Err(Error::Snapshot(format!(
                "open {} returned {}: {}",
                url, resp.status, resp.body
            )));
        }
        let id = resp
            .body
            .get("id")
            .and_then(Value::as_str)
            .ok_or_else(|| Error::Snapshot(format!("open {} returned no id", url)))?;
        info!(url, keep_alive, "opened point-in-time snapshot");
        Ok(PointInTime {
            id: id.to_string(),
            keep_alive: keep_alive.to_string(),
        })
    }

    /// Start a lazy scan over `pit`, filtered by `query`'s predicate.
    ///
    /// Only the predicate of `query` is used; paging, sort, and projection
    /// come from `options`.
    pub fn scan(&self, pit: &PointInTime, query: &Query, options: ScanOptions) -> Result<Scan<'_, T>> {
        options.validate()?;
        Ok(Scan {
            scanner: self,
            pit_id: pit.id.clone(),
            predicate: query.predicate_or_match_all(),
            cursor: options.initial_cursor.clone(),
            options,
            emitted: 0,
            pages: 0,
            buffer: VecDeque::new(),
            state: ScanState::Fetching,
        })
    }

    /// Drain a scan eagerly.
    ///
    /// Returns the records in order and the cursor to resume from; the cursor
    /// is the initial one when nothing was emitted. A snapshot id rotated by
    /// the engine is not reported; use [`collect_tracking`](Self::collect_tracking)
    /// when the engine may rotate ids.
    pub fn collect(
        &self,
        pit: &PointInTime,
        query: &Query,
        options: ScanOptions,
    ) -> Result<(Vec<Value>, Option<Cursor>)> {
        let mut pit = pit.clone();
        self.collect_tracking(&mut pit, query, options)
    }

    /// [`collect`](Self::collect) that writes the latest snapshot id back
    /// into `pit`, on success and on failure, so a later close releases the
    /// live snapshot.
    pub fn collect_tracking(
        &self,
        pit: &mut PointInTime,
        query: &Query,
        options: ScanOptions,
    ) -> Result<(Vec<Value>, Option<Cursor>)> {
        let mut scan = self.scan(pit, query, options)?;
        let mut records = Vec::new();
        let mut failure = None;
        for hit in &mut scan {
            match hit {
                Ok(hit) => records.push(hit.source),
                Err(e) => {
                    failure = Some(e);
                    break;
                }
            }
        }
        pit.id = scan.pit_id().to_string();
        match failure {
            Some(e) => Err(e),
            None => Ok((records, scan.cursor().cloned())),
        }
    }

    /// Release one or more snapshots.
    ///
    /// A non-success status (such as an already expired PIT) is logged and
    /// reported with `succeeded == false`. Only transport failures are errors.
    pub fn close<I, S>(&self, ids: I) -> Result<CloseReport>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let ids: Vec<String> = ids.into_iter().map(Into::into).collect();
        if ids.is_empty() {
            return Ok(CloseReport {
                succeeded: true,
                num_freed: 0,
                status: None,
            });
        }

        let body = json!({ "pit_id": ids });
        let resp = self
            .transport
            .send(Method::Delete, &pit_close_url(&self.base_url), Some(&body))?;

        let num_freed = resp.body.get("num_freed").and_then(Value::as_u64).unwrap_or(0);
        let succeeded = resp.is_success()
            && resp
                .body
                .get("succeeded")
                .and_then(Value::as_bool)
                .unwrap_or(true);

        if succeeded {
            info!(count = ids.len(), num_freed, "closed point-in-time snapshots");
        } else {
            warn!(
                status = resp.status,
                body = %resp.body,
                "point-in-time close did not succeed"
            );
        }

        Ok(CloseReport {
            succeeded,
            num_freed,
            status: Some(resp.status),
        })
    }

    pub fn close_pit(&self, pit: &PointInTime) -> Result<CloseReport> {
        self.close([pit.id.as_str()])
    }
}

fn non_empty_or_default(keep_alive: &str) -> &str {
    if keep_alive.trim().is_empty() {
        DEFAULT_KEEP_ALIVE
    } else {
        keep_alive
    }
}

/// Lazy, single-pass sequence of records from one snapshot.
///
/// Pages are fetched only when the buffered page is drained. Dropping the
/// iterator discards any buffered remainder. After an `Err` item the
/// iterator yields `None`.
pub struct Scan<'a, T> {
    scanner: &'a PaginatedScanner<T>,
    pit_id: String,
    predicate: Value,
    options: ScanOptions,
    cursor: Option<Cursor>,
    emitted: u64,
    pages: u64,
    buffer: VecDeque<Hit>,
    state: ScanState,
}

impl<T: Transport> Scan<'_, T> {
    pub fn state(&self) -> ScanState {
        self.state
    }

    /// Sort key of the last emitted record (or the initial cursor).
    pub fn cursor(&self) -> Option<&Cursor> {
        self.cursor.as_ref()
    }

    pub fn emitted(&self) -> u64 {
        self.emitted
    }

    /// Number of page requests issued so far.
    pub fn pages(&self) -> u64 {
        self.pages
    }

    /// Current snapshot id; the engine may hand out a new one per page.
    pub fn pit_id(&self) -> &str {
        &self.pit_id
    }

    fn remaining(&self) -> u64 {
        self.options.max_records.saturating_sub(self.emitted)
    }

    fn page_request(&self) -> Value {
        let mut body = json!({
            "track_total_hits": true,
            "query": self.predicate,
            "pit": { "id": self.pit_id, "keep_alive": self.options.keep_alive },
            "size": self.options.batch_size.min(self.remaining()),
            "sort": self.options.sort,
        });
        if let Some(ref cursor) = self.cursor {
            body["search_after"] = cursor.to_value();
        }
        if !self.options.fields.is_empty() {
            body["_source"] = json!(self.options.fields);
        }
        body
    }

    fn fetch_page(&mut self) -> Result<Vec<Hit>> {
        let body = self.page_request();
        let url = pit_search_url(&self.scanner.base_url);
        debug!(
            page = self.pages,
            size = body["size"].as_u64().unwrap_or(0),
            resuming = self.cursor.is_some(),
            "fetching page"
        );

        let resp = self.scanner.transport.send(Method::Post, &url, Some(&body))?;
        self.pages += 1;
        if !resp.is_success() {
            return Err(Error::Retrieval {
                status: resp.status,
                body: resp.body,
            });
        }

        if let Some(id) = resp.body.get("pit_id").and_then(Value::as_str) {
            if id != self.pit_id {
                debug!("engine rotated point-in-time id");
                self.pit_id = id.to_string();
            }
        }

        let raw_hits = match resp.body.pointer("/hits/hits").and_then(Value::as_array) {
            Some(hits) => hits,
            None => return Ok(Vec::new()),
        };

        let limit = usize::try_from(self.remaining()).unwrap_or(usize::MAX);
        raw_hits
            .iter()
            .take(limit)
            .map(|hit| {
                let sort = hit
                    .get("sort")
                    .and_then(Value::as_array)
                    .ok_or_else(|| Error::MalformedResponse("hit without sort values".to_string()))?;
                Ok(Hit {
                    source: hit.get("_source").cloned().unwrap_or(Value::Null),
                    cursor: Cursor::new(sort.clone()),
                })
            })
            .collect()
    }
}

impl<T: Transport> Iterator for Scan<'_, T> {
    type Item = Result<Hit>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(hit) = self.buffer.pop_front() {
                self.emitted += 1;
                self.cursor = Some(hit.cursor.clone());
                if self.emitted >= self.options.max_records {
                    self.buffer.clear();
                    self.state = ScanState::LimitReached;
                } else if self.buffer.is_empty() {
                    self.state = ScanState::Fetching;
                }
                return Some(Ok(hit));
            }

            if self.state.is_terminal() {
                return None;
            }
            if self.remaining() == 0 {
                self.state = ScanState::LimitReached;
                return None;
            }

            match self.fetch_page() {
                Ok(hits) if hits.is_empty() => {
                    self.state = ScanState::Exhausted;
                    return None;
                }
                Ok(hits) => {
                    self.buffer.extend(hits);
                    self.state = ScanState::HasMore;
                }
                Err(e) => {
                    self.state = ScanState::Failed;
                    return Some(Err(e));
                }
            }
        }
    }
}
