//! `esu scan`: stream every matching document through a point-in-time
//! snapshot.
//!
//! Records go to stdout as NDJSON. Progress and the final cursor go to
//! stderr; feed the cursor back with `--after` to resume. A snapshot opened
//! by the command is closed before it exits, on success or failure, unless
//! `--keep-pit` is given.

use std::io::Write;

use anyhow::{Context, Result};
use elasticutils_core::query::Query;
use elasticutils_core::scan::{Cursor, PointInTime, ScanOptions, ScanState};
use elasticutils_core::transport::Transport;
use tracing::warn;

use crate::client::ElasticsearchClient;
use crate::config::Config;
use crate::progress::{ProgressMode, ScanProgressEvent, ScanProgressReporter};
use crate::query_args::QueryArgs;

/// Scan settings beyond the query flags; each overrides `[scan]` in the config.
#[derive(clap::Args, Debug, Clone)]
pub struct ScanArgs {
    #[command(flatten)]
    pub query: QueryArgs,

    /// Hits per page request.
    #[arg(long)]
    pub batch_size: Option<u64>,

    /// Stop after this many records.
    #[arg(long)]
    pub max_records: Option<u64>,

    /// Snapshot keep-alive, e.g. `5m`.
    #[arg(long)]
    pub keep_alive: Option<String>,

    /// Resume after this cursor (a JSON array printed by a previous scan).
    #[arg(long, value_name = "JSON")]
    pub after: Option<String>,

    /// Scan an already open snapshot instead of opening one.
    #[arg(long, value_name = "PIT_ID")]
    pub pit: Option<String>,

    /// Leave the snapshot open when done.
    #[arg(long)]
    pub keep_pit: bool,

    /// Progress on stderr: `auto`, `human`, `json`, or `off`.
    #[arg(long, default_value = "auto")]
    pub progress: ProgressMode,
}

/// What a finished scan leaves behind.
#[derive(Debug, Clone, PartialEq)]
pub struct ScanSummary {
    pub emitted: u64,
    pub pages: u64,
    pub state: ScanState,
    pub cursor: Option<Cursor>,
    /// Latest snapshot id, possibly rotated by the engine.
    pub pit_id: String,
    /// Whether the snapshot is still open.
    pub pit_open: bool,
}

/// Fully resolved scan request.
#[derive(Debug, Clone)]
pub struct ScanPlan {
    pub index: String,
    pub query: Query,
    pub options: ScanOptions,
    pub existing_pit: Option<String>,
    pub keep_pit: bool,
}

impl ScanArgs {
    /// Merge flags over the `[scan]` defaults from `cfg`.
    pub fn plan(&self, cfg: &Config, index: &str) -> Result<ScanPlan> {
        let query = self.query.build(&cfg.scan.date_field)?;

        let mut options = cfg.scan.options();
        if let Some(n) = self.batch_size {
            options = options.batch_size(n);
        }
        if let Some(n) = self.max_records {
            options = options.max_records(n);
        }
        if let Some(ref ka) = self.keep_alive {
            options = options.keep_alive(ka.clone());
        }
        if !query.sort.is_empty() {
            options = options.sort(query.sort.clone());
        }
        if let Some(ref fields) = query.source {
            options = options.fields(fields.iter().cloned());
        }
        if let Some(ref raw) = self.after {
            let cursor: Cursor = serde_json::from_str(raw)
                .with_context(|| format!("--after must be a JSON array, got '{}'", raw))?;
            options = options.initial_cursor(Some(cursor));
        }
        if !query.aggs.is_empty() || query.size.is_some() || query.from.is_some() {
            warn!("--agg, --size and --from are ignored by scan");
        }

        Ok(ScanPlan {
            index: index.to_string(),
            query,
            options,
            existing_pit: self.pit.clone(),
            keep_pit: self.keep_pit,
        })
    }
}

/// Execute `plan`, writing one JSON record per line to `out`.
///
/// The snapshot is released before returning when this call opened it and
/// `keep_pit` is off, even if the scan failed part-way.
pub fn stream<T: Transport, W: Write>(
    client: &ElasticsearchClient<T>,
    plan: &ScanPlan,
    out: &mut W,
    reporter: &dyn ScanProgressReporter,
) -> Result<ScanSummary> {
    let scanner = client.scanner();
    let opened_here = plan.existing_pit.is_none();
    let pit = match plan.existing_pit {
        Some(ref id) => PointInTime {
            id: id.clone(),
            keep_alive: plan.options.keep_alive.clone(),
        },
        None => {
            let pit = scanner.open(&plan.index, &plan.options.keep_alive)?;
            reporter.report(&ScanProgressEvent::Opened {
                index: plan.index.clone(),
            });
            pit
        }
    };

    let max_records = plan.options.max_records;
    let mut scan = match scanner.scan(&pit, &plan.query, plan.options.clone()) {
        Ok(scan) => scan,
        Err(e) => {
            if opened_here {
                if let Err(close_err) = scanner.close_pit(&pit) {
                    warn!(error = %close_err, "could not release snapshot");
                }
            }
            return Err(e.into());
        }
    };
    let mut failure: Option<anyhow::Error> = None;
    let mut last_page = 0;
    let mut written = 0u64;

    while let Some(item) = scan.next() {
        let result = item
            .map_err(anyhow::Error::from)
            .and_then(|hit| {
                serde_json::to_writer(&mut *out, &hit.source)?;
                out.write_all(b"\n")?;
                Ok(())
            });
        if let Err(e) = result {
            failure = Some(e);
            break;
        }
        written += 1;
        if scan.pages() != last_page {
            last_page = scan.pages();
            reporter.report(&ScanProgressEvent::Streaming {
                emitted: scan.emitted(),
                max_records,
            });
        }
    }
    if let Err(e) = out.flush() {
        failure.get_or_insert_with(|| e.into());
    }

    let mut summary = ScanSummary {
        emitted: scan.emitted(),
        pages: scan.pages(),
        state: scan.state(),
        cursor: scan.cursor().cloned(),
        pit_id: scan.pit_id().to_string(),
        pit_open: true,
    };
    drop(scan);
    reporter.report(&ScanProgressEvent::Finished {
        emitted: summary.emitted,
        pages: summary.pages,
        state: summary.state,
    });

    if opened_here && !plan.keep_pit {
        match scanner.close([summary.pit_id.as_str()]) {
            Ok(report) => summary.pit_open = !report.succeeded,
            Err(e) => warn!(error = %e, "could not release snapshot"),
        }
    }

    match failure {
        Some(e) => Err(e.context(format!(
            "scan of '{}' stopped after {} records",
            plan.index, written
        ))),
        None => Ok(summary),
    }
}

pub fn run_scan(cfg: &Config, index: &str, args: &ScanArgs) -> Result<()> {
    let plan = args.plan(cfg, index)?;
    let client = ElasticsearchClient::from_config(&cfg.cluster)?;
    let reporter = args.progress.reporter(index);

    let stdout = std::io::stdout();
    let mut out = std::io::BufWriter::new(stdout.lock());
    let summary = stream(&client, &plan, &mut out, reporter.as_ref())?;

    if let Some(ref cursor) = summary.cursor {
        eprintln!("cursor: {}", serde_json::to_string(cursor)?);
    }
    if summary.pit_open {
        eprintln!("pit: {}", summary.pit_id);
    }
    Ok(())
}
