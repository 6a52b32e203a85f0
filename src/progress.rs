//! Scan progress reporting.
//!
//! `esu scan` writes records to stdout as NDJSON, so progress goes to
//! **stderr**: human lines when stderr is a terminal, one JSON object per
//! line otherwise (or nothing, with `--progress off`).

use std::io::Write;
use std::str::FromStr;

use elasticutils_core::ScanState;

/// A single progress event for a scan.
#[derive(Clone, Debug, PartialEq)]
pub enum ScanProgressEvent {
    /// A snapshot was opened on `index`.
    Opened { index: String },
    /// `emitted` records so far, out of at most `max_records`.
    Streaming { emitted: u64, max_records: u64 },
    /// The scan stopped.
    Finished { emitted: u64, pages: u64, state: ScanState },
}

/// Reports scan progress. Implementations write to stderr (human or JSON).
pub trait ScanProgressReporter {
    fn report(&self, event: &ScanProgressEvent);
}

pub fn state_name(state: ScanState) -> &'static str {
    match state {
        ScanState::Fetching => "fetching",
        ScanState::HasMore => "has_more",
        ScanState::Exhausted => "exhausted",
        ScanState::LimitReached => "limit_reached",
        ScanState::Failed => "failed",
    }
}

/// Human-friendly progress: "scan logs  streaming  1,234 / 100,000 records".
pub struct StderrProgress {
    index: String,
}

impl StderrProgress {
    pub fn new(index: &str) -> Self {
        Self {
            index: index.to_string(),
        }
    }

    fn line(&self, event: &ScanProgressEvent) -> String {
        match event {
            ScanProgressEvent::Opened { index } => {
                format!("scan {}  snapshot opened\n", index)
            }
            ScanProgressEvent::Streaming {
                emitted,
                max_records,
            } => format!(
                "scan {}  streaming  {} / {} records\n",
                self.index,
                format_number(*emitted),
                format_number(*max_records)
            ),
            ScanProgressEvent::Finished {
                emitted,
                pages,
                state,
            } => format!(
                "scan {}  {}  {} records in {} pages\n",
                self.index,
                state_name(*state),
                format_number(*emitted),
                format_number(*pages)
            ),
        }
    }
}

impl ScanProgressReporter for StderrProgress {
    fn report(&self, event: &ScanProgressEvent) {
        let mut err = std::io::stderr().lock();
        let _ = err.write_all(self.line(event).as_bytes());
        let _ = err.flush();
    }
}

/// Machine-readable progress: one JSON object per line on stderr.
pub struct JsonProgress {
    index: String,
}

impl JsonProgress {
    pub fn new(index: &str) -> Self {
        Self {
            index: index.to_string(),
        }
    }

    fn object(&self, event: &ScanProgressEvent) -> serde_json::Value {
        match event {
            ScanProgressEvent::Opened { index } => serde_json::json!({
                "event": "progress",
                "index": index,
                "phase": "opened"
            }),
            ScanProgressEvent::Streaming {
                emitted,
                max_records,
            } => serde_json::json!({
                "event": "progress",
                "index": self.index,
                "phase": "streaming",
                "n": emitted,
                "max": max_records
            }),
            ScanProgressEvent::Finished {
                emitted,
                pages,
                state,
            } => serde_json::json!({
                "event": "progress",
                "index": self.index,
                "phase": "finished",
                "n": emitted,
                "pages": pages,
                "state": state_name(*state)
            }),
        }
    }
}

impl ScanProgressReporter for JsonProgress {
    fn report(&self, event: &ScanProgressEvent) {
        if let Ok(line) = serde_json::to_string(&self.object(event)) {
            let mut err = std::io::stderr().lock();
            let _ = writeln!(err, "{}", line);
            let _ = err.flush();
        }
    }
}

pub struct NoProgress;

impl ScanProgressReporter for NoProgress {
    fn report(&self, _event: &ScanProgressEvent) {}
}

fn format_number(n: u64) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

/// Progress mode for `esu scan`.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ProgressMode {
    Off,
    Human,
    Json,
}

impl ProgressMode {
    /// Human lines on a terminal, JSON lines when stderr is piped.
    pub fn default_for_tty() -> Self {
        if atty::is(atty::Stream::Stderr) {
            ProgressMode::Human
        } else {
            ProgressMode::Json
        }
    }

    pub fn reporter(&self, index: &str) -> Box<dyn ScanProgressReporter> {
        match self {
            ProgressMode::Off => Box::new(NoProgress),
            ProgressMode::Human => Box::new(StderrProgress::new(index)),
            ProgressMode::Json => Box::new(JsonProgress::new(index)),
        }
    }
}

impl FromStr for ProgressMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "off" => Ok(ProgressMode::Off),
            "human" => Ok(ProgressMode::Human),
            "json" => Ok(ProgressMode::Json),
            "auto" => Ok(ProgressMode::default_for_tty()),
            other => Err(format!(
                "unknown progress mode '{}': expected auto, human, json, or off",
                other
            )),
        }
    }
}
