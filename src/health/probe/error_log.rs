//! Recent FATAL/ERROR entries in the instance's error log
//!
//! The only fail-open probe: a missing or unreadable log is not evidence of
//! a problem, so it reports OK.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Local, NaiveDateTime, TimeZone};
use tracing::debug;

use crate::config::{ErrorLogConfig, Instance};
use crate::health::report::{ProbeKind, ProbeVerdict};
use crate::inspect::LogReader;

use super::{FailurePolicy, Probe};

/// Timestamp layouts found at the start of log lines
///
/// The Lua scripts log `os.date()` output, the chassis logs ISO-like stamps.
const TIMESTAMP_FORMATS: [&str; 3] = [
    "%a %b %e %H:%M:%S %Y",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S",
];

/// Warning text dashboards match on
pub const FRESH_ERROR_MESSAGE: &str = "FATAL or ERROR in lua.log";

/// Length of `YYYY-MM-DD HH:MM:SS`
const ISO_STAMP_LEN: usize = 19;

pub fn is_error_entry(line: &str) -> bool {
    line.contains("[FATAL]") || line.contains("[ERROR]")
}

/// Extract a line's leading timestamp in local time
///
/// Accepts `[<stamp>] ...` with either layout, and a bare ISO stamp at the
/// start of the line.
pub fn parse_timestamp(line: &str) -> Option<DateTime<Local>> {
    let candidate = match line.strip_prefix('[') {
        Some(rest) => &rest[..rest.find(']')?],
        None => {
            let end = line
                .char_indices()
                .take_while(|(_, c)| c.is_ascii_digit() || matches!(c, '-' | ' ' | ':' | '.'))
                .map(|(i, c)| i + c.len_utf8())
                .last()?;
            line[..end].trim_end_matches([' ', ':'])
        }
    };

    let candidate = candidate.trim();
    let naive = TIMESTAMP_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(candidate, format).ok())
        .or_else(|| {
            candidate
                .get(..ISO_STAMP_LEN)
                .and_then(|prefix| NaiveDateTime::parse_from_str(prefix, "%Y-%m-%d %H:%M:%S").ok())
        })?;

    Local.from_local_datetime(&naive).earliest()
}

/// Newest error entry younger than `window`, scanning newest to oldest
///
/// Entries with unparseable timestamps are skipped. A timestamp in the
/// future counts as fresh.
pub fn find_fresh_error<'a>(
    lines: &'a [String],
    now: DateTime<Local>,
    window: Duration,
) -> Option<&'a str> {
    lines
        .iter()
        .rev()
        .filter(|line| is_error_entry(line))
        .find(|line| match parse_timestamp(line) {
            // Negative age does not convert
            Some(ts) => match now.signed_duration_since(ts).to_std() {
                Ok(age) => age < window,
                Err(_) => true,
            },
            None => false,
        })
        .map(String::as_str)
}

/// Scans the tail of the error log for fresh FATAL/ERROR entries
pub struct ErrorLogProbe {
    config: ErrorLogConfig,
    reader: Arc<dyn LogReader>,
}

impl ErrorLogProbe {
    pub fn new(config: ErrorLogConfig, reader: Arc<dyn LogReader>) -> Self {
        Self { config, reader }
    }

    /// Verdict for already-read log lines at time `now`
    pub fn evaluate(&self, lines: &[String], now: DateTime<Local>) -> ProbeVerdict {
        let window = Duration::from_secs(self.config.freshness_secs);
        match find_fresh_error(lines, now, window) {
            Some(entry) => {
                debug!(entry = %entry, "Fresh error log entry");
                ProbeVerdict::warning(self.kind(), FRESH_ERROR_MESSAGE)
            }
            None => ProbeVerdict::ok(self.kind()),
        }
    }
}

#[async_trait]
impl Probe for ErrorLogProbe {
    fn kind(&self) -> ProbeKind {
        ProbeKind::ErrorLog
    }

    fn failure_policy(&self) -> FailurePolicy {
        FailurePolicy::FailOpen
    }

    async fn check(&self, instance: &Instance) -> ProbeVerdict {
        let path = self.config.path_for(&instance.name);

        match self.reader.tail(&path, self.config.tail_lines).await {
            Ok(lines) => self.evaluate(&lines, Local::now()),
            Err(e) => {
                debug!(instance = %instance.name, error = %e, "Error log unreadable, treating as clean");
                ProbeVerdict::ok(self.kind())
            }
        }
    }
}
