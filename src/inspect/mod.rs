//! Local host inspection: process table and log files

mod log;
mod process;

pub use log::{FileLogReader, LogReader};
pub use process::{ProcessInspector, ProcessRow, SysinfoInspector};

use std::path::PathBuf;

/// Error while inspecting the local host
#[derive(Debug, thiserror::Error)]
pub enum InspectError {
    #[error("Process table unavailable: {0}")]
    ProcessTable(String),
    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
