use async_trait::async_trait;
use serde::Serialize;
use sysinfo::{ProcessRefreshKind, System};
use tracing::debug;

use super::InspectError;

/// One process-table row, in the units `ps aux` reports
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProcessRow {
    pub pid: u32,
    /// CPU usage percentage (may exceed 100 on multi-core hosts)
    pub cpu_percent: f32,
    /// Virtual size (KiB)
    pub vsz_kib: u64,
    /// Resident set size (KiB)
    pub rss_kib: u64,
    /// Full command line
    #[serde(skip)]
    pub command: String,
}

/// Looks up processes by launch signature
#[async_trait]
pub trait ProcessInspector: Send + Sync {
    /// Every process whose command line contains `signature`, in pid order
    async fn find(&self, signature: &str) -> Result<Vec<ProcessRow>, InspectError>;
}

/// Process table backed by `sysinfo`
///
/// CPU usage is measured across `sysinfo::MINIMUM_CPU_UPDATE_INTERVAL`, so
/// every lookup takes at least that long.
#[derive(Debug, Default, Clone)]
pub struct SysinfoInspector;

impl SysinfoInspector {
    pub fn new() -> Self {
        Self
    }

    fn scan(signature: &str) -> Vec<ProcessRow> {
        let mut system = System::new();
        system.refresh_processes_specifics(ProcessRefreshKind::everything());
        std::thread::sleep(sysinfo::MINIMUM_CPU_UPDATE_INTERVAL);
        system.refresh_processes_specifics(ProcessRefreshKind::everything());

        let mut rows: Vec<ProcessRow> = system
            .processes()
            .values()
            .filter_map(|process| {
                let command = process.cmd().join(" ");
                if !command.contains(signature) {
                    return None;
                }
                Some(ProcessRow {
                    pid: process.pid().as_u32(),
                    cpu_percent: process.cpu_usage(),
                    vsz_kib: process.virtual_memory() / 1024,
                    rss_kib: process.memory() / 1024,
                    command,
                })
            })
            .collect();

        rows.sort_by_key(|row| row.pid);
        rows
    }
}

#[async_trait]
impl ProcessInspector for SysinfoInspector {
    async fn find(&self, signature: &str) -> Result<Vec<ProcessRow>, InspectError> {
        let signature_owned = signature.to_string();
        let rows = tokio::task::spawn_blocking(move || Self::scan(&signature_owned))
            .await
            .map_err(|e| InspectError::ProcessTable(e.to_string()))?;

        debug!(signature = %signature, matches = rows.len(), "Process table scanned");
        Ok(rows)
    }
}
