//! Health checking for proxy instances
//!
//! This module provides:
//! - The probe battery (process, reachability, backends, resources, error log)
//! - Per-instance evaluation with timeout and panic containment
//! - Fleet-wide aggregation into a single report

mod aggregator;
mod checker;
pub mod probe;
mod report;
mod severity;

pub use aggregator::ReportAggregator;
pub use checker::InstanceChecker;
pub use probe::{FailurePolicy, Probe};
pub use report::{FleetReport, InstanceReport, ProbeDetail, ProbeKind, ProbeVerdict};
pub use severity::{max_severity, Severity};

use std::sync::Arc;

use crate::client::{AdminClient, MySqlClient, ProtocolClient};
use crate::config::Config;
use crate::inspect::{FileLogReader, LogReader, ProcessInspector, SysinfoInspector};

/// External capabilities the probes depend on
#[derive(Clone)]
pub struct Collaborators {
    pub processes: Arc<dyn ProcessInspector>,
    pub protocol: Arc<dyn ProtocolClient>,
    pub admin: Arc<dyn AdminClient>,
    pub logs: Arc<dyn LogReader>,
}

impl Collaborators {
    /// Collaborators for the local host
    pub fn local(config: &Config) -> Self {
        let client = Arc::new(MySqlClient::new(config.monitor.connect_timeout()));
        Self {
            processes: Arc::new(SysinfoInspector::new()),
            protocol: client.clone(),
            admin: client,
            logs: Arc::new(FileLogReader::new()),
        }
    }
}
