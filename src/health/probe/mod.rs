//! The probe battery
//!
//! Each probe is a pure function of an instance and its collaborators to a
//! [`ProbeVerdict`]. Inspection failures are mapped to a verdict inside the
//! probe; the [`FailurePolicy`] only decides what a timeout means.

pub mod backend;
pub mod error_log;
pub mod process;
pub mod reachability;
pub mod resource;

pub use backend::BackendHealthProbe;
pub use error_log::ErrorLogProbe;
pub use process::ProcessProbe;
pub use reachability::ReachabilityProbe;
pub use resource::ResourceUsageProbe;

use async_trait::async_trait;

use crate::config::Instance;

use super::report::{ProbeKind, ProbeVerdict};
use super::severity::Severity;

/// What an inconclusive probe reports
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailurePolicy {
    /// Inspection failure is reported as FAILED
    FailSafe,
    /// Inspection failure is reported as OK
    FailOpen,
}

impl FailurePolicy {
    pub fn severity(&self) -> Severity {
        match self {
            FailurePolicy::FailSafe => Severity::Failed,
            FailurePolicy::FailOpen => Severity::Ok,
        }
    }
}

/// A single independent health check
#[async_trait]
pub trait Probe: Send + Sync {
    fn kind(&self) -> ProbeKind;

    fn failure_policy(&self) -> FailurePolicy {
        FailurePolicy::FailSafe
    }

    async fn check(&self, instance: &Instance) -> ProbeVerdict;
}
