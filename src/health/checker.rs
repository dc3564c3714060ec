//! Runs the probe battery against one instance

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::FutureExt;
use tracing::{debug, warn};

use crate::config::{Config, Instance};

use super::probe::{
    BackendHealthProbe, ErrorLogProbe, Probe, ProcessProbe, ReachabilityProbe, ResourceUsageProbe,
};
use super::report::{InstanceReport, ProbeVerdict};
use super::Collaborators;

/// Evaluates every probe for an instance and folds the verdicts
///
/// Probes run sequentially in a fixed order and are never short-circuited:
/// a FAILED process probe still lets the network probes report.
pub struct InstanceChecker {
    probes: Vec<Arc<dyn Probe>>,
    probe_timeout: Duration,
}

impl InstanceChecker {
    /// Build the standard battery from configuration
    pub fn new(config: &Config, collaborators: Collaborators) -> Self {
        let host = config.monitor.host.clone();
        let probes: Vec<Arc<dyn Probe>> = vec![
            Arc::new(ProcessProbe::new(
                config.process.clone(),
                collaborators.processes.clone(),
            )),
            Arc::new(ReachabilityProbe::new(
                host.clone(),
                config.reachability.credentials(),
                collaborators.protocol,
            )),
            Arc::new(BackendHealthProbe::new(
                host,
                config.admin.clone(),
                collaborators.admin,
            )),
            Arc::new(ResourceUsageProbe::new(
                config.process.clone(),
                config.resources.clone(),
                collaborators.processes,
            )),
            Arc::new(ErrorLogProbe::new(
                config.error_log.clone(),
                collaborators.logs,
            )),
        ];

        Self::with_probes(probes, config.monitor.probe_timeout())
    }

    /// Use an explicit probe list
    pub fn with_probes(probes: Vec<Arc<dyn Probe>>, probe_timeout: Duration) -> Self {
        Self {
            probes,
            probe_timeout,
        }
    }

    pub fn probes(&self) -> &[Arc<dyn Probe>] {
        &self.probes
    }

    pub async fn check(&self, instance: &Instance) -> InstanceReport {
        let mut verdicts = Vec::with_capacity(self.probes.len());
        for probe in &self.probes {
            verdicts.push(self.run_probe(probe.as_ref(), instance).await);
        }

        let report = InstanceReport::new(instance.clone(), verdicts);
        debug!(instance = %instance.name, severity = %report.severity(), "Instance checked");
        report
    }

    /// Run a single probe, containing timeouts and panics
    async fn run_probe(&self, probe: &dyn Probe, instance: &Instance) -> ProbeVerdict {
        let kind = probe.kind();
        let start = Instant::now();

        let outcome = tokio::time::timeout(
            self.probe_timeout,
            AssertUnwindSafe(probe.check(instance)).catch_unwind(),
        )
        .await;

        let verdict = match outcome {
            Ok(Ok(mut verdict)) => {
                // A probe may only speak for itself
                verdict.probe = kind;
                verdict
            }
            Ok(Err(_)) => {
                warn!(instance = %instance.name, probe = %kind, "Probe panicked");
                ProbeVerdict::failed(kind, "probe aborted unexpectedly")
            }
            Err(_) => {
                warn!(
                    instance = %instance.name,
                    probe = %kind,
                    timeout_ms = self.probe_timeout.as_millis() as u64,
                    "Probe timed out"
                );
                ProbeVerdict::new(
                    kind,
                    probe.failure_policy().severity(),
                    format!("timed out after {}ms", self.probe_timeout.as_millis()),
                )
            }
        };

        debug!(
            instance = %instance.name,
            probe = %kind,
            severity = %verdict.severity,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Probe finished"
        );
        verdict
    }
}
