//! Fleet-wide pass over every configured instance

use std::sync::Arc;
use std::time::Instant;

use futures::future::join_all;
use tokio::sync::Semaphore;
use tracing::{info, warn};

use crate::config::Instance;

use super::checker::InstanceChecker;
use super::report::{FleetReport, InstanceReport};

/// Checks every instance and combines the results into one report
///
/// Instances are checked concurrently up to a bound; the report keeps
/// configuration order regardless of completion order.
pub struct ReportAggregator {
    checker: Arc<InstanceChecker>,
    title: String,
    concurrency: usize,
}

impl ReportAggregator {
    pub fn new(checker: Arc<InstanceChecker>, title: impl Into<String>, concurrency: usize) -> Self {
        Self {
            checker,
            title: title.into(),
            concurrency: concurrency.max(1),
        }
    }

    pub async fn run(&self, instances: &[Instance]) -> FleetReport {
        let start = Instant::now();
        let permits = Arc::new(Semaphore::new(self.concurrency));

        let checks = instances.iter().map(|instance| {
            let permits = permits.clone();
            async move {
                // The semaphore is never closed
                let _permit = permits.acquire().await.ok();
                self.checker.check(instance).await
            }
        });
        let reports: Vec<InstanceReport> = join_all(checks).await;

        let report = FleetReport::new(self.title.clone(), reports);
        let failing: Vec<&str> = report
            .instances()
            .iter()
            .filter(|r| r.severity() > super::Severity::Ok)
            .map(|r| r.name())
            .collect();

        if failing.is_empty() {
            info!(
                instances = report.len(),
                elapsed_ms = start.elapsed().as_millis() as u64,
                "Fleet check passed"
            );
        } else {
            warn!(
                instances = report.len(),
                severity = %report.severity(),
                unhealthy = ?failing,
                elapsed_ms = start.elapsed().as_millis() as u64,
                "Fleet check found problems"
            );
        }

        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::health::probe::Probe;
    use crate::health::report::{ProbeKind, ProbeVerdict};
    use crate::health::Severity;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    /// Severity chosen by instance name, with a name-dependent delay
    struct ByName {
        in_flight: AtomicUsize,
        peak: AtomicUsize,
    }

    #[async_trait]
    impl Probe for ByName {
        fn kind(&self) -> ProbeKind {
            ProbeKind::Process
        }

        async fn check(&self, instance: &Instance) -> ProbeVerdict {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);

            // Earlier instances finish later
            let delay = 60u64.saturating_sub(u64::from(instance.proxy_port % 100) * 10);
            tokio::time::sleep(Duration::from_millis(delay)).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);

            match instance.name.as_str() {
                name if name.starts_with("down") => ProbeVerdict::failed(self.kind(), "down"),
                name if name.starts_with("busy") => ProbeVerdict::warning(self.kind(), "CPU IS BUSY"),
                _ => ProbeVerdict::ok(self.kind()),
            }
        }
    }

    fn aggregator(concurrency: usize) -> (ReportAggregator, Arc<ByName>) {
        let probe = Arc::new(ByName {
            in_flight: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        });
        let checker = InstanceChecker::with_probes(vec![probe.clone()], Duration::from_secs(5));
        (
            ReportAggregator::new(Arc::new(checker), "monitor of mysql-proxy", concurrency),
            probe,
        )
    }

    fn fleet(names: &[&str]) -> Vec<Instance> {
        names
            .iter()
            .enumerate()
            .map(|(i, name)| Instance::new(*name, 4000 + i as u16, 5000 + i as u16))
            .collect()
    }

    #[tokio::test]
    async fn test_empty_fleet_is_ok() {
        let (aggregator, _) = aggregator(4);
        let report = aggregator.run(&[]).await;
        assert!(report.is_empty());
        assert_eq!(report.severity(), Severity::Ok);
        assert_eq!(report.title(), "monitor of mysql-proxy");
    }

    #[tokio::test]
    async fn test_order_and_fold() {
        let (aggregator, _) = aggregator(4);
        let instances = fleet(&["a", "busy_b", "c", "d"]);

        let report = aggregator.run(&instances).await;
        let names: Vec<_> = report.instances().iter().map(|r| r.name()).collect();
        assert_eq!(names, vec!["a", "busy_b", "c", "d"]);
        assert_eq!(report.severity(), Severity::Warning);

        let instances = fleet(&["a", "busy_b", "down_c"]);
        assert_eq!(aggregator.run(&instances).await.severity(), Severity::Failed);
    }

    #[tokio::test]
    async fn test_concurrency_is_bounded() {
        let (aggregator, probe) = aggregator(2);
        let instances = fleet(&["a", "b", "c", "d", "e"]);

        let report = aggregator.run(&instances).await;
        assert_eq!(report.len(), 5);
        assert!(probe.peak.load(Ordering::SeqCst) <= 2);
    }

    #[tokio::test]
    async fn test_repeated_runs_agree() {
        let (aggregator, _) = aggregator(3);
        let instances = fleet(&["a", "busy_b", "down_c"]);

        let first = aggregator.run(&instances).await;
        let second = aggregator.run(&instances).await;
        assert_eq!(first, second);
    }
}
