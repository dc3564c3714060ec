//! Prometheus metrics for fleet reports
//!
//! Rendered in the text exposition format and written to a file for the
//! node exporter textfile collector.

use std::path::Path;

use prometheus::{Encoder, Gauge, IntGauge, IntGaugeVec, Opts, Registry, TextEncoder};

use crate::health::FleetReport;

/// Metrics describing the latest fleet pass
pub struct Metrics {
    /// Registry for all metrics
    pub registry: Registry,

    /// Fleet severity (0 = OK, 1 = WARNING, 2 = FAILED)
    pub fleet_severity: IntGauge,
    /// Severity per instance
    pub instance_severity: IntGaugeVec,
    /// Severity per instance and probe
    pub probe_severity: IntGaugeVec,
    /// Number of instances checked
    pub instances_checked: IntGauge,
    /// Wall time of the pass in seconds
    pub pass_duration_seconds: Gauge,
}

impl Metrics {
    /// Create a new metrics collection
    pub fn new() -> prometheus::Result<Self> {
        let registry = Registry::new();

        let fleet_severity = IntGauge::new(
            "athena_monitor_fleet_severity",
            "Worst severity across all instances (0=OK, 1=WARNING, 2=FAILED)",
        )?;

        let instance_severity = IntGaugeVec::new(
            Opts::new(
                "athena_monitor_instance_severity",
                "Worst severity across the probes of an instance",
            ),
            &["instance"],
        )?;

        let probe_severity = IntGaugeVec::new(
            Opts::new("athena_monitor_probe_severity", "Severity reported by a probe"),
            &["instance", "probe"],
        )?;

        let instances_checked = IntGauge::new(
            "athena_monitor_instances_checked",
            "Number of instances in the last pass",
        )?;

        let pass_duration_seconds = Gauge::new(
            "athena_monitor_pass_duration_seconds",
            "Wall time of the last pass in seconds",
        )?;

        registry.register(Box::new(fleet_severity.clone()))?;
        registry.register(Box::new(instance_severity.clone()))?;
        registry.register(Box::new(probe_severity.clone()))?;
        registry.register(Box::new(instances_checked.clone()))?;
        registry.register(Box::new(pass_duration_seconds.clone()))?;

        Ok(Self {
            registry,
            fleet_severity,
            instance_severity,
            probe_severity,
            instances_checked,
            pass_duration_seconds,
        })
    }

    /// Record the outcome of a pass
    pub fn record_report(&self, report: &FleetReport, duration_secs: f64) {
        self.fleet_severity
            .set(i64::from(report.severity().exit_code()));
        self.instances_checked.set(report.len() as i64);
        self.pass_duration_seconds.set(duration_secs);

        for instance in report.instances() {
            self.instance_severity
                .with_label_values(&[instance.name()])
                .set(i64::from(instance.severity().exit_code()));

            for verdict in instance.verdicts() {
                self.probe_severity
                    .with_label_values(&[instance.name(), verdict.probe.as_str()])
                    .set(i64::from(verdict.severity.exit_code()));
            }
        }
    }

    /// Get metrics as Prometheus text format
    pub fn gather(&self) -> prometheus::Result<String> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}

/// Write a report to `path` in the text exposition format
///
/// The file is written next to its destination and renamed into place so
/// collectors never see a partial file.
pub fn write_textfile(report: &FleetReport, duration_secs: f64, path: &Path) -> anyhow::Result<()> {
    let metrics = Metrics::new()?;
    metrics.record_report(report, duration_secs);
    let body = metrics.gather()?;

    let tmp = path.with_extension("prom.tmp");
    std::fs::write(&tmp, body)?;
    std::fs::rename(&tmp, path)?;
    Ok(())
}
