//! Verdict and report types
//!
//! Report severities are derived on construction from their contributors
//! and cannot be set independently.

use std::fmt;

use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};

use crate::config::Instance;

use super::probe::backend::BackendRecord;
use super::severity::{max_severity, Severity};

/// Identifies which probe produced a verdict
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProbeKind {
    Process,
    Reachability,
    Backends,
    Resources,
    ErrorLog,
}

impl ProbeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProbeKind::Process => "process",
            ProbeKind::Reachability => "reachability",
            ProbeKind::Backends => "backends",
            ProbeKind::Resources => "resources",
            ProbeKind::ErrorLog => "error_log",
        }
    }
}

impl fmt::Display for ProbeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Structured payload attached to a verdict
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ProbeDetail {
    /// Backend listing from the admin interface
    Backends { backends: Vec<BackendRecord> },
    /// Resource sample of the proxy process
    Resources {
        cpu_percent: f32,
        vsz_kib: u64,
        rss_kib: u64,
    },
}

/// Outcome of one probe run
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProbeVerdict {
    pub probe: ProbeKind,
    pub severity: Severity,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<ProbeDetail>,
}

impl ProbeVerdict {
    pub fn new(probe: ProbeKind, severity: Severity, message: impl Into<String>) -> Self {
        Self {
            probe,
            severity,
            message: message.into(),
            detail: None,
        }
    }

    pub fn ok(probe: ProbeKind) -> Self {
        Self::new(probe, Severity::Ok, "OK")
    }

    pub fn warning(probe: ProbeKind, message: impl Into<String>) -> Self {
        Self::new(probe, Severity::Warning, message)
    }

    pub fn failed(probe: ProbeKind, message: impl Into<String>) -> Self {
        Self::new(probe, Severity::Failed, message)
    }

    pub fn with_detail(mut self, detail: ProbeDetail) -> Self {
        self.detail = Some(detail);
        self
    }
}

/// All verdicts for one instance, in probe order
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InstanceReport {
    #[serde(flatten)]
    instance: Instance,
    severity: Severity,
    verdicts: Vec<ProbeVerdict>,
}

impl InstanceReport {
    pub fn new(instance: Instance, verdicts: Vec<ProbeVerdict>) -> Self {
        let severity = max_severity(verdicts.iter().map(|v| v.severity));
        Self {
            instance,
            severity,
            verdicts,
        }
    }

    pub fn instance(&self) -> &Instance {
        &self.instance
    }

    pub fn name(&self) -> &str {
        &self.instance.name
    }

    pub fn severity(&self) -> Severity {
        self.severity
    }

    pub fn verdicts(&self) -> &[ProbeVerdict] {
        &self.verdicts
    }

    /// Verdict of a given probe, if it ran
    pub fn verdict(&self, probe: ProbeKind) -> Option<&ProbeVerdict> {
        self.verdicts.iter().find(|v| v.probe == probe)
    }
}

/// Result of one pass over the fleet
///
/// Serializes `instances` as an object keyed by instance name, in
/// configuration order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FleetReport {
    title: String,
    severity: Severity,
    #[serde(serialize_with = "serialize_instances")]
    instances: Vec<InstanceReport>,
}

impl FleetReport {
    pub fn new(title: impl Into<String>, instances: Vec<InstanceReport>) -> Self {
        let severity = max_severity(instances.iter().map(|r| r.severity));
        Self {
            title: title.into(),
            severity,
            instances,
        }
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn severity(&self) -> Severity {
        self.severity
    }

    pub fn instances(&self) -> &[InstanceReport] {
        &self.instances
    }

    pub fn instance(&self, name: &str) -> Option<&InstanceReport> {
        self.instances.iter().find(|r| r.name() == name)
    }

    pub fn len(&self) -> usize {
        self.instances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }
}

fn serialize_instances<S>(instances: &[InstanceReport], serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    let mut map = serializer.serialize_map(Some(instances.len()))?;
    for report in instances {
        map.serialize_entry(report.name(), report)?;
    }
    map.end()
}
