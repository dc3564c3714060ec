use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use crate::config::{Instance, ProcessConfig, ResourceThresholds};
use crate::health::report::{ProbeDetail, ProbeKind, ProbeVerdict};
use crate::inspect::{ProcessInspector, ProcessRow};

use super::Probe;

const CPU_HIGH: u8 = 1;
const MEM_HIGH: u8 = 2;

/// Verdict for one process sample against the thresholds
///
/// CPU and memory are independent flags combined into a single verdict;
/// memory is high when either the virtual or the resident size is over its
/// limit. Thresholds alone never produce FAILED.
pub fn evaluate(row: &ProcessRow, thresholds: &ResourceThresholds) -> ProbeVerdict {
    let mut status = 0;
    if row.cpu_percent > thresholds.max_cpu_percent {
        status |= CPU_HIGH;
    }
    if row.vsz_kib > thresholds.max_vsz_kib || row.rss_kib > thresholds.max_rss_kib {
        status |= MEM_HIGH;
    }

    let verdict = match status {
        0 => ProbeVerdict::ok(ProbeKind::Resources),
        CPU_HIGH => ProbeVerdict::warning(ProbeKind::Resources, "CPU IS BUSY"),
        MEM_HIGH => ProbeVerdict::warning(ProbeKind::Resources, "MEMORY IS TOO LARGE"),
        _ => ProbeVerdict::warning(ProbeKind::Resources, "CPU IS BUSY & MEMORY IS TOO LARGE"),
    };

    verdict.with_detail(ProbeDetail::Resources {
        cpu_percent: row.cpu_percent,
        vsz_kib: row.vsz_kib,
        rss_kib: row.rss_kib,
    })
}

/// CPU and memory footprint of the proxy process
pub struct ResourceUsageProbe {
    process: ProcessConfig,
    thresholds: ResourceThresholds,
    inspector: Arc<dyn ProcessInspector>,
}

impl ResourceUsageProbe {
    pub fn new(
        process: ProcessConfig,
        thresholds: ResourceThresholds,
        inspector: Arc<dyn ProcessInspector>,
    ) -> Self {
        Self {
            process,
            thresholds,
            inspector,
        }
    }
}

#[async_trait]
impl Probe for ResourceUsageProbe {
    fn kind(&self) -> ProbeKind {
        ProbeKind::Resources
    }

    async fn check(&self, instance: &Instance) -> ProbeVerdict {
        let signature = self.process.signature_for(&instance.name);

        let rows = match self.inspector.find(&signature).await {
            Ok(rows) => rows,
            Err(e) => return ProbeVerdict::failed(self.kind(), e.to_string()),
        };

        match rows.first() {
            Some(row) => {
                debug!(
                    instance = %instance.name,
                    pid = row.pid,
                    cpu = row.cpu_percent,
                    vsz_kib = row.vsz_kib,
                    rss_kib = row.rss_kib,
                    "Resource sample"
                );
                evaluate(row, &self.thresholds)
            }
            None => ProbeVerdict::failed(self.kind(), "no process matches the launch signature"),
        }
    }
}
