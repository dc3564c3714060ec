use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use crate::config::{Instance, ProcessConfig};
use crate::health::report::{ProbeKind, ProbeVerdict};
use crate::inspect::ProcessInspector;

use super::Probe;

/// Is the proxy process alive
pub struct ProcessProbe {
    config: ProcessConfig,
    inspector: Arc<dyn ProcessInspector>,
}

impl ProcessProbe {
    pub fn new(config: ProcessConfig, inspector: Arc<dyn ProcessInspector>) -> Self {
        Self { config, inspector }
    }
}

#[async_trait]
impl Probe for ProcessProbe {
    fn kind(&self) -> ProbeKind {
        ProbeKind::Process
    }

    async fn check(&self, instance: &Instance) -> ProbeVerdict {
        let signature = self.config.signature_for(&instance.name);

        match self.inspector.find(&signature).await {
            Ok(rows) if !rows.is_empty() => {
                debug!(instance = %instance.name, pids = ?rows.iter().map(|r| r.pid).collect::<Vec<_>>(), "Process found");
                ProbeVerdict::ok(self.kind())
            }
            Ok(_) => ProbeVerdict::failed(self.kind(), "no process matches the launch signature"),
            // Can't tell a dead proxy from a broken inspection
            Err(e) => ProbeVerdict::failed(self.kind(), e.to_string()),
        }
    }
}
