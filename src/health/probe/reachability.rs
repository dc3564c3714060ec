use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use crate::client::ProtocolClient;
use crate::config::{Credentials, Instance};
use crate::health::report::{ProbeKind, ProbeVerdict};

use super::Probe;

/// Text the MySQL client prints when nothing accepts the connection
pub const REFUSAL_SIGNATURE: &str = "ERROR 2003";

/// Position of the refusal signature in a client response, if present
pub fn find_refusal(response: &str) -> Option<usize> {
    response.find(REFUSAL_SIGNATURE)
}

/// Does the proxy port answer the MySQL protocol
///
/// Anything that proves a server is listening counts as reachable, including
/// a rejected login.
pub struct ReachabilityProbe {
    host: String,
    credentials: Credentials,
    client: Arc<dyn ProtocolClient>,
}

impl ReachabilityProbe {
    pub fn new(host: impl Into<String>, credentials: Credentials, client: Arc<dyn ProtocolClient>) -> Self {
        Self {
            host: host.into(),
            credentials,
            client,
        }
    }
}

#[async_trait]
impl Probe for ReachabilityProbe {
    fn kind(&self) -> ProbeKind {
        ProbeKind::Reachability
    }

    async fn check(&self, instance: &Instance) -> ProbeVerdict {
        let addr = format!("{}:{}", self.host, instance.proxy_port);

        let response = match self.client.handshake(&addr, &self.credentials).await {
            Ok(()) => return ProbeVerdict::ok(self.kind()),
            Err(e) => e.to_string(),
        };

        match find_refusal(&response) {
            Some(_) => ProbeVerdict::failed(self.kind(), response),
            None => {
                debug!(instance = %instance.name, addr = %addr, response = %response, "Port answered with an error");
                ProbeVerdict::ok(self.kind())
            }
        }
    }
}
