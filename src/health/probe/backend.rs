//! Backend health via the proxy's admin interface
//!
//! The admin interface lists one row per backend in the fixed column order
//! of [`BACKEND_COLUMNS`]. A write-capable backend going down is critical;
//! read-only backends going down only degrade the instance.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use tracing::{debug, warn};

use crate::client::AdminClient;
use crate::config::{AdminConfig, Instance};
use crate::health::report::{ProbeDetail, ProbeKind, ProbeVerdict};
use crate::protocol::ResultSet;

use super::Probe;

/// Column order of the backend listing
pub const BACKEND_COLUMNS: [&str; 6] = [
    "backend_ndx",
    "address",
    "state",
    "type",
    "uuid",
    "connected_clients",
];

/// Backend state as the admin interface reports it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendState {
    Up,
    Down,
    Offline,
    Unknown,
}

impl BackendState {
    fn parse(raw: &str) -> Self {
        match raw {
            "up" => BackendState::Up,
            "down" => BackendState::Down,
            "offline" => BackendState::Offline,
            _ => BackendState::Unknown,
        }
    }
}

/// Backend role; anything not read-write is treated as read-only
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum BackendRole {
    #[serde(rename = "rw")]
    ReadWrite,
    #[serde(rename = "ro")]
    ReadOnly,
}

impl BackendRole {
    fn parse(raw: &str) -> Self {
        match raw {
            "rw" => BackendRole::ReadWrite,
            _ => BackendRole::ReadOnly,
        }
    }
}

/// One downstream connection of a proxy instance
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BackendRecord {
    pub index: u32,
    pub address: String,
    pub state: BackendState,
    pub role: BackendRole,
    pub uuid: Option<String>,
    pub connected_clients: u64,
}

/// Malformed backend listing
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BackendParseError {
    #[error("row {row}: expected {expected} fields, got {found}")]
    FieldCount {
        row: usize,
        expected: usize,
        found: usize,
    },
    #[error("row {row}: {field} is NULL")]
    MissingField { row: usize, field: &'static str },
    #[error("row {row}: {field} is not a number: {value:?}")]
    InvalidNumber {
        row: usize,
        field: &'static str,
        value: String,
    },
}

impl BackendRecord {
    /// Build a record from one listing row (`row` is 1-based, for messages)
    pub fn from_row(row: usize, fields: &[Option<String>]) -> Result<Self, BackendParseError> {
        let [index, address, state, role, uuid, clients] = fields else {
            return Err(BackendParseError::FieldCount {
                row,
                expected: BACKEND_COLUMNS.len(),
                found: fields.len(),
            });
        };

        let required = |value: &Option<String>, column: usize| {
            value.clone().ok_or(BackendParseError::MissingField {
                row,
                field: BACKEND_COLUMNS[column],
            })
        };
        let number = |value: String, column: usize| {
            value
                .trim()
                .parse::<u64>()
                .map_err(|_| BackendParseError::InvalidNumber {
                    row,
                    field: BACKEND_COLUMNS[column],
                    value,
                })
        };

        let index = number(required(index, 0)?, 0)?;
        let index = u32::try_from(index).map_err(|_| BackendParseError::InvalidNumber {
            row,
            field: BACKEND_COLUMNS[0],
            value: index.to_string(),
        })?;

        Ok(Self {
            index,
            address: required(address, 1)?,
            state: BackendState::parse(&required(state, 2)?),
            role: BackendRole::parse(&required(role, 3)?),
            uuid: uuid.clone(),
            connected_clients: number(required(clients, 5)?, 5)?,
        })
    }

    pub fn is_down(&self) -> bool {
        self.state == BackendState::Down
    }
}

/// Parse every data row of a backend listing, in listing order
///
/// The column definitions are the header and are not validated; each row
/// must carry exactly the six listing fields.
pub fn parse_backends(listing: &ResultSet) -> Result<Vec<BackendRecord>, BackendParseError> {
    listing
        .rows
        .iter()
        .enumerate()
        .map(|(i, row)| BackendRecord::from_row(i + 1, row))
        .collect()
}

/// Down counts per role
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BackendSummary {
    pub rw_down: usize,
    pub ro_down: usize,
}

impl BackendSummary {
    pub fn classify(backends: &[BackendRecord]) -> Self {
        backends
            .iter()
            .filter(|b| b.is_down())
            .fold(Self::default(), |mut summary, b| {
                match b.role {
                    BackendRole::ReadWrite => summary.rw_down += 1,
                    BackendRole::ReadOnly => summary.ro_down += 1,
                }
                summary
            })
    }

    /// Verdict for this summary, without detail
    pub fn verdict(&self) -> ProbeVerdict {
        if self.rw_down > 0 {
            ProbeVerdict::failed(ProbeKind::Backends, "READ-WRITE BACKEND IS DOWN")
        } else if self.ro_down > 0 {
            ProbeVerdict::warning(ProbeKind::Backends, "SOME SLAVES ARE DOWN")
        } else {
            ProbeVerdict::ok(ProbeKind::Backends)
        }
    }
}

/// Classifies the instance's backends by role and state
pub struct BackendHealthProbe {
    host: String,
    config: AdminConfig,
    client: Arc<dyn AdminClient>,
}

impl BackendHealthProbe {
    pub fn new(host: impl Into<String>, config: AdminConfig, client: Arc<dyn AdminClient>) -> Self {
        Self {
            host: host.into(),
            config,
            client,
        }
    }
}

#[async_trait]
impl Probe for BackendHealthProbe {
    fn kind(&self) -> ProbeKind {
        ProbeKind::Backends
    }

    async fn check(&self, instance: &Instance) -> ProbeVerdict {
        let addr = format!("{}:{}", self.host, instance.admin_port);

        let listing = match self
            .client
            .query(&addr, &self.config.credentials(), &self.config.query)
            .await
        {
            Ok(listing) => listing,
            Err(e) => {
                warn!(instance = %instance.name, addr = %addr, error = %e, "Backend listing failed");
                return ProbeVerdict::failed(self.kind(), e.to_string());
            }
        };

        let backends = match parse_backends(&listing) {
            Ok(backends) => backends,
            Err(e) => {
                warn!(instance = %instance.name, error = %e, "Malformed backend listing");
                return ProbeVerdict::failed(self.kind(), format!("malformed backend listing: {}", e));
            }
        };

        let summary = BackendSummary::classify(&backends);
        debug!(
            instance = %instance.name,
            backends = backends.len(),
            rw_down = summary.rw_down,
            ro_down = summary.ro_down,
            "Backends classified"
        );

        summary
            .verdict()
            .with_detail(ProbeDetail::Backends { backends })
    }
}
