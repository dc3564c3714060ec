//! Instance list parsing
//!
//! One instance per line: `name=proxy_port,admin_port`. Blank lines and
//! `#` comments are ignored; malformed lines are skipped with a warning.

use serde::Serialize;
use tracing::{debug, warn};

/// One monitored proxy process
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Instance {
    /// Instance name (also the config-file key of the proxy)
    #[serde(skip)]
    pub name: String,
    /// Client-facing service port
    pub proxy_port: u16,
    /// Administrative interface port
    pub admin_port: u16,
}

impl Instance {
    pub fn new(name: impl Into<String>, proxy_port: u16, admin_port: u16) -> Self {
        Self {
            name: name.into(),
            proxy_port,
            admin_port,
        }
    }
}

/// Reason an instance line was rejected
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InstanceParseError {
    #[error("missing '=' between name and ports")]
    MissingEquals,
    #[error("missing ',' between proxy and admin port")]
    MissingComma,
    #[error("empty instance name")]
    EmptyName,
    #[error("invalid port: {0:?}")]
    InvalidPort(String),
}

/// Parse a single line
///
/// Returns `Ok(None)` for blank and comment lines.
pub fn parse_instance_line(line: &str) -> Result<Option<Instance>, InstanceParseError> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return Ok(None);
    }

    let (name, ports) = line.split_once('=').ok_or(InstanceParseError::MissingEquals)?;
    let name = name.trim();
    if name.is_empty() {
        return Err(InstanceParseError::EmptyName);
    }

    let (proxy_port, admin_port) = ports
        .split_once(',')
        .ok_or(InstanceParseError::MissingComma)?;

    Ok(Some(Instance::new(
        name,
        parse_port(proxy_port)?,
        parse_port(admin_port)?,
    )))
}

fn parse_port(raw: &str) -> Result<u16, InstanceParseError> {
    let raw = raw.trim();
    raw.parse::<u16>()
        .map_err(|_| InstanceParseError::InvalidPort(raw.to_string()))
}

/// Parse an instance list
///
/// Instances keep file order. A repeated name replaces the earlier entry's
/// ports in place (last definition wins, first position kept).
pub fn parse_instances(text: &str) -> Vec<Instance> {
    let mut instances: Vec<Instance> = Vec::new();

    for (lineno, line) in text.lines().enumerate() {
        let instance = match parse_instance_line(line) {
            Ok(Some(instance)) => instance,
            Ok(None) => continue,
            Err(e) => {
                warn!(line = lineno + 1, content = %line.trim(), error = %e, "Skipping malformed instance line");
                continue;
            }
        };

        match instances.iter_mut().find(|i| i.name == instance.name) {
            Some(existing) => {
                warn!(
                    instance = %instance.name,
                    line = lineno + 1,
                    "Duplicate instance name, later definition wins"
                );
                *existing = instance;
            }
            None => instances.push(instance),
        }
    }

    debug!(count = instances.len(), "Parsed instance list");
    instances
}
