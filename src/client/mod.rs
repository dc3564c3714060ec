//! MySQL protocol clients used by the network probes
//!
//! Probes depend on the [`ProtocolClient`] and [`AdminClient`] traits only;
//! [`MySqlClient`] is the production implementation over the native wire
//! protocol.

mod connection;

pub use connection::{client_error, Connection, ConnectionError};

use std::time::Duration;

use async_trait::async_trait;

use crate::config::Credentials;
use crate::protocol::ResultSet;

/// Performs a protocol-level handshake against a service port
#[async_trait]
pub trait ProtocolClient: Send + Sync {
    async fn handshake(&self, addr: &str, credentials: &Credentials) -> Result<(), ConnectionError>;
}

/// Runs a query against an administrative interface
#[async_trait]
pub trait AdminClient: Send + Sync {
    async fn query(
        &self,
        addr: &str,
        credentials: &Credentials,
        sql: &str,
    ) -> Result<ResultSet, ConnectionError>;
}

/// Native MySQL client opening one connection per call
#[derive(Debug, Clone)]
pub struct MySqlClient {
    connect_timeout: Duration,
}

impl MySqlClient {
    pub fn new(connect_timeout: Duration) -> Self {
        Self { connect_timeout }
    }
}

#[async_trait]
impl ProtocolClient for MySqlClient {
    async fn handshake(&self, addr: &str, credentials: &Credentials) -> Result<(), ConnectionError> {
        let conn = Connection::connect(addr, credentials, self.connect_timeout).await?;
        conn.close().await;
        Ok(())
    }
}

#[async_trait]
impl AdminClient for MySqlClient {
    async fn query(
        &self,
        addr: &str,
        credentials: &Credentials,
        sql: &str,
    ) -> Result<ResultSet, ConnectionError> {
        let mut conn = Connection::connect(addr, credentials, self.connect_timeout).await?;
        let result = conn.query(sql).await;
        conn.close().await;
        result
    }
}
