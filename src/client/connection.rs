use std::time::Duration;

use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_util::codec::Framed;
use tracing::{debug, error};

use crate::config::Credentials;
use crate::protocol::resultset::{parse_column_name, parse_length_encoded_int, parse_text_row};
use crate::protocol::{
    capabilities, command, compute_auth_response, is_eof_packet, is_err_packet, is_ok_packet,
    ErrPacket, HandshakeResponse, InitialHandshake, Packet, PacketCodec, ResultSet,
};

/// MySQL client error codes reported for local failures
pub mod client_error {
    /// CR_CONN_HOST_ERROR: nothing accepted the TCP connection
    pub const CONN_HOST_ERROR: u16 = 2003;
    /// CR_SERVER_LOST
    pub const SERVER_LOST: u16 = 2013;
    /// CR_MALFORMED_PACKET
    pub const MALFORMED_PACKET: u16 = 2027;
}

/// A single short-lived connection to a MySQL-protocol endpoint
pub struct Connection {
    framed: Framed<TcpStream, PacketCodec>,
    capabilities: u32,
}

impl Connection {
    /// Connect and authenticate
    ///
    /// `connect_timeout` bounds the TCP connect only; callers bound the
    /// whole exchange with their own timeout.
    pub async fn connect(
        addr: &str,
        credentials: &Credentials,
        connect_timeout: Duration,
    ) -> Result<Self, ConnectionError> {
        debug!(addr = %addr, user = %credentials.user, "Connecting");

        let stream = match tokio::time::timeout(connect_timeout, TcpStream::connect(addr)).await {
            Ok(Ok(stream)) => stream,
            Ok(Err(e)) => {
                debug!(addr = %addr, error = %e, "TCP connect failed");
                return Err(ConnectionError::Connect {
                    addr: addr.to_string(),
                    reason: e.to_string(),
                });
            }
            Err(_) => {
                return Err(ConnectionError::Connect {
                    addr: addr.to_string(),
                    reason: format!("timed out after {}ms", connect_timeout.as_millis()),
                });
            }
        };

        let mut framed = Framed::new(stream, PacketCodec);

        let handshake_packet = framed
            .next()
            .await
            .ok_or(ConnectionError::Disconnected)?
            .map_err(|e| ConnectionError::Io(e.to_string()))?;

        // Servers that refuse a client before the handshake (too many
        // connections, host blocked) send an ERR packet instead
        if is_err_packet(&handshake_packet.payload) {
            return Err(ErrPacket::parse(&handshake_packet.payload, 0)
                .map(ConnectionError::from)
                .unwrap_or_else(|| ConnectionError::Protocol("Malformed error packet".into())));
        }

        let server_handshake = InitialHandshake::parse(&handshake_packet.payload)
            .ok_or_else(|| ConnectionError::Protocol("Invalid server handshake".into()))?;

        debug!(
            server_version = %server_handshake.server_version,
            "Received server handshake"
        );

        let auth_response =
            compute_auth_response(&credentials.password, &server_handshake.auth_plugin_data());
        let caps = capabilities::DEFAULT_CAPABILITIES & server_handshake.capability_flags;

        let response = HandshakeResponse {
            capability_flags: caps,
            max_packet_size: 16 * 1024 * 1024,
            character_set: 0x21, // utf8_general_ci
            username: credentials.user.clone(),
            auth_response,
            database: None,
            auth_plugin_name: server_handshake.auth_plugin_name.clone(),
        };

        framed
            .send(response.encode(1))
            .await
            .map_err(|e| ConnectionError::Io(e.to_string()))?;

        let reply = framed
            .next()
            .await
            .ok_or(ConnectionError::Disconnected)?
            .map_err(|e| ConnectionError::Io(e.to_string()))?;

        if is_err_packet(&reply.payload) {
            let err = ErrPacket::parse(&reply.payload, caps)
                .unwrap_or_else(|| ErrPacket::new(1045, "28000", "Access denied"));
            error!(
                addr = %addr,
                error_code = err.error_code,
                error_message = %err.error_message,
                "Authentication failed"
            );
            return Err(ConnectionError::from(err));
        }

        if !is_ok_packet(&reply.payload) {
            return Err(ConnectionError::Protocol(
                "Expected OK packet after authentication".into(),
            ));
        }

        debug!(addr = %addr, "Authentication successful");

        Ok(Self {
            framed,
            capabilities: caps,
        })
    }

    /// Run a text query and buffer the whole result set
    pub async fn query(&mut self, sql: &str) -> Result<ResultSet, ConnectionError> {
        let mut payload = vec![command::COM_QUERY];
        payload.extend_from_slice(sql.as_bytes());
        self.send(Packet::new(0, payload)).await?;

        let first = self.recv().await?;

        if is_err_packet(&first.payload) {
            return Err(self.server_error(&first));
        }

        if is_ok_packet(&first.payload) {
            // Statement without a result set
            return Ok(ResultSet::default());
        }

        let (column_count, _) = parse_length_encoded_int(&first.payload)
            .ok_or_else(|| ConnectionError::Protocol("Invalid column count".into()))?;
        let column_count = column_count as usize;

        let mut columns = Vec::with_capacity(column_count);
        for _ in 0..column_count {
            let def = self.recv().await?;
            let name = parse_column_name(&def.payload)
                .map_err(|e| ConnectionError::Protocol(format!("column definition: {}", e)))?;
            columns.push(name);
        }

        let mut result = ResultSet::new(columns);

        // EOF after column definitions; tolerate servers that skip it
        let mut pending = {
            let packet = self.recv().await?;
            if is_eof_packet(&packet.payload) {
                None
            } else {
                Some(packet)
            }
        };

        loop {
            let packet = match pending.take() {
                Some(p) => p,
                None => self.recv().await?,
            };

            if is_eof_packet(&packet.payload) {
                break;
            }
            if is_err_packet(&packet.payload) {
                return Err(self.server_error(&packet));
            }

            let row = parse_text_row(&packet.payload, column_count)
                .map_err(|e| ConnectionError::Protocol(format!("row: {}", e)))?;
            result.rows.push(row);
        }

        debug!(
            columns = result.columns.len(),
            rows = result.rows.len(),
            "Query complete"
        );
        Ok(result)
    }

    /// Send COM_QUIT and drop the connection
    pub async fn close(mut self) {
        let _ = self.framed.send(Packet::new(0, vec![command::COM_QUIT])).await;
    }

    async fn send(&mut self, packet: Packet) -> Result<(), ConnectionError> {
        self.framed
            .send(packet)
            .await
            .map_err(|e| ConnectionError::Io(e.to_string()))
    }

    async fn recv(&mut self) -> Result<Packet, ConnectionError> {
        match self.framed.next().await {
            Some(Ok(packet)) => Ok(packet),
            Some(Err(e)) => Err(ConnectionError::Io(e.to_string())),
            None => Err(ConnectionError::Disconnected),
        }
    }

    fn server_error(&self, packet: &Packet) -> ConnectionError {
        ErrPacket::parse(&packet.payload, self.capabilities)
            .map(ConnectionError::from)
            .unwrap_or_else(|| ConnectionError::Protocol("Malformed error packet".into()))
    }
}

/// Connection errors
///
/// Display follows the `mysql` command-line client (`ERROR <code> (<state>): ...`)
/// so the text is recognizable in reports.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ConnectionError {
    #[error("ERROR 2003 (HY000): Can't connect to MySQL server on '{addr}' ({reason})")]
    Connect { addr: String, reason: String },

    #[error("ERROR 2013 (HY000): Lost connection to MySQL server ({0})")]
    Io(String),

    #[error("ERROR 2013 (HY000): Lost connection to MySQL server during query")]
    Disconnected,

    #[error("ERROR 2027 (HY000): Malformed packet ({0})")]
    Protocol(String),

    #[error("ERROR {code} ({sql_state}): {message}")]
    Server {
        code: u16,
        sql_state: String,
        message: String,
    },
}

impl ConnectionError {
    /// MySQL error code of this failure
    pub fn code(&self) -> u16 {
        match self {
            ConnectionError::Connect { .. } => client_error::CONN_HOST_ERROR,
            ConnectionError::Io(_) | ConnectionError::Disconnected => client_error::SERVER_LOST,
            ConnectionError::Protocol(_) => client_error::MALFORMED_PACKET,
            ConnectionError::Server { code, .. } => *code,
        }
    }
}

impl From<ErrPacket> for ConnectionError {
    fn from(err: ErrPacket) -> Self {
        ConnectionError::Server {
            code: err.error_code,
            sql_state: err.sql_state,
            message: err.error_message,
        }
    }
}
