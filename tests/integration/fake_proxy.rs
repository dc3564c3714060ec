//! In-process stand-in for a mysql-proxy port
//!
//! Speaks just enough of the server side of the protocol for the monitor:
//! the initial handshake, an authentication verdict, and one canned result
//! set for every query.

use bytes::Bytes;
use futures::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;
use tokio_util::codec::Framed;

use athena_monitor::protocol::handshake::encode_length_encoded_int;
use athena_monitor::protocol::resultset::{encode_column_definition, encode_text_row};
use athena_monitor::protocol::{
    capabilities, command, ErrPacket, InitialHandshake, OkPacket, Packet, PacketCodec,
};

pub const BACKEND_COLUMNS: [&str; 6] = [
    "backend_ndx",
    "address",
    "state",
    "type",
    "uuid",
    "connected_clients",
];

/// How the fake answers
#[derive(Debug, Clone)]
pub enum Behavior {
    /// Accept any login and answer queries with these backend rows
    Serve(Vec<[&'static str; 6]>),
    /// Reject every login with ERR 1045
    RejectLogin,
}

pub struct FakeProxy {
    pub port: u16,
    task: JoinHandle<()>,
}

impl FakeProxy {
    pub async fn start(behavior: Behavior) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let task = tokio::spawn(async move {
            let mut connection_id = 1;
            while let Ok((stream, _)) = listener.accept().await {
                let behavior = behavior.clone();
                tokio::spawn(serve(stream, connection_id, behavior));
                connection_id += 1;
            }
        });

        Self { port, task }
    }
}

impl Drop for FakeProxy {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// A port with nothing listening on it
pub async fn closed_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap().port()
}

/// Backend row in listing order
pub fn backend(
    index: &'static str,
    address: &'static str,
    state: &'static str,
    role: &'static str,
) -> [&'static str; 6] {
    [index, address, state, role, "", "0"]
}

async fn serve(stream: TcpStream, connection_id: u32, behavior: Behavior) {
    let caps = capabilities::DEFAULT_CAPABILITIES;
    let mut framed = Framed::new(stream, PacketCodec);

    let handshake = InitialHandshake::new(connection_id, "5.0.99-agent-admin");
    if framed.send(handshake.encode()).await.is_err() {
        return;
    }

    // Handshake response, contents ignored
    if !matches!(framed.next().await, Some(Ok(_))) {
        return;
    }

    let rows = match behavior {
        Behavior::RejectLogin => {
            let err = ErrPacket::new(1045, "28000", "Access denied for user");
            let _ = framed.send(err.encode(2, caps)).await;
            return;
        }
        Behavior::Serve(rows) => rows,
    };

    if framed.send(OkPacket::new().encode(2, caps)).await.is_err() {
        return;
    }

    while let Some(Ok(packet)) = framed.next().await {
        match packet.payload.first() {
            Some(&command::COM_QUERY) => {
                for reply in result_set(&rows) {
                    if framed.send(reply).await.is_err() {
                        return;
                    }
                }
            }
            _ => return,
        }
    }
}

fn result_set(rows: &[[&'static str; 6]]) -> Vec<Packet> {
    let mut packets = Vec::new();
    let mut seq = 1u8;

    let mut count = bytes::BytesMut::new();
    encode_length_encoded_int(&mut count, BACKEND_COLUMNS.len() as u64);
    packets.push(Packet::new(seq, count.freeze()));

    for name in BACKEND_COLUMNS {
        seq += 1;
        packets.push(encode_column_definition(seq, name));
    }

    seq += 1;
    packets.push(eof(seq));

    for row in rows {
        seq += 1;
        let values: Vec<Option<&str>> = row
            .iter()
            .map(|v| if v.is_empty() { None } else { Some(*v) })
            .collect();
        packets.push(encode_text_row(seq, &values));
    }

    seq += 1;
    packets.push(eof(seq));
    packets
}

fn eof(seq: u8) -> Packet {
    Packet::new(seq, Bytes::from_static(&[0xFE, 0x00, 0x00, 0x02, 0x00]))
}
