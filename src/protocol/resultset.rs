//! Text protocol result sets
//!
//! Decoding of `COM_QUERY` responses: column count, column definitions,
//! EOF, then rows of length-encoded strings terminated by EOF (or ERR).

use bytes::{BufMut, BytesMut};
use serde::Serialize;

use super::handshake::encode_length_encoded_int;
use super::packet::Packet;

/// Error decoding a result set packet
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    #[error("Empty payload")]
    Empty,
    #[error("Invalid length encoding")]
    InvalidLength,
    #[error("Truncated string")]
    Truncated,
    #[error("Invalid UTF-8")]
    InvalidUtf8,
}

/// A fully buffered text result set
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ResultSet {
    /// Column names in server order
    pub columns: Vec<String>,
    /// Row values; `None` is SQL NULL
    pub rows: Vec<Vec<Option<String>>>,
}

impl ResultSet {
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Parse a length-encoded integer, returning the value and bytes consumed
pub fn parse_length_encoded_int(data: &[u8]) -> Option<(u64, usize)> {
    if data.is_empty() {
        return None;
    }
    match data[0] {
        0..=0xFA => Some((data[0] as u64, 1)),
        0xFC if data.len() >= 3 => Some((u16::from_le_bytes([data[1], data[2]]) as u64, 3)),
        0xFD if data.len() >= 4 => Some((
            u32::from_le_bytes([data[1], data[2], data[3], 0]) as u64,
            4,
        )),
        0xFE if data.len() >= 9 => Some((
            u64::from_le_bytes([
                data[1], data[2], data[3], data[4], data[5], data[6], data[7], data[8],
            ]),
            9,
        )),
        _ => None,
    }
}

/// Parse a length-encoded string and return the total bytes consumed
///
/// `0xFB` is the NULL marker and decodes to `None`.
pub fn parse_length_encoded_string(data: &[u8]) -> Result<(Option<String>, usize), DecodeError> {
    if data.is_empty() {
        return Err(DecodeError::Empty);
    }
    if data[0] == 0xFB {
        return Ok((None, 1));
    }

    let (len, header_size) = parse_length_encoded_int(data).ok_or(DecodeError::InvalidLength)?;
    let len = len as usize;

    if data.len() < header_size + len {
        return Err(DecodeError::Truncated);
    }

    let s = String::from_utf8(data[header_size..header_size + len].to_vec())
        .map_err(|_| DecodeError::InvalidUtf8)?;

    Ok((Some(s), header_size + len))
}

/// Extract the column name from a column definition packet
///
/// Layout: catalog, schema, table, org_table, name, org_name, fixed fields.
pub fn parse_column_name(payload: &[u8]) -> Result<String, DecodeError> {
    let mut offset = 0;
    for _ in 0..4 {
        let (_, used) = parse_length_encoded_string(&payload[offset..])?;
        offset += used;
    }
    let (name, _) = parse_length_encoded_string(&payload[offset..])?;
    Ok(name.unwrap_or_default())
}

/// Decode one text protocol row with `columns` values
///
/// The row is decoded as far as the payload goes; a server sending fewer
/// values than announced columns produces a shorter row, which callers
/// validate against their own expectations.
pub fn parse_text_row(payload: &[u8], columns: usize) -> Result<Vec<Option<String>>, DecodeError> {
    let mut values = Vec::with_capacity(columns);
    let mut offset = 0;
    while offset < payload.len() && values.len() < columns {
        let (value, used) = parse_length_encoded_string(&payload[offset..])?;
        values.push(value);
        offset += used;
    }
    Ok(values)
}

/// Encode a column definition packet for a VARCHAR column
pub fn encode_column_definition(sequence_id: u8, name: &str) -> Packet {
    let mut buf = BytesMut::new();
    for part in ["def", "", "", "", name, name] {
        encode_length_encoded_str(&mut buf, part);
    }
    buf.put_u8(0x0c); // length of fixed fields
    buf.put_u16_le(0x21); // utf8_general_ci
    buf.put_u32_le(255); // column length
    buf.put_u8(0xFD); // MYSQL_TYPE_VAR_STRING
    buf.put_u16_le(0); // flags
    buf.put_u8(0); // decimals
    buf.put_u16_le(0); // filler
    Packet::new(sequence_id, buf.freeze())
}

/// Encode a text protocol row
pub fn encode_text_row(sequence_id: u8, values: &[Option<&str>]) -> Packet {
    let mut buf = BytesMut::new();
    for value in values {
        match value {
            Some(v) => encode_length_encoded_str(&mut buf, v),
            None => buf.put_u8(0xFB),
        }
    }
    Packet::new(sequence_id, buf.freeze())
}

fn encode_length_encoded_str(buf: &mut BytesMut, value: &str) {
    encode_length_encoded_int(buf, value.len() as u64);
    buf.extend_from_slice(value.as_bytes());
}
