//! Frame encoding
//!
//! Frame format:
//! - 2 bytes: START marker `07 F0`
//! - 2 bytes: opcode
//! - 1 byte: data length (unescaped)
//! - N bytes: data, every `07` sent as `07 07`
//! - 1 byte: checksum over unescaped opcode + length + data
//! - 2 bytes: END marker `07 0F`

use bytes::{BufMut, BytesMut};

use super::{commands, Params, ProtocolError, END, ESCAPE, START};

/// Seed of the additive checksum
pub const CHECKSUM_SEED: u8 = 173;

/// Largest data section a single length byte can describe
pub const MAX_DATA_LEN: usize = u8::MAX as usize;

/// Checksum: `(173 + sum of bytes) mod 256`
pub fn checksum(bytes: &[u8]) -> u8 {
    bytes
        .iter()
        .fold(CHECKSUM_SEED, |sum, b| sum.wrapping_add(*b))
}

/// Append `data` to `dst`, doubling every escape byte
pub fn escape(data: &[u8], dst: &mut BytesMut) {
    for &b in data {
        dst.put_u8(b);
        if b == ESCAPE {
            dst.put_u8(ESCAPE);
        }
    }
}

/// Collapse every `07 07` pair back into a single `07`
///
/// A lone escape byte is kept as-is.
pub fn unescape(data: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(data.len());
    let mut i = 0;
    while i < data.len() {
        out.push(data[i]);
        if data[i] == ESCAPE && data.get(i + 1) == Some(&ESCAPE) {
            i += 2;
        } else {
            i += 1;
        }
    }
    out
}

/// Checksum of a frame with the given opcode and unescaped data
pub(crate) fn frame_checksum(opcode: [u8; 2], data: &[u8]) -> u8 {
    let header = checksum(&[opcode[0], opcode[1], data.len() as u8]);
    data.iter().fold(header, |sum, b| sum.wrapping_add(*b))
}

/// An unescaped protocol frame
///
/// Only constructed through [`Frame::new`], so the data always fits the
/// length byte.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    opcode: [u8; 2],
    data: Vec<u8>,
}

impl Frame {
    /// Create a frame, rejecting data that does not fit the length byte
    pub fn new(opcode: [u8; 2], data: Vec<u8>) -> Result<Self, ProtocolError> {
        if data.len() > MAX_DATA_LEN {
            return Err(ProtocolError::InvalidParameter {
                param: "data".to_string(),
                message: format!("{} bytes exceed the frame limit of {}", data.len(), MAX_DATA_LEN),
            });
        }
        Ok(Self { opcode, data })
    }

    /// Opcode of the frame
    pub fn opcode(&self) -> [u8; 2] {
        self.opcode
    }

    /// Unescaped data section
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Length byte as sent on the wire
    pub fn length(&self) -> u8 {
        self.data.len() as u8
    }

    /// Checksum over opcode, length and unescaped data
    pub fn checksum(&self) -> u8 {
        frame_checksum(self.opcode, &self.data)
    }

    /// Append the wire representation to `dst`
    pub fn encode_to(&self, dst: &mut BytesMut) {
        dst.reserve(self.data.len() * 2 + 8);
        dst.put_slice(&START);
        dst.put_slice(&self.opcode);
        dst.put_u8(self.length());
        escape(&self.data, dst);
        dst.put_u8(self.checksum());
        dst.put_slice(&END);
    }

    /// Wire representation as an owned buffer
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut dst = BytesMut::new();
        self.encode_to(&mut dst);
        dst.to_vec()
    }
}

/// Build the frame for command `name` from its parameters
///
/// Every argument the command declares must be present in `params`;
/// extra entries are ignored.
pub fn build(name: &str, params: &Params) -> Result<Frame, ProtocolError> {
    let command =
        commands::by_name(name).ok_or_else(|| ProtocolError::UnknownCommand(name.to_string()))?;

    let mut data = Vec::with_capacity(command.args.len());
    for arg in command.args {
        let value = params
            .get(arg.name)
            .ok_or_else(|| ProtocolError::MissingParameter {
                command: name.to_string(),
                param: arg.name.to_string(),
            })?;
        data.extend(arg.writer.write(arg.name, value)?);
    }

    Frame::new(command.opcode, data)
}

/// Encode command `name` straight to wire bytes
pub fn encode(name: &str, params: &Params) -> Result<Vec<u8>, ProtocolError> {
    Ok(build(name, params)?.to_bytes())
}
