//! Incremental frame decoding
//!
//! Bytes from the unit arrive in arbitrary chunks. [`FrameDecoder`] keeps the
//! residual bytes between calls and turns them into [`Message`]s; the same
//! scanner backs [`ComfoairCodec`] for use with `tokio_util::codec::Framed`.
//!
//! Malformed frames never stop the stream: they come out as invalid
//! responses, and bytes that do not start a marker are skipped one at a time.

use bytes::{Buf, BytesMut};
use serde::ser::{SerializeMap, SerializeStruct};
use serde::{Serialize, Serializer};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_util::codec::{Decoder, Encoder, Framed};
use tracing::{debug, trace};

use super::commands::{self, FieldSpec};
use super::error::DecodeError;
use super::frame::{self, Frame};
use super::params::Value;
use super::{Params, ProtocolError, ACK, END, START};

/// A decoded message from the unit
#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    /// Bare acknowledgement
    Ack,
    /// Data frame, valid or not
    Response(Response),
}

impl Message {
    /// Check if this is a bare acknowledgement
    pub fn is_ack(&self) -> bool {
        matches!(self, Message::Ack)
    }

    /// Data frame, if this is one
    pub fn as_response(&self) -> Option<&Response> {
        match self {
            Message::Response(r) => Some(r),
            Message::Ack => None,
        }
    }

    /// Consume into the data frame, if this is one
    pub fn into_response(self) -> Option<Response> {
        match self {
            Message::Response(r) => Some(r),
            Message::Ack => None,
        }
    }
}

/// A data frame received from the unit
#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    /// Opcode of the frame
    pub opcode: [u8; 2],
    /// Label of the command the opcode belongs to, if known
    pub description: Option<&'static str>,
    /// Decoded fields, empty for invalid frames and unknown opcodes
    pub payload: Payload,
    /// Why the frame was rejected; `None` for valid frames
    pub error: Option<DecodeError>,
}

impl Response {
    fn invalid(opcode: [u8; 2], error: DecodeError) -> Self {
        Self {
            opcode,
            description: None,
            payload: Payload::default(),
            error: Some(error),
        }
    }

    /// Check if the frame passed length, checksum and field checks
    pub fn is_valid(&self) -> bool {
        self.error.is_none()
    }

    /// Decoded value of field `name`, `None` if missing or reported unknown
    pub fn value(&self, name: &str) -> Option<&Value> {
        self.payload.get(name).and_then(|f| f.value.as_ref())
    }
}

impl Serialize for Response {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut s = serializer.serialize_struct("Response", 4)?;
        s.serialize_field("valid", &self.is_valid())?;
        s.serialize_field("description", &self.description)?;
        s.serialize_field("payload", &self.payload)?;
        s.serialize_field("error", &self.error.as_ref().map(|e| e.to_string()))?;
        s.end()
    }
}

/// One decoded response field
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Field {
    /// Field key
    #[serde(skip)]
    pub name: &'static str,
    /// `None` when the unit reports the value as unknown
    pub value: Option<Value>,
    /// Human readable label
    pub label: &'static str,
    /// Unit of the value, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit: Option<&'static str>,
}

/// Decoded fields in wire order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Payload {
    fields: Vec<Field>,
}

impl Payload {
    /// Field named `name`
    pub fn get(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Fields in wire order
    pub fn iter(&self) -> impl Iterator<Item = &Field> {
        self.fields.iter()
    }

    /// Number of fields
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Check if there are no fields
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl Serialize for Payload {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.fields.len()))?;
        for field in &self.fields {
            map.serialize_entry(field.name, field)?;
        }
        map.end()
    }
}

fn decode_fields(specs: &[FieldSpec], data: &[u8]) -> Result<Payload, DecodeError> {
    let mut fields = Vec::with_capacity(specs.len());
    let mut position = 0;
    for spec in specs {
        let end = (position + spec.length).min(data.len());
        let raw = &data[position.min(end)..end];
        if raw.len() < spec.length {
            return Err(DecodeError::Field(super::error::FieldError::Truncated {
                field: spec.name,
                expected: spec.length,
                actual: raw.len(),
            }));
        }
        fields.push(Field {
            name: spec.name,
            value: spec.reader.read(spec.name, raw)?,
            label: spec.label,
            unit: spec.unit,
        });
        position += spec.length;
    }
    Ok(Payload { fields })
}

/// Parse the bytes strictly between START and END
fn parse_payload(payload: &[u8]) -> Response {
    let opcode = [
        payload.first().copied().unwrap_or(0),
        payload.get(1).copied().unwrap_or(0),
    ];
    let declared = payload.get(2).copied();

    // A zero length byte means the real length follows in another byte.
    // That encoding is undocumented, so the frame is dropped as invalid.
    if declared == Some(0) {
        return Response::invalid(opcode, DecodeError::ZeroLength);
    }
    let declared = match declared {
        Some(len) if payload.len() >= 4 => len,
        other => {
            return Response::invalid(
                opcode,
                DecodeError::LengthMismatch {
                    declared: other.unwrap_or(0),
                    actual: 0,
                },
            )
        }
    };

    let data = frame::unescape(&payload[3..payload.len() - 1]);
    if data.len() != declared as usize {
        return Response::invalid(
            opcode,
            DecodeError::LengthMismatch {
                declared,
                actual: data.len(),
            },
        );
    }

    let received = payload[payload.len() - 1];
    let expected = frame::frame_checksum(opcode, &data);
    if received != expected {
        return Response::invalid(
            opcode,
            DecodeError::ChecksumInvalid {
                expected,
                actual: received,
            },
        );
    }

    // Unknown opcodes are tolerated with an empty payload
    let Some(command) = commands::by_response_opcode(opcode) else {
        trace!(?opcode, "response for unknown opcode");
        return Response {
            opcode,
            description: None,
            payload: Payload::default(),
            error: None,
        };
    };

    match decode_fields(command.fields, &data) {
        Ok(payload) => Response {
            opcode,
            description: Some(command.label),
            payload,
            error: None,
        },
        Err(e) => Response::invalid(opcode, e),
    }
}

fn find_marker(haystack: &[u8], marker: [u8; 2]) -> Option<usize> {
    haystack.windows(2).position(|w| w == marker)
}

/// Pull the next message out of `src`, consuming what it used
///
/// Returns `None` when more bytes are needed. Acks are consumed but only
/// returned when `pass_acks` is set.
fn decode_message(src: &mut BytesMut, pass_acks: bool) -> Option<Message> {
    while src.len() >= 2 {
        if src[..2] == ACK {
            src.advance(2);
            if pass_acks {
                trace!("RX ack");
                return Some(Message::Ack);
            }
            continue;
        }

        if src[..2] == START {
            // Wait for the rest of a partial frame
            let end = find_marker(&src[2..], END)? + 2;
            let response = parse_payload(&src[2..end]);
            trace!(bytes = end + 2, opcode = ?response.opcode, "RX frame");
            if let Some(err) = &response.error {
                debug!(opcode = ?response.opcode, "invalid frame: {}", err);
            }
            src.advance(end + 2);
            return Some(Message::Response(response));
        }

        trace!(byte = src[0], "skipping unsynchronised byte");
        src.advance(1);
    }
    None
}

/// Stateful decoder that accepts byte chunks of any size
///
/// ```
/// use comfoair_core::protocol::FrameDecoder;
///
/// let mut decoder = FrameDecoder::new();
/// let messages = decoder.push(&[0x07, 0xF3]);
/// assert_eq!(messages.len(), 1);
/// assert!(messages[0].is_ack());
/// ```
#[derive(Debug)]
pub struct FrameDecoder {
    buffer: BytesMut,
    pass_acks: bool,
}

impl FrameDecoder {
    /// Create a decoder that reports acks
    pub fn new() -> Self {
        Self::with_pass_acks(true)
    }

    /// Create a decoder, optionally swallowing acks
    pub fn with_pass_acks(pass_acks: bool) -> Self {
        Self {
            buffer: BytesMut::with_capacity(256),
            pass_acks,
        }
    }

    /// Append bytes without decoding
    pub fn extend(&mut self, chunk: &[u8]) {
        self.buffer.extend_from_slice(chunk);
    }

    /// Decode the next message from the buffered bytes
    pub fn next_message(&mut self) -> Option<Message> {
        decode_message(&mut self.buffer, self.pass_acks)
    }

    /// Lazily drain every complete message currently buffered
    pub fn messages(&mut self) -> impl Iterator<Item = Message> + '_ {
        std::iter::from_fn(move || self.next_message())
    }

    /// Append `chunk` and return all messages it completes
    pub fn push(&mut self, chunk: &[u8]) -> Vec<Message> {
        self.extend(chunk);
        self.messages().collect()
    }

    /// Number of buffered, not yet decoded bytes
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    /// Check if no bytes are buffered
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Drop all buffered bytes
    pub fn clear(&mut self) {
        self.buffer.clear();
    }
}

impl Default for FrameDecoder {
    fn default() -> Self {
        Self::new()
    }
}

/// A command to send, as accepted by [`ComfoairCodec`]
#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    /// Command name from the catalog
    pub name: String,
    /// Named arguments
    pub params: Params,
}

impl Request {
    /// Request command `name` with `params`
    pub fn new(name: impl Into<String>, params: Params) -> Self {
        Self {
            name: name.into(),
            params,
        }
    }
}

/// `tokio_util` codec for the ComfoAir wire format
#[derive(Debug, Clone, Copy)]
pub struct ComfoairCodec {
    pass_acks: bool,
}

impl ComfoairCodec {
    /// Create a codec, optionally swallowing acks
    pub fn new(pass_acks: bool) -> Self {
        Self { pass_acks }
    }
}

impl Default for ComfoairCodec {
    fn default() -> Self {
        Self::new(true)
    }
}

impl Decoder for ComfoairCodec {
    type Item = Message;
    type Error = ProtocolError;

    // Never returns an error: a decoder error would terminate the stream.
    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Message>, ProtocolError> {
        Ok(decode_message(src, self.pass_acks))
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Message>, ProtocolError> {
        let message = decode_message(src, self.pass_acks);
        if message.is_none() && !src.is_empty() {
            trace!(bytes = src.len(), "discarding partial frame at end of stream");
            src.clear();
        }
        Ok(message)
    }
}

impl Encoder<Frame> for ComfoairCodec {
    type Error = ProtocolError;

    fn encode(&mut self, frame: Frame, dst: &mut BytesMut) -> Result<(), ProtocolError> {
        let start = dst.len();
        frame.encode_to(dst);
        trace!(opcode = ?frame.opcode(), bytes = ?&dst[start..], "TX frame");
        Ok(())
    }
}

impl Encoder<Request> for ComfoairCodec {
    type Error = ProtocolError;

    fn encode(&mut self, request: Request, dst: &mut BytesMut) -> Result<(), ProtocolError> {
        let frame = frame::build(&request.name, &request.params)?;
        self.encode(frame, dst)
    }
}

/// Wrap a byte stream for direct message-level access
///
/// This bypasses the request queue; the caller is responsible for not
/// interleaving requests.
pub fn framed<T>(io: T, pass_acks: bool) -> Framed<T, ComfoairCodec>
where
    T: AsyncRead + AsyncWrite,
{
    Framed::new(io, ComfoairCodec::new(pass_acks))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::ParamValue;
    use pretty_assertions::assert_eq;

    /// Build a response frame for `opcode` with unescaped `data`
    fn response_frame(opcode: [u8; 2], data: &[u8]) -> Vec<u8> {
        Frame::new(opcode, data.to_vec()).unwrap().to_bytes()
    }

    fn single_response(bytes: &[u8]) -> Response {
        let mut decoder = FrameDecoder::new();
        let mut messages = decoder.push(bytes);
        assert_eq!(messages.len(), 1, "expected exactly one message");
        messages.remove(0).into_response().expect("expected a response")
    }

    #[test]
    fn test_ack() {
        let mut decoder = FrameDecoder::new();
        assert_eq!(decoder.push(&[0x07, 0xF3, 0x07, 0xF3]), vec![Message::Ack, Message::Ack]);
        assert!(decoder.is_empty());
    }

    #[test]
    fn test_acks_suppressed() {
        let mut decoder = FrameDecoder::with_pass_acks(false);
        let mut bytes = vec![0x07, 0xF3];
        bytes.extend(response_frame([0x00, 0x10], &[0x28, 0x29, 0x2A, 0x2B]));
        let messages = decoder.push(&bytes);
        assert_eq!(messages.len(), 1);
        assert!(!messages[0].is_ack());
    }

    #[test]
    fn test_temperatures_comfort_field() {
        let data = [0x28, 0x10, 0x53, 0x50, 0x20, 0x0F, 0x28, 0x28, 0x28];
        let response = single_response(&response_frame([0x00, 0xD2], &data));
        assert!(response.is_valid());
        assert_eq!(response.description, Some("Temperatures"));
        assert_eq!(response.value("comfort"), Some(&Value::Float(0.0)));
        assert_eq!(response.value("outsideAir"), Some(&Value::Float(-12.0)));
        assert_eq!(response.value("supplyAir"), Some(&Value::Float(21.5)));
        let field = response.payload.get("comfort").unwrap();
        assert_eq!(field.unit, Some("°C"));
        assert_eq!(response.payload.len(), 9);
    }

    #[test]
    fn test_zero_length_frame() {
        let response = single_response(&[0x07, 0xF0, 0x00, 0xD2, 0x00, 0x7F, 0x07, 0x0F]);
        assert_eq!(response.error, Some(DecodeError::ZeroLength));
        assert_eq!(response.error.unwrap().to_string(), "frame length is null");
    }

    #[test]
    fn test_length_mismatch() {
        let mut bytes = response_frame([0x00, 0x10], &[0x28, 0x29, 0x2A, 0x2B]);
        bytes[4] = 0x05;
        let response = single_response(&bytes);
        assert!(matches!(response.error, Some(DecodeError::LengthMismatch { declared: 5, actual: 4 })));
        assert_eq!(response.error.unwrap().to_string(), "invalid frame length");
    }

    #[test]
    fn test_truncated_frame() {
        let response = single_response(&[0x07, 0xF0, 0x07, 0x0F]);
        assert!(!response.is_valid());
    }

    #[test]
    fn test_any_corrupted_byte_fails_checksum() {
        let data = [0x28, 0x29, 0x2A, 0x2B];
        let original = response_frame([0x00, 0x10], &data);
        // opcode (2..4) and data (5..9); the length byte is covered separately
        for index in [2, 3, 5, 6, 7, 8] {
            let mut bytes = original.clone();
            bytes[index] ^= 0x01;
            let response = single_response(&bytes);
            assert_eq!(
                response.error.as_ref().map(|e| e.to_string()),
                Some("checksum invalid".to_string()),
                "byte {} corrupted",
                index
            );
        }
    }

    #[test]
    fn test_corrupted_length_with_matching_data_fails_checksum() {
        // Length 3 declared and 3 data bytes sent, but checksum built for length 4
        let mut bytes = response_frame([0x00, 0x10], &[0x28, 0x29, 0x2A, 0x2B]);
        bytes[4] = 0x03;
        bytes.remove(8);
        let response = single_response(&bytes);
        assert_eq!(
            response.error.map(|e| e.to_string()),
            Some("checksum invalid".to_string())
        );
    }

    #[test]
    fn test_escaped_data_roundtrip() {
        // 0x07 inside the data is stuffed on the wire and restored on decode
        let data = [0x07, 0x29, 0x2A, 0x2B];
        let bytes = response_frame([0x00, 0x10], &data);
        assert_eq!(&bytes[5..7], &[0x07, 0x07]);
        let response = single_response(&bytes);
        assert!(response.is_valid(), "{:?}", response.error);
        assert_eq!(response.value("outsideAir"), Some(&Value::Float(0x07 as f64 / 2.0 - 20.0)));
    }

    #[test]
    fn test_resync_after_garbage() {
        let mut bytes = vec![0x13, 0x07, 0x99];
        bytes.extend(response_frame([0x00, 0x10], &[0x28, 0x29, 0x2A, 0x2B]));
        let mut decoder = FrameDecoder::new();
        let messages = decoder.push(&bytes);
        assert_eq!(messages.len(), 1);
        assert!(messages[0].as_response().unwrap().is_valid());
        assert!(decoder.is_empty());
    }

    #[test]
    fn test_partial_delivery_matches_single_delivery() {
        let bytes = response_frame([0x00, 0xD2], &[0x28, 0x10, 0x53, 0x50, 0x20, 0x0F, 0x28, 0x28, 0x28]);
        let expected = FrameDecoder::new().push(&bytes);

        for split in 1..bytes.len() {
            let mut decoder = FrameDecoder::new();
            let mut messages = decoder.push(&bytes[..split]);
            assert!(messages.is_empty(), "premature message at split {}", split);
            messages.extend(decoder.push(&bytes[split..]));
            assert_eq!(messages, expected, "split at {}", split);
        }

        let mut decoder = FrameDecoder::new();
        let mut messages = Vec::new();
        for b in &bytes {
            messages.extend(decoder.push(std::slice::from_ref(b)));
        }
        assert_eq!(messages, expected);
    }

    #[test]
    fn test_unknown_opcode_is_valid_and_empty() {
        let response = single_response(&response_frame([0x12, 0x34], &[0x01]));
        assert!(response.is_valid());
        assert!(response.payload.is_empty());
        assert_eq!(response.description, None);
    }

    #[test]
    fn test_short_payload_reports_parse_error() {
        let response = single_response(&response_frame([0x00, 0xD2], &[0x28, 0x29]));
        let message = response.error.unwrap().to_string();
        assert!(message.starts_with("error while parsing: "), "{}", message);
    }

    #[test]
    fn test_invalid_frame_does_not_block_following_frame() {
        let mut bytes = vec![0x07, 0xF0, 0x00, 0xD2, 0x00, 0x7F, 0x07, 0x0F];
        bytes.extend([0x07, 0xF3]);
        let messages = FrameDecoder::new().push(&bytes);
        assert_eq!(messages.len(), 2);
        assert!(!messages[0].as_response().unwrap().is_valid());
        assert!(messages[1].is_ack());
    }

    #[test]
    fn test_codec_encodes_requests() {
        let mut codec = ComfoairCodec::default();
        let mut dst = BytesMut::new();
        let params: Params = [("level".to_string(), ParamValue::from("high"))].into();
        codec.encode(Request::new("setLevel", params), &mut dst).unwrap();
        assert_eq!(&dst[..], &[0x07, 0xF0, 0x00, 0x99, 0x01, 0x04, 0x4B, 0x07, 0x0F]);

        let err = codec.encode(Request::new("nope", Params::new()), &mut dst);
        assert!(matches!(err, Err(ProtocolError::UnknownCommand(_))));
    }

    #[test]
    fn test_codec_decode_eof_discards_partial_frame() {
        let mut codec = ComfoairCodec::default();
        let mut src = BytesMut::from(&[0x07, 0xF0, 0x00, 0xD2, 0x01][..]);
        assert_eq!(codec.decode(&mut src).unwrap(), None);
        assert_eq!(src.len(), 5);
        assert_eq!(codec.decode_eof(&mut src).unwrap(), None);
        assert!(src.is_empty());
    }

    #[test]
    fn test_response_serializes_like_catalog() {
        let response = single_response(&response_frame([0x00, 0x10], &[0x28, 0x29, 0x2A, 0x2B]));
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["valid"], true);
        assert_eq!(json["description"], "Temperature states");
        assert_eq!(json["payload"]["outsideAir"]["value"], 0.0);
        assert_eq!(json["payload"]["outsideAir"]["unit"], "°C");
    }
}
