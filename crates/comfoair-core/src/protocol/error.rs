//! Protocol errors

use thiserror::Error;

/// Errors that can occur while talking to the ventilation unit
#[derive(Error, Debug)]
pub enum ProtocolError {
    /// Command name not in the catalog
    #[error("Command \"{0}\" unknown")]
    UnknownCommand(String),

    /// A declared argument was not supplied
    #[error("Missing parameter '{param}' for command \"{command}\"")]
    MissingParameter {
        /// Command being encoded
        command: String,
        /// Argument that was not supplied
        param: String,
    },

    /// An argument or setting has an unusable value
    #[error("Invalid value for '{param}': {message}")]
    InvalidParameter {
        /// Offending argument or setting
        param: String,
        /// What is wrong with it
        message: String,
    },

    /// No reply within the per-command timeout
    #[error("Command \"{command}\" timeout exceeded")]
    Timeout {
        /// Command that went unanswered
        command: String,
    },

    /// A command held the queue past the watchdog timeout
    #[error("Queue timeout of {timeout_ms}ms exceeded, restarting connection")]
    QueueStall {
        /// Watchdog timeout that expired
        timeout_ms: u64,
    },

    /// The queue is at capacity
    #[error("Queue size of {capacity} exceeded, command \"{command}\" discarded")]
    QueueFull {
        /// Queue capacity
        capacity: usize,
        /// Command that was rejected
        command: String,
    },

    /// The session was closed
    #[error("Session is closed")]
    Closed,

    /// The transport is being recreated after a stall
    #[error("Session is reconnecting")]
    Reconnecting,

    /// The command was dropped before it completed
    #[error("Command was abandoned before completion")]
    Abandoned,

    /// No transport is open
    #[error("Not connected to ventilation unit")]
    NotConnected,

    /// Opening the serial port failed
    #[error("Serial port error: {0}")]
    SerialError(String),

    /// Transport read or write failed
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// Parameters could not be read from JSON
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Reasons a received frame is reported as invalid
///
/// These never terminate the decoder; they travel inside an invalid
/// [`Response`](super::Response).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// Declared length byte is zero
    #[error("frame length is null")]
    ZeroLength,

    /// Length byte does not match the data
    #[error("invalid frame length")]
    LengthMismatch {
        /// Length byte of the frame
        declared: u8,
        /// Unescaped data bytes received
        actual: usize,
    },

    /// Checksum byte does not match
    #[error("checksum invalid")]
    ChecksumInvalid {
        /// Checksum computed over the frame
        expected: u8,
        /// Checksum byte received
        actual: u8,
    },

    /// A field could not be decoded
    #[error("error while parsing: {0}")]
    Field(#[from] FieldError),
}

/// Failure of a single field reader
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FieldError {
    /// The data ends inside a field
    #[error("field '{field}' needs {expected} bytes, got {actual}")]
    Truncated {
        /// Field key
        field: &'static str,
        /// Bytes the field needs
        expected: usize,
        /// Bytes available
        actual: usize,
    },
}
