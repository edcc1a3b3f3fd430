//! Serial Protocol Communication
//!
//! Implements the ComfoAir serial protocol: byte-stuffed frames with an
//! additive checksum, bare acknowledgements, and a single-flight request
//! queue on top.

pub mod codec;
pub mod commands;
mod error;
pub mod frame;
pub mod params;
pub mod serial;
pub mod session;

pub use codec::{framed, ComfoairCodec, Field, FrameDecoder, Message, Payload, Request, Response};
pub use commands::{CommandDescriptor, CommandInfo};
pub use error::{DecodeError, FieldError, ProtocolError};
pub use frame::Frame;
pub use params::{params_from_json, Level, ParamValue, Params, Value};
pub use serial::{list_ports, Connector, PortInfo, SerialConnector};
pub use session::{
    Completion, JobResult, ResetOptions, Session, SessionConfig, SessionEvent, SessionState,
    VentilationLevels,
};

/// Start of a data frame
pub const START: [u8; 2] = [0x07, 0xF0];

/// End of a data frame
pub const END: [u8; 2] = [0x07, 0x0F];

/// Standalone acknowledgement
pub const ACK: [u8; 2] = [0x07, 0xF3];

/// Byte doubled inside the data section
pub const ESCAPE: u8 = 0x07;

/// Default baud rate of the unit's RS232 port
pub const DEFAULT_BAUD_RATE: u32 = 9600;

/// Default time a single command may wait for its reply
pub const DEFAULT_JOB_TIMEOUT_MS: u64 = 1000;

/// Default time a command may occupy the head of the queue before the
/// connection is considered stalled
pub const DEFAULT_WATCHDOG_TIMEOUT_MS: u64 = 5000;

/// Default settle time after a forced reconnect
pub const DEFAULT_RECONNECT_DELAY_MS: u64 = 1000;

/// Maximum number of queued commands
pub const MAX_QUEUE_SIZE: usize = 30;
