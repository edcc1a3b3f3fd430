//! # ComfoAir Core Library
//!
//! Driver for the RS232 protocol spoken by ComfoAir home ventilation units.

#![warn(missing_docs)]
#![cfg_attr(docsrs, feature(doc_cfg))]

//!
//! This library provides:
//! - Frame encoding with byte stuffing and the additive checksum
//! - Incremental decoding of acknowledgements and data frames
//! - A catalog of the unit's commands with typed field readers
//! - A single-flight request queue with per-command timeouts and a
//!   reconnecting watchdog
//!
//! ## Example
//!
//! ```rust,ignore
//! use comfoair_core::prelude::*;
//!
//! let session = Session::serial(SessionConfig::new("/dev/ttyUSB0"))?;
//!
//! let reply = session.get_temperatures().await?;
//! if let Some(response) = reply.as_response() {
//!     println!("{}", serde_json::to_string(response)?);
//! }
//!
//! session.set_level(Level::Middle).await?;
//! session.close().await;
//! ```

pub mod protocol;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::protocol::{
        list_ports, params_from_json, Completion, Level, Message, ParamValue, Params,
        ProtocolError, ResetOptions, Response, Session, SessionConfig, SessionEvent,
        SessionState, Value, VentilationLevels,
    };
}

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
