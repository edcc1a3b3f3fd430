//! Serial port handling
//!
//! The session only needs a byte stream; [`Connector`] is the seam that
//! produces one. [`SerialConnector`] opens the unit's RS232 port through
//! `tokio-serial`, tests plug in in-memory streams instead.

use serialport::{SerialPortInfo, SerialPortType};
use std::collections::HashMap;
#[cfg(target_os = "linux")]
use std::fs;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_serial::{DataBits, FlowControl, Parity, SerialPortBuilderExt, SerialStream, StopBits};
use tracing::debug;

use super::{ProtocolError, DEFAULT_BAUD_RATE};

/// Produces a fresh byte stream to the unit
///
/// Called once when a session starts and again after every forced
/// reconnect. The stream must not reorder or drop bytes.
pub trait Connector: Send + Sync + 'static {
    /// Byte stream to the unit
    type Stream: AsyncRead + AsyncWrite + Unpin + Send + 'static;

    /// Open a new stream
    fn connect(&self) -> Result<Self::Stream, ProtocolError>;
}

/// Opens a serial port at 8N1 without flow control
#[derive(Debug, Clone)]
pub struct SerialConnector {
    /// Serial port name
    pub port_name: String,
    /// Baud rate
    pub baud_rate: u32,
}

impl SerialConnector {
    /// Connector for `port_name`, 9600 baud unless given
    pub fn new(port_name: impl Into<String>, baud_rate: Option<u32>) -> Self {
        Self {
            port_name: port_name.into(),
            baud_rate: baud_rate.unwrap_or(DEFAULT_BAUD_RATE),
        }
    }
}

impl Connector for SerialConnector {
    type Stream = SerialStream;

    fn connect(&self) -> Result<SerialStream, ProtocolError> {
        if self.port_name.is_empty() {
            return Err(ProtocolError::SerialError("no serial port configured".to_string()));
        }
        debug!(port = %self.port_name, baud = self.baud_rate, "opening serial port");
        tokio_serial::new(&self.port_name, self.baud_rate)
            .data_bits(DataBits::Eight)
            .parity(Parity::None)
            .stop_bits(StopBits::One)
            .flow_control(FlowControl::None)
            .open_native_async()
            .map_err(|e| ProtocolError::SerialError(format!("{}: {}", self.port_name, e)))
    }
}

/// Information about an available serial port
#[derive(Debug, Clone)]
pub struct PortInfo {
    /// Port name (e.g., "/dev/ttyUSB0" or "COM3")
    pub name: String,

    /// USB vendor ID (if USB device)
    pub vid: Option<u16>,

    /// USB product ID (if USB device)
    pub pid: Option<u16>,

    /// Manufacturer name (if available)
    pub manufacturer: Option<String>,

    /// Product name (if available)
    pub product: Option<String>,
}

impl PortInfo {
    fn bare(name: String) -> Self {
        Self {
            name,
            vid: None,
            pid: None,
            manufacturer: None,
            product: None,
        }
    }
}

impl From<SerialPortInfo> for PortInfo {
    fn from(info: SerialPortInfo) -> Self {
        match info.port_type {
            SerialPortType::UsbPort(usb) => Self {
                name: info.port_name,
                vid: Some(usb.vid),
                pid: Some(usb.pid),
                manufacturer: usb.manufacturer,
                product: usb.product,
            },
            _ => Self::bare(info.port_name),
        }
    }
}

/// Sort key putting USB serial adapters (ttyUSB*) first, then ACM devices,
/// then everything else, numerically within each group
fn port_sort_key(name: &str) -> (u8, usize, String) {
    let basename = name.rsplit('/').next().unwrap_or(name);
    if let Some(rest) = basename.strip_prefix("ttyUSB") {
        return (0, rest.parse().unwrap_or(usize::MAX), basename.to_string());
    }
    if let Some(rest) = basename.strip_prefix("ttyACM") {
        return (1, rest.parse().unwrap_or(usize::MAX), basename.to_string());
    }
    (2, 0, basename.to_string())
}

/// List available serial ports in a stable order
pub fn list_ports() -> Vec<PortInfo> {
    let mut map: HashMap<String, PortInfo> = HashMap::new();
    for info in serialport::available_ports().unwrap_or_default() {
        let p = PortInfo::from(info);
        map.entry(p.name.clone()).or_insert(p);
    }

    // udev may not report adapters that are present in /dev
    #[cfg(target_os = "linux")]
    if let Ok(entries) = fs::read_dir("/dev") {
        for entry in entries.flatten() {
            if let Some(fname) = entry.file_name().to_str() {
                if fname.starts_with("ttyUSB") || fname.starts_with("ttyACM") {
                    let full = format!("/dev/{}", fname);
                    map.entry(full.clone()).or_insert_with(|| PortInfo::bare(full));
                }
            }
        }
    }

    let mut ports: Vec<PortInfo> = map.into_values().collect();
    ports.sort_by_key(|p| port_sort_key(&p.name));
    ports
}
