//! Parameter readers and writers
//!
//! Command arguments are encoded by a [`Writer`] and response fields are
//! decoded by a [`Reader`]. Both are plain tagged enums selected by the
//! static command tables, so dispatch never needs anything dynamic.
//!
//! All multi-byte values are big-endian and unsigned on the wire.

use byteorder::{BigEndian, ByteOrder};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use super::error::FieldError;
use super::ProtocolError;

/// Named parameters passed to a command
pub type Params = BTreeMap<String, ParamValue>;

/// A single command parameter as supplied by the caller
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    /// Flag
    Bool(bool),
    /// Integer
    Int(i64),
    /// Number with a fraction
    Float(f64),
    /// Text, also used for enumerated values
    Text(String),
}

impl ParamValue {
    /// Numeric view of the parameter, if it has one
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            ParamValue::Int(v) => Some(*v as f64),
            ParamValue::Float(v) => Some(*v),
            ParamValue::Text(s) => s.trim().parse().ok(),
            ParamValue::Bool(_) => None,
        }
    }

    /// Truthiness of the parameter (non-zero numbers and non-empty text are true)
    pub fn is_truthy(&self) -> bool {
        match self {
            ParamValue::Bool(v) => *v,
            ParamValue::Int(v) => *v != 0,
            ParamValue::Float(v) => *v != 0.0 && !v.is_nan(),
            ParamValue::Text(s) => !s.is_empty(),
        }
    }

    /// Key used to look the parameter up in an enumeration table
    fn as_key(&self) -> String {
        match self {
            ParamValue::Bool(v) => v.to_string(),
            ParamValue::Int(v) => v.to_string(),
            ParamValue::Float(v) if v.fract() == 0.0 && v.is_finite() => (*v as i64).to_string(),
            ParamValue::Float(v) => v.to_string(),
            ParamValue::Text(s) => s.clone(),
        }
    }
}

impl From<bool> for ParamValue {
    fn from(v: bool) -> Self {
        ParamValue::Bool(v)
    }
}

impl From<i64> for ParamValue {
    fn from(v: i64) -> Self {
        ParamValue::Int(v)
    }
}

impl From<i32> for ParamValue {
    fn from(v: i32) -> Self {
        ParamValue::Int(v as i64)
    }
}

impl From<u8> for ParamValue {
    fn from(v: u8) -> Self {
        ParamValue::Int(v as i64)
    }
}

impl From<f64> for ParamValue {
    fn from(v: f64) -> Self {
        ParamValue::Float(v)
    }
}

impl From<&str> for ParamValue {
    fn from(v: &str) -> Self {
        ParamValue::Text(v.to_string())
    }
}

impl From<String> for ParamValue {
    fn from(v: String) -> Self {
        ParamValue::Text(v)
    }
}

/// Build a parameter map from a JSON object
///
/// `null` yields an empty map.
pub fn params_from_json(value: serde_json::Value) -> Result<Params, ProtocolError> {
    if value.is_null() {
        return Ok(Params::new());
    }
    Ok(serde_json::from_value(value)?)
}

/// Ventilation level selectable with `setLevel`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    /// Automatic control
    Auto,
    /// Absent, lowest fan speed
    Away,
    /// Level 1
    Low,
    /// Level 2
    Middle,
    /// Level 3
    High,
}

impl Level {
    /// Lowercase name of the level
    pub fn as_str(&self) -> &'static str {
        match self {
            Level::Auto => "auto",
            Level::Away => "away",
            Level::Low => "low",
            Level::Middle => "middle",
            Level::High => "high",
        }
    }

    /// Byte sent on the wire
    pub fn wire_value(&self) -> u8 {
        match self {
            Level::Auto => 0x00,
            Level::Away => 0x01,
            Level::Low => 0x02,
            Level::Middle => 0x03,
            Level::High => 0x04,
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Level {
    type Err = ProtocolError;

    /// Accepts the level names as well as the numeric aliases `0`..`3`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "auto" => Ok(Level::Auto),
            "away" | "0" => Ok(Level::Away),
            "low" | "1" => Ok(Level::Low),
            "middle" | "2" => Ok(Level::Middle),
            "high" | "3" => Ok(Level::High),
            other => Err(ProtocolError::InvalidParameter {
                param: "level".to_string(),
                message: format!("unknown level: {}", other),
            }),
        }
    }
}

impl From<Level> for ParamValue {
    fn from(level: Level) -> Self {
        ParamValue::Text(level.as_str().to_string())
    }
}

/// Encoders for outgoing command arguments
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Writer {
    /// Fan level percentage, clamped to 0..=100
    LevelValue,
    /// Temperature in °C, sent as `(t + 20) * 2`
    Temperature,
    /// Single flag byte
    Bool,
    /// One of the [`Level`] names or aliases
    LevelEnum,
}

impl Writer {
    /// Encode `value` for the argument named `param`
    pub fn write(&self, param: &str, value: &ParamValue) -> Result<Vec<u8>, ProtocolError> {
        let invalid = |message: String| ProtocolError::InvalidParameter {
            param: param.to_string(),
            message,
        };

        match self {
            Writer::LevelValue => {
                let level = value
                    .as_f64()
                    .filter(|v| !v.is_nan())
                    .ok_or_else(|| invalid(format!("expected a number, got {:?}", value)))?;
                Ok(vec![level.clamp(0.0, 100.0).round() as u8])
            }
            Writer::Temperature => {
                let temperature = value
                    .as_f64()
                    .filter(|v| v.is_finite())
                    .ok_or_else(|| invalid(format!("expected a number, got {:?}", value)))?;
                let raw = ((temperature + 20.0) * 2.0).round();
                if !(0.0..=255.0).contains(&raw) {
                    return Err(invalid(format!("temperature {} out of range", temperature)));
                }
                Ok(vec![raw as u8])
            }
            Writer::Bool => Ok(vec![if value.is_truthy() { 0x01 } else { 0x00 }]),
            Writer::LevelEnum => {
                let level: Level = value.as_key().parse()?;
                Ok(vec![level.wire_value()])
            }
        }
    }
}

/// A decoded field value
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    /// Integer
    Int(i64),
    /// Number with a fraction
    Float(f64),
    /// Flag
    Bool(bool),
    /// Text or enumerated state
    Text(String),
    /// Named bits
    Flags(BTreeMap<&'static str, bool>),
}

impl Value {
    /// Integer value
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(v) => Some(*v),
            _ => None,
        }
    }

    /// Numeric value, integers included
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(v) => Some(*v as f64),
            Value::Float(v) => Some(*v),
            _ => None,
        }
    }

    /// Flag value
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(v) => Some(*v),
            _ => None,
        }
    }

    /// Text value
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(v) => Some(v),
            _ => None,
        }
    }

    /// Named bits
    pub fn as_flags(&self) -> Option<&BTreeMap<&'static str, bool>> {
        match self {
            Value::Flags(v) => Some(v),
            _ => None,
        }
    }
}

/// Bits of the "sensor connected" byte
const SENSOR_BITS: [(&str, u8); 7] = [
    ("outside air", 0x01),
    ("supply air", 0x02),
    ("outgoing air", 0x04),
    ("exhaust air", 0x08),
    ("ground heat exchanger", 0x10),
    ("preheater", 0x20),
    ("cooker hood", 0x40),
];

/// Fan rotation constant: rpm = ROTATION_FACTOR / raw
const ROTATION_FACTOR: f64 = 1_875_000.0;

/// Decoders for incoming response fields
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reader {
    /// Unsigned byte
    U8,
    /// Unsigned 16-bit integer
    U16,
    /// Unsigned 24-bit integer
    U24,
    /// Non-zero byte
    Bool,
    /// ASCII text, fills the whole field
    Text,
    /// `raw / 2 - 20` °C
    Temperature,
    /// Fan speed in rpm, absent when the fan reports zero
    Rotation,
    /// Bit set of connected temperature sensors
    SensorsConnected,
    /// Bypass position, `0xFF` means unknown
    Bypass,
    /// Preheat valve state
    Preheat,
    /// `winter` or `summer`
    SummerMode,
    /// Error A code, reported as `A<n>` with `n` the highest set bit
    ErrorA,
    /// Raw error code byte (E, EA and A-high groups)
    ErrorCode,
    /// Filter needs replacing
    FilterState,
}

impl Reader {
    /// Minimum number of bytes the reader consumes
    pub fn width(&self) -> usize {
        match self {
            Reader::U16 | Reader::Rotation | Reader::SummerMode => 2,
            Reader::U24 => 3,
            _ => 1,
        }
    }

    /// Decode one field from exactly the bytes it occupies
    ///
    /// `Ok(None)` means the device reported the value as unknown.
    pub fn read(&self, field: &'static str, raw: &[u8]) -> Result<Option<Value>, FieldError> {
        if raw.len() < self.width() {
            return Err(FieldError::Truncated {
                field,
                expected: self.width(),
                actual: raw.len(),
            });
        }

        let value = match self {
            Reader::U8 | Reader::ErrorCode => Value::Int(raw[0] as i64),
            Reader::U16 => Value::Int(BigEndian::read_u16(raw) as i64),
            Reader::U24 => Value::Int(BigEndian::read_u24(raw) as i64),
            Reader::Bool | Reader::FilterState => Value::Bool(raw[0] != 0),
            Reader::Text => Value::Text(raw.iter().map(|b| (b & 0x7F) as char).collect()),
            Reader::Temperature => Value::Float(raw[0] as f64 / 2.0 - 20.0),
            Reader::Rotation => match BigEndian::read_u16(raw) {
                0 => return Ok(None),
                period => Value::Int((ROTATION_FACTOR / period as f64).round() as i64),
            },
            Reader::SensorsConnected => Value::Flags(
                SENSOR_BITS
                    .iter()
                    .map(|(name, bit)| (*name, raw[0] & bit != 0))
                    .collect(),
            ),
            Reader::Bypass => match raw[0] {
                0xFF => return Ok(None),
                v => Value::Int(v as i64),
            },
            Reader::Preheat => match raw[0] {
                0 => Value::Text("Closed".to_string()),
                1 => Value::Text("Open".to_string()),
                2 => Value::Text("Unknown".to_string()),
                v => Value::Int(v as i64),
            },
            Reader::SummerMode => match BigEndian::read_u16(raw) {
                0 => Value::Text("winter".to_string()),
                1 => Value::Text("summer".to_string()),
                v => Value::Int(v as i64),
            },
            Reader::ErrorA => Value::Text(format!("A{}", raw[0].checked_ilog2().unwrap_or(0))),
        };

        Ok(Some(value))
    }
}
