//! Command descriptors: one static record per supported window.

use std::fmt;

use agilent_vacuum_frame::MAX_PAYLOAD;

use crate::error::{DispatchError, Result};

/// Semantic operations a controller may support. Each device catalog maps
/// the ones it has to a concrete window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    StartStop,
    RemoteMode,
    SoftStart,
    SetPointType,
    SetPointValue,
    FanConfig,
    FanActivation,
    PressureUnit,
    Current,
    Voltage,
    Power,
    DrivingFrequency,
    Temperature,
    Status,
    ErrorCode,
    Pressure,
    GaugeStatus,
    GaugePower,
    OperatingMode,
    ControllerModel,
    SerialNumber,
    Label,
}

impl Operation {
    pub fn as_str(self) -> &'static str {
        match self {
            Operation::StartStop => "start_stop",
            Operation::RemoteMode => "remote_mode",
            Operation::SoftStart => "soft_start",
            Operation::SetPointType => "set_point_type",
            Operation::SetPointValue => "set_point_value",
            Operation::FanConfig => "fan_config",
            Operation::FanActivation => "fan_activation",
            Operation::PressureUnit => "pressure_unit",
            Operation::Current => "current",
            Operation::Voltage => "voltage",
            Operation::Power => "power",
            Operation::DrivingFrequency => "driving_frequency",
            Operation::Temperature => "temperature",
            Operation::Status => "status",
            Operation::ErrorCode => "error_code",
            Operation::Pressure => "pressure",
            Operation::GaugeStatus => "gauge_status",
            Operation::GaugePower => "gauge_power",
            Operation::OperatingMode => "operating_mode",
            Operation::ControllerModel => "controller_model",
            Operation::SerialNumber => "serial_number",
            Operation::Label => "label",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a value is written into the data field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataType {
    /// `'0'` or `'1'`.
    Logic,
    /// Six zero-padded decimal digits.
    Numeric,
    /// Up to ten printable characters.
    Alphanumeric,
}

/// Whether a window may be written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Permission {
    ReadOnly,
    ReadWrite,
}

/// How the data field of a read reply is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decoding {
    Logic,
    /// A plain integer.
    Integer,
    /// An integer code with a device-specific meaning.
    Enumerated,
    /// A physical quantity, integer or scientific notation.
    Physical,
    Text,
}

/// A decoded (or to-be-encoded) window value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// A write was acknowledged.
    Ack,
    Logic(bool),
    Integer(i64),
    Float(f64),
    Text(String),
}

impl Value {
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Logic(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Value::Integer(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Float(x) => Some(*x),
            Value::Integer(n) => Some(*n as f64),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Ack => f.write_str("ACK"),
            Value::Logic(b) => write!(f, "{}", if *b { "on" } else { "off" }),
            Value::Integer(n) => write!(f, "{n}"),
            Value::Float(x) => write!(f, "{x:e}"),
            Value::Text(s) => f.write_str(s),
        }
    }
}

/// What to do with a window.
#[derive(Debug, Clone, PartialEq)]
pub enum Request {
    Read,
    Write(Value),
}

/// Static description of one window command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandDescriptor {
    pub operation: Operation,
    pub name: &'static str,
    pub window: u16,
    pub data_type: DataType,
    pub permission: Permission,
    pub decoding: Decoding,
    pub description: &'static str,
}

impl CommandDescriptor {
    pub fn is_writable(&self) -> bool {
        self.permission == Permission::ReadWrite
    }

    /// Render a write value into the data field.
    pub fn encode_value(&self, value: &Value) -> Result<Vec<u8>> {
        if !self.is_writable() {
            return Err(DispatchError::ReadOnly { name: self.name });
        }

        match (self.data_type, value) {
            (DataType::Logic, Value::Logic(b)) => Ok(vec![if *b { b'1' } else { b'0' }]),
            (DataType::Logic, Value::Integer(n @ (0 | 1))) => Ok(vec![b'0' + *n as u8]),
            (DataType::Numeric, Value::Integer(n)) if (0..=999_999).contains(n) => {
                Ok(format!("{n:06}").into_bytes())
            }
            (DataType::Numeric, Value::Integer(n)) => Err(self.invalid(format!(
                "{n} does not fit six digits"
            ))),
            (DataType::Alphanumeric, Value::Text(text)) => {
                if text.len() > MAX_PAYLOAD {
                    return Err(self.invalid(format!(
                        "{} characters, at most {MAX_PAYLOAD}",
                        text.len()
                    )));
                }
                if !text.bytes().all(|b| (0x20..=0x7E).contains(&b)) {
                    return Err(self.invalid("only printable ASCII is allowed".to_string()));
                }
                Ok(text.as_bytes().to_vec())
            }
            (data_type, value) => Err(self.invalid(format!(
                "{value:?} is not a {data_type:?} value"
            ))),
        }
    }

    /// Interpret the data field of a read reply.
    pub fn decode_value(&self, payload: &[u8]) -> Result<Value> {
        let text = std::str::from_utf8(payload)
            .map_err(|_| self.protocol("data field is not ASCII".to_string()))?;

        match self.decoding {
            Decoding::Logic => match text {
                "0" => Ok(Value::Logic(false)),
                "1" => Ok(Value::Logic(true)),
                other => Err(self.protocol(format!("expected 0 or 1, got {other:?}"))),
            },
            Decoding::Integer | Decoding::Enumerated => text
                .trim()
                .parse::<i64>()
                .map(Value::Integer)
                .map_err(|_| self.protocol(format!("expected an integer, got {text:?}"))),
            Decoding::Physical => text
                .trim()
                .parse::<f64>()
                .ok()
                .filter(|x| x.is_finite())
                .map(Value::Float)
                .ok_or_else(|| self.protocol(format!("expected a number, got {text:?}"))),
            Decoding::Text => Ok(Value::Text(text.trim_end().to_string())),
        }
    }

    fn invalid(&self, reason: String) -> DispatchError {
        DispatchError::InvalidValue {
            name: self.name,
            reason,
        }
    }

    pub(crate) fn protocol(&self, message: String) -> DispatchError {
        DispatchError::Protocol {
            window: self.window,
            message,
        }
    }
}
