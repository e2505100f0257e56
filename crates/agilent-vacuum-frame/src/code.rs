//! Result codes carried by short replies (`STX ADDR CODE ETX CRC`).
//!
//! A write is answered with one of these instead of a data frame, and a read
//! the controller refuses gets one too.

/// Command executed.
pub const ACK: u8 = 0x06;

/// Command failed.
pub const NACK: u8 = 0x15;

/// The window does not exist on this controller.
pub const UNKNOWN_WINDOW: u8 = 0x32;

/// The data field does not match the window's type.
pub const DATA_TYPE_ERROR: u8 = 0x33;

/// The written value is outside the window's range.
pub const OUT_OF_RANGE: u8 = 0x34;

/// The window is read-only or disabled in the current device state.
pub const WIN_DISABLED: u8 = 0x35;

/// A decoded result code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResultCode {
    Ack,
    Nack,
    UnknownWindow,
    DataTypeError,
    OutOfRange,
    WindowDisabled,
}

impl ResultCode {
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            ACK => Some(Self::Ack),
            NACK => Some(Self::Nack),
            UNKNOWN_WINDOW => Some(Self::UnknownWindow),
            DATA_TYPE_ERROR => Some(Self::DataTypeError),
            OUT_OF_RANGE => Some(Self::OutOfRange),
            WIN_DISABLED => Some(Self::WindowDisabled),
            _ => None,
        }
    }

    pub fn as_byte(self) -> u8 {
        match self {
            Self::Ack => ACK,
            Self::Nack => NACK,
            Self::UnknownWindow => UNKNOWN_WINDOW,
            Self::DataTypeError => DATA_TYPE_ERROR,
            Self::OutOfRange => OUT_OF_RANGE,
            Self::WindowDisabled => WIN_DISABLED,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Ack => "ACK",
            Self::Nack => "NACK",
            Self::UnknownWindow => "UNKNOWN_WINDOW",
            Self::DataTypeError => "DATA_TYPE_ERROR",
            Self::OutOfRange => "OUT_OF_RANGE",
            Self::WindowDisabled => "WIN_DISABLED",
        }
    }
}

impl std::fmt::Display for ResultCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} (0x{:02X})", self.name(), self.as_byte())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bytes_map_both_ways() {
        for byte in 0..=u8::MAX {
            if let Some(code) = ResultCode::from_byte(byte) {
                assert_eq!(code.as_byte(), byte);
            }
        }
        assert_eq!(ResultCode::from_byte(0x35), Some(ResultCode::WindowDisabled));
        assert_eq!(ResultCode::from_byte(0x07), None);
    }

    #[test]
    fn display_includes_hex() {
        assert_eq!(ResultCode::Nack.to_string(), "NACK (0x15)");
    }
}
