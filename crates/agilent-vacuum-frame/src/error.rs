use std::time::Duration;

use agilent_vacuum_transport::TransportError;

/// Errors that can occur during frame encoding/decoding.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// The payload exceeds the fixed data field width.
    #[error("payload too large ({size} bytes, max {max})")]
    PayloadTooLarge { size: usize, max: usize },

    /// Serial addresses run from 0 to 31.
    #[error("address {0} out of range (0-31)")]
    AddressOutOfRange(u8),

    /// Windows are three decimal digits.
    #[error("window {0} out of range (0-999)")]
    WindowOutOfRange(u16),

    /// Payload bytes must be printable ASCII.
    #[error("payload contains non-printable byte 0x{0:02X}")]
    InvalidPayloadByte(u8),

    /// Fewer bytes than the smallest possible frame.
    #[error("frame truncated ({len} bytes, need at least {min})")]
    Truncated { len: usize, min: usize },

    /// The frame does not begin with STX.
    #[error("frame does not start with STX")]
    MissingStart,

    /// No ETX terminator was found.
    #[error("frame has no ETX terminator")]
    MissingEnd,

    /// The checksum field is not two uppercase hex digits.
    #[error("checksum field is not two uppercase hex digits")]
    BadChecksumDigits,

    /// The transmitted checksum disagrees with the computed one.
    #[error("checksum mismatch (computed {computed:02X}, received {received:02X})")]
    ChecksumMismatch { computed: u8, received: u8 },

    /// A header field could not be parsed.
    #[error("malformed frame: {0}")]
    Malformed(&'static str),

    /// Bytes arrived but never formed a complete frame before the deadline.
    #[error("incomplete frame after {received} bytes")]
    Incomplete { received: usize },

    /// Nothing arrived before the deadline.
    #[error("no response within {0:?}")]
    Timeout(Duration),

    /// The channel was closed before a complete frame was received.
    #[error("connection closed (incomplete frame)")]
    ConnectionClosed,

    /// Any other transport failure.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),
}

impl FrameError {
    /// True for errors raised while building an outgoing frame. These are
    /// caller mistakes and never worth retrying.
    pub fn is_encoding(&self) -> bool {
        matches!(
            self,
            FrameError::PayloadTooLarge { .. }
                | FrameError::AddressOutOfRange(_)
                | FrameError::WindowOutOfRange(_)
                | FrameError::InvalidPayloadByte(_)
        )
    }

    /// True for corrupt or partial replies.
    pub fn is_format(&self) -> bool {
        matches!(
            self,
            FrameError::Truncated { .. }
                | FrameError::MissingStart
                | FrameError::MissingEnd
                | FrameError::BadChecksumDigits
                | FrameError::ChecksumMismatch { .. }
                | FrameError::Malformed(_)
                | FrameError::Incomplete { .. }
        )
    }
}

impl From<std::io::Error> for FrameError {
    fn from(err: std::io::Error) -> Self {
        FrameError::Transport(TransportError::Io(err))
    }
}

pub type Result<T> = std::result::Result<T, FrameError>;
