use std::time::Duration;

use agilent_vacuum_frame::{FrameError, ResultCode};
use agilent_vacuum_transport::TransportError;

/// Errors surfaced by the dispatcher.
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    /// A corrupt, partial or unchecksummed reply.
    #[error("bad frame: {0}")]
    Frame(FrameError),

    /// No reply within the response window.
    #[error("no reply within {0:?}")]
    Timeout(Duration),

    /// The reply came from a different controller address.
    #[error("reply from address {actual}, expected {expected}")]
    AddressMismatch { expected: u8, actual: u8 },

    /// The reply carries data for a different window.
    #[error("reply for window {actual:03}, expected {expected:03}")]
    WindowMismatch { expected: u16, actual: u16 },

    /// The controller refuses the window in its current state.
    #[error("window {window:03} disabled by the controller")]
    WindowDisabled { window: u16 },

    /// The controller rejected the request with a result code.
    #[error("window {window:03} rejected: {code}")]
    Rejected { window: u16, code: ResultCode },

    /// A well-formed reply whose content cannot be interpreted.
    #[error("protocol error on window {window:03}: {message}")]
    Protocol { window: u16, message: String },

    /// The link closed under an exchange.
    #[error("link closed by the controller")]
    Eof,

    /// Communication failed for good; carries the last underlying cause.
    #[error("communication failed after {attempts} attempt(s): {source}")]
    Com {
        attempts: u32,
        #[source]
        source: Box<DispatchError>,
    },

    /// Transport failure that is neither a timeout nor end of stream.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// The request could not be framed.
    #[error("cannot encode request: {0}")]
    Encoding(FrameError),

    /// The value does not fit the window's data type.
    #[error("invalid value for {name}: {reason}")]
    InvalidValue { name: &'static str, reason: String },

    /// Writes to a read-only window are refused locally.
    #[error("{name} is read-only")]
    ReadOnly { name: &'static str },

    /// The session was closed.
    #[error("link session closed")]
    Closed,
}

/// Flat classification for callers that branch on the kind of failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    FrameFormat,
    Timeout,
    AddressMismatch,
    WindowDisabled,
    Rejected,
    Protocol,
    Eof,
    Com,
    InvalidRequest,
    Closed,
}

impl DispatchError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            DispatchError::Frame(_) => ErrorKind::FrameFormat,
            DispatchError::Timeout(_) => ErrorKind::Timeout,
            DispatchError::AddressMismatch { .. } | DispatchError::WindowMismatch { .. } => {
                ErrorKind::AddressMismatch
            }
            DispatchError::WindowDisabled { .. } => ErrorKind::WindowDisabled,
            DispatchError::Rejected { .. } => ErrorKind::Rejected,
            DispatchError::Protocol { .. } => ErrorKind::Protocol,
            DispatchError::Eof => ErrorKind::Eof,
            DispatchError::Com { .. } | DispatchError::Transport(_) => ErrorKind::Com,
            DispatchError::Encoding(_)
            | DispatchError::InvalidValue { .. }
            | DispatchError::ReadOnly { .. } => ErrorKind::InvalidRequest,
            DispatchError::Closed => ErrorKind::Closed,
        }
    }

    /// Failures worth another attempt on the same link.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            DispatchError::Frame(_)
                | DispatchError::Timeout(_)
                | DispatchError::AddressMismatch { .. }
                | DispatchError::WindowMismatch { .. }
        )
    }

    /// Failures that leave the link unusable.
    pub fn is_link_failure(&self) -> bool {
        matches!(
            self,
            DispatchError::Com { .. } | DispatchError::Eof | DispatchError::Transport(_)
        )
    }

    /// Wrap a failed transport open.
    pub fn open_failed(err: TransportError) -> Self {
        DispatchError::Com {
            attempts: 1,
            source: Box::new(DispatchError::Transport(err)),
        }
    }

    /// The innermost cause of a [`DispatchError::Com`].
    pub fn root_cause(&self) -> &DispatchError {
        match self {
            DispatchError::Com { source, .. } => source.root_cause(),
            other => other,
        }
    }
}

impl From<FrameError> for DispatchError {
    fn from(err: FrameError) -> Self {
        match err {
            FrameError::Timeout(after) => DispatchError::Timeout(after),
            FrameError::ConnectionClosed => DispatchError::Eof,
            FrameError::Transport(err) if err.is_closed() => DispatchError::Eof,
            FrameError::Transport(err) => DispatchError::Transport(err),
            err if err.is_encoding() => DispatchError::Encoding(err),
            err => DispatchError::Frame(err),
        }
    }
}

pub type Result<T> = std::result::Result<T, DispatchError>;
