use std::time::Duration;

/// Errors that can occur on a controller byte channel.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Failed to open the serial port.
    #[error("failed to open {target}: {source}")]
    Open {
        target: String,
        source: std::io::Error,
    },

    /// Failed to connect to the LAN interface.
    #[error("failed to connect to {target}: {source}")]
    Connect {
        target: String,
        source: std::io::Error,
    },

    /// An I/O error occurred on the open channel.
    #[error("transport I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// No bytes arrived within the read deadline.
    #[error("no data within {0:?}")]
    Timeout(Duration),

    /// The peer closed the channel (cable unplugged, controller powered off).
    #[error("channel closed by peer")]
    Closed,

    /// The channel was closed locally or never opened.
    #[error("transport not connected")]
    NotConnected,
}

impl TransportError {
    /// Returns true when the error means the channel is gone for good.
    pub fn is_closed(&self) -> bool {
        matches!(self, TransportError::Closed)
            || matches!(self, TransportError::Io(err) if is_disconnect(err.kind()))
    }
}

fn is_disconnect(kind: std::io::ErrorKind) -> bool {
    matches!(
        kind,
        std::io::ErrorKind::BrokenPipe
            | std::io::ErrorKind::ConnectionReset
            | std::io::ErrorKind::ConnectionAborted
            | std::io::ErrorKind::UnexpectedEof
    )
}

pub type Result<T> = std::result::Result<T, TransportError>;
