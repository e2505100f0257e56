use std::fmt;
use std::io;

use agilent_vacuum_dispatch::{DispatchError, ErrorKind};
use agilent_vacuum_pumps::DriverError;
use agilent_vacuum_transport::TransportError;

pub const SUCCESS: i32 = 0;
pub const FAILURE: i32 = 1;
pub const TRANSPORT_ERROR: i32 = 3;
pub const DEVICE_REFUSED: i32 = 40;
pub const PERMISSION_DENIED: i32 = 50;
pub const DATA_INVALID: i32 = 60;
pub const USAGE: i32 = 64;
pub const TIMEOUT: i32 = 124;
pub const INTERNAL: i32 = 125;

pub type CliResult<T> = Result<T, CliError>;

#[derive(Debug)]
pub struct CliError {
    pub code: i32,
    pub message: String,
}

impl CliError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CliError {}

fn io_code(err: &io::Error) -> i32 {
    match err.kind() {
        io::ErrorKind::PermissionDenied => PERMISSION_DENIED,
        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => TIMEOUT,
        _ => TRANSPORT_ERROR,
    }
}

fn transport_code(err: &TransportError) -> i32 {
    match err {
        TransportError::Open { source, .. }
        | TransportError::Connect { source, .. }
        | TransportError::Io(source) => io_code(source),
        TransportError::Timeout(_) => TIMEOUT,
        _ => TRANSPORT_ERROR,
    }
}

fn dispatch_code(err: &DispatchError) -> i32 {
    match err.kind() {
        ErrorKind::Com => match err.root_cause() {
            DispatchError::Transport(err) => transport_code(err),
            DispatchError::Timeout(_) => TIMEOUT,
            _ => TRANSPORT_ERROR,
        },
        ErrorKind::Timeout => TIMEOUT,
        ErrorKind::Eof => TRANSPORT_ERROR,
        ErrorKind::WindowDisabled | ErrorKind::Rejected => DEVICE_REFUSED,
        ErrorKind::FrameFormat | ErrorKind::AddressMismatch | ErrorKind::Protocol => DATA_INVALID,
        ErrorKind::InvalidRequest => USAGE,
        ErrorKind::Closed => FAILURE,
    }
}

pub fn driver_error(context: &str, err: DriverError) -> CliError {
    let code = match &err {
        DriverError::Dispatch(err) => dispatch_code(err),
        DriverError::InvalidState { .. } => FAILURE,
        DriverError::Unsupported { .. } => USAGE,
    };
    CliError::new(code, format!("{context}: {err}"))
}
