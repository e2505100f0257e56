use agilent_vacuum_dispatch::{DispatchError, ErrorKind, Operation};

use crate::driver::DriverState;

/// Errors surfaced by a pump driver.
#[derive(Debug, thiserror::Error)]
pub enum DriverError {
    /// The command itself failed.
    #[error(transparent)]
    Dispatch(#[from] DispatchError),

    /// The operation is not allowed in the current state.
    #[error("cannot {operation} while {state}")]
    InvalidState {
        operation: &'static str,
        state: DriverState,
    },

    /// The model has no window for this operation.
    #[error("{model} does not support {operation}")]
    Unsupported {
        model: &'static str,
        operation: Operation,
    },
}

impl DriverError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            DriverError::Dispatch(err) => err.kind(),
            DriverError::InvalidState { .. } | DriverError::Unsupported { .. } => {
                ErrorKind::InvalidRequest
            }
        }
    }

    /// The underlying command failure, if any.
    pub fn dispatch_error(&self) -> Option<&DispatchError> {
        match self {
            DriverError::Dispatch(err) => Some(err),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, DriverError>;
