//! Command dispatch for the Agilent window protocol.
//!
//! A [`Catalog`] of static [`CommandDescriptor`]s describes what each window
//! holds. The [`Dispatcher`] owns the link session, encodes requests, applies
//! the timeout and retry policy and hands back typed [`Value`]s or a
//! classified [`DispatchError`].

pub mod catalog;
pub mod command;
pub mod dispatcher;
pub mod error;

pub use catalog::Catalog;
pub use command::{CommandDescriptor, DataType, Decoding, Operation, Permission, Request, Value};
pub use dispatcher::{DispatchConfig, Dispatcher};
pub use error::{DispatchError, ErrorKind, Result};
