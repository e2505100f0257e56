//! Byte channels to Agilent pump controllers.
//!
//! This is the lowest layer of agilent-vacuum. It knows nothing about frames:
//! a [`Transport`] writes bytes and reads whatever arrives before a deadline.
//! - [`SerialTransport`] for RS-232/RS-485 (feature `serial`, on by default)
//! - [`TcpTransport`] for the controllers' LAN interface
//! - [`MockTransport`] with scripted replies for tests (feature `mock`)

pub mod error;
pub mod tcp;
pub mod traits;

#[cfg(feature = "serial")]
pub mod serial;

#[cfg(any(test, feature = "mock"))]
pub mod mock;

use async_trait::async_trait;

pub use error::{Result, TransportError};
pub use tcp::{TcpConfig, TcpTransport, DEFAULT_TCP_PORT};
pub use traits::{Connector, Transport};

#[cfg(feature = "serial")]
pub use serial::{
    DataBits, FlowControl, Parity, SerialConfig, SerialTransport, StopBits, DEFAULT_BAUD_RATE,
};

#[cfg(any(test, feature = "mock"))]
pub use mock::{MockConnector, MockEvent, MockReply, MockTransport};

/// Where a controller is attached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkConfig {
    #[cfg(feature = "serial")]
    Serial(SerialConfig),
    Tcp(TcpConfig),
}

#[async_trait]
impl Connector for LinkConfig {
    async fn open(&self) -> Result<Box<dyn Transport>> {
        match self {
            #[cfg(feature = "serial")]
            LinkConfig::Serial(config) => config.open().await,
            LinkConfig::Tcp(config) => config.open().await,
        }
    }

    fn describe(&self) -> String {
        match self {
            #[cfg(feature = "serial")]
            LinkConfig::Serial(config) => Connector::describe(config),
            LinkConfig::Tcp(config) => Connector::describe(config),
        }
    }
}
