use std::time::Duration;

use async_trait::async_trait;

use crate::error::Result;

/// An open, half-duplex byte channel to one pump controller.
///
/// Implementations only move bytes. Framing, checksums and retries live in
/// the layers above, which always consume a channel through this trait.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Write all bytes and flush them to the wire.
    async fn write(&mut self, data: &[u8]) -> Result<()>;

    /// Read whatever is available into `buf`, waiting at most `timeout`.
    ///
    /// Returns the number of bytes read (never zero). Fails with
    /// [`TransportError::Timeout`](crate::TransportError::Timeout) when
    /// nothing arrives in time and with
    /// [`TransportError::Closed`](crate::TransportError::Closed) at end of stream.
    async fn read_with_timeout(&mut self, buf: &mut [u8], timeout: Duration) -> Result<usize>;

    /// Discard any bytes already received but not yet read.
    async fn clear_input(&mut self) -> Result<()>;

    /// Close the channel. Further reads and writes fail with `NotConnected`.
    async fn close(&mut self) -> Result<()>;

    /// Whether the channel is still open.
    fn is_open(&self) -> bool;

    /// Human-readable endpoint, used in logs.
    fn describe(&self) -> String;
}

#[async_trait]
impl<T: Transport + ?Sized> Transport for Box<T> {
    async fn write(&mut self, data: &[u8]) -> Result<()> {
        (**self).write(data).await
    }

    async fn read_with_timeout(&mut self, buf: &mut [u8], timeout: Duration) -> Result<usize> {
        (**self).read_with_timeout(buf, timeout).await
    }

    async fn clear_input(&mut self) -> Result<()> {
        (**self).clear_input().await
    }

    async fn close(&mut self) -> Result<()> {
        (**self).close().await
    }

    fn is_open(&self) -> bool {
        (**self).is_open()
    }

    fn describe(&self) -> String {
        (**self).describe()
    }
}

/// Opens fresh [`Transport`] sessions. A driver keeps its connector so it
/// can reconnect after a fault.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Open a new channel with the connector's settings.
    async fn open(&self) -> Result<Box<dyn Transport>>;

    /// Human-readable endpoint, used in logs.
    fn describe(&self) -> String;
}
