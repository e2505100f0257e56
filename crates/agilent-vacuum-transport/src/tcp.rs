//! LAN link to a controller's Ethernet interface.
//!
//! The controllers expose the same window protocol over a raw TCP socket
//! (telnet port 23 by default), so the frames are identical to the serial link.

use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

use crate::error::{Result, TransportError};
use crate::traits::{Connector, Transport};

/// Default LAN port of the controllers.
pub const DEFAULT_TCP_PORT: u16 = 23;

/// LAN endpoint settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TcpConfig {
    pub host: String,
    pub port: u16,
    /// Deadline for establishing the connection.
    pub connect_timeout: Duration,
}

impl TcpConfig {
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            ..Self::default()
        }
    }

    fn target(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for TcpConfig {
    fn default() -> Self {
        Self {
            host: String::new(),
            port: DEFAULT_TCP_PORT,
            connect_timeout: Duration::from_secs(5),
        }
    }
}

/// TCP channel to a controller.
pub struct TcpTransport {
    stream: Option<TcpStream>,
    peer: String,
}

impl TcpTransport {
    pub async fn connect(config: &TcpConfig) -> Result<Self> {
        let target = config.target();
        tracing::debug!(target = %target, "connecting to controller LAN interface");

        let stream = match tokio::time::timeout(
            config.connect_timeout,
            TcpStream::connect(target.as_str()),
        )
        .await
        {
            Ok(Ok(stream)) => stream,
            Ok(Err(source)) => return Err(TransportError::Connect { target, source }),
            Err(_) => {
                return Err(TransportError::Connect {
                    target,
                    source: std::io::Error::from(std::io::ErrorKind::TimedOut),
                })
            }
        };
        stream.set_nodelay(true)?;

        tracing::info!(target = %target, "LAN connection established");
        Ok(Self {
            stream: Some(stream),
            peer: target,
        })
    }
}

#[async_trait]
impl Transport for TcpTransport {
    async fn write(&mut self, data: &[u8]) -> Result<()> {
        let stream = self.stream.as_mut().ok_or(TransportError::NotConnected)?;
        tracing::trace!(peer = %self.peer, bytes = data.len(), data = ?data, "tx");
        stream.write_all(data).await?;
        stream.flush().await?;
        Ok(())
    }

    async fn read_with_timeout(&mut self, buf: &mut [u8], timeout: Duration) -> Result<usize> {
        let stream = self.stream.as_mut().ok_or(TransportError::NotConnected)?;
        match tokio::time::timeout(timeout, stream.read(buf)).await {
            Ok(Ok(0)) => Err(TransportError::Closed),
            Ok(Ok(n)) => {
                tracing::trace!(peer = %self.peer, bytes = n, data = ?&buf[..n], "rx");
                Ok(n)
            }
            Ok(Err(err)) => Err(TransportError::Io(err)),
            Err(_) => Err(TransportError::Timeout(timeout)),
        }
    }

    async fn clear_input(&mut self) -> Result<()> {
        let stream = self.stream.as_mut().ok_or(TransportError::NotConnected)?;
        let mut scratch = [0u8; 256];
        loop {
            match stream.try_read(&mut scratch) {
                Ok(0) => return Err(TransportError::Closed),
                Ok(n) => tracing::trace!(peer = %self.peer, bytes = n, "discarded stale input"),
                Err(err) if err.kind() == std::io::ErrorKind::WouldBlock => return Ok(()),
                Err(err) => return Err(TransportError::Io(err)),
            }
        }
    }

    async fn close(&mut self) -> Result<()> {
        if let Some(mut stream) = self.stream.take() {
            let _ = stream.shutdown().await;
            tracing::debug!(peer = %self.peer, "LAN connection closed");
        }
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.stream.is_some()
    }

    fn describe(&self) -> String {
        format!("tcp:{}", self.peer)
    }
}

#[async_trait]
impl Connector for TcpConfig {
    async fn open(&self) -> Result<Box<dyn Transport>> {
        Ok(Box::new(TcpTransport::connect(self).await?))
    }

    fn describe(&self) -> String {
        format!("tcp:{}", self.target())
    }
}
