//! RS-232 / RS-485 link to a pump controller.
//!
//! Agilent controllers ship configured for 9600 baud, 8 data bits, no
//! parity and one stop bit. The settings here are passed to the port as-is.

use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio_serial::{ClearBuffer, SerialPort, SerialPortBuilderExt, SerialStream};

use crate::error::{Result, TransportError};
use crate::traits::{Connector, Transport};

/// Default controller baud rate.
pub const DEFAULT_BAUD_RATE: u32 = 9600;

/// Serial port settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SerialConfig {
    /// Port path, e.g. `/dev/ttyUSB0` or `COM3`.
    pub port: String,
    pub baud_rate: u32,
    pub data_bits: DataBits,
    pub stop_bits: StopBits,
    pub parity: Parity,
    pub flow_control: FlowControl,
}

impl SerialConfig {
    /// Controller defaults for the given port.
    pub fn new(port: impl Into<String>) -> Self {
        Self {
            port: port.into(),
            ..Self::default()
        }
    }
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            port: String::new(),
            baud_rate: DEFAULT_BAUD_RATE,
            data_bits: DataBits::Eight,
            stop_bits: StopBits::One,
            parity: Parity::None,
            flow_control: FlowControl::None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataBits {
    Seven,
    Eight,
}

impl From<DataBits> for tokio_serial::DataBits {
    fn from(bits: DataBits) -> Self {
        match bits {
            DataBits::Seven => tokio_serial::DataBits::Seven,
            DataBits::Eight => tokio_serial::DataBits::Eight,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopBits {
    One,
    Two,
}

impl From<StopBits> for tokio_serial::StopBits {
    fn from(bits: StopBits) -> Self {
        match bits {
            StopBits::One => tokio_serial::StopBits::One,
            StopBits::Two => tokio_serial::StopBits::Two,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Parity {
    None,
    Odd,
    Even,
}

impl From<Parity> for tokio_serial::Parity {
    fn from(parity: Parity) -> Self {
        match parity {
            Parity::None => tokio_serial::Parity::None,
            Parity::Odd => tokio_serial::Parity::Odd,
            Parity::Even => tokio_serial::Parity::Even,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowControl {
    None,
    Software,
    Hardware,
}

impl From<FlowControl> for tokio_serial::FlowControl {
    fn from(flow: FlowControl) -> Self {
        match flow {
            FlowControl::None => tokio_serial::FlowControl::None,
            FlowControl::Software => tokio_serial::FlowControl::Software,
            FlowControl::Hardware => tokio_serial::FlowControl::Hardware,
        }
    }
}

/// Serial channel backed by `tokio-serial`.
pub struct SerialTransport {
    port: Option<SerialStream>,
    port_name: String,
}

impl SerialTransport {
    /// Open the port described by `config`.
    pub fn open(config: &SerialConfig) -> Result<Self> {
        tracing::debug!(
            port = %config.port,
            baud_rate = config.baud_rate,
            data_bits = ?config.data_bits,
            stop_bits = ?config.stop_bits,
            parity = ?config.parity,
            "opening serial port"
        );

        let stream = tokio_serial::new(&config.port, config.baud_rate)
            .data_bits(config.data_bits.into())
            .stop_bits(config.stop_bits.into())
            .parity(config.parity.into())
            .flow_control(config.flow_control.into())
            .open_native_async()
            .map_err(|err| TransportError::Open {
                target: config.port.clone(),
                source: std::io::Error::from(err),
            })?;

        tracing::info!(port = %config.port, baud_rate = config.baud_rate, "serial port opened");

        Ok(Self {
            port: Some(stream),
            port_name: config.port.clone(),
        })
    }

    pub fn port_name(&self) -> &str {
        &self.port_name
    }
}

#[async_trait]
impl Transport for SerialTransport {
    async fn write(&mut self, data: &[u8]) -> Result<()> {
        let port = self.port.as_mut().ok_or(TransportError::NotConnected)?;
        tracing::trace!(port = %self.port_name, bytes = data.len(), data = ?data, "tx");
        port.write_all(data).await?;
        port.flush().await?;
        Ok(())
    }

    async fn read_with_timeout(&mut self, buf: &mut [u8], timeout: Duration) -> Result<usize> {
        let port = self.port.as_mut().ok_or(TransportError::NotConnected)?;
        match tokio::time::timeout(timeout, port.read(buf)).await {
            Ok(Ok(0)) => Err(TransportError::Closed),
            Ok(Ok(n)) => {
                tracing::trace!(port = %self.port_name, bytes = n, data = ?&buf[..n], "rx");
                Ok(n)
            }
            Ok(Err(err)) => Err(TransportError::Io(err)),
            Err(_) => Err(TransportError::Timeout(timeout)),
        }
    }

    async fn clear_input(&mut self) -> Result<()> {
        let port = self.port.as_mut().ok_or(TransportError::NotConnected)?;
        port.clear(ClearBuffer::Input)
            .map_err(|err| TransportError::Io(std::io::Error::from(err)))
    }

    async fn close(&mut self) -> Result<()> {
        if self.port.take().is_some() {
            tracing::debug!(port = %self.port_name, "serial port closed");
        }
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.port.is_some()
    }

    fn describe(&self) -> String {
        format!("serial:{}", self.port_name)
    }
}

#[async_trait]
impl Connector for SerialConfig {
    async fn open(&self) -> Result<Box<dyn Transport>> {
        Ok(Box::new(SerialTransport::open(self)?))
    }

    fn describe(&self) -> String {
        format!("serial:{}@{}", self.port, self.baud_rate)
    }
}
