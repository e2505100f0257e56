//! Drivers for Agilent vacuum pump controllers.
//!
//! [`Driver`] is one connection state machine shared by every model; a
//! [`Device`] profile supplies the model's window catalog and code tables.
//!
//! ```no_run
//! # async fn demo() -> agilent_vacuum_pumps::Result<()> {
//! use agilent_vacuum_pumps::{DriverConfig, TwisTorr74Driver};
//! use agilent_vacuum_transport::TcpConfig;
//!
//! let pump = TwisTorr74Driver::new(TcpConfig::new("192.168.0.20"), DriverConfig::default());
//! pump.connect().await?;
//! pump.start().await?;
//! println!("{}", pump.get_status().await?);
//! # Ok(())
//! # }
//! ```

pub mod device;
pub mod driver;
pub mod error;
pub mod ipc_mini;
pub mod status;
pub mod twistorr74;

pub use device::Device;
pub use driver::{Driver, DriverConfig, DriverState, HookFuture};
pub use error::{DriverError, Result};
pub use ipc_mini::{IpcMini, IpcMiniDriver};
pub use status::{flag_names, IonErrors, PressureUnit, PumpStatus, TurboErrors, UnknownUnit};
pub use twistorr74::{TwisTorr74, TwisTorr74Driver};
