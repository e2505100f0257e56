//! Control and monitoring of Agilent vacuum pump controllers.
//!
//! agilent-vacuum speaks the Agilent window protocol to TwisTorr 74 FS turbo
//! pump controllers and IPC Mini ion pump controllers, over RS-232/RS-485 or
//! the controllers' LAN interface.
//!
//! # Crate Structure
//!
//! - [`transport`]: Byte channels (serial, TCP, scripted mock)
//! - [`frame`]: Window protocol framing and checksums
//! - [`dispatch`]: Command catalog and the retrying request/response dispatcher
//! - [`pumps`]: Connection state machine and device profiles

/// Re-export transport types.
pub mod transport {
    pub use agilent_vacuum_transport::*;
}

/// Re-export frame types.
pub mod frame {
    pub use agilent_vacuum_frame::*;
}

/// Re-export dispatch types.
pub mod dispatch {
    pub use agilent_vacuum_dispatch::*;
}

/// Re-export driver types.
pub mod pumps {
    pub use agilent_vacuum_pumps::*;
}

pub use agilent_vacuum_pumps::{
    Driver, DriverConfig, DriverError, DriverState, IpcMiniDriver, PressureUnit, PumpStatus,
    TwisTorr74Driver,
};
