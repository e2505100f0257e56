use std::fmt;
use std::str::FromStr;

use bitflags::Flags;

/// Pump state as reported by the status window (205).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PumpStatus {
    Stop,
    Waiting,
    Starting,
    AutoTuning,
    Braking,
    Normal,
    Fail,
}

impl PumpStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            PumpStatus::Stop => "stop",
            PumpStatus::Waiting => "waiting",
            PumpStatus::Starting => "starting",
            PumpStatus::AutoTuning => "auto-tuning",
            PumpStatus::Braking => "braking",
            PumpStatus::Normal => "normal",
            PumpStatus::Fail => "fail",
        }
    }

    /// The pump is spinning up or at speed.
    pub fn is_running(self) -> bool {
        matches!(
            self,
            PumpStatus::Waiting | PumpStatus::Starting | PumpStatus::AutoTuning | PumpStatus::Normal
        )
    }
}

impl fmt::Display for PumpStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Unit the controller reports pressure in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PressureUnit {
    #[default]
    Unknown,
    MBar,
    Pa,
    Torr,
}

impl PressureUnit {
    pub fn as_str(self) -> &'static str {
        match self {
            PressureUnit::Unknown => "unknown",
            PressureUnit::MBar => "mbar",
            PressureUnit::Pa => "Pa",
            PressureUnit::Torr => "Torr",
        }
    }
}

impl fmt::Display for PressureUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A unit name that is not mbar, Pa or Torr.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown pressure unit '{0}' (expected mbar, pa or torr)")]
pub struct UnknownUnit(pub String);

impl FromStr for PressureUnit {
    type Err = UnknownUnit;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "mbar" => Ok(PressureUnit::MBar),
            "pa" => Ok(PressureUnit::Pa),
            "torr" => Ok(PressureUnit::Torr),
            _ => Err(UnknownUnit(s.to_string())),
        }
    }
}

bitflags::bitflags! {
    /// Error register (206) of the TwisTorr 74 FS.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct TurboErrors: u16 {
        const NO_CONNECTION = 0x01;
        const PUMP_OVERTEMP = 0x02;
        const CONTROLLER_OVERTEMP = 0x04;
        const POWER_FAIL = 0x08;
        const AUX_FAIL = 0x10;
        const OVERVOLTAGE = 0x20;
        const SHORT_CIRCUIT = 0x40;
        const TOO_HIGH_LOAD = 0x80;
    }
}

bitflags::bitflags! {
    /// Error register (206) of the IPC Mini.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct IonErrors: u16 {
        const OVER_TEMPERATURE = 0x04;
        const INTERLOCK_CABLE = 0x20;
        const SHORT_CIRCUIT = 0x40;
        const PROTECT = 0x80;
    }
}

/// Names of the known flags set in an error register.
pub fn flag_names<F: Flags>(flags: &F) -> Vec<&'static str> {
    flags.iter_names().map(|(name, _)| name).collect()
}
