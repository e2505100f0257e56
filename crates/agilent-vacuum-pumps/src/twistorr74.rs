//! Agilent TwisTorr 74 FS turbomolecular pump controller.

use agilent_vacuum_dispatch::{
    Catalog, CommandDescriptor, DataType, Decoding, Operation, Permission, Request, Value,
};
use DataType::{Alphanumeric, Logic, Numeric};
use Permission::{ReadOnly, ReadWrite};

use crate::device::{window, Device};
use crate::driver::Driver;
use crate::error::Result;
use crate::status::{PressureUnit, PumpStatus, TurboErrors};

#[rustfmt::skip]
const WINDOWS: [CommandDescriptor; 17] = [
    window(Operation::StartStop, "start_stop", 0, Logic, ReadWrite, Decoding::Logic,
        "Start/stop (read only in remote mode)"),
    window(Operation::RemoteMode, "remote_mode", 8, Logic, ReadWrite, Decoding::Logic,
        "Remote or serial configuration"),
    window(Operation::SoftStart, "soft_start", 100, Logic, ReadWrite, Decoding::Logic,
        "Soft start (writable in stop condition only)"),
    window(Operation::SetPointType, "set_point_type", 101, Numeric, ReadWrite,
        Decoding::Enumerated, "R1 set point type"),
    window(Operation::SetPointValue, "set_point_value", 102, Numeric, ReadWrite,
        Decoding::Integer, "R1 set point value (Hz, W or s)"),
    window(Operation::FanConfig, "fan_config", 143, Numeric, ReadWrite, Decoding::Enumerated,
        "External fan: 0 on, 1 automatic, 2 serial"),
    window(Operation::FanActivation, "fan_activation", 144, Logic, ReadWrite, Decoding::Logic,
        "External fan on/off"),
    window(Operation::PressureUnit, "pressure_unit", 163, Numeric, ReadWrite,
        Decoding::Enumerated, "Pressure unit: 0 mbar, 1 Pa, 2 Torr"),
    window(Operation::Current, "pump_current", 200, Numeric, ReadOnly, Decoding::Integer,
        "Pump current (mA)"),
    window(Operation::Power, "pump_power", 202, Numeric, ReadOnly, Decoding::Integer,
        "Pump power (W)"),
    window(Operation::DrivingFrequency, "driving_frequency", 203, Numeric, ReadOnly,
        Decoding::Integer, "Driving frequency (Hz)"),
    window(Operation::Temperature, "pump_temperature", 204, Numeric, ReadOnly,
        Decoding::Integer, "Pump temperature (°C)"),
    window(Operation::Status, "status", 205, Numeric, ReadOnly, Decoding::Enumerated,
        "Pump status"),
    window(Operation::ErrorCode, "error_code", 206, Numeric, ReadOnly, Decoding::Integer,
        "Error register"),
    window(Operation::Pressure, "pressure", 224, Alphanumeric, ReadOnly, Decoding::Physical,
        "Gauge pressure, X.XE-XX"),
    window(Operation::GaugeStatus, "gauge_status", 257, Numeric, ReadOnly,
        Decoding::Enumerated, "Gauge status"),
    window(Operation::GaugePower, "gauge_power", 267, Numeric, ReadWrite, Decoding::Integer,
        "Gauge power"),
];

/// TwisTorr 74 FS rack controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TwisTorr74;

impl Device for TwisTorr74 {
    const MODEL: &'static str = "TwisTorr 74 FS";
    const CATALOG: Catalog = Catalog::new(Self::MODEL, &WINDOWS);
    const IDENTIFY: Operation = Operation::Status;
    const STATUS_CODES: &'static [(i64, PumpStatus)] = &[
        (0, PumpStatus::Stop),
        (1, PumpStatus::Waiting),
        (2, PumpStatus::Starting),
        (3, PumpStatus::AutoTuning),
        (4, PumpStatus::Braking),
        (5, PumpStatus::Normal),
        (6, PumpStatus::Fail),
    ];
    const UNIT_CODES: &'static [(i64, PressureUnit)] = &[
        (0, PressureUnit::MBar),
        (1, PressureUnit::Pa),
        (2, PressureUnit::Torr),
    ];
    type Errors = TurboErrors;
}

pub type TwisTorr74Driver = Driver<TwisTorr74>;

impl Driver<TwisTorr74> {
    /// Rotor driving frequency in Hz.
    pub async fn read_turbo_speed(&self) -> Result<i64> {
        self.read_integer(Operation::DrivingFrequency).await
    }

    /// Pump power in W.
    pub async fn read_pump_power(&self) -> Result<i64> {
        self.read_integer(Operation::Power).await
    }

    /// Pump temperature in °C.
    pub async fn read_pump_temperature(&self) -> Result<i64> {
        self.read_integer(Operation::Temperature).await
    }

    pub async fn soft_start(&self) -> Result<bool> {
        self.read_logic(Operation::SoftStart).await
    }

    /// Only accepted by the controller while the pump is stopped.
    pub async fn set_soft_start(&self, enabled: bool) -> Result<()> {
        self.send(Operation::SoftStart, Request::Write(Value::Logic(enabled)))
            .await
            .map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    #[test]
    fn windows_are_unique() {
        let windows: HashSet<u16> = TwisTorr74::CATALOG.iter().map(|d| d.window).collect();
        let operations: HashSet<Operation> =
            TwisTorr74::CATALOG.iter().map(|d| d.operation).collect();
        assert_eq!(windows.len(), TwisTorr74::CATALOG.len());
        assert_eq!(operations.len(), TwisTorr74::CATALOG.len());
    }

    #[test]
    fn core_operations_are_mapped() {
        let catalog = TwisTorr74::CATALOG;
        assert_eq!(catalog.lookup(Operation::StartStop).map(|d| d.window), Some(0));
        assert_eq!(catalog.lookup(Operation::Status).map(|d| d.window), Some(205));
        assert_eq!(catalog.lookup(Operation::Pressure).map(|d| d.window), Some(224));
        assert_eq!(catalog.lookup(Operation::PressureUnit).map(|d| d.window), Some(163));
        assert!(catalog.lookup(Operation::Label).is_none());
    }

    #[test]
    fn unit_codes() {
        assert_eq!(TwisTorr74::unit_from_code(2), Some(PressureUnit::Torr));
        assert_eq!(TwisTorr74::unit_code(PressureUnit::Pa), Some(1));
        assert_eq!(TwisTorr74::unit_code(PressureUnit::Unknown), None);
        assert_eq!(TwisTorr74::status_from_code(3), Some(PumpStatus::AutoTuning));
        assert_eq!(TwisTorr74::status_from_code(7), None);
    }
}
