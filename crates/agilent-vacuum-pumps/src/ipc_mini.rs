//! Agilent IPC Mini ion pump controller.

use agilent_vacuum_dispatch::{
    Catalog, CommandDescriptor, DataType, Decoding, Operation, Permission, Request, Value,
};
use DataType::{Alphanumeric, Logic, Numeric};
use Permission::{ReadOnly, ReadWrite};

use crate::device::{window, Device};
use crate::driver::Driver;
use crate::error::Result;
use crate::status::{IonErrors, PressureUnit, PumpStatus};

#[rustfmt::skip]
const WINDOWS: [CommandDescriptor; 11] = [
    window(Operation::OperatingMode, "mode", 8, Numeric, ReadWrite, Decoding::Enumerated,
        "Operating mode"),
    window(Operation::StartStop, "hv_on_off", 11, Logic, ReadWrite, Decoding::Logic,
        "HV on/off, channel 1"),
    window(Operation::Status, "status", 205, Numeric, ReadOnly, Decoding::Enumerated,
        "Pump status"),
    window(Operation::ErrorCode, "error_code", 206, Numeric, ReadOnly, Decoding::Integer,
        "Error register"),
    window(Operation::ControllerModel, "controller_model", 319, Alphanumeric, ReadOnly,
        Decoding::Text, "Controller model"),
    window(Operation::SerialNumber, "serial_number", 323, Alphanumeric, ReadOnly,
        Decoding::Text, "Controller serial number"),
    window(Operation::PressureUnit, "pressure_unit", 600, Numeric, ReadWrite,
        Decoding::Enumerated, "Pressure unit: 0 Torr, 1 mbar, 2 Pa"),
    window(Operation::Voltage, "voltage", 810, Numeric, ReadOnly, Decoding::Integer,
        "Measured voltage, channel 1 (V)"),
    window(Operation::Current, "current", 811, Alphanumeric, ReadOnly, Decoding::Physical,
        "Measured current, channel 1 (A)"),
    window(Operation::Pressure, "pressure", 812, Alphanumeric, ReadOnly, Decoding::Physical,
        "Pressure, channel 1, X.XE-XX"),
    window(Operation::Label, "label", 890, Alphanumeric, ReadWrite, Decoding::Text,
        "Label, at most 10 characters"),
];

/// IPC Mini ion pump controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IpcMini;

impl Device for IpcMini {
    const MODEL: &'static str = "IPC Mini";
    const CATALOG: Catalog = Catalog::new(Self::MODEL, &WINDOWS);
    const IDENTIFY: Operation = Operation::ControllerModel;
    // The manual lists 0 as "OK"; the controller uses it for stop.
    const STATUS_CODES: &'static [(i64, PumpStatus)] = &[
        (0, PumpStatus::Stop),
        (5, PumpStatus::Normal),
        (6, PumpStatus::Fail),
    ];
    const UNIT_CODES: &'static [(i64, PressureUnit)] = &[
        (0, PressureUnit::Torr),
        (1, PressureUnit::MBar),
        (2, PressureUnit::Pa),
    ];
    type Errors = IonErrors;
}

pub type IpcMiniDriver = Driver<IpcMini>;

impl Driver<IpcMini> {
    /// High voltage on channel 1, in V.
    pub async fn read_voltage(&self) -> Result<i64> {
        self.read_integer(Operation::Voltage).await
    }

    /// Ion current on channel 1, in A.
    pub async fn read_current(&self) -> Result<f64> {
        self.read_float(Operation::Current).await
    }

    pub async fn controller_model(&self) -> Result<String> {
        self.read_text(Operation::ControllerModel).await
    }

    pub async fn serial_number(&self) -> Result<String> {
        self.read_text(Operation::SerialNumber).await
    }

    pub async fn label(&self) -> Result<String> {
        self.read_text(Operation::Label).await
    }

    pub async fn set_label(&self, label: &str) -> Result<()> {
        self.send(Operation::Label, Request::Write(Value::Text(label.to_string())))
            .await
            .map(|_| ())
    }
}
