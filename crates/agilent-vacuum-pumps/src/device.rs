use std::fmt;

use agilent_vacuum_dispatch::{
    Catalog, CommandDescriptor, DataType, Decoding, Operation, Permission,
};
use bitflags::Flags;

use crate::status::{PressureUnit, PumpStatus};

/// Static profile of a controller model.
///
/// Everything the generic [`Driver`](crate::Driver) needs to know about a
/// model is data: its window catalog, which operation identifies it and how
/// its enumerated codes map to status and unit values.
pub trait Device: Send + Sync + 'static {
    /// Human readable model name.
    const MODEL: &'static str;

    /// Supported windows.
    const CATALOG: Catalog;

    /// Read once on connect to check the controller answers.
    const IDENTIFY: Operation;

    /// Status window codes.
    const STATUS_CODES: &'static [(i64, PumpStatus)];

    /// Pressure unit window codes.
    const UNIT_CODES: &'static [(i64, PressureUnit)];

    /// Bit layout of the error register.
    type Errors: Flags<Bits = u16> + Copy + fmt::Debug + Send + Sync;

    fn status_from_code(code: i64) -> Option<PumpStatus> {
        Self::STATUS_CODES
            .iter()
            .find(|(c, _)| *c == code)
            .map(|(_, status)| *status)
    }

    fn unit_from_code(code: i64) -> Option<PressureUnit> {
        Self::UNIT_CODES
            .iter()
            .find(|(c, _)| *c == code)
            .map(|(_, unit)| *unit)
    }

    fn unit_code(unit: PressureUnit) -> Option<i64> {
        Self::UNIT_CODES
            .iter()
            .find(|(_, u)| *u == unit)
            .map(|(code, _)| *code)
    }
}

/// One catalog row.
pub(crate) const fn window(
    operation: Operation,
    name: &'static str,
    window: u16,
    data_type: DataType,
    permission: Permission,
    decoding: Decoding,
    description: &'static str,
) -> CommandDescriptor {
    CommandDescriptor {
        operation,
        name,
        window,
        data_type,
        permission,
        decoding,
        description,
    }
}
