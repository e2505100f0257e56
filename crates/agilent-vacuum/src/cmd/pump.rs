use agilent_vacuum_dispatch::{DispatchConfig, ErrorKind, Operation, Request, Value};
use agilent_vacuum_pumps::{
    flag_names, DriverConfig, DriverState, IpcMiniDriver, PressureUnit, PumpStatus,
    TwisTorr74Driver,
};
use agilent_vacuum_transport::{LinkConfig, TcpConfig};

use crate::cmd::{parse_timeout, ConnectionArgs, DeviceKind};
use crate::exit::{driver_error, CliError, CliResult, USAGE};

/// A connected controller of either supported model.
pub enum Pump {
    Turbo(TwisTorr74Driver),
    Ion(IpcMiniDriver),
}

macro_rules! each {
    ($pump:expr, $driver:ident => $body:expr) => {
        match $pump {
            Pump::Turbo($driver) => $body,
            Pump::Ion($driver) => $body,
        }
    };
}

/// Error register as raw bits plus the names of the set flags.
pub struct ErrorRegister {
    pub bits: u16,
    pub names: Vec<&'static str>,
}

impl Pump {
    /// Build the driver for `args` and run the connect handshake.
    pub async fn connect(args: &ConnectionArgs) -> CliResult<Self> {
        Self::connect_with(args, None).await
    }

    /// Like [`Pump::connect`], applying `unit` during the handshake.
    pub async fn connect_with(args: &ConnectionArgs, unit: Option<PressureUnit>) -> CliResult<Self> {
        let link = link_config(args)?;
        let config = DriverConfig {
            dispatch: DispatchConfig {
                address: args.address,
                response_timeout: parse_timeout(&args.timeout)?,
                max_attempts: args.attempts,
                ..DispatchConfig::default()
            },
            pressure_unit: unit,
        };

        tracing::debug!(device = ?args.device, address = args.address, "connecting");
        let pump = match args.device {
            DeviceKind::TwisTorr74 => Pump::Turbo(TwisTorr74Driver::new(link, config)),
            DeviceKind::IpcMini => Pump::Ion(IpcMiniDriver::new(link, config)),
        };
        each!(&pump, d => d.connect().await).map_err(|err| driver_error("connect", err))?;
        Ok(pump)
    }

    /// Close the session. Failures are logged, not reported.
    pub async fn close(self) {
        if let Err(err) = each!(&self, d => d.disconnect().await) {
            tracing::debug!(error = %err, "disconnect failed");
        }
    }

    pub fn model(&self) -> &'static str {
        each!(self, d => d.model())
    }

    pub fn state(&self) -> DriverState {
        each!(self, d => d.state())
    }

    pub fn pressure_unit(&self) -> PressureUnit {
        each!(self, d => d.pressure_unit())
    }

    pub async fn status(&self) -> CliResult<PumpStatus> {
        each!(self, d => d.get_status().await).map_err(|err| driver_error("status", err))
    }

    pub async fn errors(&self) -> CliResult<ErrorRegister> {
        each!(self, d => d
            .get_error()
            .await
            .map(|flags| ErrorRegister { bits: flags.bits(), names: flag_names(&flags) }))
        .map_err(|err| driver_error("error register", err))
    }

    pub async fn pressure(&self) -> CliResult<f64> {
        each!(self, d => d.read_pressure().await).map_err(|err| driver_error("pressure", err))
    }

    /// Pressure, or `None` while the gauge window is disabled.
    pub async fn pressure_if_enabled(&self) -> CliResult<Option<f64>> {
        optional("pressure", each!(self, d => d.read_pressure().await))
    }

    pub async fn read_unit(&self) -> CliResult<PressureUnit> {
        each!(self, d => d.get_pressure_unit().await)
            .map_err(|err| driver_error("pressure unit", err))
    }

    pub async fn set_unit(&self, unit: PressureUnit) -> CliResult<PressureUnit> {
        each!(self, d => d.set_pressure_unit(unit).await)
            .map_err(|err| driver_error("pressure unit", err))
    }

    pub async fn start(&self) -> CliResult<()> {
        each!(self, d => d.start().await).map_err(|err| driver_error("start", err))
    }

    /// Write the stop command regardless of the cached state.
    ///
    /// A fresh connection lands in idle even when the pump is spinning, so
    /// the driver's own `stop` would refuse.
    pub async fn force_stop(&self) -> CliResult<()> {
        let request = Request::Write(Value::Logic(false));
        each!(self, d => d.send(Operation::StartStop, request).await)
            .map(|_| ())
            .map_err(|err| driver_error("stop", err))
    }
}

/// Map a disabled window to `None`; other failures become CLI errors.
pub fn optional<T>(
    context: &str,
    result: agilent_vacuum_pumps::Result<T>,
) -> CliResult<Option<T>> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(err) if err.kind() == ErrorKind::WindowDisabled => {
            tracing::debug!(field = context, "window disabled");
            Ok(None)
        }
        Err(err) => Err(driver_error(context, err)),
    }
}

fn link_config(args: &ConnectionArgs) -> CliResult<LinkConfig> {
    if let Some(target) = &args.tcp {
        return tcp_config(target).map(LinkConfig::Tcp);
    }
    match &args.port {
        Some(port) => serial_config(port, args),
        None => Err(CliError::new(
            USAGE,
            "no link given: pass --port <PATH> or --tcp <HOST[:PORT]>",
        )),
    }
}

fn tcp_config(target: &str) -> CliResult<TcpConfig> {
    let (host, port) = match target.rsplit_once(':') {
        Some((host, port)) if !host.contains(':') => {
            let port = port
                .parse::<u16>()
                .map_err(|_| CliError::new(USAGE, format!("invalid TCP port in {target}")))?;
            (host, Some(port))
        }
        _ => (target, None),
    };
    if host.is_empty() {
        return Err(CliError::new(USAGE, "TCP host must not be empty"));
    }

    let mut config = TcpConfig::new(host);
    if let Some(port) = port {
        config.port = port;
    }
    Ok(config)
}

#[cfg(feature = "serial")]
fn serial_config(port: &str, args: &ConnectionArgs) -> CliResult<LinkConfig> {
    use agilent_vacuum_transport::{Parity, SerialConfig, StopBits};

    use crate::cmd::ParityArg;

    let mut config = SerialConfig::new(port);
    config.baud_rate = args.baud;
    config.parity = match args.parity {
        ParityArg::None => Parity::None,
        ParityArg::Odd => Parity::Odd,
        ParityArg::Even => Parity::Even,
    };
    config.stop_bits = if args.stop_bits == 2 {
        StopBits::Two
    } else {
        StopBits::One
    };
    Ok(LinkConfig::Serial(config))
}

#[cfg(not(feature = "serial"))]
fn serial_config(port: &str, _args: &ConnectionArgs) -> CliResult<LinkConfig> {
    Err(CliError::new(
        USAGE,
        format!("cannot open {port}: built without serial support"),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tcp_target_with_port() {
        let config = tcp_config("10.0.0.5:4001").unwrap();
        assert_eq!(config.host, "10.0.0.5");
        assert_eq!(config.port, 4001);
    }

    #[test]
    fn tcp_target_defaults_to_telnet_port() {
        let config = tcp_config("pump-lab.local").unwrap();
        assert_eq!(config.host, "pump-lab.local");
        assert_eq!(config.port, 23);
    }

    #[test]
    fn tcp_target_rejects_bad_port() {
        assert_eq!(tcp_config("10.0.0.5:telnet").unwrap_err().code, USAGE);
        assert_eq!(tcp_config(":23").unwrap_err().code, USAGE);
    }
}
