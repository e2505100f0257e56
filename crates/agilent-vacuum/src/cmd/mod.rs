use std::time::Duration;

use agilent_vacuum_dispatch::Catalog;
use agilent_vacuum_pumps::{Device, IpcMini, PressureUnit, TwisTorr74};
use clap::{Args, Subcommand, ValueEnum};

use crate::exit::{CliError, CliResult, USAGE};
use crate::output::OutputFormat;

pub mod control;
pub mod info;
pub mod pump;
pub mod status;
pub mod version;
pub mod watch;
pub mod windows;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Read pump status and error register.
    Status(LinkArgs),
    /// Start the pump (HV on for ion pumps).
    Start(LinkArgs),
    /// Stop the pump (HV off for ion pumps).
    Stop(LinkArgs),
    /// Read the pressure gauge.
    Pressure(LinkArgs),
    /// Show or change the pressure unit.
    Unit(UnitArgs),
    /// Read identification and operating values.
    Info(LinkArgs),
    /// Poll status and pressure until interrupted.
    Watch(WatchArgs),
    /// List the windows known for a controller model.
    Windows(WindowsArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub async fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Status(args) => status::status(args, format).await,
        Command::Start(args) => control::start(args, format).await,
        Command::Stop(args) => control::stop(args, format).await,
        Command::Pressure(args) => status::pressure(args, format).await,
        Command::Unit(args) => control::unit(args, format).await,
        Command::Info(args) => info::run(args, format).await,
        Command::Watch(args) => watch::run(args, format).await,
        Command::Windows(args) => windows::run(args, format),
        Command::Version(args) => version::run(args),
    }
}

/// Controller model.
#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum DeviceKind {
    /// TwisTorr 74 FS turbo pump controller.
    #[value(name = "twistorr74")]
    TwisTorr74,
    /// IPC Mini ion pump controller.
    #[value(name = "ipcmini")]
    IpcMini,
}

impl DeviceKind {
    pub fn catalog(self) -> Catalog {
        match self {
            DeviceKind::TwisTorr74 => TwisTorr74::CATALOG,
            DeviceKind::IpcMini => IpcMini::CATALOG,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum ParityArg {
    None,
    Odd,
    Even,
}

#[derive(Args, Debug)]
pub struct LinkArgs {
    #[command(flatten)]
    pub link: ConnectionArgs,
}

/// Where and how to reach the controller.
#[derive(Args, Debug, Clone)]
pub struct ConnectionArgs {
    /// Controller model.
    #[arg(long, value_enum, default_value = "twistorr74", env = "AGILENT_VACUUM_DEVICE")]
    pub device: DeviceKind,

    /// Serial port (e.g. /dev/ttyUSB0, COM3).
    #[arg(long, conflicts_with = "tcp", env = "AGILENT_VACUUM_PORT")]
    pub port: Option<String>,

    /// Serial baud rate.
    #[arg(long, default_value_t = 9600, env = "AGILENT_VACUUM_BAUD")]
    pub baud: u32,

    /// Serial parity.
    #[arg(long, value_enum, default_value = "none")]
    pub parity: ParityArg,

    /// Serial stop bits.
    #[arg(long, default_value_t = 1, value_parser = clap::value_parser!(u8).range(1..=2))]
    pub stop_bits: u8,

    /// LAN interface as host[:port] (port defaults to 23).
    #[arg(long, value_name = "HOST[:PORT]", env = "AGILENT_VACUUM_TCP")]
    pub tcp: Option<String>,

    /// Controller address (RS-485 multidrop).
    #[arg(long, default_value_t = 0, value_parser = clap::value_parser!(u8).range(0..=31))]
    pub address: u8,

    /// Reply timeout per attempt (e.g. 500ms, 1s).
    #[arg(long, default_value = "500ms", env = "AGILENT_VACUUM_TIMEOUT")]
    pub timeout: String,

    /// Attempts per command, including the first.
    #[arg(long, default_value_t = 3, value_parser = clap::value_parser!(u32).range(1..=10))]
    pub attempts: u32,
}

#[derive(Args, Debug)]
pub struct UnitArgs {
    #[command(flatten)]
    pub link: ConnectionArgs,
    /// Switch the controller to this unit (mbar, pa, torr).
    #[arg(long, value_parser = parse_unit)]
    pub set: Option<PressureUnit>,
}

#[derive(Args, Debug)]
pub struct WatchArgs {
    #[command(flatten)]
    pub link: ConnectionArgs,
    /// Time between samples (e.g. 1s, 250ms).
    #[arg(long, default_value = "1s")]
    pub interval: String,
    /// Exit after N samples.
    #[arg(long)]
    pub count: Option<usize>,
}

#[derive(Args, Debug)]
pub struct WindowsArgs {
    /// Controller model.
    #[arg(long, value_enum, default_value = "twistorr74", env = "AGILENT_VACUUM_DEVICE")]
    pub device: DeviceKind,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

fn parse_unit(input: &str) -> Result<PressureUnit, String> {
    input.parse::<PressureUnit>().map_err(|err| err.to_string())
}

/// Parse a duration such as `5s`, `250ms` or `2` (seconds).
pub fn parse_timeout(input: &str) -> CliResult<Duration> {
    let input = input.trim();
    if input.is_empty() {
        return Err(CliError::new(USAGE, "duration must not be empty"));
    }

    let (number, unit) = if let Some(num) = input.strip_suffix("ms") {
        (num, "ms")
    } else if let Some(num) = input.strip_suffix('s') {
        (num, "s")
    } else {
        (input, "s")
    };

    let value: u64 = number
        .parse()
        .map_err(|_| CliError::new(USAGE, format!("invalid duration: {input}")))?;

    if value == 0 {
        return Err(CliError::new(USAGE, "duration must be greater than zero"));
    }

    match unit {
        "ms" => Ok(Duration::from_millis(value)),
        _ => Ok(Duration::from_secs(value)),
    }
}
