use clap::ValueEnum;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

/// Overrides `--log-level` with full filter directives, e.g.
/// `agilent_vacuum_dispatch=trace,warn`.
pub const LOG_ENV: &str = "AGILENT_VACUUM_LOG";

/// Prefix shared by the targets of every crate in this workspace.
const OWN_TARGETS: &str = "agilent_vacuum";

#[derive(Copy, Clone, Debug, ValueEnum)]
pub enum LogFormat {
    Text,
    Json,
}

#[derive(Copy, Clone, Debug, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub fn as_filter(self) -> LevelFilter {
        match self {
            LogLevel::Error => LevelFilter::ERROR,
            LogLevel::Warn => LevelFilter::WARN,
            LogLevel::Info => LevelFilter::INFO,
            LogLevel::Debug => LevelFilter::DEBUG,
            LogLevel::Trace => LevelFilter::TRACE,
        }
    }

    /// At debug and below the emitting layer (transport, framing, dispatch,
    /// driver) is worth printing.
    fn shows_targets(self) -> bool {
        matches!(self, LogLevel::Debug | LogLevel::Trace)
    }
}

/// Filter for `level`: our own crates log at `level`, dependencies such as
/// the serial and async runtimes never go below warn.
fn directives(level: LogLevel) -> String {
    let own = level.as_filter();
    let deps = own.min(LevelFilter::WARN);
    format!("{deps},{OWN_TARGETS}={own}").to_lowercase()
}

/// Install the stderr subscriber. Stdout stays reserved for command output.
pub fn init_logging(format: LogFormat, level: LogLevel) {
    let filter = match std::env::var(LOG_ENV) {
        Ok(custom) => EnvFilter::try_new(&custom).unwrap_or_else(|err| {
            eprintln!("warning: ignoring {LOG_ENV}={custom}: {err}");
            EnvFilter::new(directives(level))
        }),
        Err(_) => EnvFilter::new(directives(level)),
    };

    let builder = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(filter)
        .with_ansi(false)
        .with_target(level.shows_targets());

    let installed = match format {
        LogFormat::Text => builder.try_init(),
        LogFormat::Json => builder.json().try_init(),
    };
    if let Err(err) = installed {
        eprintln!("warning: logging not initialized: {err}");
    }
}
