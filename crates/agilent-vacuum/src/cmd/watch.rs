use std::time::{SystemTime, UNIX_EPOCH};

use serde::Serialize;
use tokio::time::{interval, MissedTickBehavior};

use crate::cmd::pump::Pump;
use crate::cmd::{parse_timeout, WatchArgs};
use crate::exit::{CliResult, SUCCESS};
use crate::output::{print_sample, OutputFormat};

#[derive(Serialize)]
struct Sample {
    ts_ms: u128,
    seq: usize,
    status: &'static str,
    /// `None` while the gauge window is disabled.
    pressure: Option<f64>,
    unit: &'static str,
    errors: Vec<&'static str>,
}

pub async fn run(args: WatchArgs, format: OutputFormat) -> CliResult<i32> {
    let period = parse_timeout(&args.interval)?;
    let pump = Pump::connect(&args.link).await?;

    let result = poll(&pump, period, args.count, format).await;
    pump.close().await;
    result.map(|_| SUCCESS)
}

async fn poll(
    pump: &Pump,
    period: std::time::Duration,
    count: Option<usize>,
    format: OutputFormat,
) -> CliResult<()> {
    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut seq = 0usize;

    loop {
        if count.is_some_and(|max| seq >= max) {
            return Ok(());
        }

        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                tracing::info!(samples = seq, "interrupted");
                return Ok(());
            }
            _ = ticker.tick() => {}
        }

        seq += 1;
        let sample = Sample {
            ts_ms: now_ms(),
            seq,
            status: pump.status().await?.as_str(),
            pressure: pump.pressure_if_enabled().await?,
            unit: pump.pressure_unit().as_str(),
            errors: pump.errors().await?.names,
        };
        let errors = if sample.errors.is_empty() {
            "none".to_string()
        } else {
            sample.errors.join(",")
        };
        let rows = [
            ("seq", sample.seq.to_string()),
            ("status", sample.status.to_string()),
            (
                "pressure",
                sample
                    .pressure
                    .map_or_else(|| "unavailable".to_string(), |p| format!("{p:.3e}")),
            ),
            ("unit", sample.unit.to_string()),
            ("errors", errors),
        ];
        print_sample(&sample, &rows, format);
    }
}

fn now_ms() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or(0)
}
