use serde::Serialize;

use crate::cmd::pump::Pump;
use crate::cmd::LinkArgs;
use crate::exit::{CliResult, SUCCESS};
use crate::output::{print_record, OutputFormat};

#[derive(Serialize)]
struct StatusRecord {
    model: &'static str,
    state: &'static str,
    status: &'static str,
    running: bool,
    error_bits: u16,
    errors: Vec<&'static str>,
}

pub async fn status(args: LinkArgs, format: OutputFormat) -> CliResult<i32> {
    let pump = Pump::connect(&args.link).await?;
    let result = read_status(&pump).await;
    pump.close().await;
    let record = result?;

    let errors = if record.errors.is_empty() {
        "none".to_string()
    } else {
        record.errors.join(", ")
    };
    let rows = [
        ("model", record.model.to_string()),
        ("state", record.state.to_string()),
        ("status", record.status.to_string()),
        ("errors", format!("{errors} (0x{:02X})", record.error_bits)),
    ];
    print_record(&record, &rows, format);
    Ok(SUCCESS)
}

async fn read_status(pump: &Pump) -> CliResult<StatusRecord> {
    let status = pump.status().await?;
    let errors = pump.errors().await?;
    Ok(StatusRecord {
        model: pump.model(),
        state: pump.state().as_str(),
        status: status.as_str(),
        running: status.is_running(),
        error_bits: errors.bits,
        errors: errors.names,
    })
}

#[derive(Serialize)]
struct PressureRecord {
    model: &'static str,
    pressure: f64,
    unit: &'static str,
}

pub async fn pressure(args: LinkArgs, format: OutputFormat) -> CliResult<i32> {
    let pump = Pump::connect(&args.link).await?;
    let result = pump.pressure().await;
    let unit = pump.pressure_unit();
    let model = pump.model();
    pump.close().await;

    let record = PressureRecord {
        model,
        pressure: result?,
        unit: unit.as_str(),
    };
    let rows = [("pressure", format!("{:.3e} {}", record.pressure, record.unit))];
    print_record(&record, &rows, format);
    Ok(SUCCESS)
}
