use serde::Serialize;

use crate::cmd::pump::Pump;
use crate::cmd::{LinkArgs, UnitArgs};
use crate::exit::{CliResult, SUCCESS};
use crate::output::{print_record, OutputFormat};

#[derive(Serialize)]
struct CommandRecord {
    model: &'static str,
    command: &'static str,
    state: &'static str,
}

pub async fn start(args: LinkArgs, format: OutputFormat) -> CliResult<i32> {
    let pump = Pump::connect(&args.link).await?;
    let result = pump.start().await;
    let record = CommandRecord {
        model: pump.model(),
        command: "start",
        state: pump.state().as_str(),
    };
    pump.close().await;
    result?;

    tracing::info!(model = record.model, "start acknowledged");
    print_command(&record, format);
    Ok(SUCCESS)
}

pub async fn stop(args: LinkArgs, format: OutputFormat) -> CliResult<i32> {
    let pump = Pump::connect(&args.link).await?;
    let result = pump.force_stop().await;
    let record = CommandRecord {
        model: pump.model(),
        command: "stop",
        state: pump.state().as_str(),
    };
    pump.close().await;
    result?;

    tracing::info!(model = record.model, "stop acknowledged");
    print_command(&record, format);
    Ok(SUCCESS)
}

fn print_command(record: &CommandRecord, format: OutputFormat) {
    let rows = [
        ("model", record.model.to_string()),
        ("command", record.command.to_string()),
        ("result", "acknowledged".to_string()),
    ];
    print_record(record, &rows, format);
}

#[derive(Serialize)]
struct UnitRecord {
    model: &'static str,
    unit: &'static str,
    changed: bool,
}

pub async fn unit(args: UnitArgs, format: OutputFormat) -> CliResult<i32> {
    let pump = Pump::connect(&args.link).await?;
    let result = match args.set {
        Some(unit) => pump.set_unit(unit).await,
        None => pump.read_unit().await,
    };
    let model = pump.model();
    pump.close().await;

    let record = UnitRecord {
        model,
        unit: result?.as_str(),
        changed: args.set.is_some(),
    };
    let rows = [
        ("model", record.model.to_string()),
        ("unit", record.unit.to_string()),
    ];
    print_record(&record, &rows, format);
    Ok(SUCCESS)
}
