use serde_json::{Map, Value as Json};

use crate::cmd::pump::{self, Pump};
use crate::cmd::LinkArgs;
use crate::exit::{CliResult, SUCCESS};
use crate::output::{print_record, OutputFormat};

/// One field of the report. `None` means the controller has the window
/// disabled.
type Field = (&'static str, Option<Json>);

pub async fn run(args: LinkArgs, format: OutputFormat) -> CliResult<i32> {
    let pump = Pump::connect(&args.link).await?;
    let result = collect(&pump).await;
    pump.close().await;
    let fields = result?;

    let mut record = Map::new();
    let mut rows = Vec::with_capacity(fields.len());
    for (name, value) in fields {
        let shown = match &value {
            Some(Json::String(text)) => text.clone(),
            Some(other) => other.to_string(),
            None => "unavailable".to_string(),
        };
        rows.push((name, shown));
        record.insert(name.to_string(), value.unwrap_or(Json::Null));
    }
    print_record(&record, &rows, format);
    Ok(SUCCESS)
}

async fn collect(pump: &Pump) -> CliResult<Vec<Field>> {
    let mut fields: Vec<Field> = vec![
        ("model", Some(pump.model().into())),
        ("state", Some(pump.state().as_str().into())),
        ("status", Some(pump.status().await?.as_str().into())),
        ("unit", Some(pump.pressure_unit().as_str().into())),
    ];

    match pump {
        Pump::Turbo(driver) => {
            fields.push(("pressure", optional("pressure", driver.read_pressure().await)?));
            fields.push((
                "speed_hz",
                optional("speed", driver.read_turbo_speed().await)?,
            ));
            fields.push((
                "power_w",
                optional("power", driver.read_pump_power().await)?,
            ));
            fields.push((
                "temperature_c",
                optional("temperature", driver.read_pump_temperature().await)?,
            ));
            fields.push((
                "soft_start",
                optional("soft start", driver.soft_start().await)?,
            ));
        }
        Pump::Ion(driver) => {
            fields.push((
                "controller",
                optional("controller model", driver.controller_model().await)?,
            ));
            fields.push((
                "serial_number",
                optional("serial number", driver.serial_number().await)?,
            ));
            fields.push(("label", optional("label", driver.label().await)?));
            fields.push(("pressure", optional("pressure", driver.read_pressure().await)?));
            fields.push(("voltage_v", optional("voltage", driver.read_voltage().await)?));
            fields.push(("current_a", optional("current", driver.read_current().await)?));
        }
    }
    Ok(fields)
}

fn optional<T: Into<Json>>(
    context: &str,
    result: agilent_vacuum_pumps::Result<T>,
) -> CliResult<Option<Json>> {
    pump::optional(context, result).map(|value| value.map(Into::into))
}
