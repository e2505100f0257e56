use std::io::IsTerminal;

use agilent_vacuum_dispatch::{Catalog, DataType, Permission};
use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use serde::Serialize;

#[derive(Clone, Debug, Copy, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
}

impl OutputFormat {
    pub fn default_for_stdout() -> Self {
        if std::io::stdout().is_terminal() {
            Self::Table
        } else {
            Self::Json
        }
    }
}

/// Print one record: the serialized value for JSON, `rows` otherwise.
pub fn print_record<T: Serialize>(out: &T, rows: &[(&str, String)], format: OutputFormat) {
    match format {
        OutputFormat::Json => println!("{}", to_json(out)),
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["FIELD", "VALUE"]);
            for (field, value) in rows {
                table.add_row(vec![field.to_string(), value.clone()]);
            }
            println!("{table}");
        }
        OutputFormat::Pretty => {
            let width = rows.iter().map(|(field, _)| field.len()).max().unwrap_or(0);
            for (field, value) in rows {
                println!("  {field:<width$}  {value}");
            }
        }
    }
}

/// Print one line per sample, for streaming output.
pub fn print_sample<T: Serialize>(out: &T, rows: &[(&str, String)], format: OutputFormat) {
    match format {
        OutputFormat::Json => println!("{}", to_json(out)),
        OutputFormat::Table | OutputFormat::Pretty => {
            let line = rows
                .iter()
                .map(|(field, value)| format!("{field}={value}"))
                .collect::<Vec<_>>()
                .join(" ");
            println!("{line}");
        }
    }
}

#[derive(Serialize)]
struct WindowRow {
    window: u16,
    name: &'static str,
    operation: &'static str,
    data_type: &'static str,
    writable: bool,
    description: &'static str,
}

pub fn print_catalog(catalog: &Catalog, format: OutputFormat) {
    let rows: Vec<WindowRow> = catalog
        .iter()
        .map(|d| WindowRow {
            window: d.window,
            name: d.name,
            operation: d.operation.as_str(),
            data_type: data_type_name(d.data_type),
            writable: d.permission == Permission::ReadWrite,
            description: d.description,
        })
        .collect();

    match format {
        OutputFormat::Json => println!("{}", to_json(&rows)),
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["WINDOW", "NAME", "TYPE", "ACCESS", "DESCRIPTION"]);
            for row in &rows {
                table.add_row(vec![
                    format!("{:03}", row.window),
                    row.name.to_string(),
                    row.data_type.to_string(),
                    access_name(row.writable).to_string(),
                    row.description.to_string(),
                ]);
            }
            println!("{} windows", catalog.model());
            println!("{table}");
        }
        OutputFormat::Pretty => {
            for row in &rows {
                println!(
                    "{:03} {:<18} {:<12} {:<2} {}",
                    row.window,
                    row.name,
                    row.data_type,
                    access_name(row.writable),
                    row.description
                );
            }
        }
    }
}

fn data_type_name(data_type: DataType) -> &'static str {
    match data_type {
        DataType::Logic => "logic",
        DataType::Numeric => "numeric",
        DataType::Alphanumeric => "alphanumeric",
    }
}

fn access_name(writable: bool) -> &'static str {
    if writable {
        "rw"
    } else {
        "r"
    }
}

fn to_json<T: Serialize + ?Sized>(value: &T) -> String {
    serde_json::to_string(value).unwrap_or_else(|_| "{}".to_string())
}
