//! Rendering query results.

use std::io::Write;

use colored::*;
use qail_clickhouse::{QueryResult, Row, Value};
use serde_json::{Map, Number};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum OutputFormat {
    #[default]
    Table,
    Json,
}

/// Column headings: names from the response header, else `c0`, `c1`, ...
pub fn column_names(result: &QueryResult) -> Vec<String> {
    if let Some(columns) = &result.columns {
        return columns.names.clone();
    }
    positional_names(result.rows())
}

/// `c0`, `c1`, ... sized by the first row.
pub fn positional_names(rows: &[Row]) -> Vec<String> {
    let width = rows.first().map(Row::len).unwrap_or(0);
    (0..width).map(|i| format!("c{}", i)).collect()
}

pub fn value_to_json(value: &Value) -> serde_json::Value {
    use serde_json::Value as Json;
    match value {
        Value::Null => Json::Null,
        Value::Bool(b) => Json::Bool(*b),
        Value::Int(n) => Json::Number((*n).into()),
        Value::UInt(n) => Json::Number((*n).into()),
        Value::Float(f) => Number::from_f64(*f)
            .map(Json::Number)
            .unwrap_or_else(|| Json::String(f.to_string())),
        Value::Array(items) | Value::Tuple(items) => {
            Json::Array(items.iter().map(value_to_json).collect())
        }
        Value::Map(entries) => {
            let object: Map<String, Json> = entries
                .iter()
                .map(|(k, v)| (k.to_string(), value_to_json(v)))
                .collect();
            Json::Object(object)
        }
        // wide integers, decimals, dates, strings: text keeps them exact
        other => Json::String(other.to_string()),
    }
}

pub fn rows_to_json(names: &[String], rows: &[Row]) -> serde_json::Value {
    let rows = rows
        .iter()
        .map(|row| {
            let object: Map<String, serde_json::Value> = names
                .iter()
                .cloned()
                .zip(row.values().iter().map(value_to_json))
                .collect();
            serde_json::Value::Object(object)
        })
        .collect();
    serde_json::Value::Array(rows)
}

/// One compact JSON object per row, for streamed output.
pub fn json_lines(names: &[String], rows: &[Row]) -> Vec<String> {
    match rows_to_json(names, rows) {
        serde_json::Value::Array(items) => items.iter().map(|item| item.to_string()).collect(),
        _ => Vec::new(),
    }
}

/// Plain-text table without colors, one line per row.
pub fn table_lines(names: &[String], rows: &[Row]) -> Vec<String> {
    let cells: Vec<Vec<String>> = rows
        .iter()
        .map(|row| row.values().iter().map(Value::to_string).collect())
        .collect();
    let mut widths: Vec<usize> = names.iter().map(|n| n.chars().count()).collect();
    for row in &cells {
        for (w, cell) in widths.iter_mut().zip(row) {
            *w = (*w).max(cell.chars().count());
        }
    }

    let line = |items: &[String], sep: &str| {
        items
            .iter()
            .zip(&widths)
            .map(|(item, w)| format!("{:width$}", item, width = *w))
            .collect::<Vec<_>>()
            .join(sep)
    };
    let mut lines = Vec::with_capacity(cells.len() + 2);
    lines.push(line(names, " │ "));
    lines.push(
        widths
            .iter()
            .map(|w| "─".repeat(*w))
            .collect::<Vec<_>>()
            .join("─┼─"),
    );
    for row in &cells {
        lines.push(line(row, " │ "));
    }
    lines
}

/// Print a result to stdout.
pub fn print_result(result: &QueryResult, format: OutputFormat) -> std::io::Result<()> {
    let mut out = std::io::stdout().lock();

    if result.command.is_insert() {
        writeln!(
            out,
            "{} {} row(s) written",
            "✓".green(),
            result.num_rows.unwrap_or(0)
        )?;
        return Ok(());
    }
    if let Some(data) = &result.data {
        out.write_all(data)?;
        return out.flush();
    }

    let names = column_names(result);
    match format {
        OutputFormat::Json => {
            let json = rows_to_json(&names, result.rows());
            writeln!(
                out,
                "{}",
                serde_json::to_string_pretty(&json).unwrap_or_default()
            )?;
        }
        OutputFormat::Table => {
            if result.rows().is_empty() {
                writeln!(out, "{}", "(no results)".dimmed())?;
                return Ok(());
            }
            let lines = table_lines(&names, result.rows());
            writeln!(out, "{}", lines[0].white().bold())?;
            writeln!(out, "{}", lines[1].dimmed())?;
            for line in &lines[2..] {
                writeln!(out, "{}", line)?;
            }
            writeln!(out)?;
            writeln!(
                out,
                "{} row(s) returned",
                result.rows().len().to_string().cyan()
            )?;
        }
    }
    Ok(())
}
