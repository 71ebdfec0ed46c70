//! Output formatters for query results.

use clap::ValueEnum;
use comfy_table::{Cell, Table};
use serde_json::Value as Json;

/// Output format for results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Compact JSON on one line
    Json,
    /// Indented JSON
    Pretty,
    /// ASCII table format
    Table,
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::Json => write!(f, "json"),
            OutputFormat::Pretty => write!(f, "pretty"),
            OutputFormat::Table => write!(f, "table"),
        }
    }
}

/// Trait for formatting output.
pub trait Formatter: Send + Sync {
    /// Format a rendered query result (always a JSON array).
    fn format_result(&self, result: &Json) -> String;

    /// Format an error message.
    fn format_error(&self, error: &str) -> String;

    /// Format a simple message.
    fn format_message(&self, message: &str) -> String;
}

/// Create a formatter for the given output format.
pub fn create_formatter(format: OutputFormat) -> Box<dyn Formatter> {
    match format {
        OutputFormat::Json => Box::new(JsonFormatter { pretty: false }),
        OutputFormat::Pretty => Box::new(JsonFormatter { pretty: true }),
        OutputFormat::Table => Box::new(TableFormatter),
    }
}

/// JSON formatter.
pub struct JsonFormatter {
    pretty: bool,
}

impl Formatter for JsonFormatter {
    fn format_result(&self, result: &Json) -> String {
        if self.pretty {
            serde_json::to_string_pretty(result).unwrap_or_else(|_| "[]".to_string())
        } else {
            result.to_string()
        }
    }

    fn format_error(&self, error: &str) -> String {
        serde_json::json!({ "error": error }).to_string()
    }

    fn format_message(&self, message: &str) -> String {
        serde_json::json!({ "message": message }).to_string()
    }
}

/// Table formatter using comfy-table.
///
/// Results whose every element is a JSON object (shaped objects, named
/// tuples) get one column per key; anything else is a single `value` column.
pub struct TableFormatter;

impl Formatter for TableFormatter {
    fn format_result(&self, result: &Json) -> String {
        let rows: &[Json] = match result {
            Json::Array(rows) => rows,
            other => std::slice::from_ref(other),
        };
        if rows.is_empty() {
            return "No results".to_string();
        }

        let mut table = Table::new();
        match column_names(rows) {
            Some(columns) => {
                table.set_header(columns.iter().map(Cell::new).collect::<Vec<_>>());
                for row in rows {
                    let cells: Vec<Cell> = columns
                        .iter()
                        .map(|column| Cell::new(format_cell(row.get(column.as_str()).unwrap_or(&Json::Null))))
                        .collect();
                    table.add_row(cells);
                }
            }
            None => {
                table.set_header(vec![Cell::new("value")]);
                for row in rows {
                    table.add_row(vec![Cell::new(format_cell(row))]);
                }
            }
        }

        format!("{}\n{} row(s)", table, rows.len())
    }

    fn format_error(&self, error: &str) -> String {
        format!("Error: {}", error)
    }

    fn format_message(&self, message: &str) -> String {
        message.to_string()
    }
}

/// Union of object keys in first-seen order, or `None` if any row is not an object.
fn column_names(rows: &[Json]) -> Option<Vec<String>> {
    let mut columns: Vec<String> = Vec::new();
    for row in rows {
        for key in row.as_object()?.keys() {
            if !columns.contains(key) {
                columns.push(key.clone());
            }
        }
    }
    Some(columns)
}

/// Format a JSON value for a table cell.
///
/// Strings are unquoted and shape field lists are comma-joined; nested
/// structures stay compact JSON.
fn format_cell(value: &Json) -> String {
    match value {
        Json::Null => String::new(),
        Json::String(s) => s.clone(),
        Json::Array(items) if items.iter().all(|item| !item.is_array() && !item.is_object()) => items
            .iter()
            .map(format_cell)
            .collect::<Vec<_>>()
            .join(", "),
        other => other.to_string(),
    }
}
