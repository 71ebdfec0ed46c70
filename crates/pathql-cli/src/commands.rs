//! REPL dot-command handling.

use crate::formatter::OutputFormat;
use comfy_table::Table;
use pathql_core::Store;

/// Result of executing a command.
pub enum CommandResult {
    /// Exit the REPL.
    Exit,
    /// Output to display.
    Output(String),
    /// Change the output format.
    SetFormat(OutputFormat),
    /// Show history.
    ShowHistory,
    /// Clear screen.
    Clear,
}

/// Parse and execute a dot-command.
pub fn handle_command(line: &str, store: &Store, format: OutputFormat) -> CommandResult {
    let line = line.trim().trim_end_matches(';');
    let parts: Vec<&str> = line.splitn(2, ' ').collect();
    let command = parts[0].to_lowercase();
    let arg = parts.get(1).map(|s| s.trim()).filter(|s| !s.is_empty());

    match command.as_str() {
        ".exit" | ".quit" | ".q" => CommandResult::Exit,

        ".help" | ".h" | ".?" => CommandResult::Output(get_help()),

        ".clear" | ".cls" => CommandResult::Clear,

        ".history" => CommandResult::ShowHistory,

        ".format" => {
            if let Some(fmt) = arg {
                match fmt.to_lowercase().as_str() {
                    "json" => CommandResult::SetFormat(OutputFormat::Json),
                    "pretty" => CommandResult::SetFormat(OutputFormat::Pretty),
                    "table" => CommandResult::SetFormat(OutputFormat::Table),
                    _ => CommandResult::Output(format!(
                        "Unknown format '{}'. Use: json, pretty, table",
                        fmt
                    )),
                }
            } else {
                CommandResult::Output(format!("Current format: {}", format))
            }
        }

        ".types" => CommandResult::Output(format_types(store)),

        _ => CommandResult::Output(format!("Unknown command: {}", command)),
    }
}

/// Check if a line is a dot-command.
pub fn is_command(line: &str) -> bool {
    line.trim().starts_with('.')
}

/// List the store's type extents with their sizes.
fn format_types(store: &Store) -> String {
    let mut table = Table::new();
    table.set_header(vec!["Type", "Objects"]);

    let mut names: Vec<&str> = store.type_names().collect();
    names.sort_unstable();
    for name in names {
        table.add_row(vec![name.to_string(), store.extent(name).count().to_string()]);
    }

    table.to_string()
}

/// Get help text for REPL commands.
fn get_help() -> String {
    r#"REPL Commands
=============

.types                Show the store's types and object counts
.format [type]        Get or set output format (json, pretty, table)
.history              Show query history
.clear                Clear the screen
.help                 Show this help message
.exit / .quit         Exit the REPL

Queries
=======
A query is a JSON expression tree ended by ';' and may span lines.

Examples:
  {"kind": "path", "steps": [{"kind": "object_ref", "name": "Person"},
                             {"kind": "ptr", "name": "name"}]};

  {"kind": "call", "func": "count",
   "args": [{"kind": "path", "steps": [{"kind": "object_ref", "name": "Card"}]}]};
"#
    .to_string()
}
