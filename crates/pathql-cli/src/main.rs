//! pathql Command-Line Client
//!
//! Runs pathql expression trees (JSON) against a store fixture.

mod commands;
mod completer;
mod executor;
mod formatter;
mod repl;

use clap::Parser;
use executor::Session;
use formatter::OutputFormat;
use pathql_core::{fixtures, EvalBudget, Store};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

/// pathql Command-Line Client
#[derive(Parser, Debug)]
#[command(name = "pathql")]
#[command(version, about = "Evaluate pathql queries against a graph store fixture")]
pub struct Args {
    /// Store fixture (JSON); the bundled sample store when omitted
    #[arg(long)]
    pub fixture: Option<PathBuf>,

    /// Execute a single query (JSON expression tree) and exit
    #[arg(short = 'c', long)]
    pub command: Option<String>,

    /// Execute queries from file, separated by lines holding only ';'
    #[arg(short = 'f', long)]
    pub file: Option<PathBuf>,

    /// Output format
    #[arg(long, default_value = "json", value_enum)]
    pub format: OutputFormat,

    /// Maximum evaluation depth
    #[arg(long)]
    pub max_depth: Option<usize>,

    /// Maximum size of any intermediate result
    #[arg(long)]
    pub max_rows: Option<usize>,
}

fn main() {
    // Logs go to stderr so results can be piped.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("pathql=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    if let Err(e) = run(args) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn run(args: Args) -> Result<(), Box<dyn std::error::Error>> {
    let store = match &args.fixture {
        Some(path) => Store::from_path(path)?,
        None => fixtures::sample_store()?,
    };
    tracing::info!(records = store.len(), "store loaded");

    let mut budget = EvalBudget::default();
    if let Some(max_depth) = args.max_depth {
        budget = budget.with_max_depth(max_depth);
    }
    if let Some(max_rows) = args.max_rows {
        budget = budget.with_max_rows(max_rows);
    }
    let session = Session::new(store, budget);

    if let Some(command) = &args.command {
        run_command_mode(&session, command, args.format)
    } else if let Some(file) = &args.file {
        run_script_mode(&session, file, args.format)
    } else {
        repl::run(session, args.format)
    }
}

/// Execute a single query and exit.
fn run_command_mode(
    session: &Session,
    command: &str,
    format: OutputFormat,
) -> Result<(), Box<dyn std::error::Error>> {
    let formatter = formatter::create_formatter(format);

    match session.execute(command, &*formatter) {
        Ok(output) => {
            println!("{}", output);
            Ok(())
        }
        Err(e) => {
            eprintln!("{}", formatter.format_error(&e.to_string()));
            std::process::exit(1);
        }
    }
}

/// Execute queries from a file.
fn run_script_mode(
    session: &Session,
    file: &Path,
    format: OutputFormat,
) -> Result<(), Box<dyn std::error::Error>> {
    let content = std::fs::read_to_string(file)?;
    let formatter = formatter::create_formatter(format);

    let mut failed = 0;
    for (i, query) in executor::split_queries(&content).iter().enumerate() {
        match session.execute(query, &*formatter) {
            Ok(output) => println!("{}", output),
            Err(e) => {
                // Continue with the next query
                eprintln!("Error in query {}: {}", i + 1, e);
                failed += 1;
            }
        }
    }

    if failed > 0 {
        return Err(format!("{} quer{} failed", failed, if failed == 1 { "y" } else { "ies" }).into());
    }
    Ok(())
}
