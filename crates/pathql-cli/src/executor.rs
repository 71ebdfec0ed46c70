//! Query execution.

use crate::formatter::Formatter;
use pathql_core::{EvalBudget, Evaluator, Store};
use pathql_lang::{from_json, LangError};
use thiserror::Error;

/// Execution errors.
#[derive(Debug, Error)]
pub enum ExecuteError {
    /// The input is not a valid expression tree.
    #[error("{0}")]
    Language(#[from] LangError),

    /// Evaluation failed.
    #[error("{0}")]
    Eval(#[from] pathql_core::Error),

    /// Nothing to run.
    #[error("empty query")]
    Empty,
}

/// A loaded store plus the limits every query runs under.
pub struct Session {
    store: Store,
    budget: EvalBudget,
}

impl Session {
    /// Create a session over a store.
    pub fn new(store: Store, budget: EvalBudget) -> Self {
        Self { store, budget }
    }

    /// The store queries run against.
    pub fn store(&self) -> &Store {
        &self.store
    }

    /// Load, evaluate and format one query.
    ///
    /// A trailing `;` is ignored. Every query gets a fresh evaluator, so
    /// `next()` restarts at 1.
    pub fn execute(&self, input: &str, formatter: &dyn Formatter) -> Result<String, ExecuteError> {
        let input = strip_terminator(input);
        if input.is_empty() {
            return Err(ExecuteError::Empty);
        }

        let expr = from_json(input)?;
        tracing::debug!(kind = expr.kind_name(), "executing query");

        let result = Evaluator::new(&self.store)
            .with_budget(self.budget)
            .run(&expr)?;
        Ok(formatter.format_result(&result))
    }
}

/// Remove surrounding whitespace and one trailing `;`.
pub fn strip_terminator(input: &str) -> &str {
    let input = input.trim();
    input.strip_suffix(';').map(str::trim_end).unwrap_or(input)
}

/// Split a script into queries at lines holding only `;`.
///
/// Lines starting with `//` or `#` are comments. A final query needs no
/// separator.
pub fn split_queries(content: &str) -> Vec<String> {
    let mut queries = Vec::new();
    let mut current = String::new();

    for line in content.lines() {
        let trimmed = line.trim();
        if trimmed.starts_with("//") || trimmed.starts_with('#') {
            continue;
        }
        if trimmed == ";" {
            if !current.trim().is_empty() {
                queries.push(current.trim().to_string());
            }
            current.clear();
            continue;
        }
        current.push_str(line);
        current.push('\n');
    }
    if !current.trim().is_empty() {
        queries.push(current.trim().to_string());
    }

    queries
}
