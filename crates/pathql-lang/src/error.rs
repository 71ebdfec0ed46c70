//! Error types for loading expression trees.

use thiserror::Error;

/// Error while loading an expression tree.
#[derive(Debug, Error)]
pub enum LangError {
    /// The input is not a well-formed tree.
    #[error("invalid JSON at line {line}, column {column}: {message}")]
    Json {
        message: String,
        line: usize,
        column: usize,
    },

    /// The tree decodes but violates a structural rule.
    #[error("invalid tree: {0}")]
    InvalidTree(String),
}

impl LangError {
    /// Create an invalid tree error.
    pub fn invalid(message: impl Into<String>) -> Self {
        LangError::InvalidTree(message.into())
    }
}

impl From<serde_json::Error> for LangError {
    fn from(err: serde_json::Error) -> Self {
        LangError::Json {
            message: err.to_string(),
            line: err.line(),
            column: err.column(),
        }
    }
}
