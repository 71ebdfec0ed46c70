//! Core error types.

use thiserror::Error;

use crate::basis::OpKind;
use pathql_lang::LangError;
use pathql_proto::ObjectId;

/// Evaluation and store errors.
#[derive(Debug, Error)]
pub enum Error {
    /// The query tree is not well formed.
    #[error(transparent)]
    Query(#[from] LangError),

    /// A path whose base is neither a bound input, an alias nor a type extent.
    #[error("unresolved path: {0}")]
    UnresolvedPath(String),

    /// A partial path used where no prefix is in scope.
    #[error("partial path {0} has no enclosing prefix")]
    MissingPrefix(String),

    /// A path step that cannot appear where it does.
    #[error("malformed path: {0}")]
    MalformedPath(String),

    /// Operator or function not in the registry.
    #[error("unknown {kind} '{name}'")]
    UnknownOperator { kind: OpKind, name: String },

    /// Call with the wrong number of arguments.
    #[error("{kind} '{name}' takes {expected} argument(s), got {got}")]
    Arity {
        kind: OpKind,
        name: String,
        expected: usize,
        got: usize,
    },

    /// A clause received the wrong number of values.
    #[error("{clause} must yield {expected}, got {got} values")]
    Cardinality {
        clause: &'static str,
        expected: &'static str,
        got: usize,
    },

    /// Object referenced by a traversal is missing from the store.
    #[error("object {0} not found in store")]
    MissingObject(ObjectId),

    /// Operand of the wrong kind.
    #[error("type mismatch: {op} not supported for {operands}")]
    TypeMismatch { op: String, operands: String },

    /// Run-time value failure (division by zero, failed cast, bad index).
    #[error("invalid value: {0}")]
    InvalidValue(String),

    /// Evaluation exceeded the configured budget.
    #[error("budget exceeded: {0}")]
    BudgetExceeded(String),

    /// Store fixture is malformed.
    #[error("invalid fixture: {0}")]
    Fixture(String),

    /// Fixture file could not be read.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Fixture is not valid JSON.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Error classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Unresolvable path, unknown operator or function, wrong arity.
    MalformedQuery,
    /// A clause received zero or several values where one was required.
    Cardinality,
    /// The store is missing an object a traversal refers to, or cannot be loaded.
    StoreConsistency,
    /// Operand failures and budget exhaustion.
    InvalidValue,
}

impl Error {
    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Query(_)
            | Error::UnresolvedPath(_)
            | Error::MissingPrefix(_)
            | Error::MalformedPath(_)
            | Error::UnknownOperator { .. }
            | Error::Arity { .. } => ErrorKind::MalformedQuery,
            Error::Cardinality { .. } => ErrorKind::Cardinality,
            Error::MissingObject(_) | Error::Fixture(_) | Error::Io(_) | Error::Json(_) => {
                ErrorKind::StoreConsistency
            }
            Error::TypeMismatch { .. } | Error::InvalidValue(_) | Error::BudgetExceeded(_) => {
                ErrorKind::InvalidValue
            }
        }
    }

    /// Create an invalid value error.
    pub fn invalid(message: impl Into<String>) -> Self {
        Error::InvalidValue(message.into())
    }

    /// Create a type mismatch error for an operation over the given operands.
    pub fn mismatch(op: &str, operands: &[&pathql_proto::Value]) -> Self {
        Error::TypeMismatch {
            op: op.to_string(),
            operands: operands
                .iter()
                .map(|v| v.type_name())
                .collect::<Vec<_>>()
                .join(", "),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kinds() {
        assert_eq!(
            Error::UnresolvedPath("Nope".into()).kind(),
            ErrorKind::MalformedQuery
        );
        assert_eq!(
            Error::Cardinality {
                clause: "LIMIT",
                expected: "exactly one value",
                got: 2
            }
            .kind(),
            ErrorKind::Cardinality
        );
        assert_eq!(
            Error::MissingObject(ObjectId::nil()).kind(),
            ErrorKind::StoreConsistency
        );
        assert_eq!(
            Error::BudgetExceeded("depth".into()).kind(),
            ErrorKind::InvalidValue
        );
    }

    #[test]
    fn test_error_messages() {
        let err = Error::Arity {
            kind: OpKind::Func,
            name: "len".into(),
            expected: 1,
            got: 2,
        };
        assert_eq!(err.to_string(), "func 'len' takes 1 argument(s), got 2");
    }
}
