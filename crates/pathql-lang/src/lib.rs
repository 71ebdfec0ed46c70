//! pathql expression trees
//!
//! This crate defines the tree a parser hands to the evaluator: literals,
//! collection constructors, operators, function calls, casts, paths, shapes
//! and the SELECT/FOR/DETACHED statements.
//!
//! Trees are exchanged as JSON. Each node is an object with a `kind` tag:
//!
//! ```text
//! {"kind": "select",
//!  "result": {"kind": "path", "steps": [{"kind": "object_ref", "name": "Person"},
//!                                       {"kind": "ptr", "name": "name"}]},
//!  "order_by": [{"path": {"kind": "path", "steps": [...]}, "direction": "DESC"}],
//!  "limit": {"kind": "int", "value": 1}}
//! ```
//!
//! # Usage
//!
//! ```rust
//! use pathql_lang::from_json;
//!
//! let expr = from_json(r#"{"kind": "binop", "op": "+",
//!     "left": {"kind": "int", "value": 1},
//!     "right": {"kind": "int", "value": 2}}"#).unwrap();
//! assert_eq!(expr.kind_name(), "binary operator");
//! ```

pub mod ast;
pub mod builder;
pub mod error;
mod validate;

pub use ast::{
    Alias, Direction, Expr, ForQuery, Index, NamedElement, NonesOrder, PathExpr, PathStep, Ptr,
    SelectQuery, Shape, ShapeElement, SortDirection, SortExpr,
};
pub use error::LangError;
pub use validate::validate;

/// Load and validate an expression tree from JSON.
pub fn from_json(source: &str) -> Result<Expr, LangError> {
    let expr: Expr = serde_json::from_str(source)?;
    validate(&expr)?;
    Ok(expr)
}

/// Load and validate an expression tree from an already-parsed JSON value.
pub fn from_value(value: serde_json::Value) -> Result<Expr, LangError> {
    let expr: Expr = serde_json::from_value(value)?;
    validate(&expr)?;
    Ok(expr)
}

/// Serialize a tree to JSON.
pub fn to_json(expr: &Expr) -> String {
    // Trees contain no maps with non-string keys, so this cannot fail.
    serde_json::to_string(expr).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::builder::*;
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_from_json_select() {
        let expr = from_json(
            r#"{
                "kind": "select",
                "result": {"kind": "path", "steps": [
                    {"kind": "object_ref", "name": "Person"},
                    {"kind": "ptr", "name": "name"}
                ]},
                "order_by": [{"path": {"kind": "path", "steps": [
                    {"kind": "object_ref", "name": "Person"},
                    {"kind": "ptr", "name": "name"}
                ]}, "direction": "DESC"}],
                "limit": {"kind": "int", "value": 1}
            }"#,
        )
        .unwrap();

        let expected = select(path("Person", &["name"]))
            .order_by(desc(path("Person", &["name"])))
            .limit(int(1))
            .build();
        assert_eq!(expr, expected);
    }

    #[test]
    fn test_pointer_defaults_and_aliases() {
        let expr = from_json(
            r#"{"kind": "path", "steps": [
                {"kind": "object_ref", "name": "Note"},
                {"kind": "ptr", "name": "notes", "direction": "<"},
                {"kind": "ptr", "name": "metanote", "link_property": true}
            ]}"#,
        )
        .unwrap();

        assert_eq!(
            expr,
            path_steps("Note", vec![back("notes"), link_prop("metanote")])
        );
    }

    #[test]
    fn test_round_trip_through_json() {
        let expr = select(shape(
            name("Person"),
            vec![element("name"), nested("notes", vec![element("name")])],
        ))
        .filter(binop("=", path("Person", &["name"]), str_lit("Phil Emarg")))
        .build();

        let loaded = from_json(&to_json(&expr)).unwrap();
        assert_eq!(loaded, expr);
    }

    #[test]
    fn test_json_error_has_location() {
        let err = from_json("{\n  \"kind\": \"int\",\n  \"value\": }").unwrap_err();
        match err {
            LangError::Json { line, .. } => assert_eq!(line, 3),
            other => panic!("expected JSON error, got {other:?}"),
        }
    }

    #[test]
    fn test_unknown_kind_rejected() {
        let err = from_json(r#"{"kind": "update"}"#).unwrap_err();
        assert!(matches!(err, LangError::Json { .. }));
    }

    #[test]
    fn test_invalid_tree_rejected() {
        let err = from_json(r#"{"kind": "path", "steps": []}"#).unwrap_err();
        assert!(matches!(err, LangError::InvalidTree(_)));
    }
}
