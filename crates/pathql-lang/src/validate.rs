//! Structural checks on loaded trees.

use crate::ast::{Expr, Index, PathExpr, PathStep, ShapeElement, SortExpr};
use crate::error::LangError;

/// Check the structural rules a tree must satisfy before evaluation:
///
/// - a path may only be empty if it is partial;
/// - object refs and embedded expressions may only start an absolute path;
/// - pointer, alias and shape element names are non-empty.
pub fn validate(expr: &Expr) -> Result<(), LangError> {
    match expr {
        Expr::Str { .. } | Expr::Int { .. } | Expr::Float { .. } | Expr::Bool { .. } => Ok(()),
        Expr::Set { elements } | Expr::Tuple { elements } | Expr::Array { elements } => {
            elements.iter().try_for_each(validate)
        }
        Expr::NamedTuple { elements } => elements.iter().try_for_each(|el| {
            non_empty(&el.name, "named tuple element")?;
            validate(&el.value)
        }),
        Expr::BinOp { op, left, right } => {
            non_empty(op, "operator")?;
            validate(left)?;
            validate(right)
        }
        Expr::UnaryOp { op, operand } => {
            non_empty(op, "operator")?;
            validate(operand)
        }
        Expr::Call { func, args } => {
            non_empty(func, "function")?;
            args.iter().try_for_each(validate)
        }
        Expr::Cast { ty, expr } => {
            non_empty(ty, "cast type")?;
            validate(expr)
        }
        Expr::IfElse {
            if_expr,
            condition,
            else_expr,
        } => {
            validate(if_expr)?;
            validate(condition)?;
            validate(else_expr)
        }
        Expr::Indirection { arg, indices } => {
            validate(arg)?;
            for index in indices {
                match index {
                    Index::Index { index } => validate(index)?,
                    Index::Slice { start, stop } => {
                        if let Some(start) = start {
                            validate(start)?;
                        }
                        if let Some(stop) = stop {
                            validate(stop)?;
                        }
                    }
                }
            }
            Ok(())
        }
        Expr::Path(path) => validate_path(path),
        Expr::Shape(shape) => {
            if let Some(subject) = &shape.expr {
                validate(subject)?;
            }
            shape.elements.iter().try_for_each(validate_element)
        }
        Expr::Select(query) => {
            for alias in &query.aliases {
                non_empty(&alias.name, "alias")?;
                validate(&alias.expr)?;
            }
            if let Some(alias) = &query.result_alias {
                non_empty(alias, "result alias")?;
            }
            validate(&query.result)?;
            validate_clauses(
                query.filter.as_ref(),
                &query.order_by,
                query.offset.as_ref(),
                query.limit.as_ref(),
            )
        }
        Expr::For(query) => {
            for alias in &query.aliases {
                non_empty(&alias.name, "alias")?;
                validate(&alias.expr)?;
            }
            non_empty(&query.iterator_alias, "iterator alias")?;
            validate(&query.iterator)?;
            validate(&query.result)
        }
        Expr::Detached { expr } => validate(expr),
    }
}

fn validate_path(path: &PathExpr) -> Result<(), LangError> {
    if path.steps.is_empty() && !path.partial {
        return Err(LangError::invalid("empty path"));
    }

    for (i, step) in path.steps.iter().enumerate() {
        match step {
            PathStep::ObjectRef { name } => {
                non_empty(name, "object ref")?;
                if i > 0 || path.partial {
                    return Err(LangError::invalid(format!(
                        "object ref '{}' must start an absolute path",
                        name
                    )));
                }
            }
            PathStep::Expr { expr } => {
                if i > 0 || path.partial {
                    return Err(LangError::invalid(format!(
                        "embedded {} must start an absolute path",
                        expr.kind_name()
                    )));
                }
                validate(expr)?;
            }
            PathStep::Ptr(ptr) => non_empty(&ptr.name, "pointer")?,
            PathStep::TypeIntersection { name } => non_empty(name, "type intersection")?,
        }
    }
    Ok(())
}

fn validate_element(el: &ShapeElement) -> Result<(), LangError> {
    non_empty(&el.ptr.name, "shape element")?;
    if let Some(compexpr) = &el.compexpr {
        validate(compexpr)?;
    }
    el.elements.iter().try_for_each(validate_element)?;
    validate_clauses(
        el.filter.as_ref(),
        &el.order_by,
        el.offset.as_ref(),
        el.limit.as_ref(),
    )
}

fn validate_clauses(
    filter: Option<&Expr>,
    order_by: &[SortExpr],
    offset: Option<&Expr>,
    limit: Option<&Expr>,
) -> Result<(), LangError> {
    if let Some(filter) = filter {
        validate(filter)?;
    }
    for key in order_by {
        validate(&key.path)?;
    }
    if let Some(offset) = offset {
        validate(offset)?;
    }
    if let Some(limit) = limit {
        validate(limit)?;
    }
    Ok(())
}

fn non_empty(name: &str, what: &str) -> Result<(), LangError> {
    if name.is_empty() {
        Err(LangError::invalid(format!("{} name must not be empty", what)))
    } else {
        Ok(())
    }
}
