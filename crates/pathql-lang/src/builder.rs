//! Terse constructors for expression trees.
//!
//! ```rust
//! use pathql_lang::builder::*;
//!
//! // SELECT Person { name } FILTER Person.name = "Phil Emarg"
//! let query = select(shape(name("Person"), vec![element("name")]))
//!     .filter(binop("=", path("Person", &["name"]), str_lit("Phil Emarg")))
//!     .build();
//! ```

use crate::ast::{
    Alias, Direction, Expr, ForQuery, Index, NamedElement, NonesOrder, PathExpr, PathStep, Ptr,
    SelectQuery, Shape, ShapeElement, SortDirection, SortExpr,
};

/// String literal.
pub fn str_lit(value: impl Into<String>) -> Expr {
    Expr::Str {
        value: value.into(),
    }
}

/// Integer literal.
pub fn int(value: i64) -> Expr {
    Expr::Int { value }
}

/// Float literal.
pub fn float(value: f64) -> Expr {
    Expr::Float { value }
}

/// Boolean literal.
pub fn boolean(value: bool) -> Expr {
    Expr::Bool { value }
}

/// Set constructor.
pub fn set(elements: Vec<Expr>) -> Expr {
    Expr::Set { elements }
}

/// Set of integer literals.
pub fn int_set(values: &[i64]) -> Expr {
    set(values.iter().copied().map(int).collect())
}

/// Tuple constructor.
pub fn tuple(elements: Vec<Expr>) -> Expr {
    Expr::Tuple { elements }
}

/// Array constructor.
pub fn array(elements: Vec<Expr>) -> Expr {
    Expr::Array { elements }
}

/// Named tuple constructor.
pub fn named_tuple(elements: Vec<(&str, Expr)>) -> Expr {
    Expr::NamedTuple {
        elements: elements
            .into_iter()
            .map(|(name, value)| NamedElement {
                name: name.to_string(),
                value,
            })
            .collect(),
    }
}

/// Binary operator.
pub fn binop(op: &str, left: Expr, right: Expr) -> Expr {
    Expr::BinOp {
        op: op.to_string(),
        left: Box::new(left),
        right: Box::new(right),
    }
}

/// Unary operator.
pub fn unop(op: &str, operand: Expr) -> Expr {
    Expr::UnaryOp {
        op: op.to_string(),
        operand: Box::new(operand),
    }
}

/// Function call.
pub fn call(func: &str, args: Vec<Expr>) -> Expr {
    Expr::Call {
        func: func.to_string(),
        args,
    }
}

/// Type cast.
pub fn cast(ty: &str, expr: Expr) -> Expr {
    Expr::Cast {
        ty: ty.to_string(),
        expr: Box::new(expr),
    }
}

/// `if_expr IF condition ELSE else_expr`.
pub fn if_else(if_expr: Expr, condition: Expr, else_expr: Expr) -> Expr {
    Expr::IfElse {
        if_expr: Box::new(if_expr),
        condition: Box::new(condition),
        else_expr: Box::new(else_expr),
    }
}

/// `arg[index]`.
pub fn index(arg: Expr, index: Expr) -> Expr {
    Expr::Indirection {
        arg: Box::new(arg),
        indices: vec![Index::Index {
            index: Box::new(index),
        }],
    }
}

/// `arg[start:stop]`.
pub fn slice(arg: Expr, start: Option<Expr>, stop: Option<Expr>) -> Expr {
    Expr::Indirection {
        arg: Box::new(arg),
        indices: vec![Index::Slice {
            start: start.map(Box::new),
            stop: stop.map(Box::new),
        }],
    }
}

/// Forward pointer step.
pub fn ptr(name: &str) -> PathStep {
    PathStep::Ptr(Ptr::new(name))
}

/// Backward pointer step.
pub fn back(name: &str) -> PathStep {
    PathStep::Ptr(Ptr {
        name: name.to_string(),
        direction: Direction::Backward,
        link_property: false,
    })
}

/// Link property step.
pub fn link_prop(name: &str) -> PathStep {
    PathStep::Ptr(Ptr {
        name: name.to_string(),
        direction: Direction::Forward,
        link_property: true,
    })
}

/// Type intersection step.
pub fn is_type(name: &str) -> PathStep {
    PathStep::TypeIntersection {
        name: name.to_string(),
    }
}

/// Path rooted at an object ref with forward pointers, e.g. `path("Person", &["notes", "name"])`.
pub fn path(root: &str, ptrs: &[&str]) -> Expr {
    let mut steps = vec![PathStep::ObjectRef {
        name: root.to_string(),
    }];
    steps.extend(ptrs.iter().map(|name| ptr(name)));
    Expr::Path(PathExpr::new(steps))
}

/// Path rooted at an object ref with arbitrary steps.
pub fn path_steps(root: &str, rest: Vec<PathStep>) -> Expr {
    let mut steps = vec![PathStep::ObjectRef {
        name: root.to_string(),
    }];
    steps.extend(rest);
    Expr::Path(PathExpr::new(steps))
}

/// Reference to an alias or type extent.
pub fn name(name: &str) -> Expr {
    path(name, &[])
}

/// Partial path, e.g. `.name`.
pub fn partial(steps: Vec<PathStep>) -> Expr {
    Expr::Path(PathExpr::partial(steps))
}

/// Path rooted at an arbitrary expression, e.g. `(expr).name`.
pub fn expr_path(root: Expr, rest: Vec<PathStep>) -> Expr {
    let mut steps = vec![PathStep::Expr {
        expr: Box::new(root),
    }];
    steps.extend(rest);
    Expr::Path(PathExpr::new(steps))
}

/// Shape over a subject.
pub fn shape(subject: Expr, elements: Vec<ShapeElement>) -> Expr {
    Expr::Shape(Shape {
        expr: Some(Box::new(subject)),
        elements,
    })
}

/// Shape with no subject.
pub fn free_shape(elements: Vec<ShapeElement>) -> Expr {
    Expr::Shape(Shape {
        expr: None,
        elements,
    })
}

/// Plain shape element.
pub fn element(name: &str) -> ShapeElement {
    ShapeElement::new(Ptr::new(name))
}

/// Link property shape element, e.g. `@metanote`.
pub fn link_prop_element(name: &str) -> ShapeElement {
    ShapeElement::new(Ptr {
        name: name.to_string(),
        direction: Direction::Forward,
        link_property: true,
    })
}

/// Nested shape element, e.g. `notes: { name }`.
pub fn nested(name: &str, elements: Vec<ShapeElement>) -> ShapeElement {
    ShapeElement {
        elements,
        ..element(name)
    }
}

/// Computed shape element, e.g. `n := expr`.
pub fn computed(name: &str, expr: Expr) -> ShapeElement {
    ShapeElement {
        compexpr: Some(expr),
        ..element(name)
    }
}

/// ORDER BY key, ascending.
pub fn asc(path: Expr) -> SortExpr {
    SortExpr {
        path,
        direction: SortDirection::Asc,
        nones_order: None,
    }
}

/// ORDER BY key, descending.
pub fn desc(path: Expr) -> SortExpr {
    SortExpr {
        path,
        direction: SortDirection::Desc,
        nones_order: None,
    }
}

impl SortExpr {
    /// Set empty-key placement.
    pub fn nones(mut self, order: NonesOrder) -> Self {
        self.nones_order = Some(order);
        self
    }
}

/// Builder for a SELECT statement.
#[derive(Debug, Clone)]
pub struct SelectBuilder {
    query: SelectQuery,
}

/// Start a SELECT of `result`.
pub fn select(result: Expr) -> SelectBuilder {
    SelectBuilder {
        query: SelectQuery::new(result),
    }
}

impl SelectBuilder {
    /// Add a `WITH` alias.
    pub fn with(mut self, name: &str, expr: Expr) -> Self {
        self.query.aliases.push(Alias {
            name: name.to_string(),
            expr,
        });
        self
    }

    /// Name the result (`SELECT name := ...`).
    pub fn alias(mut self, name: &str) -> Self {
        self.query.result_alias = Some(name.to_string());
        self
    }

    /// Set FILTER.
    pub fn filter(mut self, expr: Expr) -> Self {
        self.query.filter = Some(expr);
        self
    }

    /// Add an ORDER BY key.
    pub fn order_by(mut self, key: SortExpr) -> Self {
        self.query.order_by.push(key);
        self
    }

    /// Set OFFSET.
    pub fn offset(mut self, expr: Expr) -> Self {
        self.query.offset = Some(expr);
        self
    }

    /// Set LIMIT.
    pub fn limit(mut self, expr: Expr) -> Self {
        self.query.limit = Some(expr);
        self
    }

    /// Finish the statement.
    pub fn build(self) -> Expr {
        Expr::Select(Box::new(self.query))
    }
}

/// `FOR alias IN iterator UNION result`.
pub fn for_in(alias: &str, iterator: Expr, result: Expr) -> Expr {
    Expr::For(Box::new(ForQuery {
        aliases: Vec::new(),
        iterator,
        iterator_alias: alias.to_string(),
        result,
    }))
}

/// `DETACHED expr`.
pub fn detached(expr: Expr) -> Expr {
    Expr::Detached {
        expr: Box::new(expr),
    }
}
