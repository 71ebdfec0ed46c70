//! Expression tree for the query language.
//!
//! The tree is produced by an external parser and handed over as JSON. Every
//! node carries a `kind` tag; optional clauses may be omitted.

use serde::{Deserialize, Serialize};

/// An expression node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Expr {
    /// String literal.
    Str { value: String },
    /// Integer literal.
    Int { value: i64 },
    /// Float literal.
    Float { value: f64 },
    /// Boolean literal.
    Bool { value: bool },
    /// Set constructor `{a, b, ...}`; concatenates element results.
    Set {
        #[serde(default)]
        elements: Vec<Expr>,
    },
    /// Tuple constructor `(a, b)`.
    Tuple { elements: Vec<Expr> },
    /// Array constructor `[a, b]`.
    Array {
        #[serde(default)]
        elements: Vec<Expr>,
    },
    /// Named tuple constructor `(a := x, b := y)`.
    NamedTuple { elements: Vec<NamedElement> },
    /// Binary operator, including `IN`, `??` and `UNION`.
    #[serde(rename = "binop")]
    BinOp {
        op: String,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    /// Unary operator, including `EXISTS` and `DISTINCT`.
    #[serde(rename = "unop")]
    UnaryOp { op: String, operand: Box<Expr> },
    /// Function call.
    Call {
        func: String,
        #[serde(default)]
        args: Vec<Expr>,
    },
    /// Type cast `<ty>expr`.
    Cast {
        #[serde(rename = "type")]
        ty: String,
        expr: Box<Expr>,
    },
    /// `if_expr IF condition ELSE else_expr`.
    IfElse {
        if_expr: Box<Expr>,
        condition: Box<Expr>,
        else_expr: Box<Expr>,
    },
    /// Indexing and slicing `arg[i][a:b]`.
    Indirection { arg: Box<Expr>, indices: Vec<Index> },
    /// Path expression.
    Path(PathExpr),
    /// Shape `subject { elements }`.
    Shape(Shape),
    /// SELECT statement.
    Select(Box<SelectQuery>),
    /// FOR statement.
    For(Box<ForQuery>),
    /// DETACHED expression.
    Detached { expr: Box<Expr> },
}

/// A named tuple element.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NamedElement {
    pub name: String,
    pub value: Expr,
}

/// One indirection step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Index {
    /// `[i]`
    Index { index: Box<Expr> },
    /// `[start:stop]`, either bound optional.
    Slice {
        #[serde(default)]
        start: Option<Box<Expr>>,
        #[serde(default)]
        stop: Option<Box<Expr>>,
    },
}

/// A path expression such as `Person.notes@metanote` or `.name`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PathExpr {
    pub steps: Vec<PathStep>,
    /// The path starts mid-expression and is relative to the enclosing prefix.
    #[serde(default)]
    pub partial: bool,
}

impl PathExpr {
    /// Create a new absolute path.
    pub fn new(steps: Vec<PathStep>) -> Self {
        Self {
            steps,
            partial: false,
        }
    }

    /// Create a new partial path.
    pub fn partial(steps: Vec<PathStep>) -> Self {
        Self {
            steps,
            partial: true,
        }
    }
}

/// A path step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PathStep {
    /// Root anchor naming a type extent or an alias.
    ObjectRef { name: String },
    /// Pointer traversal.
    Ptr(Ptr),
    /// `[IS Type]`
    TypeIntersection {
        #[serde(rename = "type")]
        name: String,
    },
    /// A non-path expression used as the path root, e.g. `(SELECT ...).name`.
    Expr { expr: Box<Expr> },
}

/// A pointer reference.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Ptr {
    pub name: String,
    #[serde(default)]
    pub direction: Direction,
    /// `@name` link property rather than a link or property.
    #[serde(default)]
    pub link_property: bool,
}

impl Ptr {
    /// Create a forward pointer.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            direction: Direction::Forward,
            link_property: false,
        }
    }

    /// Name under which this pointer's values are stored on an object:
    /// link properties are `@`-prefixed.
    pub fn field_name(&self) -> String {
        if self.link_property {
            format!("@{}", self.name)
        } else {
            self.name.clone()
        }
    }
}

/// Pointer traversal direction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// `>` (default)
    #[default]
    #[serde(alias = ">")]
    Forward,
    /// `<`
    #[serde(alias = "<")]
    Backward,
}

/// A shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Shape {
    /// Subject; `None` shapes a fresh `VirtualObject`.
    #[serde(default)]
    pub expr: Option<Box<Expr>>,
    #[serde(default)]
    pub elements: Vec<ShapeElement>,
}

/// A shape element, e.g. `name`, `notes: {name} FILTER ...` or `n := .name`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShapeElement {
    pub ptr: Ptr,
    #[serde(default)]
    pub compexpr: Option<Expr>,
    #[serde(default)]
    pub elements: Vec<ShapeElement>,
    #[serde(default)]
    pub filter: Option<Expr>,
    #[serde(default)]
    pub order_by: Vec<SortExpr>,
    #[serde(default)]
    pub offset: Option<Expr>,
    #[serde(default)]
    pub limit: Option<Expr>,
}

impl ShapeElement {
    /// Create a plain element selecting `ptr`.
    pub fn new(ptr: Ptr) -> Self {
        Self {
            ptr,
            compexpr: None,
            elements: Vec::new(),
            filter: None,
            order_by: Vec::new(),
            offset: None,
            limit: None,
        }
    }

    /// The element's pointer as a single-step path.
    pub fn path(&self) -> PathExpr {
        PathExpr::new(vec![PathStep::Ptr(self.ptr.clone())])
    }
}

/// A `WITH name := expr` binding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alias {
    pub name: String,
    pub expr: Expr,
}

/// A SELECT statement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectQuery {
    #[serde(default)]
    pub aliases: Vec<Alias>,
    pub result: Expr,
    #[serde(default)]
    pub result_alias: Option<String>,
    #[serde(default)]
    pub filter: Option<Expr>,
    #[serde(default)]
    pub order_by: Vec<SortExpr>,
    #[serde(default)]
    pub offset: Option<Expr>,
    #[serde(default)]
    pub limit: Option<Expr>,
}

impl SelectQuery {
    /// Create a new SELECT of `result` with no clauses.
    pub fn new(result: Expr) -> Self {
        Self {
            aliases: Vec::new(),
            result,
            result_alias: None,
            filter: None,
            order_by: Vec::new(),
            offset: None,
            limit: None,
        }
    }
}

/// A FOR statement: `FOR alias IN iterator UNION result`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForQuery {
    #[serde(default)]
    pub aliases: Vec<Alias>,
    pub iterator: Expr,
    pub iterator_alias: String,
    pub result: Expr,
}

/// An ORDER BY key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SortExpr {
    pub path: Expr,
    #[serde(default)]
    pub direction: SortDirection,
    #[serde(default)]
    pub nones_order: Option<NonesOrder>,
}

/// Sort direction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

/// Placement of empty sort keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NonesOrder {
    First,
    Last,
}

impl Expr {
    /// Short description of the node kind, for diagnostics.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Expr::Str { .. } => "string literal",
            Expr::Int { .. } => "integer literal",
            Expr::Float { .. } => "float literal",
            Expr::Bool { .. } => "boolean literal",
            Expr::Set { .. } => "set",
            Expr::Tuple { .. } => "tuple",
            Expr::Array { .. } => "array",
            Expr::NamedTuple { .. } => "named tuple",
            Expr::BinOp { .. } => "binary operator",
            Expr::UnaryOp { .. } => "unary operator",
            Expr::Call { .. } => "function call",
            Expr::Cast { .. } => "cast",
            Expr::IfElse { .. } => "if/else",
            Expr::Indirection { .. } => "indirection",
            Expr::Path(_) => "path",
            Expr::Shape(_) => "shape",
            Expr::Select(_) => "select",
            Expr::For(_) => "for",
            Expr::Detached { .. } => "detached",
        }
    }
}
