//! Path reference analysis.
//!
//! Walks a query and records every path it mentions, together with whether
//! the mention sits under an optional argument and whether it is inside a
//! subquery. Only direct (non-subquery) references can introduce new input
//! paths; subquery references only widen the common prefixes that get bound.

use std::collections::HashSet;

use crate::basis::{OpKind, ParamKind, Registry};
use crate::error::Error;
use crate::path::{select_path, shape_path, Path, PathElement};
use pathql_lang::{Expr, ForQuery, Index, PathExpr, PathStep, SelectQuery, Shape, ShapeElement};

/// A path mentioned by a query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reference {
    /// Canonical path, grafted onto its prefix.
    pub path: Path,
    /// Optional argument group, if the mention is under an optional argument.
    pub optional: Option<u32>,
    /// Whether the mention is inside a subquery.
    pub in_subquery: bool,
}

/// Scope state at a point of the walk.
#[derive(Debug, Clone, Default)]
struct Walk {
    prefix: Option<Path>,
    optional: Option<u32>,
    in_subquery: bool,
}

impl Walk {
    fn subquery(&self) -> Walk {
        Walk {
            in_subquery: true,
            ..self.clone()
        }
    }

    fn with_prefix(&self, prefix: Option<Path>) -> Walk {
        Walk {
            prefix,
            ..self.clone()
        }
    }
}

struct PathFinder<'a> {
    registry: &'a Registry,
    counter: u32,
    refs: Vec<Reference>,
}

impl<'a> PathFinder<'a> {
    fn record(&mut self, path: Path, walk: &Walk) {
        self.refs.push(Reference {
            path,
            optional: walk.optional,
            in_subquery: walk.in_subquery,
        });
    }

    fn visit_opt(&mut self, expr: Option<&Expr>, walk: &Walk) -> Result<(), Error> {
        match expr {
            Some(expr) => self.visit(expr, walk),
            None => Ok(()),
        }
    }

    fn visit_all<'e>(&mut self, exprs: impl IntoIterator<Item = &'e Expr>, walk: &Walk) -> Result<(), Error> {
        for expr in exprs {
            self.visit(expr, walk)?;
        }
        Ok(())
    }

    fn visit(&mut self, expr: &Expr, walk: &Walk) -> Result<(), Error> {
        match expr {
            Expr::Str { .. } | Expr::Int { .. } | Expr::Float { .. } | Expr::Bool { .. } => Ok(()),
            Expr::Set { elements } | Expr::Tuple { elements } | Expr::Array { elements } => {
                self.visit_all(elements, walk)
            }
            Expr::NamedTuple { elements } => self.visit_all(elements.iter().map(|e| &e.value), walk),
            Expr::BinOp { op, left, right } => {
                self.visit_call(OpKind::Binop, &op.to_uppercase(), &[&**left, &**right], walk)
            }
            Expr::UnaryOp { op, operand } => {
                self.visit_call(OpKind::Unop, &op.to_uppercase(), &[&**operand], walk)
            }
            Expr::Call { func, args } => {
                let args: Vec<&Expr> = args.iter().collect();
                self.visit_call(OpKind::Func, func, &args, walk)
            }
            Expr::Cast { expr, .. } => self.visit(expr, walk),
            Expr::IfElse {
                if_expr,
                condition,
                else_expr,
            } => self.visit_call(OpKind::Binop, "IF", &[&**if_expr, &**condition, &**else_expr], walk),
            Expr::Indirection { arg, indices } => {
                self.visit(arg, walk)?;
                for index in indices {
                    match index {
                        Index::Index { index } => self.visit(index, walk)?,
                        Index::Slice { start, stop } => {
                            self.visit_opt(start.as_deref(), walk)?;
                            self.visit_opt(stop.as_deref(), walk)?;
                        }
                    }
                }
                Ok(())
            }
            Expr::Path(path) => self.visit_path(path, walk, false),
            Expr::Shape(shape) => self.visit_shape(shape, walk),
            Expr::Select(query) => self.visit_select(query, walk),
            Expr::For(query) => self.visit_for(query, walk),
            Expr::Detached { .. } => Ok(()),
        }
    }

    fn visit_path(&mut self, path: &PathExpr, walk: &Walk, always_partial: bool) -> Result<(), Error> {
        let canonical = Path::graft(walk.prefix.as_ref(), path, always_partial)?;
        self.record(canonical, walk);
        for step in &path.steps {
            if let PathStep::Expr { expr } = step {
                self.visit(expr, walk)?;
            }
        }
        Ok(())
    }

    fn visit_call(&mut self, kind: OpKind, name: &str, args: &[&Expr], walk: &Walk) -> Result<(), Error> {
        let params = self.registry.params(kind, name);
        for (i, arg) in args.iter().enumerate() {
            let mut arg_walk = walk.clone();
            match params.and_then(|p| p.get(i)) {
                Some(ParamKind::SetOf) => arg_walk.in_subquery = true,
                Some(ParamKind::Optional) => {
                    if arg_walk.optional.is_none() {
                        if !arg_walk.in_subquery {
                            self.counter += 1;
                        }
                        arg_walk.optional = Some(self.counter);
                    }
                }
                Some(ParamKind::Singleton) | None => {}
            }
            self.visit(arg, &arg_walk)?;
        }
        Ok(())
    }

    fn visit_select(&mut self, query: &SelectQuery, walk: &Walk) -> Result<(), Error> {
        let inner = walk.subquery();
        self.visit(&query.result, &inner)?;

        let scoped = inner.with_prefix(Some(select_path(walk.prefix.as_ref(), query)?));
        for sort in &query.order_by {
            self.visit(&sort.path, &scoped)?;
        }
        self.visit_opt(query.filter.as_ref(), &scoped)?;

        let unscoped = inner.with_prefix(None);
        self.visit_opt(query.limit.as_ref(), &unscoped)?;
        self.visit_opt(query.offset.as_ref(), &unscoped)
    }

    fn visit_shape(&mut self, shape: &Shape, walk: &Walk) -> Result<(), Error> {
        self.visit_opt(shape.expr.as_deref(), walk)?;
        let prefix = shape_path(walk.prefix.as_ref(), shape.expr.as_deref())?;
        let inner = walk.subquery().with_prefix(Some(prefix));
        for element in &shape.elements {
            self.visit_element(element, &inner)?;
        }
        Ok(())
    }

    fn visit_element(&mut self, element: &ShapeElement, walk: &Walk) -> Result<(), Error> {
        match &element.compexpr {
            Some(expr) => self.visit(expr, walk)?,
            None => self.visit_path(&element.path(), walk, true)?,
        }
        if !element.elements.is_empty() {
            let prefix = Path::graft(walk.prefix.as_ref(), &element.path(), false)?;
            let inner = walk.subquery().with_prefix(Some(prefix));
            for child in &element.elements {
                self.visit_element(child, &inner)?;
            }
        }
        Ok(())
    }

    fn visit_for(&mut self, query: &ForQuery, walk: &Walk) -> Result<(), Error> {
        let inner = walk.subquery();
        self.visit_all(query.aliases.iter().map(|a| &a.expr), &inner)?;
        self.visit(&query.iterator, &inner)?;
        self.visit(&query.result, &inner)
    }
}

/// Collect every path reference in `expr`.
///
/// `extra` holds expressions evaluated later as subqueries of `expr` (a
/// SELECT's filter and sort keys), each with its own prefix. Their paths
/// count as subquery references.
pub fn find_references(
    expr: &Expr,
    prefix: Option<&Path>,
    extra: &[(Option<Path>, &Expr)],
    registry: &Registry,
) -> Result<Vec<Reference>, Error> {
    let mut finder = PathFinder {
        registry,
        counter: 0,
        refs: Vec::new(),
    };
    finder.visit(expr, &Walk::default().with_prefix(prefix.cloned()))?;
    for (extra_prefix, extra_expr) in extra {
        let walk = Walk {
            prefix: extra_prefix.clone(),
            optional: None,
            in_subquery: true,
        };
        finder.visit(extra_expr, &walk)?;
    }
    Ok(finder.refs)
}

/// References split by scope, plus which paths must be non-empty.
#[derive(Debug, Clone, Default)]
pub struct Analysis {
    /// References made directly in the analyzed expression.
    pub direct: Vec<(Path, Option<u32>)>,
    /// References made inside subqueries.
    pub subquery: Vec<(Path, Option<u32>)>,
    required: HashSet<Path>,
}

impl Analysis {
    /// Whether a path may be empty without eliminating its row.
    ///
    /// A path is required when it is a prefix of some direct reference
    /// outside every optional argument.
    pub fn always_optional(&self, path: &Path) -> bool {
        !self.required.contains(path)
    }
}

/// Split references by scope and compute which paths are required.
///
/// A reference through a link property also references the path with the
/// link and the property removed, so the link's source is bound before the
/// link is traversed.
pub fn analyze(mut refs: Vec<Reference>) -> Analysis {
    let expanded: Vec<Reference> = refs
        .iter()
        .filter_map(|r| {
            link_source(&r.path).map(|path| Reference {
                path,
                optional: r.optional,
                in_subquery: r.in_subquery,
            })
        })
        .collect();
    refs.extend(expanded);

    let mut analysis = Analysis::default();
    for r in refs {
        if r.in_subquery {
            analysis.subquery.push((r.path, r.optional));
        } else {
            if r.optional.is_none() {
                for len in 1..=r.path.len() {
                    analysis.required.insert(r.path.prefix(len));
                }
            }
            analysis.direct.push((r.path, r.optional));
        }
    }
    analysis
}

fn link_source(path: &Path) -> Option<Path> {
    let elements = path.elements();
    match elements.last() {
        Some(PathElement::Pointer {
            link_property: true,
            ..
        }) => {}
        _ => return None,
    }
    let mut end = elements.len() - 1;
    while end > 0 && matches!(elements[end - 1], PathElement::TypeIntersection(_)) {
        end -= 1;
    }
    // Drop the link itself.
    let end = end.saturating_sub(1);
    (end > 0).then(|| path.prefix(end))
}
