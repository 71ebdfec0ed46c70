//! Canonical path identity.
//!
//! Syntactic path expressions are flattened into a [`Path`]: a sequence of
//! [`PathElement`]s that compares by value. Two spellings denoting the same
//! value stream compare equal; this equality decides which references share
//! an iteration variable and which bound input a path resolves to.

use std::cmp::Ordering;
use std::fmt;
use std::rc::Rc;

use crate::error::Error;
use pathql_lang::{Direction, Expr, PathExpr, PathStep, SelectQuery};

/// One element of a canonical path.
///
/// Elements order by name first, across kinds. A pointer sorts after a type
/// intersection of the same name, and backward pointers (`<`) sort before
/// forward ones (`>`).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PathElement {
    /// The path is relative to an implicit prefix.
    Partial,
    /// Root anchor naming a type extent or alias.
    ObjectRef(String),
    /// Pointer traversal.
    Pointer {
        name: String,
        direction: Direction,
        link_property: bool,
    },
    /// Narrowing to a type.
    TypeIntersection(String),
    /// A non-path expression at the root.
    Opaque(OpaqueExpr),
}

/// An embedded expression, compared by structure.
///
/// Equality, ordering and hashing go through the expression's `Debug`
/// rendering, so `NaN` literals compare equal and `0.0` differs from `-0.0`.
#[derive(Clone)]
pub struct OpaqueExpr {
    key: String,
    expr: Rc<Expr>,
}

impl OpaqueExpr {
    /// Wrap an expression.
    pub fn new(expr: &Expr) -> Self {
        Self {
            key: format!("{:?}", expr),
            expr: Rc::new(expr.clone()),
        }
    }

    /// The embedded expression.
    pub fn expr(&self) -> &Expr {
        &self.expr
    }
}

impl fmt::Debug for OpaqueExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Opaque({})", self.expr.kind_name())
    }
}

impl PartialEq for OpaqueExpr {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key
    }
}

impl Eq for OpaqueExpr {}

impl PartialOrd for OpaqueExpr {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for OpaqueExpr {
    fn cmp(&self, other: &Self) -> Ordering {
        self.key.cmp(&other.key)
    }
}

impl std::hash::Hash for OpaqueExpr {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.key.hash(state);
    }
}

impl PathElement {
    fn name(&self) -> Option<&str> {
        match self {
            PathElement::ObjectRef(name) | PathElement::TypeIntersection(name) => Some(name.as_str()),
            PathElement::Pointer { name, .. } => Some(name.as_str()),
            PathElement::Partial | PathElement::Opaque(_) => None,
        }
    }

    fn pointer_tail(&self) -> Option<(char, bool)> {
        match self {
            PathElement::Pointer {
                direction,
                link_property,
                ..
            } => {
                let arrow = match direction {
                    Direction::Backward => '<',
                    Direction::Forward => '>',
                };
                Some((arrow, *link_property))
            }
            _ => None,
        }
    }

    fn rank(&self) -> u8 {
        match self {
            PathElement::Partial => 0,
            PathElement::ObjectRef(_) => 1,
            PathElement::TypeIntersection(_) => 2,
            PathElement::Pointer { .. } => 3,
            PathElement::Opaque(_) => 4,
        }
    }
}

impl PartialOrd for PathElement {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for PathElement {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (PathElement::Opaque(a), PathElement::Opaque(b)) => a.cmp(b),
            (PathElement::Opaque(_), _) => Ordering::Greater,
            (_, PathElement::Opaque(_)) => Ordering::Less,
            _ => self
                .name()
                .cmp(&other.name())
                .then_with(|| self.pointer_tail().cmp(&other.pointer_tail()))
                .then_with(|| self.rank().cmp(&other.rank())),
        }
    }
}

/// A canonical path.
///
/// Ordering is lexicographic by element, so a path sorts before every path
/// it is a prefix of.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Path(Vec<PathElement>);

impl Path {
    /// The bare partial path, used when a prefix has no path of its own.
    pub fn partial_root() -> Self {
        Path(vec![PathElement::Partial])
    }

    /// A single-element path naming an alias or type extent.
    pub fn object_ref(name: &str) -> Self {
        Path(vec![PathElement::ObjectRef(name.to_string())])
    }

    /// Canonicalize a syntactic path without grafting.
    pub fn normalize(expr: &PathExpr) -> Result<Self, Error> {
        let mut path = Path::default();
        if expr.partial {
            path.0.push(PathElement::Partial);
        }
        path.extend_steps(&expr.steps)?;
        Ok(path)
    }

    /// Canonicalize `expr`, grafting it onto `prefix` if it is partial.
    ///
    /// The grafted path keeps the prefix's own partial marker.
    pub fn graft(prefix: Option<&Path>, expr: &PathExpr, always_partial: bool) -> Result<Self, Error> {
        if !(expr.partial || always_partial) {
            return Self::normalize(expr);
        }
        let mut path = prefix
            .cloned()
            .ok_or_else(|| Error::MissingPrefix(Self::normalize(expr).map(|p| p.to_string()).unwrap_or_default()))?;
        path.extend_steps(&expr.steps)?;
        Ok(path)
    }

    fn extend_steps(&mut self, steps: &[PathStep]) -> Result<(), Error> {
        for step in steps {
            let element = match step {
                PathStep::ObjectRef { name } => {
                    if !self.0.is_empty() {
                        return Err(Error::MalformedPath(format!(
                            "object ref '{}' after {}",
                            name, self
                        )));
                    }
                    PathElement::ObjectRef(name.clone())
                }
                PathStep::Expr { expr } => {
                    if !self.0.is_empty() {
                        return Err(Error::MalformedPath(format!(
                            "embedded {} after {}",
                            expr.kind_name(),
                            self
                        )));
                    }
                    PathElement::Opaque(OpaqueExpr::new(expr))
                }
                PathStep::Ptr(ptr) => PathElement::Pointer {
                    name: ptr.name.clone(),
                    direction: ptr.direction,
                    link_property: ptr.link_property,
                },
                PathStep::TypeIntersection { name } => PathElement::TypeIntersection(name.clone()),
            };
            self.0.push(element);
        }
        Ok(())
    }

    /// The elements of this path.
    pub fn elements(&self) -> &[PathElement] {
        &self.0
    }

    /// Number of elements.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the path has no elements.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The first `len` elements.
    pub fn prefix(&self, len: usize) -> Path {
        Path(self.0[..len.min(self.0.len())].to_vec())
    }

    /// All elements but the last.
    pub fn parent(&self) -> Path {
        self.prefix(self.0.len().saturating_sub(1))
    }

    /// Whether the path is rooted at an object ref.
    pub fn is_anchored(&self) -> bool {
        matches!(self.0.first(), Some(PathElement::ObjectRef(_)))
    }

    /// Longest shared leading sequence of two paths.
    pub fn common_prefix(&self, other: &Path) -> Path {
        let len = self
            .0
            .iter()
            .zip(&other.0)
            .take_while(|(a, b)| a == b)
            .count();
        self.prefix(len)
    }
}

impl From<Vec<PathElement>> for Path {
    fn from(elements: Vec<PathElement>) -> Self {
        Path(elements)
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return write!(f, "<empty>");
        }
        for element in &self.0 {
            match element {
                PathElement::Partial => write!(f, "<partial>")?,
                PathElement::ObjectRef(name) => write!(f, "{}", name)?,
                PathElement::Pointer {
                    name,
                    direction,
                    link_property,
                } => {
                    let sep = match (direction, link_property) {
                        (_, true) => "@",
                        (Direction::Forward, false) => ".",
                        (Direction::Backward, false) => ".<",
                    };
                    write!(f, "{}{}", sep, name)?
                }
                PathElement::TypeIntersection(name) => write!(f, "[IS {}]", name)?,
                PathElement::Opaque(expr) => write!(f, "({})", expr.expr().kind_name())?,
            }
        }
        Ok(())
    }
}

/// Path a SELECT's result is known by: its result alias if any, otherwise the
/// path of its (unshaped) result.
pub fn select_path(prefix: Option<&Path>, query: &SelectQuery) -> Result<Path, Error> {
    match &query.result_alias {
        Some(alias) => Ok(Path::object_ref(alias)),
        None => subject_path(prefix, Some(&query.result)),
    }
}

/// Path of a statement or expression, used as the prefix for everything
/// nested under it. Non-path expressions get the bare partial path.
pub fn result_path(prefix: Option<&Path>, expr: &Expr) -> Result<Path, Error> {
    match expr {
        Expr::Select(query) => select_path(prefix, query),
        Expr::For(query) => subject_path(prefix, Some(&query.result)),
        other => subject_path(prefix, Some(other)),
    }
}

/// Path of a shape subject; a missing subject is the bare partial path.
pub fn shape_path(prefix: Option<&Path>, subject: Option<&Expr>) -> Result<Path, Error> {
    match subject {
        Some(expr) => result_path(prefix, expr),
        None => Ok(Path::partial_root()),
    }
}

fn subject_path(prefix: Option<&Path>, expr: Option<&Expr>) -> Result<Path, Error> {
    let mut current = expr;
    while let Some(Expr::Shape(shape)) = current {
        current = shape.expr.as_deref();
    }
    match current {
        Some(Expr::Path(path)) => Path::graft(prefix, path, false),
        _ => Ok(Path::partial_root()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pathql_lang::builder::*;

    fn parse(expr: Expr) -> PathExpr {
        match expr {
            Expr::Path(p) => p,
            other => panic!("not a path: {other:?}"),
        }
    }

    #[test]
    fn test_normalize_is_deterministic() {
        let expr = parse(path_steps(
            "Person",
            vec![ptr("notes"), is_type("Note"), link_prop("metanote")],
        ));
        let a = Path::normalize(&expr).unwrap();
        let b = Path::normalize(&expr).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), 4);
        assert_eq!(a.to_string(), "Person.notes[IS Note]@metanote");
    }

    #[test]
    fn test_graft_partial_onto_prefix() {
        let prefix = Path::normalize(&parse(path("Person", &["notes"]))).unwrap();
        let grafted = Path::graft(Some(&prefix), &PathExpr::partial(vec![ptr("name")]), false).unwrap();
        assert_eq!(
            grafted,
            Path::normalize(&parse(path("Person", &["notes", "name"]))).unwrap()
        );
    }

    #[test]
    fn test_graft_keeps_prefix_partial_marker() {
        let grafted = Path::graft(
            Some(&Path::partial_root()),
            &PathExpr::partial(vec![ptr("name")]),
            false,
        )
        .unwrap();
        assert_eq!(grafted.to_string(), "<partial>.name");
    }

    #[test]
    fn test_graft_absolute_ignores_prefix() {
        let prefix = Path::object_ref("Note");
        let expr = parse(path("Person", &["name"]));
        assert_eq!(
            Path::graft(Some(&prefix), &expr, false).unwrap(),
            Path::normalize(&expr).unwrap()
        );
    }

    #[test]
    fn test_graft_always_partial() {
        let prefix = Path::object_ref("Person");
        let element = PathExpr::new(vec![ptr("name")]);
        let grafted = Path::graft(Some(&prefix), &element, true).unwrap();
        assert_eq!(grafted.to_string(), "Person.name");
    }

    #[test]
    fn test_partial_without_prefix_fails() {
        let err = Path::graft(None, &PathExpr::partial(vec![ptr("name")]), false).unwrap_err();
        assert!(matches!(err, Error::MissingPrefix(_)));
    }

    #[test]
    fn test_opaque_compares_structurally() {
        let a = parse(expr_path(int_set(&[1, 2]), vec![ptr("x")]));
        let b = parse(expr_path(int_set(&[1, 2]), vec![ptr("x")]));
        let c = parse(expr_path(int_set(&[1, 3]), vec![ptr("x")]));
        assert_eq!(Path::normalize(&a).unwrap(), Path::normalize(&b).unwrap());
        assert_ne!(Path::normalize(&a).unwrap(), Path::normalize(&c).unwrap());
    }

    #[test]
    fn test_prefix_sorts_first() {
        let short = Path::normalize(&parse(path("Person", &[]))).unwrap();
        let long = Path::normalize(&parse(path("Person", &["name"]))).unwrap();
        assert!(short < long);
        assert_eq!(long.common_prefix(&short), short);
        assert_eq!(long.parent(), short);
    }

    #[test]
    fn test_element_order() {
        let pointer = |name: &str, direction| PathElement::Pointer {
            name: name.to_string(),
            direction,
            link_property: false,
        };

        assert!(pointer("notes", Direction::Backward) < pointer("notes", Direction::Forward));
        assert!(PathElement::TypeIntersection("notes".into()) < pointer("notes", Direction::Backward));
        assert!(PathElement::TypeIntersection("Note".into()) < pointer("name", Direction::Forward));
        assert!(PathElement::Partial < PathElement::ObjectRef("A".into()));

        let forward = Path::normalize(&parse(path_steps("Note", vec![ptr("owner")]))).unwrap();
        let backward = Path::normalize(&parse(path_steps("Note", vec![back("owner")]))).unwrap();
        assert!(backward < forward);
    }

    #[test]
    fn test_result_paths() {
        let person = Path::object_ref("Person");

        let query = select(shape(name("Person"), vec![element("name")])).build();
        assert_eq!(result_path(None, &query).unwrap(), person);

        let aliased = select(int(1)).alias("x").build();
        assert_eq!(result_path(None, &aliased).unwrap(), Path::object_ref("x"));

        let literal = select(int(1)).build();
        assert_eq!(result_path(None, &literal).unwrap(), Path::partial_root());

        assert_eq!(shape_path(Some(&person), None).unwrap(), Path::partial_root());
    }
}
