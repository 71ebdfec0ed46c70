//! Operator and function library.
//!
//! Every operator, cast and function is registered under `(kind, name)` with
//! one [`ParamKind`] per argument. Singleton arguments are evaluated in the
//! current scope and combined by cartesian product ([`lift`]); set-of and
//! optional arguments are evaluated as correlated subqueries and handed over
//! whole.

use std::cell::Cell;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::error::Error;
use pathql_proto::{strip_shapes, Multiset, Value};
use uuid::Uuid;

/// Registry namespace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OpKind {
    Binop,
    Unop,
    Cast,
    Func,
}

impl fmt::Display for OpKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            OpKind::Binop => "binop",
            OpKind::Unop => "unop",
            OpKind::Cast => "cast",
            OpKind::Func => "func",
        };
        write!(f, "{}", name)
    }
}

/// How an argument position is evaluated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamKind {
    /// Evaluated in scope and lifted over.
    Singleton,
    /// Evaluated as a subquery; absence does not eliminate the row.
    Optional,
    /// Evaluated as a subquery and passed as a whole multiset.
    SetOf,
}

impl ParamKind {
    /// Whether arguments in this position are evaluated as subqueries.
    pub fn is_subquery(self) -> bool {
        matches!(self, ParamKind::Optional | ParamKind::SetOf)
    }
}

/// Session state available to implementations.
pub struct CallEnv<'a> {
    next_value: &'a Cell<i64>,
}

impl<'a> CallEnv<'a> {
    /// Create a new environment over a session counter.
    pub fn new(next_value: &'a Cell<i64>) -> Self {
        Self { next_value }
    }

    /// Take the next value of the session counter.
    pub fn next_value(&self) -> i64 {
        let value = self.next_value.get();
        self.next_value.set(value + 1);
        value
    }
}

/// A lifted implementation: one multiset per argument in, one multiset out.
pub type Implementation = Arc<dyn Fn(&[Multiset], &CallEnv<'_>) -> Result<Multiset, Error> + Send + Sync>;

/// A registered operator or function.
#[derive(Clone)]
pub struct Operator {
    /// One entry per argument.
    pub params: Vec<ParamKind>,
    implementation: Implementation,
}

impl Operator {
    /// Apply to already-evaluated arguments.
    pub fn apply(&self, args: &[Multiset], env: &CallEnv<'_>) -> Result<Multiset, Error> {
        (self.implementation)(args, env)
    }
}

impl fmt::Debug for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Operator").field("params", &self.params).finish()
    }
}

/// Table of operators, casts and functions.
#[derive(Debug, Clone)]
pub struct Registry {
    operators: HashMap<(OpKind, String), Operator>,
}

impl Default for Registry {
    fn default() -> Self {
        Self::standard()
    }
}

impl Registry {
    /// Create an empty registry.
    pub fn empty() -> Self {
        Self {
            operators: HashMap::new(),
        }
    }

    /// Register an implementation, replacing any previous one.
    pub fn register<F>(&mut self, kind: OpKind, name: &str, params: Vec<ParamKind>, f: F)
    where
        F: Fn(&[Multiset], &CallEnv<'_>) -> Result<Multiset, Error> + Send + Sync + 'static,
    {
        self.operators.insert(
            (kind, name.to_string()),
            Operator {
                params,
                implementation: Arc::new(f),
            },
        );
    }

    /// Look up an operator.
    pub fn get(&self, kind: OpKind, name: &str) -> Option<&Operator> {
        self.operators.get(&(kind, name.to_string()))
    }

    /// Look up an operator, failing on unknown names and wrong arity.
    pub fn resolve(&self, kind: OpKind, name: &str, arity: usize) -> Result<&Operator, Error> {
        let op = self.get(kind, name).ok_or_else(|| Error::UnknownOperator {
            kind,
            name: name.to_string(),
        })?;
        if op.params.len() != arity {
            return Err(Error::Arity {
                kind,
                name: name.to_string(),
                expected: op.params.len(),
                got: arity,
            });
        }
        Ok(op)
    }

    /// Parameter kinds for an operator, if registered.
    pub fn params(&self, kind: OpKind, name: &str) -> Option<&[ParamKind]> {
        self.get(kind, name).map(|op| op.params.as_slice())
    }

    /// Registered names of a kind, sorted.
    pub fn names(&self, kind: OpKind) -> Vec<&str> {
        let mut names: Vec<&str> = self
            .operators
            .keys()
            .filter(|(k, _)| *k == kind)
            .map(|(_, name)| name.as_str())
            .collect();
        names.sort_unstable();
        names
    }

    /// Resolve and apply an operator.
    pub fn call(
        &self,
        kind: OpKind,
        name: &str,
        args: &[Multiset],
        env: &CallEnv<'_>,
    ) -> Result<Multiset, Error> {
        self.resolve(kind, name, args.len())?.apply(args, env)
    }

    /// The standard library.
    pub fn standard() -> Self {
        use ParamKind::{Optional, SetOf, Singleton};

        let mut reg = Self::empty();

        // Arithmetic and comparison
        reg.binop("+", add);
        reg.binop("++", add);
        reg.binop("-", sub);
        reg.binop("*", mul);
        reg.binop("/", true_div);
        reg.binop("//", floor_div);
        reg.binop("%", modulo);
        reg.binop("^", pow);
        reg.binop("=", |a, b| Ok(Value::Bool(a == b)));
        reg.binop("!=", |a, b| Ok(Value::Bool(a != b)));
        reg.binop("<", |a, b| compare_with("<", a, b, Ordering::is_lt));
        reg.binop("<=", |a, b| compare_with("<=", a, b, Ordering::is_le));
        reg.binop(">", |a, b| compare_with(">", a, b, Ordering::is_gt));
        reg.binop(">=", |a, b| compare_with(">=", a, b, Ordering::is_ge));
        reg.binop("OR", |a, b| logic("OR", a, b, |x, y| x || y));
        reg.binop("AND", |a, b| logic("AND", a, b, |x, y| x && y));

        // Set-level binary operators
        reg.register(OpKind::Binop, "?=", vec![Optional, Optional], |args, _| {
            Ok(optional_eq(&args[0], &args[1], true))
        });
        reg.register(OpKind::Binop, "?!=", vec![Optional, Optional], |args, _| {
            Ok(optional_eq(&args[0], &args[1], false))
        });
        reg.register(OpKind::Binop, "IN", vec![Singleton, SetOf], |args, _| {
            Ok(args[0]
                .iter()
                .map(|e| Value::Bool(args[1].contains(e)))
                .collect())
        });
        reg.register(OpKind::Binop, "NOT IN", vec![Singleton, SetOf], |args, _| {
            Ok(args[0]
                .iter()
                .map(|e| Value::Bool(!args[1].contains(e)))
                .collect())
        });
        reg.register(OpKind::Binop, "??", vec![Optional, SetOf], |args, _| {
            let chosen = if args[0].is_empty() { &args[1] } else { &args[0] };
            Ok(strip_shapes(chosen))
        });
        reg.register(OpKind::Binop, "UNION", vec![SetOf, SetOf], |args, _| {
            Ok(strip_shapes(&[args[0].as_slice(), args[1].as_slice()].concat()))
        });
        reg.register(OpKind::Binop, "IF", vec![SetOf, Singleton, SetOf], |args, _| {
            let mut out = Vec::new();
            for cond in &args[1] {
                if cond.is_truthy() {
                    out.extend(args[0].iter().cloned());
                } else {
                    out.extend(args[2].iter().cloned());
                }
            }
            Ok(out)
        });

        // Unary operators
        reg.unop("-", negate);
        reg.unop("+", |v| match v {
            Value::Int(_) | Value::Float(_) => Ok(v.clone()),
            other => Err(Error::mismatch("unary +", &[other])),
        });
        reg.unop("NOT", |v| match v {
            Value::Bool(b) => Ok(Value::Bool(!b)),
            other => Err(Error::mismatch("NOT", &[other])),
        });
        reg.register(OpKind::Unop, "EXISTS", vec![SetOf], |args, _| {
            Ok(vec![Value::Bool(!args[0].is_empty())])
        });
        reg.register(OpKind::Unop, "DISTINCT", vec![SetOf], |args, _| {
            Ok(dedup(args[0].clone()))
        });

        // Casts
        reg.cast("str", cast_str);
        reg.cast("int32", |v| {
            let i = cast_int(v)?;
            i32::try_from(i)
                .map(|_| Value::Int(i))
                .map_err(|_| Error::invalid(format!("{} out of range for int32", i)))
        });
        reg.cast("int64", |v| cast_int(v).map(Value::Int));
        reg.cast("uuid", |v| match v {
            Value::Uuid(_) => Ok(v.clone()),
            Value::Str(s) => Uuid::parse_str(s.trim())
                .map(Value::Uuid)
                .map_err(|e| Error::invalid(format!("invalid uuid '{}': {}", s, e))),
            other => Err(Error::mismatch("<uuid>", &[other])),
        });
        reg.cast("array", |v| match v {
            Value::Array(items) if items.is_empty() => Ok(v.clone()),
            _ => Err(Error::invalid("only empty arrays can be cast")),
        });

        // Aggregates
        reg.register(OpKind::Func, "count", vec![SetOf], |args, _| {
            Ok(vec![Value::Int(args[0].len() as i64)])
        });
        reg.register(OpKind::Func, "sum", vec![SetOf], |args, _| {
            let total = args[0]
                .iter()
                .try_fold(Value::Int(0), |acc, v| add(&acc, v))?;
            Ok(vec![total])
        });
        reg.register(OpKind::Func, "min", vec![SetOf], |args, _| {
            Ok(extremum("min", &args[0], Ordering::Less)?.into_iter().collect())
        });
        reg.register(OpKind::Func, "max", vec![SetOf], |args, _| {
            Ok(extremum("max", &args[0], Ordering::Greater)?.into_iter().collect())
        });
        reg.register(OpKind::Func, "all", vec![SetOf], |args, _| {
            Ok(vec![Value::Bool(args[0].iter().all(Value::is_truthy))])
        });
        reg.register(OpKind::Func, "any", vec![SetOf], |args, _| {
            Ok(vec![Value::Bool(args[0].iter().any(Value::is_truthy))])
        });
        reg.register(OpKind::Func, "enumerate", vec![SetOf], |args, _| {
            Ok(args[0]
                .iter()
                .enumerate()
                .map(|(i, v)| Value::Tuple(vec![Value::Int(i as i64), v.clone()]))
                .collect())
        });
        reg.register(OpKind::Func, "array_agg", vec![SetOf], |args, _| {
            Ok(vec![Value::Array(args[0].clone())])
        });

        // Element functions
        reg.register(OpKind::Func, "array_unpack", vec![Singleton], |args, _| {
            let mut out = Vec::new();
            for v in &args[0] {
                match v {
                    Value::Array(items) => out.extend(items.iter().cloned()),
                    other => return Err(Error::mismatch("array_unpack", &[other])),
                }
            }
            Ok(out)
        });
        reg.func1("len", |v| match v {
            Value::Str(s) => Ok(Value::Int(s.chars().count() as i64)),
            Value::Array(items) | Value::Tuple(items) => Ok(Value::Int(items.len() as i64)),
            Value::NamedTuple(fields) => Ok(Value::Int(fields.len() as i64)),
            other => Err(Error::mismatch("len", &[other])),
        });
        reg.register(OpKind::Func, "contains", vec![Singleton, Singleton], |args, _| {
            lift(args, |vs| contains(&vs[0], &vs[1]))
        });
        reg.func1("round", |v| match v {
            Value::Int(_) => Ok(v.clone()),
            Value::Float(f) => float_to_int(f.round_ties_even()).map(Value::Int),
            other => Err(Error::invalid(format!("cannot round {}", other))),
        });
        reg.register(OpKind::Func, "random", vec![], |args, _| {
            lift(args, |_| Ok(Value::Float(rand::random::<f64>())))
        });
        reg.register(OpKind::Func, "next", vec![], |args, env| {
            lift(args, |_| Ok(Value::Int(env.next_value())))
        });
        reg.register(OpKind::Func, "uuid_generate_v1mc", vec![], |args, _| {
            lift(args, |_| Ok(Value::Uuid(Uuid::new_v4())))
        });

        reg
    }

    fn binop(&mut self, name: &str, f: fn(&Value, &Value) -> Result<Value, Error>) {
        use ParamKind::Singleton;
        self.register(OpKind::Binop, name, vec![Singleton, Singleton], move |args, _| {
            lift(args, |vs| f(&vs[0], &vs[1]))
        });
    }

    fn unop(&mut self, name: &str, f: fn(&Value) -> Result<Value, Error>) {
        self.lifted1(OpKind::Unop, name, f);
    }

    fn cast(&mut self, name: &str, f: fn(&Value) -> Result<Value, Error>) {
        self.lifted1(OpKind::Cast, name, f);
    }

    fn func1(&mut self, name: &str, f: fn(&Value) -> Result<Value, Error>) {
        self.lifted1(OpKind::Func, name, f);
    }

    fn lifted1(&mut self, kind: OpKind, name: &str, f: fn(&Value) -> Result<Value, Error>) {
        self.register(kind, name, vec![ParamKind::Singleton], move |args, _| {
            lift(args, |vs| f(&vs[0]))
        });
    }
}

/// Apply `f` to every combination of one value per argument.
///
/// Combinations are produced in cartesian-product order, first argument
/// outermost. With no arguments `f` is called once.
pub fn lift<F>(args: &[Multiset], f: F) -> Result<Multiset, Error>
where
    F: Fn(&[Value]) -> Result<Value, Error>,
{
    let mut combos: Vec<Vec<Value>> = vec![Vec::new()];
    for arg in args {
        let mut next = Vec::with_capacity(combos.len() * arg.len());
        for combo in &combos {
            for value in arg {
                let mut extended = combo.clone();
                extended.push(value.clone());
                next.push(extended);
            }
        }
        combos = next;
    }
    combos.iter().map(|combo| f(combo)).collect()
}

/// Remove duplicates, keeping first occurrences. Objects compare by id.
pub fn dedup(values: Multiset) -> Multiset {
    let mut out: Multiset = Vec::with_capacity(values.len());
    for value in values {
        if !out.contains(&value) {
            out.push(value);
        }
    }
    out
}

fn optional_eq(left: &[Value], right: &[Value], eq: bool) -> Multiset {
    if left.is_empty() || right.is_empty() {
        return vec![Value::Bool((left.len() == right.len()) == eq)];
    }
    let mut out = Vec::with_capacity(left.len() * right.len());
    for a in left {
        for b in right {
            out.push(Value::Bool((a == b) == eq));
        }
    }
    out
}

fn add(a: &Value, b: &Value) -> Result<Value, Error> {
    match (a, b) {
        (Value::Int(x), Value::Int(y)) => x
            .checked_add(*y)
            .map(Value::Int)
            .ok_or_else(|| Error::invalid("integer overflow")),
        (Value::Str(x), Value::Str(y)) => Ok(Value::Str(format!("{}{}", x, y))),
        (Value::Array(x), Value::Array(y)) => Ok(Value::Array([x.as_slice(), y].concat())),
        (Value::Tuple(x), Value::Tuple(y)) => Ok(Value::Tuple([x.as_slice(), y].concat())),
        _ => float_op("+", a, b, |x, y| Ok(x + y)),
    }
}

fn sub(a: &Value, b: &Value) -> Result<Value, Error> {
    match (a, b) {
        (Value::Int(x), Value::Int(y)) => x
            .checked_sub(*y)
            .map(Value::Int)
            .ok_or_else(|| Error::invalid("integer overflow")),
        _ => float_op("-", a, b, |x, y| Ok(x - y)),
    }
}

fn mul(a: &Value, b: &Value) -> Result<Value, Error> {
    match (a, b) {
        (Value::Int(x), Value::Int(y)) => x
            .checked_mul(*y)
            .map(Value::Int)
            .ok_or_else(|| Error::invalid("integer overflow")),
        _ => float_op("*", a, b, |x, y| Ok(x * y)),
    }
}

fn true_div(a: &Value, b: &Value) -> Result<Value, Error> {
    float_op("/", a, b, |x, y| {
        if y == 0.0 {
            Err(Error::invalid("division by zero"))
        } else {
            Ok(x / y)
        }
    })
}

fn floor_div(a: &Value, b: &Value) -> Result<Value, Error> {
    match (a, b) {
        (Value::Int(_), Value::Int(0)) => Err(Error::invalid("division by zero")),
        (Value::Int(x), Value::Int(y)) => {
            let q = x
                .checked_div(*y)
                .ok_or_else(|| Error::invalid("integer overflow"))?;
            if x % y != 0 && ((*x < 0) != (*y < 0)) {
                Ok(Value::Int(q - 1))
            } else {
                Ok(Value::Int(q))
            }
        }
        _ => float_op("//", a, b, |x, y| {
            if y == 0.0 {
                Err(Error::invalid("division by zero"))
            } else {
                Ok((x / y).floor())
            }
        }),
    }
}

// The result takes the sign of the divisor.
fn modulo(a: &Value, b: &Value) -> Result<Value, Error> {
    match (a, b) {
        (Value::Int(_), Value::Int(0)) => Err(Error::invalid("modulo by zero")),
        (Value::Int(x), Value::Int(y)) => {
            let r = x.wrapping_rem(*y);
            if r != 0 && ((r < 0) != (*y < 0)) {
                Ok(Value::Int(r + y))
            } else {
                Ok(Value::Int(r))
            }
        }
        _ => float_op("%", a, b, |x, y| {
            if y == 0.0 {
                return Err(Error::invalid("modulo by zero"));
            }
            let r = x % y;
            if r != 0.0 && ((r < 0.0) != (y < 0.0)) {
                Ok(r + y)
            } else {
                Ok(r)
            }
        }),
    }
}

fn pow(a: &Value, b: &Value) -> Result<Value, Error> {
    match (a, b) {
        (Value::Int(x), Value::Int(y)) if *y >= 0 => u32::try_from(*y)
            .ok()
            .and_then(|e| x.checked_pow(e))
            .map(Value::Int)
            .ok_or_else(|| Error::invalid("integer overflow")),
        _ => float_op("^", a, b, |x, y| Ok(x.powf(y))),
    }
}

fn float_op(
    op: &str,
    a: &Value,
    b: &Value,
    f: impl Fn(f64, f64) -> Result<f64, Error>,
) -> Result<Value, Error> {
    match (a, b) {
        (Value::Int(_) | Value::Float(_), Value::Int(_) | Value::Float(_)) => {
            let (x, y) = (a.as_float(), b.as_float());
            match (x, y) {
                (Some(x), Some(y)) => f(x, y).map(Value::Float),
                _ => Err(Error::mismatch(op, &[a, b])),
            }
        }
        _ => Err(Error::mismatch(op, &[a, b])),
    }
}

fn negate(v: &Value) -> Result<Value, Error> {
    match v {
        Value::Int(i) => i
            .checked_neg()
            .map(Value::Int)
            .ok_or_else(|| Error::invalid("integer overflow")),
        Value::Float(f) => Ok(Value::Float(-f)),
        other => Err(Error::mismatch("unary -", &[other])),
    }
}

fn compare_with(
    op: &str,
    a: &Value,
    b: &Value,
    test: fn(Ordering) -> bool,
) -> Result<Value, Error> {
    a.compare(b)
        .map(|ord| Value::Bool(test(ord)))
        .ok_or_else(|| Error::mismatch(op, &[a, b]))
}

fn logic(op: &str, a: &Value, b: &Value, f: fn(bool, bool) -> bool) -> Result<Value, Error> {
    match (a, b) {
        (Value::Bool(x), Value::Bool(y)) => Ok(Value::Bool(f(*x, *y))),
        _ => Err(Error::mismatch(op, &[a, b])),
    }
}

fn contains(haystack: &Value, needle: &Value) -> Result<Value, Error> {
    match (haystack, needle) {
        (Value::Str(h), Value::Str(n)) => Ok(Value::Bool(h.contains(n.as_str()))),
        (Value::Array(items), _) => Ok(Value::Bool(items.contains(needle))),
        _ => Err(Error::mismatch("contains", &[haystack, needle])),
    }
}

fn extremum(name: &str, values: &[Value], keep: Ordering) -> Result<Option<Value>, Error> {
    let mut best: Option<&Value> = None;
    for value in values {
        best = match best {
            None => Some(value),
            Some(current) => match value.compare(current) {
                Some(ord) if ord == keep => Some(value),
                Some(_) => Some(current),
                None => return Err(Error::mismatch(name, &[current, value])),
            },
        };
    }
    Ok(best.cloned())
}

fn cast_str(v: &Value) -> Result<Value, Error> {
    match v {
        Value::Str(_) => Ok(v.clone()),
        Value::Obj(_) => Err(Error::mismatch("<str>", &[v])),
        other => Ok(Value::Str(other.to_string())),
    }
}

fn cast_int(v: &Value) -> Result<i64, Error> {
    match v {
        Value::Int(i) => Ok(*i),
        Value::Float(f) => float_to_int(f.trunc()),
        Value::Bool(b) => Ok(i64::from(*b)),
        Value::Str(s) => s
            .trim()
            .parse()
            .map_err(|_| Error::invalid(format!("invalid integer '{}'", s))),
        other => Err(Error::invalid(format!("cannot cast {} to int", other))),
    }
}

/// Convert an integral float, rejecting NaN, infinities and out-of-range values.
fn float_to_int(f: f64) -> Result<i64, Error> {
    // -2^63 is exact in f64; 2^63 is the first value past i64::MAX.
    const LOW: f64 = -9_223_372_036_854_775_808.0;
    const HIGH: f64 = 9_223_372_036_854_775_808.0;
    if (LOW..HIGH).contains(&f) {
        Ok(f as i64)
    } else {
        Err(Error::invalid(format!("{} is out of integer range", f)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use pretty_assertions::assert_eq;

    fn ints(values: &[i64]) -> Multiset {
        values.iter().copied().map(Value::Int).collect()
    }

    fn call(kind: OpKind, name: &str, args: &[Multiset]) -> Result<Multiset, Error> {
        let counter = Cell::new(1);
        Registry::standard().call(kind, name, args, &CallEnv::new(&counter))
    }

    #[test]
    fn test_lift_is_cartesian() {
        let out = lift(&[ints(&[1, 2]), ints(&[10, 20])], |vs| add(&vs[0], &vs[1])).unwrap();
        assert_eq!(out, ints(&[11, 21, 12, 22]));

        let empty = lift(&[ints(&[1, 2]), vec![]], |vs| add(&vs[0], &vs[1])).unwrap();
        assert!(empty.is_empty());
    }

    #[test]
    fn test_arithmetic_follows_floor_semantics() {
        assert_eq!(floor_div(&Value::Int(-7), &Value::Int(2)).unwrap(), Value::Int(-4));
        assert_eq!(modulo(&Value::Int(-7), &Value::Int(2)).unwrap(), Value::Int(1));
        assert_eq!(modulo(&Value::Int(7), &Value::Int(-2)).unwrap(), Value::Int(-1));
        assert_eq!(true_div(&Value::Int(7), &Value::Int(2)).unwrap(), Value::Float(3.5));
        assert_eq!(pow(&Value::Int(2), &Value::Int(10)).unwrap(), Value::Int(1024));
        assert_eq!(pow(&Value::Int(2), &Value::Int(-1)).unwrap(), Value::Float(0.5));
    }

    #[test]
    fn test_floor_division_overflow() {
        let err = call(OpKind::Binop, "//", &[ints(&[i64::MIN]), ints(&[-1])]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidValue);
        assert_eq!(
            call(OpKind::Binop, "//", &[ints(&[i64::MIN]), ints(&[1])]).unwrap(),
            ints(&[i64::MIN])
        );
        assert_eq!(
            call(OpKind::Binop, "%", &[ints(&[i64::MIN]), ints(&[-1])]).unwrap(),
            ints(&[0])
        );
    }

    #[test]
    fn test_float_to_int_range() {
        assert_eq!(cast_int(&Value::Float(-2.7)).unwrap(), -2);
        assert_eq!(float_to_int(-9_223_372_036_854_775_808.0).unwrap(), i64::MIN);
        for bad in [f64::NAN, f64::INFINITY, f64::NEG_INFINITY, 1e19, -1e19] {
            let err = cast_int(&Value::Float(bad)).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::InvalidValue);
        }

        let err = call(OpKind::Func, "round", &[vec![Value::Float(f64::NAN)]]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidValue);
        assert_eq!(
            call(OpKind::Func, "round", &[vec![Value::Float(2.5)]]).unwrap(),
            ints(&[2])
        );
    }

    #[test]
    fn test_division_by_zero() {
        let err = call(OpKind::Binop, "/", &[ints(&[1]), ints(&[0])]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidValue);
    }

    #[test]
    fn test_optional_equality() {
        assert_eq!(
            call(OpKind::Binop, "?=", &[vec![], vec![]]).unwrap(),
            vec![Value::Bool(true)]
        );
        assert_eq!(
            call(OpKind::Binop, "?=", &[ints(&[1]), vec![]]).unwrap(),
            vec![Value::Bool(false)]
        );
        assert_eq!(
            call(OpKind::Binop, "?!=", &[ints(&[1]), vec![]]).unwrap(),
            vec![Value::Bool(true)]
        );
        assert_eq!(
            call(OpKind::Binop, "?=", &[ints(&[1]), ints(&[1])]).unwrap(),
            vec![Value::Bool(true)]
        );
    }

    #[test]
    fn test_membership() {
        assert_eq!(
            call(OpKind::Binop, "IN", &[ints(&[1, 4]), ints(&[1, 2, 3])]).unwrap(),
            vec![Value::Bool(true), Value::Bool(false)]
        );
        assert_eq!(
            call(OpKind::Binop, "NOT IN", &[ints(&[4]), ints(&[1, 2, 3])]).unwrap(),
            vec![Value::Bool(true)]
        );
    }

    #[test]
    fn test_if_includes_whole_branches() {
        let out = call(
            OpKind::Binop,
            "IF",
            &[
                ints(&[1, 2]),
                vec![Value::Bool(true), Value::Bool(false)],
                ints(&[3]),
            ],
        )
        .unwrap();
        assert_eq!(out, ints(&[1, 2, 3]));
    }

    #[test]
    fn test_aggregates() {
        assert_eq!(call(OpKind::Func, "count", &[ints(&[5, 5])]).unwrap(), ints(&[2]));
        assert_eq!(call(OpKind::Func, "sum", &[vec![]]).unwrap(), ints(&[0]));
        assert_eq!(call(OpKind::Func, "sum", &[ints(&[1, 2, 3])]).unwrap(), ints(&[6]));
        assert_eq!(call(OpKind::Func, "min", &[ints(&[3, 1, 2])]).unwrap(), ints(&[1]));
        assert_eq!(call(OpKind::Func, "max", &[ints(&[3, 1, 2])]).unwrap(), ints(&[3]));
        assert!(call(OpKind::Func, "max", &[vec![]]).unwrap().is_empty());
        assert_eq!(
            call(OpKind::Func, "enumerate", &[vec!["a".into()]]).unwrap(),
            vec![Value::Tuple(vec![Value::Int(0), "a".into()])]
        );
    }

    #[test]
    fn test_casts() {
        assert_eq!(
            call(OpKind::Cast, "str", &[vec![Value::Bool(true), Value::Int(3)]]).unwrap(),
            vec![Value::from("true"), Value::from("3")]
        );
        assert_eq!(
            call(OpKind::Cast, "int64", &[vec![" 42 ".into()]]).unwrap(),
            ints(&[42])
        );
        assert!(call(OpKind::Cast, "int32", &[ints(&[1 << 40])]).is_err());
        assert!(call(OpKind::Cast, "array", &[vec![Value::Array(vec![1.into()])]]).is_err());
    }

    #[test]
    fn test_round_half_even() {
        assert_eq!(
            call(OpKind::Func, "round", &[vec![Value::Float(2.5), Value::Float(3.5)]]).unwrap(),
            ints(&[2, 4])
        );
    }

    #[test]
    fn test_next_uses_session_counter() {
        let counter = Cell::new(1);
        let reg = Registry::standard();
        let env = CallEnv::new(&counter);
        assert_eq!(reg.call(OpKind::Func, "next", &[], &env).unwrap(), ints(&[1]));
        assert_eq!(reg.call(OpKind::Func, "next", &[], &env).unwrap(), ints(&[2]));
    }

    #[test]
    fn test_unknown_and_arity() {
        let err = call(OpKind::Func, "nope", &[]).unwrap_err();
        assert!(matches!(err, Error::UnknownOperator { .. }));
        assert_eq!(err.kind(), ErrorKind::MalformedQuery);

        let err = call(OpKind::Func, "len", &[vec![], vec![]]).unwrap_err();
        assert!(matches!(err, Error::Arity { expected: 1, got: 2, .. }));
    }

    #[test]
    fn test_register_extends_table() {
        let mut reg = Registry::standard();
        reg.register(OpKind::Func, "double", vec![ParamKind::Singleton], |args, _| {
            lift(args, |vs| mul(&vs[0], &Value::Int(2)))
        });
        let counter = Cell::new(1);
        let out = reg
            .call(OpKind::Func, "double", &[ints(&[4])], &CallEnv::new(&counter))
            .unwrap();
        assert_eq!(out, ints(&[8]));
        assert!(reg.names(OpKind::Func).contains(&"double"));
    }

    #[test]
    fn test_dedup_keeps_first() {
        assert_eq!(dedup(ints(&[1, 2, 1, 3, 2])), ints(&[1, 2, 3]));
    }
}
