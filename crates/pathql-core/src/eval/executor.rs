//! Evaluator entry points and expression dispatch.

use std::cell::Cell;
use std::collections::HashMap;
use std::rc::Rc;

use tracing::{debug, instrument};

use crate::basis::{lift, CallEnv, OpKind, Registry};
use crate::config::EvalBudget;
use crate::error::Error;
use crate::infer::infer_inputs;
use crate::path::Path;
use crate::scope::{analyze, find_references};
use crate::store::Store;
use pathql_lang::{validate, Expr, Index};
use pathql_proto::{render, Multiset, Value};

/// One row of bound input values, parallel to the input path list.
/// `None` marks an optional input that produced nothing.
pub type InputTuple = Vec<Option<Value>>;

/// Scope of an expression being evaluated.
#[derive(Debug, Clone, Default)]
pub struct EvalContext {
    pub(crate) inputs: Rc<Vec<Path>>,
    pub(crate) tuple: InputTuple,
    pub(crate) aliases: Rc<HashMap<String, Multiset>>,
    pub(crate) prefix: Option<Path>,
}

impl EvalContext {
    /// Paths bound by enclosing queries.
    pub fn inputs(&self) -> &[Path] {
        &self.inputs
    }

    /// Values bound to [`EvalContext::inputs`] for the current row.
    pub fn tuple(&self) -> &[Option<Value>] {
        &self.tuple
    }

    /// Path that partial paths are grafted onto.
    pub fn prefix(&self) -> Option<&Path> {
        self.prefix.as_ref()
    }

    pub(crate) fn with_row(&self, inputs: Rc<Vec<Path>>, tuple: InputTuple) -> Self {
        Self {
            inputs,
            tuple,
            aliases: Rc::clone(&self.aliases),
            prefix: self.prefix.clone(),
        }
    }

    pub(crate) fn with_prefix(&self, prefix: Option<Path>) -> Self {
        Self {
            prefix,
            ..self.clone()
        }
    }
}

/// Evaluates query trees against a store.
///
/// An evaluator is a session: the `next()` counter and the recursion depth
/// live here, so one evaluator should not be shared between threads.
pub struct Evaluator<'a> {
    store: &'a Store,
    registry: Registry,
    budget: EvalBudget,
    depth: Cell<usize>,
    next_value: Cell<i64>,
}

impl<'a> Evaluator<'a> {
    /// Create a new evaluator with the standard library and default budget.
    pub fn new(store: &'a Store) -> Self {
        Self {
            store,
            registry: Registry::standard(),
            budget: EvalBudget::default(),
            depth: Cell::new(0),
            next_value: Cell::new(1),
        }
    }

    /// Set the resource budget.
    pub fn with_budget(mut self, budget: EvalBudget) -> Self {
        self.budget = budget;
        self
    }

    /// Replace the operator registry.
    pub fn with_registry(mut self, registry: Registry) -> Self {
        self.registry = registry;
        self
    }

    /// The store queries run against.
    pub fn store(&self) -> &Store {
        self.store
    }

    /// The operator registry.
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// The resource budget.
    pub fn budget(&self) -> EvalBudget {
        self.budget
    }

    /// Evaluate a query at top level.
    #[instrument(skip(self, expr), fields(kind = expr.kind_name()))]
    pub fn query(&self, expr: &Expr) -> Result<Multiset, Error> {
        validate(expr)?;
        let out = self.toplevel(expr)?;
        debug!(rows = out.len(), "query finished");
        Ok(out)
    }

    /// Evaluate a query and render the result as JSON.
    pub fn run(&self, expr: &Expr) -> Result<serde_json::Value, Error> {
        Ok(render(&self.query(expr)?))
    }

    /// Evaluate in an empty scope.
    pub(crate) fn toplevel(&self, expr: &Expr) -> Result<Multiset, Error> {
        self.subquery(expr, &EvalContext::default())
    }

    /// Evaluate as a subquery and keep only the result column.
    pub(crate) fn subquery(&self, expr: &Expr, ctx: &EvalContext) -> Result<Multiset, Error> {
        let (_, rows) = self.subquery_full(expr, &[], ctx)?;
        Ok(rows.into_iter().filter_map(|mut row| row.pop().flatten()).collect())
    }

    /// Evaluate as a subquery.
    ///
    /// Infers the input paths `expr` introduces, builds the input tuples
    /// over them and evaluates `expr` once per tuple. Each output row is the
    /// input tuple followed by one result value. Also returns the input list
    /// the rows are aligned with (minus the result column).
    pub(crate) fn subquery_full(
        &self,
        expr: &Expr,
        extra: &[(Option<Path>, &Expr)],
        ctx: &EvalContext,
    ) -> Result<(Rc<Vec<Path>>, Vec<InputTuple>), Error> {
        let refs = find_references(expr, ctx.prefix.as_ref(), extra, &self.registry)?;
        let analysis = analyze(refs);
        let inputs = infer_inputs(&analysis.direct, &analysis.subquery, &ctx.inputs);
        if !inputs.is_empty() {
            debug!(
                inputs = ?inputs.iter().map(Path::to_string).collect::<Vec<_>>(),
                "inferred input paths"
            );
        }

        let rows = self.build_tuples(&inputs, &analysis, ctx)?;

        let mut bound = ctx.inputs.as_ref().clone();
        bound.extend(inputs);
        let bound = Rc::new(bound);

        let mut out = Vec::new();
        for row in rows {
            let sub = ctx.with_row(Rc::clone(&bound), row.clone());
            for value in self.eval(expr, &sub)? {
                let mut full = row.clone();
                full.push(Some(value));
                out.push(full);
            }
            self.check_rows(out.len(), "subquery")?;
        }
        Ok((bound, out))
    }

    /// Evaluate an expression in the current scope.
    pub(crate) fn eval(&self, expr: &Expr, ctx: &EvalContext) -> Result<Multiset, Error> {
        let _guard = self.enter()?;
        match expr {
            Expr::Str { value } => Ok(vec![Value::Str(value.clone())]),
            Expr::Int { value } => Ok(vec![Value::Int(*value)]),
            Expr::Float { value } => Ok(vec![Value::Float(*value)]),
            Expr::Bool { value } => Ok(vec![Value::Bool(*value)]),
            Expr::Set { elements } => {
                let mut out = Vec::new();
                for element in elements {
                    out.extend(self.eval(element, ctx)?);
                }
                Ok(out)
            }
            Expr::Tuple { elements } => {
                let args = self.eval_each(elements.iter(), ctx)?;
                lift(&args, |vs| Ok(Value::Tuple(vs.to_vec())))
            }
            Expr::Array { elements } => {
                let args = self.eval_each(elements.iter(), ctx)?;
                lift(&args, |vs| Ok(Value::Array(vs.to_vec())))
            }
            Expr::NamedTuple { elements } => {
                let args = self.eval_each(elements.iter().map(|e| &e.value), ctx)?;
                lift(&args, |vs| {
                    Ok(Value::NamedTuple(
                        elements
                            .iter()
                            .map(|e| e.name.clone())
                            .zip(vs.iter().cloned())
                            .collect(),
                    ))
                })
            }
            Expr::BinOp { op, left, right } => {
                self.func_or_op(OpKind::Binop, &op.to_uppercase(), &[&**left, &**right], ctx)
            }
            Expr::UnaryOp { op, operand } => {
                self.func_or_op(OpKind::Unop, &op.to_uppercase(), &[&**operand], ctx)
            }
            Expr::Call { func, args } => {
                let args: Vec<&Expr> = args.iter().collect();
                self.func_or_op(OpKind::Func, func, &args, ctx)
            }
            Expr::Cast { ty, expr } => self.func_or_op(OpKind::Cast, ty, &[&**expr], ctx),
            Expr::IfElse {
                if_expr,
                condition,
                else_expr,
            } => self.func_or_op(
                OpKind::Binop,
                "IF",
                &[&**if_expr, &**condition, &**else_expr],
                ctx,
            ),
            Expr::Indirection { arg, indices } => self.eval_indirection(arg, indices, ctx),
            Expr::Path(path) => {
                let path = Path::graft(ctx.prefix.as_ref(), path, false)?;
                self.eval_path(&path, ctx)
            }
            Expr::Shape(shape) => self.eval_shape(shape, ctx),
            Expr::Select(query) => self.eval_select(query, ctx),
            Expr::For(query) => self.eval_for(query, ctx),
            Expr::Detached { expr } => self.toplevel(expr),
        }
    }

    fn eval_each<'e>(
        &self,
        exprs: impl Iterator<Item = &'e Expr>,
        ctx: &EvalContext,
    ) -> Result<Vec<Multiset>, Error> {
        exprs.map(|expr| self.eval(expr, ctx)).collect()
    }

    /// Resolve an operator, evaluate its arguments by parameter kind and
    /// apply it.
    fn func_or_op(
        &self,
        kind: OpKind,
        name: &str,
        args: &[&Expr],
        ctx: &EvalContext,
    ) -> Result<Multiset, Error> {
        let op = self.registry.resolve(kind, name, args.len())?;
        let mut values = Vec::with_capacity(args.len());
        for (arg, param) in args.iter().zip(&op.params) {
            let value = if param.is_subquery() {
                self.subquery(arg, ctx)?
            } else {
                self.eval(arg, ctx)?
            };
            values.push(value);
        }
        let out = op.apply(&values, &CallEnv::new(&self.next_value))?;
        self.check_rows(out.len(), name)?;
        Ok(out)
    }

    fn eval_indirection(
        &self,
        arg: &Expr,
        indices: &[Index],
        ctx: &EvalContext,
    ) -> Result<Multiset, Error> {
        let mut base = self.eval(arg, ctx)?;
        for index in indices {
            base = match index {
                Index::Index { index } => {
                    let positions = self.eval(index, ctx)?;
                    lift(&[base, positions], |vs| get_item(&vs[0], &vs[1]))?
                }
                Index::Slice { start, stop } => {
                    let starts = self.eval_bound(start.as_deref(), ctx)?;
                    let stops = self.eval_bound(stop.as_deref(), ctx)?;
                    let mut out = Vec::new();
                    for value in &base {
                        for start in &starts {
                            for stop in &stops {
                                out.push(get_slice(value, start.as_ref(), stop.as_ref())?);
                            }
                        }
                    }
                    out
                }
            };
        }
        Ok(base)
    }

    fn eval_bound(&self, expr: Option<&Expr>, ctx: &EvalContext) -> Result<Vec<Option<Value>>, Error> {
        match expr {
            Some(expr) => Ok(self.eval(expr, ctx)?.into_iter().map(Some).collect()),
            None => Ok(vec![None]),
        }
    }

    fn enter(&self) -> Result<DepthGuard<'_>, Error> {
        let depth = self.depth.get() + 1;
        if depth > self.budget.max_depth {
            return Err(Error::BudgetExceeded(format!(
                "expression nesting exceeds {}",
                self.budget.max_depth
            )));
        }
        self.depth.set(depth);
        Ok(DepthGuard(&self.depth))
    }

    pub(crate) fn check_rows(&self, rows: usize, what: &str) -> Result<(), Error> {
        if rows > self.budget.max_rows {
            return Err(Error::BudgetExceeded(format!(
                "{} produced more than {} rows",
                what, self.budget.max_rows
            )));
        }
        Ok(())
    }
}

struct DepthGuard<'a>(&'a Cell<usize>);

impl Drop for DepthGuard<'_> {
    fn drop(&mut self) {
        self.0.set(self.0.get().saturating_sub(1));
    }
}

fn get_item(base: &Value, index: &Value) -> Result<Value, Error> {
    match (base, index) {
        (Value::Str(s), Value::Int(i)) => {
            let chars: Vec<char> = s.chars().collect();
            let at = position(*i, chars.len())?;
            Ok(Value::Str(chars[at].to_string()))
        }
        (Value::Array(items) | Value::Tuple(items), Value::Int(i)) => {
            let at = position(*i, items.len())?;
            Ok(items[at].clone())
        }
        (Value::NamedTuple(fields), Value::Str(name)) => fields
            .iter()
            .find(|(field, _)| field == name)
            .map(|(_, value)| value.clone())
            .ok_or_else(|| Error::invalid(format!("no element named '{}'", name))),
        _ => Err(Error::mismatch("[]", &[base, index])),
    }
}

// Negative indexes count from the end.
fn position(index: i64, len: usize) -> Result<usize, Error> {
    let len_i = len as i64;
    let at = if index < 0 { len_i + index } else { index };
    if (0..len_i).contains(&at) {
        Ok(at as usize)
    } else {
        Err(Error::invalid(format!("index {} out of range", index)))
    }
}

fn get_slice(base: &Value, start: Option<&Value>, stop: Option<&Value>) -> Result<Value, Error> {
    let bound = |value: Option<&Value>| -> Result<Option<i64>, Error> {
        match value {
            None => Ok(None),
            Some(Value::Int(i)) => Ok(Some(*i)),
            Some(other) => Err(Error::mismatch("[:]", &[base, other])),
        }
    };
    let (start, stop) = (bound(start)?, bound(stop)?);
    match base {
        Value::Str(s) => {
            let chars: Vec<char> = s.chars().collect();
            let (from, to) = clamp_range(start, stop, chars.len());
            Ok(Value::Str(chars[from..to].iter().collect()))
        }
        Value::Array(items) => {
            let (from, to) = clamp_range(start, stop, items.len());
            Ok(Value::Array(items[from..to].to_vec()))
        }
        Value::Tuple(items) => {
            let (from, to) = clamp_range(start, stop, items.len());
            Ok(Value::Tuple(items[from..to].to_vec()))
        }
        other => Err(Error::mismatch("[:]", &[other])),
    }
}

fn clamp_range(start: Option<i64>, stop: Option<i64>, len: usize) -> (usize, usize) {
    let clamp = |index: i64| -> usize {
        let len_i = len as i64;
        let at = if index < 0 { len_i + index } else { index };
        at.clamp(0, len_i) as usize
    };
    let from = start.map_or(0, clamp);
    let to = stop.map_or(len, clamp);
    (from, to.max(from))
}
