//! SELECT, FOR and shapes.

use std::cmp::Ordering;
use std::rc::Rc;

use super::executor::{EvalContext, Evaluator, InputTuple};
use crate::error::Error;
use crate::path::{select_path, shape_path, Path};
use crate::store::VIRTUAL_OBJECT;
use pathql_lang::{
    Alias, Expr, ForQuery, NonesOrder, PathExpr, PathStep, SelectQuery, Shape, ShapeElement,
    SortDirection, SortExpr,
};
use pathql_proto::{strip_shapes, Multiset, Obj, Value};

impl Evaluator<'_> {
    /// Evaluate a SELECT.
    ///
    /// FILTER and ORDER BY are correlated with the result: their references
    /// take part in inferring the result's inputs and they are evaluated per
    /// result row with the select path as prefix. OFFSET and LIMIT are
    /// evaluated once, without a prefix.
    pub(crate) fn eval_select(&self, query: &SelectQuery, ctx: &EvalContext) -> Result<Multiset, Error> {
        let ctx = self.eval_aliases(&query.aliases, ctx)?;
        let subq_path = select_path(ctx.prefix.as_ref(), query)?;

        let mut extra: Vec<(Option<Path>, &Expr)> = Vec::new();
        if let Some(filter) = &query.filter {
            extra.push((Some(subq_path.clone()), filter));
        }
        for key in &query.order_by {
            extra.push((Some(subq_path.clone()), &key.path));
        }

        let (bound, mut rows) = self.subquery_full(&query.result, &extra, &ctx)?;
        let mut bound = bound.as_ref().clone();
        bound.push(subq_path.clone());
        if let Some(alias) = &query.result_alias {
            for row in &mut rows {
                let last = row.last().cloned().flatten();
                row.push(last);
            }
            bound.push(Path::object_ref(alias));
        }
        let bound = Rc::new(bound);

        let scoped = ctx.with_prefix(Some(subq_path));
        let rows = self.eval_filter(query.filter.as_ref(), &bound, rows, &scoped)?;
        let mut rows = self.eval_order_by(&query.order_by, &bound, rows, &scoped)?;

        let unscoped = ctx.with_prefix(None);
        if let Some(offset) = self.eval_row_count("OFFSET", query.offset.as_ref(), &unscoped)? {
            rows.drain(..offset.min(rows.len()));
        }
        if let Some(limit) = self.eval_row_count("LIMIT", query.limit.as_ref(), &unscoped)? {
            rows.truncate(limit);
        }

        Ok(rows.into_iter().filter_map(|mut row| row.pop().flatten()).collect())
    }

    /// Bind aliases in order; each sees the ones before it.
    fn eval_aliases(&self, aliases: &[Alias], ctx: &EvalContext) -> Result<EvalContext, Error> {
        let mut ctx = ctx.clone();
        for alias in aliases {
            let values = strip_shapes(&self.subquery(&alias.expr, &ctx)?);
            Rc::make_mut(&mut ctx.aliases).insert(alias.name.clone(), values);
        }
        Ok(ctx)
    }

    fn eval_filter(
        &self,
        filter: Option<&Expr>,
        bound: &Rc<Vec<Path>>,
        rows: Vec<InputTuple>,
        ctx: &EvalContext,
    ) -> Result<Vec<InputTuple>, Error> {
        let Some(filter) = filter else {
            return Ok(rows);
        };
        let mut kept = Vec::with_capacity(rows.len());
        for row in rows {
            let sub = ctx.with_row(Rc::clone(bound), row.clone());
            if self.subquery(filter, &sub)?.iter().any(Value::is_truthy) {
                kept.push(row);
            }
        }
        Ok(kept)
    }

    /// Sort by each key from last to first; sorts are stable, so earlier keys
    /// take precedence.
    fn eval_order_by(
        &self,
        keys: &[SortExpr],
        bound: &Rc<Vec<Path>>,
        mut rows: Vec<InputTuple>,
        ctx: &EvalContext,
    ) -> Result<Vec<InputTuple>, Error> {
        for key in keys.iter().rev() {
            let nones_bigger = matches!(
                (key.direction, key.nones_order),
                (SortDirection::Asc, Some(NonesOrder::Last)) | (SortDirection::Desc, Some(NonesOrder::First))
            );

            let mut decorated = Vec::with_capacity(rows.len());
            for row in rows {
                let sub = ctx.with_row(Rc::clone(bound), row.clone());
                // A key yielding several values sorts on its first one.
                let value = self.subquery(&key.path, &sub)?.into_iter().next();
                decorated.push((SortKey::new(value, nones_bigger), row));
            }

            match key.direction {
                SortDirection::Asc => decorated.sort_by(|a, b| a.0.compare(&b.0)),
                SortDirection::Desc => decorated.sort_by(|a, b| b.0.compare(&a.0)),
            }
            rows = decorated.into_iter().map(|(_, row)| row).collect();
        }
        Ok(rows)
    }

    fn eval_row_count(
        &self,
        clause: &'static str,
        expr: Option<&Expr>,
        ctx: &EvalContext,
    ) -> Result<Option<usize>, Error> {
        let Some(expr) = expr else {
            return Ok(None);
        };
        let values = self.subquery(expr, ctx)?;
        if values.len() != 1 {
            return Err(Error::Cardinality {
                clause,
                expected: "exactly one value",
                got: values.len(),
            });
        }
        match &values[0] {
            Value::Int(n) if *n >= 0 => Ok(Some(usize::try_from(*n).unwrap_or(usize::MAX))),
            other => Err(Error::invalid(format!(
                "{} must be a non-negative integer, got {}",
                clause, other
            ))),
        }
    }

    /// Evaluate a shape: attach the element values to every subject object.
    pub(crate) fn eval_shape(&self, shape: &Shape, ctx: &EvalContext) -> Result<Multiset, Error> {
        let subject_path = shape_path(ctx.prefix.as_ref(), shape.expr.as_deref())?;
        let mut inputs = ctx.inputs.as_ref().clone();
        inputs.push(subject_path.clone());
        let inputs = Rc::new(inputs);

        let subjects = match shape.expr.as_deref() {
            Some(subject) => self.eval(subject, ctx)?,
            None => self.toplevel(&Expr::Path(PathExpr::new(vec![PathStep::ObjectRef {
                name: VIRTUAL_OBJECT.to_string(),
            }])))?,
        };

        let elements: Vec<(String, Expr)> = shape
            .elements
            .iter()
            .map(|el| (el.ptr.field_name(), element_query(el)))
            .collect();

        let element_ctx = ctx.with_prefix(Some(subject_path));
        let mut out = Vec::with_capacity(subjects.len());
        for subject in subjects {
            let obj = match subject {
                Value::Obj(obj) => obj,
                other => {
                    return Err(Error::invalid(format!(
                        "shape subject must be an object, got {}",
                        other.type_name()
                    )))
                }
            };

            let mut tuple = ctx.tuple.clone();
            tuple.push(Some(Value::Obj(obj.clone())));
            let sub = element_ctx.with_row(Rc::clone(&inputs), tuple);

            let mut fields: Vec<(String, Multiset)> = Vec::with_capacity(elements.len());
            for (name, query) in &elements {
                let values = self.eval(query, &sub)?;
                match fields.iter_mut().find(|(field, _)| field == name) {
                    Some(slot) => slot.1 = values,
                    None => fields.push((name.clone(), values)),
                }
            }

            let mut data = obj.data;
            data.extend(fields.iter().cloned());
            out.push(Value::Obj(Obj {
                id: obj.id,
                shape: Some(fields),
                data,
            }));
        }
        Ok(out)
    }

    /// Evaluate a FOR: bind the alias to each iterator value in turn and
    /// concatenate the results.
    pub(crate) fn eval_for(&self, query: &ForQuery, ctx: &EvalContext) -> Result<Multiset, Error> {
        let ctx = self.eval_aliases(&query.aliases, ctx)?;
        let values = strip_shapes(&self.subquery(&query.iterator, &ctx)?);

        let mut inputs = ctx.inputs.as_ref().clone();
        inputs.push(Path::object_ref(&query.iterator_alias));
        let inputs = Rc::new(inputs);

        let mut out = Vec::new();
        for value in values {
            let mut tuple = ctx.tuple.clone();
            tuple.push(Some(value));
            let sub = ctx.with_row(Rc::clone(&inputs), tuple);
            out.extend(self.subquery(&query.result, &sub)?);
            self.check_rows(out.len(), "FOR")?;
        }
        Ok(out)
    }
}

/// A shape element is evaluated as a SELECT over its pointer (or computed
/// expression) with the element's own clauses.
fn element_query(element: &ShapeElement) -> Expr {
    let mut result = match &element.compexpr {
        Some(expr) => expr.clone(),
        None => Expr::Path(PathExpr::partial(element.path().steps)),
    };
    if !element.elements.is_empty() {
        result = Expr::Shape(Shape {
            expr: Some(Box::new(result)),
            elements: element.elements.clone(),
        });
    }
    Expr::Select(Box::new(SelectQuery {
        aliases: Vec::new(),
        result,
        result_alias: None,
        filter: element.filter.clone(),
        order_by: element.order_by.clone(),
        offset: element.offset.clone(),
        limit: element.limit.clone(),
    }))
}

/// Sort key with an emptiness tag ahead of the value.
#[derive(Debug)]
struct SortKey {
    tag: bool,
    value: Option<Value>,
}

impl SortKey {
    fn new(value: Option<Value>, nones_bigger: bool) -> Self {
        let tag = if value.is_some() { !nones_bigger } else { nones_bigger };
        Self { tag, value }
    }

    fn compare(&self, other: &Self) -> Ordering {
        self.tag.cmp(&other.tag).then_with(|| match (&self.value, &other.value) {
            (Some(a), Some(b)) => a.sort_cmp(b),
            (None, None) => Ordering::Equal,
            (None, Some(_)) => Ordering::Less,
            (Some(_), None) => Ordering::Greater,
        })
    }
}
