//! Path navigation over the store.

use tracing::trace;

use super::executor::{EvalContext, Evaluator};
use crate::basis::dedup;
use crate::error::Error;
use crate::path::{Path, PathElement};
use pathql_lang::Direction;
use pathql_proto::{Multiset, Obj, Value};

impl Evaluator<'_> {
    /// Evaluate a canonical path.
    ///
    /// A path bound by an enclosing query yields its bound value. Otherwise
    /// the parent is evaluated and the last step applied to each of its
    /// values; object results reached from objects are deduplicated.
    pub(crate) fn eval_path(&self, path: &Path, ctx: &EvalContext) -> Result<Multiset, Error> {
        // The innermost binding wins.
        if let Some(i) = ctx.inputs.iter().rposition(|bound| bound == path) {
            return Ok(ctx.tuple.get(i).cloned().flatten().into_iter().collect());
        }

        let (last, parent) = match path.elements() {
            [] => return Err(Error::MalformedPath("empty path".into())),
            [root] => return self.eval_root(root, path, ctx),
            [.., last] => (last, path.parent()),
        };

        let base = self.eval_path(&parent, ctx)?;
        let mut out = Vec::new();
        for value in &base {
            match last {
                PathElement::Pointer {
                    name,
                    direction: Direction::Forward,
                    link_property,
                } => out.extend(self.forward(value, name, *link_property)?),
                PathElement::Pointer {
                    name,
                    direction: Direction::Backward,
                    ..
                } => out.extend(self.backward(value, name)?),
                PathElement::TypeIntersection(type_name) => {
                    out.extend(self.intersect(value, type_name)?)
                }
                PathElement::Partial | PathElement::ObjectRef(_) | PathElement::Opaque(_) => {
                    return Err(Error::MalformedPath(format!("{} inside a path", path)));
                }
            }
        }

        if matches!(base.first(), Some(Value::Obj(_))) && matches!(out.first(), Some(Value::Obj(_))) {
            out = dedup(out);
        }
        self.check_rows(out.len(), "path")?;
        trace!(path = %path, rows = out.len(), "evaluated path");
        Ok(out)
    }

    fn eval_root(&self, root: &PathElement, path: &Path, ctx: &EvalContext) -> Result<Multiset, Error> {
        match root {
            PathElement::ObjectRef(name) => self.object_ref(name, ctx),
            PathElement::Opaque(expr) => self.eval(expr.expr(), ctx),
            PathElement::Partial => Err(Error::UnresolvedPath(path.to_string())),
            PathElement::Pointer { .. } | PathElement::TypeIntersection(_) => {
                Err(Error::MalformedPath(format!("path {} has no root", path)))
            }
        }
    }

    /// Resolve a root name: an alias in scope, else every object of a type.
    pub(crate) fn object_ref(&self, name: &str, ctx: &EvalContext) -> Result<Multiset, Error> {
        if let Some(values) = ctx.aliases.get(name) {
            return Ok(values.clone());
        }
        if !self.store().has_extent(name) {
            return Err(Error::UnresolvedPath(name.to_string()));
        }
        Ok(self
            .store()
            .extent(name)
            .map(|record| Value::Obj(Obj::new(record.id)))
            .collect())
    }

    /// Follow a forward pointer from one value.
    ///
    /// Fields carried on the reference itself shadow the stored record.
    fn forward(&self, base: &Value, name: &str, link_property: bool) -> Result<Multiset, Error> {
        match base {
            Value::Obj(obj) => {
                let field = if link_property {
                    format!("@{}", name)
                } else {
                    name.to_string()
                };
                if let Some(values) = obj.field(&field) {
                    return Ok(values.clone());
                }
                let record = self.store().get(obj.id).ok_or(Error::MissingObject(obj.id))?;
                Ok(record.field(&field).cloned().unwrap_or_default())
            }
            Value::Tuple(items) => name
                .parse::<usize>()
                .ok()
                .and_then(|i| items.get(i))
                .map(|value| vec![value.clone()])
                .ok_or_else(|| Error::invalid(format!("tuple has no element '{}'", name))),
            Value::NamedTuple(fields) => fields
                .iter()
                .find(|(field, _)| field == name)
                .map(|(_, value)| vec![value.clone()])
                .ok_or_else(|| Error::invalid(format!("named tuple has no element '{}'", name))),
            other => Err(Error::mismatch(&format!(".{}", name), &[other])),
        }
    }

    /// Objects whose `name` field links to `base`, in store order.
    ///
    /// Link properties of the matching edge are carried on the result.
    fn backward(&self, base: &Value, name: &str) -> Result<Multiset, Error> {
        let target = match base {
            Value::Obj(obj) => obj,
            _ => return Ok(Vec::new()),
        };
        if !self.store().contains(target.id) {
            return Err(Error::MissingObject(target.id));
        }

        let mut out = Vec::new();
        for record in self.store().records() {
            let link = record
                .field(name)
                .and_then(|links| links.iter().filter_map(Value::as_obj).find(|link| link.id == target.id));
            if let Some(link) = link {
                let mut source = Obj::new(record.id);
                source.data = link.link_properties();
                out.push(Value::Obj(source));
            }
        }
        Ok(out)
    }

    /// Keep `base` if its stored type is exactly `type_name`.
    fn intersect(&self, base: &Value, type_name: &str) -> Result<Multiset, Error> {
        let obj = base
            .as_obj()
            .ok_or_else(|| Error::mismatch(&format!("[IS {}]", type_name), &[base]))?;
        let record = self.store().get(obj.id).ok_or(Error::MissingObject(obj.id))?;
        if record.type_name == type_name {
            Ok(vec![base.clone()])
        } else {
            Ok(Vec::new())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::store::{Record, Store};
    use pathql_lang::builder::*;
    use pathql_lang::Expr;
    use pathql_proto::ObjectId;
    use pretty_assertions::assert_eq;

    fn id(n: u128) -> ObjectId {
        ObjectId::from_u128(n)
    }

    fn store() -> Store {
        let mut store = Store::new();
        let link = |n: u128| Value::Obj(Obj::new(id(n)));
        store
            .insert(Record::new(id(1), "Box").with_field("items", vec![link(3), link(4), link(3)]))
            .unwrap();
        store
            .insert(Record::new(id(2), "Box").with_field(
                "items",
                vec![Value::Obj(Obj::new(id(4)).with_data("@slot", vec![Value::Int(7)]))],
            ))
            .unwrap();
        store.insert(Record::new(id(3), "Item").with_value("n", 3)).unwrap();
        store.insert(Record::new(id(4), "Item").with_value("n", 4)).unwrap();
        store
    }

    fn eval(store: &Store, expr: Expr) -> Result<Multiset, Error> {
        Evaluator::new(store).query(&expr)
    }

    fn ids(values: &[Value]) -> Vec<ObjectId> {
        values.iter().filter_map(Value::as_obj).map(|o| o.id).collect()
    }

    #[test]
    fn test_extent() {
        let store = store();
        assert_eq!(ids(&eval(&store, name("Box")).unwrap()), vec![id(1), id(2)]);
    }

    #[test]
    fn test_forward_dedups_objects() {
        let store = store();
        let out = eval(&store, path("Box", &["items"])).unwrap();
        assert_eq!(ids(&out), vec![id(3), id(4)]);
    }

    #[test]
    fn test_forward_scalars_keep_duplicates() {
        let mut store = store();
        store.insert(Record::new(id(5), "Item").with_value("n", 3)).unwrap();
        let out = eval(&store, path("Item", &["n"])).unwrap();
        assert_eq!(out, vec![Value::Int(3), Value::Int(4), Value::Int(3)]);
    }

    #[test]
    fn test_backward_carries_link_properties() {
        let store = store();
        let out = eval(&store, path_steps("Item", vec![back("items")])).unwrap();
        assert_eq!(ids(&out), vec![id(1), id(2)]);

        let slot = eval(
            &store,
            path_steps("Item", vec![back("items"), link_prop("slot")]),
        )
        .unwrap();
        assert_eq!(slot, vec![Value::Int(7)]);
    }

    #[test]
    fn test_type_intersection() {
        let store = store();
        let out = eval(&store, path_steps("Box", vec![ptr("items"), is_type("Box")])).unwrap();
        assert!(out.is_empty());
        let out = eval(&store, path_steps("Box", vec![ptr("items"), is_type("Item")])).unwrap();
        assert_eq!(out.len(), 2);
    }

    #[test]
    fn test_missing_field_is_empty() {
        let store = store();
        assert!(eval(&store, path("Item", &["nope"])).unwrap().is_empty());
    }

    #[test]
    fn test_unknown_extent() {
        let store = store();
        let err = eval(&store, name("Nope")).unwrap_err();
        assert!(matches!(err, Error::UnresolvedPath(_)));
    }

    #[test]
    fn test_dangling_link() {
        let mut store = Store::new();
        store
            .insert(Record::new(id(1), "Box").with_field("items", vec![Value::Obj(Obj::new(id(9)))]))
            .unwrap();
        let err = eval(&store, path("Box", &["items", "n"])).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::StoreConsistency);
    }

    #[test]
    fn test_tuple_and_named_tuple_access() {
        let store = Store::new();
        let out = eval(&store, expr_path(tuple(vec![int(1), str_lit("a")]), vec![ptr("1")])).unwrap();
        assert_eq!(out, vec![Value::from("a")]);

        let out = eval(&store, expr_path(named_tuple(vec![("x", int(5))]), vec![ptr("x")])).unwrap();
        assert_eq!(out, vec![Value::Int(5)]);
    }
}
