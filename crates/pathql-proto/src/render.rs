//! Shape stripping and output rendering.
//!
//! Evaluation results carry bookkeeping (shapes on object references, link
//! data). [`strip_shapes`] resets shapes while keeping data, which is what
//! coalesce, UNION, WITH and FOR iterators see. [`render`] applies the output
//! rule: objects reduce to their shape, composites recurse.

use serde_json::{Map, Number, Value as Json};

use crate::value::Value;

/// Strip shapes from every value of a multiset.
pub fn strip_shapes(values: &[Value]) -> Vec<Value> {
    values.iter().map(Value::strip_shapes).collect()
}

/// Render a multiset as a JSON array.
pub fn render(values: &[Value]) -> Json {
    Json::Array(values.iter().map(Value::to_json).collect())
}

impl Value {
    /// Reset the shape of every object reference reachable through composites.
    pub fn strip_shapes(&self) -> Value {
        match self {
            Value::Obj(o) => Value::Obj(o.stripped()),
            Value::Tuple(items) => Value::Tuple(strip_shapes(items)),
            Value::Array(items) => Value::Array(strip_shapes(items)),
            Value::NamedTuple(fields) => Value::NamedTuple(
                fields
                    .iter()
                    .map(|(name, value)| (name.clone(), value.strip_shapes()))
                    .collect(),
            ),
            scalar => scalar.clone(),
        }
    }

    /// Convert to JSON, dropping all bookkeeping.
    pub fn to_json(&self) -> Json {
        match self {
            Value::Str(s) => Json::String(s.clone()),
            Value::Int(i) => Json::Number((*i).into()),
            Value::Float(f) => Number::from_f64(*f).map(Json::Number).unwrap_or(Json::Null),
            Value::Bool(b) => Json::Bool(*b),
            Value::Uuid(u) => Json::String(u.to_string()),
            Value::Obj(o) => {
                let mut map = Map::new();
                match &o.shape {
                    Some(shape) => {
                        for (name, values) in shape {
                            map.insert(name.clone(), render(values));
                        }
                    }
                    None => {
                        map.insert("id".to_string(), Json::String(o.id.to_string()));
                    }
                }
                Json::Object(map)
            }
            Value::Tuple(items) | Value::Array(items) => {
                Json::Array(items.iter().map(Value::to_json).collect())
            }
            Value::NamedTuple(fields) => {
                let mut map = Map::new();
                for (name, value) in fields {
                    map.insert(name.clone(), value.to_json());
                }
                Json::Object(map)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::Obj;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use uuid::Uuid;

    #[test]
    fn test_render_unshaped_object() {
        let id = Uuid::from_u128(0x10);
        let rendered = Value::Obj(Obj::new(id)).to_json();
        assert_eq!(rendered, json!({ "id": id.to_string() }));
    }

    #[test]
    fn test_render_shaped_object() {
        let note = Obj::new(Uuid::from_u128(0x20))
            .with_shape(vec![("name".into(), vec!["boxing".into()])]);
        let person = Obj::new(Uuid::from_u128(0x10)).with_shape(vec![
            ("name".into(), vec!["Phil Emarg".into()]),
            ("notes".into(), vec![Value::Obj(note)]),
        ]);

        assert_eq!(
            render(&[Value::Obj(person)]),
            json!([{ "name": ["Phil Emarg"], "notes": [{ "name": ["boxing"] }] }])
        );
    }

    #[test]
    fn test_render_composites() {
        let value = Value::Tuple(vec![
            Value::Int(1),
            Value::NamedTuple(vec![("a".into(), Value::Float(1.5))]),
            Value::Array(vec![Value::Bool(true)]),
        ]);
        assert_eq!(value.to_json(), json!([1, { "a": 1.5 }, [true]]));
    }

    #[test]
    fn test_strip_shapes_recurses() {
        let shaped = Value::Obj(
            Obj::new(Uuid::from_u128(1))
                .with_shape(vec![])
                .with_data("@count", vec![Value::Int(3)]),
        );
        let stripped = strip_shapes(&[Value::Tuple(vec![shaped])]);

        let Value::Tuple(items) = &stripped[0] else {
            panic!("expected tuple");
        };
        let obj = items[0].as_obj().unwrap();
        assert!(obj.shape.is_none());
        assert_eq!(obj.field("@count"), Some(&vec![Value::Int(3)]));
    }
}
