//! In-memory graph store.
//!
//! The store is a fully materialized, read-only graph: records keyed by
//! identifier, each a flat map of field name to multiset. Link fields hold
//! object references that may carry `@`-prefixed link properties.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::Path;

use serde_json::Value as Json;
use tracing::debug;

use crate::error::Error;
use pathql_proto::{Multiset, Obj, ObjectId, Value};

/// Type of the object a subject-less shape is evaluated against.
pub const VIRTUAL_OBJECT: &str = "VirtualObject";

/// A stored object.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    /// Object identifier.
    pub id: ObjectId,
    /// Name of the type extent this object belongs to.
    pub type_name: String,
    fields: BTreeMap<String, Multiset>,
}

impl Record {
    /// Create a new record. The identifier is readable as the `id` field.
    pub fn new(id: ObjectId, type_name: impl Into<String>) -> Self {
        let mut fields = BTreeMap::new();
        fields.insert("id".to_string(), vec![Value::Uuid(id)]);
        Self {
            id,
            type_name: type_name.into(),
            fields,
        }
    }

    /// Add a multi-valued field.
    pub fn with_field(mut self, name: impl Into<String>, values: Multiset) -> Self {
        self.fields.insert(name.into(), values);
        self
    }

    /// Add a single-valued field.
    pub fn with_value(self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.with_field(name, vec![value.into()])
    }

    /// Get a field's values; `None` if the field is absent.
    pub fn field(&self, name: &str) -> Option<&Multiset> {
        self.fields.get(name)
    }

    /// Iterate over all fields.
    pub fn fields(&self) -> impl Iterator<Item = (&str, &Multiset)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }
}

/// Read-only object graph.
#[derive(Debug, Clone)]
pub struct Store {
    records: Vec<Record>,
    index: HashMap<ObjectId, usize>,
    extents: BTreeSet<String>,
}

impl Default for Store {
    fn default() -> Self {
        Self::new()
    }
}

impl Store {
    /// Create an empty store. The `VirtualObject` extent is always known.
    pub fn new() -> Self {
        let mut extents = BTreeSet::new();
        extents.insert(VIRTUAL_OBJECT.to_string());
        Self {
            records: Vec::new(),
            index: HashMap::new(),
            extents,
        }
    }

    /// Add a record. Identifiers must be unique.
    pub fn insert(&mut self, record: Record) -> Result<(), Error> {
        if self.index.contains_key(&record.id) {
            return Err(Error::Fixture(format!("duplicate object id {}", record.id)));
        }
        self.extents.insert(record.type_name.clone());
        self.index.insert(record.id, self.records.len());
        self.records.push(record);
        Ok(())
    }

    /// Builder-style [`Store::insert`].
    pub fn with_record(mut self, record: Record) -> Result<Self, Error> {
        self.insert(record)?;
        Ok(self)
    }

    /// Declare a type extent that may have no objects.
    pub fn declare_type(&mut self, name: impl Into<String>) {
        self.extents.insert(name.into());
    }

    /// Look up a record.
    pub fn get(&self, id: ObjectId) -> Option<&Record> {
        self.index.get(&id).map(|&i| &self.records[i])
    }

    /// Check whether an object exists.
    pub fn contains(&self, id: ObjectId) -> bool {
        self.index.contains_key(&id)
    }

    /// All records in insertion order.
    pub fn records(&self) -> impl Iterator<Item = &Record> {
        self.records.iter()
    }

    /// Whether `name` is a known type extent.
    pub fn has_extent(&self, name: &str) -> bool {
        self.extents.contains(name)
    }

    /// All objects of a type, in insertion order.
    pub fn extent<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Record> + 'a {
        self.records.iter().filter(move |r| r.type_name == name)
    }

    /// Known type names, sorted.
    pub fn type_names(&self) -> impl Iterator<Item = &str> {
        self.extents.iter().map(String::as_str)
    }

    /// Number of records.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the store has no records.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Load a store from a JSON fixture.
    ///
    /// The fixture is an array of objects. Each object has an `id`, a type tag
    /// (`__type__`, or `typ` whose `module::` prefix is dropped) and fields.
    /// `null` is an empty field, arrays are multi-valued fields, and nested
    /// objects with an `id` are links whose `@`-prefixed keys are link
    /// properties.
    pub fn from_json(source: &str) -> Result<Self, Error> {
        let value: Json = serde_json::from_str(source)?;
        Self::from_value(&value)
    }

    /// Load a store from an already-parsed JSON fixture.
    pub fn from_value(value: &Json) -> Result<Self, Error> {
        let items = value
            .as_array()
            .ok_or_else(|| Error::Fixture("fixture must be a JSON array".into()))?;

        let mut store = Store::new();
        for item in items {
            store.insert(load_record(item)?)?;
        }
        debug!(
            records = store.len(),
            types = store.extents.len(),
            "loaded store"
        );
        Ok(store)
    }

    /// Load a store from a JSON fixture file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, Error> {
        let source = std::fs::read_to_string(path)?;
        Self::from_json(&source)
    }
}

fn load_record(item: &Json) -> Result<Record, Error> {
    let map = item
        .as_object()
        .ok_or_else(|| Error::Fixture(format!("expected object, got {}", item)))?;

    let id = map
        .get("id")
        .ok_or_else(|| Error::Fixture("object without id".into()))
        .and_then(parse_id)?;

    let type_name = map
        .get("__type__")
        .or_else(|| map.get("typ"))
        .and_then(Json::as_str)
        .ok_or_else(|| Error::Fixture(format!("object {} has no type tag", id)))?;
    let type_name = type_name.rsplit("::").next().unwrap_or(type_name);

    let mut record = Record::new(id, type_name);
    for (name, value) in map {
        if matches!(name.as_str(), "id" | "__type__" | "typ") {
            continue;
        }
        record = record.with_field(name.clone(), load_field(value)?);
    }
    Ok(record)
}

fn load_field(value: &Json) -> Result<Multiset, Error> {
    match value {
        Json::Null => Ok(Vec::new()),
        Json::Array(items) => items.iter().map(load_value).collect(),
        other => Ok(vec![load_value(other)?]),
    }
}

fn load_value(value: &Json) -> Result<Value, Error> {
    match value {
        Json::String(s) => Ok(Value::Str(s.clone())),
        Json::Bool(b) => Ok(Value::Bool(*b)),
        Json::Number(n) => match n.as_i64() {
            Some(i) => Ok(Value::Int(i)),
            None => n
                .as_f64()
                .map(Value::Float)
                .ok_or_else(|| Error::Fixture(format!("unsupported number {}", n))),
        },
        Json::Array(items) => Ok(Value::Array(
            items.iter().map(load_value).collect::<Result<_, _>>()?,
        )),
        Json::Object(map) => {
            let id = map
                .get("id")
                .ok_or_else(|| Error::Fixture("link without id".into()))
                .and_then(parse_id)?;
            let mut link = Obj::new(id);
            for (name, value) in map.iter().filter(|(k, _)| k.starts_with('@')) {
                link = link.with_data(name.clone(), load_field(value)?);
            }
            Ok(Value::Obj(link))
        }
        Json::Null => Err(Error::Fixture("null inside a list".into())),
    }
}

fn parse_id(value: &Json) -> Result<ObjectId, Error> {
    value
        .as_str()
        .and_then(|s| ObjectId::parse_str(s).ok())
        .ok_or_else(|| Error::Fixture(format!("invalid object id {}", value)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const FIXTURE: &str = r#"[
        {"id": "00000000-0000-0000-0000-000000000001", "typ": "test::User",
         "name": "Alice",
         "deck": [{"id": "00000000-0000-0000-0000-000000000002", "@count": 2}],
         "avatar": null},
        {"id": "00000000-0000-0000-0000-000000000002", "__type__": "Card",
         "name": "Imp", "cost": 1, "weight": 1.5, "tags": ["a", "b"]}
    ]"#;

    fn id(n: u128) -> ObjectId {
        ObjectId::from_u128(n)
    }

    #[test]
    fn test_from_json() {
        let store = Store::from_json(FIXTURE).unwrap();
        assert_eq!(store.len(), 2);

        let alice = store.get(id(1)).unwrap();
        assert_eq!(alice.type_name, "User");
        assert_eq!(alice.field("name"), Some(&vec![Value::Str("Alice".into())]));
        assert_eq!(alice.field("avatar"), Some(&vec![]));
        assert_eq!(alice.field("id"), Some(&vec![Value::Uuid(id(1))]));

        let deck = alice.field("deck").unwrap();
        let link = deck[0].as_obj().unwrap();
        assert_eq!(link.id, id(2));
        assert_eq!(link.field("@count"), Some(&vec![Value::Int(2)]));

        let imp = store.get(id(2)).unwrap();
        assert_eq!(imp.field("weight"), Some(&vec![Value::Float(1.5)]));
        assert_eq!(imp.field("tags").map(Vec::len), Some(2));
    }

    #[test]
    fn test_extents() {
        let store = Store::from_json(FIXTURE).unwrap();
        assert!(store.has_extent("User"));
        assert!(store.has_extent("Card"));
        assert!(store.has_extent(VIRTUAL_OBJECT));
        assert!(!store.has_extent("test::User"));
        assert_eq!(store.extent("Card").count(), 1);
    }

    #[test]
    fn test_duplicate_ids_rejected() {
        let store = Store::new()
            .with_record(Record::new(id(1), "A"))
            .unwrap();
        let err = store.with_record(Record::new(id(1), "B")).unwrap_err();
        assert!(matches!(err, Error::Fixture(_)));
    }

    #[test]
    fn test_missing_type_tag() {
        let err = Store::from_json(r#"[{"id": "00000000-0000-0000-0000-000000000001"}]"#)
            .unwrap_err();
        assert!(matches!(err, Error::Fixture(_)));
    }

    #[test]
    fn test_from_path() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(FIXTURE.as_bytes()).unwrap();

        let store = Store::from_path(file.path()).unwrap();
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_from_path_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = Store::from_path(dir.path().join("missing.json")).unwrap_err();
        assert!(matches!(err, Error::Io(_)));
    }
}
