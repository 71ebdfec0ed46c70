//! Object references.

use std::collections::BTreeMap;

use crate::value::{Multiset, ObjectId};

/// A reference to an object in the graph store.
///
/// Identity is the identifier alone. `shape` is the projection assigned by
/// the nearest enclosing shape and only matters for output; `data` carries
/// ad-hoc fields merged onto this reference, such as `@`-prefixed link
/// properties of the edge it was reached through, or computed shape fields.
#[derive(Debug, Clone)]
pub struct Obj {
    /// Object identifier.
    pub id: ObjectId,
    /// Selected fields, in shape order. `None` renders as `{"id": ...}`.
    pub shape: Option<Vec<(String, Multiset)>>,
    /// Fields attached to this particular reference.
    pub data: BTreeMap<String, Multiset>,
}

impl Obj {
    /// Create a bare reference.
    pub fn new(id: ObjectId) -> Self {
        Self {
            id,
            shape: None,
            data: BTreeMap::new(),
        }
    }

    /// Attach a data field.
    pub fn with_data(mut self, name: impl Into<String>, values: Multiset) -> Self {
        self.data.insert(name.into(), values);
        self
    }

    /// Set the shape.
    pub fn with_shape(mut self, shape: Vec<(String, Multiset)>) -> Self {
        self.shape = Some(shape);
        self
    }

    /// Look up a field carried on this reference.
    pub fn field(&self, name: &str) -> Option<&Multiset> {
        self.data.get(name)
    }

    /// Link properties (`@`-prefixed data fields) carried on this reference.
    pub fn link_properties(&self) -> BTreeMap<String, Multiset> {
        self.data
            .iter()
            .filter(|(name, _)| name.starts_with('@'))
            .map(|(name, values)| (name.clone(), values.clone()))
            .collect()
    }

    /// Drop the shape, keeping identity and data.
    pub fn stripped(&self) -> Self {
        Self {
            id: self.id,
            shape: None,
            data: self.data.clone(),
        }
    }
}

impl PartialEq for Obj {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Obj {}
