//! Document types for the search index.
//!
//! This module defines the flat document structure that is stored in the
//! search engine.

use serde::ser::Serializer;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// Flat document representation for the search index.
///
/// A document is an ordered mapping of field name to scalar or array value,
/// keyed by the source entity's `id`. It has no identity of its own: the same
/// entity always produces a document with the same id, which is what makes
/// resubmission idempotent.
///
/// Serializes as a plain JSON object containing the `id` field, which is the
/// shape the index service expects.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexDocument {
    id: i64,
    fields: Map<String, Value>,
}

impl IndexDocument {
    /// The field holding the document id.
    pub const ID_FIELD: &'static str = "id";

    /// Create a document holding only its id.
    ///
    /// # Example
    ///
    /// ```
    /// use search_sync_shared::IndexDocument;
    /// use serde_json::json;
    ///
    /// let mut doc = IndexDocument::new(42);
    /// doc.insert("title", json!("Hello"));
    /// assert_eq!(doc.id(), 42);
    /// assert_eq!(doc.get("title"), Some(&json!("Hello")));
    /// ```
    pub fn new(id: i64) -> Self {
        let mut fields = Map::new();
        fields.insert(Self::ID_FIELD.to_string(), Value::from(id));
        Self { id, fields }
    }

    pub fn id(&self) -> i64 {
        self.id
    }

    /// Set a field. The id field cannot be overwritten.
    pub fn insert(&mut self, name: impl Into<String>, value: Value) {
        let name = name.into();
        if name == Self::ID_FIELD {
            return;
        }
        self.fields.insert(name, value);
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    /// Field names in insertion order, starting with `id`.
    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }

    /// Build a document from a JSON object, as returned by the index service.
    ///
    /// Returns `None` when the object has no integer `id` field.
    pub fn from_map(fields: Map<String, Value>) -> Option<Self> {
        let id = fields.get(Self::ID_FIELD)?.as_i64()?;
        Some(Self { id, fields })
    }
}

impl Serialize for IndexDocument {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.fields.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for IndexDocument {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let fields = Map::<String, Value>::deserialize(deserializer)?;
        Self::from_map(fields)
            .ok_or_else(|| serde::de::Error::custom("document is missing an integer `id` field"))
    }
}
