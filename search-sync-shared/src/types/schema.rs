//! Document schemas and index attribute settings.
//!
//! Every entity type declares an ordered list of fields with their source in
//! the relational row and their declared type. Documents are validated against
//! this schema when they are built, so shape drift is caught before anything
//! reaches the index service.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Declared type of a document field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FieldType {
    Integer,
    Float,
    Text,
    Boolean,
    /// Stored as epoch milliseconds so it stays sortable in the index.
    Timestamp,
    TextList,
}

impl FieldType {
    /// Whether a (non-null) JSON value conforms to this type.
    pub fn accepts(&self, value: &Value) -> bool {
        match self {
            FieldType::Integer | FieldType::Timestamp => value.is_i64() || value.is_u64(),
            FieldType::Float => value.is_number(),
            FieldType::Text => value.is_string(),
            FieldType::Boolean => value.is_boolean(),
            FieldType::TextList => value
                .as_array()
                .map(|items| items.iter().all(Value::is_string))
                .unwrap_or(false),
        }
    }

    /// Value used for a metric field when the entity has no `AllTime` row.
    pub fn zero(&self) -> Value {
        match self {
            FieldType::Float => Value::from(0.0),
            FieldType::TextList => Value::Array(Vec::new()),
            FieldType::Text => Value::from(""),
            FieldType::Boolean => Value::Bool(false),
            FieldType::Integer | FieldType::Timestamp => Value::from(0),
        }
    }
}

/// Where a document field is read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldSource {
    /// The entity's primary key.
    Id,
    /// A column of the base row.
    Column(&'static str),
    /// A value of the `AllTime` metrics row.
    Metric(&'static str),
    /// Display names of the tag associations.
    Tags,
    CreatedAt,
    UpdatedAt,
}

/// One field of a document schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpec {
    pub name: &'static str,
    pub source: FieldSource,
    pub field_type: FieldType,
    pub nullable: bool,
}

impl FieldSpec {
    pub const fn required(name: &'static str, source: FieldSource, field_type: FieldType) -> Self {
        Self {
            name,
            source,
            field_type,
            nullable: false,
        }
    }

    pub const fn nullable(name: &'static str, source: FieldSource, field_type: FieldType) -> Self {
        Self {
            name,
            source,
            field_type,
            nullable: true,
        }
    }
}

/// Ordered field list of an entity type's documents.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DocumentSchema {
    pub fields: &'static [FieldSpec],
}

impl DocumentSchema {
    pub fn field(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|field| field.name == name)
    }

    pub fn field_names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.fields.iter().map(|field| field.name)
    }
}

/// Searchable, sortable and filterable attribute lists of an index.
///
/// Serializes with the index service's attribute names. Searchable attributes
/// are ranked in list order, so that list is compared as written. Sortable and
/// filterable lists are compared through [`IndexSettings::normalized`], since
/// the service hands them back sorted.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct IndexSettings {
    #[serde(rename = "searchableAttributes", default)]
    pub searchable: Vec<String>,
    #[serde(rename = "sortableAttributes", default)]
    pub sortable: Vec<String>,
    #[serde(rename = "filterableAttributes", default)]
    pub filterable: Vec<String>,
}

impl IndexSettings {
    pub fn new(searchable: &[&str], sortable: &[&str], filterable: &[&str]) -> Self {
        let owned = |list: &[&str]| list.iter().map(|s| s.to_string()).collect();
        Self {
            searchable: owned(searchable),
            sortable: owned(sortable),
            filterable: owned(filterable),
        }
    }

    /// Copy with the sortable and filterable lists sorted and deduplicated.
    pub fn normalized(&self) -> Self {
        let sorted = |list: &[String]| {
            let mut list = list.to_vec();
            list.sort();
            list.dedup();
            list
        };
        Self {
            searchable: self.searchable.clone(),
            sortable: sorted(&self.sortable),
            filterable: sorted(&self.filterable),
        }
    }

    /// Whether two settings hold the same attributes, ignoring the order of the
    /// sortable and filterable lists.
    pub fn same_attributes(&self, other: &IndexSettings) -> bool {
        self.normalized() == other.normalized()
    }
}
