//! Record transformer.
//!
//! Flattens relational row groups into index documents following the entity
//! type's schema: the `AllTime` metrics row is folded into top-level fields,
//! tag associations become a list of names, and every column the schema does
//! not name is dropped. Each produced value is checked against its declared
//! type so shape drift surfaces here rather than as a rejected batch.

use chrono::{DateTime, NaiveDateTime};
use serde_json::Value;
use tracing::{debug, instrument};

use crate::errors::TransformError;
use search_sync_shared::{
    EntityDefinition, FieldSource, FieldSpec, FieldType, IndexDocument, IndexableEntity,
};

/// Layout of timestamp columns as rendered by `to_jsonb` on a column without
/// time zone.
const NAIVE_TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.f";

/// Transforms entities of one type into documents.
#[derive(Debug, Clone, Copy)]
pub struct RecordTransformer {
    definition: &'static EntityDefinition,
}

impl RecordTransformer {
    pub fn new(definition: &'static EntityDefinition) -> Self {
        Self { definition }
    }

    /// Transform one page of entities.
    ///
    /// Fails on the first entity that does not fit the schema; no partial
    /// page is returned.
    #[instrument(skip(self, entities), fields(entity_type = %self.definition.entity_type, entity_count = entities.len()))]
    pub fn transform_batch(
        &self,
        entities: &[IndexableEntity],
    ) -> Result<Vec<IndexDocument>, TransformError> {
        let documents = entities
            .iter()
            .map(|entity| self.transform(entity))
            .collect::<Result<Vec<_>, _>>()?;

        debug!(document_count = documents.len(), "Transformed entity page");
        Ok(documents)
    }

    /// Transform a single entity.
    ///
    /// Fields are emitted in schema order. Nullable fields may be `null`;
    /// every other value must match its declared type.
    pub fn transform(&self, entity: &IndexableEntity) -> Result<IndexDocument, TransformError> {
        let mut document = IndexDocument::new(entity.id);

        for field in self.definition.schema.fields {
            let value = self.extract(field, entity)?;
            validate(field, entity.id, &value)?;
            document.insert(field.name, value);
        }

        Ok(document)
    }

    fn extract(&self, field: &FieldSpec, entity: &IndexableEntity) -> Result<Value, TransformError> {
        let value = match field.source {
            FieldSource::Id => Value::from(entity.id),
            FieldSource::CreatedAt => Value::from(entity.created_at.timestamp_millis()),
            FieldSource::UpdatedAt => Value::from(entity.updated_at.timestamp_millis()),
            FieldSource::Tags => Value::Array(
                entity
                    .tags
                    .iter()
                    .map(|tag| Value::from(tag.name.clone()))
                    .collect(),
            ),
            FieldSource::Metric(name) => entity
                .all_time_metrics()
                .and_then(|row| row.values.get(name))
                .filter(|value| !value.is_null())
                .cloned()
                .unwrap_or_else(|| field.field_type.zero()),
            FieldSource::Column(name) => {
                let value = entity.columns.get(name).cloned().unwrap_or(Value::Null);
                match (field.field_type, value) {
                    (FieldType::Timestamp, Value::String(text)) => {
                        Value::from(parse_timestamp(&text).ok_or_else(|| {
                            TransformError::new(
                                entity.id,
                                field.name,
                                format!("has an unparseable timestamp {:?}", text),
                            )
                        })?)
                    }
                    (_, value) => value,
                }
            }
        };
        Ok(value)
    }
}

fn validate(field: &FieldSpec, entity_id: i64, value: &Value) -> Result<(), TransformError> {
    if value.is_null() {
        if field.nullable {
            return Ok(());
        }
        return Err(TransformError::new(entity_id, field.name, "is missing"));
    }
    if !field.field_type.accepts(value) {
        return Err(TransformError::new(
            entity_id,
            field.name,
            format!("expected {:?}, got {}", field.field_type, value),
        ));
    }
    Ok(())
}

/// Epoch milliseconds of an RFC 3339 timestamp, or of a zone-less one taken as UTC.
fn parse_timestamp(text: &str) -> Option<i64> {
    if let Ok(parsed) = DateTime::parse_from_rfc3339(text) {
        return Some(parsed.timestamp_millis());
    }
    NaiveDateTime::parse_from_str(text, NAIVE_TIMESTAMP_FORMAT)
        .ok()
        .map(|naive| naive.and_utc().timestamp_millis())
}
