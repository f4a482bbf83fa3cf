//! Relational rows as read from the store, before flattening.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Timeframe label of the metrics row that is mirrored into the index.
pub const ALL_TIME_TIMEFRAME: &str = "AllTime";

/// One metrics row of an entity, for a single timeframe.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsRow {
    pub timeframe: String,
    /// Metric name to value, e.g. `downloadCount -> 42`.
    pub values: Map<String, Value>,
}

impl MetricsRow {
    pub fn new(timeframe: impl Into<String>, values: Map<String, Value>) -> Self {
        Self {
            timeframe: timeframe.into(),
            values,
        }
    }

    pub fn is_all_time(&self) -> bool {
        self.timeframe == ALL_TIME_TIMEFRAME
    }
}

/// A tag associated with an entity through a many-to-many table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagRow {
    pub tag_id: i64,
    /// Display value of the tag.
    pub name: String,
}

/// A relational row group for one entity: the base row plus its nested
/// metrics and tag associations.
///
/// Owned by the relational store and read-only to the sync engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexableEntity {
    pub id: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Every column of the base row, keyed by column name.
    pub columns: Map<String, Value>,
    pub metrics: Vec<MetricsRow>,
    pub tags: Vec<TagRow>,
}

impl IndexableEntity {
    /// Create an entity with no columns, metrics or tags.
    pub fn new(id: i64, created_at: DateTime<Utc>, updated_at: DateTime<Utc>) -> Self {
        Self {
            id,
            created_at,
            updated_at,
            columns: Map::new(),
            metrics: Vec::new(),
            tags: Vec::new(),
        }
    }

    /// Builder-style column setter, mostly useful for fixtures.
    pub fn with_column(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.columns.insert(name.into(), value.into());
        self
    }

    pub fn with_metrics(mut self, row: MetricsRow) -> Self {
        self.metrics.push(row);
        self
    }

    pub fn with_tag(mut self, tag_id: i64, name: impl Into<String>) -> Self {
        self.tags.push(TagRow {
            tag_id,
            name: name.into(),
        });
        self
    }

    /// The `AllTime` metrics row, if the entity has one.
    pub fn all_time_metrics(&self) -> Option<&MetricsRow> {
        self.metrics.iter().find(|row| row.is_all_time())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_all_time_metrics_lookup() {
        let now = Utc::now();
        let mut week = Map::new();
        week.insert("downloadCount".to_string(), json!(3));
        let mut all_time = Map::new();
        all_time.insert("downloadCount".to_string(), json!(120));

        let entity = IndexableEntity::new(1, now, now)
            .with_metrics(MetricsRow::new("Week", week))
            .with_metrics(MetricsRow::new(ALL_TIME_TIMEFRAME, all_time));

        let row = entity.all_time_metrics().unwrap();
        assert_eq!(row.values["downloadCount"], json!(120));
    }

    #[test]
    fn test_missing_all_time_metrics() {
        let now = Utc::now();
        let entity = IndexableEntity::new(1, now, now).with_metrics(MetricsRow::new("Day", Map::new()));
        assert!(entity.all_time_metrics().is_none());
    }
}
