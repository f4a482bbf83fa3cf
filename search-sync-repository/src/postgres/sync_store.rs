//! PostgreSQL implementation of the sync store.
//!
//! Reads entities with their metrics and tags, and keeps the sync bookkeeping
//! in two shared tables:
//!
//! - `SearchIndexUpdateQueue`: dirty queue (`action = 'Update'`) and
//!   pending-deletion ledger (`action = 'Delete'`), keyed by logical index name
//! - `KeyValue`: watermarks as epoch milliseconds under `<index>_lastUpdate`

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use search_sync_shared::{
    DirtyQueueEntry, EntityType, IndexableEntity, MetricsRow, PendingDeletionEntry,
    SyncWatermark, TagRow,
};
use serde_json::Value;
use sqlx::{postgres::PgPoolOptions, PgPool, Row};
use tracing::{debug, instrument};

use crate::errors::StoreError;
use crate::interfaces::SyncStore;
use crate::postgres::sources::EntitySource;
use crate::types::FetchFilter;

const UPDATE_ACTION: &str = "Update";
const DELETE_ACTION: &str = "Delete";

/// PostgreSQL-backed sync store.
pub struct PostgresSyncStore {
    pool: PgPool,
}

impl PostgresSyncStore {
    /// Creates a store over an existing pool.
    ///
    /// # Arguments
    ///
    /// * `pool` - Connection pool on a database holding the entity and bookkeeping tables
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Opens a pool and creates a store over it.
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;
        Ok(Self::new(pool))
    }

    /// Loads metrics and tag rows for a page of entities and attaches them.
    async fn attach_nested_rows(
        &self,
        source: &EntitySource,
        entities: &mut [IndexableEntity],
    ) -> Result<(), StoreError> {
        let ids: Vec<i64> = entities.iter().map(|entity| entity.id).collect();
        let positions: HashMap<i64, usize> = ids
            .iter()
            .enumerate()
            .map(|(position, id)| (*id, position))
            .collect();

        let metrics = sqlx::query(&source.metrics_sql())
            .bind(&ids)
            .fetch_all(&self.pool)
            .await?;
        for row in metrics {
            let entity_id: i64 = row.try_get("entity_id")?;
            let timeframe: String = row.try_get("timeframe")?;
            let values = match row.try_get::<Value, _>("values")? {
                Value::Object(values) => values,
                other => {
                    return Err(StoreError::decode(format!(
                        "metrics of entity {} are not an object: {}",
                        entity_id, other
                    )))
                }
            };
            if let Some(position) = positions.get(&entity_id) {
                entities[*position]
                    .metrics
                    .push(MetricsRow::new(timeframe, values));
            }
        }

        let tags = sqlx::query(&source.tags_sql())
            .bind(&ids)
            .fetch_all(&self.pool)
            .await?;
        for row in tags {
            let entity_id: i64 = row.try_get("entity_id")?;
            let tag = TagRow {
                tag_id: row.try_get("tag_id")?,
                name: row.try_get("name")?,
            };
            if let Some(position) = positions.get(&entity_id) {
                entities[*position].tags.push(tag);
            }
        }

        Ok(())
    }
}

#[async_trait]
impl SyncStore for PostgresSyncStore {
    /// Database clock truncated to milliseconds, minus one millisecond.
    ///
    /// Entity and queue timestamps are stored as `TIMESTAMP(3)` and rounded to
    /// the nearest millisecond, so a row written just after the snapshot can be
    /// stored with the snapshot's own millisecond. Stepping back one millisecond
    /// keeps such rows strictly after the watermark and outside the snapshot.
    async fn now(&self) -> Result<DateTime<Utc>, StoreError> {
        let row = sqlx::query(
            "SELECT date_trunc('milliseconds', now()) - interval '1 millisecond' AS now",
        )
        .fetch_one(&self.pool)
        .await?;
        Ok(row.try_get("now")?)
    }

    #[instrument(skip(self, filter), fields(entity_type = %entity_type))]
    async fn fetch_entities(
        &self,
        entity_type: EntityType,
        filter: &FetchFilter,
        offset: i64,
        limit: i64,
    ) -> Result<Vec<IndexableEntity>, StoreError> {
        let source = EntitySource::of(entity_type);
        let rows = source
            .page_query(filter, offset, limit)
            .build()
            .fetch_all(&self.pool)
            .await?;

        let mut entities = Vec::with_capacity(rows.len());
        for row in rows {
            let id: i64 = row.try_get("id")?;
            let columns = match row.try_get::<Value, _>("columns")? {
                Value::Object(columns) => columns,
                other => {
                    return Err(StoreError::decode(format!(
                        "row {} of {} is not an object: {}",
                        id, source.table, other
                    )))
                }
            };
            let mut entity =
                IndexableEntity::new(id, row.try_get("created_at")?, row.try_get("updated_at")?);
            entity.columns = columns;
            entities.push(entity);
        }

        if !entities.is_empty() {
            self.attach_nested_rows(source, &mut entities).await?;
        }

        debug!(offset, count = entities.len(), "Fetched entity page");
        Ok(entities)
    }

    async fn dirty_queue(
        &self,
        entity_type: EntityType,
        up_to: DateTime<Utc>,
    ) -> Result<Vec<DirtyQueueEntry>, StoreError> {
        let rows = sqlx::query(
            r#"SELECT id::bigint AS id, ("createdAt" AT TIME ZONE 'UTC') AS enqueued_at
            FROM "SearchIndexUpdateQueue"
            WHERE type = $1 AND action = $2 AND "createdAt" <= $3
            ORDER BY "createdAt""#,
        )
        .bind(entity_type.index_name())
        .bind(UPDATE_ACTION)
        .bind(up_to.naive_utc())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|row| {
                Ok(DirtyQueueEntry {
                    id: row.try_get("id")?,
                    entity_type,
                    enqueued_at: row.try_get("enqueued_at")?,
                })
            })
            .collect()
    }

    async fn remove_dirty_entries(
        &self,
        entity_type: EntityType,
        ids: &[i64],
        up_to: DateTime<Utc>,
    ) -> Result<u64, StoreError> {
        if ids.is_empty() {
            return Ok(0);
        }

        let result = sqlx::query(
            r#"DELETE FROM "SearchIndexUpdateQueue"
            WHERE type = $1 AND action = $2 AND id = ANY($3) AND "createdAt" <= $4"#,
        )
        .bind(entity_type.index_name())
        .bind(UPDATE_ACTION)
        .bind(ids)
        .bind(up_to.naive_utc())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    async fn pending_deletions(
        &self,
        entity_type: EntityType,
    ) -> Result<Vec<PendingDeletionEntry>, StoreError> {
        let rows = sqlx::query(
            r#"SELECT id::bigint AS id FROM "SearchIndexUpdateQueue"
            WHERE type = $1 AND action = $2"#,
        )
        .bind(entity_type.index_name())
        .bind(DELETE_ACTION)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|row| {
                Ok(PendingDeletionEntry {
                    id: row.try_get("id")?,
                    entity_type,
                })
            })
            .collect()
    }

    async fn remove_pending_deletions(
        &self,
        entity_type: EntityType,
        ids: &[i64],
    ) -> Result<u64, StoreError> {
        if ids.is_empty() {
            return Ok(0);
        }

        let result = sqlx::query(
            r#"DELETE FROM "SearchIndexUpdateQueue"
            WHERE type = $1 AND action = $2 AND id = ANY($3)"#,
        )
        .bind(entity_type.index_name())
        .bind(DELETE_ACTION)
        .bind(ids)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    async fn get_watermark(
        &self,
        entity_type: EntityType,
    ) -> Result<Option<SyncWatermark>, StoreError> {
        let key = SyncWatermark::storage_key(entity_type);
        let row = sqlx::query(r#"SELECT (value #>> '{}')::bigint AS millis FROM "KeyValue" WHERE key = $1"#)
            .bind(&key)
            .fetch_optional(&self.pool)
            .await?;

        let Some(row) = row else {
            return Ok(None);
        };
        let millis: i64 = row.try_get("millis")?;
        let last_updated_at = DateTime::from_timestamp_millis(millis)
            .ok_or_else(|| StoreError::decode(format!("{} out of range: {}", key, millis)))?;

        Ok(Some(SyncWatermark {
            entity_type,
            last_updated_at,
        }))
    }

    async fn set_watermark(&self, watermark: &SyncWatermark) -> Result<(), StoreError> {
        sqlx::query(
            r#"INSERT INTO "KeyValue" (key, value) VALUES ($1, to_jsonb($2::bigint))
            ON CONFLICT (key) DO UPDATE
            SET value = to_jsonb(GREATEST(("KeyValue".value #>> '{}')::bigint, $2::bigint))"#,
        )
        .bind(SyncWatermark::storage_key(watermark.entity_type))
        .bind(watermark.last_updated_at.timestamp_millis())
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
