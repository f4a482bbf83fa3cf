//! Queue drain.
//!
//! Takes a snapshot of the dirty queue at the pass's snapshot point, folds the
//! deduplicated ids into the incremental fetch filter, and deletes exactly the
//! snapshotted rows once the pass has committed. Rows enqueued after the
//! snapshot point are left for the next pass.

use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, instrument};

use search_sync_repository::{FetchFilter, StoreError, SyncStore};
use search_sync_shared::EntityType;

/// Deduplicated dirty ids enqueued at or before `taken_at`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirtySnapshot {
    pub entity_type: EntityType,
    pub taken_at: DateTime<Utc>,
    pub ids: BTreeSet<i64>,
    /// Number of queue rows behind `ids`, duplicates included.
    pub rows: usize,
}

#[derive(Clone)]
pub struct QueueDrain {
    store: Arc<dyn SyncStore>,
}

impl QueueDrain {
    pub fn new(store: Arc<dyn SyncStore>) -> Self {
        Self { store }
    }

    /// Read the dirty queue up to `taken_at` and deduplicate it.
    #[instrument(skip(self), fields(entity_type = %entity_type))]
    pub async fn snapshot(
        &self,
        entity_type: EntityType,
        taken_at: DateTime<Utc>,
    ) -> Result<DirtySnapshot, StoreError> {
        let entries = self.store.dirty_queue(entity_type, taken_at).await?;
        let rows = entries.len();
        let ids: BTreeSet<i64> = entries.into_iter().map(|entry| entry.id).collect();

        debug!(rows, distinct = ids.len(), "Took dirty queue snapshot");
        Ok(DirtySnapshot {
            entity_type,
            taken_at,
            ids,
            rows,
        })
    }

    /// Candidate filter for a pass: a full scan without a watermark,
    /// otherwise rows changed after it plus the snapshotted ids.
    pub fn filter(&self, snapshot: &DirtySnapshot, watermark: Option<DateTime<Utc>>) -> FetchFilter {
        match watermark {
            None => FetchFilter::full_scan(),
            Some(since) => FetchFilter::incremental(since, snapshot.ids.clone()),
        }
    }

    /// Delete the snapshotted rows. Returns the number of rows removed.
    pub async fn consume(&self, snapshot: &DirtySnapshot) -> Result<u64, StoreError> {
        if snapshot.ids.is_empty() {
            return Ok(0);
        }
        let ids: Vec<i64> = snapshot.ids.iter().copied().collect();
        self.store
            .remove_dirty_entries(snapshot.entity_type, &ids, snapshot.taken_at)
            .await
    }
}
