//! Relational store trait definition.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use search_sync_shared::{
    DirtyQueueEntry, EntityType, IndexableEntity, PendingDeletionEntry, SyncWatermark,
};

use crate::errors::StoreError;
use crate::types::FetchFilter;

/// Trait for reading entities and sync bookkeeping from the relational store.
///
/// The dirty queue and the pending-deletion ledger are written by upstream
/// mutation hooks; the sync engine is their only reader and deleter. Both, as
/// well as the watermark, are keyed by the entity type's logical index name.
#[async_trait]
pub trait SyncStore: Send + Sync {
    /// Current time according to the store's clock.
    ///
    /// Used as the snapshot point of a pass so that watermarks and queue
    /// timestamps are compared on the same clock.
    async fn now(&self) -> Result<DateTime<Utc>, StoreError>;

    /// Read one page of eligible entities matching `filter`, ordered by id.
    ///
    /// Inclusion predicates (published, not policy-violating) are always
    /// applied. An empty page means the scan is exhausted.
    async fn fetch_entities(
        &self,
        entity_type: EntityType,
        filter: &FetchFilter,
        offset: i64,
        limit: i64,
    ) -> Result<Vec<IndexableEntity>, StoreError>;

    /// Dirty-queue rows enqueued at or before `up_to`. May contain duplicate ids.
    async fn dirty_queue(
        &self,
        entity_type: EntityType,
        up_to: DateTime<Utc>,
    ) -> Result<Vec<DirtyQueueEntry>, StoreError>;

    /// Delete dirty-queue rows for `ids` enqueued at or before `up_to`.
    ///
    /// Returns the number of rows removed.
    async fn remove_dirty_entries(
        &self,
        entity_type: EntityType,
        ids: &[i64],
        up_to: DateTime<Utc>,
    ) -> Result<u64, StoreError>;

    /// Pending-deletion ledger rows. May contain duplicate ids.
    async fn pending_deletions(
        &self,
        entity_type: EntityType,
    ) -> Result<Vec<PendingDeletionEntry>, StoreError>;

    /// Delete ledger rows for `ids`. Returns the number of rows removed.
    async fn remove_pending_deletions(
        &self,
        entity_type: EntityType,
        ids: &[i64],
    ) -> Result<u64, StoreError>;

    /// The stored watermark, `None` if the entity type was never synced.
    async fn get_watermark(
        &self,
        entity_type: EntityType,
    ) -> Result<Option<SyncWatermark>, StoreError>;

    /// Persist a watermark. A value older than the stored one is ignored, so
    /// the watermark never moves backwards.
    async fn set_watermark(&self, watermark: &SyncWatermark) -> Result<(), StoreError>;
}
