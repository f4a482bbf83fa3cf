//! In-memory relational store.
//!
//! `MockSyncStore` holds entities per type, the dirty queue, the
//! pending-deletion ledger and the watermarks, on a manually driven clock.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use search_sync_shared::{
    DirtyQueueEntry, EntityType, IndexableEntity, PendingDeletionEntry, SyncWatermark,
};

use crate::errors::StoreError;
use crate::interfaces::SyncStore;
use crate::types::FetchFilter;

/// One recorded `fetch_entities` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchCall {
    pub entity_type: EntityType,
    pub filter: FetchFilter,
    pub offset: i64,
    pub limit: i64,
}

#[derive(Debug, Clone)]
struct StoredEntity {
    entity: IndexableEntity,
    /// Whether the row passes the inclusion predicates.
    eligible: bool,
}

#[derive(Debug)]
struct State {
    clock: DateTime<Utc>,
    entities: HashMap<EntityType, BTreeMap<i64, StoredEntity>>,
    dirty: Vec<DirtyQueueEntry>,
    deletions: Vec<PendingDeletionEntry>,
    watermarks: HashMap<EntityType, DateTime<Utc>>,
    fetches: Vec<FetchCall>,
    fail_fetch_at_offset: Option<i64>,
}

/// In-memory sync store on a manual clock.
#[derive(Debug)]
pub struct MockSyncStore {
    state: Mutex<State>,
}

impl MockSyncStore {
    /// Create an empty store whose clock reads `clock`.
    pub fn new(clock: DateTime<Utc>) -> Self {
        Self {
            state: Mutex::new(State {
                clock,
                entities: HashMap::new(),
                dirty: Vec::new(),
                deletions: Vec::new(),
                watermarks: HashMap::new(),
                fetches: Vec::new(),
                fail_fetch_at_offset: None,
            }),
        }
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn clock(&self) -> DateTime<Utc> {
        self.state().clock
    }

    pub fn set_clock(&self, clock: DateTime<Utc>) {
        self.state().clock = clock;
    }

    pub fn advance_clock(&self, by: Duration) {
        self.state().clock += by;
    }

    /// Insert or replace an eligible entity.
    pub fn upsert_entity(&self, entity_type: EntityType, entity: IndexableEntity) {
        self.insert(entity_type, entity, true);
    }

    /// Insert or replace an entity that fails the inclusion predicates
    /// (unpublished, policy-violating).
    pub fn upsert_ineligible_entity(&self, entity_type: EntityType, entity: IndexableEntity) {
        self.insert(entity_type, entity, false);
    }

    fn insert(&self, entity_type: EntityType, entity: IndexableEntity, eligible: bool) {
        self.state()
            .entities
            .entry(entity_type)
            .or_default()
            .insert(entity.id, StoredEntity { entity, eligible });
    }

    /// Remove an entity row, as a hard delete upstream would.
    pub fn remove_entity(&self, entity_type: EntityType, id: i64) {
        if let Some(rows) = self.state().entities.get_mut(&entity_type) {
            rows.remove(&id);
        }
    }

    /// Enqueue a dirty marker stamped with the current clock.
    pub fn enqueue_dirty(&self, entity_type: EntityType, id: i64) {
        let at = self.clock();
        self.enqueue_dirty_at(entity_type, id, at);
    }

    pub fn enqueue_dirty_at(&self, entity_type: EntityType, id: i64, enqueued_at: DateTime<Utc>) {
        self.state().dirty.push(DirtyQueueEntry {
            id,
            entity_type,
            enqueued_at,
        });
    }

    pub fn enqueue_deletion(&self, entity_type: EntityType, id: i64) {
        self.state()
            .deletions
            .push(PendingDeletionEntry { id, entity_type });
    }

    /// Make the fetch at `offset` fail, for any entity type.
    pub fn fail_fetch_at_offset(&self, offset: i64) {
        self.state().fail_fetch_at_offset = Some(offset);
    }

    pub fn heal(&self) {
        self.state().fail_fetch_at_offset = None;
    }

    /// Ids in the dirty queue of an entity type, duplicates included.
    pub fn dirty_ids(&self, entity_type: EntityType) -> Vec<i64> {
        self.state()
            .dirty
            .iter()
            .filter(|entry| entry.entity_type == entity_type)
            .map(|entry| entry.id)
            .collect()
    }

    /// Ids in the pending-deletion ledger of an entity type, duplicates included.
    pub fn deletion_ids(&self, entity_type: EntityType) -> Vec<i64> {
        self.state()
            .deletions
            .iter()
            .filter(|entry| entry.entity_type == entity_type)
            .map(|entry| entry.id)
            .collect()
    }

    pub fn watermark(&self, entity_type: EntityType) -> Option<DateTime<Utc>> {
        self.state().watermarks.get(&entity_type).copied()
    }

    /// Every `fetch_entities` call so far.
    pub fn fetch_calls(&self) -> Vec<FetchCall> {
        self.state().fetches.clone()
    }
}

#[async_trait]
impl SyncStore for MockSyncStore {
    async fn now(&self) -> Result<DateTime<Utc>, StoreError> {
        Ok(self.clock())
    }

    async fn fetch_entities(
        &self,
        entity_type: EntityType,
        filter: &FetchFilter,
        offset: i64,
        limit: i64,
    ) -> Result<Vec<IndexableEntity>, StoreError> {
        let mut state = self.state();
        state.fetches.push(FetchCall {
            entity_type,
            filter: filter.clone(),
            offset,
            limit,
        });
        if state.fail_fetch_at_offset == Some(offset) {
            return Err(StoreError::unavailable(format!(
                "injected failure at offset {}",
                offset
            )));
        }

        let Some(rows) = state.entities.get(&entity_type) else {
            return Ok(Vec::new());
        };
        Ok(rows
            .values()
            .filter(|row| row.eligible && filter.matches(&row.entity))
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .map(|row| row.entity.clone())
            .collect())
    }

    async fn dirty_queue(
        &self,
        entity_type: EntityType,
        up_to: DateTime<Utc>,
    ) -> Result<Vec<DirtyQueueEntry>, StoreError> {
        Ok(self
            .state()
            .dirty
            .iter()
            .filter(|entry| entry.entity_type == entity_type && entry.enqueued_at <= up_to)
            .cloned()
            .collect())
    }

    async fn remove_dirty_entries(
        &self,
        entity_type: EntityType,
        ids: &[i64],
        up_to: DateTime<Utc>,
    ) -> Result<u64, StoreError> {
        let mut state = self.state();
        let before = state.dirty.len();
        state.dirty.retain(|entry| {
            !(entry.entity_type == entity_type
                && entry.enqueued_at <= up_to
                && ids.contains(&entry.id))
        });
        Ok((before - state.dirty.len()) as u64)
    }

    async fn pending_deletions(
        &self,
        entity_type: EntityType,
    ) -> Result<Vec<PendingDeletionEntry>, StoreError> {
        Ok(self
            .state()
            .deletions
            .iter()
            .filter(|entry| entry.entity_type == entity_type)
            .cloned()
            .collect())
    }

    async fn remove_pending_deletions(
        &self,
        entity_type: EntityType,
        ids: &[i64],
    ) -> Result<u64, StoreError> {
        let mut state = self.state();
        let before = state.deletions.len();
        state
            .deletions
            .retain(|entry| !(entry.entity_type == entity_type && ids.contains(&entry.id)));
        Ok((before - state.deletions.len()) as u64)
    }

    async fn get_watermark(
        &self,
        entity_type: EntityType,
    ) -> Result<Option<SyncWatermark>, StoreError> {
        Ok(self
            .watermark(entity_type)
            .map(|last_updated_at| SyncWatermark {
                entity_type,
                last_updated_at,
            }))
    }

    async fn set_watermark(&self, watermark: &SyncWatermark) -> Result<(), StoreError> {
        let mut state = self.state();
        let stored = state
            .watermarks
            .entry(watermark.entity_type)
            .or_insert(watermark.last_updated_at);
        if watermark.last_updated_at > *stored {
            *stored = watermark.last_updated_at;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::collections::BTreeSet;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
    }

    #[tokio::test]
    async fn test_fetch_pages_eligible_rows_by_id() {
        let store = MockSyncStore::new(t0());
        for id in [3, 1, 2] {
            store.upsert_entity(EntityType::Articles, IndexableEntity::new(id, t0(), t0()));
        }
        store.upsert_ineligible_entity(EntityType::Articles, IndexableEntity::new(4, t0(), t0()));

        let filter = FetchFilter::full_scan();
        let first = store.fetch_entities(EntityType::Articles, &filter, 0, 2).await.unwrap();
        let second = store.fetch_entities(EntityType::Articles, &filter, 2, 2).await.unwrap();

        assert_eq!(first.iter().map(|e| e.id).collect::<Vec<_>>(), vec![1, 2]);
        assert_eq!(second.iter().map(|e| e.id).collect::<Vec<_>>(), vec![3]);
        assert_eq!(store.fetch_calls().len(), 2);
    }

    #[tokio::test]
    async fn test_dirty_membership_does_not_relax_eligibility() {
        let store = MockSyncStore::new(t0());
        let old = t0() - Duration::days(1);
        store.upsert_ineligible_entity(EntityType::Images, IndexableEntity::new(7, old, old));

        let filter = FetchFilter::incremental(t0(), BTreeSet::from([7]));
        let page = store.fetch_entities(EntityType::Images, &filter, 0, 10).await.unwrap();
        assert!(page.is_empty());
    }

    #[tokio::test]
    async fn test_dirty_removal_is_bounded_by_snapshot() {
        let store = MockSyncStore::new(t0());
        store.enqueue_dirty(EntityType::Models, 1);
        store.enqueue_dirty_at(EntityType::Models, 1, t0() + Duration::seconds(5));

        let removed = store
            .remove_dirty_entries(EntityType::Models, &[1], t0())
            .await
            .unwrap();
        assert_eq!(removed, 1);
        assert_eq!(store.dirty_ids(EntityType::Models), vec![1]);
    }

    #[tokio::test]
    async fn test_watermark_is_monotonic() {
        let store = MockSyncStore::new(t0());
        let set = |at| SyncWatermark {
            entity_type: EntityType::Models,
            last_updated_at: at,
        };

        store.set_watermark(&set(t0())).await.unwrap();
        store.set_watermark(&set(t0() - Duration::hours(1))).await.unwrap();
        assert_eq!(store.watermark(EntityType::Models), Some(t0()));

        store.set_watermark(&set(t0() + Duration::hours(1))).await.unwrap();
        assert_eq!(store.watermark(EntityType::Models), Some(t0() + Duration::hours(1)));
    }

    #[tokio::test]
    async fn test_injected_fetch_failure() {
        let store = MockSyncStore::new(t0());
        store.fail_fetch_at_offset(0);
        let result = store
            .fetch_entities(EntityType::Articles, &FetchFilter::full_scan(), 0, 10)
            .await;
        assert!(matches!(result, Err(StoreError::Unavailable(_))));
    }
}
