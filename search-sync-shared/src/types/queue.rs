//! Durable bookkeeping rows: the dirty queue, the pending-deletion ledger and
//! the per-entity-type watermark.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::EntityType;

/// Marks an entity as requiring reindex regardless of its timestamps.
///
/// Written by upstream mutation hooks. The same id may be enqueued many times.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirtyQueueEntry {
    pub id: i64,
    pub entity_type: EntityType,
    pub enqueued_at: DateTime<Utc>,
}

/// Records an entity that must be removed from its index.
///
/// Keyed by the logical index of `entity_type`, so entries survive a swap of
/// the physical index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingDeletionEntry {
    pub id: i64,
    pub entity_type: EntityType,
}

/// The last point in time up to which an entity type's index is known to be
/// consistent with the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncWatermark {
    pub entity_type: EntityType,
    pub last_updated_at: DateTime<Utc>,
}

impl SyncWatermark {
    /// Key under which the watermark is persisted.
    pub fn storage_key(entity_type: EntityType) -> String {
        format!("{}_lastUpdate", entity_type.index_name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_key_uses_logical_index_name() {
        assert_eq!(SyncWatermark::storage_key(EntityType::Articles), "articles_lastUpdate");
        assert_eq!(SyncWatermark::storage_key(EntityType::Models), "models_lastUpdate");
    }
}
