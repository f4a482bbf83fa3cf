//! Request and response types for repository operations.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use search_sync_shared::IndexableEntity;

/// Metadata of an existing index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexInfo {
    pub uid: String,
    /// `None` until the service has been told or has inferred a primary key.
    pub primary_key: Option<String>,
}

/// Candidate-row filter of an entity fetch.
///
/// Without a watermark every eligible row matches. With one, a row matches
/// when it was created or updated after the watermark, or when its id is in
/// the dirty set. Eligibility (inclusion predicates) is applied by the store
/// on top of this filter and is never relaxed by dirty membership.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FetchFilter {
    pub since: Option<DateTime<Utc>>,
    pub dirty_ids: BTreeSet<i64>,
}

impl FetchFilter {
    /// Unconditional scan of every eligible row.
    pub fn full_scan() -> Self {
        Self::default()
    }

    /// Rows changed after `since`, plus the dirty ids.
    pub fn incremental(since: DateTime<Utc>, dirty_ids: BTreeSet<i64>) -> Self {
        Self {
            since: Some(since),
            dirty_ids,
        }
    }

    pub fn is_full_scan(&self) -> bool {
        self.since.is_none()
    }

    /// Whether an entity passes the candidate filter (eligibility aside).
    pub fn matches(&self, entity: &IndexableEntity) -> bool {
        match self.since {
            None => true,
            Some(since) => {
                entity.created_at > since
                    || entity.updated_at > since
                    || self.dirty_ids.contains(&entity.id)
            }
        }
    }
}
