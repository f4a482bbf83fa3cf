//! Cleanup coordinator.
//!
//! Applies the pending-deletion ledger to the live index. Ledger rows are
//! removed only after every delete task has succeeded, so a crash in between
//! repeats a harmless delete on the next pass.

use std::collections::BTreeSet;
use std::sync::Arc;

use tracing::{debug, info, instrument, warn};

use crate::errors::SyncError;
use crate::waiter::TaskWaiter;
use crate::writer::DocumentWriter;
use search_sync_repository::SyncStore;
use search_sync_shared::EntityType;

#[derive(Clone)]
pub struct CleanupCoordinator {
    store: Arc<dyn SyncStore>,
    writer: DocumentWriter,
    waiter: TaskWaiter,
}

impl CleanupCoordinator {
    pub fn new(store: Arc<dyn SyncStore>, writer: DocumentWriter, waiter: TaskWaiter) -> Self {
        Self {
            store,
            writer,
            waiter,
        }
    }

    /// Delete every ledgered id from the live index of `entity_type`.
    ///
    /// Returns the number of distinct ids deleted.
    #[instrument(skip(self), fields(entity_type = %entity_type))]
    pub async fn cleanup_deleted(&self, entity_type: EntityType) -> Result<usize, SyncError> {
        let entries = self.store.pending_deletions(entity_type).await?;
        let ids: Vec<i64> = entries
            .iter()
            .map(|entry| entry.id)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        if ids.is_empty() {
            debug!("No pending deletions");
            return Ok(0);
        }

        let index_uid = entity_type.index_name();
        let tasks = self.writer.delete(index_uid, &ids).await.map_err(|e| {
            if !e.submitted.is_empty() {
                warn!(
                    index_uid = %e.index_uid,
                    accepted_tasks = ?e.submitted_uids(),
                    failed_ids = ?e.batch_ids,
                    "Deletion failed after earlier batches were accepted"
                );
            }
            SyncError::from(e)
        })?;
        self.waiter
            .wait(&tasks)
            .await
            .map_err(|e| SyncError::from_wait(e, |task_uid| self.writer.batch_ids(&tasks, task_uid, &ids)))?;

        let removed = self.store.remove_pending_deletions(entity_type, &ids).await?;
        info!(
            deleted = ids.len(),
            ledger_rows = entries.len(),
            removed,
            "Applied pending deletions"
        );
        Ok(ids.len())
    }
}
