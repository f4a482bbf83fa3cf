//! Index lifecycle manager.
//!
//! Creates indexes on demand, keeps their attribute settings in line with the
//! entity catalogue, and promotes a rebuilt shadow index over the live one.
//!
//! A full rebuild goes through three steps:
//!
//! 1. [`IndexManager::prepare_shadow`] drops whatever an earlier failed
//!    rebuild left behind and creates an empty shadow with the live schema.
//! 2. The orchestrator writes every document into the shadow.
//! 3. [`IndexManager::swap`] exchanges live and shadow in one service task and
//!    deletes the demoted index.
//!
//! Readers of the live name never see a partially built index: until the swap
//! task succeeds they keep seeing the old contents.

use std::sync::Arc;

use tracing::{debug, info, instrument, warn};

use crate::errors::SyncError;
use crate::waiter::TaskWaiter;
use search_sync_repository::SearchIndexProvider;
use search_sync_shared::{EntityDefinition, IndexSettings};

/// An index known to exist with the expected primary key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexHandle {
    pub uid: String,
    pub primary_key: String,
}

#[derive(Clone)]
pub struct IndexManager {
    provider: Arc<dyn SearchIndexProvider>,
    waiter: TaskWaiter,
}

impl IndexManager {
    pub fn new(provider: Arc<dyn SearchIndexProvider>, waiter: TaskWaiter) -> Self {
        Self { provider, waiter }
    }

    /// Get or create the index `uid`.
    ///
    /// # Returns
    ///
    /// * `Ok(IndexHandle)` - The index exists (or was created) with `primary_key`
    /// * `Err(SyncError::SchemaConflict)` - It exists with another primary key
    /// * `Err(SyncError)` - The service rejected the lookup or the creation
    #[instrument(skip(self), fields(index_uid = %uid))]
    pub async fn ensure_index(&self, uid: &str, primary_key: &str) -> Result<IndexHandle, SyncError> {
        match self.provider.get_index(uid).await? {
            Some(info) => {
                if let Some(actual) = info.primary_key.as_deref() {
                    if actual != primary_key {
                        return Err(SyncError::SchemaConflict {
                            index_uid: uid.to_string(),
                            expected: primary_key.to_string(),
                            actual: info.primary_key.clone(),
                        });
                    }
                }
                debug!("Index already exists");
            }
            None => {
                let task = self.provider.create_index(uid, primary_key).await?;
                self.waiter.wait(&[task]).await?;
                info!(primary_key, "Created index");
            }
        }

        Ok(IndexHandle {
            uid: uid.to_string(),
            primary_key: primary_key.to_string(),
        })
    }

    /// Bring the attribute settings of `handle` in line with `desired`.
    ///
    /// Searchable attributes are compared in rank order, the other lists
    /// order-insensitively. Returns whether an update was
    /// issued; a settings update makes the service reindex every document, so
    /// nothing is sent when the lists already match.
    #[instrument(skip(self, desired), fields(index_uid = %handle.uid))]
    pub async fn ensure_schema(
        &self,
        handle: &IndexHandle,
        desired: &IndexSettings,
    ) -> Result<bool, SyncError> {
        let current = self.provider.get_settings(&handle.uid).await?;
        if current.same_attributes(desired) {
            debug!("Index settings up to date");
            return Ok(false);
        }

        info!(
            current = ?current.normalized(),
            desired = ?desired.normalized(),
            "Updating index settings"
        );
        let task = self.provider.update_settings(&handle.uid, desired).await?;
        self.waiter.wait(&[task]).await?;
        Ok(true)
    }

    /// Create an empty shadow index for a full rebuild of `definition`.
    ///
    /// A shadow left over from an earlier failed rebuild is deleted first, so
    /// the rebuild never starts from stale documents.
    #[instrument(skip(self, definition), fields(entity_type = %definition.entity_type))]
    pub async fn prepare_shadow(&self, definition: &EntityDefinition) -> Result<IndexHandle, SyncError> {
        let shadow_uid = definition.shadow_index_name();

        if self.provider.get_index(&shadow_uid).await?.is_some() {
            warn!(index_uid = %shadow_uid, "Deleting stale shadow index");
            let task = self.provider.delete_index(&shadow_uid).await?;
            self.waiter.wait(&[task]).await?;
        }

        let handle = self.ensure_index(&shadow_uid, definition.primary_key).await?;
        self.ensure_schema(&handle, &definition.settings()).await?;
        Ok(handle)
    }

    /// Promote `shadow` to `live` and delete the demoted index.
    ///
    /// Failing to delete the demoted index only logs a warning: the next
    /// [`IndexManager::prepare_shadow`] removes it.
    #[instrument(skip(self), fields(live = %live.uid, shadow = %shadow.uid))]
    pub async fn swap(&self, live: &IndexHandle, shadow: &IndexHandle) -> Result<(), SyncError> {
        let task = self.provider.swap_indexes(&live.uid, &shadow.uid).await?;
        self.waiter.wait(&[task]).await?;
        info!("Promoted shadow index");

        // The shadow name now holds the previous live contents.
        match self.provider.delete_index(&shadow.uid).await {
            Ok(task) => {
                if let Err(e) = self.waiter.wait(&[task]).await {
                    warn!(error = %e, "Failed to delete demoted index");
                }
            }
            Err(e) => warn!(error = %e, "Failed to delete demoted index"),
        }
        Ok(())
    }
}
