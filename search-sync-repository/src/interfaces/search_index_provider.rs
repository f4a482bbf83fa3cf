//! Search index provider trait definition.
//!
//! This module defines the abstract interface for index service operations,
//! allowing for different backend implementations (Meilisearch, in-memory).

use async_trait::async_trait;
use search_sync_shared::{AsyncIndexTask, IndexDocument, IndexSettings, TaskUid};

use crate::errors::SearchIndexError;
use crate::types::IndexInfo;

/// Abstracts the underlying index service.
///
/// Every mutation is asynchronous on the service side: it returns an
/// [`AsyncIndexTask`] handle as soon as the service has accepted the request,
/// and the change is only visible once [`SearchIndexProvider::get_task`]
/// reports the task as succeeded. Callers are expected to wait on the handles
/// they collect.
///
/// Implementations are injected into the engine as `Arc<dyn SearchIndexProvider>`,
/// constructed once per process.
#[async_trait]
pub trait SearchIndexProvider: Send + Sync {
    /// Fetch index metadata.
    ///
    /// # Returns
    ///
    /// * `Ok(Some(IndexInfo))` - If the index exists
    /// * `Ok(None)` - If it does not
    /// * `Err(SearchIndexError)` - If the lookup itself failed
    async fn get_index(&self, uid: &str) -> Result<Option<IndexInfo>, SearchIndexError>;

    /// Enqueue the creation of an index with the given primary key.
    async fn create_index(
        &self,
        uid: &str,
        primary_key: &str,
    ) -> Result<AsyncIndexTask, SearchIndexError>;

    /// Enqueue the deletion of an index and all its documents.
    async fn delete_index(&self, uid: &str) -> Result<AsyncIndexTask, SearchIndexError>;

    /// Read the searchable, sortable and filterable attribute lists.
    async fn get_settings(&self, uid: &str) -> Result<IndexSettings, SearchIndexError>;

    /// Enqueue an update of the attribute lists.
    ///
    /// Changing settings makes the service reindex every document, so callers
    /// should only issue this when the lists actually differ.
    async fn update_settings(
        &self,
        uid: &str,
        settings: &IndexSettings,
    ) -> Result<AsyncIndexTask, SearchIndexError>;

    /// Enqueue an upsert of a batch of documents.
    ///
    /// Documents replace any existing document with the same id.
    ///
    /// # Arguments
    ///
    /// * `uid` - Target index
    /// * `primary_key` - Name of the id field, sent so the service never has to infer it
    /// * `documents` - The batch; callers keep it within the service's payload limits
    async fn add_documents(
        &self,
        uid: &str,
        primary_key: &str,
        documents: &[IndexDocument],
    ) -> Result<AsyncIndexTask, SearchIndexError>;

    /// Enqueue the deletion of documents by id.
    ///
    /// Ids that are not in the index are ignored by the service.
    async fn delete_documents(
        &self,
        uid: &str,
        ids: &[i64],
    ) -> Result<AsyncIndexTask, SearchIndexError>;

    /// Fetch a single document by id, `None` if absent.
    async fn get_document(
        &self,
        uid: &str,
        id: i64,
    ) -> Result<Option<IndexDocument>, SearchIndexError>;

    /// Fetch the current status of a task.
    async fn get_task(&self, task_uid: TaskUid) -> Result<AsyncIndexTask, SearchIndexError>;

    /// Enqueue an atomic swap of two indexes' contents.
    ///
    /// Both indexes must exist. Readers of either name see the old contents
    /// until the task succeeds and the new contents afterwards, never a mix.
    async fn swap_indexes(
        &self,
        first: &str,
        second: &str,
    ) -> Result<AsyncIndexTask, SearchIndexError>;
}
