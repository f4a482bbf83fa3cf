//! Document writer.
//!
//! Submits documents and deletions to the index service in fixed-size
//! sub-batches, one request per sub-batch, and collects the task handles.
//! The sub-batch size is kept well below the read page size because the
//! service limits payload size independently of how the store pages.

use std::sync::Arc;

use tracing::{debug, instrument, warn};

use crate::errors::SubmitError;
use search_sync_repository::SearchIndexProvider;
use search_sync_shared::{AsyncIndexTask, IndexDocument, TaskUid};

/// Default number of documents per submission.
pub const DEFAULT_DOCUMENT_BATCH_SIZE: usize = 25;

/// Batched writer over a [`SearchIndexProvider`].
#[derive(Clone)]
pub struct DocumentWriter {
    provider: Arc<dyn SearchIndexProvider>,
    batch_size: usize,
}

impl DocumentWriter {
    /// Create a writer. A batch size of zero is raised to one.
    pub fn new(provider: Arc<dyn SearchIndexProvider>, batch_size: usize) -> Self {
        Self {
            provider,
            batch_size: batch_size.max(1),
        }
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Upsert `documents` into `index_uid`.
    ///
    /// Returns one task per sub-batch, in submission order. The first
    /// rejected submission aborts the call; nothing after it is sent.
    #[instrument(skip(self, documents), fields(index_uid = %index_uid, document_count = documents.len()))]
    pub async fn submit(
        &self,
        index_uid: &str,
        primary_key: &str,
        documents: &[IndexDocument],
    ) -> Result<Vec<AsyncIndexTask>, SubmitError> {
        let mut tasks = Vec::with_capacity(documents.len().div_ceil(self.batch_size));

        for batch in documents.chunks(self.batch_size) {
            match self
                .provider
                .add_documents(index_uid, primary_key, batch)
                .await
            {
                Ok(task) => {
                    debug!(task_uid = task.task_uid, batch_len = batch.len(), "Submitted document batch");
                    tasks.push(task);
                }
                Err(source) => {
                    let batch_ids: Vec<i64> = batch.iter().map(IndexDocument::id).collect();
                    warn!(
                        error = %source,
                        accepted = tasks.len(),
                        "Document batch submission failed"
                    );
                    return Err(SubmitError {
                        index_uid: index_uid.to_string(),
                        submitted: tasks,
                        batch_ids,
                        source,
                    });
                }
            }
        }

        Ok(tasks)
    }

    /// Delete `ids` from `index_uid`, sub-batched like [`DocumentWriter::submit`].
    #[instrument(skip(self, ids), fields(index_uid = %index_uid, id_count = ids.len()))]
    pub async fn delete(
        &self,
        index_uid: &str,
        ids: &[i64],
    ) -> Result<Vec<AsyncIndexTask>, SubmitError> {
        let mut tasks = Vec::with_capacity(ids.len().div_ceil(self.batch_size));

        for batch in ids.chunks(self.batch_size) {
            match self.provider.delete_documents(index_uid, batch).await {
                Ok(task) => tasks.push(task),
                Err(source) => {
                    warn!(error = %source, accepted = tasks.len(), "Delete batch submission failed");
                    return Err(SubmitError {
                        index_uid: index_uid.to_string(),
                        submitted: tasks,
                        batch_ids: batch.to_vec(),
                        source,
                    });
                }
            }
        }

        Ok(tasks)
    }

    /// Ids of the sub-batch that produced `task_uid`.
    ///
    /// `tasks` and `ids` must be the result and input of one
    /// `submit`/`delete` call. Empty if the task is not among them.
    pub fn batch_ids(&self, tasks: &[AsyncIndexTask], task_uid: TaskUid, ids: &[i64]) -> Vec<i64> {
        tasks
            .iter()
            .position(|task| task.task_uid == task_uid)
            .and_then(|position| ids.chunks(self.batch_size).nth(position))
            .map(<[i64]>::to_vec)
            .unwrap_or_default()
    }
}
