//! In-memory index service.
//!
//! `MockSearchIndex` implements [`SearchIndexProvider`] over a map of indexes
//! and a task table, and records every call so tests can assert on batching
//! and on what reached the service.
//!
//! Mutations take effect when they are submitted (if their task is going to
//! succeed); their tasks report `processing` for a configurable number of
//! polls before reaching their final status.
//!
//! # Example
//!
//! ```ignore
//! use search_sync_repository::{MockSearchIndex, SearchIndexProvider};
//!
//! let index = MockSearchIndex::new();
//! index.set_pending_polls(2);
//!
//! let task = index.create_index("articles", "id").await?;
//! // processing, processing, succeeded
//! ```

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use search_sync_shared::{AsyncIndexTask, IndexDocument, IndexSettings, TaskStatus, TaskUid};

use crate::errors::SearchIndexError;
use crate::interfaces::SearchIndexProvider;
use crate::types::IndexInfo;

#[derive(Debug, Clone)]
struct MockIndex {
    primary_key: Option<String>,
    settings: IndexSettings,
    documents: BTreeMap<i64, IndexDocument>,
}

impl MockIndex {
    fn new(primary_key: Option<String>) -> Self {
        Self {
            primary_key,
            settings: IndexSettings {
                searchable: vec!["*".to_string()],
                ..IndexSettings::default()
            },
            documents: BTreeMap::new(),
        }
    }
}

#[derive(Debug)]
struct TaskRecord {
    index_uid: Option<String>,
    polls_remaining: u32,
    outcome: Result<(), String>,
}

#[derive(Debug, Default)]
struct State {
    indexes: BTreeMap<String, MockIndex>,
    tasks: HashMap<TaskUid, TaskRecord>,
    next_task_uid: TaskUid,

    pending_polls: u32,
    stall_tasks: bool,
    rejected_ids: BTreeSet<i64>,
    fail_add_documents_on_call: Option<usize>,
    fail_swap: bool,

    add_documents_calls: usize,
    document_batches: Vec<(String, Vec<i64>)>,
    delete_batches: Vec<(String, Vec<i64>)>,
    settings_updates: Vec<(String, IndexSettings)>,
    swaps: Vec<(String, String)>,
    task_polls: usize,
}

impl State {
    fn enqueue(&mut self, index_uid: Option<&str>, outcome: Result<(), String>) -> AsyncIndexTask {
        let task_uid = self.next_task_uid;
        self.next_task_uid += 1;
        self.tasks.insert(
            task_uid,
            TaskRecord {
                index_uid: index_uid.map(str::to_string),
                polls_remaining: self.pending_polls,
                outcome,
            },
        );
        AsyncIndexTask::enqueued(task_uid, index_uid.map(str::to_string))
    }

    fn index_or_create(&mut self, uid: &str, primary_key: Option<&str>) -> &mut MockIndex {
        self.indexes
            .entry(uid.to_string())
            .or_insert_with(|| MockIndex::new(primary_key.map(str::to_string)))
    }
}

/// In-memory index service with failure knobs.
#[derive(Debug, Default)]
pub struct MockSearchIndex {
    state: Mutex<State>,
}

impl MockSearchIndex {
    /// Create an empty service whose tasks succeed on their first poll.
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // ------------------------------------------------------------------
    // Knobs
    // ------------------------------------------------------------------

    /// Number of polls each subsequently enqueued task reports `processing`.
    pub fn set_pending_polls(&self, polls: u32) {
        self.state().pending_polls = polls;
    }

    /// Make every task report `processing` forever.
    pub fn stall_tasks(&self) {
        self.state().stall_tasks = true;
    }

    /// Fail the task of any document batch containing one of `ids`.
    pub fn reject_document_batches(&self, ids: &[i64]) {
        self.state().rejected_ids.extend(ids.iter().copied());
    }

    /// Make the `call`-th (1-based) `add_documents` request fail outright.
    pub fn fail_add_documents_on_call(&self, call: usize) {
        self.state().fail_add_documents_on_call = Some(call);
    }

    /// Fail the task of every subsequent swap.
    pub fn fail_swap(&self) {
        self.state().fail_swap = true;
    }

    /// Clear every failure knob, keeping the data.
    pub fn heal(&self) {
        let mut state = self.state();
        state.pending_polls = 0;
        state.stall_tasks = false;
        state.rejected_ids.clear();
        state.fail_add_documents_on_call = None;
        state.fail_swap = false;
    }

    // ------------------------------------------------------------------
    // Fixtures and inspection
    // ------------------------------------------------------------------

    /// Create or replace an index holding `documents`, bypassing the task queue.
    pub fn seed_index(&self, uid: &str, primary_key: &str, documents: Vec<IndexDocument>) {
        let mut index = MockIndex::new(Some(primary_key.to_string()));
        index.documents = documents.into_iter().map(|doc| (doc.id(), doc)).collect();
        self.state().indexes.insert(uid.to_string(), index);
    }

    /// Overwrite an existing index's settings, bypassing the task queue.
    pub fn set_settings(&self, uid: &str, settings: IndexSettings) {
        if let Some(index) = self.state().indexes.get_mut(uid) {
            index.settings = settings;
        }
    }

    pub fn has_index(&self, uid: &str) -> bool {
        self.state().indexes.contains_key(uid)
    }

    /// Names of all existing indexes, sorted.
    pub fn index_names(&self) -> Vec<String> {
        self.state().indexes.keys().cloned().collect()
    }

    /// Ids of the documents in an index, sorted; empty if the index is missing.
    pub fn document_ids(&self, uid: &str) -> Vec<i64> {
        self.state()
            .indexes
            .get(uid)
            .map(|index| index.documents.keys().copied().collect())
            .unwrap_or_default()
    }

    /// A stored document, bypassing the task queue.
    pub fn document(&self, uid: &str, id: i64) -> Option<IndexDocument> {
        self.state()
            .indexes
            .get(uid)
            .and_then(|index| index.documents.get(&id).cloned())
    }

    /// Every `add_documents` request as `(index, ids)`, in call order.
    pub fn document_batches(&self) -> Vec<(String, Vec<i64>)> {
        self.state().document_batches.clone()
    }

    /// Every `delete_documents` request as `(index, ids)`, in call order.
    pub fn delete_batches(&self) -> Vec<(String, Vec<i64>)> {
        self.state().delete_batches.clone()
    }

    /// Every `update_settings` request, in call order.
    pub fn settings_updates(&self) -> Vec<(String, IndexSettings)> {
        self.state().settings_updates.clone()
    }

    /// Every `swap_indexes` request, in call order.
    pub fn swaps(&self) -> Vec<(String, String)> {
        self.state().swaps.clone()
    }

    /// Number of `get_task` calls so far.
    pub fn task_polls(&self) -> usize {
        self.state().task_polls
    }
}

#[async_trait]
impl SearchIndexProvider for MockSearchIndex {
    async fn get_index(&self, uid: &str) -> Result<Option<IndexInfo>, SearchIndexError> {
        Ok(self.state().indexes.get(uid).map(|index| IndexInfo {
            uid: uid.to_string(),
            primary_key: index.primary_key.clone(),
        }))
    }

    async fn create_index(
        &self,
        uid: &str,
        primary_key: &str,
    ) -> Result<AsyncIndexTask, SearchIndexError> {
        let mut state = self.state();
        let outcome = if state.indexes.contains_key(uid) {
            Err(format!("index_already_exists: Index `{}` already exists.", uid))
        } else {
            state
                .indexes
                .insert(uid.to_string(), MockIndex::new(Some(primary_key.to_string())));
            Ok(())
        };
        Ok(state.enqueue(Some(uid), outcome))
    }

    async fn delete_index(&self, uid: &str) -> Result<AsyncIndexTask, SearchIndexError> {
        let mut state = self.state();
        let outcome = match state.indexes.remove(uid) {
            Some(_) => Ok(()),
            None => Err(format!("index_not_found: Index `{}` not found.", uid)),
        };
        Ok(state.enqueue(Some(uid), outcome))
    }

    async fn get_settings(&self, uid: &str) -> Result<IndexSettings, SearchIndexError> {
        self.state()
            .indexes
            .get(uid)
            .map(|index| index.settings.clone())
            .ok_or_else(|| SearchIndexError::index_not_found(uid))
    }

    async fn update_settings(
        &self,
        uid: &str,
        settings: &IndexSettings,
    ) -> Result<AsyncIndexTask, SearchIndexError> {
        let mut state = self.state();
        state
            .settings_updates
            .push((uid.to_string(), settings.clone()));
        state.index_or_create(uid, None).settings = settings.clone();
        Ok(state.enqueue(Some(uid), Ok(())))
    }

    async fn add_documents(
        &self,
        uid: &str,
        primary_key: &str,
        documents: &[IndexDocument],
    ) -> Result<AsyncIndexTask, SearchIndexError> {
        let mut state = self.state();
        state.add_documents_calls += 1;
        if state.fail_add_documents_on_call == Some(state.add_documents_calls) {
            return Err(SearchIndexError::connection(format!(
                "injected failure on add_documents call {}",
                state.add_documents_calls
            )));
        }

        let ids: Vec<i64> = documents.iter().map(IndexDocument::id).collect();
        state.document_batches.push((uid.to_string(), ids.clone()));

        let rejected: Vec<i64> = ids
            .iter()
            .copied()
            .filter(|id| state.rejected_ids.contains(id))
            .collect();
        let outcome = if rejected.is_empty() {
            let index = state.index_or_create(uid, Some(primary_key));
            for document in documents {
                index.documents.insert(document.id(), document.clone());
            }
            Ok(())
        } else {
            Err(format!(
                "invalid_document_fields: documents {:?} were rejected",
                rejected
            ))
        };
        Ok(state.enqueue(Some(uid), outcome))
    }

    async fn delete_documents(
        &self,
        uid: &str,
        ids: &[i64],
    ) -> Result<AsyncIndexTask, SearchIndexError> {
        let mut state = self.state();
        state.delete_batches.push((uid.to_string(), ids.to_vec()));
        let outcome = match state.indexes.get_mut(uid) {
            Some(index) => {
                for id in ids {
                    index.documents.remove(id);
                }
                Ok(())
            }
            None => Err(format!("index_not_found: Index `{}` not found.", uid)),
        };
        Ok(state.enqueue(Some(uid), outcome))
    }

    async fn get_document(
        &self,
        uid: &str,
        id: i64,
    ) -> Result<Option<IndexDocument>, SearchIndexError> {
        let state = self.state();
        let index = state
            .indexes
            .get(uid)
            .ok_or_else(|| SearchIndexError::index_not_found(uid))?;
        Ok(index.documents.get(&id).cloned())
    }

    async fn get_task(&self, task_uid: TaskUid) -> Result<AsyncIndexTask, SearchIndexError> {
        let mut state = self.state();
        state.task_polls += 1;
        let stall = state.stall_tasks;

        let record = state
            .tasks
            .get_mut(&task_uid)
            .ok_or(SearchIndexError::TaskNotFound(task_uid))?;

        let mut task = AsyncIndexTask::enqueued(task_uid, record.index_uid.clone());
        if stall || record.polls_remaining > 0 {
            record.polls_remaining = record.polls_remaining.saturating_sub(1);
            task.status = TaskStatus::Processing;
            return Ok(task);
        }

        match &record.outcome {
            Ok(()) => task.status = TaskStatus::Succeeded,
            Err(message) => {
                task.status = TaskStatus::Failed;
                task.error = Some(message.clone());
            }
        }
        Ok(task)
    }

    async fn swap_indexes(
        &self,
        first: &str,
        second: &str,
    ) -> Result<AsyncIndexTask, SearchIndexError> {
        let mut state = self.state();
        state.swaps.push((first.to_string(), second.to_string()));

        let outcome = if state.fail_swap {
            Err("internal: injected swap failure".to_string())
        } else {
            match (state.indexes.remove(first), state.indexes.remove(second)) {
                (Some(a), Some(b)) => {
                    state.indexes.insert(first.to_string(), b);
                    state.indexes.insert(second.to_string(), a);
                    Ok(())
                }
                (a, b) => {
                    let missing = if a.is_none() { first } else { second };
                    if let Some(a) = a {
                        state.indexes.insert(first.to_string(), a);
                    }
                    if let Some(b) = b {
                        state.indexes.insert(second.to_string(), b);
                    }
                    Err(format!("index_not_found: Index `{}` not found.", missing))
                }
            }
        };
        Ok(state.enqueue(None, outcome))
    }
}
