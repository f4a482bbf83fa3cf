//! Error types for the sync engine.
//!
//! Component errors ([`TransformError`], [`SubmitError`], [`WaitError`]) carry
//! what their component knows. The orchestrator folds them into a
//! [`SyncError`] and reports it to callers as a [`PassError`], tagged with the
//! entity type, phase and offset the pass had reached.

use search_sync_repository::{SearchIndexError, StoreError};
use search_sync_shared::{AsyncIndexTask, EntityType, TaskUid};
use thiserror::Error;

use crate::orchestrator::SyncPhase;

/// A relational row that does not fit its document schema.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("entity {entity_id}: field `{field}` {reason}")]
pub struct TransformError {
    pub entity_id: i64,
    pub field: &'static str,
    pub reason: String,
}

impl TransformError {
    pub fn new(entity_id: i64, field: &'static str, reason: impl Into<String>) -> Self {
        Self {
            entity_id,
            field,
            reason: reason.into(),
        }
    }
}

/// A sub-batch submission was not accepted by the index service.
///
/// Carries the tasks of the sub-batches accepted before the failure, so the
/// caller can still account for them.
#[derive(Error, Debug)]
#[error(
    "submission to `{index_uid}` failed for ids {batch_ids:?} after {} accepted batches: {source}",
    .submitted.len()
)]
pub struct SubmitError {
    pub index_uid: String,
    pub submitted: Vec<AsyncIndexTask>,
    pub batch_ids: Vec<i64>,
    pub source: SearchIndexError,
}

impl SubmitError {
    /// Uids of the tasks accepted before the failing sub-batch.
    pub fn submitted_uids(&self) -> Vec<TaskUid> {
        self.submitted.iter().map(|task| task.task_uid).collect()
    }
}

/// Outcome of waiting on index tasks that did not all succeed.
#[derive(Error, Debug)]
pub enum WaitError {
    /// A task reached `failed` or `canceled`.
    #[error("task {task_uid} on {index_uid:?} failed: {message}")]
    Failed {
        task_uid: TaskUid,
        index_uid: Option<String>,
        message: String,
    },

    /// The retry budget ran out with tasks still pending.
    #[error("{} task(s) still pending after {retries} retries: {pending:?}", .pending.len())]
    Timeout {
        pending: Vec<TaskUid>,
        retries: usize,
    },

    /// Polling itself was rejected by the service.
    #[error("Task polling failed: {0}")]
    Provider(#[from] SearchIndexError),
}

/// Why a sync pass stopped.
#[derive(Error, Debug)]
pub enum SyncError {
    /// The index service was unavailable or did not finish in time.
    /// Re-running the pass may succeed.
    #[error("Transient index service failure: {0}")]
    TransientIndex(String),

    /// The index exists with an incompatible primary key.
    #[error("Index `{index_uid}` has primary key {actual:?}, expected `{expected}`")]
    SchemaConflict {
        index_uid: String,
        expected: String,
        actual: Option<String>,
    },

    /// The index service permanently rejected a batch.
    #[error("Task {task_uid} on {index_uid:?} failed for ids {batch_ids:?}: {message}")]
    TerminalTaskFailure {
        task_uid: TaskUid,
        index_uid: Option<String>,
        batch_ids: Vec<i64>,
        message: String,
    },

    /// The index service rejected a request outright.
    #[error("Index service error: {0}")]
    IndexService(SearchIndexError),

    #[error("Store read failed: {0}")]
    StoreRead(#[from] StoreError),

    #[error("Transform failed: {0}")]
    Transform(#[from] TransformError),

    /// A pass for the same entity type is already running in this process.
    #[error("A {0} sync pass is already running")]
    AlreadyRunning(EntityType),
}

impl SyncError {
    /// Whether re-running the pass unchanged can be expected to succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            SyncError::TransientIndex(_) | SyncError::StoreRead(_) | SyncError::AlreadyRunning(_)
        )
    }

    /// Fold a wait failure, resolving the ids of the failed task's batch.
    pub fn from_wait(err: WaitError, batch_ids: impl FnOnce(TaskUid) -> Vec<i64>) -> Self {
        match err {
            WaitError::Failed {
                task_uid,
                index_uid,
                message,
            } => SyncError::TerminalTaskFailure {
                task_uid,
                index_uid,
                batch_ids: batch_ids(task_uid),
                message,
            },
            timeout @ WaitError::Timeout { .. } => SyncError::TransientIndex(timeout.to_string()),
            WaitError::Provider(err) => err.into(),
        }
    }
}

impl From<SearchIndexError> for SyncError {
    fn from(err: SearchIndexError) -> Self {
        if err.is_transient() {
            SyncError::TransientIndex(err.to_string())
        } else {
            SyncError::IndexService(err)
        }
    }
}

impl From<SubmitError> for SyncError {
    fn from(err: SubmitError) -> Self {
        if err.source.is_transient() {
            SyncError::TransientIndex(err.to_string())
        } else {
            SyncError::IndexService(err.source)
        }
    }
}

impl From<WaitError> for SyncError {
    fn from(err: WaitError) -> Self {
        SyncError::from_wait(err, |_| Vec::new())
    }
}

/// A failed pass, as reported to callers.
#[derive(Error, Debug)]
#[error("{entity_type} sync failed during {phase} at offset {offset}: {source}")]
pub struct PassError {
    pub entity_type: EntityType,
    pub phase: SyncPhase,
    /// Number of entities fully written before the failure.
    pub offset: usize,
    pub source: SyncError,
}

impl PassError {
    pub fn is_retryable(&self) -> bool {
        self.source.is_retryable()
    }
}
