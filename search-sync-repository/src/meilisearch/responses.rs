//! Wire shapes of Meilisearch responses.

use serde::Deserialize;
use search_sync_shared::{AsyncIndexTask, TaskStatus, TaskUid};

use crate::errors::SearchIndexError;
use crate::types::IndexInfo;

/// Body of a `202 Accepted` answer to any mutation.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct TaskSummary {
    pub task_uid: TaskUid,
    pub index_uid: Option<String>,
    pub status: TaskStatus,
}

impl From<TaskSummary> for AsyncIndexTask {
    fn from(summary: TaskSummary) -> Self {
        AsyncIndexTask {
            task_uid: summary.task_uid,
            index_uid: summary.index_uid,
            status: summary.status,
            error: None,
        }
    }
}

/// Body of `GET /tasks/{uid}`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct TaskView {
    pub uid: TaskUid,
    pub index_uid: Option<String>,
    pub status: TaskStatus,
    pub error: Option<ErrorBody>,
}

impl From<TaskView> for AsyncIndexTask {
    fn from(view: TaskView) -> Self {
        AsyncIndexTask {
            task_uid: view.uid,
            index_uid: view.index_uid,
            status: view.status,
            error: view
                .error
                .map(|error| format!("{}: {}", error.code, error.message)),
        }
    }
}

/// Body of `GET /indexes/{uid}`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct IndexView {
    pub uid: String,
    pub primary_key: Option<String>,
}

impl From<IndexView> for IndexInfo {
    fn from(view: IndexView) -> Self {
        IndexInfo {
            uid: view.uid,
            primary_key: view.primary_key,
        }
    }
}

/// Error body returned with any non-success status, and embedded in failed tasks.
#[derive(Debug, Deserialize)]
pub(crate) struct ErrorBody {
    pub message: String,
    pub code: String,
}

/// Map a non-success response to an error, using the error body when it parses.
pub(crate) fn error_from_body(status: u16, body: &str) -> SearchIndexError {
    match serde_json::from_str::<ErrorBody>(body) {
        Ok(error) if error.code == "index_not_found" => {
            SearchIndexError::index_not_found(error.message)
        }
        Ok(error) => SearchIndexError::request(status, error.code, error.message),
        Err(_) => SearchIndexError::request(status, "unknown", body.to_string()),
    }
}
