//! Asynchronous index-mutation tasks.

use serde::{Deserialize, Serialize};

/// Identifier assigned by the index service to an enqueued task.
pub type TaskUid = u64;

/// Lifecycle status of an index task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Enqueued,
    Processing,
    Succeeded,
    Failed,
    Canceled,
}

impl TaskStatus {
    /// Whether the task has stopped changing.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TaskStatus::Succeeded | TaskStatus::Failed | TaskStatus::Canceled
        )
    }

    /// Whether the task ended without applying its change.
    pub fn is_failure(&self) -> bool {
        matches!(self, TaskStatus::Failed | TaskStatus::Canceled)
    }
}

/// Handle of a submitted index mutation, tracked until it reaches a terminal
/// status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AsyncIndexTask {
    pub task_uid: TaskUid,
    /// Index the task operates on; `None` for cross-index tasks such as swaps.
    pub index_uid: Option<String>,
    pub status: TaskStatus,
    /// Failure reason reported by the service for failed tasks.
    pub error: Option<String>,
}

impl AsyncIndexTask {
    pub fn enqueued(task_uid: TaskUid, index_uid: Option<String>) -> Self {
        Self {
            task_uid,
            index_uid,
            status: TaskStatus::Enqueued,
            error: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_statuses() {
        assert!(!TaskStatus::Enqueued.is_terminal());
        assert!(!TaskStatus::Processing.is_terminal());
        assert!(TaskStatus::Succeeded.is_terminal());
        assert!(TaskStatus::Failed.is_terminal());
        assert!(TaskStatus::Canceled.is_terminal());
        assert!(!TaskStatus::Succeeded.is_failure());
        assert!(TaskStatus::Canceled.is_failure());
    }

    #[test]
    fn test_status_wire_format() {
        let status: TaskStatus = serde_json::from_str("\"processing\"").unwrap();
        assert_eq!(status, TaskStatus::Processing);
    }
}
