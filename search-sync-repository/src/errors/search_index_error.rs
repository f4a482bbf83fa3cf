//! Search index error types.
//!
//! This module defines the error type for all index service operations,
//! covering transport failures, rejected requests and undecodable responses.

use search_sync_shared::TaskUid;
use thiserror::Error;

/// Errors from index service operations.
///
/// Used by the `SearchIndexProvider` trait. Transport failures and server-side
/// errors are transient (re-running the pass may succeed); everything else
/// needs a change before a retry can help.
#[derive(Debug, Clone, Error)]
pub enum SearchIndexError {
    /// Validation error (e.g., an index uid the service would reject).
    #[error("Validation error: {0}")]
    ValidationError(String),

    /// Failed to reach the index service.
    #[error("Connection error: {0}")]
    ConnectionError(String),

    /// The service answered with a non-success status.
    #[error("Request failed with status {status} ({code}): {message}")]
    RequestError {
        status: u16,
        code: String,
        message: String,
    },

    /// The index does not exist.
    #[error("Index not found: {0}")]
    IndexNotFound(String),

    /// The task does not exist.
    #[error("Task not found: {0}")]
    TaskNotFound(TaskUid),

    /// Failed to parse a response from the index service.
    #[error("Parse error: {0}")]
    ParseError(String),

    /// Failed to serialize data for the index service.
    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl SearchIndexError {
    /// Create a validation error.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::ValidationError(msg.into())
    }

    /// Create a connection error.
    pub fn connection(msg: impl Into<String>) -> Self {
        Self::ConnectionError(msg.into())
    }

    /// Create a request error from a response status and the service's error body.
    pub fn request(status: u16, code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::RequestError {
            status,
            code: code.into(),
            message: message.into(),
        }
    }

    /// Create an index not found error.
    pub fn index_not_found(uid: impl Into<String>) -> Self {
        Self::IndexNotFound(uid.into())
    }

    /// Create a parse error.
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::ParseError(msg.into())
    }

    /// Create a serialization error.
    pub fn serialization(msg: impl Into<String>) -> Self {
        Self::SerializationError(msg.into())
    }

    /// Whether the failure is likely to go away on its own.
    ///
    /// Connection failures, throttling and server errors are transient.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::ConnectionError(_) => true,
            Self::RequestError { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}

impl From<reqwest::Error> for SearchIndexError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            Self::ParseError(err.to_string())
        } else {
            Self::ConnectionError(err.to_string())
        }
    }
}

impl From<serde_json::Error> for SearchIndexError {
    fn from(err: serde_json::Error) -> Self {
        Self::SerializationError(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        assert!(SearchIndexError::connection("refused").is_transient());
        assert!(SearchIndexError::request(503, "unavailable", "down").is_transient());
        assert!(SearchIndexError::request(429, "too_many_requests", "slow down").is_transient());
        assert!(!SearchIndexError::request(400, "invalid_document_id", "bad id").is_transient());
        assert!(!SearchIndexError::index_not_found("articles").is_transient());
        assert!(!SearchIndexError::validation("bad uid").is_transient());
    }

    #[test]
    fn test_request_error_display() {
        let err = SearchIndexError::request(400, "invalid_document_id", "bad id");
        assert_eq!(
            err.to_string(),
            "Request failed with status 400 (invalid_document_id): bad id"
        );
    }
}
