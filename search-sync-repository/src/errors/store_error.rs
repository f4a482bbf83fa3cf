//! Relational store error types.

use thiserror::Error;

/// Errors from relational store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The database rejected or failed a query.
    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),

    /// A row could not be decoded into the expected shape.
    #[error("Decode error: {0}")]
    DecodeError(String),

    /// Failure injected by an in-memory store.
    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

impl StoreError {
    /// Create a decode error.
    pub fn decode(msg: impl Into<String>) -> Self {
        Self::DecodeError(msg.into())
    }

    /// Create an unavailable error.
    pub fn unavailable(msg: impl Into<String>) -> Self {
        Self::Unavailable(msg.into())
    }
}
