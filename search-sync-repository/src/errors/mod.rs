//! Error types for the search sync repository.
//!
//! One error type per collaborator: [`SearchIndexError`] for the index service
//! and [`StoreError`] for the relational store.

mod search_index_error;
mod store_error;

pub use search_index_error::SearchIndexError;
pub use store_error::StoreError;
