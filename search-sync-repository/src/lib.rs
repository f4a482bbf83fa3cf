//! # Search Sync Repository
//!
//! This crate provides the interfaces the sync engine uses to talk to its two
//! external collaborators, plus concrete implementations:
//!
//! - [`SearchIndexProvider`]: the index service. Implemented for Meilisearch
//!   by [`MeilisearchProvider`].
//! - [`SyncStore`]: the relational source of truth, including the dirty
//!   queue, the pending-deletion ledger and the watermarks. Implemented for
//!   PostgreSQL by [`PostgresSyncStore`].
//!
//! The [`mock`] module holds in-memory implementations of both for tests and
//! local development.

pub mod config;
pub mod errors;
pub mod interfaces;
pub mod meilisearch;
pub mod mock;
pub mod postgres;
pub mod types;
pub mod utils;

pub use config::MeilisearchConfig;
pub use errors::{SearchIndexError, StoreError};
pub use interfaces::{SearchIndexProvider, SyncStore};
pub use meilisearch::MeilisearchProvider;
pub use mock::{FetchCall, MockSearchIndex, MockSyncStore};
pub use postgres::PostgresSyncStore;
pub use types::{FetchFilter, IndexInfo};
pub use utils::validate_index_uid;
