//! Interface definitions for the sync engine's collaborators.
//!
//! The traits here allow dependency injection: the engine is constructed with
//! `Arc<dyn SearchIndexProvider>` and `Arc<dyn SyncStore>` handles, so tests can
//! swap in the in-memory implementations from [`crate::mock`].

mod search_index_provider;
mod sync_store;

pub use search_index_provider::SearchIndexProvider;
pub use sync_store::SyncStore;
