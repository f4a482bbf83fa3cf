//! PostgreSQL implementation of the sync store.

mod sources;
mod sync_store;

pub use sync_store::PostgresSyncStore;
