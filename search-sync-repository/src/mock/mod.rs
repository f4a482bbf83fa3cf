//! In-memory implementations of the repository interfaces for testing and
//! local development.

mod search_index;
mod sync_store;

pub use search_index::MockSearchIndex;
pub use sync_store::{FetchCall, MockSyncStore};
