//! Batch reader.
//!
//! Pages through the eligible entities of one type in id order. Read-only.

use std::sync::Arc;

use tracing::{debug, instrument};

use search_sync_repository::{FetchFilter, StoreError, SyncStore};
use search_sync_shared::{EntityType, IndexableEntity};

/// Default number of entities per page.
pub const DEFAULT_READ_BATCH_SIZE: usize = 1000;

/// Reader of fixed-size entity pages.
#[derive(Clone)]
pub struct BatchReader {
    store: Arc<dyn SyncStore>,
    page_size: usize,
}

impl BatchReader {
    /// Create a reader. A page size of zero is raised to one.
    pub fn new(store: Arc<dyn SyncStore>, page_size: usize) -> Self {
        Self {
            store,
            page_size: page_size.max(1),
        }
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    /// Fetch the page starting at `offset`.
    ///
    /// An empty page means the scan is exhausted.
    #[instrument(skip(self, filter), fields(entity_type = %entity_type, full_scan = filter.is_full_scan()))]
    pub async fn fetch(
        &self,
        entity_type: EntityType,
        filter: &FetchFilter,
        offset: usize,
    ) -> Result<Vec<IndexableEntity>, StoreError> {
        let page = self
            .store
            .fetch_entities(entity_type, filter, offset as i64, self.page_size as i64)
            .await?;

        debug!(offset, count = page.len(), "Read entity page");
        Ok(page)
    }
}
