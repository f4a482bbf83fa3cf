//! # Search Sync Shared
//!
//! This crate defines the data structures shared across the search index sync
//! engine: the entity catalogue (which entity types exist, which index each one
//! lives in, and the document schema it is flattened into), the relational
//! rows read from the store, and the documents and tasks exchanged with the
//! index service.

pub mod catalog;
pub mod types;

pub use catalog::EntityDefinition;
pub use types::{
    AsyncIndexTask, DirtyQueueEntry, DocumentSchema, EntityType, FieldSource, FieldSpec,
    FieldType, IndexDocument, IndexSettings, IndexableEntity, MetricsRow, ParseEntityTypeError,
    PendingDeletionEntry, SyncMode, SyncWatermark, TagRow, TaskStatus, TaskUid,
};
