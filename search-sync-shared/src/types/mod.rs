//! This module defines the core data structures used across the sync engine.
//! It re-exports the entity, document, schema, queue and task types.

pub mod entity;
pub mod entity_type;
pub mod index_document;
pub mod queue;
pub mod schema;
pub mod task;

pub use entity::{IndexableEntity, MetricsRow, TagRow, ALL_TIME_TIMEFRAME};
pub use entity_type::{EntityType, ParseEntityTypeError, SyncMode};
pub use index_document::IndexDocument;
pub use queue::{DirtyQueueEntry, PendingDeletionEntry, SyncWatermark};
pub use schema::{DocumentSchema, FieldSource, FieldSpec, FieldType, IndexSettings};
pub use task::{AsyncIndexTask, TaskStatus, TaskUid};
