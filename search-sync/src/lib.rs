//! # Search Sync
//!
//! Keeps the search indexes of the entity types (articles, images, models)
//! consistent with the relational store, which stays the source of truth.
//!
//! ## Architecture
//!
//! Each entity type is synced by a pass that moves through a fixed sequence of
//! phases (see [`orchestrator`]):
//!
//! 1. **Setup**: the live index and its settings exist, plus a fresh shadow
//!    index for a full rebuild
//! 2. **Cleanup**: ledgered deletions are applied to the live index
//! 3. **SyncLoop**: candidate rows are paged from the store, flattened into
//!    documents, written in sub-batches and waited on
//! 4. **Swap**: the shadow index replaces the live one (full rebuild only)
//! 5. **CommitWatermark**: the watermark advances and consumed dirty rows go
//!
//! ## Modules
//!
//! - [`config`]: Configuration and dependency initialization
//! - [`reader`]: Pages eligible entities out of the store
//! - [`drain`]: Snapshots and consumes the dirty queue
//! - [`transformer`]: Flattens entities into schema-checked documents
//! - [`writer`]: Submits documents and deletions in sub-batches
//! - [`waiter`]: Polls index tasks with bounded backoff
//! - [`lifecycle`]: Index creation, settings and shadow swaps
//! - [`cleanup`]: Applies the pending-deletion ledger
//! - [`orchestrator`]: Runs and schedules sync passes
//! - [`errors`]: Error types for the engine

pub mod cleanup;
pub mod config;
pub mod drain;
pub mod errors;
pub mod lifecycle;
pub mod orchestrator;
pub mod reader;
pub mod transformer;
pub mod waiter;
pub mod writer;

pub use config::{Dependencies, SyncConfig};
pub use errors::{PassError, SyncError};
pub use orchestrator::{OrchestratorConfig, Scheduler, SyncOrchestrator, SyncPhase, SyncReport};
pub use waiter::BackoffPolicy;

use thiserror::Error;

/// Errors that stop the service as a whole.
#[derive(Error, Debug)]
pub enum ServiceError {
    /// Configuration or startup wiring error.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Passes of a run-once invocation failed.
    #[error("{failed} of {total} sync passes failed")]
    PassesFailed { failed: usize, total: usize },
}

impl ServiceError {
    /// Create a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }
}
