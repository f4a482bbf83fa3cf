//! Orchestrator module for the search sync engine.
//!
//! Runs one sync pass per entity type through a fixed sequence of phases:
//!
//! ```text
//! Setup ─▶ Cleanup ─▶ SyncLoop ─▶ (Swap) ─▶ CommitWatermark ─▶ Done
//! ```
//!
//! Any phase may fail; a failed pass leaves the watermark and the dirty queue
//! exactly as it found them, so re-running it repeats the same work.
//!
//! At the start of `SyncLoop` the store clock is read once. That instant
//! bounds the dirty-queue snapshot, becomes the new watermark on success, and
//! bounds which dirty rows are deleted at commit. Anything enqueued or updated
//! after it is left for the next pass.

mod scheduler;

pub use scheduler::{summarize, Scheduler};

use std::collections::HashSet;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, Utc};
use futures::future::join_all;
use tracing::{debug, error, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::cleanup::CleanupCoordinator;
use crate::drain::QueueDrain;
use crate::errors::{PassError, SyncError};
use crate::lifecycle::IndexManager;
use crate::reader::{BatchReader, DEFAULT_READ_BATCH_SIZE};
use crate::transformer::RecordTransformer;
use crate::waiter::{BackoffPolicy, TaskWaiter, DEFAULT_TASK_MAX_RETRIES};
use crate::writer::{DocumentWriter, DEFAULT_DOCUMENT_BATCH_SIZE};
use search_sync_repository::{SearchIndexProvider, SyncStore};
use search_sync_shared::{EntityDefinition, EntityType, IndexDocument, SyncMode, SyncWatermark};

/// Phase a pass is in. A failed pass reports the phase it failed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncPhase {
    /// Ensure the live index, its schema and (full rebuild) a fresh shadow.
    Setup,
    /// Apply the pending-deletion ledger to the live index.
    Cleanup,
    /// Read, transform, write and wait, page by page.
    SyncLoop,
    /// Promote the shadow index (full rebuild only).
    Swap,
    /// Persist the watermark and drop the consumed dirty rows.
    CommitWatermark,
    Done,
}

impl fmt::Display for SyncPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SyncPhase::Setup => "setup",
            SyncPhase::Cleanup => "cleanup",
            SyncPhase::SyncLoop => "sync",
            SyncPhase::Swap => "swap",
            SyncPhase::CommitWatermark => "commit",
            SyncPhase::Done => "done",
        };
        f.write_str(name)
    }
}

/// Configuration for the orchestrator.
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Entities per store page.
    pub read_batch_size: usize,
    /// Documents per index submission.
    pub document_batch_size: usize,
    /// Backoff rounds per task wait.
    pub task_max_retries: usize,
    pub backoff: BackoffPolicy,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            read_batch_size: DEFAULT_READ_BATCH_SIZE,
            document_batch_size: DEFAULT_DOCUMENT_BATCH_SIZE,
            task_max_retries: DEFAULT_TASK_MAX_RETRIES,
            backoff: BackoffPolicy::default(),
        }
    }
}

/// Outcome of a successful pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncReport {
    pub entity_type: EntityType,
    pub mode: SyncMode,
    pub documents_indexed: usize,
    pub documents_deleted: usize,
    /// Non-empty pages read.
    pub pages: usize,
    /// Watermark committed by the pass.
    pub watermark: DateTime<Utc>,
}

/// Where a pass has got to, for error reporting.
#[derive(Debug, Clone, Copy)]
struct Progress {
    phase: SyncPhase,
    offset: usize,
}

/// Marks an entity type as running until dropped.
struct RunningGuard<'a> {
    running: &'a Mutex<HashSet<EntityType>>,
    entity_type: EntityType,
}

impl<'a> RunningGuard<'a> {
    fn acquire(running: &'a Mutex<HashSet<EntityType>>, entity_type: EntityType) -> Option<Self> {
        let inserted = running
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(entity_type);
        inserted.then_some(Self {
            running,
            entity_type,
        })
    }
}

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        self.running
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.entity_type);
    }
}

/// Drives sync passes for every entity type.
///
/// Passes for different entity types share nothing but the injected client
/// handles and may run concurrently. Within one pass pages are processed
/// strictly in sequence. A second pass for an entity type that is already
/// running in this process is rejected with [`SyncError::AlreadyRunning`].
pub struct SyncOrchestrator {
    store: Arc<dyn SyncStore>,
    reader: BatchReader,
    drain: QueueDrain,
    writer: DocumentWriter,
    waiter: TaskWaiter,
    indexes: IndexManager,
    cleanup: CleanupCoordinator,
    running: Mutex<HashSet<EntityType>>,
}

impl SyncOrchestrator {
    pub fn new(
        store: Arc<dyn SyncStore>,
        provider: Arc<dyn SearchIndexProvider>,
        config: OrchestratorConfig,
    ) -> Self {
        let waiter = TaskWaiter::new(provider.clone(), config.task_max_retries, config.backoff);
        let writer = DocumentWriter::new(provider.clone(), config.document_batch_size);

        Self {
            reader: BatchReader::new(store.clone(), config.read_batch_size),
            drain: QueueDrain::new(store.clone()),
            indexes: IndexManager::new(provider, waiter.clone()),
            cleanup: CleanupCoordinator::new(store.clone(), writer.clone(), waiter.clone()),
            writer,
            waiter,
            store,
            running: Mutex::new(HashSet::new()),
        }
    }

    /// Run one pass for `entity_type`.
    ///
    /// # Returns
    ///
    /// * `Ok(SyncReport)` - The pass committed its watermark
    /// * `Err(PassError)` - The pass stopped; nothing was committed
    pub async fn run(&self, entity_type: EntityType, mode: SyncMode) -> Result<SyncReport, PassError> {
        let mut progress = Progress {
            phase: SyncPhase::Setup,
            offset: 0,
        };

        let Some(_guard) = RunningGuard::acquire(&self.running, entity_type) else {
            return Err(PassError {
                entity_type,
                phase: progress.phase,
                offset: progress.offset,
                source: SyncError::AlreadyRunning(entity_type),
            });
        };

        let span = info_span!(
            "sync_pass",
            run_id = %Uuid::new_v4(),
            entity_type = %entity_type,
            mode = %mode
        );

        async {
            match self.pass(entity_type, mode, &mut progress).await {
                Ok(report) => {
                    info!(
                        documents_indexed = report.documents_indexed,
                        documents_deleted = report.documents_deleted,
                        pages = report.pages,
                        watermark = %report.watermark,
                        "Sync pass complete"
                    );
                    Ok(report)
                }
                Err(source) => {
                    error!(
                        phase = %progress.phase,
                        offset = progress.offset,
                        retryable = source.is_retryable(),
                        error = %source,
                        "Sync pass failed"
                    );
                    Err(PassError {
                        entity_type,
                        phase: progress.phase,
                        offset: progress.offset,
                        source,
                    })
                }
            }
        }
        .instrument(span)
        .await
    }

    /// Run one pass per entity type, concurrently.
    ///
    /// Results are returned in the order of `entity_types`; a failure of one
    /// type has no effect on the others.
    pub async fn run_all(
        &self,
        entity_types: &[EntityType],
        mode: SyncMode,
    ) -> Vec<Result<SyncReport, PassError>> {
        join_all(
            entity_types
                .iter()
                .map(|entity_type| self.run(*entity_type, mode)),
        )
        .await
    }

    async fn pass(
        &self,
        entity_type: EntityType,
        mode: SyncMode,
        progress: &mut Progress,
    ) -> Result<SyncReport, SyncError> {
        let definition = EntityDefinition::of(entity_type);
        let transformer = RecordTransformer::new(definition);
        info!("Starting sync pass");

        // Setup
        let live = self
            .indexes
            .ensure_index(definition.index_name(), definition.primary_key)
            .await?;
        self.indexes.ensure_schema(&live, &definition.settings()).await?;
        let shadow = if mode.is_full_rebuild() {
            Some(self.indexes.prepare_shadow(definition).await?)
        } else {
            None
        };

        progress.phase = SyncPhase::Cleanup;
        let documents_deleted = self.cleanup.cleanup_deleted(entity_type).await?;

        progress.phase = SyncPhase::SyncLoop;
        let started_at = self.store.now().await?;
        let snapshot = self.drain.snapshot(entity_type, started_at).await?;
        let since = if mode.is_full_rebuild() {
            None
        } else {
            self.store
                .get_watermark(entity_type)
                .await?
                .map(|watermark| watermark.last_updated_at)
        };
        let filter = self.drain.filter(&snapshot, since);
        let target = shadow.as_ref().unwrap_or(&live);
        info!(
            target_index = %target.uid,
            since = ?since,
            dirty = snapshot.ids.len(),
            started_at = %started_at,
            "Syncing documents"
        );

        let mut pages = 0;
        let mut documents_indexed = 0;
        loop {
            let page = self.reader.fetch(entity_type, &filter, progress.offset).await?;
            if page.is_empty() {
                break;
            }

            let documents = transformer.transform_batch(&page)?;
            let ids: Vec<i64> = documents.iter().map(IndexDocument::id).collect();
            let tasks = self
                .writer
                .submit(&target.uid, &target.primary_key, &documents)
                .await
                .map_err(|e| {
                    if !e.submitted.is_empty() {
                        warn!(
                            index_uid = %e.index_uid,
                            accepted_tasks = ?e.submitted_uids(),
                            failed_ids = ?e.batch_ids,
                            "Submission failed after earlier batches were accepted"
                        );
                    }
                    SyncError::from(e)
                })?;
            self.waiter.wait(&tasks).await.map_err(|e| {
                SyncError::from_wait(e, |task_uid| self.writer.batch_ids(&tasks, task_uid, &ids))
            })?;

            pages += 1;
            documents_indexed += documents.len();
            progress.offset += page.len();
            debug!(offset = progress.offset, page_len = page.len(), "Page indexed");
        }

        if let Some(shadow) = &shadow {
            progress.phase = SyncPhase::Swap;
            self.indexes.swap(&live, shadow).await?;
        }

        progress.phase = SyncPhase::CommitWatermark;
        self.store
            .set_watermark(&SyncWatermark {
                entity_type,
                last_updated_at: started_at,
            })
            .await?;
        let consumed = self.drain.consume(&snapshot).await?;
        debug!(consumed, "Removed consumed dirty rows");

        progress.phase = SyncPhase::Done;
        Ok(SyncReport {
            entity_type,
            mode,
            documents_indexed,
            documents_deleted,
            pages,
            watermark: started_at,
        })
    }
}
