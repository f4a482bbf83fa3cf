//! Periodic pass scheduler.
//!
//! Runs a round of passes over the configured entity types on a fixed
//! interval until shutdown is requested. Shutdown is only observed between
//! rounds: a running round always completes, so no pass is interrupted
//! between writing documents and committing its watermark.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::{interval, MissedTickBehavior};
use tracing::{error, info, warn};

use super::{SyncOrchestrator, SyncReport};
use crate::errors::PassError;
use search_sync_shared::{EntityType, SyncMode};

pub struct Scheduler {
    orchestrator: Arc<SyncOrchestrator>,
    entity_types: Vec<EntityType>,
    mode: SyncMode,
    period: Duration,
}

impl Scheduler {
    pub fn new(
        orchestrator: Arc<SyncOrchestrator>,
        entity_types: Vec<EntityType>,
        mode: SyncMode,
        period: Duration,
    ) -> Self {
        Self {
            orchestrator,
            entity_types,
            mode,
            period,
        }
    }

    /// Run rounds until `ctrl-c`.
    pub async fn run(&self) -> usize {
        self.run_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!(error = %e, "Failed to listen for shutdown signal");
                std::future::pending::<()>().await;
            }
        })
        .await
    }

    /// Run rounds until `shutdown` resolves. Returns the number of rounds run.
    ///
    /// The first round starts immediately. A round that overruns the period
    /// delays the next one instead of triggering a burst.
    pub async fn run_until<F>(&self, shutdown: F) -> usize
    where
        F: Future<Output = ()>,
    {
        let mut ticker = interval(self.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        tokio::pin!(shutdown);

        info!(
            period_secs = self.period.as_secs(),
            entity_types = ?self.entity_types,
            mode = %self.mode,
            "Starting sync scheduler"
        );

        let mut rounds = 0;
        loop {
            tokio::select! {
                biased;
                _ = &mut shutdown => {
                    info!("Received shutdown signal");
                    break;
                }
                _ = ticker.tick() => {
                    let results = self.orchestrator.run_all(&self.entity_types, self.mode).await;
                    rounds += 1;
                    summarize(&results);
                }
            }
        }

        info!(rounds, "Sync scheduler stopped");
        rounds
    }
}

/// Log the outcome of a round. Returns the number of failed passes.
pub fn summarize(results: &[Result<SyncReport, PassError>]) -> usize {
    let mut failed = 0;
    for result in results {
        match result {
            Ok(report) => info!(
                entity_type = %report.entity_type,
                documents_indexed = report.documents_indexed,
                documents_deleted = report.documents_deleted,
                "Pass succeeded"
            ),
            Err(e) => {
                failed += 1;
                error!(
                    entity_type = %e.entity_type,
                    retryable = e.is_retryable(),
                    error = %e,
                    "Pass failed"
                );
            }
        }
    }
    failed
}
