//! Dependency initialization and wiring for the sync engine.

use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{info, warn};

use super::settings::{ConnectionMode, SyncConfig};
use crate::orchestrator::SyncOrchestrator;
use crate::ServiceError;
use search_sync_repository::{MeilisearchConfig, MeilisearchProvider, PostgresSyncStore};

/// Container for all initialized dependencies.
pub struct Dependencies {
    /// The configured orchestrator ready to run.
    pub orchestrator: Arc<SyncOrchestrator>,
    pub config: SyncConfig,
}

impl Dependencies {
    /// Initialize all dependencies from environment variables.
    ///
    /// See [`SyncConfig::from_env`] for the variables read.
    ///
    /// # Returns
    ///
    /// * `Ok(Dependencies)` - Initialized dependencies
    /// * `Err(ServiceError)` - If configuration is invalid, the database is
    ///   unreachable, or the index service is unreachable in fail-fast mode
    pub async fn new() -> Result<Self, ServiceError> {
        Self::from_config(SyncConfig::from_env()?).await
    }

    pub async fn from_config(config: SyncConfig) -> Result<Self, ServiceError> {
        info!(
            meilisearch_url = %config.meilisearch.url,
            connection_mode = ?config.connection_mode,
            retry_interval_secs = config.retry_interval.as_secs(),
            mode = %config.mode,
            entity_types = ?config.entity_types,
            "Initializing dependencies"
        );

        let store = PostgresSyncStore::connect(&config.database_url, config.database_max_connections)
            .await
            .map_err(|e| ServiceError::config(format!("Failed to connect to database: {}", e)))?;

        info!("Database connection established");

        // Initialize Meilisearch provider with retry logic
        let provider = Self::connect_to_meilisearch(
            &config.meilisearch,
            config.connection_mode,
            config.retry_interval,
        )
        .await?;

        info!("Meilisearch connection established");

        let orchestrator = SyncOrchestrator::new(
            Arc::new(store),
            Arc::new(provider),
            config.orchestrator.clone(),
        );

        Ok(Self {
            orchestrator: Arc::new(orchestrator),
            config,
        })
    }

    /// Connect to Meilisearch with retry logic based on connection mode.
    async fn connect_to_meilisearch(
        meilisearch: &MeilisearchConfig,
        mode: ConnectionMode,
        retry_interval: Duration,
    ) -> Result<MeilisearchProvider, ServiceError> {
        loop {
            match Self::try_connect_meilisearch(meilisearch).await {
                Ok(provider) => return Ok(provider),
                Err(e) => match mode {
                    ConnectionMode::FailFast => {
                        return Err(ServiceError::config(format!(
                            "Failed to connect to Meilisearch: {}",
                            e
                        )));
                    }
                    ConnectionMode::Retry => {
                        warn!(
                            meilisearch_url = %meilisearch.url,
                            error = %e,
                            retry_interval_secs = retry_interval.as_secs(),
                            "Failed to connect to Meilisearch, retrying..."
                        );
                        sleep(retry_interval).await;
                    }
                },
            }
        }
    }

    /// Attempt to connect to Meilisearch and check that it is healthy.
    async fn try_connect_meilisearch(
        meilisearch: &MeilisearchConfig,
    ) -> Result<MeilisearchProvider, ServiceError> {
        let provider = MeilisearchProvider::new(meilisearch).map_err(|e| {
            ServiceError::config(format!("Failed to create Meilisearch provider: {}", e))
        })?;
        provider
            .health()
            .await
            .map_err(|e| ServiceError::config(format!("Meilisearch is not healthy: {}", e)))?;

        Ok(provider)
    }
}
