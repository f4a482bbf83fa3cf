//! Search Sync Main Entry Point
//!
//! Syncs the configured entity types from PostgreSQL into Meilisearch, either
//! once or on a fixed interval until interrupted.

use dotenv::dotenv;
use search_sync::orchestrator::summarize;
use search_sync::{Dependencies, Scheduler, ServiceError};
use std::env;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Initialize tracing/logging.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("search_sync=info,search_sync_repository=info"));

    let json = env::var("LOG_FORMAT")
        .map(|format| format.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_target(true)
                    .with_thread_ids(true),
            )
            .init();

        info!(
            service_name = "search-sync",
            service_version = env!("CARGO_PKG_VERSION"),
            "Tracing initialized with JSON format"
        );
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().with_target(true).pretty())
            .init();

        info!(
            service_name = "search-sync",
            service_version = env!("CARGO_PKG_VERSION"),
            "Tracing initialized with console output"
        );
    }
}

#[tokio::main]
async fn main() -> Result<(), ServiceError> {
    // Load environment variables from .env file
    dotenv().ok();

    init_tracing();

    info!("Starting search sync");

    let deps = match Dependencies::new().await {
        Ok(deps) => {
            info!("Dependencies initialized successfully");
            deps
        }
        Err(e) => {
            error!(error = %e, "Failed to initialize dependencies");
            return Err(e);
        }
    };

    let config = &deps.config;
    match config.interval {
        Some(period) => {
            let scheduler = Scheduler::new(
                deps.orchestrator.clone(),
                config.entity_types.clone(),
                config.mode,
                period,
            );
            scheduler.run().await;
            info!("Search sync stopped");
            Ok(())
        }
        None => {
            let results = deps
                .orchestrator
                .run_all(&config.entity_types, config.mode)
                .await;
            let failed = summarize(&results);
            if failed > 0 {
                let err = ServiceError::PassesFailed {
                    failed,
                    total: results.len(),
                };
                error!(error = %err, "Search sync failed");
                return Err(err);
            }
            info!("Search sync completed successfully");
            Ok(())
        }
    }
}
