//! Runtime settings read from the environment.

use std::env;
use std::fmt::Display;
use std::str::FromStr;
use std::time::Duration;

use tracing::warn;

use crate::orchestrator::OrchestratorConfig;
use crate::reader::DEFAULT_READ_BATCH_SIZE;
use crate::waiter::{BackoffPolicy, DEFAULT_TASK_BACKOFF, DEFAULT_TASK_MAX_RETRIES};
use crate::writer::DEFAULT_DOCUMENT_BATCH_SIZE;
use crate::ServiceError;
use search_sync_repository::config::DEFAULT_MEILISEARCH_URL;
use search_sync_repository::MeilisearchConfig;
use search_sync_shared::{EntityType, SyncMode};

/// Default size of the database connection pool.
const DEFAULT_DATABASE_MAX_CONNECTIONS: u32 = 10;

/// Default connection retry interval in seconds.
const DEFAULT_RETRY_INTERVAL_SECS: u64 = 15;

/// Default cap of the exponential task backoff, in milliseconds.
const DEFAULT_TASK_BACKOFF_MAX_MS: u64 = 10_000;

/// Connection mode for the index service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionMode {
    /// Fail immediately if connection fails.
    FailFast,
    /// Retry the connection at a fixed interval until it succeeds.
    Retry,
}

impl ConnectionMode {
    /// Parse a connection mode.
    ///
    /// Valid values: "fail-fast" or "retry" (case-insensitive).
    /// Defaults to "retry" if not set or invalid.
    fn parse(value: Option<String>) -> Self {
        match value
            .unwrap_or_else(|| "retry".to_string())
            .to_lowercase()
            .as_str()
        {
            "fail-fast" | "failfast" | "fail_fast" => Self::FailFast,
            "retry" => Self::Retry,
            other => {
                warn!(value = other, "Invalid MEILISEARCH_CONNECTION_MODE, defaulting to 'retry'");
                Self::Retry
            }
        }
    }
}

/// Everything the binary needs to wire the engine.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    pub database_url: String,
    pub database_max_connections: u32,
    pub meilisearch: MeilisearchConfig,
    pub connection_mode: ConnectionMode,
    pub retry_interval: Duration,
    pub orchestrator: OrchestratorConfig,
    pub mode: SyncMode,
    pub entity_types: Vec<EntityType>,
    /// `None` runs one round and exits.
    pub interval: Option<Duration>,
}

impl SyncConfig {
    /// Read settings from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `DATABASE_URL`: PostgreSQL connection string (required)
    /// - `DATABASE_MAX_CONNECTIONS`: Connection pool size (default: 10)
    /// - `MEILISEARCH_URL`: Meilisearch server URL (default: http://localhost:7700)
    /// - `MEILISEARCH_API_KEY`: API key sent as a bearer token (optional)
    /// - `MEILISEARCH_CONNECTION_MODE`: "fail-fast" or "retry" (default: retry)
    /// - `MEILISEARCH_RETRY_INTERVAL_SECS`: Retry interval in seconds (default: 15)
    /// - `READ_BATCH_SIZE`: Entities per store page (default: 1000)
    /// - `MEILISEARCH_DOCUMENT_BATCH_SIZE`: Documents per submission (default: 25)
    /// - `TASK_MAX_RETRIES`: Backoff rounds per task wait (default: 30)
    /// - `TASK_BACKOFF`: "fixed" or "exponential" (default: fixed)
    /// - `TASK_BACKOFF_MS`: (Initial) backoff delay in milliseconds (default: 500)
    /// - `TASK_BACKOFF_MAX_MS`: Exponential backoff cap in milliseconds (default: 10000)
    /// - `SYNC_MODE`: "incremental" or "full-rebuild" (default: incremental)
    /// - `SYNC_ENTITY_TYPES`: Comma-separated entity types (default: all)
    /// - `SYNC_INTERVAL_SECS`: Seconds between rounds; unset runs once
    ///
    /// # Returns
    ///
    /// * `Ok(SyncConfig)` - Settings, with defaults for anything unset or invalid
    /// * `Err(ServiceError)` - If `DATABASE_URL` is missing
    pub fn from_env() -> Result<Self, ServiceError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Read settings through `lookup` instead of the process environment.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ServiceError> {
        let database_url = lookup("DATABASE_URL")
            .filter(|url| !url.trim().is_empty())
            .ok_or_else(|| ServiceError::config("DATABASE_URL must be set"))?;

        let mut meilisearch = MeilisearchConfig::new(
            lookup("MEILISEARCH_URL").unwrap_or_else(|| DEFAULT_MEILISEARCH_URL.to_string()),
        );
        if let Some(api_key) = lookup("MEILISEARCH_API_KEY").filter(|key| !key.is_empty()) {
            meilisearch = meilisearch.with_api_key(api_key);
        }

        let orchestrator = OrchestratorConfig {
            read_batch_size: parse_or(&lookup, "READ_BATCH_SIZE", DEFAULT_READ_BATCH_SIZE),
            document_batch_size: parse_or(
                &lookup,
                "MEILISEARCH_DOCUMENT_BATCH_SIZE",
                DEFAULT_DOCUMENT_BATCH_SIZE,
            ),
            task_max_retries: parse_or(&lookup, "TASK_MAX_RETRIES", DEFAULT_TASK_MAX_RETRIES),
            backoff: backoff_policy(&lookup),
        };

        Ok(Self {
            database_url,
            database_max_connections: parse_or(
                &lookup,
                "DATABASE_MAX_CONNECTIONS",
                DEFAULT_DATABASE_MAX_CONNECTIONS,
            ),
            meilisearch,
            connection_mode: ConnectionMode::parse(lookup("MEILISEARCH_CONNECTION_MODE")),
            retry_interval: Duration::from_secs(parse_or(
                &lookup,
                "MEILISEARCH_RETRY_INTERVAL_SECS",
                DEFAULT_RETRY_INTERVAL_SECS,
            )),
            orchestrator,
            mode: parse_or(&lookup, "SYNC_MODE", SyncMode::default()),
            entity_types: entity_types(lookup("SYNC_ENTITY_TYPES")),
            interval: lookup("SYNC_INTERVAL_SECS").and_then(|raw| match raw.trim().parse::<u64>() {
                Ok(0) => None,
                Ok(secs) => Some(Duration::from_secs(secs)),
                Err(e) => {
                    warn!(value = %raw, error = %e, "Invalid SYNC_INTERVAL_SECS, running once");
                    None
                }
            }),
        })
    }
}

/// Parse `key`, falling back to `default` (with a warning) when invalid.
fn parse_or<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> T
where
    T: FromStr + Display,
    T::Err: Display,
{
    match lookup(key) {
        None => default,
        Some(raw) => match raw.trim().parse::<T>() {
            Ok(value) => value,
            Err(e) => {
                warn!(key, value = %raw, error = %e, default = %default, "Invalid setting, using default");
                default
            }
        },
    }
}

fn backoff_policy(lookup: &impl Fn(&str) -> Option<String>) -> BackoffPolicy {
    let initial = Duration::from_millis(parse_or(
        lookup,
        "TASK_BACKOFF_MS",
        DEFAULT_TASK_BACKOFF.as_millis() as u64,
    ));

    match lookup("TASK_BACKOFF").map(|raw| raw.trim().to_lowercase()).as_deref() {
        None | Some("fixed") => BackoffPolicy::Fixed(initial),
        Some("exponential") => BackoffPolicy::Exponential {
            initial,
            max: Duration::from_millis(parse_or(
                lookup,
                "TASK_BACKOFF_MAX_MS",
                DEFAULT_TASK_BACKOFF_MAX_MS,
            )),
        },
        Some(other) => {
            warn!(value = other, "Invalid TASK_BACKOFF, defaulting to 'fixed'");
            BackoffPolicy::Fixed(initial)
        }
    }
}

/// Parse a comma-separated entity type list, keeping the first occurrence of
/// each type. Unset, or nothing valid, means every type.
fn entity_types(raw: Option<String>) -> Vec<EntityType> {
    let Some(raw) = raw else {
        return EntityType::ALL.to_vec();
    };

    let mut types = Vec::new();
    for name in raw.split(',').filter(|name| !name.trim().is_empty()) {
        match name.parse::<EntityType>() {
            Ok(entity_type) if !types.contains(&entity_type) => types.push(entity_type),
            Ok(_) => {}
            Err(e) => warn!(error = %e, "Ignoring entry in SYNC_ENTITY_TYPES"),
        }
    }

    if types.is_empty() {
        warn!("SYNC_ENTITY_TYPES names no known entity type, syncing all");
        return EntityType::ALL.to_vec();
    }
    types
}
