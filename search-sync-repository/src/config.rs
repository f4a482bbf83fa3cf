//! Configuration types for the index service client.

use std::time::Duration;

/// Default Meilisearch URL.
pub const DEFAULT_MEILISEARCH_URL: &str = "http://localhost:7700";

/// Connection settings for [`crate::MeilisearchProvider`].
#[derive(Debug, Clone)]
pub struct MeilisearchConfig {
    /// Base URL of the Meilisearch server.
    pub url: String,
    /// API key sent as a bearer token. `None` for unsecured instances.
    pub api_key: Option<String>,
    /// Timeout of a single HTTP request.
    pub request_timeout: Duration,
}

impl Default for MeilisearchConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_MEILISEARCH_URL.to_string(),
            api_key: None,
            request_timeout: Duration::from_secs(30),
        }
    }
}

impl MeilisearchConfig {
    /// Create a config for the given URL with no API key.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Self::default()
        }
    }

    /// Set the API key.
    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }
}
