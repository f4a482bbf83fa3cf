//! Meilisearch provider implementation.
//!
//! This module provides the concrete implementation of `SearchIndexProvider`
//! on top of `reqwest`.

use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use search_sync_shared::{AsyncIndexTask, IndexDocument, IndexSettings, TaskUid};
use serde::de::DeserializeOwned;
use serde_json::json;
use tracing::{debug, error, info};
use url::Url;

use crate::config::MeilisearchConfig;
use crate::errors::SearchIndexError;
use crate::interfaces::SearchIndexProvider;
use crate::meilisearch::responses::{error_from_body, IndexView, TaskSummary, TaskView};
use crate::types::IndexInfo;
use crate::utils::validate_index_uid;

/// Meilisearch provider implementation.
///
/// # Example
///
/// ```ignore
/// use search_sync_repository::{MeilisearchConfig, MeilisearchProvider, SearchIndexProvider};
///
/// let config = MeilisearchConfig::new("http://localhost:7700").with_api_key("masterKey");
/// let provider = MeilisearchProvider::new(&config)?;
///
/// let task = provider.delete_documents("articles", &[42]).await?;
/// let status = provider.get_task(task.task_uid).await?;
/// ```
pub struct MeilisearchProvider {
    client: Client,
    base_url: Url,
    api_key: Option<String>,
}

impl MeilisearchProvider {
    /// Create a new provider for the configured server.
    ///
    /// No request is made; use [`MeilisearchProvider::health`] to check
    /// reachability.
    ///
    /// # Returns
    ///
    /// * `Ok(MeilisearchProvider)` - A new provider instance
    /// * `Err(SearchIndexError)` - If the URL is invalid or the HTTP client cannot be built
    pub fn new(config: &MeilisearchConfig) -> Result<Self, SearchIndexError> {
        let mut base_url =
            Url::parse(&config.url).map_err(|e| SearchIndexError::connection(e.to_string()))?;

        // Url::join replaces the last path segment unless the base ends with '/'.
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        let client = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| SearchIndexError::connection(e.to_string()))?;

        info!(
            url = %base_url,
            authenticated = config.api_key.is_some(),
            "Created Meilisearch provider"
        );

        Ok(Self {
            client,
            base_url,
            api_key: config.api_key.clone(),
        })
    }

    /// Check that the server is up and ready to accept requests.
    pub async fn health(&self) -> Result<(), SearchIndexError> {
        let response = self.request(Method::GET, "health")?.send().await?;
        if !response.status().is_success() {
            return Err(Self::error_from_response(response).await);
        }
        Ok(())
    }

    /// Resolve a path relative to the server's base URL.
    fn endpoint(&self, path: &str) -> Result<Url, SearchIndexError> {
        self.base_url
            .join(path)
            .map_err(|e| SearchIndexError::validation(format!("Invalid path '{}': {}", path, e)))
    }

    /// Start a request with authentication applied.
    fn request(&self, method: Method, path: &str) -> Result<RequestBuilder, SearchIndexError> {
        let url = self.endpoint(path)?;
        let builder = self.client.request(method, url);
        Ok(match &self.api_key {
            Some(key) => builder.bearer_auth(key),
            None => builder,
        })
    }

    async fn error_from_response(response: Response) -> SearchIndexError {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        error!(status = %status, body = %body, "Meilisearch request failed");
        error_from_body(status.as_u16(), &body)
    }

    /// Send a mutation and decode the enqueued task from the `202` answer.
    async fn send_task(&self, builder: RequestBuilder) -> Result<AsyncIndexTask, SearchIndexError> {
        let response = builder.send().await?;
        if !response.status().is_success() {
            return Err(Self::error_from_response(response).await);
        }
        let summary: TaskSummary = response.json().await?;
        debug!(
            task_uid = summary.task_uid,
            index_uid = ?summary.index_uid,
            "Task enqueued"
        );
        Ok(summary.into())
    }

    /// Send a read and decode its body; `None` on `404`.
    async fn send_lookup<T: DeserializeOwned>(
        &self,
        builder: RequestBuilder,
    ) -> Result<Option<T>, SearchIndexError> {
        let response = builder.send().await?;
        match response.status() {
            status if status.is_success() => Ok(Some(response.json().await?)),
            StatusCode::NOT_FOUND => {
                let body = response.text().await.unwrap_or_default();
                match error_from_body(StatusCode::NOT_FOUND.as_u16(), &body) {
                    // A missing index is an error even for lookups inside it.
                    err @ SearchIndexError::IndexNotFound(_) => Err(err),
                    _ => Ok(None),
                }
            }
            _ => Err(Self::error_from_response(response).await),
        }
    }
}

#[async_trait]
impl SearchIndexProvider for MeilisearchProvider {
    async fn get_index(&self, uid: &str) -> Result<Option<IndexInfo>, SearchIndexError> {
        validate_index_uid(uid)?;

        let response = self
            .request(Method::GET, &format!("indexes/{}", uid))?
            .send()
            .await?;

        match response.status() {
            status if status.is_success() => {
                let view: IndexView = response.json().await?;
                Ok(Some(view.into()))
            }
            StatusCode::NOT_FOUND => Ok(None),
            _ => Err(Self::error_from_response(response).await),
        }
    }

    async fn create_index(
        &self,
        uid: &str,
        primary_key: &str,
    ) -> Result<AsyncIndexTask, SearchIndexError> {
        validate_index_uid(uid)?;

        let builder = self
            .request(Method::POST, "indexes")?
            .json(&json!({ "uid": uid, "primaryKey": primary_key }));
        self.send_task(builder).await
    }

    async fn delete_index(&self, uid: &str) -> Result<AsyncIndexTask, SearchIndexError> {
        validate_index_uid(uid)?;

        let builder = self.request(Method::DELETE, &format!("indexes/{}", uid))?;
        self.send_task(builder).await
    }

    async fn get_settings(&self, uid: &str) -> Result<IndexSettings, SearchIndexError> {
        validate_index_uid(uid)?;

        let builder = self.request(Method::GET, &format!("indexes/{}/settings", uid))?;
        self.send_lookup(builder)
            .await?
            .ok_or_else(|| SearchIndexError::index_not_found(uid))
    }

    async fn update_settings(
        &self,
        uid: &str,
        settings: &IndexSettings,
    ) -> Result<AsyncIndexTask, SearchIndexError> {
        validate_index_uid(uid)?;

        let builder = self
            .request(Method::PATCH, &format!("indexes/{}/settings", uid))?
            .json(settings);
        self.send_task(builder).await
    }

    async fn add_documents(
        &self,
        uid: &str,
        primary_key: &str,
        documents: &[IndexDocument],
    ) -> Result<AsyncIndexTask, SearchIndexError> {
        validate_index_uid(uid)?;

        let body = serde_json::to_vec(documents)?;
        let builder = self
            .request(Method::POST, &format!("indexes/{}/documents", uid))?
            .query(&[("primaryKey", primary_key)])
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(body);
        self.send_task(builder).await
    }

    async fn delete_documents(
        &self,
        uid: &str,
        ids: &[i64],
    ) -> Result<AsyncIndexTask, SearchIndexError> {
        validate_index_uid(uid)?;

        let builder = self
            .request(Method::POST, &format!("indexes/{}/documents/delete-batch", uid))?
            .json(ids);
        self.send_task(builder).await
    }

    async fn get_document(
        &self,
        uid: &str,
        id: i64,
    ) -> Result<Option<IndexDocument>, SearchIndexError> {
        validate_index_uid(uid)?;

        let builder = self.request(Method::GET, &format!("indexes/{}/documents/{}", uid, id))?;
        self.send_lookup(builder).await
    }

    async fn get_task(&self, task_uid: TaskUid) -> Result<AsyncIndexTask, SearchIndexError> {
        let builder = self.request(Method::GET, &format!("tasks/{}", task_uid))?;
        let view: TaskView = self
            .send_lookup(builder)
            .await?
            .ok_or(SearchIndexError::TaskNotFound(task_uid))?;
        Ok(view.into())
    }

    async fn swap_indexes(
        &self,
        first: &str,
        second: &str,
    ) -> Result<AsyncIndexTask, SearchIndexError> {
        validate_index_uid(first)?;
        validate_index_uid(second)?;

        let builder = self
            .request(Method::POST, "swap-indexes")?
            .json(&json!([{ "indexes": [first, second] }]));
        self.send_task(builder).await
    }
}
