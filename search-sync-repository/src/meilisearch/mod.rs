//! Meilisearch implementation of the search index provider.
//!
//! This module provides a concrete implementation of `SearchIndexProvider`
//! over the Meilisearch REST API.

mod provider;
mod responses;

pub use provider::MeilisearchProvider;
