//! Resource registry clients
//!
//! Every upstream resource family (source connectors, destination
//! connectors, models, model instances) exposes the same two lookups: by
//! name-form identifier and by permalink. The [`ResourceRegistry`] trait is
//! that narrow capability; [`RegistryClient`] is the HTTP implementation.
//!
//! Identifiers already carry their collection segment
//! (`source-connectors/my-slack`), so one client per backend serves every
//! collection that backend hosts.

use crate::error::{ClientError, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;

/// Default bound on a single registry lookup.
///
/// Scoped per call so one slow registry cannot stall a whole translation
/// beyond this window; the workflow engine's activity timeout is separate.
pub const DEFAULT_LOOKUP_TIMEOUT: Duration = Duration::from_secs(5);

/// A resource as known to its owning registry
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RegistryEntry {
    /// Registry-assigned UID, immutable across renames
    pub uid: String,
    /// Human-assigned id, mutable
    pub id: String,
}

/// Narrow lookup capability exposed by every resource registry
#[async_trait]
pub trait ResourceRegistry: Send + Sync {
    /// Resolves a name-form identifier to the registry's entry.
    async fn get_by_name(&self, name: &str) -> Result<RegistryEntry>;

    /// Resolves a permalink-form identifier to the registry's entry.
    async fn look_up_by_permalink(&self, permalink: &str) -> Result<RegistryEntry>;
}

/// HTTP implementation of [`ResourceRegistry`]
#[derive(Debug, Clone)]
pub struct RegistryClient {
    /// Base URL of the registry backend (e.g., "http://connector-backend:8080")
    base_url: String,
    /// HTTP client instance
    client: Client,
}

impl RegistryClient {
    /// Creates a registry client with the default lookup timeout
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_timeout(base_url, DEFAULT_LOOKUP_TIMEOUT)
    }

    /// Creates a registry client with a custom per-request timeout
    pub fn with_timeout(base_url: impl Into<String>, timeout: Duration) -> Self {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|_| Client::new());
        Self::with_client(base_url, client)
    }

    /// Creates a registry client with a custom HTTP client
    ///
    /// This allows configuring proxies, TLS settings, etc. The caller is
    /// responsible for setting a request timeout on the client.
    pub fn with_client(base_url: impl Into<String>, client: Client) -> Self {
        let base_url = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        }
    }

    /// Get the base URL of the registry backend
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn fetch(&self, url: String, identifier: &str) -> Result<RegistryEntry> {
        tracing::debug!("Resolving {identifier} via {url}");

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(ClientError::request)?;

        let status = response.status();

        if status.as_u16() == 404 {
            return Err(ClientError::NotFound(identifier.to_string()));
        }

        if !status.is_success() {
            let message = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(ClientError::api_error(status.as_u16(), message));
        }

        response
            .json()
            .await
            .map_err(|e| ClientError::ParseError(format!("invalid registry entry: {e}")))
    }
}

#[async_trait]
impl ResourceRegistry for RegistryClient {
    async fn get_by_name(&self, name: &str) -> Result<RegistryEntry> {
        let url = format!("{}/v1alpha/{}", self.base_url, name);
        self.fetch(url, name).await
    }

    async fn look_up_by_permalink(&self, permalink: &str) -> Result<RegistryEntry> {
        let url = format!("{}/v1alpha/{}/lookUp", self.base_url, permalink);
        self.fetch(url, permalink).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_trims_trailing_slash() {
        let client = RegistryClient::new("http://connector-backend:8080/");
        assert_eq!(client.base_url(), "http://connector-backend:8080");
    }

    #[test]
    fn test_registry_entry_deserializes() {
        let entry: RegistryEntry =
            serde_json::from_str(r#"{"uid": "abc123", "id": "my-slack"}"#).unwrap();
        assert_eq!(entry.uid, "abc123");
        assert_eq!(entry.id, "my-slack");
    }
}
