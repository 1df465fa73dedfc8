//! Object storage client
//!
//! Run documents and relocated binary payloads are uploaded through the
//! [`ObjectStorage`] capability. [`StorageClient`] is the HTTP
//! implementation talking to the storage gateway; tests substitute
//! recording doubles behind the same trait.

use crate::error::{ClientError, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value as JsonValue;
use std::time::Duration;

/// MIME type of serialized run documents
pub const CONTENT_TYPE_JSON: &str = "application/json";

/// Header carrying the expiry rule tag the store uses to schedule deletion
const EXPIRY_RULE_HEADER: &str = "x-expiry-rule-tag";

/// Default bound on a single upload call
pub const DEFAULT_UPLOAD_TIMEOUT: Duration = Duration::from_secs(30);

/// Metadata for an uploaded object
#[derive(Debug, Clone, PartialEq)]
pub struct ObjectInfo {
    /// Object key under which the content was stored
    pub key: String,
    /// MIME type of the stored content
    pub content_type: String,
    /// Content size in bytes
    pub size: i64,
}

/// Upload capability of the object store
///
/// `upload_file` serializes a whole batch as ONE JSON document, so the
/// number of stored objects is independent of batch size.
#[async_trait]
pub trait ObjectStorage: Send + Sync {
    /// Uploads raw bytes under the given object key.
    async fn upload_file_bytes(
        &self,
        path: &str,
        bytes: Vec<u8>,
        mime_type: &str,
        expiry_tag: &str,
    ) -> Result<(String, ObjectInfo)>;

    /// Uploads a batch of structured values as a single JSON document.
    async fn upload_file(
        &self,
        path: &str,
        content: &[JsonValue],
        mime_type: &str,
        expiry_tag: &str,
    ) -> Result<(String, ObjectInfo)> {
        let bytes = serde_json::to_vec(content)
            .map_err(|e| ClientError::ParseError(format!("serializing batch document: {e}")))?;
        self.upload_file_bytes(path, bytes, mime_type, expiry_tag)
            .await
    }
}

/// HTTP implementation of [`ObjectStorage`] against the storage gateway
#[derive(Debug, Clone)]
pub struct StorageClient {
    /// Base URL of the storage gateway (e.g., "http://storage-gateway:8080")
    base_url: String,
    /// HTTP client instance
    client: Client,
}

#[derive(Debug, Deserialize)]
struct UploadResponse {
    url: String,
}

impl StorageClient {
    /// Creates a storage client with the default upload timeout
    pub fn new(base_url: impl Into<String>) -> Self {
        let client = Client::builder()
            .timeout(DEFAULT_UPLOAD_TIMEOUT)
            .build()
            .unwrap_or_else(|_| Client::new());
        Self::with_client(base_url, client)
    }

    /// Creates a storage client with a custom HTTP client
    pub fn with_client(base_url: impl Into<String>, client: Client) -> Self {
        let base_url = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        }
    }

    /// Get the base URL of the storage gateway
    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[async_trait]
impl ObjectStorage for StorageClient {
    async fn upload_file_bytes(
        &self,
        path: &str,
        bytes: Vec<u8>,
        mime_type: &str,
        expiry_tag: &str,
    ) -> Result<(String, ObjectInfo)> {
        let url = format!("{}/v1alpha/objects/{}", self.base_url, path);
        let size = bytes.len() as i64;

        tracing::debug!("Uploading {size} bytes to {path}");

        let response = self
            .client
            .put(&url)
            .header(reqwest::header::CONTENT_TYPE, mime_type)
            .header(EXPIRY_RULE_HEADER, expiry_tag)
            .body(bytes)
            .send()
            .await
            .map_err(ClientError::request)?;

        let status = response.status();

        if !status.is_success() {
            let message = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(ClientError::api_error(status.as_u16(), message));
        }

        let uploaded: UploadResponse = response
            .json()
            .await
            .map_err(|e| ClientError::ParseError(format!("invalid upload response: {e}")))?;

        let info = ObjectInfo {
            key: path.to_string(),
            content_type: mime_type.to_string(),
            size,
        };

        Ok((uploaded.url, info))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Mutex;

    struct RecordingStorage {
        uploads: Mutex<Vec<(String, Vec<u8>, String)>>,
    }

    #[async_trait]
    impl ObjectStorage for RecordingStorage {
        async fn upload_file_bytes(
            &self,
            path: &str,
            bytes: Vec<u8>,
            mime_type: &str,
            _expiry_tag: &str,
        ) -> Result<(String, ObjectInfo)> {
            let info = ObjectInfo {
                key: path.to_string(),
                content_type: mime_type.to_string(),
                size: bytes.len() as i64,
            };
            self.uploads
                .lock()
                .unwrap()
                .push((path.to_string(), bytes, mime_type.to_string()));
            Ok((format!("https://storage.test/{path}"), info))
        }
    }

    #[test]
    fn test_client_trims_trailing_slash() {
        let client = StorageClient::new("http://storage-gateway:8080/");
        assert_eq!(client.base_url(), "http://storage-gateway:8080");
    }

    #[tokio::test]
    async fn test_upload_file_serializes_batch_as_one_document() {
        let storage = RecordingStorage {
            uploads: Mutex::new(Vec::new()),
        };
        let batch = vec![json!({"a": 1}), json!({"b": 2})];

        let (_, info) = storage
            .upload_file("pipeline-runs/output/t1.json", &batch, CONTENT_TYPE_JSON, "default")
            .await
            .unwrap();

        let uploads = storage.uploads.lock().unwrap();
        assert_eq!(uploads.len(), 1);

        let document: Vec<JsonValue> = serde_json::from_slice(&uploads[0].1).unwrap();
        assert_eq!(document, batch);
        assert_eq!(info.size, uploads[0].1.len() as i64);
    }
}
