//! In-memory doubles shared by unit tests

use async_trait::async_trait;
use std::sync::Mutex;
use trellis_client::error::Result as ClientResult;
use trellis_client::storage::{ObjectInfo, ObjectStorage};

pub(crate) struct UploadRecord {
    pub path: String,
    pub bytes: Vec<u8>,
    pub mime_type: String,
    pub expiry_tag: String,
}

/// Object storage double that records every upload and returns a
/// predictable URL.
#[derive(Default)]
pub(crate) struct RecordingStorage {
    pub uploads: Mutex<Vec<UploadRecord>>,
}

#[async_trait]
impl ObjectStorage for RecordingStorage {
    async fn upload_file_bytes(
        &self,
        path: &str,
        bytes: Vec<u8>,
        mime_type: &str,
        expiry_tag: &str,
    ) -> ClientResult<(String, ObjectInfo)> {
        let info = ObjectInfo {
            key: path.to_string(),
            content_type: mime_type.to_string(),
            size: bytes.len() as i64,
        };
        self.uploads.lock().unwrap().push(UploadRecord {
            path: path.to_string(),
            bytes,
            mime_type: mime_type.to_string(),
            expiry_tag: expiry_tag.to_string(),
        });
        Ok((format!("https://storage.test/{path}"), info))
    }
}
