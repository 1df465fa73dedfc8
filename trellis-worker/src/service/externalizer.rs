//! Artifact externalization
//!
//! Large in-memory execution artifacts (recipe snapshots, component
//! inputs/outputs, pipeline outputs) are serialized and uploaded to object
//! storage, and the resulting blob references are attached to the run
//! record. Object keys are deterministic functions of the trigger id,
//! component id and direction, so a re-executed activity overwrites the
//! same objects instead of creating orphans.

use anyhow::{Context, Result};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde_json::Value as JsonValue;
use trellis_client::storage::{CONTENT_TYPE_JSON, ObjectInfo, ObjectStorage};
use trellis_core::domain::run::BlobReference;

use crate::memory::{ComponentData, PipelineData, WorkflowMemory};

/// Placement of an externalized run document
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunArtifact<'a> {
    Recipe {
        trigger_id: &'a str,
    },
    PipelineOutput {
        trigger_id: &'a str,
    },
    ComponentInput {
        trigger_id: &'a str,
        component_id: &'a str,
    },
    ComponentOutput {
        trigger_id: &'a str,
        component_id: &'a str,
    },
}

impl RunArtifact<'_> {
    /// Object key for this artifact.
    ///
    /// The layout must stay bit-exact with already-stored objects.
    /// Component input keys are component-first while output keys are
    /// trigger-first; the asymmetry is historical but load-bearing, so
    /// both orderings are kept as-is.
    pub fn object_key(&self) -> String {
        match self {
            RunArtifact::Recipe { trigger_id } => {
                format!("pipeline-runs/recipe/{trigger_id}.json")
            }
            RunArtifact::PipelineOutput { trigger_id } => {
                format!("pipeline-runs/output/{trigger_id}.json")
            }
            RunArtifact::ComponentInput {
                trigger_id,
                component_id,
            } => format!("component-runs/{component_id}/input/{trigger_id}.json"),
            RunArtifact::ComponentOutput {
                trigger_id,
                component_id,
            } => format!("component-runs/{trigger_id}/output/{component_id}.json"),
        }
    }

    fn trigger_id(&self) -> &str {
        match self {
            RunArtifact::Recipe { trigger_id }
            | RunArtifact::PipelineOutput { trigger_id }
            | RunArtifact::ComponentInput { trigger_id, .. }
            | RunArtifact::ComponentOutput { trigger_id, .. } => trigger_id,
        }
    }

    /// Scope segment for relocated payload keys
    fn blob_scope(&self) -> String {
        match self {
            RunArtifact::Recipe { .. } => "recipe".to_string(),
            RunArtifact::PipelineOutput { .. } => "output".to_string(),
            RunArtifact::ComponentInput { component_id, .. } => format!("{component_id}/input"),
            RunArtifact::ComponentOutput { component_id, .. } => format!("{component_id}/output"),
        }
    }
}

/// Collects one pipeline-level value per batch item, in index order.
///
/// The batch size is read from workflow memory at call time; a missing or
/// erroring item aborts the whole collection.
pub async fn collect_pipeline_data(
    memory: &dyn WorkflowMemory,
    kind: PipelineData,
) -> Result<Vec<JsonValue>> {
    let batch_size = memory.batch_size();
    let mut items = Vec::with_capacity(batch_size);

    for index in 0..batch_size {
        let value = memory
            .pipeline_data(index, kind)
            .await
            .with_context(|| format!("reading pipeline {kind:?} for batch item {index}"))?;
        items.push(value);
    }

    Ok(items)
}

/// Collects one component-level value per batch item, in index order.
pub async fn collect_component_data(
    memory: &dyn WorkflowMemory,
    component_id: &str,
    kind: ComponentData,
) -> Result<Vec<JsonValue>> {
    let batch_size = memory.batch_size();
    let mut items = Vec::with_capacity(batch_size);

    for index in 0..batch_size {
        let value = memory
            .component_data(index, component_id, kind)
            .await
            .with_context(|| {
                format!("reading component {component_id} {kind:?} for batch item {index}")
            })?;
        items.push(value);
    }

    Ok(items)
}

/// Uploads a batch as a single JSON document and returns its reference.
///
/// The returned list always has exactly one element regardless of batch
/// size; items appear in the document in batch index order.
pub async fn externalize_batch(
    storage: &dyn ObjectStorage,
    artifact: RunArtifact<'_>,
    items: &[JsonValue],
    expiry_tag: &str,
) -> Result<Vec<BlobReference>> {
    let key = artifact.object_key();
    let (url, info) = storage
        .upload_file(&key, items, CONTENT_TYPE_JSON, expiry_tag)
        .await
        .with_context(|| format!("uploading run document {key}"))?;

    Ok(single_reference(url, info))
}

/// Uploads a pre-serialized document and returns its reference.
pub async fn externalize_document(
    storage: &dyn ObjectStorage,
    artifact: RunArtifact<'_>,
    bytes: Vec<u8>,
    expiry_tag: &str,
) -> Result<Vec<BlobReference>> {
    let key = artifact.object_key();
    let (url, info) = storage
        .upload_file_bytes(&key, bytes, CONTENT_TYPE_JSON, expiry_tag)
        .await
        .with_context(|| format!("uploading run document {key}"))?;

    Ok(single_reference(url, info))
}

fn single_reference(url: String, info: ObjectInfo) -> Vec<BlobReference> {
    vec![BlobReference {
        name: info.key,
        content_type: info.content_type,
        size: info.size,
        url,
    }]
}

/// Relocates inlined binary payloads out of the batch values.
///
/// Any string holding a base64 data URI is decoded, uploaded as its own
/// object, and replaced in place with the returned URL, which keeps the
/// main document bounded in size regardless of embedded binary volume.
/// Payload keys derive from the artifact placement, item index and field
/// path, so a retried activity overwrites the same objects.
pub async fn relocate_blob_data(
    storage: &dyn ObjectStorage,
    artifact: RunArtifact<'_>,
    mut items: Vec<JsonValue>,
    expiry_tag: &str,
) -> Result<Vec<JsonValue>> {
    let trigger_id = artifact.trigger_id();
    let scope = artifact.blob_scope();

    for (index, item) in items.iter_mut().enumerate() {
        let payloads = find_inlined_payloads(item)?;

        for payload in payloads {
            let field = payload.pointer[1..].replace('/', ".");
            let key = format!("blobs/{trigger_id}/{scope}/{index}/{field}");

            let (url, _) = storage
                .upload_file_bytes(&key, payload.bytes, &payload.content_type, expiry_tag)
                .await
                .with_context(|| format!("relocating inlined payload to {key}"))?;

            if let Some(slot) = item.pointer_mut(&payload.pointer) {
                *slot = JsonValue::String(url);
            }
        }
    }

    Ok(items)
}

struct InlinedPayload {
    /// JSON pointer to the field holding the data URI
    pointer: String,
    content_type: String,
    bytes: Vec<u8>,
}

/// Walks a value and decodes every base64 data URI it holds.
fn find_inlined_payloads(value: &JsonValue) -> Result<Vec<InlinedPayload>> {
    let mut payloads = Vec::new();
    walk_value(value, &mut String::new(), &mut payloads)?;
    Ok(payloads)
}

fn walk_value(
    value: &JsonValue,
    pointer: &mut String,
    payloads: &mut Vec<InlinedPayload>,
) -> Result<()> {
    match value {
        JsonValue::String(s) => {
            if let Some((content_type, encoded)) = parse_data_uri(s) {
                let bytes = BASE64
                    .decode(encoded)
                    .with_context(|| format!("decoding inlined payload at {pointer}"))?;
                payloads.push(InlinedPayload {
                    pointer: pointer.clone(),
                    content_type: content_type.to_string(),
                    bytes,
                });
            }
        }
        JsonValue::Array(array) => {
            for (index, element) in array.iter().enumerate() {
                let len = pointer.len();
                pointer.push('/');
                pointer.push_str(&index.to_string());
                walk_value(element, pointer, payloads)?;
                pointer.truncate(len);
            }
        }
        JsonValue::Object(map) => {
            for (field, element) in map {
                let len = pointer.len();
                pointer.push('/');
                pointer.push_str(&escape_pointer_segment(field));
                walk_value(element, pointer, payloads)?;
                pointer.truncate(len);
            }
        }
        _ => {}
    }

    Ok(())
}

// JSON pointer escaping per RFC 6901
fn escape_pointer_segment(segment: &str) -> String {
    segment.replace('~', "~0").replace('/', "~1")
}

fn parse_data_uri(s: &str) -> Option<(&str, &str)> {
    let rest = s.strip_prefix("data:")?;
    let (content_type, encoded) = rest.split_once(";base64,")?;
    if content_type.is_empty() {
        return None;
    }
    Some((content_type, encoded))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::RecordingStorage;
    use base64::Engine as _;
    use serde_json::json;

    #[test]
    fn test_object_keys_are_bit_exact() {
        assert_eq!(
            RunArtifact::Recipe { trigger_id: "t1" }.object_key(),
            "pipeline-runs/recipe/t1.json"
        );
        assert_eq!(
            RunArtifact::PipelineOutput { trigger_id: "t1" }.object_key(),
            "pipeline-runs/output/t1.json"
        );
        assert_eq!(
            RunArtifact::ComponentInput {
                trigger_id: "t1",
                component_id: "comp-a"
            }
            .object_key(),
            "component-runs/comp-a/input/t1.json"
        );
        assert_eq!(
            RunArtifact::ComponentOutput {
                trigger_id: "t1",
                component_id: "comp-a"
            }
            .object_key(),
            "component-runs/t1/output/comp-a.json"
        );
    }

    #[test]
    fn test_object_keys_are_deterministic() {
        let artifact = RunArtifact::ComponentOutput {
            trigger_id: "t1",
            component_id: "comp-a",
        };
        assert_eq!(artifact.object_key(), artifact.object_key());
    }

    #[tokio::test]
    async fn test_externalize_batch_returns_single_reference() {
        let storage = RecordingStorage::default();
        let items = vec![json!({"a": 1}), json!({"a": 2}), json!({"a": 3})];

        let references = externalize_batch(
            &storage,
            RunArtifact::PipelineOutput { trigger_id: "t1" },
            &items,
            "default",
        )
        .await
        .unwrap();

        assert_eq!(references.len(), 1);
        assert_eq!(references[0].name, "pipeline-runs/output/t1.json");
        assert_eq!(references[0].content_type, CONTENT_TYPE_JSON);

        let uploads = storage.uploads.lock().unwrap();
        assert_eq!(uploads.len(), 1);
        assert_eq!(references[0].size, uploads[0].bytes.len() as i64);
        assert_eq!(uploads[0].expiry_tag, "default");

        let document: Vec<JsonValue> = serde_json::from_slice(&uploads[0].bytes).unwrap();
        assert_eq!(document, items);
    }

    #[tokio::test]
    async fn test_relocate_blob_data_replaces_data_uris() {
        let storage = RecordingStorage::default();
        let encoded = BASE64.encode(b"binary-content");
        let items = vec![json!({
            "prompt": "hello",
            "attachments": [format!("data:image/png;base64,{encoded}")],
        })];

        let artifact = RunArtifact::ComponentInput {
            trigger_id: "t1",
            component_id: "comp-a",
        };
        let relocated = relocate_blob_data(&storage, artifact, items, "default")
            .await
            .unwrap();

        let uploads = storage.uploads.lock().unwrap();
        assert_eq!(uploads.len(), 1);
        assert_eq!(uploads[0].path, "blobs/t1/comp-a/input/0/attachments.0");
        assert_eq!(uploads[0].mime_type, "image/png");
        assert_eq!(uploads[0].bytes, b"binary-content");

        assert_eq!(
            relocated[0]["attachments"][0],
            json!("https://storage.test/blobs/t1/comp-a/input/0/attachments.0")
        );
        // non-payload fields untouched
        assert_eq!(relocated[0]["prompt"], json!("hello"));
    }

    #[tokio::test]
    async fn test_relocate_blob_data_ignores_plain_strings() {
        let storage = RecordingStorage::default();
        let items = vec![json!({"text": "data: not a uri", "n": 3})];

        let relocated = relocate_blob_data(
            &storage,
            RunArtifact::ComponentOutput {
                trigger_id: "t1",
                component_id: "comp-a",
            },
            items.clone(),
            "default",
        )
        .await
        .unwrap();

        assert_eq!(relocated, items);
        assert!(storage.uploads.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_relocate_blob_data_rejects_corrupt_base64() {
        let storage = RecordingStorage::default();
        let items = vec![json!({"file": "data:image/png;base64,!!!not-base64!!!"})];

        let result = relocate_blob_data(
            &storage,
            RunArtifact::ComponentInput {
                trigger_id: "t1",
                component_id: "comp-a",
            },
            items,
            "default",
        )
        .await;

        assert!(result.is_err());
    }

    #[test]
    fn test_parse_data_uri() {
        assert_eq!(
            parse_data_uri("data:application/pdf;base64,AAAA"),
            Some(("application/pdf", "AAAA"))
        );
        assert_eq!(parse_data_uri("data:;base64,AAAA"), None);
        assert_eq!(parse_data_uri("https://example.com/file.pdf"), None);
    }
}
