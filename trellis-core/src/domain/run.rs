//! Run record wire types
//!
//! Pipeline-run and component-run records live in the run repository; the
//! shapes here are the shared wire pieces attached to those records.

use serde::{Deserialize, Serialize};

/// Metadata describing an externalized run document.
///
/// Stored as an ordered JSON array under the run record's
/// `recipe_snapshot` / `inputs` / `outputs` column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlobReference {
    /// Object key in the store
    pub name: String,
    /// MIME type of the stored document
    #[serde(rename = "type")]
    pub content_type: String,
    /// Document size in bytes
    pub size: i64,
    /// Retrieval URL
    pub url: String,
}

/// Expiry policy applied to uploaded run data.
///
/// The tag is interpreted by the object store to schedule deletion; a
/// positive day count additionally stamps the component run record with an
/// absolute expiration time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExpiryRule {
    pub tag: String,
    #[serde(default)]
    pub expiration_days: i32,
}
