//! Trellis Upstream Clients
//!
//! Type-safe HTTP clients for the backends the pipeline worker consumes:
//! resource registries (source connectors, destination connectors, models,
//! model instances) and the object storage gateway.
//!
//! Every client is exposed behind a narrow capability trait
//! ([`ResourceRegistry`], [`ObjectStorage`]) so callers inject concrete
//! adapters in production and deterministic doubles in tests.
//!
//! # Example
//!
//! ```no_run
//! use trellis_client::registry::{RegistryClient, ResourceRegistry};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), trellis_client::error::ClientError> {
//!     let connectors = RegistryClient::new("http://connector-backend:8080");
//!
//!     let entry = connectors.get_by_name("source-connectors/my-slack").await?;
//!     println!("uid: {}", entry.uid);
//!     Ok(())
//! }
//! ```

pub mod error;
pub mod registry;
pub mod storage;

// Re-export commonly used types
pub use error::{ClientError, Result};
pub use registry::{RegistryClient, RegistryEntry, ResourceRegistry};
pub use storage::{ObjectInfo, ObjectStorage, StorageClient};
