//! Run record persistence
//!
//! The repository attaches blob references produced by the upload
//! activities onto pipeline-run and component-run records. Updates are
//! partial merges; failures propagate to the caller and are retried only
//! by the workflow engine re-invoking the whole activity.

pub mod db;
mod runs;

pub use runs::{ComponentRunUpdate, PgRunRepository, PipelineRunUpdate, RunRepository};
