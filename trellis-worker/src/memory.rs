//! Workflow memory collaborator
//!
//! The workflow engine keeps each trigger's in-flight execution data
//! (recipe, per-item component inputs/outputs, pipeline outputs) in
//! workflow memory for the lifetime of that trigger. This crate only ever
//! reads it; writes belong to the upstream execution steps.

use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value as JsonValue;
use std::sync::Arc;
use trellis_core::domain::recipe::Recipe;

/// Pipeline-level data kinds held in workflow memory
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineData {
    Variable,
    Output,
}

/// Component-level data kinds held in workflow memory
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComponentData {
    Input,
    Output,
}

/// One trigger's in-flight execution data
///
/// Values are indexed by batch position; the batch size is fixed for the
/// lifetime of the trigger but must be re-read on every activity call
/// rather than cached from a prior step.
#[async_trait]
pub trait WorkflowMemory: Send + Sync {
    /// The recipe loaded for this trigger, if any
    fn recipe(&self) -> Option<Recipe>;

    /// Number of items in this trigger's batch
    fn batch_size(&self) -> usize;

    /// Pipeline-level value for one batch item
    async fn pipeline_data(&self, index: usize, kind: PipelineData) -> Result<JsonValue>;

    /// Component-level value for one batch item
    async fn component_data(
        &self,
        index: usize,
        component_id: &str,
        kind: ComponentData,
    ) -> Result<JsonValue>;
}

/// Access to per-trigger workflow memory
#[async_trait]
pub trait MemoryStore: Send + Sync {
    /// Fetches the workflow memory handle for a trigger
    async fn workflow_memory(&self, trigger_id: &str) -> Result<Arc<dyn WorkflowMemory>>;
}
