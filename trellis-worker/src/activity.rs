//! Upload activities
//!
//! Entry points the durable-workflow engine dispatches after (or during) a
//! pipeline trigger: recipe snapshot, pipeline outputs, and per-component
//! inputs/outputs are pulled from workflow memory, externalized to object
//! storage, and recorded on the run. The engine retries a failed activity
//! by re-invoking it wholesale; deterministic object keys and partial-merge
//! record updates make that safe.

use anyhow::{Context, Result};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{Instrument, error, info, info_span};
use trellis_core::domain::run::ExpiryRule;

use crate::memory::{ComponentData, MemoryStore, PipelineData};
use crate::repository::{ComponentRunUpdate, PipelineRunUpdate, RunRepository};
use crate::service::externalizer::{self, RunArtifact};
use trellis_client::storage::ObjectStorage;

/// Parameters for the recipe snapshot upload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadRecipeParam {
    pub pipeline_trigger_id: String,
    pub expiry_rule_tag: String,
}

/// Parameters for the pipeline outputs upload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadOutputsParam {
    pub pipeline_trigger_id: String,
    pub expiry_rule_tag: String,
}

/// Parameters for component input/output uploads
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentActivityParam {
    pub pipeline_trigger_id: String,
    pub component_id: String,
    pub expiry_rule: ExpiryRule,
}

/// Worker holding the collaborators shared by all upload activities
pub struct Worker {
    memory: Arc<dyn MemoryStore>,
    storage: Arc<dyn ObjectStorage>,
    runs: Arc<dyn RunRepository>,
}

impl Worker {
    /// Creates a worker over the injected collaborators
    pub fn new(
        memory: Arc<dyn MemoryStore>,
        storage: Arc<dyn ObjectStorage>,
        runs: Arc<dyn RunRepository>,
    ) -> Self {
        Self {
            memory,
            storage,
            runs,
        }
    }

    /// Uploads the trigger's recipe snapshot and records its reference.
    ///
    /// The snapshot holds the structural recipe fields only; resource
    /// references are resolved and recorded elsewhere.
    pub async fn upload_recipe(&self, param: &UploadRecipeParam) -> Result<()> {
        let span = info_span!("upload_recipe", trigger_id = %param.pipeline_trigger_id);
        async {
            info!("upload_recipe started");

            let wfm = self
                .memory
                .workflow_memory(&param.pipeline_trigger_id)
                .await?;
            let recipe = wfm.recipe().context("recipe not loaded in memory")?;

            let bytes = serde_json::to_vec(&recipe.snapshot())
                .context("serializing recipe snapshot")?;

            let artifact = RunArtifact::Recipe {
                trigger_id: &param.pipeline_trigger_id,
            };
            let references = externalizer::externalize_document(
                self.storage.as_ref(),
                artifact,
                bytes,
                &param.expiry_rule_tag,
            )
            .await
            .inspect_err(|e| error!("failed to upload recipe snapshot: {e:#}"))?;

            self.runs
                .update_pipeline_run(
                    &param.pipeline_trigger_id,
                    PipelineRunUpdate {
                        recipe_snapshot: Some(references),
                        ..Default::default()
                    },
                )
                .await
                .inspect_err(|e| error!("failed to record recipe snapshot reference: {e:#}"))?;

            info!("upload_recipe finished");
            Ok(())
        }
        .instrument(span)
        .await
    }

    /// Uploads the trigger's pipeline outputs and records their reference.
    pub async fn upload_pipeline_outputs(&self, param: &UploadOutputsParam) -> Result<()> {
        let span =
            info_span!("upload_pipeline_outputs", trigger_id = %param.pipeline_trigger_id);
        async {
            info!("upload_pipeline_outputs started");

            let wfm = self
                .memory
                .workflow_memory(&param.pipeline_trigger_id)
                .await?;
            let items =
                externalizer::collect_pipeline_data(wfm.as_ref(), PipelineData::Output).await?;

            let artifact = RunArtifact::PipelineOutput {
                trigger_id: &param.pipeline_trigger_id,
            };
            let references = externalizer::externalize_batch(
                self.storage.as_ref(),
                artifact,
                &items,
                &param.expiry_rule_tag,
            )
            .await
            .inspect_err(|e| error!("failed to upload pipeline outputs: {e:#}"))?;

            self.runs
                .update_pipeline_run(
                    &param.pipeline_trigger_id,
                    PipelineRunUpdate {
                        outputs: Some(references),
                        ..Default::default()
                    },
                )
                .await
                .inspect_err(|e| error!("failed to record pipeline output reference: {e:#}"))?;

            info!("upload_pipeline_outputs finished");
            Ok(())
        }
        .instrument(span)
        .await
    }

    /// Uploads one component's inputs and records their reference.
    ///
    /// Inlined binary payloads are relocated to their own objects first.
    /// When the expiry rule carries a positive day count, the component
    /// run is also stamped with the absolute blob expiration time.
    pub async fn upload_component_inputs(&self, param: &ComponentActivityParam) -> Result<()> {
        let span = info_span!(
            "upload_component_inputs",
            trigger_id = %param.pipeline_trigger_id,
            component_id = %param.component_id,
        );
        async {
            info!("upload_component_inputs started");

            let wfm = self
                .memory
                .workflow_memory(&param.pipeline_trigger_id)
                .await?;
            let items = externalizer::collect_component_data(
                wfm.as_ref(),
                &param.component_id,
                ComponentData::Input,
            )
            .await?;

            let artifact = RunArtifact::ComponentInput {
                trigger_id: &param.pipeline_trigger_id,
                component_id: &param.component_id,
            };
            let items = externalizer::relocate_blob_data(
                self.storage.as_ref(),
                artifact,
                items,
                &param.expiry_rule.tag,
            )
            .await?;

            let references = externalizer::externalize_batch(
                self.storage.as_ref(),
                artifact,
                &items,
                &param.expiry_rule.tag,
            )
            .await
            .inspect_err(|e| error!("failed to upload component inputs: {e:#}"))?;

            let mut update = ComponentRunUpdate {
                inputs: Some(references),
                ..Default::default()
            };
            if param.expiry_rule.expiration_days > 0 {
                let expiration =
                    Utc::now() + chrono::Duration::days(param.expiry_rule.expiration_days as i64);
                update.blob_data_expiration_time = Some(expiration);
            }

            self.runs
                .update_component_run(&param.pipeline_trigger_id, &param.component_id, update)
                .await
                .inspect_err(|e| error!("failed to record component input reference: {e:#}"))?;

            info!("upload_component_inputs finished");
            Ok(())
        }
        .instrument(span)
        .await
    }

    /// Uploads one component's outputs and records their reference.
    pub async fn upload_component_outputs(&self, param: &ComponentActivityParam) -> Result<()> {
        let span = info_span!(
            "upload_component_outputs",
            trigger_id = %param.pipeline_trigger_id,
            component_id = %param.component_id,
        );
        async {
            info!("upload_component_outputs started");

            let wfm = self
                .memory
                .workflow_memory(&param.pipeline_trigger_id)
                .await?;
            let items = externalizer::collect_component_data(
                wfm.as_ref(),
                &param.component_id,
                ComponentData::Output,
            )
            .await?;

            let artifact = RunArtifact::ComponentOutput {
                trigger_id: &param.pipeline_trigger_id,
                component_id: &param.component_id,
            };
            let items = externalizer::relocate_blob_data(
                self.storage.as_ref(),
                artifact,
                items,
                &param.expiry_rule.tag,
            )
            .await?;

            let references = externalizer::externalize_batch(
                self.storage.as_ref(),
                artifact,
                &items,
                &param.expiry_rule.tag,
            )
            .await
            .inspect_err(|e| error!("failed to upload component outputs: {e:#}"))?;

            self.runs
                .update_component_run(
                    &param.pipeline_trigger_id,
                    &param.component_id,
                    ComponentRunUpdate {
                        outputs: Some(references),
                        ..Default::default()
                    },
                )
                .await
                .inspect_err(|e| error!("failed to record component output reference: {e:#}"))?;

            info!("upload_component_outputs finished");
            Ok(())
        }
        .instrument(span)
        .await
    }
}
