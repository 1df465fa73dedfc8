//! Run repository
//!
//! Partial-merge updates onto pipeline-run and component-run records,
//! keyed by trigger id (and component id for component runs). Unset patch
//! fields keep their stored values; set fields are last-write-wins.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use trellis_core::domain::run::BlobReference;

/// Partial update onto a pipeline run record
#[derive(Debug, Clone, Default)]
pub struct PipelineRunUpdate {
    pub recipe_snapshot: Option<Vec<BlobReference>>,
    pub outputs: Option<Vec<BlobReference>>,
}

/// Partial update onto a component run record
#[derive(Debug, Clone, Default)]
pub struct ComponentRunUpdate {
    pub inputs: Option<Vec<BlobReference>>,
    pub outputs: Option<Vec<BlobReference>>,
    pub blob_data_expiration_time: Option<DateTime<Utc>>,
}

/// Repository trait for run-record updates
#[async_trait]
pub trait RunRepository: Send + Sync {
    /// Merges a partial update onto the pipeline run for a trigger.
    async fn update_pipeline_run(
        &self,
        trigger_id: &str,
        update: PipelineRunUpdate,
    ) -> Result<()>;

    /// Merges a partial update onto one component's run for a trigger.
    async fn update_component_run(
        &self,
        trigger_id: &str,
        component_id: &str,
        update: ComponentRunUpdate,
    ) -> Result<()>;
}

/// Postgres implementation of [`RunRepository`]
pub struct PgRunRepository {
    pool: PgPool,
}

impl PgRunRepository {
    /// Creates a repository over an existing connection pool
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn references_to_json(
    references: Option<Vec<BlobReference>>,
) -> Result<Option<serde_json::Value>> {
    references
        .map(|refs| serde_json::to_value(refs))
        .transpose()
        .context("serializing blob references")
}

#[async_trait]
impl RunRepository for PgRunRepository {
    async fn update_pipeline_run(
        &self,
        trigger_id: &str,
        update: PipelineRunUpdate,
    ) -> Result<()> {
        let recipe_snapshot = references_to_json(update.recipe_snapshot)?;
        let outputs = references_to_json(update.outputs)?;

        let result = sqlx::query(
            r#"
            UPDATE pipeline_runs
            SET recipe_snapshot = COALESCE($1, recipe_snapshot),
                outputs = COALESCE($2, outputs)
            WHERE pipeline_trigger_uid = $3
            "#,
        )
        .bind(recipe_snapshot)
        .bind(outputs)
        .bind(trigger_id)
        .execute(&self.pool)
        .await
        .with_context(|| format!("updating pipeline run {trigger_id}"))?;

        if result.rows_affected() == 0 {
            anyhow::bail!("no pipeline run record for trigger {trigger_id}");
        }

        Ok(())
    }

    async fn update_component_run(
        &self,
        trigger_id: &str,
        component_id: &str,
        update: ComponentRunUpdate,
    ) -> Result<()> {
        let inputs = references_to_json(update.inputs)?;
        let outputs = references_to_json(update.outputs)?;

        let result = sqlx::query(
            r#"
            UPDATE component_runs
            SET inputs = COALESCE($1, inputs),
                outputs = COALESCE($2, outputs),
                blob_data_expiration_time = COALESCE($3, blob_data_expiration_time)
            WHERE pipeline_trigger_uid = $4 AND component_id = $5
            "#,
        )
        .bind(inputs)
        .bind(outputs)
        .bind(update.blob_data_expiration_time)
        .bind(trigger_id)
        .bind(component_id)
        .execute(&self.pool)
        .await
        .with_context(|| format!("updating component run {trigger_id}/{component_id}"))?;

        if result.rows_affected() == 0 {
            anyhow::bail!("no component run record for trigger {trigger_id} component {component_id}");
        }

        Ok(())
    }
}
