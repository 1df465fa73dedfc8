//! Run database pool and migrations

use sqlx::{PgPool, postgres::PgPoolOptions};
use std::time::Duration;

pub async fn create_pool(database_url: &str) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .acquire_timeout(Duration::from_secs(5))
        .connect(database_url)
        .await
}

pub async fn run_migrations(pool: &PgPool) -> Result<(), sqlx::Error> {
    // Create pipeline runs table
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS pipeline_runs (
            pipeline_trigger_uid VARCHAR(255) PRIMARY KEY,
            status VARCHAR(50),
            started_at TIMESTAMPTZ,
            completed_at TIMESTAMPTZ,
            recipe_snapshot JSONB,
            outputs JSONB
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Create component runs table
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS component_runs (
            pipeline_trigger_uid VARCHAR(255) NOT NULL,
            component_id VARCHAR(255) NOT NULL,
            status VARCHAR(50),
            started_at TIMESTAMPTZ,
            completed_at TIMESTAMPTZ,
            inputs JSONB,
            outputs JSONB,
            blob_data_expiration_time TIMESTAMPTZ,
            PRIMARY KEY (pipeline_trigger_uid, component_id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Create indexes for better query performance
    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_component_runs_trigger ON component_runs(pipeline_trigger_uid)",
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_component_runs_expiration ON component_runs(blob_data_expiration_time)",
    )
    .execute(pool)
    .await?;

    tracing::info!("Database migrations completed successfully");
    Ok(())
}
