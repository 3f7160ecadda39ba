//! # Pipeline Step Event Model
//!
//! Step-level success audit trail (`pipeline_steps`). Rows are written by
//! `log_step_success` and never resolve failures.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct PipelineStepEvent {
    pub id: i32,
    pub pipeline_run_id: Option<String>,
    pub provider_id: i32,
    pub provider_name: String,
    pub step: String,
    pub details: Option<serde_json::Value>,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewPipelineStepEvent {
    pub pipeline_run_id: Option<String>,
    pub provider_id: i32,
    pub provider_name: String,
    pub step: String,
    pub details: Option<serde_json::Value>,
    pub created_at: NaiveDateTime,
}

impl PipelineStepEvent {
    pub fn from_new(id: i32, new_event: NewPipelineStepEvent) -> Self {
        Self {
            id,
            pipeline_run_id: new_event.pipeline_run_id,
            provider_id: new_event.provider_id,
            provider_name: new_event.provider_name,
            step: new_event.step,
            details: new_event.details,
            created_at: new_event.created_at,
        }
    }

    pub async fn create(
        pool: &PgPool,
        new_event: NewPipelineStepEvent,
    ) -> Result<PipelineStepEvent, sqlx::Error> {
        sqlx::query_as::<_, PipelineStepEvent>(
            r#"
            INSERT INTO pipeline_steps
                (pipeline_run_id, provider_id, provider_name, step, details, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id, pipeline_run_id, provider_id, provider_name, step, details, created_at
            "#,
        )
        .bind(&new_event.pipeline_run_id)
        .bind(new_event.provider_id)
        .bind(&new_event.provider_name)
        .bind(&new_event.step)
        .bind(&new_event.details)
        .bind(new_event.created_at)
        .fetch_one(pool)
        .await
    }

    pub async fn for_run(
        pool: &PgPool,
        run_id: &str,
    ) -> Result<Vec<PipelineStepEvent>, sqlx::Error> {
        sqlx::query_as::<_, PipelineStepEvent>(
            r#"
            SELECT id, pipeline_run_id, provider_id, provider_name, step, details, created_at
            FROM pipeline_steps
            WHERE pipeline_run_id = $1
            ORDER BY id
            "#,
        )
        .bind(run_id)
        .fetch_all(pool)
        .await
    }
}
