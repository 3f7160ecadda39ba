//! # Pipeline Failure Model
//!
//! Per-provider, per-step failure records with categorized reasons, retry
//! bookkeeping and resolution state.
//!
//! ## Database Schema
//!
//! Maps to `pipeline_failures` table:
//! ```sql
//! CREATE TABLE pipeline_failures (
//!   id SERIAL PRIMARY KEY,
//!   provider_id INTEGER NOT NULL,
//!   provider_name TEXT NOT NULL,
//!   pipeline_run_id TEXT,
//!   step TEXT NOT NULL,
//!   failure_reason TEXT NOT NULL,
//!   error_details TEXT,
//!   retry_count INTEGER NOT NULL DEFAULT 0,
//!   resolved BOOLEAN NOT NULL DEFAULT FALSE,
//!   resolved_at TIMESTAMP,
//!   created_at TIMESTAMP NOT NULL,
//!   updated_at TIMESTAMP NOT NULL
//! );
//! ```
//!
//! `pipeline_run_id` correlates with `pipeline_runs.id` but is not a foreign key.
//!
//! ## Resolution
//!
//! Resolution is coarse: a provider-level success resolves every unresolved
//! failure of that provider, whatever step it was recorded for.

use crate::config::ProviderTableConfig;
use crate::models::FailureReason;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct PipelineFailure {
    pub id: i32,
    pub provider_id: i32,
    pub provider_name: String,
    pub pipeline_run_id: Option<String>,
    pub step: String,
    pub failure_reason: String,
    pub error_details: Option<String>,
    pub retry_count: i32,
    pub resolved: bool,
    pub resolved_at: Option<NaiveDateTime>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

/// New PipelineFailure for creation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewPipelineFailure {
    pub provider_id: i32,
    pub provider_name: String,
    pub pipeline_run_id: Option<String>,
    pub step: String,
    pub failure_reason: FailureReason,
    pub error_details: Option<String>,
    pub retry_count: i32,
    pub created_at: NaiveDateTime,
}

/// Unresolved failure with the provider's current display name
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct UnresolvedFailure {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub failure: PipelineFailure,
    pub display_name: String,
}

/// Aggregated failure counts for one (step, reason) pair
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct FailureStat {
    pub step: String,
    pub failure_reason: String,
    pub total: i64,
    pub resolved_count: i64,
    pub unresolved_count: i64,
}

const FAILURE_COLUMNS: &str = "f.id, f.provider_id, f.provider_name, f.pipeline_run_id, f.step, \
     f.failure_reason, f.error_details, f.retry_count, f.resolved, f.resolved_at, \
     f.created_at, f.updated_at";

impl PipelineFailure {
    pub fn reason(&self) -> FailureReason {
        FailureReason::from(self.failure_reason.as_str())
    }

    /// Build the row an in-process store keeps for a new failure
    pub fn from_new(id: i32, new_failure: NewPipelineFailure) -> Self {
        Self {
            id,
            provider_id: new_failure.provider_id,
            provider_name: new_failure.provider_name,
            pipeline_run_id: new_failure.pipeline_run_id,
            step: new_failure.step,
            failure_reason: new_failure.failure_reason.to_string(),
            error_details: new_failure.error_details,
            retry_count: new_failure.retry_count,
            resolved: false,
            resolved_at: None,
            created_at: new_failure.created_at,
            updated_at: new_failure.created_at,
        }
    }

    pub async fn create(
        pool: &PgPool,
        new_failure: NewPipelineFailure,
    ) -> Result<PipelineFailure, sqlx::Error> {
        sqlx::query_as::<_, PipelineFailure>(
            r#"
            INSERT INTO pipeline_failures
                (provider_id, provider_name, pipeline_run_id, step, failure_reason,
                 error_details, retry_count, resolved, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, FALSE, $8, $8)
            RETURNING id, provider_id, provider_name, pipeline_run_id, step, failure_reason,
                      error_details, retry_count, resolved, resolved_at, created_at, updated_at
            "#,
        )
        .bind(new_failure.provider_id)
        .bind(&new_failure.provider_name)
        .bind(&new_failure.pipeline_run_id)
        .bind(&new_failure.step)
        .bind(new_failure.failure_reason.as_str())
        .bind(&new_failure.error_details)
        .bind(new_failure.retry_count)
        .bind(new_failure.created_at)
        .fetch_one(pool)
        .await
    }

    pub async fn find_by_id(
        pool: &PgPool,
        id: i32,
    ) -> Result<Option<PipelineFailure>, sqlx::Error> {
        sqlx::query_as::<_, PipelineFailure>(&format!(
            "SELECT {FAILURE_COLUMNS} FROM pipeline_failures f WHERE f.id = $1"
        ))
        .bind(id)
        .fetch_optional(pool)
        .await
    }

    pub async fn for_run(pool: &PgPool, run_id: &str) -> Result<Vec<PipelineFailure>, sqlx::Error> {
        sqlx::query_as::<_, PipelineFailure>(&format!(
            "SELECT {FAILURE_COLUMNS} FROM pipeline_failures f \
             WHERE f.pipeline_run_id = $1 ORDER BY f.id"
        ))
        .bind(run_id)
        .fetch_all(pool)
        .await
    }

    /// Resolve every unresolved failure of a provider; returns rows touched
    pub async fn resolve_for_provider(
        pool: &PgPool,
        provider_id: i32,
        resolved_at: NaiveDateTime,
    ) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE pipeline_failures
            SET resolved = TRUE, resolved_at = $2, updated_at = $2
            WHERE provider_id = $1 AND resolved = FALSE
            "#,
        )
        .bind(provider_id)
        .bind(resolved_at)
        .execute(pool)
        .await?;

        Ok(result.rows_affected())
    }

    /// Bump `retry_count`; returns false when the failure does not exist
    pub async fn increment_retry_count(
        pool: &PgPool,
        id: i32,
        updated_at: NaiveDateTime,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE pipeline_failures
            SET retry_count = retry_count + 1, updated_at = $2
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(updated_at)
        .execute(pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// All unresolved failures, newest first
    ///
    /// With a provider table configured the display name comes from the
    /// provider's current row, falling back to the denormalized name.
    pub async fn unresolved(
        pool: &PgPool,
        provider_table: Option<&ProviderTableConfig>,
    ) -> Result<Vec<UnresolvedFailure>, sqlx::Error> {
        let sql = match provider_table {
            Some(table) => format!(
                "SELECT {FAILURE_COLUMNS}, COALESCE(p.{name}, f.provider_name) AS display_name \
                 FROM pipeline_failures f \
                 LEFT JOIN {table} p ON p.{id} = f.provider_id \
                 WHERE f.resolved = FALSE \
                 ORDER BY f.created_at DESC, f.id DESC",
                name = table.name_column,
                table = table.table,
                id = table.id_column,
            ),
            None => format!(
                "SELECT {FAILURE_COLUMNS}, f.provider_name AS display_name \
                 FROM pipeline_failures f \
                 WHERE f.resolved = FALSE \
                 ORDER BY f.created_at DESC, f.id DESC"
            ),
        };

        sqlx::query_as::<_, UnresolvedFailure>(&sql).fetch_all(pool).await
    }

    /// Failures created since `since`, grouped by step and reason
    pub async fn stats_since(
        pool: &PgPool,
        since: NaiveDateTime,
    ) -> Result<Vec<FailureStat>, sqlx::Error> {
        sqlx::query_as::<_, FailureStat>(
            r#"
            SELECT step,
                   failure_reason,
                   COUNT(*) AS total,
                   COUNT(*) FILTER (WHERE resolved) AS resolved_count,
                   COUNT(*) FILTER (WHERE NOT resolved) AS unresolved_count
            FROM pipeline_failures
            WHERE created_at >= $1
            GROUP BY step, failure_reason
            ORDER BY total DESC, step, failure_reason
            "#,
        )
        .bind(since)
        .fetch_all(pool)
        .await
    }
}
