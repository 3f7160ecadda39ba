//! # Pipeline Run Model
//!
//! Append-only record of one pipeline execution across a set of providers.
//!
//! ## Database Schema
//!
//! Maps to `pipeline_runs` table:
//! ```sql
//! CREATE TABLE pipeline_runs (
//!   id TEXT PRIMARY KEY,
//!   run_type TEXT NOT NULL,
//!   status TEXT NOT NULL,
//!   total_providers INTEGER NOT NULL DEFAULT 0,
//!   successful_providers INTEGER NOT NULL DEFAULT 0,
//!   failed_providers INTEGER NOT NULL DEFAULT 0,
//!   started_at TIMESTAMP NOT NULL,
//!   completed_at TIMESTAMP,
//!   metadata JSONB
//! );
//! ```
//!
//! A run with failures still ends `completed`; there is no separate failed
//! terminal state. Runs interrupted by a crash stay `running`.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use std::fmt;
use std::str::FromStr;

/// Lifecycle of a run row
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    #[default]
    Running,
    Completed,
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Running => write!(f, "running"),
            Self::Completed => write!(f, "completed"),
        }
    }
}

impl FromStr for RunStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "running" => Ok(Self::Running),
            "completed" => Ok(Self::Completed),
            _ => Err(format!("Invalid run status: {s}")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct PipelineRun {
    pub id: String,
    pub run_type: String,
    pub status: String,
    pub total_providers: i32,
    pub successful_providers: i32,
    pub failed_providers: i32,
    pub started_at: NaiveDateTime,
    pub completed_at: Option<NaiveDateTime>,
    pub metadata: Option<serde_json::Value>,
}

/// New PipelineRun for creation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewPipelineRun {
    pub id: String,
    pub run_type: String,
    pub started_at: NaiveDateTime,
    pub metadata: Option<serde_json::Value>,
}

/// Final counters written when a run completes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunCompletion {
    pub total_providers: i32,
    pub successful_providers: i32,
    pub failed_providers: i32,
    pub completed_at: NaiveDateTime,
}

impl PipelineRun {
    /// Parsed status; unknown values are reported as running
    pub fn run_status(&self) -> RunStatus {
        self.status.parse().unwrap_or_default()
    }

    /// Build the row an in-process store keeps for a new run
    pub fn from_new(new_run: NewPipelineRun) -> Self {
        Self {
            id: new_run.id,
            run_type: new_run.run_type,
            status: RunStatus::Running.to_string(),
            total_providers: 0,
            successful_providers: 0,
            failed_providers: 0,
            started_at: new_run.started_at,
            completed_at: None,
            metadata: new_run.metadata,
        }
    }

    /// Insert a `running` row
    pub async fn create(
        pool: &PgPool,
        new_run: NewPipelineRun,
    ) -> Result<PipelineRun, sqlx::Error> {
        sqlx::query_as::<_, PipelineRun>(
            r#"
            INSERT INTO pipeline_runs
                (id, run_type, status, total_providers, successful_providers,
                 failed_providers, started_at, metadata)
            VALUES ($1, $2, $3, 0, 0, 0, $4, $5)
            RETURNING id, run_type, status, total_providers, successful_providers,
                      failed_providers, started_at, completed_at, metadata
            "#,
        )
        .bind(&new_run.id)
        .bind(&new_run.run_type)
        .bind(RunStatus::Running.to_string())
        .bind(new_run.started_at)
        .bind(&new_run.metadata)
        .fetch_one(pool)
        .await
    }

    pub async fn find_by_id(pool: &PgPool, id: &str) -> Result<Option<PipelineRun>, sqlx::Error> {
        sqlx::query_as::<_, PipelineRun>(
            r#"
            SELECT id, run_type, status, total_providers, successful_providers,
                   failed_providers, started_at, completed_at, metadata
            FROM pipeline_runs
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(pool)
        .await
    }

    /// Most recently started runs first
    pub async fn recent(pool: &PgPool, limit: i64) -> Result<Vec<PipelineRun>, sqlx::Error> {
        sqlx::query_as::<_, PipelineRun>(
            r#"
            SELECT id, run_type, status, total_providers, successful_providers,
                   failed_providers, started_at, completed_at, metadata
            FROM pipeline_runs
            ORDER BY started_at DESC
            LIMIT $1
            "#,
        )
        .bind(limit)
        .fetch_all(pool)
        .await
    }

    /// Returns false when no row matched
    pub async fn update_total_providers(
        pool: &PgPool,
        id: &str,
        total: i32,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("UPDATE pipeline_runs SET total_providers = $2 WHERE id = $1")
            .bind(id)
            .bind(total)
            .execute(pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Mark the run completed and write its final counters
    pub async fn complete(
        pool: &PgPool,
        id: &str,
        completion: RunCompletion,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE pipeline_runs
            SET status = $2,
                total_providers = $3,
                successful_providers = $4,
                failed_providers = $5,
                completed_at = $6
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(RunStatus::Completed.to_string())
        .bind(completion.total_providers)
        .bind(completion.successful_providers)
        .bind(completion.failed_providers)
        .bind(completion.completed_at)
        .execute(pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }
}
