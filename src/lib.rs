#![allow(clippy::doc_markdown)] // Allow technical terms like PostgreSQL, SQLx in docs
#![allow(clippy::missing_errors_doc)] // Allow public functions without # Errors sections
#![allow(clippy::must_use_candidate)] // Allow methods without must_use when context is clear

//! # Provider Pipeline
//!
//! Execution tracking and retry orchestration for the provider enrichment
//! pipeline of a healthcare directory.
//!
//! ## Overview
//!
//! Providers are enriched in a fixed order (Google data, geocoding, AI
//! content, WordPress preparation). Each pass over a batch of providers is a
//! tracked **run**; every step failure becomes a persisted failure record with
//! a categorical reason, and a provider's failures are resolved as soon as the
//! provider completes the pipeline.
//!
//! ## Module Organization
//!
//! - [`tracker`] - Run lifecycle, failure and success recording
//! - [`orchestration`] - Retry loop, per-provider pipeline and batch runner
//! - [`store`] - Persistence port with PostgreSQL and in-memory stores
//! - [`models`] - Run, failure and step-event records
//! - [`reporting`] - Run summaries, grouped failure reports, statistics
//! - [`state_machine`] - Pipeline steps and provider states
//! - [`activity`] - Human-readable audit trail sink
//! - [`config`] - Layered configuration
//! - [`database`] - Connection pool and embedded migrations
//! - [`error`] - Structured error handling
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use provider_pipeline::context::PipelineContext;
//! use provider_pipeline::models::FailureReason;
//! use provider_pipeline::tracker::PipelineTracker;
//!
//! # async fn example() {
//! let mut tracker = PipelineTracker::start(PipelineContext::in_memory(), "automation").await;
//! tracker.set_total_providers(2).await;
//! tracker
//!     .log_failure(7, "Harbor Dental", "geocoding", FailureReason::Timeout, Some("slow"))
//!     .await;
//! tracker.log_success(8, "Bayside Vision", &["geocoding"]).await;
//!
//! let summary = tracker.complete_pipeline().await;
//! println!("{summary}");
//! # }
//! ```
//!
//! ## Testing
//!
//! ```bash
//! cargo test --lib    # Unit tests
//! cargo test          # Unit and integration tests
//! DATABASE_URL=postgresql://localhost/pipeline_test cargo test -- --ignored  # PostgreSQL store
//! ```

pub mod activity;
pub mod config;
pub mod constants;
pub mod context;
pub mod database;
pub mod error;
pub mod logging;
pub mod models;
pub mod orchestration;
pub mod reporting;
pub mod state_machine;
pub mod store;
pub mod test_utils;
pub mod tracker;

pub use activity::{ActivityLogger, ActivityRecord, ActivityStatus, TracingActivityLogger};
pub use config::{ConfigManager, PipelineConfig};
pub use context::PipelineContext;
pub use error::{PipelineError, PipelineResult};
pub use models::{FailureReason, ProviderRecord};
pub use orchestration::{
    PipelineRunner, ProviderPipeline, ProviderRepository, RetryOrchestrator, RetryPolicy,
    StepHandler, StepOutcome,
};
pub use reporting::{FailureReport, FailureReporter, FailureStatsReport, RunSummary};
pub use state_machine::{PipelineStep, ProviderState};
pub use store::{InMemoryPipelineStore, PgPipelineStore, PipelineStore};
pub use tracker::PipelineTracker;
