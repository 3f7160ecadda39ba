//! # Pipeline Failures
//!
//! Operator tool for inspecting pipeline failures and recording retries.
//! Exits 0 whenever the command itself completes, however many failures it
//! finds.

use anyhow::Context;
use clap::{Parser, Subcommand};
use provider_pipeline::config::ConfigManager;
use provider_pipeline::constants::run_types;
use provider_pipeline::context::PipelineContext;
use provider_pipeline::logging::init_structured_logging;
use provider_pipeline::reporting::FailureReporter;
use provider_pipeline::tracker::PipelineTracker;
use serde_json::json;
use std::path::PathBuf;
use tracing::info;

#[derive(Parser)]
#[command(name = "pipeline-failures")]
#[command(about = "Inspect provider pipeline failures")]
#[command(version = env!("CARGO_PKG_VERSION"))]
pub struct Cli {
    /// Configuration directory (default: config)
    #[arg(short, long)]
    config_dir: Option<PathBuf>,

    /// Verbose output level (use multiple times for more verbosity)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Unresolved failures grouped by step and reason
    Report,

    /// Failure counts for the last seven days
    Stats,

    /// Most recent pipeline runs
    Runs {
        /// Number of runs to show (default from configuration)
        #[arg(short, long)]
        limit: Option<i64>,
    },

    /// Record a retry for one failure
    Retry {
        #[arg(long)]
        failure_id: i32,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config_manager = ConfigManager::load_from_directory(cli.config_dir.clone())
        .context("loading configuration")?;

    let mut logging = config_manager.config().logging.clone();
    match cli.verbose {
        0 => {}
        1 => logging.level = Some("info".to_string()),
        2 => logging.level = Some("debug".to_string()),
        _ => logging.level = Some("trace".to_string()),
    }
    init_structured_logging(&logging);

    let context = PipelineContext::from_config_manager(&config_manager)
        .await
        .context("connecting to the pipeline database")?;

    match cli.command {
        Commands::Report => {
            let report = FailureReporter::new(context).unresolved_report().await?;
            print!("{report}");
        }
        Commands::Stats => {
            let stats = FailureReporter::new(context).failure_stats().await?;
            print!("{stats}");
        }
        Commands::Runs { limit } => {
            let runs = FailureReporter::new(context).recent_runs(limit).await?;
            if runs.is_empty() {
                println!("No pipeline runs recorded");
            }
            for run in runs {
                println!(
                    "{}  {:<16} {:<10} {:>4} total {:>4} ok {:>4} failed  started {}",
                    run.id,
                    run.run_type,
                    run.status,
                    run.total_providers,
                    run.successful_providers,
                    run.failed_providers,
                    run.started_at
                );
            }
        }
        Commands::Retry { failure_id } => {
            let mut tracker = PipelineTracker::start_with_metadata(
                context,
                run_types::RETRY,
                Some(json!({ "failure_id": failure_id })),
            )
            .await;
            let recorded = tracker.retry_failed_step(failure_id).await;
            let summary = tracker.complete_pipeline().await;
            info!(run_id = %summary.run_id, failure_id, recorded, "Retry command finished");

            if recorded {
                println!("Retry recorded for failure {failure_id} (run {})", summary.run_id);
            } else {
                println!("Failure {failure_id} not found; nothing recorded");
            }
        }
    }

    Ok(())
}
