//! Tracker integration tests against the in-memory store.

use provider_pipeline::context::PipelineContext;
use provider_pipeline::models::{FailureReason, RunStatus};
use provider_pipeline::store::InMemoryPipelineStore;
use provider_pipeline::tracker::PipelineTracker;
use std::sync::Arc;

fn context(store: &Arc<InMemoryPipelineStore>) -> PipelineContext {
    PipelineContext::in_memory().with_store(store.clone())
}

#[tokio::test]
async fn test_end_to_end_two_provider_run() {
    let store = Arc::new(InMemoryPipelineStore::new());
    let mut tracker = PipelineTracker::start(context(&store), "test").await;
    tracker.set_total_providers(2).await;

    tracker
        .log_failure(1, "A", "ai_content", FailureReason::Timeout, Some("boom"))
        .await;
    tracker.log_success(1, "A", &["ai_content"]).await;

    tracker
        .log_failure(2, "B", "geocoding", FailureReason::ApiLimit, Some("quota"))
        .await;

    let summary = tracker.complete_pipeline().await;

    let unresolved = tracker.get_unresolved_failures().await;
    assert_eq!(unresolved.len(), 1);
    assert_eq!(unresolved[0].failure.provider_id, 2);
    assert_eq!(unresolved[0].failure.step, "geocoding");
    assert_eq!(unresolved[0].failure.reason(), FailureReason::ApiLimit);

    assert_eq!(summary.successful_providers, 1);
    assert_eq!(summary.failed_providers, 1);
    assert_eq!(summary.total_providers, 2);
    assert!(summary.recorded);

    let run = store.runs().pop().unwrap();
    assert_eq!(run.run_status(), RunStatus::Completed);
    assert_eq!(run.successful_providers, 1);
    assert_eq!(run.failed_providers, 1);
    assert!(run.completed_at.is_some());
}

#[tokio::test]
async fn test_recovered_provider_still_counts_as_failed() {
    let store = Arc::new(InMemoryPipelineStore::new());
    let mut tracker = PipelineTracker::start(context(&store), "automation").await;
    tracker.set_total_providers(1).await;

    tracker
        .log_failure(7, "Harbor Dental", "geocoding", FailureReason::NetworkError, None)
        .await;
    tracker.log_success(7, "Harbor Dental", &["geocoding"]).await;

    let summary = tracker.complete_pipeline().await;
    assert_eq!(summary.successful_providers, 1);
    assert_eq!(summary.failed_providers, 1);
    assert!(tracker.get_unresolved_failures().await.is_empty());
}

#[tokio::test]
async fn test_success_resolves_failures_from_every_step_and_run() {
    let store = Arc::new(InMemoryPipelineStore::new());

    let mut first = PipelineTracker::start(context(&store), "automation").await;
    first
        .log_failure(3, "Lakeside", "google_data", FailureReason::Timeout, None)
        .await;
    first
        .log_failure(3, "Lakeside", "wp_preparation", FailureReason::PreparationError, None)
        .await;
    first
        .log_failure(4, "Other", "geocoding", FailureReason::Timeout, None)
        .await;
    first.complete_pipeline().await;

    let mut second = PipelineTracker::start(context(&store), "retry").await;
    second.log_success(3, "Lakeside", &["google_data", "wp_preparation"]).await;
    second.complete_pipeline().await;

    let unresolved = second.get_unresolved_failures().await;
    assert!(unresolved.iter().all(|entry| entry.failure.provider_id != 3));
    assert_eq!(unresolved.len(), 1);

    let resolved: Vec<_> = store
        .failures()
        .into_iter()
        .filter(|failure| failure.provider_id == 3)
        .collect();
    assert!(resolved.iter().all(|failure| failure.resolved && failure.resolved_at.is_some()));
}

#[tokio::test]
async fn test_unresolved_listing_uses_current_provider_name() {
    let store = Arc::new(InMemoryPipelineStore::new());
    store.set_provider_name(5, "Renamed Clinic");

    let mut tracker = PipelineTracker::start(context(&store), "automation").await;
    tracker
        .log_failure(5, "Old Clinic", "ai_content", FailureReason::GenerationFailed, None)
        .await;
    tracker
        .log_failure(6, "Unknown Clinic", "ai_content", FailureReason::GenerationFailed, None)
        .await;

    let unresolved = tracker.get_unresolved_failures().await;
    // newest first
    assert_eq!(unresolved[0].display_name, "Unknown Clinic");
    assert_eq!(unresolved[1].display_name, "Renamed Clinic");
    assert_eq!(unresolved[1].failure.provider_name, "Old Clinic");
}

#[tokio::test]
async fn test_retry_failed_step_is_bookkeeping_only() {
    let store = Arc::new(InMemoryPipelineStore::new());
    let mut tracker = PipelineTracker::start(context(&store), "automation").await;

    let failure_id = tracker
        .log_failure(1, "A", "geocoding", FailureReason::Timeout, None)
        .await
        .unwrap();

    assert!(tracker.retry_failed_step(failure_id).await);
    assert!(tracker.retry_failed_step(failure_id).await);
    assert!(!tracker.retry_failed_step(failure_id + 100).await);

    let failures = store.failures();
    assert_eq!(failures[0].retry_count, 2);
    assert!(!failures[0].resolved);
    assert!(store.step_events().is_empty());
}

#[tokio::test]
async fn test_failure_stats_group_by_step_and_reason() {
    let store = Arc::new(InMemoryPipelineStore::new());
    let mut tracker = PipelineTracker::start(context(&store), "automation").await;

    tracker
        .log_failure(1, "A", "geocoding", FailureReason::Timeout, None)
        .await;
    tracker
        .log_failure(2, "B", "geocoding", FailureReason::Timeout, None)
        .await;
    tracker
        .log_failure(3, "C", "ai_content", FailureReason::ApiLimit, None)
        .await;
    tracker.log_success(1, "A", &["geocoding"]).await;

    let stats = tracker.get_failure_stats().await;
    assert_eq!(stats.window_days, 7);
    assert_eq!(stats.total(), 3);
    assert_eq!(stats.unresolved(), 2);

    let geocoding = &stats.rows[0];
    assert_eq!(geocoding.step, "geocoding");
    assert_eq!(geocoding.failure_reason, "timeout");
    assert_eq!(geocoding.total, 2);
    assert_eq!(geocoding.resolved_count, 1);
    assert_eq!(geocoding.unresolved_count, 1);
}

#[tokio::test]
async fn test_run_metadata_is_stored() {
    let store = Arc::new(InMemoryPipelineStore::new());
    let tracker = PipelineTracker::start_with_metadata(
        context(&store),
        "bulk_retry",
        Some(serde_json::json!({ "batch": 12 })),
    )
    .await;

    let run = store.runs().pop().unwrap();
    assert_eq!(run.id, tracker.run_id());
    assert_eq!(run.metadata, Some(serde_json::json!({ "batch": 12 })));
}
