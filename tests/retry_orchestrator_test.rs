//! Retry loop behaviour: attempt cap, backoff schedule and the api_limit short-circuit.

use provider_pipeline::context::PipelineContext;
use provider_pipeline::models::FailureReason;
use provider_pipeline::orchestration::{
    RetryDisposition, RetryOrchestrator, RetryPolicy, StepOutcome,
};
use provider_pipeline::store::InMemoryPipelineStore;
use provider_pipeline::tracker::PipelineTracker;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

const BASE: Duration = Duration::from_millis(1);

async fn tracker_with(store: &Arc<InMemoryPipelineStore>) -> PipelineTracker {
    PipelineTracker::start(PipelineContext::in_memory().with_store(store.clone()), "test").await
}

#[tokio::test]
async fn test_persistent_processing_error_hits_retry_cap() {
    let store = Arc::new(InMemoryPipelineStore::new());
    let mut tracker = tracker_with(&store).await;
    let orchestrator = RetryOrchestrator::new(RetryPolicy::new(3, BASE));
    let calls = AtomicU32::new(0);

    let report = orchestrator
        .execute(&mut tracker, 1, "A", "ai_content", |_| {
            calls.fetch_add(1, Ordering::SeqCst);
            async {
                StepOutcome::<()>::from_error(&"unexpected response shape")
            }
        })
        .await;

    assert_eq!(calls.load(Ordering::SeqCst), 4);
    assert_eq!(report.attempts, 4);
    assert_eq!(report.disposition, RetryDisposition::Exhausted);
    assert_eq!(report.recorded_reason, Some(FailureReason::MaxRetriesExceeded));
    assert_eq!(report.last_attempt_reason, Some(FailureReason::ProcessingError));
    assert_eq!(report.delays, vec![BASE, BASE * 2, BASE * 4]);

    let failures = store.failures();
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].failure_reason, "max_retries_exceeded");
    assert_eq!(failures[0].retry_count, 3);
    assert_eq!(failures[0].step, "ai_content");
    assert!(failures[0]
        .error_details
        .as_deref()
        .is_some_and(|details| details.contains("unexpected response shape")));
}

#[tokio::test]
async fn test_api_limit_short_circuits_without_sleeping() {
    let store = Arc::new(InMemoryPipelineStore::new());
    let mut tracker = tracker_with(&store).await;
    let orchestrator = RetryOrchestrator::new(RetryPolicy::new(3, BASE));

    let report = orchestrator
        .execute(&mut tracker, 2, "B", "geocoding", |attempt| async move {
            if attempt == 0 {
                StepOutcome::<()>::from_error(&"failed to parse geocoder payload")
            } else {
                StepOutcome::from_error(&"OVER_QUERY_LIMIT: quota exceeded")
            }
        })
        .await;

    assert_eq!(report.attempts, 2);
    assert_eq!(report.disposition, RetryDisposition::Aborted);
    // one sleep after attempt 1, none after the api_limit attempt
    assert_eq!(report.delays, vec![BASE]);
    assert_eq!(report.recorded_reason, Some(FailureReason::ApiLimit));

    let failures = store.failures();
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].failure_reason, "api_limit");
    assert_eq!(failures[0].retry_count, 1);
    assert_eq!(tracker.api_limit_hits().get("geocoding").map(Vec::len), Some(1));
}

#[tokio::test]
async fn test_api_limit_reported_as_retriable_still_stops() {
    let store = Arc::new(InMemoryPipelineStore::new());
    let mut tracker = tracker_with(&store).await;
    let orchestrator = RetryOrchestrator::new(RetryPolicy::new(3, BASE));

    let report: provider_pipeline::orchestration::RetryReport<()> = orchestrator
        .execute(&mut tracker, 2, "B", "google_data", |_| async {
            StepOutcome::Retriable {
                reason: FailureReason::ApiLimit,
                details: "daily quota".to_string(),
            }
        })
        .await;

    assert_eq!(report.attempts, 1);
    assert!(report.delays.is_empty());
    assert_eq!(store.failures()[0].retry_count, 0);
}

#[tokio::test]
async fn test_free_text_api_limit_label_stops_and_counts_as_hit() {
    let store = Arc::new(InMemoryPipelineStore::new());
    let mut tracker = tracker_with(&store).await;
    let orchestrator = RetryOrchestrator::new(RetryPolicy::new(3, BASE));

    let report = orchestrator
        .execute(&mut tracker, 5, "E", "ai_content", |_| async {
            StepOutcome::<()>::Retriable {
                reason: FailureReason::Other("api_limit".to_string()),
                details: "quota exceeded".to_string(),
            }
        })
        .await;

    assert_eq!(report.disposition, RetryDisposition::Aborted);
    assert_eq!(report.attempts, 1);
    assert!(report.delays.is_empty());
    assert_eq!(store.failures()[0].failure_reason, "api_limit");
    assert_eq!(tracker.api_limit_hits()["ai_content"].len(), 1);
}

#[tokio::test]
async fn test_success_after_retries_logs_attempt_number() {
    let store = Arc::new(InMemoryPipelineStore::new());
    let mut tracker = tracker_with(&store).await;
    let orchestrator = RetryOrchestrator::new(RetryPolicy::new(3, BASE));

    let report = orchestrator
        .execute(&mut tracker, 3, "C", "geocoding", |attempt| async move {
            match attempt {
                0 => StepOutcome::from_error(&"connection reset by peer"),
                1 => StepOutcome::Incomplete,
                _ => StepOutcome::Completed((40.7, -73.9)),
            }
        })
        .await;

    assert!(report.is_success());
    assert_eq!(report.value, Some((40.7, -73.9)));
    assert_eq!(report.attempts, 3);
    assert!(store.failures().is_empty());

    let events = store.step_events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].step, "geocoding");
    assert_eq!(events[0].details, Some(serde_json::json!({ "attempt": 3 })));
}

#[tokio::test]
async fn test_zero_retries_runs_once() {
    let store = Arc::new(InMemoryPipelineStore::new());
    let mut tracker = tracker_with(&store).await;
    let orchestrator = RetryOrchestrator::new(RetryPolicy::new(0, BASE));

    let report = orchestrator
        .execute(&mut tracker, 4, "D", "wp_preparation", |_| async {
            StepOutcome::<()>::Incomplete
        })
        .await;

    assert_eq!(report.attempts, 1);
    assert!(report.delays.is_empty());
    assert_eq!(store.failures()[0].failure_reason, "max_retries_exceeded");
    assert_eq!(store.failures()[0].retry_count, 0);
}
