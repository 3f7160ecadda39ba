//! # Retry Orchestrator
//!
//! Runs one step's unit of work with bounded retries, exponential backoff and
//! failure classification, reporting the outcome to the run's tracker.
//!
//! ## Algorithm
//!
//! For `attempt` in `0..=max_retries`:
//!
//! 1. `Completed` records a step success with the attempt number and returns.
//! 2. `Incomplete` or a retriable failure sleeps `base_delay * 2^attempt` when
//!    attempts remain.
//! 3. `api_limit` (however it was reported) or `Fatal` stops at once and records
//!    a failure with that reason.
//!
//! When the budget runs out a single `max_retries_exceeded` failure is
//! recorded. The last per-attempt reason is returned in the [`RetryReport`] but
//! not persisted as the reason.
//!
//! The loop is sequential: no jitter, no ceiling on the delay.

use crate::config::RetryConfig;
use crate::models::FailureReason;
use crate::orchestration::types::StepOutcome;
use crate::tracker::PipelineTracker;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

/// Attempt budget and backoff base
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&RetryConfig::default())
    }
}

impl RetryPolicy {
    pub fn new(max_retries: u32, base_delay: Duration) -> Self {
        Self {
            max_retries,
            base_delay,
        }
    }

    pub fn from_config(config: &RetryConfig) -> Self {
        Self::new(config.max_retries, config.base_delay())
    }

    /// Delay slept after a failed attempt (0-based): `base_delay * 2^attempt`
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        self.base_delay.saturating_mul(2u32.saturating_pow(attempt))
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }
}

/// How the retry loop ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RetryDisposition {
    Succeeded,
    /// Stopped early on a non-retriable reason
    Aborted,
    /// Every attempt failed
    Exhausted,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryReport<T> {
    pub disposition: RetryDisposition,
    pub value: Option<T>,
    /// Invocations of the unit of work
    pub attempts: u32,
    /// Backoff delays actually slept, in order
    pub delays: Vec<Duration>,
    /// Reason written to the failure record
    pub recorded_reason: Option<FailureReason>,
    /// Reason of the final failed attempt
    pub last_attempt_reason: Option<FailureReason>,
    pub failure_id: Option<i32>,
}

impl<T> RetryReport<T> {
    pub fn is_success(&self) -> bool {
        self.disposition == RetryDisposition::Succeeded
    }
}

#[derive(Debug, Clone, Default)]
pub struct RetryOrchestrator {
    policy: RetryPolicy,
}

impl RetryOrchestrator {
    pub fn new(policy: RetryPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Execute `work` for one provider step; `work` receives the 0-based attempt
    pub async fn execute<T, F, Fut>(
        &self,
        tracker: &mut PipelineTracker,
        provider_id: i32,
        provider_name: &str,
        step: &str,
        mut work: F,
    ) -> RetryReport<T>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = StepOutcome<T>>,
    {
        let mut delays = Vec::new();
        let mut last_reason: Option<FailureReason> = None;
        let mut last_details = String::new();

        for attempt in 0..=self.policy.max_retries {
            let attempts = attempt + 1;

            match work(attempt).await {
                StepOutcome::Completed(value) => {
                    tracker
                        .log_step_success(
                            provider_id,
                            provider_name,
                            step,
                            Some(json!({ "attempt": attempts })),
                        )
                        .await;

                    return RetryReport {
                        disposition: RetryDisposition::Succeeded,
                        value: Some(value),
                        attempts,
                        delays,
                        recorded_reason: None,
                        last_attempt_reason: last_reason,
                        failure_id: None,
                    };
                }
                StepOutcome::Incomplete => {
                    debug!(
                        provider_id,
                        step = %step,
                        attempt = attempts,
                        "Step returned no result"
                    );
                    last_reason = None;
                    last_details = "step returned no result".to_string();
                }
                StepOutcome::Retriable { reason, details } if reason.is_retriable() => {
                    debug!(
                        provider_id,
                        step = %step,
                        attempt = attempts,
                        reason = %reason,
                        "Step attempt failed"
                    );
                    last_reason = Some(reason);
                    last_details = details;
                }
                StepOutcome::Retriable { reason, details }
                | StepOutcome::Fatal { reason, details } => {
                    warn!(
                        provider_id,
                        step = %step,
                        attempt = attempts,
                        reason = %reason,
                        "Step failed with non-retriable reason; abandoning retries"
                    );

                    let failure_id = tracker
                        .log_failure_with_retries(
                            provider_id,
                            provider_name,
                            step,
                            reason.clone(),
                            Some(details.as_str()),
                            attempt,
                        )
                        .await;

                    return RetryReport {
                        disposition: RetryDisposition::Aborted,
                        value: None,
                        attempts,
                        delays,
                        recorded_reason: Some(reason.clone()),
                        last_attempt_reason: Some(reason),
                        failure_id,
                    };
                }
            }

            if attempt < self.policy.max_retries {
                let delay = self.policy.backoff_delay(attempt);
                debug!(
                    provider_id,
                    step = %step,
                    delay_ms = delay.as_millis() as u64,
                    "Backing off before retry"
                );
                tokio::time::sleep(delay).await;
                delays.push(delay);
            }
        }

        let attempts = self.policy.max_attempts();
        warn!(provider_id, step = %step, attempts, "Step retries exhausted");

        let details = format!("{step} failed after {attempts} attempts: {last_details}");
        let failure_id = tracker
            .log_failure_with_retries(
                provider_id,
                provider_name,
                step,
                FailureReason::MaxRetriesExceeded,
                Some(details.as_str()),
                self.policy.max_retries,
            )
            .await;

        RetryReport {
            disposition: RetryDisposition::Exhausted,
            value: None,
            attempts,
            delays,
            recorded_reason: Some(FailureReason::MaxRetriesExceeded),
            last_attempt_reason: last_reason,
            failure_id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::PipelineContext;
    use proptest::prelude::*;

    #[test]
    fn test_backoff_doubles_without_ceiling() {
        let policy = RetryPolicy::new(10, Duration::from_secs(1));
        assert_eq!(policy.backoff_delay(0), Duration::from_secs(1));
        assert_eq!(policy.backoff_delay(1), Duration::from_secs(2));
        assert_eq!(policy.backoff_delay(3), Duration::from_secs(8));
        assert_eq!(policy.backoff_delay(10), Duration::from_secs(1024));
        assert_eq!(policy.max_attempts(), 11);
    }

    #[tokio::test]
    async fn test_success_on_first_attempt_does_not_sleep() {
        let mut tracker = PipelineTracker::start(PipelineContext::in_memory(), "test").await;
        let orchestrator = RetryOrchestrator::new(RetryPolicy::new(3, Duration::from_millis(1)));

        let report = orchestrator
            .execute(&mut tracker, 1, "A", "geocoding", |_| async {
                StepOutcome::Completed(42)
            })
            .await;

        assert!(report.is_success());
        assert_eq!(report.value, Some(42));
        assert_eq!(report.attempts, 1);
        assert!(report.delays.is_empty());
        assert!(tracker.failures().is_empty());
    }

    #[tokio::test]
    async fn test_incomplete_then_success() {
        let mut tracker = PipelineTracker::start(PipelineContext::in_memory(), "test").await;
        let orchestrator = RetryOrchestrator::new(RetryPolicy::new(3, Duration::from_millis(1)));

        let report = orchestrator
            .execute(&mut tracker, 1, "A", "ai_content", |attempt| async move {
                StepOutcome::from(attempt >= 2)
            })
            .await;

        assert!(report.is_success());
        assert_eq!(report.attempts, 3);
        assert_eq!(
            report.delays,
            vec![Duration::from_millis(1), Duration::from_millis(2)]
        );
        assert!(tracker.failures().is_empty());
    }

    #[tokio::test]
    async fn test_fatal_stops_immediately() {
        let mut tracker = PipelineTracker::start(PipelineContext::in_memory(), "test").await;
        let orchestrator = RetryOrchestrator::new(RetryPolicy::new(5, Duration::from_millis(1)));

        let report: RetryReport<()> = orchestrator
            .execute(&mut tracker, 1, "A", "wp_preparation", |_| async {
                StepOutcome::Fatal {
                    reason: FailureReason::PreparationError,
                    details: "missing slug".to_string(),
                }
            })
            .await;

        assert_eq!(report.disposition, RetryDisposition::Aborted);
        assert_eq!(report.attempts, 1);
        assert_eq!(report.recorded_reason, Some(FailureReason::PreparationError));
        assert_eq!(tracker.failures().len(), 1);
    }

    proptest! {
        #[test]
        fn prop_backoff_is_exponential(base_ms in 1u64..1000, attempt in 0u32..16) {
            let policy = RetryPolicy::new(16, Duration::from_millis(base_ms));
            prop_assert_eq!(
                policy.backoff_delay(attempt),
                Duration::from_millis(base_ms * (1u64 << attempt))
            );
        }
    }
}
