//! # Step Failure Classification
//!
//! Maps errors raised by step work onto [`FailureReason`]s.
//!
//! ## Strategies
//!
//! - **Typed**: error types from API clients implement [`ClassifyFailure`] and
//!   state their reason directly.
//! - **Message fallback**: [`classify_error_message`] inspects the error text
//!   for untyped errors.
//!
//! The message rules are matched case-insensitively in priority order:
//!
//! ```text
//! "rate limit" | "quota" | "too many requests"  -> api_limit
//! "timeout"                                     -> timeout
//! "network" | "connection"                      -> network_error
//! anything else                                 -> processing_error
//! ```
//!
//! Substring matching is coarse ("connection" also appears in unrelated
//! messages), but `api_limit` drives the retry short-circuit, so the rules are
//! kept exactly as operators rely on them.
//!
//! ```rust
//! use provider_pipeline::models::FailureReason;
//! use provider_pipeline::orchestration::error_classifier::classify_error_message;
//!
//! assert_eq!(classify_error_message("Quota exceeded for project"), FailureReason::ApiLimit);
//! assert_eq!(classify_error_message("read timeout after 30s"), FailureReason::Timeout);
//! assert_eq!(classify_error_message("unexpected EOF"), FailureReason::ProcessingError);
//! ```

use crate::models::FailureReason;

const API_LIMIT_MARKERS: &[&str] = &["rate limit", "quota", "too many requests"];
const TIMEOUT_MARKERS: &[&str] = &["timeout"];
const NETWORK_MARKERS: &[&str] = &["network", "connection"];

/// Errors that know which failure reason they represent
pub trait ClassifyFailure {
    fn failure_reason(&self) -> FailureReason;
}

impl ClassifyFailure for FailureReason {
    fn failure_reason(&self) -> FailureReason {
        self.clone()
    }
}

/// Classify an error message by substring, in priority order
pub fn classify_error_message(message: &str) -> FailureReason {
    let message = message.to_lowercase();
    let contains_any = |markers: &[&str]| markers.iter().any(|marker| message.contains(marker));

    if contains_any(API_LIMIT_MARKERS) {
        FailureReason::ApiLimit
    } else if contains_any(TIMEOUT_MARKERS) {
        FailureReason::Timeout
    } else if contains_any(NETWORK_MARKERS) {
        FailureReason::NetworkError
    } else {
        FailureReason::ProcessingError
    }
}
