//! Outcome types shared by the retry orchestrator and step handlers.

use crate::models::FailureReason;
use crate::orchestration::error_classifier::{classify_error_message, ClassifyFailure};
use serde::{Deserialize, Serialize};
use std::fmt::Display;

/// Result of one attempt at a unit of work
///
/// Replaces exception-driven control flow: the unit of work states whether it
/// finished, produced nothing, or failed in a way that may or may not be retried.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", content = "value", rename_all = "snake_case")]
pub enum StepOutcome<T = ()> {
    Completed(T),
    /// Returned without error but without a result; retried like a failure
    Incomplete,
    Retriable { reason: FailureReason, details: String },
    /// Stop retrying immediately
    Fatal { reason: FailureReason, details: String },
}

impl<T> StepOutcome<T> {
    /// Fatal when the reason cannot be retried, retriable otherwise
    pub fn failed(reason: FailureReason, details: impl Into<String>) -> Self {
        let details = details.into();
        if reason.is_retriable() {
            Self::Retriable { reason, details }
        } else {
            Self::Fatal { reason, details }
        }
    }

    /// Classify an error by its message
    pub fn from_error<E: Display + ?Sized>(error: &E) -> Self {
        let details = error.to_string();
        Self::failed(classify_error_message(&details), details)
    }

    /// Classify an error through its own typed classification
    pub fn from_classified_error<E: ClassifyFailure + Display + ?Sized>(error: &E) -> Self {
        Self::failed(error.failure_reason(), error.to_string())
    }

    pub fn from_result<E: Display>(result: Result<T, E>) -> Self {
        match result {
            Ok(value) => Self::Completed(value),
            Err(error) => Self::from_error(&error),
        }
    }

    pub fn from_classified_result<E: ClassifyFailure + Display>(result: Result<T, E>) -> Self {
        match result {
            Ok(value) => Self::Completed(value),
            Err(error) => Self::from_classified_error(&error),
        }
    }

    pub fn is_completed(&self) -> bool {
        matches!(self, Self::Completed(_))
    }

    pub fn reason(&self) -> Option<&FailureReason> {
        match self {
            Self::Retriable { reason, .. } | Self::Fatal { reason, .. } => Some(reason),
            _ => None,
        }
    }
}

impl<T> From<Option<T>> for StepOutcome<T> {
    fn from(value: Option<T>) -> Self {
        match value {
            Some(value) => Self::Completed(value),
            None => Self::Incomplete,
        }
    }
}

impl From<bool> for StepOutcome<()> {
    fn from(value: bool) -> Self {
        if value {
            Self::Completed(())
        } else {
            Self::Incomplete
        }
    }
}
