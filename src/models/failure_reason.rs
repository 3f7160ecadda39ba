//! # Failure Reasons
//!
//! Categorical labels explaining why a step attempt did not succeed. The set is
//! closed for the reasons the pipeline acts on and open through [`FailureReason::Other`]
//! for labels recorded by other callers; the storage column stays free text.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum FailureReason {
    /// Upstream rate limit or quota; not retried within a run
    ApiLimit,
    Timeout,
    NetworkError,
    ProcessingError,
    /// Retry budget ran out; replaces the last per-attempt reason
    MaxRetriesExceeded,
    PreparationError,
    SyncFailed,
    GenerationFailed,
    Other(String),
}

impl FailureReason {
    pub fn as_str(&self) -> &str {
        match self {
            Self::ApiLimit => "api_limit",
            Self::Timeout => "timeout",
            Self::NetworkError => "network_error",
            Self::ProcessingError => "processing_error",
            Self::MaxRetriesExceeded => "max_retries_exceeded",
            Self::PreparationError => "preparation_error",
            Self::SyncFailed => "sync_failed",
            Self::GenerationFailed => "generation_failed",
            Self::Other(label) => label,
        }
    }

    /// Whether the retry loop may attempt the step again after this reason
    pub fn is_retriable(&self) -> bool {
        !self.is_api_limit()
    }

    /// Matches on the label, so `Other("api_limit")` counts too
    pub fn is_api_limit(&self) -> bool {
        self.as_str() == Self::ApiLimit.as_str()
    }
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FailureReason {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "api_limit" => Self::ApiLimit,
            "timeout" => Self::Timeout,
            "network_error" => Self::NetworkError,
            "processing_error" => Self::ProcessingError,
            "max_retries_exceeded" => Self::MaxRetriesExceeded,
            "preparation_error" => Self::PreparationError,
            "sync_failed" => Self::SyncFailed,
            "generation_failed" => Self::GenerationFailed,
            other => Self::Other(other.to_string()),
        })
    }
}

impl From<&str> for FailureReason {
    fn from(value: &str) -> Self {
        match value.parse() {
            Ok(reason) => reason,
            Err(never) => match never {},
        }
    }
}

impl Serialize for FailureReason {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for FailureReason {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let label = String::deserialize(deserializer)?;
        Ok(FailureReason::from(label.as_str()))
    }
}
