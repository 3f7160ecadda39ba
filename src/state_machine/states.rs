use serde::{Deserialize, Serialize};
use std::fmt;

/// Ordered processing stages of a provider; declaration order is execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStep {
    /// Google Places details and reviews collected
    GoogleData,
    /// Address resolved to coordinates
    Geocoding,
    /// Generated directory content present
    AiContent,
    /// WordPress post fields prepared
    WpPreparation,
}

impl PipelineStep {
    pub const ALL: [PipelineStep; 4] = [
        Self::GoogleData,
        Self::Geocoding,
        Self::AiContent,
        Self::WpPreparation,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::GoogleData => "google_data",
            Self::Geocoding => "geocoding",
            Self::AiContent => "ai_content",
            Self::WpPreparation => "wp_preparation",
        }
    }
}

impl fmt::Display for PipelineStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for PipelineStep {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "google_data" => Ok(Self::GoogleData),
            "geocoding" => Ok(Self::Geocoding),
            "ai_content" => Ok(Self::AiContent),
            "wp_preparation" => Ok(Self::WpPreparation),
            _ => Err(format!("Invalid pipeline step: {s}")),
        }
    }
}

/// Per-provider pipeline state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderState {
    /// Not yet processed in this run
    #[default]
    Pending,
    GoogleData,
    Geocoding,
    AiContent,
    WpPreparation,
    /// Every step's completion check passed
    Approved,
    /// At least one step is still incomplete after the pass
    Stuck,
}

impl ProviderState {
    /// Check if this is a terminal state for the current pass
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Approved | Self::Stuck)
    }

    /// State entered while the given step is processed
    pub fn for_step(step: PipelineStep) -> Self {
        match step {
            PipelineStep::GoogleData => Self::GoogleData,
            PipelineStep::Geocoding => Self::Geocoding,
            PipelineStep::AiContent => Self::AiContent,
            PipelineStep::WpPreparation => Self::WpPreparation,
        }
    }
}

impl fmt::Display for ProviderState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::GoogleData => write!(f, "google_data"),
            Self::Geocoding => write!(f, "geocoding"),
            Self::AiContent => write!(f, "ai_content"),
            Self::WpPreparation => write!(f, "wp_preparation"),
            Self::Approved => write!(f, "approved"),
            Self::Stuck => write!(f, "stuck"),
        }
    }
}

impl std::str::FromStr for ProviderState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "google_data" => Ok(Self::GoogleData),
            "geocoding" => Ok(Self::Geocoding),
            "ai_content" => Ok(Self::AiContent),
            "wp_preparation" => Ok(Self::WpPreparation),
            "approved" => Ok(Self::Approved),
            "stuck" => Ok(Self::Stuck),
            _ => Err(format!("Invalid provider state: {s}")),
        }
    }
}
