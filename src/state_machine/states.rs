use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Health of a consumer block as shown to operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthStatus {
    /// Last probe reached the queue
    Ready,
    /// Last probe failed, or the configuration is unusable
    Failed,
    /// Block removed; no further polling
    Drained,
}

impl HealthStatus {
    /// Check if this is a terminal state (no further transitions allowed)
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Drained)
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed)
    }
}

impl fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ready => write!(f, "ready"),
            Self::Failed => write!(f, "failed"),
            Self::Drained => write!(f, "drained"),
        }
    }
}

impl std::str::FromStr for HealthStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ready" => Ok(Self::Ready),
            "failed" => Ok(Self::Failed),
            "drained" => Ok(Self::Drained),
            _ => Err(format!("Invalid health status: {s}")),
        }
    }
}

/// Current status plus the description shown alongside `failed`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthReport {
    pub status: HealthStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub changed_at: DateTime<Utc>,
}

impl HealthReport {
    pub fn ready() -> Self {
        Self {
            status: HealthStatus::Ready,
            description: None,
            changed_at: Utc::now(),
        }
    }

    pub fn failed(description: impl Into<String>) -> Self {
        Self {
            status: HealthStatus::Failed,
            description: Some(description.into()),
            changed_at: Utc::now(),
        }
    }

    pub fn drained() -> Self {
        Self {
            status: HealthStatus::Drained,
            description: None,
            changed_at: Utc::now(),
        }
    }
}
