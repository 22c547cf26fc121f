use serde::{Deserialize, Serialize};

/// Events that drive health transitions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum LifecycleEvent {
    /// Probe reached the queue
    ProbeSucceeded,
    /// Probe failed with a diagnostic
    ProbeFailed(String),
    /// Configuration cannot work; not retried automatically
    ConfigurationInvalid(String),
    /// Operator removed the block
    DrainRequested,
}

impl LifecycleEvent {
    /// Get a string representation of the event type for logging
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::ProbeSucceeded => "probe_succeeded",
            Self::ProbeFailed(_) => "probe_failed",
            Self::ConfigurationInvalid(_) => "configuration_invalid",
            Self::DrainRequested => "drain_requested",
        }
    }

    /// Diagnostic carried by failure events
    pub fn description(&self) -> Option<&str> {
        match self {
            Self::ProbeFailed(msg) | Self::ConfigurationInvalid(msg) => Some(msg),
            _ => None,
        }
    }
}
