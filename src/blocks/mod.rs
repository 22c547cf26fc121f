//! # Consumer Blocks
//!
//! The host-facing units of deployment. Each [`BlockKind`] maps at compile
//! time to a [`Block`] implementation with a config schema, lifecycle hooks
//! and a trigger handler.
//!
//! - [`ReadQueueBlock`]: one-shot read; each trigger runs one poll cycle and
//!   reports failures as an `error` output rather than failing the trigger
//! - [`QueueSubscriptionBlock`]: scheduled subscription that owns the health
//!   lifecycle

pub mod queue_subscription;
pub mod read_queue;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::fmt;
use std::sync::Arc;
use tokio::sync::watch;

use crate::config::ConsumerConfig;
use crate::constants::MAX_RECEIVE_TIMEOUT_SECONDS;
use crate::consumer::{EmissionSink, PollCycleController, PollCycleResult, StateStore};
use crate::error::{ConsumerError, Result};
use crate::messaging::{NormalizedMessage, QueueProvider};
use crate::state_machine::{HealthReport, HealthStatus};

pub use queue_subscription::QueueSubscriptionBlock;
pub use read_queue::ReadQueueBlock;

/// Every block this crate provides
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockKind {
    ReadQueue,
    QueueSubscription,
}

impl BlockKind {
    pub const ALL: [BlockKind; 2] = [BlockKind::ReadQueue, BlockKind::QueueSubscription];

    /// Construct the block implementation for this kind
    pub fn build(self, context: BlockContext) -> Box<dyn Block> {
        match self {
            Self::ReadQueue => Box::new(ReadQueueBlock::new(context)),
            Self::QueueSubscription => Box::new(QueueSubscriptionBlock::new(context)),
        }
    }

    /// JSON schema describing the block's configuration
    pub fn config_schema(self) -> Value {
        let mut properties = json!({
            "queue_name": {"type": "string", "minLength": 1, "description": "Queue to consume from"},
            "namespace": {"type": "string", "description": "Fully qualified Service Bus namespace host"},
            "max_messages": {"type": "integer", "minimum": 1, "default": 10, "description": "Messages per cycle, clamped to 2047"},
            "receive_timeout_seconds": {"type": "number", "exclusiveMinimum": 0, "maximum": MAX_RECEIVE_TIMEOUT_SECONDS, "default": 5.0},
            "include_raw_body": {"type": "boolean", "default": true},
            "credential": {
                "oneOf": [
                    {"type": "object", "required": ["connection_string"], "properties": {"connection_string": {"type": "string"}}},
                    {"type": "object", "required": ["bearer_token"], "properties": {"bearer_token": {"type": "string"}, "expires_at": {"type": "string", "format": "date-time"}}}
                ]
            }
        });

        if self == Self::QueueSubscription {
            properties["schedule"] = json!({
                "type": "object",
                "properties": {
                    "interval": {"type": "integer", "minimum": 1, "default": 30},
                    "unit": {"type": "string", "enum": ["seconds", "minutes", "hours", "days"], "default": "seconds"}
                }
            });
        }

        json!({
            "$schema": "https://json-schema.org/draft/2020-12/schema",
            "title": self.to_string(),
            "type": "object",
            "required": ["queue_name", "credential"],
            "properties": properties,
        })
    }
}

impl fmt::Display for BlockKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ReadQueue => write!(f, "read_queue"),
            Self::QueueSubscription => write!(f, "queue_subscription"),
        }
    }
}

impl std::str::FromStr for BlockKind {
    type Err = ConsumerError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "read_queue" => Ok(Self::ReadQueue),
            "queue_subscription" => Ok(Self::QueueSubscription),
            _ => Err(ConsumerError::configuration(format!("unknown block kind: {s}"))),
        }
    }
}

/// Collaborators handed to a block at construction
#[derive(Clone)]
pub struct BlockContext {
    pub config: ConsumerConfig,
    pub provider: QueueProvider,
    pub store: Arc<dyn StateStore>,
    pub sink: Arc<dyn EmissionSink>,
}

impl BlockContext {
    pub fn new(
        config: ConsumerConfig,
        provider: QueueProvider,
        store: Arc<dyn StateStore>,
        sink: Arc<dyn EmissionSink>,
    ) -> Self {
        Self {
            config,
            provider,
            store,
            sink,
        }
    }

    pub(crate) fn controller(&self) -> PollCycleController {
        PollCycleController::new(
            self.provider.clone(),
            Arc::clone(&self.store),
            Arc::clone(&self.sink),
        )
    }
}

/// Result of one block trigger
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum BlockOutput {
    /// Cycle completed
    Ok {
        count: usize,
        messages: Vec<NormalizedMessage>,
        #[serde(skip_serializing_if = "Vec::is_empty")]
        warnings: Vec<String>,
    },
    /// Cycle failed; messages emitted before the failure still stand
    Error {
        diagnostic: String,
        messages: Vec<NormalizedMessage>,
    },
    /// No cycle ran
    Skipped { health: HealthStatus },
}

impl BlockOutput {
    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error { .. })
    }

    pub fn messages(&self) -> &[NormalizedMessage] {
        match self {
            Self::Ok { messages, .. } | Self::Error { messages, .. } => messages,
            Self::Skipped { .. } => &[],
        }
    }
}

impl From<PollCycleResult> for BlockOutput {
    fn from(result: PollCycleResult) -> Self {
        match result.diagnostic() {
            None => Self::Ok {
                count: result.received_count,
                messages: result.messages,
                warnings: result.warnings,
            },
            Some(diagnostic) => Self::Error {
                diagnostic,
                messages: result.messages,
            },
        }
    }
}

/// A deployable consumer block
#[async_trait]
pub trait Block: Send + Sync {
    fn kind(&self) -> BlockKind;

    fn config_schema(&self) -> Value {
        self.kind().config_schema()
    }

    /// Called once when the host activates the block
    async fn on_activate(&mut self) -> HealthReport;

    /// Called on every scheduled or manual trigger
    async fn on_trigger(&mut self) -> BlockOutput;

    /// Called when the host removes the block
    async fn on_drain(&mut self) -> Result<()>;

    /// Live health updates, for blocks that track health
    fn health(&self) -> Option<watch::Receiver<HealthReport>> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consumer::CycleOutcome;

    #[test]
    fn test_kind_names_round_trip() {
        for kind in BlockKind::ALL {
            assert_eq!(kind.to_string().parse::<BlockKind>().unwrap(), kind);
        }
        assert!("send_message".parse::<BlockKind>().is_err());
    }

    #[test]
    fn test_schemas_differ_by_schedule() {
        let read = BlockKind::ReadQueue.config_schema();
        let subscription = BlockKind::QueueSubscription.config_schema();

        assert!(read["properties"].get("schedule").is_none());
        assert_eq!(
            subscription["properties"]["schedule"]["properties"]["interval"]["default"],
            json!(30)
        );
        assert_eq!(read["required"], json!(["queue_name", "credential"]));
    }

    #[test]
    fn test_cycle_error_becomes_error_output() {
        let result = PollCycleResult {
            received_count: 2,
            messages: Vec::new(),
            outcome: CycleOutcome::Error(ConsumerError::acknowledgment("m-1", "lock lost")),
            warnings: Vec::new(),
        };

        let output = BlockOutput::from(result);
        assert!(output.is_error());
        let rendered = serde_json::to_value(&output).unwrap();
        assert_eq!(rendered["status"], json!("error"));
        assert!(rendered["diagnostic"].as_str().unwrap().contains("m-1"));
    }
}
