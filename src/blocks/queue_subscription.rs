//! Scheduled queue subscription block

use async_trait::async_trait;
use tokio::sync::watch;

use super::{Block, BlockContext, BlockKind, BlockOutput};
use crate::error::{ConsumerError, Result};
use crate::state_machine::{HealthReport, LifecycleStateMachine};

/// Polls on every trigger and keeps the health lifecycle current
pub struct QueueSubscriptionBlock {
    context: BlockContext,
    lifecycle: Option<LifecycleStateMachine>,
}

impl QueueSubscriptionBlock {
    pub fn new(context: BlockContext) -> Self {
        Self {
            context,
            lifecycle: None,
        }
    }

    pub fn lifecycle(&self) -> Option<&LifecycleStateMachine> {
        self.lifecycle.as_ref()
    }
}

#[async_trait]
impl Block for QueueSubscriptionBlock {
    fn kind(&self) -> BlockKind {
        BlockKind::QueueSubscription
    }

    async fn on_activate(&mut self) -> HealthReport {
        let lifecycle =
            LifecycleStateMachine::activate(self.context.controller(), self.context.config.clone())
                .await;
        let report = lifecycle.report();
        self.lifecycle = Some(lifecycle);
        report
    }

    async fn on_trigger(&mut self) -> BlockOutput {
        let Some(lifecycle) = self.lifecycle.as_mut() else {
            return BlockOutput::Error {
                diagnostic: "block has not been activated".to_string(),
                messages: Vec::new(),
            };
        };

        let report = lifecycle.on_trigger().await;
        match report.cycle {
            Some(cycle) => cycle.into(),
            None => BlockOutput::Skipped {
                health: report.status,
            },
        }
    }

    async fn on_drain(&mut self) -> Result<()> {
        match self.lifecycle.as_mut() {
            Some(lifecycle) => lifecycle.drain().await,
            None => Err(ConsumerError::InvalidTransition {
                from: "inactive".to_string(),
                event: "drain_requested".to_string(),
            }),
        }
    }

    fn health(&self) -> Option<watch::Receiver<HealthReport>> {
        self.lifecycle.as_ref().map(LifecycleStateMachine::subscribe)
    }
}
