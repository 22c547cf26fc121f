//! One-shot queue read block

use async_trait::async_trait;
use tracing::info;

use super::{Block, BlockContext, BlockKind, BlockOutput};
use crate::consumer::{ConsumerState, PollCycleController};
use crate::error::Result;
use crate::state_machine::HealthReport;

/// Reads one batch per trigger; failures are reported as output, never raised
pub struct ReadQueueBlock {
    context: BlockContext,
    controller: PollCycleController,
}

impl ReadQueueBlock {
    pub fn new(context: BlockContext) -> Self {
        let controller = context.controller();
        Self {
            context,
            controller,
        }
    }
}

#[async_trait]
impl Block for ReadQueueBlock {
    fn kind(&self) -> BlockKind {
        BlockKind::ReadQueue
    }

    async fn on_activate(&mut self) -> HealthReport {
        let config = &self.context.config;
        match config.validate().and_then(|()| config.credential().map(|_| ())) {
            Ok(()) => HealthReport::ready(),
            Err(e) => HealthReport::failed(e.to_string()),
        }
    }

    async fn on_trigger(&mut self) -> BlockOutput {
        let config = &self.context.config;
        let credential = match config.credential() {
            Ok(credential) => credential,
            Err(e) => {
                return BlockOutput::Error {
                    diagnostic: e.to_string(),
                    messages: Vec::new(),
                }
            }
        };

        self.controller.run_cycle(config, credential).await.into()
    }

    async fn on_drain(&mut self) -> Result<()> {
        ConsumerState::clear(self.context.store.as_ref()).await?;
        info!(queue_name = %self.context.config.queue_name, "🧹 Read block drained");
        Ok(())
    }
}
