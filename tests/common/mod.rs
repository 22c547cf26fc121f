//! Shared harness for integration suites
#![allow(dead_code)]

pub mod strategies;

use std::sync::Arc;

use servicebus_consumer::blocks::BlockContext;
use servicebus_consumer::config::ConsumerConfig;
use servicebus_consumer::consumer::{BufferSink, InMemoryStateStore, PollCycleController};
use servicebus_consumer::messaging::{Credential, InMemoryQueueProvider, QueueMessage};

pub const QUEUE: &str = "orders";

pub fn credential() -> Credential {
    Credential::bearer_token("integration-token", None)
}

/// Consumer wiring over an in-memory queue
pub struct Harness {
    pub memory: InMemoryQueueProvider,
    pub sink: BufferSink,
    pub store: InMemoryStateStore,
    pub config: ConsumerConfig,
}

impl Harness {
    pub fn new() -> Self {
        Self {
            memory: InMemoryQueueProvider::with_queues(&[QUEUE]),
            sink: BufferSink::new(),
            store: InMemoryStateStore::new(),
            config: ConsumerConfig::new(QUEUE)
                .with_receive_timeout_seconds(0.05)
                .with_credential(credential()),
        }
    }

    pub fn controller(&self) -> PollCycleController {
        PollCycleController::new(
            self.memory.clone().into(),
            Arc::new(self.store.clone()),
            Arc::new(self.sink.clone()),
        )
    }

    pub fn block_context(&self) -> BlockContext {
        BlockContext::new(
            self.config.clone(),
            self.memory.clone().into(),
            Arc::new(self.store.clone()),
            Arc::new(self.sink.clone()),
        )
    }

    /// Enqueue bodies with ids `m-1`, `m-2`, ...
    pub fn seed(&self, bodies: &[&str]) {
        for (index, body) in bodies.iter().enumerate() {
            self.memory
                .send(
                    QUEUE,
                    QueueMessage::new(*body).with_message_id(format!("m-{}", index + 1)),
                )
                .expect("queue exists");
        }
    }
}

impl Default for Harness {
    fn default() -> Self {
        Self::new()
    }
}
