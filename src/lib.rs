#![allow(clippy::doc_markdown)] // Allow technical terms like ServiceBus, BrokerProperties in docs
#![allow(clippy::missing_errors_doc)] // Allow public functions without # Errors sections
#![allow(clippy::must_use_candidate)] // Allow methods without must_use when context is clear

//! # Service Bus Consumer
//!
//! At-least-once Azure Service Bus queue consumer with lifecycle health tracking.
//!
//! ## Overview
//!
//! A consumer polls one queue on a fixed schedule. Each poll cycle opens a
//! scoped session, receives a bounded batch, and for every message in receipt
//! order normalizes it, completes it with the broker, and only then emits it.
//! A rejected completion aborts the rest of the batch; whatever was already
//! emitted stands. Health (`ready`, `failed`, `drained`) follows the verdict
//! of non-consuming probes rather than individual cycle results, so one
//! transient timeout does not flap the dashboard.
//!
//! ## Module Organization
//!
//! - [`messaging`] - Raw messages, normalization, credentials, queue sessions and providers
//! - [`consumer`] - Poll cycle controller, health probe, emission sinks, state stores
//! - [`state_machine`] - Health lifecycle
//! - [`blocks`] - Deployable one-shot and subscription blocks
//! - [`scheduler`] - Fixed-interval trigger loop
//! - [`config`] - Layered configuration
//! - [`error`] - Structured error handling
//! - [`logging`] - Structured logging setup
//!
//! ## Quick Start
//!
//! ```rust
//! use std::sync::Arc;
//! use servicebus_consumer::config::ConsumerConfig;
//! use servicebus_consumer::consumer::{BufferSink, InMemoryStateStore, PollCycleController};
//! use servicebus_consumer::messaging::{Credential, InMemoryQueueProvider, QueueMessage};
//!
//! # #[tokio::main]
//! # async fn main() {
//! let queues = InMemoryQueueProvider::with_queues(&["orders"]);
//! queues.send("orders", QueueMessage::new(r#"{"order": 42}"#)).unwrap();
//!
//! let sink = BufferSink::new();
//! let controller = PollCycleController::new(
//!     queues.clone().into(),
//!     Arc::new(InMemoryStateStore::new()),
//!     Arc::new(sink.clone()),
//! );
//!
//! let credential = Credential::bearer_token("token", None);
//! let result = controller.run_cycle(&ConsumerConfig::new("orders"), &credential).await;
//!
//! assert!(result.is_ok());
//! assert_eq!(sink.drain()[0].body["order"], 42);
//! # }
//! ```

pub mod blocks;
pub mod config;
pub mod constants;
pub mod consumer;
pub mod error;
pub mod logging;
pub mod messaging;
pub mod scheduler;
pub mod state_machine;

pub use blocks::{Block, BlockContext, BlockKind, BlockOutput};
pub use config::{ConfigLoader, ConsumerConfig};
pub use consumer::{probe, CycleOutcome, PollCycleController, PollCycleResult};
pub use error::{ConsumerError, Result};
pub use messaging::{normalize, Credential, NormalizedMessage, QueueMessage, QueueProvider};
pub use scheduler::{PollScheduler, SchedulerExit};
pub use state_machine::{HealthReport, HealthStatus, LifecycleStateMachine};
