//! # Messaging Module
//!
//! Provider-agnostic queue consumption: raw message types, normalization,
//! credentials, and scoped queue sessions over Service Bus or in-memory queues.

pub mod credential;
pub mod errors;
pub mod message;
pub mod normalizer;
pub mod providers;
pub mod session;

pub use credential::{Authorizer, ConnectionStringParts, Credential, FixedTokenCredential};
pub use errors::{QueueError, QueueResult};
pub use message::{MessageBody, QueueMessage};
pub use normalizer::{normalize, NormalizedMessage};
pub use providers::{InMemoryQueueProvider, ServiceBusProvider};
pub use session::{QueueProvider, QueueReceiver, QueueSession, QueueTarget};
