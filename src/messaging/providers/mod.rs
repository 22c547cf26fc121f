//! Queue provider implementations

pub mod in_memory;
pub mod service_bus;

pub use in_memory::{InMemoryQueueProvider, InMemorySession};
pub use service_bus::{ServiceBusProvider, ServiceBusSession};
