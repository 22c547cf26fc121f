//! # Consumer Core
//!
//! Poll cycles, health probes, and the collaborators they write to: the
//! emission sink and the consumer state store.

pub mod health_check;
pub mod poll_cycle;
pub mod sink;
pub mod state;

pub use health_check::probe;
pub use poll_cycle::{CycleOutcome, PollCycleController, PollCycleResult};
pub use sink::{BroadcastSink, BufferSink, EmissionSink};
pub use state::{ConsumerState, FileStateStore, InMemoryStateStore, StateStore};
