// Lifecycle state machine for consumer blocks
//
// Health is `ready`, `failed` or `drained`. Transitions are driven by probe
// verdicts and drain requests; `drained` is terminal.

pub mod events;
pub mod lifecycle;
pub mod states;

pub use events::LifecycleEvent;
pub use lifecycle::{determine_target_state, LifecycleStateMachine, TriggerReport};
pub use states::{HealthReport, HealthStatus};
