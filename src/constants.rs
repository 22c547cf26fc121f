//! # System Constants
//!
//! Operational boundaries of the queue consumer: provider ceilings, default
//! polling cadence, persisted state keys and lifecycle event names.

use std::time::Duration;

/// Hard upper bound on messages a single receive call may request.
pub const MAX_BATCH_CEILING: usize = 2047;

/// Default number of messages requested per poll cycle.
pub const DEFAULT_MAX_MESSAGES: usize = 10;

/// Default time a receive call waits for messages to arrive.
pub const DEFAULT_RECEIVE_TIMEOUT_SECONDS: f64 = 5.0;

/// Longest receive wait the Service Bus REST long-poll accepts.
pub const MAX_RECEIVE_TIMEOUT_SECONDS: f64 = 55.0;

/// Default scheduler interval, expressed in [`DEFAULT_SCHEDULE_UNIT`].
pub const DEFAULT_SCHEDULE_INTERVAL: u64 = 30;

/// Default scheduler unit name.
pub const DEFAULT_SCHEDULE_UNIT: &str = "seconds";

/// Lifetime assumed for bearer tokens supplied without an expiry.
pub const DEFAULT_TOKEN_LIFETIME: Duration = Duration::from_secs(60 * 60);

/// Number of messages a health probe peeks at.
pub const PROBE_PEEK_COUNT: usize = 1;

/// Persisted consumer state keys
pub mod state_keys {
    pub const LAST_CHECK_TIME: &str = "lastCheckTime";
    pub const LAST_MESSAGE_RECEIVED_TIME: &str = "lastMessageReceivedTime";

    /// Every key owned by the consumer, used when draining.
    pub const ALL: [&str; 2] = [LAST_CHECK_TIME, LAST_MESSAGE_RECEIVED_TIME];
}

/// Names attached to structured log records for lifecycle and cycle events
pub mod events {
    pub const CYCLE_STARTED: &str = "cycle.started";
    pub const CYCLE_COMPLETED: &str = "cycle.completed";
    pub const CYCLE_FAILED: &str = "cycle.failed";
    pub const PROBE_SUCCEEDED: &str = "probe.succeeded";
    pub const PROBE_FAILED: &str = "probe.failed";
    pub const BLOCK_ACTIVATED: &str = "block.activated";
    pub const BLOCK_DRAINED: &str = "block.drained";
}

/// Service Bus REST surface details
pub mod service_bus {
    /// API version sent with entity (management) reads.
    pub const ENTITY_API_VERSION: &str = "2017-04";

    /// Lifetime of generated shared access signatures.
    pub const SAS_LIFETIME_SECONDS: i64 = 60 * 60;

    /// Headers the REST surface sets itself; everything else on a received
    /// message is treated as an application property.
    pub const STANDARD_HEADERS: &[&str] = &[
        "brokerproperties",
        "content-type",
        "content-length",
        "date",
        "server",
        "location",
        "transfer-encoding",
        "strict-transport-security",
        "connection",
    ];
}
