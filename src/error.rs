//! # Consumer Error Types
//!
//! Crate-level error taxonomy. Provider failures arrive as [`QueueError`] and
//! are folded into one of the consumer categories at the poll-cycle and
//! health-check boundaries.

use thiserror::Error;

use crate::messaging::QueueError;

/// Errors surfaced by the consumer core
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConsumerError {
    /// Missing or invalid queue name, credential, or numeric setting.
    /// Never retried automatically.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Transport or authentication failure while opening a session,
    /// receiving, or probing.
    #[error("Connectivity error: {0}")]
    Connectivity(String),

    /// The provider rejected completion of a received message.
    #[error("Acknowledgment failed for message {message_id}: {reason}")]
    Acknowledgment { message_id: String, reason: String },

    /// The consumer state store could not be read or written.
    #[error("State store error: {0}")]
    StateStore(String),

    /// A lifecycle event was applied to a state that does not accept it.
    #[error("Invalid lifecycle transition from {from} on {event}")]
    InvalidTransition { from: String, event: String },
}

impl ConsumerError {
    /// Create a configuration error
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    /// Create a connectivity error
    pub fn connectivity(message: impl Into<String>) -> Self {
        Self::Connectivity(message.into())
    }

    /// Create an acknowledgment error
    pub fn acknowledgment(message_id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Acknowledgment {
            message_id: message_id.into(),
            reason: reason.into(),
        }
    }

    /// Create a state store error
    pub fn state_store(message: impl Into<String>) -> Self {
        Self::StateStore(message.into())
    }

    /// Configuration errors are terminal until an operator fixes the block.
    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::Configuration(_))
    }
}

impl From<QueueError> for ConsumerError {
    fn from(err: QueueError) -> Self {
        match err {
            QueueError::Configuration { .. } | QueueError::InvalidTarget { .. } => {
                ConsumerError::Configuration(err.to_string())
            }
            QueueError::Acknowledge { message_id, message } => {
                ConsumerError::Acknowledgment {
                    message_id,
                    reason: message,
                }
            }
            other => ConsumerError::Connectivity(other.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, ConsumerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_queue_error_classification() {
        let err: ConsumerError = QueueError::connection_failed("socket reset").into();
        assert!(matches!(err, ConsumerError::Connectivity(_)));
        assert!(!err.is_configuration());

        let err: ConsumerError = QueueError::invalid_target("", "queue name is empty").into();
        assert!(err.is_configuration());

        let err: ConsumerError = QueueError::acknowledge("42", "lock lost").into();
        assert_eq!(
            err,
            ConsumerError::Acknowledgment {
                message_id: "42".to_string(),
                reason: "lock lost".to_string()
            }
        );
    }

    #[test]
    fn test_error_display() {
        let err = ConsumerError::acknowledgment("m-1", "lock expired");
        let display = err.to_string();
        assert!(display.contains("m-1"));
        assert!(display.contains("lock expired"));

        let err = ConsumerError::configuration("queue_name must not be empty");
        assert_eq!(
            err.to_string(),
            "Configuration error: queue_name must not be empty"
        );
    }
}
