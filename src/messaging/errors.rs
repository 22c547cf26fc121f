//! # Queue Provider Error Types
//!
//! Structured errors raised by queue providers and sessions, using thiserror
//! instead of `Box<dyn Error>` so callers can classify failures.

use thiserror::Error;

/// Errors raised by a queue provider or an open session
#[derive(Error, Debug, Clone, PartialEq)]
pub enum QueueError {
    #[error("Connection failed: {message}")]
    ConnectionFailed { message: String },

    #[error("Authentication failed: {message}")]
    Authentication { message: String },

    #[error("Receive failed on queue {queue_name}: {message}")]
    Receive { queue_name: String, message: String },

    #[error("Acknowledge failed for message {message_id}: {message}")]
    Acknowledge { message_id: String, message: String },

    #[error("Peek failed on queue {queue_name}: {message}")]
    Peek { queue_name: String, message: String },

    #[error("Invalid queue target {queue_name:?}: {reason}")]
    InvalidTarget { queue_name: String, reason: String },

    #[error("Provider configuration error: {message}")]
    Configuration { message: String },

    #[error("Session already closed")]
    SessionClosed,

    #[error("Internal queue error: {message}")]
    Internal { message: String },
}

impl QueueError {
    /// Create a connection failure error
    pub fn connection_failed(message: impl Into<String>) -> Self {
        Self::ConnectionFailed {
            message: message.into(),
        }
    }

    /// Create an authentication error
    pub fn authentication(message: impl Into<String>) -> Self {
        Self::Authentication {
            message: message.into(),
        }
    }

    /// Create a receive error
    pub fn receive(queue_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Receive {
            queue_name: queue_name.into(),
            message: message.into(),
        }
    }

    /// Create an acknowledge error
    pub fn acknowledge(message_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Acknowledge {
            message_id: message_id.into(),
            message: message.into(),
        }
    }

    /// Create a peek error
    pub fn peek(queue_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Peek {
            queue_name: queue_name.into(),
            message: message.into(),
        }
    }

    /// Create an invalid target error
    pub fn invalid_target(queue_name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidTarget {
            queue_name: queue_name.into(),
            reason: reason.into(),
        }
    }

    /// Create a provider configuration error
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Create an internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }
}

/// Conversion from reqwest transport failures
impl From<reqwest::Error> for QueueError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() || err.is_connect() {
            QueueError::connection_failed(err.to_string())
        } else if err.is_builder() {
            QueueError::configuration(err.to_string())
        } else {
            QueueError::internal(err.to_string())
        }
    }
}

/// Result type alias for provider operations
pub type QueueResult<T> = Result<T, QueueError>;
