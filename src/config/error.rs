//! Configuration Error Types

use thiserror::Error;

use crate::error::ConsumerError;

/// Errors raised while loading or validating consumer configuration
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ConfigError {
    /// A source could not be read or deserialized
    #[error("Failed to load configuration: {error}")]
    Load { error: String },

    /// Required field missing or empty
    #[error("Missing required configuration field '{field}'")]
    MissingRequiredField { field: String },

    /// Field present with an unusable value
    #[error("Invalid value '{value}' for field '{field}': {context}")]
    InvalidValue {
        field: String,
        value: String,
        context: String,
    },
}

impl ConfigError {
    pub fn missing_required_field(field: impl Into<String>) -> Self {
        Self::MissingRequiredField {
            field: field.into(),
        }
    }

    pub fn invalid_value(
        field: impl Into<String>,
        value: impl ToString,
        context: impl Into<String>,
    ) -> Self {
        Self::InvalidValue {
            field: field.into(),
            value: value.to_string(),
            context: context.into(),
        }
    }
}

impl From<config::ConfigError> for ConfigError {
    fn from(error: config::ConfigError) -> Self {
        Self::Load {
            error: error.to_string(),
        }
    }
}

impl From<ConfigError> for ConsumerError {
    fn from(error: ConfigError) -> Self {
        ConsumerError::configuration(error.to_string())
    }
}

pub type ConfigResult<T> = Result<T, ConfigError>;
