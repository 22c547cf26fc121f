//! Configuration Loader
//!
//! Layers built-in defaults, an optional YAML file and `SBQ__` environment
//! overrides through the `config` crate, then validates the result.

use config::{Config, Environment, File, FileFormat};
use std::collections::HashMap;
use std::env;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use super::error::ConfigResult;
use super::ConsumerConfig;
use crate::constants::{
    DEFAULT_MAX_MESSAGES, DEFAULT_RECEIVE_TIMEOUT_SECONDS, DEFAULT_SCHEDULE_INTERVAL,
    DEFAULT_SCHEDULE_UNIT,
};

/// Prefix for environment overrides (`SBQ__QUEUE_NAME`)
pub const ENV_PREFIX: &str = "SBQ";

/// Environment variable naming a configuration file
pub const CONFIG_PATH_VAR: &str = "SBQ_CONFIG_PATH";

/// Layered configuration loader
#[derive(Debug, Clone, Default)]
pub struct ConfigLoader {
    file: Option<PathBuf>,
    env_source: Option<HashMap<String, String>>,
}

impl ConfigLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Loader reading the file named by `SBQ_CONFIG_PATH`, if set
    pub fn from_env() -> Self {
        Self {
            file: env::var(CONFIG_PATH_VAR).ok().map(PathBuf::from),
            env_source: None,
        }
    }

    pub fn with_file(mut self, path: impl AsRef<Path>) -> Self {
        self.file = Some(path.as_ref().to_path_buf());
        self
    }

    /// Replace the process environment with an explicit variable map
    pub fn with_env_source(mut self, vars: HashMap<String, String>) -> Self {
        self.env_source = Some(vars);
        self
    }

    /// Build and validate the consumer configuration
    pub fn load(&self) -> ConfigResult<ConsumerConfig> {
        let mut builder = Config::builder()
            .set_default("max_messages", DEFAULT_MAX_MESSAGES as u64)?
            .set_default("receive_timeout_seconds", DEFAULT_RECEIVE_TIMEOUT_SECONDS)?
            .set_default("include_raw_body", true)?
            .set_default("schedule.interval", DEFAULT_SCHEDULE_INTERVAL)?
            .set_default("schedule.unit", DEFAULT_SCHEDULE_UNIT)?;

        if let Some(path) = &self.file {
            debug!(path = %path.display(), "Loading consumer configuration file");
            builder = builder.add_source(File::from(path.as_path()).format(FileFormat::Yaml));
        }

        builder = builder.add_source(
            Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true)
                .source(self.env_source.clone()),
        );

        let config: ConsumerConfig = builder.build()?.try_deserialize()?;
        config.validate()?;

        info!(
            queue_name = %config.queue_name,
            config = %config.sanitized(),
            "✅ Consumer configuration loaded"
        );
        Ok(config)
    }
}

/// Deployment environment name used for log defaults
pub fn detect_environment() -> String {
    env::var("SBQ_ENV")
        .or_else(|_| env::var("APP_ENV"))
        .unwrap_or_else(|_| "development".to_string())
}
