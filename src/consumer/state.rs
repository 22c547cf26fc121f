//! # Consumer State
//!
//! The only durable state the consumer keeps: when it last polled and when it
//! last saw a message. Stores are last-write-wins key/value maps scoped to
//! one consumer instance.

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

use crate::constants::state_keys;
use crate::error::{ConsumerError, Result};

/// Minimal durable key/value store
#[async_trait]
pub trait StateStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>>;

    async fn set(&self, key: &str, value: String) -> Result<()>;

    async fn delete_many(&self, keys: &[&str]) -> Result<()>;
}

/// Process-local store
#[derive(Debug, Clone, Default)]
pub struct InMemoryStateStore {
    values: Arc<Mutex<HashMap<String, String>>>,
}

impl InMemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.values.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.lock().is_empty()
    }
}

#[async_trait]
impl StateStore for InMemoryStateStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.values.lock().get(key).cloned())
    }

    async fn set(&self, key: &str, value: String) -> Result<()> {
        self.values.lock().insert(key.to_string(), value);
        Ok(())
    }

    async fn delete_many(&self, keys: &[&str]) -> Result<()> {
        let mut values = self.values.lock();
        for key in keys {
            values.remove(*key);
        }
        Ok(())
    }
}

/// JSON file store; every write replaces the file atomically
#[derive(Debug)]
pub struct FileStateStore {
    path: PathBuf,
    write_lock: tokio::sync::Mutex<()>,
}

impl FileStateStore {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            write_lock: tokio::sync::Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read_all(&self) -> Result<HashMap<String, String>> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) if bytes.is_empty() => Ok(HashMap::new()),
            Ok(bytes) => serde_json::from_slice(&bytes).map_err(|e| {
                ConsumerError::state_store(format!(
                    "corrupt state file {}: {e}",
                    self.path.display()
                ))
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(HashMap::new()),
            Err(e) => Err(ConsumerError::state_store(format!(
                "failed to read {}: {e}",
                self.path.display()
            ))),
        }
    }

    async fn write_all(&self, values: &HashMap<String, String>) -> Result<()> {
        let bytes = serde_json::to_vec_pretty(values)
            .map_err(|e| ConsumerError::state_store(e.to_string()))?;
        let temp_path = self.path.with_extension("tmp");

        tokio::fs::write(&temp_path, bytes).await.map_err(|e| {
            ConsumerError::state_store(format!("failed to write {}: {e}", temp_path.display()))
        })?;
        tokio::fs::rename(&temp_path, &self.path).await.map_err(|e| {
            ConsumerError::state_store(format!("failed to replace {}: {e}", self.path.display()))
        })?;

        debug!(path = %self.path.display(), keys = values.len(), "💾 Consumer state written");
        Ok(())
    }
}

#[async_trait]
impl StateStore for FileStateStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.read_all().await?.remove(key))
    }

    async fn set(&self, key: &str, value: String) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let mut values = self.read_all().await?;
        values.insert(key.to_string(), value);
        self.write_all(&values).await
    }

    async fn delete_many(&self, keys: &[&str]) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let mut values = self.read_all().await?;
        for key in keys {
            values.remove(*key);
        }
        self.write_all(&values).await
    }
}

/// Snapshot of the two consumer timestamps
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsumerState {
    pub last_check_time: Option<String>,
    pub last_message_received_time: Option<String>,
}

impl ConsumerState {
    pub async fn load(store: &dyn StateStore) -> Result<Self> {
        Ok(Self {
            last_check_time: store.get(state_keys::LAST_CHECK_TIME).await?,
            last_message_received_time: store.get(state_keys::LAST_MESSAGE_RECEIVED_TIME).await?,
        })
    }

    /// Record a poll attempt; the message time only moves when something arrived
    pub async fn record_cycle(
        store: &dyn StateStore,
        at: DateTime<Utc>,
        received_count: usize,
    ) -> Result<()> {
        let timestamp = format_timestamp(at);
        store
            .set(state_keys::LAST_CHECK_TIME, timestamp.clone())
            .await?;
        if received_count > 0 {
            store
                .set(state_keys::LAST_MESSAGE_RECEIVED_TIME, timestamp)
                .await?;
        }
        Ok(())
    }

    /// Remove every consumer key
    pub async fn clear(store: &dyn StateStore) -> Result<()> {
        store.delete_many(&state_keys::ALL).await
    }
}

/// ISO-8601 with millisecond precision
pub fn format_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}
