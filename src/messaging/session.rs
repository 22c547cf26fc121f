//! # Queue Sessions
//!
//! A [`QueueSession`] owns the provider-side receiver for one poll cycle or
//! probe. Release is tied to ownership: the session is closed exactly once,
//! either through [`QueueSession::close`] or when the value is dropped on any
//! other exit path (early return, `?` propagation, panic unwinding). Close
//! failures are logged and never replace the caller's outcome.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use uuid::Uuid;

use super::credential::Credential;
use super::errors::{QueueError, QueueResult};
use super::message::QueueMessage;
use super::providers::{InMemoryQueueProvider, InMemorySession, ServiceBusProvider, ServiceBusSession};

/// Named destination messages are consumed from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueTarget {
    /// Fully qualified namespace host; falls back to the connection string endpoint
    #[serde(default)]
    pub namespace: Option<String>,
    pub queue_name: String,
}

impl QueueTarget {
    pub fn new(queue_name: impl Into<String>) -> Self {
        Self {
            namespace: None,
            queue_name: queue_name.into(),
        }
    }

    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    pub fn validate(&self) -> QueueResult<()> {
        if self.queue_name.trim().is_empty() {
            return Err(QueueError::invalid_target(
                &self.queue_name,
                "queue name must not be empty",
            ));
        }
        Ok(())
    }
}

/// Operations every provider session supports
///
/// `receive` suspends for at most `timeout` and returns an empty batch rather
/// than an error when nothing arrives. `peek` never locks or consumes.
#[async_trait]
pub trait QueueReceiver: Send {
    /// Lock and return up to `max_count` messages in broker order
    async fn receive(
        &mut self,
        max_count: usize,
        timeout: Duration,
    ) -> QueueResult<Vec<QueueMessage>>;

    /// Complete a received message so the broker deletes it
    async fn acknowledge(&mut self, message: &QueueMessage) -> QueueResult<()>;

    /// Inspect up to `count` messages without locking them
    async fn peek(&mut self, count: usize) -> QueueResult<Vec<QueueMessage>>;

    /// Release provider resources held by the session
    fn close(&mut self) -> QueueResult<()>;
}

/// Provider enum for dispatch without trait objects
#[derive(Debug, Clone)]
pub enum QueueProvider {
    /// Azure Service Bus over its REST surface
    ServiceBus(ServiceBusProvider),
    /// In-process queues for tests and local runs
    InMemory(InMemoryQueueProvider),
}

impl QueueProvider {
    /// Provider name for logging
    pub fn provider_name(&self) -> &'static str {
        match self {
            Self::ServiceBus(_) => "service_bus",
            Self::InMemory(_) => "in_memory",
        }
    }

    /// Open a session against `target`
    pub async fn open(
        &self,
        credential: &Credential,
        target: &QueueTarget,
    ) -> QueueResult<QueueSession> {
        target.validate()?;

        let inner = match self {
            Self::ServiceBus(provider) => {
                SessionKind::ServiceBus(provider.open_session(credential, target).await?)
            }
            Self::InMemory(provider) => {
                SessionKind::InMemory(provider.open_session(credential, target)?)
            }
        };

        let session = QueueSession {
            session_id: Uuid::new_v4(),
            queue_name: target.queue_name.clone(),
            provider: self.provider_name(),
            inner: Some(inner),
        };

        debug!(
            session_id = %session.session_id,
            queue_name = %session.queue_name,
            provider = session.provider,
            "📬 Queue session opened"
        );
        Ok(session)
    }
}

impl From<ServiceBusProvider> for QueueProvider {
    fn from(provider: ServiceBusProvider) -> Self {
        Self::ServiceBus(provider)
    }
}

impl From<InMemoryQueueProvider> for QueueProvider {
    fn from(provider: InMemoryQueueProvider) -> Self {
        Self::InMemory(provider)
    }
}

#[derive(Debug)]
enum SessionKind {
    ServiceBus(ServiceBusSession),
    InMemory(InMemorySession),
}

impl SessionKind {
    fn receiver(&mut self) -> &mut dyn QueueReceiver {
        match self {
            Self::ServiceBus(session) => session as &mut dyn QueueReceiver,
            Self::InMemory(session) => session as &mut dyn QueueReceiver,
        }
    }
}

/// Open connection and receiver for one polling cycle
#[derive(Debug)]
pub struct QueueSession {
    session_id: Uuid,
    queue_name: String,
    provider: &'static str,
    inner: Option<SessionKind>,
}

impl QueueSession {
    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    pub fn queue_name(&self) -> &str {
        &self.queue_name
    }

    pub fn is_open(&self) -> bool {
        self.inner.is_some()
    }

    fn receiver(&mut self) -> QueueResult<&mut dyn QueueReceiver> {
        self.inner
            .as_mut()
            .map(SessionKind::receiver)
            .ok_or(QueueError::SessionClosed)
    }

    pub async fn receive(
        &mut self,
        max_count: usize,
        timeout: Duration,
    ) -> QueueResult<Vec<QueueMessage>> {
        self.receiver()?.receive(max_count, timeout).await
    }

    pub async fn acknowledge(&mut self, message: &QueueMessage) -> QueueResult<()> {
        self.receiver()?.acknowledge(message).await
    }

    pub async fn peek(&mut self, count: usize) -> QueueResult<Vec<QueueMessage>> {
        self.receiver()?.peek(count).await
    }

    /// Close the session now instead of at drop
    pub fn close(mut self) {
        self.release();
    }

    fn release(&mut self) {
        let Some(mut inner) = self.inner.take() else {
            return;
        };

        match inner.receiver().close() {
            Ok(()) => debug!(
                session_id = %self.session_id,
                queue_name = %self.queue_name,
                provider = self.provider,
                "📪 Queue session closed"
            ),
            Err(e) => warn!(
                session_id = %self.session_id,
                queue_name = %self.queue_name,
                provider = self.provider,
                error = %e,
                "Queue session close failed; ignoring"
            ),
        }
    }
}

impl Drop for QueueSession {
    fn drop(&mut self) {
        self.release();
    }
}
