//! # In-Memory Queue Provider
//!
//! Peek-lock queues held in process memory for tests and local runs.
//!
//! ## Features
//!
//! - **Peek-lock**: received messages stay locked until completed or until the
//!   lock expires, after which they are redelivered with a higher delivery count
//! - **Session accounting**: counts opened and closed sessions so callers can
//!   verify release on every exit path
//! - **Fault injection**: open, receive, peek, acknowledge and close failures

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use tokio::sync::Notify;
use tracing::debug;
use uuid::Uuid;

use crate::messaging::credential::Credential;
use crate::messaging::errors::{QueueError, QueueResult};
use crate::messaging::message::QueueMessage;
use crate::messaging::session::{QueueReceiver, QueueTarget};

/// Stored message with lock tracking
#[derive(Debug, Clone)]
struct StoredMessage {
    message: QueueMessage,
    lock_token: Option<String>,
    locked_until: Option<DateTime<Utc>>,
}

impl StoredMessage {
    fn is_visible(&self, now: DateTime<Utc>) -> bool {
        self.locked_until.map(|until| until <= now).unwrap_or(true)
    }
}

#[derive(Debug, Default)]
struct InMemoryQueue {
    messages: VecDeque<StoredMessage>,
    next_sequence: i64,
    total_completed: u64,
}

#[derive(Debug, Default)]
struct FaultPlan {
    open: Option<String>,
    receive: Option<String>,
    peek: Option<String>,
    rejected_acks: HashSet<String>,
    close: bool,
}

#[derive(Debug)]
struct ProviderState {
    queues: HashMap<String, InMemoryQueue>,
    faults: FaultPlan,
    lock_duration: chrono::Duration,
    sessions_opened: u64,
    sessions_closed: u64,
}

/// In-memory queue provider
///
/// Clones share the same queues, so a test can keep a handle for seeding and
/// inspection while the consumer owns another.
///
/// # Example
///
/// ```rust
/// use servicebus_consumer::messaging::{InMemoryQueueProvider, QueueMessage};
///
/// let provider = InMemoryQueueProvider::with_queues(&["orders"]);
/// provider.send("orders", QueueMessage::new(r#"{"id": 1}"#)).unwrap();
/// assert_eq!(provider.queue_length("orders"), 1);
/// ```
#[derive(Debug, Clone)]
pub struct InMemoryQueueProvider {
    state: Arc<Mutex<ProviderState>>,
    arrivals: Arc<Notify>,
}

impl Default for InMemoryQueueProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryQueueProvider {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(ProviderState {
                queues: HashMap::new(),
                faults: FaultPlan::default(),
                lock_duration: chrono::Duration::seconds(30),
                sessions_opened: 0,
                sessions_closed: 0,
            })),
            arrivals: Arc::new(Notify::new()),
        }
    }

    /// Create with pre-initialized queues
    pub fn with_queues(queue_names: &[&str]) -> Self {
        let provider = Self::new();
        for name in queue_names {
            provider.ensure_queue(name);
        }
        provider
    }

    /// How long a received message stays locked
    pub fn with_lock_duration(self, lock_duration: Duration) -> Self {
        if let Ok(duration) = chrono::Duration::from_std(lock_duration) {
            self.state.lock().lock_duration = duration;
        }
        self
    }

    pub fn ensure_queue(&self, queue_name: &str) {
        self.state
            .lock()
            .queues
            .entry(queue_name.to_string())
            .or_insert_with(|| InMemoryQueue {
                next_sequence: 1,
                ..Default::default()
            });
    }

    /// Enqueue a message, assigning broker metadata the sender did not set.
    /// Returns the sequence number.
    pub fn send(&self, queue_name: &str, message: QueueMessage) -> QueueResult<i64> {
        let sequence = {
            let mut state = self.state.lock();
            let queue = state
                .queues
                .get_mut(queue_name)
                .ok_or_else(|| QueueError::invalid_target(queue_name, "queue does not exist"))?;

            let sequence = queue.next_sequence;
            queue.next_sequence += 1;

            let mut message = message;
            if message.message_id.is_none() {
                message.message_id = Some(Uuid::new_v4().to_string());
            }
            message.sequence_number = Some(sequence);
            message.enqueued_time = Some(message.enqueued_time.unwrap_or_else(Utc::now));
            message.lock_token = None;
            message.delivery_count = 0;

            queue.messages.push_back(StoredMessage {
                message,
                lock_token: None,
                locked_until: None,
            });
            sequence
        };

        self.arrivals.notify_waiters();
        Ok(sequence)
    }

    /// Messages still held by the queue, locked or not
    pub fn queue_length(&self, queue_name: &str) -> usize {
        self.state
            .lock()
            .queues
            .get(queue_name)
            .map(|q| q.messages.len())
            .unwrap_or(0)
    }

    /// Messages currently locked by a receiver
    pub fn locked_count(&self, queue_name: &str) -> usize {
        let now = Utc::now();
        self.state
            .lock()
            .queues
            .get(queue_name)
            .map(|q| q.messages.iter().filter(|m| !m.is_visible(now)).count())
            .unwrap_or(0)
    }

    /// Messages completed (deleted) through acknowledgment
    pub fn completed_count(&self, queue_name: &str) -> u64 {
        self.state
            .lock()
            .queues
            .get(queue_name)
            .map(|q| q.total_completed)
            .unwrap_or(0)
    }

    pub fn sessions_opened(&self) -> u64 {
        self.state.lock().sessions_opened
    }

    pub fn sessions_closed(&self) -> u64 {
        self.state.lock().sessions_closed
    }

    pub fn open_sessions(&self) -> u64 {
        let state = self.state.lock();
        state.sessions_opened - state.sessions_closed
    }

    /// Fail every open attempt with a connection error until cleared
    pub fn fail_open(&self, message: Option<&str>) {
        self.state.lock().faults.open = message.map(str::to_string);
    }

    /// Fail every receive with a transport error until cleared
    pub fn fail_receive(&self, message: Option<&str>) {
        self.state.lock().faults.receive = message.map(str::to_string);
    }

    /// Fail every peek with a transport error until cleared
    pub fn fail_peek(&self, message: Option<&str>) {
        self.state.lock().faults.peek = message.map(str::to_string);
    }

    /// Reject completion of the message with this id
    pub fn reject_ack(&self, message_id: &str) {
        self.state
            .lock()
            .faults
            .rejected_acks
            .insert(message_id.to_string());
    }

    pub fn fail_close(&self, fail: bool) {
        self.state.lock().faults.close = fail;
    }

    /// Open a session; the credential is accepted but not verified
    pub(crate) fn open_session(
        &self,
        credential: &Credential,
        target: &QueueTarget,
    ) -> QueueResult<InMemorySession> {
        credential.validate()?;

        let mut state = self.state.lock();
        if let Some(message) = &state.faults.open {
            return Err(QueueError::connection_failed(message.clone()));
        }
        if !state.queues.contains_key(&target.queue_name) {
            return Err(QueueError::invalid_target(
                &target.queue_name,
                "queue does not exist",
            ));
        }
        state.sessions_opened += 1;

        Ok(InMemorySession {
            queue_name: target.queue_name.clone(),
            state: Arc::clone(&self.state),
            arrivals: Arc::clone(&self.arrivals),
        })
    }
}

/// Session over an [`InMemoryQueueProvider`] queue
#[derive(Debug)]
pub struct InMemorySession {
    queue_name: String,
    state: Arc<Mutex<ProviderState>>,
    arrivals: Arc<Notify>,
}

impl InMemorySession {
    fn lock_batch(&self, max_count: usize) -> QueueResult<Vec<QueueMessage>> {
        let mut state = self.state.lock();
        if let Some(message) = &state.faults.receive {
            return Err(QueueError::receive(&self.queue_name, message.clone()));
        }

        let lock_duration = state.lock_duration;
        let queue = state
            .queues
            .get_mut(&self.queue_name)
            .ok_or_else(|| QueueError::receive(&self.queue_name, "queue was deleted"))?;

        let now = Utc::now();
        let mut batch = Vec::new();
        for stored in queue.messages.iter_mut() {
            if batch.len() >= max_count {
                break;
            }
            if !stored.is_visible(now) {
                continue;
            }

            let lock_token = Uuid::new_v4().to_string();
            stored.lock_token = Some(lock_token.clone());
            stored.locked_until = Some(now + lock_duration);
            stored.message.delivery_count += 1;

            let mut message = stored.message.clone();
            message.lock_token = Some(lock_token);
            batch.push(message);
        }
        Ok(batch)
    }
}

#[async_trait]
impl QueueReceiver for InMemorySession {
    async fn receive(
        &mut self,
        max_count: usize,
        timeout: Duration,
    ) -> QueueResult<Vec<QueueMessage>> {
        let deadline = tokio::time::Instant::now() + timeout;
        let arrivals = Arc::clone(&self.arrivals);

        loop {
            let notified = arrivals.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            let batch = self.lock_batch(max_count)?;
            if !batch.is_empty() {
                debug!(
                    queue_name = %self.queue_name,
                    count = batch.len(),
                    "📥 Locked messages from in-memory queue"
                );
                return Ok(batch);
            }

            if tokio::time::timeout_at(deadline, notified).await.is_err() {
                return Ok(Vec::new());
            }
        }
    }

    async fn acknowledge(&mut self, message: &QueueMessage) -> QueueResult<()> {
        let message_id = message.display_id();
        let lock_token = message
            .lock_token
            .as_deref()
            .ok_or_else(|| QueueError::acknowledge(&message_id, "message carries no lock token"))?;

        let mut state = self.state.lock();
        if state.faults.rejected_acks.contains(&message_id) {
            return Err(QueueError::acknowledge(
                &message_id,
                "completion rejected by broker",
            ));
        }

        let now = Utc::now();
        let queue = state
            .queues
            .get_mut(&self.queue_name)
            .ok_or_else(|| QueueError::acknowledge(&message_id, "queue was deleted"))?;

        let position = queue.messages.iter().position(|stored| {
            stored.lock_token.as_deref() == Some(lock_token) && !stored.is_visible(now)
        });

        match position {
            Some(pos) => {
                queue.messages.remove(pos);
                queue.total_completed += 1;
                Ok(())
            }
            None => Err(QueueError::acknowledge(
                &message_id,
                "lock lost or message already completed",
            )),
        }
    }

    async fn peek(&mut self, count: usize) -> QueueResult<Vec<QueueMessage>> {
        let state = self.state.lock();
        if let Some(message) = &state.faults.peek {
            return Err(QueueError::peek(&self.queue_name, message.clone()));
        }

        let queue = state
            .queues
            .get(&self.queue_name)
            .ok_or_else(|| QueueError::peek(&self.queue_name, "queue was deleted"))?;

        Ok(queue
            .messages
            .iter()
            .take(count)
            .map(|stored| stored.message.clone())
            .collect())
    }

    fn close(&mut self) -> QueueResult<()> {
        let mut state = self.state.lock();
        state.sessions_closed += 1;
        if state.faults.close {
            return Err(QueueError::internal("injected close failure"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn open(provider: &InMemoryQueueProvider) -> InMemorySession {
        provider
            .open_session(
                &Credential::bearer_token("t", None),
                &QueueTarget::new("orders"),
            )
            .unwrap()
    }

    #[tokio::test]
    async fn test_send_assigns_broker_metadata() {
        let provider = InMemoryQueueProvider::with_queues(&["orders"]);
        let first = provider.send("orders", QueueMessage::new("a")).unwrap();
        let second = provider.send("orders", QueueMessage::new("b")).unwrap();
        assert_eq!((first, second), (1, 2));

        let mut session = open(&provider);
        let received = session.receive(10, Duration::from_millis(10)).await.unwrap();
        assert_eq!(received.len(), 2);
        assert!(received[0].message_id.is_some());
        assert!(received[0].enqueued_time.is_some());
        assert_eq!(received[0].delivery_count, 1);
    }

    #[tokio::test]
    async fn test_receive_locks_messages() {
        let provider = InMemoryQueueProvider::with_queues(&["orders"]);
        provider.send("orders", QueueMessage::new("a")).unwrap();

        let mut session = open(&provider);
        let first = session.receive(10, Duration::from_millis(10)).await.unwrap();
        assert_eq!(first.len(), 1);
        assert_eq!(provider.locked_count("orders"), 1);

        let second = session.receive(10, Duration::from_millis(10)).await.unwrap();
        assert!(second.is_empty());
    }

    #[tokio::test]
    async fn test_receive_waits_for_arrival() {
        let provider = InMemoryQueueProvider::with_queues(&["orders"]);
        let mut session = open(&provider);

        let sender = provider.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            sender.send("orders", QueueMessage::new("late")).unwrap();
        });

        let received = session.receive(5, Duration::from_secs(2)).await.unwrap();
        assert_eq!(received.len(), 1);
    }

    #[tokio::test]
    async fn test_expired_lock_is_redelivered() {
        let provider = InMemoryQueueProvider::with_queues(&["orders"])
            .with_lock_duration(Duration::from_millis(10));
        provider.send("orders", QueueMessage::new("a")).unwrap();

        let mut session = open(&provider);
        let first = session.receive(1, Duration::from_millis(10)).await.unwrap();
        tokio::time::sleep(Duration::from_millis(30)).await;
        let again = session.receive(1, Duration::from_millis(10)).await.unwrap();

        assert_eq!(again.len(), 1);
        assert_eq!(again[0].delivery_count, 2);
        assert!(session.acknowledge(&first[0]).await.is_err());
        assert!(session.acknowledge(&again[0]).await.is_ok());
        assert_eq!(provider.queue_length("orders"), 0);
    }

    #[tokio::test]
    async fn test_peek_does_not_lock() {
        let provider = InMemoryQueueProvider::with_queues(&["orders"]);
        provider.send("orders", QueueMessage::new("a")).unwrap();

        let mut session = open(&provider);
        let peeked = session.peek(1).await.unwrap();
        assert_eq!(peeked.len(), 1);
        assert!(peeked[0].lock_token.is_none());
        assert_eq!(provider.locked_count("orders"), 0);

        let received = session.receive(1, Duration::from_millis(10)).await.unwrap();
        assert_eq!(received.len(), 1);
    }

    #[tokio::test]
    async fn test_rejected_ack_keeps_message() {
        let provider = InMemoryQueueProvider::with_queues(&["orders"]);
        provider
            .send("orders", QueueMessage::new("a").with_message_id("m-1"))
            .unwrap();
        provider.reject_ack("m-1");

        let mut session = open(&provider);
        let received = session.receive(1, Duration::from_millis(10)).await.unwrap();
        let err = session.acknowledge(&received[0]).await.unwrap_err();

        assert!(matches!(err, QueueError::Acknowledge { .. }));
        assert_eq!(provider.queue_length("orders"), 1);
        assert_eq!(provider.completed_count("orders"), 0);
    }

    #[tokio::test]
    async fn test_open_missing_queue() {
        let provider = InMemoryQueueProvider::new();
        let err = provider
            .open_session(
                &Credential::bearer_token("t", None),
                &QueueTarget::new("missing"),
            )
            .unwrap_err();
        assert!(matches!(err, QueueError::InvalidTarget { .. }));
        assert_eq!(provider.sessions_opened(), 0);
    }
}
