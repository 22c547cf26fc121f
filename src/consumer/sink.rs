//! # Emission Sinks
//!
//! Normalized messages leave the poll cycle one at a time, in receipt order.
//! Sinks expose no backpressure: `emit` is fire-and-forget from the
//! controller's point of view.

use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::broadcast;

use crate::messaging::NormalizedMessage;

/// Destination for normalized messages
pub trait EmissionSink: Send + Sync {
    fn emit(&self, message: NormalizedMessage);
}

/// Fan-out sink over a tokio broadcast channel
#[derive(Debug, Clone)]
pub struct BroadcastSink {
    sender: broadcast::Sender<NormalizedMessage>,
}

impl BroadcastSink {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<NormalizedMessage> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for BroadcastSink {
    fn default() -> Self {
        Self::new(1024)
    }
}

impl EmissionSink for BroadcastSink {
    fn emit(&self, message: NormalizedMessage) {
        // No subscribers is acceptable; the message has already been acknowledged
        if self.sender.send(message).is_err() {
            tracing::trace!("Emitted message had no subscribers");
        }
    }
}

/// Collecting sink; clones share one buffer
#[derive(Debug, Clone, Default)]
pub struct BufferSink {
    messages: Arc<Mutex<Vec<NormalizedMessage>>>,
}

impl BufferSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Remove and return everything emitted so far
    pub fn drain(&self) -> Vec<NormalizedMessage> {
        std::mem::take(&mut *self.messages.lock())
    }

    pub fn snapshot(&self) -> Vec<NormalizedMessage> {
        self.messages.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.messages.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.lock().is_empty()
    }
}

impl EmissionSink for BufferSink {
    fn emit(&self, message: NormalizedMessage) {
        self.messages.lock().push(message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messaging::{normalize, QueueMessage};

    fn message(id: &str) -> NormalizedMessage {
        normalize(&QueueMessage::new("{}").with_message_id(id))
    }

    #[test]
    fn test_buffer_sink_keeps_order() {
        let sink = BufferSink::new();
        let shared = sink.clone();
        sink.emit(message("a"));
        shared.emit(message("b"));

        let ids: Vec<_> = sink.drain().into_iter().map(|m| m.message_id).collect();
        assert_eq!(ids, vec!["a", "b"]);
        assert!(shared.is_empty());
    }

    #[tokio::test]
    async fn test_broadcast_sink_delivers_to_subscribers() {
        let sink = BroadcastSink::new(8);
        sink.emit(message("dropped"));

        let mut receiver = sink.subscribe();
        assert_eq!(sink.subscriber_count(), 1);
        sink.emit(message("delivered"));

        assert_eq!(receiver.recv().await.unwrap().message_id, "delivered");
    }
}
