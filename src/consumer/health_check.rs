//! # Connection Health Check
//!
//! Non-consuming probe: open a session, peek at most one message, close.
//! An empty queue is a healthy queue.

use tracing::{debug, warn};

use crate::config::ConsumerConfig;
use crate::constants::{events, PROBE_PEEK_COUNT};
use crate::error::{ConsumerError, Result};
use crate::messaging::{Credential, QueueProvider};

/// Probe the configured queue without touching its messages
pub async fn probe(
    provider: &QueueProvider,
    config: &ConsumerConfig,
    credential: &Credential,
) -> Result<()> {
    match run_probe(provider, config, credential).await {
        Ok(peeked) => {
            debug!(
                queue_name = %config.queue_name,
                provider = provider.provider_name(),
                peeked,
                event = events::PROBE_SUCCEEDED,
                "✅ Queue probe succeeded"
            );
            Ok(())
        }
        Err(error) => {
            warn!(
                queue_name = %config.queue_name,
                provider = provider.provider_name(),
                error = %error,
                event = events::PROBE_FAILED,
                "Queue probe failed"
            );
            Err(error)
        }
    }
}

async fn run_probe(
    provider: &QueueProvider,
    config: &ConsumerConfig,
    credential: &Credential,
) -> Result<usize> {
    config.validate()?;
    credential
        .validate()
        .map_err(|e| ConsumerError::configuration(e.to_string()))?;

    let mut session = provider.open(credential, &config.target()).await?;
    let peeked = session.peek(PROBE_PEEK_COUNT).await?;
    session.close();

    Ok(peeked.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messaging::{InMemoryQueueProvider, QueueMessage};

    fn credential() -> Credential {
        Credential::bearer_token("test-token", None)
    }

    #[tokio::test]
    async fn test_probe_on_empty_queue_succeeds() {
        let memory = InMemoryQueueProvider::with_queues(&["orders"]);
        let provider = QueueProvider::from(memory.clone());

        probe(&provider, &ConsumerConfig::new("orders"), &credential())
            .await
            .unwrap();
        assert_eq!(memory.open_sessions(), 0);
    }

    #[tokio::test]
    async fn test_probe_never_consumes() {
        let memory = InMemoryQueueProvider::with_queues(&["orders"]);
        memory.send("orders", QueueMessage::new("keep me")).unwrap();
        let provider = QueueProvider::from(memory.clone());

        probe(&provider, &ConsumerConfig::new("orders"), &credential())
            .await
            .unwrap();

        assert_eq!(memory.queue_length("orders"), 1);
        assert_eq!(memory.locked_count("orders"), 0);
    }

    #[tokio::test]
    async fn test_probe_failures_are_typed() {
        let memory = InMemoryQueueProvider::with_queues(&["orders"]);
        let provider = QueueProvider::from(memory.clone());

        let missing = probe(&provider, &ConsumerConfig::new("missing"), &credential()).await;
        assert!(matches!(missing, Err(ConsumerError::Configuration(_))));

        memory.fail_peek(Some("link detached"));
        let err = probe(&provider, &ConsumerConfig::new("orders"), &credential())
            .await
            .unwrap_err();
        assert!(matches!(err, ConsumerError::Connectivity(_)));
        assert_eq!(memory.open_sessions(), 0);
    }

    #[tokio::test]
    async fn test_probe_rejects_empty_token() {
        let provider = QueueProvider::from(InMemoryQueueProvider::with_queues(&["orders"]));
        let err = probe(
            &provider,
            &ConsumerConfig::new("orders"),
            &Credential::bearer_token("  ", None),
        )
        .await
        .unwrap_err();
        assert!(err.is_configuration());
    }
}
