//! # Poll Cycle Controller
//!
//! One bounded receive → normalize → acknowledge → emit pass.
//!
//! Each received message is acknowledged immediately after normalization and
//! emitted only once the broker accepted the completion. An acknowledgment
//! failure aborts the rest of the batch; messages already emitted stand
//! (at-least-once). Locked but unacknowledged messages return to the queue
//! when their lock expires.
//!
//! Provider errors never escape: every failure is folded into
//! [`CycleOutcome::Error`]. The consumer timestamps are written on every
//! attempt so an operator can tell an idle queue from a stalled poller.

use chrono::Utc;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, warn};

use super::sink::EmissionSink;
use super::state::{ConsumerState, StateStore};
use crate::config::ConsumerConfig;
use crate::constants::events;
use crate::error::{ConsumerError, Result};
use crate::logging::log_cycle_operation;
use crate::messaging::{normalize, Credential, NormalizedMessage, QueueProvider};

/// Outcome of one poll cycle
#[derive(Debug, Clone, PartialEq)]
pub enum CycleOutcome {
    Ok,
    Error(ConsumerError),
}

/// Result of one poll cycle
#[derive(Debug, Clone, PartialEq)]
pub struct PollCycleResult {
    /// Messages handed over by `receive`, acknowledged or not
    pub received_count: usize,
    /// Messages acknowledged and emitted, in receipt order
    pub messages: Vec<NormalizedMessage>,
    pub outcome: CycleOutcome,
    /// Non-fatal notes, e.g. batch size clamping
    pub warnings: Vec<String>,
}

impl PollCycleResult {
    pub fn is_ok(&self) -> bool {
        matches!(self.outcome, CycleOutcome::Ok)
    }

    pub fn error(&self) -> Option<&ConsumerError> {
        match &self.outcome {
            CycleOutcome::Ok => None,
            CycleOutcome::Error(error) => Some(error),
        }
    }

    /// Human-readable reason for an `error` outcome
    pub fn diagnostic(&self) -> Option<String> {
        self.error().map(ToString::to_string)
    }

    /// Summary record without message bodies
    pub fn summary(&self) -> Value {
        json!({
            "count": self.received_count,
            "emitted": self.messages.len(),
            "outcome": if self.is_ok() { "ok" } else { "error" },
            "diagnostic": self.diagnostic(),
            "warnings": self.warnings,
        })
    }
}

/// Drives poll cycles against one provider, state store and sink
#[derive(Clone)]
pub struct PollCycleController {
    provider: QueueProvider,
    store: Arc<dyn StateStore>,
    sink: Arc<dyn EmissionSink>,
}

impl std::fmt::Debug for PollCycleController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PollCycleController")
            .field("provider", &self.provider.provider_name())
            .finish_non_exhaustive()
    }
}

#[derive(Default)]
struct CycleProgress {
    received_count: usize,
    messages: Vec<NormalizedMessage>,
    warnings: Vec<String>,
}

impl PollCycleController {
    pub fn new(
        provider: QueueProvider,
        store: Arc<dyn StateStore>,
        sink: Arc<dyn EmissionSink>,
    ) -> Self {
        Self {
            provider,
            store,
            sink,
        }
    }

    pub fn provider(&self) -> &QueueProvider {
        &self.provider
    }

    pub fn store(&self) -> &Arc<dyn StateStore> {
        &self.store
    }

    /// Run one cycle. Never returns an error; failures land in the outcome.
    pub async fn run_cycle(
        &self,
        config: &ConsumerConfig,
        credential: &Credential,
    ) -> PollCycleResult {
        debug!(
            queue_name = %config.queue_name,
            event = events::CYCLE_STARTED,
            "🔁 Starting poll cycle"
        );

        let mut progress = CycleProgress::default();
        let outcome = match self.consume(config, credential, &mut progress).await {
            Ok(()) => CycleOutcome::Ok,
            Err(error) => CycleOutcome::Error(error),
        };

        // Written on every attempt; a store failure never overrides the outcome
        if let Err(e) =
            ConsumerState::record_cycle(self.store.as_ref(), Utc::now(), progress.received_count)
                .await
        {
            warn!(
                queue_name = %config.queue_name,
                error = %e,
                "Failed to record consumer state"
            );
        }

        let result = PollCycleResult {
            received_count: progress.received_count,
            messages: progress.messages,
            outcome,
            warnings: progress.warnings,
        };

        match &result.outcome {
            CycleOutcome::Ok => log_cycle_operation(
                events::CYCLE_COMPLETED,
                &config.queue_name,
                "ok",
                result.received_count,
                None,
            ),
            CycleOutcome::Error(error) => log_cycle_operation(
                events::CYCLE_FAILED,
                &config.queue_name,
                "error",
                result.received_count,
                Some(&error.to_string()),
            ),
        }

        result
    }

    async fn consume(
        &self,
        config: &ConsumerConfig,
        credential: &Credential,
        progress: &mut CycleProgress,
    ) -> Result<()> {
        config.validate()?;
        let receive_timeout = config.receive_timeout()?;

        let batch = config.batch_size();
        if let Some(warning) = batch.warning {
            warn!(
                queue_name = %config.queue_name,
                configured = config.max_messages,
                effective = batch.value,
                "⚠️ {}",
                warning
            );
            progress.warnings.push(warning);
        }

        // Released on drop, including on every early return below
        let mut session = self.provider.open(credential, &config.target()).await?;

        let received = session
            .receive(batch.value, receive_timeout)
            .await?;
        progress.received_count = received.len();

        for raw in &received {
            let mut normalized = normalize(raw);
            if !config.include_raw_body {
                normalized = normalized.without_raw_body();
            }

            session.acknowledge(raw).await.map_err(|e| {
                warn!(
                    queue_name = %config.queue_name,
                    message_id = %raw.display_id(),
                    error = %e,
                    "Acknowledgment rejected; aborting remaining batch"
                );
                ConsumerError::from(e)
            })?;

            self.sink.emit(normalized.clone());
            progress.messages.push(normalized);
        }

        session.close();
        Ok(())
    }
}
