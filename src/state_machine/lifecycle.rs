use tokio::sync::watch;
use tracing::{info, warn};

use super::events::LifecycleEvent;
use super::states::{HealthReport, HealthStatus};
use crate::config::ConsumerConfig;
use crate::constants::events;
use crate::consumer::{probe, ConsumerState, PollCycleController, PollCycleResult};
use crate::error::{ConsumerError, Result};
use crate::logging::log_lifecycle_transition;
use crate::messaging::Credential;

/// What one scheduled trigger did
#[derive(Debug, Clone, PartialEq)]
pub struct TriggerReport {
    /// `None` when polling was skipped
    pub cycle: Option<PollCycleResult>,
    pub reprobed: bool,
    pub status: HealthStatus,
}

/// Health lifecycle of one consumer block.
///
/// Poll cycles never set health directly. A cycle error, or a trigger while
/// already `failed`, requests a re-probe and the probe's verdict decides the
/// transition. Configuration failures park the block in `failed` without
/// further polling or probing.
pub struct LifecycleStateMachine {
    controller: PollCycleController,
    config: ConsumerConfig,
    credential: Option<Credential>,
    status: watch::Sender<HealthReport>,
    halted_by_configuration: bool,
}

impl std::fmt::Debug for LifecycleStateMachine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LifecycleStateMachine")
            .field("queue_name", &self.config.queue_name)
            .field("status", &*self.status.borrow())
            .field("halted_by_configuration", &self.halted_by_configuration)
            .finish()
    }
}

impl LifecycleStateMachine {
    /// Activate a block: the initial state is the verdict of a synchronous probe
    pub async fn activate(controller: PollCycleController, config: ConsumerConfig) -> Self {
        let credential = config.credential.clone();
        Self::activate_with_credential(controller, config, credential).await
    }

    /// Activate with a credential supplied by an external provider
    pub async fn activate_with_credential(
        controller: PollCycleController,
        config: ConsumerConfig,
        credential: Option<Credential>,
    ) -> Self {
        let event = verdict(&controller, &config, credential.as_ref()).await;
        let halted_by_configuration = matches!(event, LifecycleEvent::ConfigurationInvalid(_));
        let initial = match event {
            LifecycleEvent::ProbeSucceeded => HealthReport::ready(),
            LifecycleEvent::ConfigurationInvalid(description)
            | LifecycleEvent::ProbeFailed(description) => HealthReport::failed(description),
            LifecycleEvent::DrainRequested => HealthReport::drained(),
        };

        info!(
            queue_name = %config.queue_name,
            status = %initial.status,
            description = initial.description.as_deref(),
            event = events::BLOCK_ACTIVATED,
            "🚀 Consumer block activated"
        );

        let (status, _) = watch::channel(initial);
        Self {
            controller,
            config,
            credential,
            status,
            halted_by_configuration,
        }
    }

    pub fn status(&self) -> HealthStatus {
        self.status.borrow().status
    }

    pub fn report(&self) -> HealthReport {
        self.status.borrow().clone()
    }

    /// Follow health changes
    pub fn subscribe(&self) -> watch::Receiver<HealthReport> {
        self.status.subscribe()
    }

    pub fn config(&self) -> &ConsumerConfig {
        &self.config
    }

    /// Apply an event to the transition table
    pub fn apply(&mut self, event: LifecycleEvent) -> Result<HealthStatus> {
        let current = self.report();
        let target = determine_target_state(current.status, &event)?;

        if matches!(event, LifecycleEvent::ConfigurationInvalid(_)) {
            self.halted_by_configuration = true;
        }

        let next = match target {
            HealthStatus::Ready => HealthReport::ready(),
            HealthStatus::Failed => {
                HealthReport::failed(event.description().unwrap_or("probe failed"))
            }
            HealthStatus::Drained => HealthReport::drained(),
        };

        if current.status != next.status || current.description != next.description {
            log_lifecycle_transition(
                &self.config.queue_name,
                &current.status.to_string(),
                &next.status.to_string(),
                event.event_type(),
                next.description.as_deref(),
            );
            self.status.send_replace(next);
        }

        Ok(target)
    }

    /// Run the health probe and apply its verdict
    pub async fn reprobe(&mut self) -> Result<HealthStatus> {
        let event = verdict(&self.controller, &self.config, self.credential.as_ref()).await;
        self.apply(event)
    }

    /// Scheduled trigger: poll, then re-probe on a cycle error or while failed
    pub async fn on_trigger(&mut self) -> TriggerReport {
        let status = self.status();
        if status.is_terminal() || self.halted_by_configuration {
            return TriggerReport {
                cycle: None,
                reprobed: false,
                status,
            };
        }

        let Some(credential) = self.credential.clone() else {
            let status = self
                .apply(LifecycleEvent::ConfigurationInvalid(
                    ConsumerError::configuration("no credential configured").to_string(),
                ))
                .unwrap_or(status);
            return TriggerReport {
                cycle: None,
                reprobed: false,
                status,
            };
        };

        let cycle = self.controller.run_cycle(&self.config, &credential).await;
        let needs_probe = !cycle.is_ok() || self.status().is_failed();

        let status = if needs_probe {
            match self.reprobe().await {
                Ok(status) => status,
                Err(e) => {
                    warn!(queue_name = %self.config.queue_name, error = %e, "Re-probe not applied");
                    self.status()
                }
            }
        } else {
            self.status()
        };

        TriggerReport {
            cycle: Some(cycle),
            reprobed: needs_probe,
            status,
        }
    }

    /// Terminal drain: stop polling and clear the consumer timestamps
    pub async fn drain(&mut self) -> Result<()> {
        self.apply(LifecycleEvent::DrainRequested)?;
        ConsumerState::clear(self.controller.store().as_ref()).await?;

        info!(
            queue_name = %self.config.queue_name,
            event = events::BLOCK_DRAINED,
            "🧹 Consumer block drained"
        );
        Ok(())
    }
}

/// Transition table
pub fn determine_target_state(
    current: HealthStatus,
    event: &LifecycleEvent,
) -> Result<HealthStatus> {
    let target = match (current, event) {
        (HealthStatus::Ready | HealthStatus::Failed, LifecycleEvent::ProbeSucceeded) => {
            HealthStatus::Ready
        }
        (HealthStatus::Ready | HealthStatus::Failed, LifecycleEvent::ProbeFailed(_)) => {
            HealthStatus::Failed
        }
        (HealthStatus::Ready | HealthStatus::Failed, LifecycleEvent::ConfigurationInvalid(_)) => {
            HealthStatus::Failed
        }
        (HealthStatus::Ready | HealthStatus::Failed, LifecycleEvent::DrainRequested) => {
            HealthStatus::Drained
        }
        (from, _) => {
            return Err(ConsumerError::InvalidTransition {
                from: from.to_string(),
                event: event.event_type().to_string(),
            })
        }
    };

    Ok(target)
}

/// Probe and translate the result into a lifecycle event
async fn verdict(
    controller: &PollCycleController,
    config: &ConsumerConfig,
    credential: Option<&Credential>,
) -> LifecycleEvent {
    let Some(credential) = credential else {
        return LifecycleEvent::ConfigurationInvalid(
            ConsumerError::configuration("no credential configured").to_string(),
        );
    };

    match probe(controller.provider(), config, credential).await {
        Ok(()) => LifecycleEvent::ProbeSucceeded,
        Err(e) if e.is_configuration() => LifecycleEvent::ConfigurationInvalid(e.to_string()),
        Err(e) => LifecycleEvent::ProbeFailed(e.to_string()),
    }
}
