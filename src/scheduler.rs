//! # Poll Scheduler
//!
//! Fixed-interval driver for a [`Block`]. Triggers are serialized: the next
//! tick is not taken until the previous trigger has returned, so a block
//! instance never runs two cycles at once.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::blocks::{Block, BlockOutput};
use crate::config::ScheduleConfig;
use crate::state_machine::HealthStatus;

/// Why the scheduler loop ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerExit {
    Shutdown,
    Drained,
}

/// Runtime counters
#[derive(Debug, Default)]
pub struct SchedulerStats {
    pub triggers: AtomicU64,
    pub cycle_errors: AtomicU64,
    pub messages_emitted: AtomicU64,
    pub skipped: AtomicU64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedulerStatsSnapshot {
    pub triggers: u64,
    pub cycle_errors: u64,
    pub messages_emitted: u64,
    pub skipped: u64,
}

impl SchedulerStats {
    pub fn snapshot(&self) -> SchedulerStatsSnapshot {
        SchedulerStatsSnapshot {
            triggers: self.triggers.load(Ordering::Relaxed),
            cycle_errors: self.cycle_errors.load(Ordering::Relaxed),
            messages_emitted: self.messages_emitted.load(Ordering::Relaxed),
            skipped: self.skipped.load(Ordering::Relaxed),
        }
    }

    fn record(&self, output: &BlockOutput) {
        self.triggers.fetch_add(1, Ordering::Relaxed);
        self.messages_emitted
            .fetch_add(output.messages().len() as u64, Ordering::Relaxed);
        match output {
            BlockOutput::Error { .. } => {
                self.cycle_errors.fetch_add(1, Ordering::Relaxed);
            }
            BlockOutput::Skipped { .. } => {
                self.skipped.fetch_add(1, Ordering::Relaxed);
            }
            BlockOutput::Ok { .. } => {}
        }
    }
}

/// Stops a running scheduler from another task
#[derive(Debug, Clone)]
pub struct ShutdownHandle {
    sender: Arc<watch::Sender<bool>>,
}

impl ShutdownHandle {
    pub fn shutdown(&self) {
        self.sender.send_replace(true);
    }
}

/// Interval-driven trigger loop
#[derive(Debug)]
pub struct PollScheduler {
    scheduler_id: Uuid,
    period: Duration,
    shutdown: Arc<watch::Sender<bool>>,
    stats: Arc<SchedulerStats>,
}

impl PollScheduler {
    pub fn new(schedule: &ScheduleConfig) -> Self {
        Self::with_period(schedule.period())
    }

    pub fn with_period(period: Duration) -> Self {
        let (shutdown, _) = watch::channel(false);
        Self {
            scheduler_id: Uuid::new_v4(),
            period: period.max(Duration::from_millis(1)),
            shutdown: Arc::new(shutdown),
            stats: Arc::new(SchedulerStats::default()),
        }
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    pub fn shutdown_handle(&self) -> ShutdownHandle {
        ShutdownHandle {
            sender: Arc::clone(&self.shutdown),
        }
    }

    pub fn stats(&self) -> SchedulerStatsSnapshot {
        self.stats.snapshot()
    }

    /// Trigger `block` every period until shutdown or drain.
    ///
    /// The first trigger fires immediately. `on_output` sees every output.
    pub async fn run<F>(&self, block: &mut dyn Block, mut on_output: F) -> SchedulerExit
    where
        F: FnMut(&BlockOutput) + Send,
    {
        let mut shutdown = self.shutdown.subscribe();
        let mut ticker = interval(self.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(
            scheduler_id = %self.scheduler_id,
            block = %block.kind(),
            period = ?self.period,
            "⏱️ Poll scheduler started"
        );

        let exit = loop {
            if *shutdown.borrow() {
                break SchedulerExit::Shutdown;
            }

            tokio::select! {
                _ = ticker.tick() => {}
                changed = shutdown.changed() => {
                    // A dropped sender also means nobody can resume us
                    if changed.is_err() || *shutdown.borrow() {
                        break SchedulerExit::Shutdown;
                    }
                    continue;
                }
            }

            let output = block.on_trigger().await;
            self.stats.record(&output);

            match &output {
                BlockOutput::Error { diagnostic, .. } => warn!(
                    scheduler_id = %self.scheduler_id,
                    diagnostic = %diagnostic,
                    "Poll trigger reported an error"
                ),
                other => debug!(
                    scheduler_id = %self.scheduler_id,
                    emitted = other.messages().len(),
                    "Poll trigger finished"
                ),
            }

            on_output(&output);

            if let BlockOutput::Skipped {
                health: HealthStatus::Drained,
            } = output
            {
                break SchedulerExit::Drained;
            }
        };

        info!(
            scheduler_id = %self.scheduler_id,
            exit = ?exit,
            stats = ?self.stats.snapshot(),
            "⏹️ Poll scheduler stopped"
        );
        exit
    }
}
