//! # Service Bus Consumer CLI
//!
//! Runs a queue subscription, reads a single batch, or probes a queue, using
//! configuration from a YAML file and `SBQ__` environment overrides.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::collections::HashMap;
use std::path::PathBuf;
use std::process;
use std::sync::Arc;
use tracing::{error, info};

use servicebus_consumer::blocks::{BlockContext, BlockKind, BlockOutput};
use servicebus_consumer::config::{ConfigLoader, ConsumerConfig};
use servicebus_consumer::consumer::{BroadcastSink, FileStateStore, InMemoryStateStore, StateStore};
use servicebus_consumer::logging::{init_structured_logging, log_error};
use servicebus_consumer::messaging::{QueueProvider, ServiceBusProvider};
use servicebus_consumer::scheduler::{PollScheduler, SchedulerExit};
use servicebus_consumer::{probe, HealthStatus};

#[derive(Parser)]
#[command(name = "servicebus-consumer")]
#[command(about = "At-least-once Azure Service Bus queue consumer")]
#[command(version = env!("CARGO_PKG_VERSION"))]
pub struct Cli {
    /// Configuration file (default: $SBQ_CONFIG_PATH)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Override the queue name from configuration
    #[arg(short, long, global = true)]
    queue: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Poll on the configured schedule, printing messages as JSON lines
    Run {
        /// Drain the subscription on Ctrl-C, clearing persisted consumer state
        #[arg(long)]
        drain: bool,
    },

    /// Read one batch and print the block output
    Read,

    /// Check that the queue is reachable without consuming anything
    Probe,

    /// Print the config schema for a block kind
    Schema {
        /// read_queue or queue_subscription
        #[arg(default_value = "queue_subscription")]
        kind: String,
    },
}

#[tokio::main]
async fn main() {
    init_structured_logging();
    let cli = Cli::parse();

    let code = match execute(cli).await {
        Ok(code) => code,
        Err(e) => {
            log_error("cli", "execute", &format!("{e:#}"), None);
            1
        }
    };
    process::exit(code);
}

async fn execute(cli: Cli) -> Result<i32> {
    if let Commands::Schema { kind } = &cli.command {
        let kind: BlockKind = kind.parse()?;
        println!("{}", serde_json::to_string_pretty(&kind.config_schema())?);
        return Ok(0);
    }

    let config = load_config(&cli)?;

    match cli.command {
        Commands::Run { drain } => run_subscription(config, drain).await,
        Commands::Read => read_once(config).await,
        Commands::Probe => probe_queue(config).await,
        Commands::Schema { .. } => Ok(0),
    }
}

fn load_config(cli: &Cli) -> Result<ConsumerConfig> {
    let mut loader = match &cli.config {
        Some(path) => ConfigLoader::new().with_file(path),
        None => ConfigLoader::from_env(),
    };

    if let Some(queue) = &cli.queue {
        let mut vars: HashMap<String, String> = std::env::vars().collect();
        vars.insert("SBQ__QUEUE_NAME".to_string(), queue.clone());
        loader = loader.with_env_source(vars);
    }

    let config = loader.load()?;
    if config.credential.is_none() {
        anyhow::bail!(
            "no credential configured; set credential in the config file or SBQ__CREDENTIAL__CONNECTION_STRING"
        );
    }
    Ok(config)
}

fn block_context(config: &ConsumerConfig, sink: Arc<BroadcastSink>) -> Result<BlockContext> {
    let provider = ServiceBusProvider::new().context("failed to create Service Bus client")?;
    let store: Arc<dyn StateStore> = match &config.state_file {
        Some(path) => Arc::new(FileStateStore::new(path)),
        None => Arc::new(InMemoryStateStore::new()),
    };

    Ok(BlockContext::new(
        config.clone(),
        QueueProvider::from(provider),
        store,
        sink,
    ))
}

fn print_messages(output: &BlockOutput) {
    for message in output.messages() {
        match serde_json::to_string(message) {
            Ok(line) => println!("{line}"),
            Err(e) => error!(error = %e, "Failed to serialize message"),
        }
    }
}

/// Whether a finished subscription should release its persisted state
fn should_drain(exit: SchedulerExit, drain_requested: bool) -> bool {
    exit == SchedulerExit::Shutdown && drain_requested
}

async fn run_subscription(config: ConsumerConfig, drain: bool) -> Result<i32> {
    let sink = Arc::new(BroadcastSink::default());
    let mut block = BlockKind::QueueSubscription.build(block_context(&config, Arc::clone(&sink))?);

    let activation = block.on_activate().await;
    info!(
        queue_name = %config.queue_name,
        status = %activation.status,
        description = activation.description.as_deref(),
        "Subscription activated"
    );

    let scheduler = PollScheduler::new(&config.schedule);
    let shutdown = scheduler.shutdown_handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("🛑 Ctrl-C received, stopping subscription");
            shutdown.shutdown();
        }
    });

    let exit = scheduler.run(block.as_mut(), print_messages).await;

    if should_drain(exit, drain) {
        block.on_drain().await?;
    }

    let final_status = block
        .health()
        .map(|health| {
            let status = health.borrow().status;
            status
        })
        .unwrap_or(activation.status);
    info!(stats = ?scheduler.stats(), status = %final_status, "Subscription finished");
    Ok(0)
}

async fn read_once(config: ConsumerConfig) -> Result<i32> {
    let sink = Arc::new(BroadcastSink::default());
    let mut block = BlockKind::ReadQueue.build(block_context(&config, sink)?);

    let activation = block.on_activate().await;
    if activation.status == HealthStatus::Failed {
        anyhow::bail!(
            "read block failed to activate: {}",
            activation.description.unwrap_or_default()
        );
    }

    let output = block.on_trigger().await;
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(if output.is_error() { 2 } else { 0 })
}

async fn probe_queue(config: ConsumerConfig) -> Result<i32> {
    let provider = QueueProvider::from(ServiceBusProvider::new()?);
    let credential = config.credential()?;

    match probe(&provider, &config, credential).await {
        Ok(()) => {
            println!("ready");
            Ok(0)
        }
        Err(e) => {
            println!("failed: {e}");
            Ok(2)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_keeps_state_by_default() {
        let cli = Cli::try_parse_from(["servicebus-consumer", "run"]).unwrap();
        assert!(matches!(cli.command, Commands::Run { drain: false }));
        assert!(!should_drain(SchedulerExit::Shutdown, false));
    }

    #[test]
    fn test_run_drains_only_when_requested() {
        let cli = Cli::try_parse_from(["servicebus-consumer", "run", "--drain"]).unwrap();
        assert!(matches!(cli.command, Commands::Run { drain: true }));
        assert!(should_drain(SchedulerExit::Shutdown, true));
        assert!(!should_drain(SchedulerExit::Drained, true));
    }

    #[test]
    fn test_global_options_parse_after_subcommand() {
        let cli = Cli::try_parse_from(["servicebus-consumer", "probe", "--queue", "orders"])
            .unwrap();
        assert_eq!(cli.queue.as_deref(), Some("orders"));
        assert!(matches!(cli.command, Commands::Probe));
    }
}
