//! neuromesh — autonomous agent runtime launcher
//!
//! Usage:
//!   neuromesh                       → start with defaults
//!   neuromesh --config mesh.toml    → load runtime config
//!   neuromesh --yolo                → start with the approval override on
//!   neuromesh --dump-config         → print default config TOML and exit
//!
//! Runs the coordinator and bridges stdin to the operator command surface;
//! notifications print to stdout.

use clap::Parser;
use neuromesh_bus::{Network, Neuron, NeuronContext, Topology};
use neuromesh_core::{Message, NeuronId};
use neuromesh_governance::IntentionBoard;
use neuromesh_runtime::{Collaborators, Coordinator, RuntimeConfig};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(
    name = "neuromesh",
    about = "Autonomous agent runtime — weighted bus, intention governance, coordination loops",
    version = env!("CARGO_PKG_VERSION")
)]
struct Cli {
    /// Path to config file (TOML). Default: ./neuromesh.toml
    #[arg(long)]
    config: Option<PathBuf>,

    /// Dump default config as TOML and exit.
    #[arg(long)]
    dump_config: bool,

    /// Override the coordination tick interval (milliseconds).
    #[arg(long)]
    tick_ms: Option<u64>,

    /// Start with the approval override enabled.
    #[arg(long, default_value_t = false)]
    yolo: bool,
}

/// Minimal observer unit so a bare launch has a live subscriber; real
/// deployments register their own units before `start`.
struct MonitorNeuron {
    id: NeuronId,
}

#[async_trait::async_trait]
impl Neuron for MonitorNeuron {
    fn id(&self) -> &NeuronId {
        &self.id
    }

    fn name(&self) -> &str {
        "monitor"
    }

    fn kind(&self) -> &str {
        "observer"
    }

    fn subscriptions(&self) -> Vec<String> {
        vec!["*".to_string()]
    }

    async fn on_message(&self, msg: Message, _ctx: &NeuronContext) -> neuromesh_core::Result<()> {
        tracing::debug!(topic = %msg.topic, source = %msg.source, "observed");
        Ok(())
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    if cli.dump_config {
        println!("{}", RuntimeConfig::default().to_toml());
        return Ok(());
    }

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "neuromesh=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config_path = cli
        .config
        .unwrap_or_else(|| PathBuf::from("neuromesh.toml"));
    let mut config = RuntimeConfig::load(&config_path);
    if let Some(tick_ms) = cli.tick_ms {
        config.tick_ms = tick_ms;
    }
    if cli.yolo {
        config.approvals.yolo = true;
    }

    let network = Network::builder()
        .topology(Topology::new())
        .history_limit(config.history_limit)
        .idle_interval(config.idle_interval())
        .build();
    network
        .register(Arc::new(MonitorNeuron {
            id: NeuronId::new("monitor"),
        }))
        .await?;

    let board = Arc::new(IntentionBoard::new());
    let coordinator = Coordinator::new(network, board, Collaborators::new(), config);
    coordinator.start().await;

    let mut notifications = coordinator.notifier().subscribe();
    let printer = tokio::spawn(async move {
        loop {
            match notifications.recv().await {
                Ok(n) => println!("[{}] {}", n.source, n.message),
                Err(tokio::sync::broadcast::error::RecvError::Lagged(_)) => continue,
                Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
            }
        }
    });

    println!("neuromesh ready — type /help for commands, 'quit' to exit");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => match line? {
                Some(line) => {
                    let trimmed = line.trim();
                    if trimmed.is_empty() {
                        continue;
                    }
                    if trimmed == "quit" || trimmed == "exit" {
                        break;
                    }
                    if !coordinator.handle_command(trimmed).await {
                        println!("Not a command (try /help)");
                    }
                }
                None => break,
            },
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    coordinator.stop().await;
    printer.abort();
    Ok(())
}
