//! # NameChain Node Runtime
//!
//! The main entry point for a NameChain development node.
//!
//! ## Startup Sequence
//!
//! 1. Load configuration (`NC_CONFIG` file, then environment overrides)
//! 2. Initialize logging (`RUST_LOG`, else the configured level)
//! 3. Build genesis and wire the node container
//! 4. Start the pool pruner and the status reporter
//! 5. Start the miner if configured
//! 6. Run until Ctrl+C, then stop the miner and background tasks

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use nc_chain::ChainReader;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use node_runtime::{NodeConfig, NodeContainer};

/// Slots between two status lines.
const STATUS_EVERY_SLOTS: u32 = 10;

/// The running node.
struct NodeRuntime {
    container: Arc<NodeContainer>,
    shutdown_tx: watch::Sender<bool>,
    shutdown_rx: watch::Receiver<bool>,
    tasks: Vec<JoinHandle<()>>,
}

impl NodeRuntime {
    fn new(config: NodeConfig) -> Result<Self> {
        let container = Arc::new(NodeContainer::new(config)?);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        Ok(Self {
            container,
            shutdown_tx,
            shutdown_rx,
            tasks: Vec::new(),
        })
    }

    fn start(&mut self) -> Result<()> {
        let config = &self.container.config;
        info!("===========================================");
        info!("  NameChain Node Runtime v{}", env!("CARGO_PKG_VERSION"));
        info!("===========================================");
        info!(
            chain = %config.chain.chain_name,
            chain_id = config.chain.chain_id,
            interval_ms = config.block_interval_ms,
            producers = config.genesis.producers.len(),
            cpus = num_cpus::get(),
            "node configured"
        );

        self.tasks
            .push(self.container.spawn_pool_pruner(self.shutdown_rx.clone()));
        let reporter = self.spawn_status_reporter();
        self.tasks.push(reporter);

        if config.miner.start {
            self.container
                .miner
                .start(false)
                .context("Failed to start miner")?;
        } else {
            info!("mining disabled (set NC_MINE=true to produce blocks)");
        }
        Ok(())
    }

    fn spawn_status_reporter(&self) -> JoinHandle<()> {
        let container = Arc::clone(&self.container);
        let mut shutdown = self.shutdown_rx.clone();
        let period = Duration::from_millis(container.config.block_interval_ms) * STATUS_EVERY_SLOTS;
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let head = container.chain.current_header();
                        let price = container.oracle.suggest_price().await;
                        let metrics = container.miner.metrics().snapshot();
                        info!(
                            head = head.number,
                            pending = container.pool.len(),
                            gas_price = %price,
                            mined = metrics.blocks_mined,
                            skipped = metrics.skipped,
                            "status"
                        );
                    }
                    changed = shutdown.changed() => {
                        if changed.is_err() || *shutdown.borrow() {
                            break;
                        }
                    }
                }
            }
        })
    }

    async fn shutdown(self) {
        info!("Initiating graceful shutdown...");
        if self.container.miner.mining() {
            if let Err(err) = self.container.miner.stop().await {
                error!(error = %err, "failed to stop miner");
            }
        }
        if self.shutdown_tx.send(true).is_err() {
            error!("Failed to send shutdown signal");
        }
        for task in self.tasks {
            if let Err(err) = task.await {
                error!(error = %err, "background task failed");
            }
        }
        info!("Shutdown complete");
    }
}

fn init_logging(level: &str) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(level))?;
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .try_init()
        .map_err(|err| anyhow::anyhow!("{err}"))
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = NodeConfig::load().context("Failed to load configuration")?;
    init_logging(&config.log_level).context("Failed to initialize logging")?;

    let mut runtime = NodeRuntime::new(config)?;
    runtime.start()?;

    info!("Node is running. Press Ctrl+C to stop.");
    tokio::signal::ctrl_c().await?;

    runtime.shutdown().await;
    Ok(())
}
