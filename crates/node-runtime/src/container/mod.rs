//! # Node Container
//!
//! Holds the chain, the transaction pool, the engine and the services built
//! on them, wired together with one head-event channel.
//!
//! ## Initialization Order
//!
//! ```text
//! Genesis ──▶ InMemoryChain ──▶ DevDpos
//!                  │
//!                  ├──▶ BlockImporter ─┐
//!                  ├──▶ Oracle         ├── head events ──▶ pool pruner
//!                  └──▶ Worker / Miner ┘
//! ```

use std::sync::Arc;

use anyhow::{Context, Result};
use nc_block_production::{Miner, Worker};
use nc_chain::{head_channel, BlockImporter, ChainReader, HeadSender, Oracle};
use shared_types::{short_hex, Transaction};
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument};

use crate::adapters::{DevDpos, InMemoryChain, InMemoryTxPool, PoolError};
use crate::config::NodeConfig;
use crate::genesis::{Genesis, GenesisBuilder};

/// Every long-lived component of a node.
pub struct NodeContainer {
    /// Node configuration (immutable after initialization).
    pub config: NodeConfig,
    /// Local chain store.
    pub chain: Arc<InMemoryChain>,
    /// Development consensus engine.
    pub engine: Arc<DevDpos>,
    /// Pending transactions.
    pub pool: Arc<InMemoryTxPool>,
    /// Head-event channel shared by the importer and the worker.
    pub head_tx: HeadSender,
    /// Import pipeline for peer blocks.
    pub importer: Arc<BlockImporter>,
    /// Gas-price oracle.
    pub oracle: Arc<Oracle>,
    /// Miner lifecycle.
    pub miner: Arc<Miner>,
}

impl NodeContainer {
    /// Build genesis and wire every component.
    pub fn new(config: NodeConfig) -> Result<Self> {
        let genesis = GenesisBuilder::new(&config.chain, config.genesis.clone())
            .build()
            .context("Failed to build genesis block")?;
        Self::with_genesis(config, genesis)
    }

    /// Wire every component on top of a prepared genesis.
    #[instrument(name = "node_init", skip_all)]
    pub fn with_genesis(config: NodeConfig, genesis: Genesis) -> Result<Self> {
        info!("Initializing NameChain node container");
        info!(
            hash = %hex::encode(genesis.block.hash()),
            state_root = %short_hex(&genesis.block.header.state_root),
            "Genesis block created"
        );

        let engine = Arc::new(
            DevDpos::new(config.genesis.producers.clone(), config.block_interval_ms)
                .context("Failed to create consensus engine")?,
        );
        let chain = Arc::new(InMemoryChain::new(config.chain.clone(), genesis));
        let pool = Arc::new(InMemoryTxPool::default());
        let (head_tx, _) = head_channel();

        let importer = Arc::new(BlockImporter::new(
            chain.clone(),
            engine.clone(),
            nc_vm::VmConfig::default(),
            head_tx.clone(),
        ));
        let oracle = Arc::new(Oracle::new(chain.clone(), config.oracle.clone()));
        let worker = Worker::new(
            chain.clone(),
            engine.clone(),
            pool.clone(),
            head_tx.clone(),
            config.miner.clone(),
        );
        let miner = Arc::new(Miner::new(Arc::new(worker), config.chain.max_extra_size));

        Ok(Self {
            config,
            chain,
            engine,
            pool,
            head_tx,
            importer,
            oracle,
            miner,
        })
    }

    /// Admit a transaction to the pending pool.
    pub fn submit(&self, tx: Transaction) -> Result<(), PoolError> {
        self.pool.add(tx)
    }

    /// Drop included transactions from the pool on every new head until
    /// `shutdown` fires.
    pub fn spawn_pool_pruner(&self, mut shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        let mut heads = self.head_tx.subscribe();
        let chain = self.chain.clone();
        let pool = self.pool.clone();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    event = heads.recv() => match event {
                        Ok(event) => {
                            if let Some(block) = chain.get_block(&event.hash, event.number) {
                                pool.remove_included(&block);
                            }
                        }
                        Err(broadcast::error::RecvError::Lagged(skipped)) => {
                            debug!(skipped, "pool pruner lagged");
                        }
                        Err(broadcast::error::RecvError::Closed) => break,
                    },
                    changed = shutdown.changed() => {
                        if changed.is_err() || *shutdown.borrow() {
                            break;
                        }
                    }
                }
            }
            debug!("pool pruner stopped");
        })
    }
}
