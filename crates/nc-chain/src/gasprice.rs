//! Gas-price oracle.
//!
//! Suggests a price from the cheapest transaction of each recent block.

use std::sync::Arc;

use parking_lot::RwLock;
use primitive_types::U256;
use serde::{Deserialize, Serialize};
use shared_types::{Block, Hash};
use tokio::sync::mpsc;
use tracing::{debug, instrument, trace};

use crate::ports::BlockBackend;

/// Oracle parameters.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OracleConfig {
    /// Number of recent blocks sampled.
    pub check_blocks: u64,
    /// Percentile of the sampled minimum prices to suggest.
    pub percentile: u64,
    /// Concurrent block fetches.
    pub max_workers: usize,
    /// Suggestion when no block carries transactions.
    pub default_price: U256,
    /// Upper bound on any suggestion.
    pub max_price: U256,
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            check_blocks: 20,
            percentile: 60,
            max_workers: 4,
            default_price: U256::one(),
            max_price: U256::from(500_000_000_000u64),
        }
    }
}

/// Percentile-of-minimums price oracle.
pub struct Oracle {
    backend: Arc<dyn BlockBackend>,
    config: OracleConfig,
    cache: RwLock<Option<(Hash, U256)>>,
}

impl Oracle {
    /// Create an oracle over `backend`.
    pub fn new(backend: Arc<dyn BlockBackend>, config: OracleConfig) -> Self {
        Self {
            backend,
            config,
            cache: RwLock::new(None),
        }
    }

    /// Suggested gas price for the current head.
    #[instrument(skip_all)]
    pub async fn suggest_price(&self) -> U256 {
        let head = self.backend.head().await;
        let head_hash = head.hash();
        if let Some((hash, price)) = *self.cache.read() {
            if hash == head_hash {
                return price;
            }
        }

        let blocks = self.config.check_blocks.min(head.number + 1);
        let workers = self.config.max_workers.max(1);
        let (tx, mut rx) = mpsc::channel::<Option<U256>>(workers);
        let mut prices = Vec::with_capacity(blocks as usize);
        let mut in_flight = 0usize;

        for offset in 0..blocks {
            if in_flight == workers {
                if let Some(price) = rx.recv().await {
                    prices.extend(price);
                }
                in_flight -= 1;
            }
            let backend = Arc::clone(&self.backend);
            let tx = tx.clone();
            let number = head.number - offset;
            tokio::spawn(async move {
                let price = backend.block_by_number(number).await.as_ref().and_then(min_gas_price);
                if tx.send(price).await.is_err() {
                    trace!(number, "oracle gave up waiting");
                }
            });
            in_flight += 1;
        }
        drop(tx);
        while let Some(price) = rx.recv().await {
            prices.extend(price);
        }

        let sampled = if prices.is_empty() {
            self.config.default_price
        } else {
            prices.sort_unstable();
            let percentile = self.config.percentile.min(100) as usize;
            prices[(prices.len() - 1) * percentile / 100]
        };
        let price = sampled.min(self.config.max_price);

        debug!(head = head.number, samples = prices.len(), %price, "suggested gas price");
        *self.cache.write() = Some((head_hash, price));
        price
    }
}

/// Cheapest transaction price in `block`, `None` for empty blocks.
fn min_gas_price(block: &Block) -> Option<U256> {
    block.transactions.iter().map(|tx| tx.gas_price).min()
}
