//! # In-Memory Transaction Pool
//!
//! Pending transactions grouped by sender and keyed by nonce. Serves the
//! worker's pending snapshot and drops transactions once a block includes
//! them.

use std::collections::BTreeMap;

use nc_block_production::TxSource;
use parking_lot::RwLock;
use primitive_types::U256;
use shared_types::{short_hex, Block, Name, Transaction};
use thiserror::Error;
use tracing::{debug, trace};

/// Pool admission errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PoolError {
    /// The transaction has no actions.
    #[error("transaction has no actions")]
    Empty,

    /// Actions of one transaction name different senders.
    #[error("transaction mixes senders")]
    MixedSenders,

    /// A transaction with the same sender and nonce pays at least as much.
    #[error("underpriced replacement for {sender} nonce {nonce}")]
    Underpriced {
        /// Sender.
        sender: Name,
        /// Nonce.
        nonce: u64,
    },

    /// The pool holds `capacity` transactions.
    #[error("pool full ({capacity})")]
    Full {
        /// Maximum transactions held.
        capacity: usize,
    },
}

/// Default number of transactions the pool holds.
pub const DEFAULT_POOL_CAPACITY: usize = 4_096;

/// Sender-and-nonce indexed pending pool.
pub struct InMemoryTxPool {
    pending: RwLock<BTreeMap<Name, BTreeMap<u64, Transaction>>>,
    capacity: usize,
}

impl Default for InMemoryTxPool {
    fn default() -> Self {
        Self::new(DEFAULT_POOL_CAPACITY)
    }
}

impl InMemoryTxPool {
    /// Empty pool holding at most `capacity` transactions.
    pub fn new(capacity: usize) -> Self {
        Self {
            pending: RwLock::new(BTreeMap::new()),
            capacity,
        }
    }

    /// Admit `tx`. A transaction with the sender and nonce of a pooled one
    /// replaces it only at a strictly higher gas price.
    pub fn add(&self, tx: Transaction) -> Result<(), PoolError> {
        let (Some(sender), Some(nonce)) = (tx.sender().cloned(), tx.nonce()) else {
            return Err(PoolError::Empty);
        };
        if tx.actions.iter().any(|action| action.from != sender) {
            return Err(PoolError::MixedSenders);
        }

        let mut pending = self.pending.write();
        let len: usize = pending.values().map(BTreeMap::len).sum();
        let existing = pending
            .get(&sender)
            .and_then(|queue| queue.get(&nonce))
            .map(|pooled| pooled.gas_price);
        match existing {
            Some(price) if price >= tx.gas_price => {
                return Err(PoolError::Underpriced { sender, nonce });
            }
            None if len >= self.capacity => {
                return Err(PoolError::Full {
                    capacity: self.capacity,
                });
            }
            _ => {}
        }
        trace!(tx = %short_hex(&tx.hash()), %sender, nonce, "pooled transaction");
        pending.entry(sender).or_default().insert(nonce, tx);
        Ok(())
    }

    /// Drop every transaction of the block's senders at or below the nonces
    /// the block consumed.
    pub fn remove_included(&self, block: &Block) {
        let mut pending = self.pending.write();
        let mut removed = 0usize;
        for tx in &block.transactions {
            let (Some(sender), Some(nonce)) = (tx.sender(), tx.nonce()) else {
                continue;
            };
            let Some(queue) = pending.get_mut(sender) else {
                continue;
            };
            let keep = queue.split_off(&(nonce + 1));
            removed += queue.len();
            *queue = keep;
            if queue.is_empty() {
                pending.remove(sender);
            }
        }
        if removed > 0 {
            debug!(number = block.number(), removed, "pruned included transactions");
        }
    }

    /// Number of pooled transactions.
    pub fn len(&self) -> usize {
        self.pending.read().values().map(BTreeMap::len).sum()
    }

    /// True if the pool is empty.
    pub fn is_empty(&self) -> bool {
        self.pending.read().is_empty()
    }

    /// Lowest gas price in the pool.
    pub fn min_gas_price(&self) -> Option<U256> {
        self.pending
            .read()
            .values()
            .flat_map(BTreeMap::values)
            .map(|tx| tx.gas_price)
            .min()
    }
}

impl TxSource for InMemoryTxPool {
    fn pending(&self) -> BTreeMap<Name, Vec<Transaction>> {
        self.pending
            .read()
            .iter()
            .map(|(sender, queue)| (sender.clone(), queue.values().cloned().collect()))
            .collect()
    }
}
