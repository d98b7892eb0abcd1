//! Outbound events (published by the miner).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use shared_types::{Block, Hash, Name};
use tokio::sync::broadcast;

/// Capacity of the miner event channel.
pub const MINER_EVENT_CAPACITY: usize = 64;

/// Miner lifecycle and production events.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum MinerEvent {
    /// The worker loop is running.
    Started {
        /// Producer account.
        coinbase: Name,
        /// Event timestamp.
        at: DateTime<Utc>,
    },

    /// The worker loop exited.
    Stopped {
        /// Event timestamp.
        at: DateTime<Utc>,
    },

    /// A block was sealed and written.
    NewMinedBlock {
        /// Block hash.
        hash: Hash,
        /// Block number.
        number: u64,
        /// Transaction count.
        tx_count: usize,
        /// Total gas used.
        gas_used: u64,
        /// Event timestamp.
        at: DateTime<Utc>,
    },
}

impl MinerEvent {
    /// Event for a freshly written block.
    #[must_use]
    pub fn mined(block: &Block) -> Self {
        Self::NewMinedBlock {
            hash: block.hash(),
            number: block.number(),
            tx_count: block.transactions.len(),
            gas_used: block.header.gas_used,
            at: Utc::now(),
        }
    }
}

/// Sending half of the miner event channel.
pub type MinerEventSender = broadcast::Sender<MinerEvent>;
