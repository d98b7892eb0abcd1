//! Chain-head notifications.
//!
//! Published on a `tokio::sync::broadcast` channel after a block is written,
//! by the importer for blocks from peers and by the worker for its own.

use serde::{Deserialize, Serialize};
use shared_types::{Block, Hash, Name};
use tokio::sync::broadcast;

/// Default capacity of the head-event channel.
pub const HEAD_EVENT_CAPACITY: usize = 64;

/// A new canonical head.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainHeadEvent {
    /// Block hash.
    pub hash: Hash,
    /// Block height.
    pub number: u64,
    /// Producer.
    pub coinbase: Name,
    /// Slot timestamp (ms).
    pub time: u64,
}

impl ChainHeadEvent {
    /// Event for `block`.
    #[must_use]
    pub fn from_block(block: &Block) -> Self {
        Self {
            hash: block.hash(),
            number: block.number(),
            coinbase: block.header.coinbase.clone(),
            time: block.header.time,
        }
    }
}

/// Sending half of the head-event channel.
pub type HeadSender = broadcast::Sender<ChainHeadEvent>;

/// New head-event channel.
#[must_use]
pub fn head_channel() -> (HeadSender, broadcast::Receiver<ChainHeadEvent>) {
    broadcast::channel(HEAD_EVENT_CAPACITY)
}
