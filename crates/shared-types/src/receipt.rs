//! # Execution Results
//!
//! Receipts, logs, the 2048-bit log bloom and gas attribution keys.

use serde::{Deserialize, Serialize};
use serde_with::{serde_as, Bytes};

use crate::primitives::{keccak256, keccak_encoded, AssetId, Hash, Name, EMPTY_HASH};

/// Byte length of a [`Bloom`].
pub const BLOOM_BYTES: usize = 256;

/// 2048-bit log bloom filter.
#[serde_as]
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Bloom(#[serde_as(as = "Bytes")] pub [u8; BLOOM_BYTES]);

impl Default for Bloom {
    fn default() -> Self {
        Self([0u8; BLOOM_BYTES])
    }
}

impl std::fmt::Debug for Bloom {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Bloom({})", hex::encode(self.0))
    }
}

impl Bloom {
    /// Set the three bits selected by `keccak256(item)`.
    pub fn accrue(&mut self, item: &[u8]) {
        for bit in Self::bits(item) {
            self.0[BLOOM_BYTES - 1 - bit / 8] |= 1 << (bit % 8);
        }
    }

    /// True if every bit for `item` is set. May report false positives.
    #[must_use]
    pub fn contains(&self, item: &[u8]) -> bool {
        Self::bits(item)
            .into_iter()
            .all(|bit| self.0[BLOOM_BYTES - 1 - bit / 8] & (1 << (bit % 8)) != 0)
    }

    /// Merge another bloom into this one.
    pub fn union(&mut self, other: &Bloom) {
        for (a, b) in self.0.iter_mut().zip(other.0.iter()) {
            *a |= *b;
        }
    }

    /// Bloom over a set of logs (names and topics).
    #[must_use]
    pub fn from_logs(logs: &[Log]) -> Self {
        let mut bloom = Self::default();
        for log in logs {
            bloom.accrue(log.name.as_str().as_bytes());
            for topic in &log.topics {
                bloom.accrue(topic);
            }
        }
        bloom
    }

    /// Union of the blooms of all receipts.
    #[must_use]
    pub fn from_receipts(receipts: &[Receipt]) -> Self {
        let mut bloom = Self::default();
        for receipt in receipts {
            bloom.union(&receipt.bloom);
        }
        bloom
    }

    fn bits(item: &[u8]) -> [usize; 3] {
        let h = keccak256(item);
        let mut out = [0usize; 3];
        for (i, slot) in out.iter_mut().enumerate() {
            *slot = ((usize::from(h[2 * i]) << 8) | usize::from(h[2 * i + 1])) & 2047;
        }
        out
    }
}

/// A log emitted by contract code.
#[serde_as]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Log {
    /// Emitting account.
    pub name: Name,
    /// Indexed topics.
    pub topics: Vec<Hash>,
    /// Unindexed payload.
    #[serde_as(as = "Bytes")]
    pub data: Vec<u8>,
    /// Block height (set by the state at emission).
    pub block_number: u64,
    /// Block hash, patched once after sealing.
    pub block_hash: Hash,
    /// Transaction hash.
    pub tx_hash: Hash,
    /// Transaction position in the block.
    pub tx_index: u32,
    /// Action position in the transaction.
    pub action_index: u32,
    /// Log position in the block.
    pub index: u32,
}

impl Log {
    /// New log without block back-references.
    #[must_use]
    pub fn new(name: Name, topics: Vec<Hash>, data: Vec<u8>) -> Self {
        Self {
            name,
            topics,
            data,
            block_number: 0,
            block_hash: EMPTY_HASH,
            tx_hash: EMPTY_HASH,
            tx_index: 0,
            action_index: 0,
            index: 0,
        }
    }
}

/// Fee recipient object used by gas distribution.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum DistributeKey {
    /// Block producer: intrinsic gas.
    Coinbase(Name),
    /// Contract account: gas burnt in its frames.
    Contract(Name),
    /// Asset: gas spent by plugin calls moving it.
    Asset(AssetId),
}

/// One entry of an action's gas distribution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GasAllot {
    /// Recipient object.
    pub key: DistributeKey,
    /// Signed gas attributed to it.
    pub gas: i64,
}

/// Outcome flag of a single action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ActionStatus {
    /// The action failed; gas was still charged.
    Failed,
    /// The action succeeded.
    Successful,
}

/// Per-action part of a receipt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionResult {
    /// Success flag.
    pub status: ActionStatus,
    /// Position in the transaction.
    pub index: u32,
    /// Gas used by this action.
    pub gas_used: u64,
    /// Distribution of that gas.
    pub gas_allot: Vec<GasAllot>,
    /// Error text for failed actions; empty on success.
    pub error: String,
}

/// Result of applying one transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Receipt {
    /// State root after the transaction.
    pub post_state: Hash,
    /// Gas used by the block up to and including this transaction.
    pub cumulative_gas_used: u64,
    /// One entry per action.
    pub action_results: Vec<ActionResult>,
    /// Logs emitted by the transaction.
    pub logs: Vec<Log>,
    /// Bloom over `logs`.
    pub bloom: Bloom,
    /// Transaction hash.
    pub tx_hash: Hash,
    /// Gas used by this transaction.
    pub total_gas_used: u64,
}

impl Receipt {
    /// True when every action succeeded.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.action_results
            .iter()
            .all(|r| r.status == ActionStatus::Successful)
    }

    /// Hash over the consensus fields. Log back-references are excluded since
    /// the block hash is only known after sealing.
    #[must_use]
    pub fn consensus_hash(&self) -> Hash {
        let logs: Vec<(&Name, &Vec<Hash>, &Vec<u8>)> = self
            .logs
            .iter()
            .map(|l| (&l.name, &l.topics, &l.data))
            .collect();
        keccak_encoded(&(
            &self.post_state,
            self.cumulative_gas_used,
            &self.action_results,
            logs,
            &self.bloom,
            self.total_gas_used,
        ))
    }

    /// Patch the block-hash back-reference of every log.
    pub fn set_block_hash(&mut self, hash: Hash) {
        for log in &mut self.logs {
            log.block_hash = hash;
        }
    }
}
