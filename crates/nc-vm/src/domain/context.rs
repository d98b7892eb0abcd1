//! Block- and transaction-level execution context.

use std::sync::Arc;

use primitive_types::U256;
use shared_types::{Hash, Name, EMPTY_HASH};

/// How many ancestors BLOCKHASH can see.
pub const BLOCKHASH_WINDOW: u64 = 256;

/// Block-level values visible to contract code.
#[derive(Clone, Debug)]
pub struct BlockContext {
    /// Producer of the block.
    pub coinbase: Name,
    /// Block height.
    pub number: u64,
    /// Slot timestamp in milliseconds.
    pub time: u64,
    /// Header difficulty.
    pub difficulty: U256,
    /// Block gas limit.
    pub gas_limit: u64,
    /// Active fork.
    pub fork_id: u64,
    /// Hashes of the preceding blocks, parent first.
    pub ancestor_hashes: Arc<Vec<Hash>>,
}

impl BlockContext {
    /// BLOCKHASH semantics: the hash of one of the last 256 ancestors, zero
    /// otherwise.
    #[must_use]
    pub fn block_hash(&self, number: u64) -> Hash {
        if number >= self.number || self.number - number > BLOCKHASH_WINDOW {
            return EMPTY_HASH;
        }
        let index = (self.number - number - 1) as usize;
        self.ancestor_hashes.get(index).copied().unwrap_or(EMPTY_HASH)
    }
}

/// Transaction-level values visible to contract code.
#[derive(Clone, Debug)]
pub struct TxContext {
    /// Sender of the top-level action.
    pub origin: Name,
    /// Gas price of the transaction.
    pub gas_price: U256,
    /// Position of the action in its transaction, stamped on emitted logs.
    pub action_index: u32,
}
