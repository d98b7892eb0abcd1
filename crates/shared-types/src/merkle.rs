//! # Root Derivation
//!
//! Transaction roots switch scheme at a configured fork:
//!
//! | Fork | Scheme |
//! |------|--------|
//! | `cur < merkle_fork` | Keccak over the concatenated transaction hashes |
//! | `cur >= merkle_fork` | Binary Keccak merkle tree over transaction hashes |
//!
//! Receipt roots always use the merkle tree over receipt consensus hashes.

use crate::entities::Transaction;
use crate::primitives::{keccak256, Hash, EMPTY_HASH};
use crate::receipt::Receipt;

/// Binary Keccak merkle root. Odd levels duplicate their last node; the root
/// of an empty list is [`EMPTY_HASH`].
#[must_use]
pub fn merkle_root(leaves: &[Hash]) -> Hash {
    if leaves.is_empty() {
        return EMPTY_HASH;
    }
    let mut level = leaves.to_vec();
    while level.len() > 1 {
        if level.len() % 2 == 1 {
            if let Some(last) = level.last().copied() {
                level.push(last);
            }
        }
        level = level
            .chunks(2)
            .map(|pair| {
                let mut buf = [0u8; 64];
                buf[..32].copy_from_slice(&pair[0]);
                buf[32..].copy_from_slice(&pair[1]);
                keccak256(&buf)
            })
            .collect();
    }
    level[0]
}

/// Legacy list hash: Keccak over the concatenated leaves.
#[must_use]
pub fn list_hash(leaves: &[Hash]) -> Hash {
    keccak256(&leaves.concat())
}

/// Transaction root under the scheme selected by `fork_cur`.
#[must_use]
pub fn derive_tx_root(txs: &[Transaction], fork_cur: u64, merkle_fork: u64) -> Hash {
    let hashes: Vec<Hash> = txs.iter().map(Transaction::hash).collect();
    if fork_cur < merkle_fork {
        list_hash(&hashes)
    } else {
        merkle_root(&hashes)
    }
}

/// Receipt root over receipt consensus hashes.
#[must_use]
pub fn derive_receipt_root(receipts: &[Receipt]) -> Hash {
    let hashes: Vec<Hash> = receipts.iter().map(Receipt::consensus_hash).collect();
    merkle_root(&hashes)
}
