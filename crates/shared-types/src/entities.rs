//! # Core Domain Entities
//!
//! ## Clusters
//!
//! - **Chain**: [`Header`], [`Block`], [`ForkId`]
//! - **Transactions**: [`Transaction`], [`Action`], [`ActionType`]

use primitive_types::U256;
use serde::{Deserialize, Serialize};
use serde_with::{serde_as, Bytes};

use crate::merkle::{derive_receipt_root, derive_tx_root};
use crate::primitives::{keccak_encoded, AssetId, Hash, Name, EMPTY_HASH};
use crate::receipt::{Bloom, Receipt};

// =============================================================================
// CLUSTER A: TRANSACTIONS
// =============================================================================

/// Kind of state-changing operation carried by an [`Action`].
///
/// `CreateContract` and `CallContract` run through the VM; every other kind
/// is a system action handled by the account/asset manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ActionType {
    /// Invoke contract code on the target account.
    CallContract,
    /// Deploy contract code to the target account.
    CreateContract,
    /// Create a new named account.
    CreateAccount,
    /// Update account metadata.
    UpdateAccount,
    /// Mint more of an existing asset.
    IncreaseAsset,
    /// Register a new asset.
    IssueAsset,
    /// Burn an asset amount.
    DestroyAsset,
    /// Hand asset ownership to another account.
    SetAssetOwner,
    /// Plain value transfer between accounts.
    Transfer,
    /// Register as a block-producer candidate.
    RegCandidate,
    /// Vote for a block-producer candidate.
    VoteCandidate,
}

impl ActionType {
    /// Stable numeric code, used by the plugin-call opcode.
    #[must_use]
    pub const fn code(self) -> u64 {
        match self {
            Self::CallContract => 0x000,
            Self::CreateContract => 0x001,
            Self::CreateAccount => 0x100,
            Self::UpdateAccount => 0x101,
            Self::IncreaseAsset => 0x200,
            Self::IssueAsset => 0x201,
            Self::DestroyAsset => 0x202,
            Self::SetAssetOwner => 0x203,
            Self::Transfer => 0x205,
            Self::RegCandidate => 0x300,
            Self::VoteCandidate => 0x302,
        }
    }

    /// Reverse of [`ActionType::code`].
    #[must_use]
    pub const fn from_code(code: u64) -> Option<Self> {
        Some(match code {
            0x000 => Self::CallContract,
            0x001 => Self::CreateContract,
            0x100 => Self::CreateAccount,
            0x101 => Self::UpdateAccount,
            0x200 => Self::IncreaseAsset,
            0x201 => Self::IssueAsset,
            0x202 => Self::DestroyAsset,
            0x203 => Self::SetAssetOwner,
            0x205 => Self::Transfer,
            0x300 => Self::RegCandidate,
            0x302 => Self::VoteCandidate,
            _ => return None,
        })
    }

    /// True for the two kinds executed by the VM.
    #[must_use]
    pub const fn is_contract(self) -> bool {
        matches!(self, Self::CallContract | Self::CreateContract)
    }
}

/// One state-changing operation inside a transaction.
#[serde_as]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Action {
    /// What the action does.
    pub action_type: ActionType,
    /// Must equal the sender's current nonce.
    pub nonce: u64,
    /// Asset moved by `amount` and used to pay gas.
    pub asset_id: AssetId,
    /// Sender.
    pub from: Name,
    /// Recipient, contract or target of the system action.
    pub to: Name,
    /// Gas purchased for this action.
    pub gas_limit: u64,
    /// Value moved from `from` to `to`.
    pub amount: U256,
    /// Call data, init code or system-action arguments.
    #[serde_as(as = "Bytes")]
    pub payload: Vec<u8>,
}

impl Action {
    /// Plain transfer of `amount` units of `asset_id`.
    #[must_use]
    pub fn transfer(from: Name, to: Name, asset_id: AssetId, amount: U256, nonce: u64, gas_limit: u64) -> Self {
        Self {
            action_type: ActionType::Transfer,
            nonce,
            asset_id,
            from,
            to,
            gas_limit,
            amount,
            payload: Vec::new(),
        }
    }

    /// Keccak-256 of the canonical encoding.
    #[must_use]
    pub fn hash(&self) -> Hash {
        keccak_encoded(self)
    }
}

/// A signed bundle of actions sharing one gas price.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    /// Actions applied strictly in order.
    pub actions: Vec<Action>,
    /// Price paid per unit of gas, in each action's asset.
    pub gas_price: U256,
}

impl Transaction {
    /// Build a transaction.
    #[must_use]
    pub fn new(actions: Vec<Action>, gas_price: U256) -> Self {
        Self { actions, gas_price }
    }

    /// Keccak-256 of the canonical encoding.
    #[must_use]
    pub fn hash(&self) -> Hash {
        keccak_encoded(self)
    }

    /// Sender of the first action, which orders the transaction in the pool.
    #[must_use]
    pub fn sender(&self) -> Option<&Name> {
        self.actions.first().map(|a| &a.from)
    }

    /// Nonce of the first action.
    #[must_use]
    pub fn nonce(&self) -> Option<u64> {
        self.actions.first().map(|a| a.nonce)
    }

    /// Total gas purchased across all actions.
    #[must_use]
    pub fn gas_limit(&self) -> u64 {
        self.actions.iter().map(|a| a.gas_limit).fold(0, u64::saturating_add)
    }
}

// =============================================================================
// CLUSTER B: THE CHAIN
// =============================================================================

/// Protocol-version pair carried in every header.
///
/// `cur` is the ruleset this block follows; `next` is the highest ruleset the
/// producer is ready for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ForkId {
    /// Active fork.
    pub cur: u64,
    /// Fork voted for by the producer.
    pub next: u64,
}

/// Block header.
#[serde_as]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Header {
    /// Hash of the parent header.
    pub parent_hash: Hash,
    /// Producer of this block.
    pub coinbase: Name,
    /// Highest block number the producer considers irreversible.
    pub proposed_irreversible: u64,
    /// Root of the block's transactions.
    pub tx_root: Hash,
    /// Root of the block's receipts.
    pub receipt_root: Hash,
    /// State root after applying the block.
    pub state_root: Hash,
    /// Union of all receipt blooms.
    pub bloom: Bloom,
    /// Consensus weight, recomputed by the engine on import.
    pub difficulty: U256,
    /// Height.
    pub number: u64,
    /// Block gas limit.
    pub gas_limit: u64,
    /// Gas actually consumed.
    pub gas_used: u64,
    /// Slot timestamp in unix milliseconds.
    pub time: u64,
    /// Producer-chosen extra data, size-bounded.
    #[serde_as(as = "Bytes")]
    pub extra: Vec<u8>,
    /// Protocol ruleset.
    pub fork_id: ForkId,
    /// Producer seal over [`Header::seal_hash`].
    #[serde_as(as = "Bytes")]
    pub sign: Vec<u8>,
}

impl Header {
    /// Hash of the complete header, including the seal.
    #[must_use]
    pub fn hash(&self) -> Hash {
        keccak_encoded(self)
    }

    /// Hash of the header without its seal; this is what the producer signs.
    #[must_use]
    pub fn seal_hash(&self) -> Hash {
        let mut unsealed = self.clone();
        unsealed.sign.clear();
        keccak_encoded(&unsealed)
    }
}

/// A header together with its transactions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    /// Block header.
    pub header: Header,
    /// Transactions in execution order.
    pub transactions: Vec<Transaction>,
}

impl Block {
    /// Assemble a block, filling the transaction root, receipt root and bloom
    /// of `header` from the supplied bodies.
    ///
    /// `merkle_fork` is the fork from which binary-merkle transaction roots
    /// apply; see [`derive_tx_root`].
    #[must_use]
    pub fn new(mut header: Header, transactions: Vec<Transaction>, receipts: &[Receipt], merkle_fork: u64) -> Self {
        header.tx_root = derive_tx_root(&transactions, header.fork_id.cur, merkle_fork);
        header.receipt_root = derive_receipt_root(receipts);
        header.bloom = Bloom::from_receipts(receipts);
        Self {
            header,
            transactions,
        }
    }

    /// Block hash (header hash).
    #[must_use]
    pub fn hash(&self) -> Hash {
        self.header.hash()
    }

    /// Block height.
    #[must_use]
    pub fn number(&self) -> u64 {
        self.header.number
    }

    /// Hash of the parent block.
    #[must_use]
    pub fn parent_hash(&self) -> Hash {
        self.header.parent_hash
    }

    /// Replace the header, keeping the body. Used after sealing.
    #[must_use]
    pub fn with_seal(mut self, header: Header) -> Self {
        self.header = header;
        self
    }

    /// True for a block with no parent.
    #[must_use]
    pub fn is_genesis(&self) -> bool {
        self.header.number == 0 && self.header.parent_hash == EMPTY_HASH
    }
}
