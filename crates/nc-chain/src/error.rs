//! # Error Types
//!
//! One enum per concern: the block gas pool, a single action's transition,
//! block acceptance, and the chain-level wrapper the processor and importer
//! return.

use nc_vm::{StateError, VmError};
use primitive_types::U256;
use shared_types::{short_hex, Hash, Name};
use thiserror::Error;

/// Convenience alias for chain operations.
pub type Result<T> = std::result::Result<T, ChainError>;

// =============================================================================
// GAS POOL
// =============================================================================

/// Block gas pool errors.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum GasPoolError {
    /// `add_gas` would push the pool above `u64::MAX`.
    #[error("gas pool pushed above u64::MAX: {have} + {add}")]
    Overflow { have: u64, add: u64 },

    /// Not enough gas left in the block.
    #[error("gas limit reached: have {have}, want {want}")]
    LimitReached { have: u64, want: u64 },
}

// =============================================================================
// STATE TRANSITION
// =============================================================================

/// Errors applying a single action.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransitionError {
    /// Action nonce is ahead of the account.
    #[error("nonce too high: {name} expects {expected}, got {got}")]
    NonceTooHigh { name: Name, expected: u64, got: u64 },

    /// Action nonce was already used.
    #[error("nonce too low: {name} expects {expected}, got {got}")]
    NonceTooLow { name: Name, expected: u64, got: u64 },

    /// Sender cannot pay `gas_limit * gas_price`.
    #[error("insufficient balance to pay for gas: {name} has {have}, needs {want}")]
    InsufficientBalanceForGas { name: Name, have: U256, want: U256 },

    /// `gas_limit * gas_price` overflows 256 bits.
    #[error("gas cost overflow")]
    GasCostOverflow,

    /// Block gas pool error.
    #[error(transparent)]
    GasPool(#[from] GasPoolError),

    /// Consensus-significant execution error, or a gas arithmetic overflow.
    #[error("vm error: {0}")]
    Vm(VmError),

    /// Unexpected state access error.
    #[error("state error: {0}")]
    State(#[from] StateError),
}

impl From<VmError> for TransitionError {
    fn from(err: VmError) -> Self {
        Self::Vm(err)
    }
}

impl TransitionError {
    /// Nonce already used; the pool can drop the transaction.
    #[must_use]
    pub fn is_nonce_too_low(&self) -> bool {
        matches!(self, Self::NonceTooLow { .. })
    }

    /// Nonce is in the future; later transactions of the sender cannot run.
    #[must_use]
    pub fn is_nonce_too_high(&self) -> bool {
        matches!(self, Self::NonceTooHigh { .. })
    }

    /// Block has no room left for this action.
    #[must_use]
    pub fn is_gas_limit_reached(&self) -> bool {
        matches!(self, Self::GasPool(GasPoolError::LimitReached { .. }))
    }

    /// Execution was cancelled or ran past its deadline.
    #[must_use]
    pub fn is_exec_over_time(&self) -> bool {
        matches!(self, Self::Vm(VmError::ExecOverTime))
    }
}

// =============================================================================
// BLOCK VALIDATION
// =============================================================================

/// Reasons a block is rejected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BlockValidationError {
    /// Block and state are already present.
    KnownBlock { hash: Hash, number: u64 },
    /// Parent header is unknown.
    UnknownAncestor { parent: Hash },
    /// Parent is known but its state is not available.
    PrunedAncestor { parent: Hash },
    /// Extra data longer than allowed.
    ExtraTooLong { len: usize, max: usize },
    /// Timestamp too far ahead of the local clock.
    FutureBlock { time: u64, now: u64 },
    /// Timestamp not after the parent's.
    InvalidTimestamp { time: u64, parent: u64 },
    /// Difficulty differs from the engine's computation.
    InvalidDifficulty { have: U256, want: U256 },
    /// Gas limit above 2^63 - 1.
    GasLimitTooHigh { limit: u64 },
    /// Header gas used above its gas limit.
    GasUsedExceedsLimit { used: u64, limit: u64 },
    /// Gas limit moved too far from the parent's.
    InvalidGasLimit { have: u64, parent: u64 },
    /// Gas limit below the configured minimum.
    GasLimitBelowMinimum { have: u64, min: u64 },
    /// Number is not parent + 1.
    InvalidNumber { have: u64, want: u64 },
    /// Fork-ID rules violated.
    InvalidForkId { reason: String },
    /// Seal verification failed.
    InvalidSeal { reason: String },
    /// Transaction root mismatch.
    TxRootMismatch { have: Hash, want: Hash },
    /// Gas used mismatch after execution.
    GasUsedMismatch { have: u64, want: u64 },
    /// Bloom mismatch after execution.
    BloomMismatch,
    /// Receipt root mismatch after execution.
    ReceiptRootMismatch { have: Hash, want: Hash },
    /// State root mismatch after execution.
    StateRootMismatch { have: Hash, want: Hash },
}

impl BlockValidationError {
    /// Non-fatal: the block is already in the chain.
    #[must_use]
    pub fn is_known_block(&self) -> bool {
        matches!(self, Self::KnownBlock { .. })
    }
}

impl std::fmt::Display for BlockValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::KnownBlock { hash, number } => {
                write!(f, "block already known: #{} {}", number, short_hex(hash))
            }
            Self::UnknownAncestor { parent } => write!(f, "unknown ancestor {}", short_hex(parent)),
            Self::PrunedAncestor { parent } => {
                write!(f, "pruned ancestor {}: state unavailable", short_hex(parent))
            }
            Self::ExtraTooLong { len, max } => {
                write!(f, "extra-data too long: {} > {}", len, max)
            }
            Self::FutureBlock { time, now } => {
                write!(f, "block in the future: time {} is {} ms ahead", time, time.saturating_sub(*now))
            }
            Self::InvalidTimestamp { time, parent } => {
                write!(f, "timestamp {} not after parent {}", time, parent)
            }
            Self::InvalidDifficulty { have, want } => {
                write!(f, "invalid difficulty: have {}, want {}", have, want)
            }
            Self::GasLimitTooHigh { limit } => write!(f, "invalid gas limit: {} > 2^63-1", limit),
            Self::GasUsedExceedsLimit { used, limit } => {
                write!(f, "invalid gas used: {} > limit {}", used, limit)
            }
            Self::InvalidGasLimit { have, parent } => {
                write!(f, "invalid gas limit: have {}, parent {}", have, parent)
            }
            Self::GasLimitBelowMinimum { have, min } => {
                write!(f, "gas limit {} below minimum {}", have, min)
            }
            Self::InvalidNumber { have, want } => {
                write!(f, "invalid block number: have {}, want {}", have, want)
            }
            Self::InvalidForkId { reason } => write!(f, "invalid fork id: {}", reason),
            Self::InvalidSeal { reason } => write!(f, "invalid seal: {}", reason),
            Self::TxRootMismatch { have, want } => write!(
                f,
                "transaction root mismatch: header {}, computed {}",
                short_hex(want),
                short_hex(have)
            ),
            Self::GasUsedMismatch { have, want } => {
                write!(f, "invalid gas used: header {}, computed {}", want, have)
            }
            Self::BloomMismatch => write!(f, "invalid bloom"),
            Self::ReceiptRootMismatch { have, want } => write!(
                f,
                "receipt root mismatch: header {}, computed {}",
                short_hex(want),
                short_hex(have)
            ),
            Self::StateRootMismatch { have, want } => write!(
                f,
                "state root mismatch: header {}, computed {}",
                short_hex(want),
                short_hex(have)
            ),
        }
    }
}

impl std::error::Error for BlockValidationError {}

// =============================================================================
// CHAIN
// =============================================================================

/// Errors from block processing, import and the chain collaborators.
#[derive(Debug, Error)]
pub enum ChainError {
    /// A transaction could not be applied.
    #[error("transaction {index} failed: {source}")]
    Transaction {
        index: usize,
        #[source]
        source: TransitionError,
    },

    /// The block was rejected.
    #[error("invalid block: {0}")]
    Validation(#[from] BlockValidationError),

    /// Gas pool error outside a transaction.
    #[error(transparent)]
    GasPool(#[from] GasPoolError),

    /// State error outside a transaction.
    #[error("state error: {0}")]
    State(#[from] StateError),

    /// No state for the given root.
    #[error("missing state {}", short_hex(.0))]
    MissingState(Hash),

    /// Header not found.
    #[error("missing header #{number} {}", short_hex(.hash))]
    MissingHeader { hash: Hash, number: u64 },

    /// Consensus engine failure.
    #[error("consensus: {0}")]
    Consensus(String),

    /// Persisting the block failed.
    #[error("write failed: {0}")]
    Write(String),
}

impl ChainError {
    /// The transition error, if this wraps one.
    #[must_use]
    pub fn transition(&self) -> Option<&TransitionError> {
        match self {
            Self::Transaction { source, .. } => Some(source),
            _ => None,
        }
    }

    /// Non-fatal: the block is already in the chain.
    #[must_use]
    pub fn is_known_block(&self) -> bool {
        matches!(self, Self::Validation(err) if err.is_known_block())
    }
}
