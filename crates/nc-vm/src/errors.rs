//! # Error Types
//!
//! Errors raised by the interpreter and by the state it runs against.

use primitive_types::U256;
use shared_types::{ActionType, AssetId, Name, TypeError};
use thiserror::Error;

// =============================================================================
// VM ERRORS
// =============================================================================

/// Errors that can occur during VM execution.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum VmError {
    /// Execution ran out of gas.
    #[error("out of gas")]
    OutOfGas,

    /// Not enough gas left to store the code returned by init code.
    #[error("contract creation code storage out of gas")]
    CodeStoreOutOfGas,

    /// Call/create depth limit reached.
    #[error("max call depth exceeded")]
    Depth,

    /// Caller cannot afford the value transfer.
    #[error("insufficient balance for transfer")]
    InsufficientBalance,

    /// Create target already holds code.
    #[error("contract code collision: {0}")]
    ContractCodeCollision(Name),

    /// Returned contract code is larger than allowed.
    #[error("max code size exceeded: {size} > {max}")]
    MaxCodeSizeExceeded { size: usize, max: usize },

    /// State mutation attempted under a static call.
    #[error("write protection")]
    WriteProtection,

    /// REVERT executed.
    #[error("execution reverted")]
    ExecutionReverted,

    /// Jump to a position that is not a JUMPDEST.
    #[error("invalid jump destination: {0}")]
    InvalidJump(usize),

    /// Unassigned or forbidden opcode.
    #[error("invalid opcode: 0x{0:02X}")]
    InvalidOpcode(u8),

    /// Stack overflow (>1024 items).
    #[error("stack overflow")]
    StackOverflow,

    /// Stack underflow (pop from empty stack).
    #[error("stack underflow")]
    StackUnderflow,

    /// RETURNDATACOPY past the end of the return buffer.
    #[error("return data out of bounds")]
    ReturnDataOutOfBounds,

    /// Gas or memory-size arithmetic overflowed 64 bits.
    #[error("gas uint64 overflow")]
    GasUintOverflow,

    /// Cancellation or deadline hit while executing.
    #[error("execution over time")]
    ExecOverTime,

    /// No thread could be started to run the action. Local resource
    /// exhaustion; the action has no outcome.
    #[error("execution thread unavailable: {0}")]
    ExecutorUnavailable(String),

    /// Call target does not exist.
    #[error("account does not exist: {0}")]
    AccountNotExist(Name),

    /// A stack word does not encode a valid name.
    #[error("invalid name: {0}")]
    InvalidName(#[from] TypeError),

    /// Plugin call named an unknown action type.
    #[error("unknown action type: 0x{0:x}")]
    UnknownActionType(u64),

    /// State access error.
    #[error("state error: {0}")]
    State(StateError),
}

impl VmError {
    /// Revert-class errors roll back state but hand remaining gas back.
    #[must_use]
    pub fn is_revert_class(&self) -> bool {
        matches!(self, Self::ExecutionReverted | Self::CodeStoreOutOfGas)
    }

    /// Returns true if this error consumes all gas of the failing frame.
    #[must_use]
    pub fn consumes_all_gas(&self) -> bool {
        !self.is_revert_class()
    }

    /// Errors that invalidate the enclosing block when raised at top level.
    #[must_use]
    pub fn is_consensus_significant(&self) -> bool {
        matches!(
            self,
            Self::InsufficientBalance | Self::ExecOverTime | Self::ExecutorUnavailable(_)
        )
    }
}

impl From<StateError> for VmError {
    fn from(err: StateError) -> Self {
        match err {
            StateError::InsufficientBalance { .. } => Self::InsufficientBalance,
            other => Self::State(other),
        }
    }
}

// =============================================================================
// STATE ERRORS
// =============================================================================

/// Errors from the account/asset manager and the state database.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StateError {
    /// Account is unknown.
    #[error("account not found: {0}")]
    AccountNotFound(Name),

    /// Account already exists.
    #[error("account already exists: {0}")]
    AccountExists(Name),

    /// Balance too low for the requested debit.
    #[error("insufficient balance: {name} has {have} of asset {asset_id}, needs {want}")]
    InsufficientBalance {
        name: Name,
        asset_id: AssetId,
        have: U256,
        want: U256,
    },

    /// Credit would overflow 256 bits.
    #[error("balance overflow for {0}")]
    BalanceOverflow(Name),

    /// Asset is unknown.
    #[error("unknown asset: {0}")]
    UnknownAsset(AssetId),

    /// Asset already registered.
    #[error("asset already exists: {0}")]
    AssetExists(AssetId),

    /// Caller does not own the asset.
    #[error("{name} is not the owner of asset {asset_id}")]
    NotAssetOwner { name: Name, asset_id: AssetId },

    /// System action not handled by this manager.
    #[error("unsupported action: {0:?}")]
    UnsupportedAction(ActionType),

    /// System action arguments could not be decoded.
    #[error("invalid payload: {0}")]
    InvalidPayload(String),

    /// Snapshot id does not exist.
    #[error("invalid snapshot: {0}")]
    InvalidSnapshot(usize),
}
