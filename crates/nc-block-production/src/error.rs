//! Error types for block production.
//!
//! Build attempts fail in three tiers: [`MintError`] for the expected guards
//! of the slot clock, [`WaitError`] for retry-in-slot conditions and the
//! remaining [`WorkerError`] variants for real failures that abort the slot.

use nc_chain::ChainError;
use nc_vm::StateError;
use thiserror::Error;

/// Result type alias for worker operations.
pub type Result<T> = std::result::Result<T, WorkerError>;

/// Expected reasons to skip a slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum MintError {
    /// The whole slot is already behind the local clock.
    #[error("slot {slot} already passed (now {now})")]
    SlotPassed {
        /// Slot timestamp.
        slot: u64,
        /// Local clock.
        now: u64,
    },

    /// The admission deadline of the slot is behind the local clock.
    #[error("deadline {end} of slot passed (now {now})")]
    DeadlinePassed {
        /// Admission deadline.
        end: u64,
        /// Local clock.
        now: u64,
    },

    /// The head is not older than the slot.
    #[error("parent time {parent} not before slot {slot}")]
    ParentNotBefore {
        /// Parent timestamp.
        parent: u64,
        /// Slot timestamp.
        slot: u64,
    },

    /// A new head from another producer cancelled the attempt.
    #[error("build preempted by a new head")]
    Preempted,
}

/// Conditions worth a short sleep and a retry within the same slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum WaitError {
    /// The previous slot's block has not arrived yet.
    #[error("waiting for block of previous slot (head #{number} at {time}, slot {slot})")]
    MissingParent {
        /// Head number.
        number: u64,
        /// Head timestamp.
        time: u64,
        /// Slot timestamp.
        slot: u64,
    },
}

/// Failure of a build attempt.
#[derive(Debug, Error)]
pub enum WorkerError {
    /// Expected skip.
    #[error(transparent)]
    Mint(#[from] MintError),

    /// Retry within the slot.
    #[error(transparent)]
    Wait(#[from] WaitError),

    /// Chain read failure, such as a missing parent state.
    #[error("chain: {0}")]
    Chain(#[from] ChainError),

    /// Consensus engine refused to prepare, finalize or seal.
    #[error("consensus: {0}")]
    Consensus(#[source] ChainError),

    /// State failure while building.
    #[error("state: {0}")]
    State(#[from] StateError),

    /// The sealed block could not be written.
    #[error("write: {0}")]
    Write(#[source] ChainError),
}

impl WorkerError {
    /// Errors that are part of normal operation and logged at debug.
    #[must_use]
    pub fn is_expected(&self) -> bool {
        matches!(self, Self::Mint(_) | Self::Wait(_))
    }
}

/// Miner lifecycle errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MinerError {
    /// `start` while the miner is running or starting.
    #[error("miner already started")]
    AlreadyStarted,

    /// `stop` while the miner is not running.
    #[error("miner not started")]
    NotStarted,

    /// `start` without `force` while the node is syncing.
    #[error("node is syncing")]
    Syncing,

    /// Extra data longer than the header allows.
    #[error("extra data too long: {len} > {max}")]
    ExtraTooLong {
        /// Requested length.
        len: usize,
        /// Maximum length.
        max: usize,
    },

    /// `start` outside a Tokio runtime.
    #[error("no tokio runtime available")]
    NoRuntime,
}
