//! # Driven Ports (SPI - Outbound)
//!
//! The state the execution engine runs against. Two collaborators are
//! consumed:
//!
//! - [`StateDb`]: contract storage, logs, the refund counter and the journal
//!   (snapshot/revert) that covers every mutation, including the ones made
//!   through [`AccountManager`].
//! - [`AccountManager`]: named accounts, per-asset balances, nonces, code,
//!   gas distribution and system-action dispatch.
//!
//! Both are synchronous: execution is CPU-bound and runs on blocking threads.

use primitive_types::U256;
use shared_types::{Action, AssetId, Hash, Log, Name};

use crate::domain::GasDistribution;
use crate::errors::StateError;

// =============================================================================
// STATE DATABASE
// =============================================================================

/// Versioned contract state with journaling.
pub trait StateDb {
    /// Storage slot of `name`; zero if never written.
    fn get_state(&self, name: &Name, key: &Hash) -> Hash;

    /// Write a storage slot.
    fn set_state(&mut self, name: &Name, key: Hash, value: Hash);

    /// Record a log. The state stamps transaction hash, transaction index and
    /// log index set by [`StateDb::prepare`].
    fn add_log(&mut self, log: Log);

    /// Logs recorded for `tx_hash`.
    fn get_logs(&self, tx_hash: &Hash) -> Vec<Log>;

    /// Select the transaction subsequent logs belong to.
    fn prepare(&mut self, tx_hash: Hash, tx_index: u32);

    /// Increase the SSTORE refund counter.
    fn add_refund(&mut self, gas: u64);

    /// Decrease the SSTORE refund counter.
    fn sub_refund(&mut self, gas: u64);

    /// Current refund counter.
    fn get_refund(&self) -> u64;

    /// Take a restore point.
    fn snapshot(&mut self) -> usize;

    /// Undo every mutation since `id` was taken.
    fn revert_to_snapshot(&mut self, id: usize);

    /// Root committing to the full current state.
    fn intermediate_root(&mut self) -> Hash;
}

// =============================================================================
// ACCOUNT MANAGER
// =============================================================================

/// Named-account and asset bookkeeping.
pub trait AccountManager {
    /// True if the account exists.
    fn account_exists(&self, name: &Name) -> Result<bool, StateError>;

    /// Create an empty account; `founder` receives its contract gas share.
    fn create_account(&mut self, name: &Name, founder: &Name) -> Result<(), StateError>;

    /// Balance of `asset_id` held by `name`.
    fn get_balance(&self, name: &Name, asset_id: AssetId) -> Result<U256, StateError>;

    /// True if `name` holds at least `amount` of `asset_id`.
    fn can_transfer(&self, name: &Name, asset_id: AssetId, amount: U256) -> Result<bool, StateError>;

    /// Move `amount` of `asset_id` from `from` to `to`.
    fn transfer_asset(&mut self, from: &Name, to: &Name, asset_id: AssetId, amount: U256) -> Result<(), StateError>;

    /// Account nonce.
    fn get_nonce(&self, name: &Name) -> Result<u64, StateError>;

    /// Overwrite the account nonce.
    fn set_nonce(&mut self, name: &Name, nonce: u64) -> Result<(), StateError>;

    /// Contract code; empty for plain accounts.
    fn get_code(&self, name: &Name) -> Result<Vec<u8>, StateError>;

    /// Hash of the contract code.
    fn get_code_hash(&self, name: &Name) -> Result<Hash, StateError>;

    /// Install contract code.
    fn set_code(&mut self, name: &Name, code: Vec<u8>) -> Result<(), StateError>;

    /// Pay out the gas held by `from` according to `distribution`, priced at
    /// `gas_price` units of `asset_id`.
    fn distribute_gas(
        &mut self,
        from: &Name,
        distribution: &GasDistribution,
        gas_price: U256,
        asset_id: AssetId,
    ) -> Result<(), StateError>;

    /// Apply a system action (anything other than contract create/call).
    fn exec_tx(&mut self, action: &Action) -> Result<(), StateError>;
}

/// The state an action executes against.
pub trait ExecutionState: StateDb + AccountManager + Send + Sync {
    /// Independent copy; mutations on either side are not shared.
    fn copy(&self) -> Box<dyn ExecutionState>;
}
