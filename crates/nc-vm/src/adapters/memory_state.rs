//! # Memory State
//!
//! Journaled in-memory implementation of [`ExecutionState`], used by the
//! development node and by tests.
//!
//! Every mutation appends the prior value to a journal; a snapshot is a
//! journal length and reverting replays the journal backwards.
//! [`StateDb::intermediate_root`] commits: it clears the journal, so
//! snapshots taken before it can no longer be reverted.

use std::collections::BTreeMap;

use primitive_types::U256;
use serde::Serialize;
use shared_types::{empty_code_hash, keccak256, keccak_encoded, Action, ActionType, AssetId, DistributeKey, Hash, Log, Name, EMPTY_HASH};
use tracing::{debug, warn};

use crate::domain::GasDistribution;
use crate::errors::StateError;
use crate::ports::{AccountManager, ExecutionState, StateDb};

/// A named account.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct AccountRecord {
    /// Receives the gas attributed to this account's code.
    pub founder: Name,
    /// Next expected action nonce.
    pub nonce: u64,
    /// Balance per asset.
    pub balances: BTreeMap<AssetId, U256>,
    /// Contract code; empty for plain accounts.
    pub code: Vec<u8>,
    /// Hash of `code`.
    pub code_hash: Hash,
}

impl AccountRecord {
    fn new(founder: Name) -> Self {
        Self {
            founder,
            nonce: 0,
            balances: BTreeMap::new(),
            code: Vec::new(),
            code_hash: empty_code_hash(),
        }
    }

    fn balance(&self, asset_id: AssetId) -> U256 {
        self.balances.get(&asset_id).copied().unwrap_or_default()
    }
}

/// A registered asset.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct AssetRecord {
    /// Symbol given at issuance.
    pub symbol: String,
    /// Issuer; receives plugin-call gas attributed to the asset.
    pub founder: Name,
    /// Account allowed to mint more and to hand ownership over.
    pub owner: Name,
    /// Circulating supply.
    pub supply: U256,
}

#[derive(Clone, Debug)]
enum Change {
    Account { name: Name, prev: Option<AccountRecord> },
    Asset { id: AssetId, prev: Option<AssetRecord> },
    Storage { name: Name, key: Hash, prev: Option<Hash> },
    Refund(u64),
    Log { tx_hash: Hash },
}

/// In-memory account, asset and contract-storage state.
#[derive(Clone, Debug, Default)]
pub struct MemoryState {
    accounts: BTreeMap<Name, AccountRecord>,
    assets: BTreeMap<AssetId, AssetRecord>,
    storage: BTreeMap<(Name, Hash), Hash>,
    logs: BTreeMap<Hash, Vec<Log>>,
    refund: u64,
    tx_hash: Hash,
    tx_index: u32,
    log_size: u32,
    journal: Vec<Change>,
    revisions: Vec<(usize, usize)>,
    next_revision: usize,
}

impl MemoryState {
    /// Empty state.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an asset directly, outside any action. Used for genesis.
    pub fn register_asset(&mut self, id: AssetId, symbol: &str, founder: &Name) -> Result<(), StateError> {
        if self.assets.contains_key(&id) {
            return Err(StateError::AssetExists(id));
        }
        self.put_asset(
            id,
            AssetRecord {
                symbol: symbol.to_string(),
                founder: founder.clone(),
                owner: founder.clone(),
                supply: U256::zero(),
            },
        );
        Ok(())
    }

    /// Credit `amount` of `asset_id` to `name`, growing the supply of a
    /// registered asset.
    pub fn add_balance(&mut self, name: &Name, asset_id: AssetId, amount: U256) -> Result<(), StateError> {
        let mut account = self.account(name)?.clone();
        let balance = account
            .balance(asset_id)
            .checked_add(amount)
            .ok_or_else(|| StateError::BalanceOverflow(name.clone()))?;
        account.balances.insert(asset_id, balance);
        if let Some(asset) = self.assets.get(&asset_id) {
            let mut asset = asset.clone();
            asset.supply = asset.supply.saturating_add(amount);
            self.put_asset(asset_id, asset);
        }
        self.put_account(name, account);
        Ok(())
    }

    /// Founder of an account.
    #[must_use]
    pub fn founder(&self, name: &Name) -> Option<&Name> {
        self.accounts.get(name).map(|a| &a.founder)
    }

    /// Asset metadata.
    #[must_use]
    pub fn asset(&self, id: AssetId) -> Option<&AssetRecord> {
        self.assets.get(&id)
    }

    /// Number of accounts.
    #[must_use]
    pub fn account_count(&self) -> usize {
        self.accounts.len()
    }

    // =========================================================================
    // JOURNALED WRITES
    // =========================================================================

    fn account(&self, name: &Name) -> Result<&AccountRecord, StateError> {
        self.accounts
            .get(name)
            .ok_or_else(|| StateError::AccountNotFound(name.clone()))
    }

    fn put_account(&mut self, name: &Name, record: AccountRecord) {
        let prev = self.accounts.insert(name.clone(), record);
        self.journal.push(Change::Account {
            name: name.clone(),
            prev,
        });
    }

    fn put_asset(&mut self, id: AssetId, record: AssetRecord) {
        let prev = self.assets.insert(id, record);
        self.journal.push(Change::Asset { id, prev });
    }

    fn sub_balance(&mut self, name: &Name, asset_id: AssetId, amount: U256) -> Result<(), StateError> {
        let mut account = self.account(name)?.clone();
        let have = account.balance(asset_id);
        if have < amount {
            return Err(StateError::InsufficientBalance {
                name: name.clone(),
                asset_id,
                have,
                want: amount,
            });
        }
        account.balances.insert(asset_id, have - amount);
        self.put_account(name, account);
        Ok(())
    }

    fn credit(&mut self, name: &Name, asset_id: AssetId, amount: U256) -> Result<(), StateError> {
        let mut account = self.account(name)?.clone();
        let balance = account
            .balance(asset_id)
            .checked_add(amount)
            .ok_or_else(|| StateError::BalanceOverflow(name.clone()))?;
        account.balances.insert(asset_id, balance);
        self.put_account(name, account);
        Ok(())
    }

    fn owned_asset(&self, from: &Name, id: AssetId) -> Result<AssetRecord, StateError> {
        let asset = self.assets.get(&id).ok_or(StateError::UnknownAsset(id))?;
        if &asset.owner != from {
            return Err(StateError::NotAssetOwner {
                name: from.clone(),
                asset_id: id,
            });
        }
        Ok(asset.clone())
    }

    fn undo(&mut self, change: Change) {
        match change {
            Change::Account { name, prev } => match prev {
                Some(record) => {
                    self.accounts.insert(name, record);
                }
                None => {
                    self.accounts.remove(&name);
                }
            },
            Change::Asset { id, prev } => match prev {
                Some(record) => {
                    self.assets.insert(id, record);
                }
                None => {
                    self.assets.remove(&id);
                }
            },
            Change::Storage { name, key, prev } => match prev {
                Some(value) => {
                    self.storage.insert((name, key), value);
                }
                None => {
                    self.storage.remove(&(name, key));
                }
            },
            Change::Refund(prev) => self.refund = prev,
            Change::Log { tx_hash } => {
                if let Some(logs) = self.logs.get_mut(&tx_hash) {
                    logs.pop();
                    if logs.is_empty() {
                        self.logs.remove(&tx_hash);
                    }
                }
                self.log_size = self.log_size.saturating_sub(1);
            }
        }
    }
}

// =============================================================================
// STATE DATABASE
// =============================================================================

impl StateDb for MemoryState {
    fn get_state(&self, name: &Name, key: &Hash) -> Hash {
        self.storage
            .get(&(name.clone(), *key))
            .copied()
            .unwrap_or(EMPTY_HASH)
    }

    fn set_state(&mut self, name: &Name, key: Hash, value: Hash) {
        let slot = (name.clone(), key);
        let prev = if value == EMPTY_HASH {
            self.storage.remove(&slot)
        } else {
            self.storage.insert(slot, value)
        };
        self.journal.push(Change::Storage {
            name: name.clone(),
            key,
            prev,
        });
    }

    fn add_log(&mut self, mut log: Log) {
        log.tx_hash = self.tx_hash;
        log.tx_index = self.tx_index;
        log.index = self.log_size;
        self.logs.entry(self.tx_hash).or_default().push(log);
        self.log_size += 1;
        self.journal.push(Change::Log {
            tx_hash: self.tx_hash,
        });
    }

    fn get_logs(&self, tx_hash: &Hash) -> Vec<Log> {
        self.logs.get(tx_hash).cloned().unwrap_or_default()
    }

    fn prepare(&mut self, tx_hash: Hash, tx_index: u32) {
        self.tx_hash = tx_hash;
        self.tx_index = tx_index;
    }

    fn add_refund(&mut self, gas: u64) {
        self.journal.push(Change::Refund(self.refund));
        self.refund = self.refund.saturating_add(gas);
    }

    fn sub_refund(&mut self, gas: u64) {
        self.journal.push(Change::Refund(self.refund));
        self.refund = self.refund.saturating_sub(gas);
    }

    fn get_refund(&self) -> u64 {
        self.refund
    }

    fn snapshot(&mut self) -> usize {
        let id = self.next_revision;
        self.next_revision += 1;
        self.revisions.push((id, self.journal.len()));
        id
    }

    fn revert_to_snapshot(&mut self, id: usize) {
        let Some(pos) = self.revisions.iter().position(|(rev, _)| *rev == id) else {
            warn!(snapshot = id, "revert to unknown snapshot ignored");
            return;
        };
        let (_, len) = self.revisions[pos];
        while self.journal.len() > len {
            if let Some(change) = self.journal.pop() {
                self.undo(change);
            }
        }
        self.revisions.truncate(pos);
    }

    fn intermediate_root(&mut self) -> Hash {
        self.journal.clear();
        self.revisions.clear();
        self.refund = 0;
        keccak_encoded(&(&self.accounts, &self.assets, &self.storage))
    }
}

// =============================================================================
// ACCOUNT MANAGER
// =============================================================================

impl AccountManager for MemoryState {
    fn account_exists(&self, name: &Name) -> Result<bool, StateError> {
        Ok(self.accounts.contains_key(name))
    }

    fn create_account(&mut self, name: &Name, founder: &Name) -> Result<(), StateError> {
        if self.accounts.contains_key(name) {
            return Err(StateError::AccountExists(name.clone()));
        }
        self.put_account(name, AccountRecord::new(founder.clone()));
        Ok(())
    }

    fn get_balance(&self, name: &Name, asset_id: AssetId) -> Result<U256, StateError> {
        Ok(self.account(name)?.balance(asset_id))
    }

    fn can_transfer(&self, name: &Name, asset_id: AssetId, amount: U256) -> Result<bool, StateError> {
        Ok(self.get_balance(name, asset_id)? >= amount)
    }

    fn transfer_asset(&mut self, from: &Name, to: &Name, asset_id: AssetId, amount: U256) -> Result<(), StateError> {
        self.account(to)?;
        if amount.is_zero() {
            return Ok(());
        }
        self.sub_balance(from, asset_id, amount)?;
        self.credit(to, asset_id, amount)
    }

    fn get_nonce(&self, name: &Name) -> Result<u64, StateError> {
        Ok(self.account(name)?.nonce)
    }

    fn set_nonce(&mut self, name: &Name, nonce: u64) -> Result<(), StateError> {
        let mut account = self.account(name)?.clone();
        account.nonce = nonce;
        self.put_account(name, account);
        Ok(())
    }

    fn get_code(&self, name: &Name) -> Result<Vec<u8>, StateError> {
        Ok(self.account(name)?.code.clone())
    }

    fn get_code_hash(&self, name: &Name) -> Result<Hash, StateError> {
        Ok(self.account(name)?.code_hash)
    }

    fn set_code(&mut self, name: &Name, code: Vec<u8>) -> Result<(), StateError> {
        let mut account = self.account(name)?.clone();
        account.code_hash = if code.is_empty() {
            empty_code_hash()
        } else {
            keccak256(&code)
        };
        account.code = code;
        self.put_account(name, account);
        Ok(())
    }

    fn distribute_gas(
        &mut self,
        from: &Name,
        distribution: &GasDistribution,
        gas_price: U256,
        asset_id: AssetId,
    ) -> Result<(), StateError> {
        for (key, gas) in distribution.iter() {
            if *gas <= 0 {
                continue;
            }
            let recipient = match key {
                DistributeKey::Coinbase(name) => Some(name.clone()),
                DistributeKey::Contract(name) => self.founder(name).cloned(),
                DistributeKey::Asset(id) => self.assets.get(id).map(|a| a.founder.clone()),
            };
            let Some(recipient) = recipient else {
                debug!(?key, gas, "no recipient for gas share, kept by fee account");
                continue;
            };
            let amount = gas_price
                .checked_mul(U256::from(*gas as u64))
                .ok_or_else(|| StateError::BalanceOverflow(recipient.clone()))?;
            self.transfer_asset(from, &recipient, asset_id, amount)?;
        }
        Ok(())
    }

    fn exec_tx(&mut self, action: &Action) -> Result<(), StateError> {
        let (from, to, id, amount) = (&action.from, &action.to, action.asset_id, action.amount);
        match action.action_type {
            ActionType::Transfer => self.transfer_asset(from, to, id, amount),
            ActionType::CreateAccount => {
                self.account(from)?;
                self.create_account(to, from)?;
                self.transfer_asset(from, to, id, amount)
            }
            ActionType::UpdateAccount => {
                let founder = std::str::from_utf8(&action.payload)
                    .map_err(|e| StateError::InvalidPayload(e.to_string()))
                    .and_then(|s| Name::new(s).map_err(|e| StateError::InvalidPayload(e.to_string())))?;
                self.account(&founder)?;
                let mut account = self.account(from)?.clone();
                account.founder = founder;
                self.put_account(from, account);
                Ok(())
            }
            ActionType::IssueAsset => {
                let symbol = String::from_utf8(action.payload.clone())
                    .map_err(|e| StateError::InvalidPayload(e.to_string()))?;
                self.register_asset(id, &symbol, from)?;
                let mut asset = self.assets.get(&id).cloned().ok_or(StateError::UnknownAsset(id))?;
                asset.owner = to.clone();
                self.put_asset(id, asset);
                self.add_balance(to, id, amount)
            }
            ActionType::IncreaseAsset => {
                self.owned_asset(from, id)?;
                self.add_balance(to, id, amount)
            }
            ActionType::DestroyAsset => {
                let mut asset = self.assets.get(&id).cloned().ok_or(StateError::UnknownAsset(id))?;
                self.sub_balance(from, id, amount)?;
                asset.supply = asset.supply.saturating_sub(amount);
                self.put_asset(id, asset);
                Ok(())
            }
            ActionType::SetAssetOwner => {
                let mut asset = self.owned_asset(from, id)?;
                self.account(to)?;
                asset.owner = to.clone();
                self.put_asset(id, asset);
                Ok(())
            }
            other => Err(StateError::UnsupportedAction(other)),
        }
    }
}

impl ExecutionState for MemoryState {
    fn copy(&self) -> Box<dyn ExecutionState> {
        let mut copy = self.clone();
        copy.journal.clear();
        copy.revisions.clear();
        Box::new(copy)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn name(s: &str) -> Name {
        Name::new(s).unwrap()
    }

    fn funded() -> MemoryState {
        let mut state = MemoryState::new();
        state.create_account(&name("alice"), &name("alice")).unwrap();
        state.create_account(&name("bob"), &name("bob")).unwrap();
        state.register_asset(1, "ncc", &name("alice")).unwrap();
        state.add_balance(&name("alice"), 1, U256::from(100)).unwrap();
        state
    }

    #[test]
    fn test_snapshot_reverts_everything() {
        let mut state = funded();
        let root = state.clone().intermediate_root();
        let snap = state.snapshot();
        state.transfer_asset(&name("alice"), &name("bob"), 1, U256::from(40)).unwrap();
        state.set_state(&name("bob"), [1u8; 32], [2u8; 32]);
        state.create_account(&name("carol"), &name("alice")).unwrap();
        state.add_refund(10);
        state.add_log(Log::new(name("bob"), vec![], vec![1]));
        state.revert_to_snapshot(snap);

        assert_eq!(state.get_balance(&name("bob"), 1).unwrap(), U256::zero());
        assert!(!state.account_exists(&name("carol")).unwrap());
        assert_eq!(state.get_refund(), 0);
        assert!(state.get_logs(&EMPTY_HASH).is_empty());
        assert_eq!(state.intermediate_root(), root);
    }

    #[test]
    fn test_nested_snapshots() {
        let mut state = funded();
        let outer = state.snapshot();
        state.transfer_asset(&name("alice"), &name("bob"), 1, U256::from(10)).unwrap();
        let inner = state.snapshot();
        state.transfer_asset(&name("alice"), &name("bob"), 1, U256::from(10)).unwrap();
        state.revert_to_snapshot(inner);
        assert_eq!(state.get_balance(&name("bob"), 1).unwrap(), U256::from(10));
        state.revert_to_snapshot(outer);
        assert_eq!(state.get_balance(&name("bob"), 1).unwrap(), U256::zero());
    }

    #[test]
    fn test_transfer_insufficient() {
        let mut state = funded();
        let err = state
            .transfer_asset(&name("bob"), &name("alice"), 1, U256::from(1))
            .unwrap_err();
        assert!(matches!(err, StateError::InsufficientBalance { .. }));
    }

    #[test]
    fn test_log_indices() {
        let mut state = funded();
        state.prepare([7u8; 32], 3);
        state.add_log(Log::new(name("bob"), vec![], vec![]));
        state.add_log(Log::new(name("bob"), vec![], vec![]));
        let logs = state.get_logs(&[7u8; 32]);
        assert_eq!(logs.len(), 2);
        assert_eq!((logs[1].tx_index, logs[1].index), (3, 1));
    }

    #[test]
    fn test_distribute_gas_pays_founders() {
        let mut state = funded();
        state.create_account(&name("sys.fee"), &name("sys.fee")).unwrap();
        state.create_account(&name("token"), &name("bob")).unwrap();
        state.add_balance(&name("sys.fee"), 1, U256::from(1_000)).unwrap();

        let mut dist = GasDistribution::new();
        dist.credit(DistributeKey::Coinbase(name("alice")), 21);
        dist.credit(DistributeKey::Contract(name("token")), 5);
        dist.credit(DistributeKey::Asset(1), 2);
        state
            .distribute_gas(&name("sys.fee"), &dist, U256::from(10), 1)
            .unwrap();

        assert_eq!(state.get_balance(&name("alice"), 1).unwrap(), U256::from(100 + 210 + 20));
        assert_eq!(state.get_balance(&name("bob"), 1).unwrap(), U256::from(50));
        assert_eq!(state.get_balance(&name("sys.fee"), 1).unwrap(), U256::from(1_000 - 280));
    }

    #[test]
    fn test_asset_actions() {
        let mut state = funded();
        let issue = Action {
            action_type: ActionType::IssueAsset,
            nonce: 0,
            asset_id: 2,
            from: name("alice"),
            to: name("bob"),
            gas_limit: 0,
            amount: U256::from(500),
            payload: b"gold".to_vec(),
        };
        state.exec_tx(&issue).unwrap();
        assert_eq!(state.asset(2).unwrap().owner, name("bob"));
        assert_eq!(state.get_balance(&name("bob"), 2).unwrap(), U256::from(500));

        let mut increase = issue.clone();
        increase.action_type = ActionType::IncreaseAsset;
        assert!(matches!(state.exec_tx(&increase), Err(StateError::NotAssetOwner { .. })));

        let mut destroy = issue;
        destroy.action_type = ActionType::DestroyAsset;
        destroy.from = name("bob");
        destroy.amount = U256::from(200);
        state.exec_tx(&destroy).unwrap();
        assert_eq!(state.asset(2).unwrap().supply, U256::from(300));
    }

    #[test]
    fn test_copy_is_independent() {
        let mut state = funded();
        let mut copy = state.copy();
        copy.transfer_asset(&name("alice"), &name("bob"), 1, U256::from(1)).unwrap();
        assert_eq!(state.get_balance(&name("bob"), 1).unwrap(), U256::zero());
        assert_ne!(copy.intermediate_root(), state.intermediate_root());
    }
}
