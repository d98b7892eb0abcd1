//! # Genesis Block Builder
//!
//! Creates the genesis block and its state: system accounts, the native
//! asset, configured allocations and the producer accounts.

use nc_block_production::DEFAULT_GAS_TARGET;
use nc_chain::now_ms;
use nc_vm::adapters::MemoryState;
use nc_vm::{AccountManager, StateDb, StateError};
use primitive_types::U256;
use serde::{Deserialize, Serialize};
use shared_types::{Block, Bloom, ChainConfig, ForkId, Header, Name, EMPTY_HASH};
use thiserror::Error;

/// Genesis block creation errors.
#[derive(Debug, Error)]
pub enum GenesisError {
    /// Invalid genesis configuration.
    #[error("invalid genesis configuration: {0}")]
    InvalidConfig(String),

    /// State initialization failed.
    #[error("failed to initialize genesis state: {0}")]
    StateInitFailed(#[from] StateError),
}

/// Initial balance of one account in the native asset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenesisAlloc {
    /// Account name.
    pub name: Name,
    /// Native-asset balance.
    pub balance: U256,
}

/// Genesis block configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenesisConfig {
    /// Genesis timestamp (unix ms). If None, uses current time.
    pub timestamp: Option<u64>,

    /// Gas limit of the genesis header.
    pub gas_limit: u64,

    /// Symbol of the native asset.
    pub asset_symbol: String,

    /// Initial balances.
    pub alloc: Vec<GenesisAlloc>,

    /// Producer schedule of the development engine, in slot order.
    pub producers: Vec<Name>,

    /// Extra data (max 32 bytes).
    pub extra_data: Vec<u8>,
}

impl Default for GenesisConfig {
    fn default() -> Self {
        let sys = ChainConfig::default().sys_name;
        Self {
            timestamp: None,
            gas_limit: DEFAULT_GAS_TARGET,
            asset_symbol: "nc".to_string(),
            alloc: Vec::new(),
            producers: vec![sys],
            extra_data: b"NameChain Genesis".to_vec(),
        }
    }
}

impl GenesisConfig {
    /// Validate against the chain parameters.
    pub fn validate(&self, chain: &ChainConfig) -> Result<(), GenesisError> {
        if self.producers.is_empty() {
            return Err(GenesisError::InvalidConfig("no producers".to_string()));
        }
        if self.extra_data.len() > chain.max_extra_size {
            return Err(GenesisError::InvalidConfig(format!(
                "extra data exceeds {} bytes",
                chain.max_extra_size
            )));
        }
        if self.gas_limit < chain.min_gas_limit {
            return Err(GenesisError::InvalidConfig(format!(
                "gas limit {} below minimum {}",
                self.gas_limit, chain.min_gas_limit
            )));
        }
        Ok(())
    }
}

/// Genesis block together with its post state.
#[derive(Debug, Clone)]
pub struct Genesis {
    /// Block zero.
    pub block: Block,
    /// State the block commits to.
    pub state: MemoryState,
}

/// Builder for creating genesis blocks.
pub struct GenesisBuilder<'a> {
    chain: &'a ChainConfig,
    config: GenesisConfig,
}

impl<'a> GenesisBuilder<'a> {
    /// Create a new genesis builder for `chain`.
    pub fn new(chain: &'a ChainConfig, config: GenesisConfig) -> Self {
        Self { chain, config }
    }

    /// Build the genesis block and state.
    pub fn build(self) -> Result<Genesis, GenesisError> {
        let chain = self.chain;
        self.config.validate(chain)?;

        let mut state = MemoryState::new();
        state.create_account(&chain.sys_name, &chain.sys_name)?;
        for account in [&chain.fee_name, &chain.reward_name] {
            if !state.account_exists(account)? {
                state.create_account(account, &chain.sys_name)?;
            }
        }
        state.register_asset(chain.sys_asset_id, &self.config.asset_symbol, &chain.sys_name)?;

        let accounts = self
            .config
            .producers
            .iter()
            .chain(self.config.alloc.iter().map(|alloc| &alloc.name));
        for name in accounts {
            if !state.account_exists(name)? {
                state.create_account(name, &chain.sys_name)?;
            }
        }
        for alloc in &self.config.alloc {
            state.add_balance(&alloc.name, chain.sys_asset_id, alloc.balance)?;
        }

        let header = Header {
            parent_hash: EMPTY_HASH,
            coinbase: chain.sys_name.clone(),
            proposed_irreversible: 0,
            tx_root: EMPTY_HASH,
            receipt_root: EMPTY_HASH,
            state_root: state.intermediate_root(),
            bloom: Bloom::default(),
            difficulty: U256::one(),
            number: 0,
            gas_limit: self.config.gas_limit,
            gas_used: 0,
            time: self.config.timestamp.unwrap_or_else(now_ms),
            extra: self.config.extra_data.clone(),
            fork_id: ForkId {
                cur: chain.fork_id,
                next: chain.fork_id,
            },
            sign: Vec::new(),
        };
        let block = Block::new(header, Vec::new(), &[], chain.merkle_tx_root_fork);
        Ok(Genesis { block, state })
    }
}
