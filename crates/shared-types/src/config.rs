//! # Chain Configuration
//!
//! Consensus parameters shared by every node on a chain. Loaded from JSON by
//! the node runtime; every field has a default.

use primitive_types::U256;
use serde::{Deserialize, Serialize};

use crate::primitives::{AssetId, Name};

/// Intrinsic gas schedule charged before any execution.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IntrinsicGasConfig {
    /// Base cost of a transfer or system action.
    pub action_gas: u64,
    /// Base cost of a contract call.
    pub action_gas_call_contract: u64,
    /// Base cost of a contract creation.
    pub action_gas_create: u64,
    /// Cost per zero payload byte.
    pub tx_data_zero_gas: u64,
    /// Cost per non-zero payload byte.
    pub tx_data_non_zero_gas: u64,
}

impl Default for IntrinsicGasConfig {
    fn default() -> Self {
        Self {
            action_gas: 21_000,
            action_gas_call_contract: 21_000,
            action_gas_create: 53_000,
            tx_data_zero_gas: 4,
            tx_data_non_zero_gas: 68,
        }
    }
}

/// Chain-wide consensus configuration.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChainConfig {
    /// Human-readable chain name.
    pub chain_name: String,
    /// Numeric chain identifier.
    pub chain_id: u64,
    /// System account.
    pub sys_name: Name,
    /// Account collecting purchased gas before distribution.
    pub fee_name: Name,
    /// Account funding block rewards.
    pub reward_name: Name,
    /// Native asset.
    pub sys_asset_id: AssetId,
    /// Reward paid to the producer per block, in the native asset.
    pub block_reward: U256,
    /// First fork using binary-merkle transaction roots.
    pub merkle_tx_root_fork: u64,
    /// Highest fork this node supports.
    pub fork_id: u64,
    /// Divisor bounding gas-limit movement per block.
    pub gas_limit_bound_divisor: u64,
    /// Lowest acceptable block gas limit.
    pub min_gas_limit: u64,
    /// Maximum header extra-data size in bytes.
    pub max_extra_size: usize,
    /// How far a header may be ahead of the local clock.
    pub allowed_future_block_time_ms: u64,
    /// Intrinsic gas schedule.
    pub intrinsic: IntrinsicGasConfig,
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            chain_name: "namechain".to_string(),
            chain_id: 1,
            sys_name: Name(String::from("sys")),
            fee_name: Name(String::from("sys.fee")),
            reward_name: Name(String::from("sys.reward")),
            sys_asset_id: 0,
            block_reward: U256::zero(),
            merkle_tx_root_fork: 1,
            fork_id: 1,
            gas_limit_bound_divisor: 1024,
            min_gas_limit: 5_000,
            max_extra_size: 32,
            allowed_future_block_time_ms: 15_000,
            intrinsic: IntrinsicGasConfig::default(),
        }
    }
}
