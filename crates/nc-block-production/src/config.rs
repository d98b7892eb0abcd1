//! Configuration types for block production.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_with::{serde_as, DurationMilliSeconds};
use shared_types::{ChainConfig, Name};

/// Default target gas limit of produced blocks.
pub const DEFAULT_GAS_TARGET: u64 = 30_000_000;

/// Runtime configuration for the miner and its worker.
#[serde_as]
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MinerConfig {
    /// Producer account credited with fees and rewards.
    pub coinbase: Name,

    /// Extra data written into produced headers.
    pub extra: Vec<u8>,

    /// Artificial pause between writing a block and announcing it.
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    pub delay: Duration,

    /// Gas limit the worker moves toward when below it.
    pub gas_floor: u64,

    /// Gas limit the worker moves toward when above it.
    pub gas_ceil: u64,

    /// Sleep between retries while waiting for the previous slot's block.
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    pub mint_retry: Duration,

    /// How long into a slot to wait for the previous slot's block.
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    pub parent_wait: Duration,

    /// Retry budget per slot.
    pub max_mint_retries: u32,

    /// Start mining at boot.
    pub start: bool,
}

impl Default for MinerConfig {
    fn default() -> Self {
        Self {
            coinbase: ChainConfig::default().sys_name,
            extra: Vec::new(),
            delay: Duration::ZERO,
            gas_floor: DEFAULT_GAS_TARGET,
            gas_ceil: DEFAULT_GAS_TARGET,
            mint_retry: Duration::from_millis(100),
            parent_wait: Duration::from_millis(500),
            max_mint_retries: 5,
            start: false,
        }
    }
}

/// Producer settings that may change while the worker runs. Read once at the
/// start of every attempt.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MinerSettings {
    /// Producer account.
    pub coinbase: Name,
    /// Header extra data.
    pub extra: Vec<u8>,
    /// Pause before announcing a mined block.
    pub delay: Duration,
}

impl From<&MinerConfig> for MinerSettings {
    fn from(config: &MinerConfig) -> Self {
        Self {
            coinbase: config.coinbase.clone(),
            extra: config.extra.clone(),
            delay: config.delay,
        }
    }
}
