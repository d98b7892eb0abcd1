//! # Node Configuration
//!
//! Unified configuration for the chain, the miner, the gas-price oracle and
//! genesis.
//!
//! ## Sources (later wins)
//!
//! 1. Built-in defaults
//! 2. JSON file named by `NC_CONFIG`
//! 3. Environment: `NC_COINBASE`, `NC_MINE`, `NC_BLOCK_INTERVAL_MS`, `NC_LOG`

use std::path::PathBuf;

use nc_block_production::MinerConfig;
use nc_chain::OracleConfig;
use serde::{Deserialize, Serialize};
use shared_types::{ChainConfig, Name, TypeError};
use thiserror::Error;

use crate::genesis::GenesisConfig;

/// Environment variable naming the JSON configuration file.
pub const CONFIG_ENV: &str = "NC_CONFIG";

/// Default slot width.
pub const DEFAULT_BLOCK_INTERVAL_MS: u64 = 3_000;

/// Complete node configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    /// Consensus parameters.
    pub chain: ChainConfig,
    /// Block production.
    pub miner: MinerConfig,
    /// Gas-price oracle.
    pub oracle: OracleConfig,
    /// Genesis allocations and producer schedule.
    pub genesis: GenesisConfig,
    /// Slot width of the development engine.
    pub block_interval_ms: u64,
    /// Default log filter when `RUST_LOG` is unset.
    pub log_level: String,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            chain: ChainConfig::default(),
            miner: MinerConfig::default(),
            oracle: OracleConfig::default(),
            genesis: GenesisConfig::default(),
            block_interval_ms: DEFAULT_BLOCK_INTERVAL_MS,
            log_level: "info".to_string(),
        }
    }
}

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("failed to read {path}: {source}")]
    Read {
        /// File path.
        path: PathBuf,
        /// I/O failure.
        #[source]
        source: std::io::Error,
    },

    /// The configuration file is not valid JSON for [`NodeConfig`].
    #[error("failed to parse configuration: {0}")]
    Parse(#[from] serde_json::Error),

    /// An environment override names an invalid account.
    #[error("{var}: {source}")]
    InvalidName {
        /// Variable name.
        var: &'static str,
        /// Validation failure.
        #[source]
        source: TypeError,
    },

    /// An environment override could not be parsed.
    #[error("{var}: invalid value {value:?}")]
    InvalidValue {
        /// Variable name.
        var: &'static str,
        /// Raw value.
        value: String,
    },

    /// The slot width is zero.
    #[error("block interval must be greater than zero")]
    ZeroInterval,

    /// The gas floor exceeds the gas ceiling.
    #[error("gas floor {floor} above gas ceiling {ceil}")]
    GasBounds {
        /// Configured floor.
        floor: u64,
        /// Configured ceiling.
        ceil: u64,
    },

    /// Miner extra data does not fit in a header.
    #[error("miner extra data too long: {len} > {max}")]
    ExtraTooLong {
        /// Configured length.
        len: usize,
        /// Maximum length.
        max: usize,
    },
}

impl NodeConfig {
    /// Load from `NC_CONFIG` (or defaults), apply environment overrides and
    /// validate.
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = match std::env::var_os(CONFIG_ENV) {
            Some(path) => Self::from_file(PathBuf::from(path))?,
            None => Self::default(),
        };
        config.apply_env(|var| std::env::var(var).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Parse a JSON configuration file.
    pub fn from_file(path: PathBuf) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(&path).map_err(|source| ConfigError::Read { path, source })?;
        Ok(serde_json::from_str(&raw)?)
    }

    /// Apply environment overrides read through `lookup`.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<(), ConfigError> {
        if let Some(value) = lookup("NC_COINBASE") {
            self.miner.coinbase =
                Name::new(value).map_err(|source| ConfigError::InvalidName { var: "NC_COINBASE", source })?;
        }
        if let Some(value) = lookup("NC_MINE") {
            self.miner.start = match value.to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" => true,
                "0" | "false" | "no" => false,
                _ => return Err(ConfigError::InvalidValue { var: "NC_MINE", value }),
            };
        }
        if let Some(value) = lookup("NC_BLOCK_INTERVAL_MS") {
            self.block_interval_ms = value.parse().map_err(|_| ConfigError::InvalidValue {
                var: "NC_BLOCK_INTERVAL_MS",
                value,
            })?;
        }
        if let Some(value) = lookup("NC_LOG") {
            self.log_level = value;
        }
        Ok(())
    }

    /// Reject configurations the node cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.block_interval_ms == 0 {
            return Err(ConfigError::ZeroInterval);
        }
        if self.miner.gas_floor > self.miner.gas_ceil {
            return Err(ConfigError::GasBounds {
                floor: self.miner.gas_floor,
                ceil: self.miner.gas_ceil,
            });
        }
        if self.miner.extra.len() > self.chain.max_extra_size {
            return Err(ConfigError::ExtraTooLong {
                len: self.miner.extra.len(),
                max: self.chain.max_extra_size,
            });
        }
        Ok(())
    }
}
