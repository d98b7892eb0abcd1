//! Execution-engine domain types.

pub mod config;
pub mod context;
pub mod distribution;
pub mod interrupt;

pub use config::VmConfig;
pub use context::{BlockContext, TxContext, BLOCKHASH_WINDOW};
pub use distribution::GasDistribution;
pub use interrupt::{Interrupt, POLL_INTERVAL};
