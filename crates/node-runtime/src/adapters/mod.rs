//! # Adapters
//!
//! In-process implementations of the ports the chain core consumes: the
//! chain store, the transaction pool and the development consensus engine.

pub mod chain;
pub mod consensus;
pub mod tx_pool;

pub use chain::InMemoryChain;
pub use consensus::DevDpos;
pub use tx_pool::{InMemoryTxPool, PoolError, DEFAULT_POOL_CAPACITY};
