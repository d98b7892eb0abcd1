//! Integration scenarios.

pub mod block_exchange;
pub mod deadlines;
pub mod miner;
pub mod transitions;
