//! # Genesis Module
//!
//! Genesis block creation and chain initialization.
//!
//! The genesis block has height 0, a zero parent hash, no transactions and
//! commits to the state holding the system accounts, the native asset, the
//! configured allocations and the producer accounts.

pub mod builder;

pub use builder::{Genesis, GenesisAlloc, GenesisBuilder, GenesisConfig, GenesisError};
