//! # Ports Layer
//!
//! Interfaces to the chain store, the consensus engine and block access for
//! the oracle.

pub mod outbound;

pub use outbound::*;
