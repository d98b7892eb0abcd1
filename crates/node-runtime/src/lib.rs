//! # Node Runtime Library
//!
//! Configuration, genesis, in-memory adapters and node wiring. The main entry
//! point is the `main.rs` binary; the library is exposed for tests.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod adapters;
pub mod config;
pub mod container;
pub mod genesis;

pub use config::{ConfigError, NodeConfig};
pub use container::NodeContainer;
