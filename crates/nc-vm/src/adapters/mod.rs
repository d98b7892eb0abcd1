//! # Adapters Layer
//!
//! Concrete implementations of the state ports.

pub mod memory_state;

pub use memory_state::{AccountRecord, AssetRecord, MemoryState};
