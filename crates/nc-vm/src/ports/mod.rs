//! # Ports Layer
//!
//! Trait definitions for the state the engine executes against. No concrete
//! implementations live here; see [`crate::adapters`].

pub mod outbound;

pub use outbound::*;
