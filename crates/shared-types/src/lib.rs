//! # Shared Types Crate
//!
//! Domain entities shared by every NameChain crate.
//!
//! ## Clusters
//!
//! - **Primitives**: [`Name`], [`Hash`], [`AssetId`], Keccak-256 helpers
//! - **Chain**: [`Header`], [`Block`], [`Transaction`], [`Action`], [`ForkId`]
//! - **Results**: [`Receipt`], [`ActionResult`], [`Log`], [`Bloom`]
//! - **Roots**: fork-dependent transaction roots and receipt roots
//! - **Configuration**: [`ChainConfig`], [`IntrinsicGasConfig`]
//!
//! Every type is serde-serializable. The canonical byte encoding used for
//! hashing is `bincode`, hashed with Keccak-256.

#![warn(missing_docs)]

pub mod config;
pub mod entities;
pub mod errors;
pub mod merkle;
pub mod primitives;
pub mod receipt;

pub use config::{ChainConfig, IntrinsicGasConfig};
pub use entities::*;
pub use errors::TypeError;
pub use merkle::{derive_receipt_root, derive_tx_root, merkle_root};
pub use primitives::*;
pub use receipt::*;

// Re-export U256 from primitive-types for use across all crates
pub use primitive_types::U256;
