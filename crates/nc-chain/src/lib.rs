//! # NC-Chain - Chain Core
//!
//! **Bounded Context:** Transaction execution, block replay and block acceptance
//!
//! ## Purpose
//!
//! Turns actions into state changes and blocks into validated chain entries:
//! - Block-level gas accounting (`GasPool`)
//! - Single-action state transition with fee purchase, refund and distribution
//! - Block replay producing receipts (`StateProcessor`)
//! - Header, body and post-state validation (`BlockValidator`)
//! - The import pipeline for peer blocks (`BlockImporter`)
//! - A percentile gas-price oracle
//!
//! ## Architecture Layers
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │  Services                                           │
//! │  - BlockImporter, gas-price Oracle                  │
//! └─────────────────────────────────────────────────────┘
//!                         │
//! ┌─────────────────────────────────────────────────────┐
//! │  Ports (Outbound)                                   │
//! │  - ChainReader, ConsensusEngine, BlockBackend       │
//! └─────────────────────────────────────────────────────┘
//!                         │
//! ┌─────────────────────────────────────────────────────┐
//! │  Domain (Pure Logic)                                │
//! │  - intrinsic gas, StateTransition                   │
//! │  - StateProcessor, BlockValidator                   │
//! └─────────────────────────────────────────────────────┘
//! ```
//!
//! ## Critical Invariants
//!
//! 1. **Gas Conservation**: intrinsic + run + refunded == purchased, per action
//! 2. **Distribution**: attributed gas sums to the gas charged
//! 3. **Pool Bound**: the block gas pool never goes negative
//! 4. **Atomic Rejection**: nonce and fee-purchase failures mutate nothing
//! 5. **Determinism**: replaying a block reproduces its receipts and state root
//!
//! ## Usage Example
//!
//! ```rust,ignore
//! let (head_tx, _) = head_channel();
//! let importer = BlockImporter::new(chain, engine, VmConfig::default(), head_tx);
//! match importer.insert_block(&block)? {
//!     ImportOutcome::Inserted { number, .. } => println!("imported #{number}"),
//!     ImportOutcome::AlreadyKnown { .. } => {}
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

/// Transition, processing and validation logic
pub mod domain;
pub mod error;
pub mod events;
pub mod fork;
pub mod gas_pool;
pub mod gasprice;
pub mod ports;
pub mod service;

pub use domain::{
    apply_transaction, block_context, intrinsic_gas, BlockValidator, ExecutionOutcome,
    ProcessOutput, StateProcessor, StateTransition, TransitionEnv,
};
pub use error::{BlockValidationError, ChainError, GasPoolError, Result, TransitionError};
pub use events::{head_channel, ChainHeadEvent, HeadSender};
pub use gas_pool::GasPool;
pub use gasprice::{Oracle, OracleConfig};
pub use ports::{BlockBackend, ChainReader, ConsensusEngine};
pub use service::{now_ms, BlockImporter, ImportOutcome};
