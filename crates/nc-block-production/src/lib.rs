//! # NC Block Production - Slot-Timed DPoS Minting
//!
//! **Bounded Context:** Block production for the local producer
//!
//! ## Purpose
//!
//! Builds, seals and writes one block per slot when the consensus engine says
//! the local coinbase may produce:
//! - Slot arithmetic and the admission deadline
//! - Price-then-nonce ordering over the pending pool
//! - Gas-limit targeting between a floor and a ceiling
//! - Preemption when another producer's block arrives mid-build
//! - Start/stop lifecycle with runtime-adjustable coinbase, extra and delay
//!
//! ## Architecture Layers
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │  Lifecycle                                          │
//! │  - Miner (start / stop / settings)                  │
//! └─────────────────────────────────────────────────────┘
//!                         │
//! ┌─────────────────────────────────────────────────────┐
//! │  Worker                                             │
//! │  - slot loop, build attempts, preemption            │
//! └─────────────────────────────────────────────────────┘
//!                         │
//! ┌─────────────────────────────────────────────────────┐
//! │  Domain (Pure Logic)                                │
//! │  - TransactionsByPriceAndNonce                      │
//! │  - calc_gas_limit, next_slot, end_time              │
//! └─────────────────────────────────────────────────────┘
//! ```
//!
//! ## Critical Invariants
//!
//! 1. **One Writer**: at most one attempt reaches the chain write at a time
//! 2. **Deadline**: no transaction is admitted at or after `end_time`
//! 3. **Nonce Ordering**: a sender's transactions are included in nonce order
//! 4. **Preemption**: a foreign head cancels the in-flight attempt, which
//!    persists nothing
//!
//! ## Usage Example
//!
//! ```rust,ignore
//! let worker = Arc::new(Worker::new(chain, engine, pool, head_tx, config));
//! let miner = Miner::new(worker, chain_config.max_extra_size);
//! miner.start(false)?;
//! // ...
//! miner.stop().await?;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
/// Ordering, gas-limit and slot arithmetic
pub mod domain;
pub mod error;
pub mod events;
pub mod metrics;
pub mod miner;
/// Collaborators consumed by the worker
pub mod ports;
pub mod worker;

pub use config::{MinerConfig, MinerSettings, DEFAULT_GAS_TARGET};
pub use domain::{calc_gas_limit, end_time, next_slot, TransactionsByPriceAndNonce};
pub use error::{MintError, MinerError, Result, WaitError, WorkerError};
pub use events::{MinerEvent, MinerEventSender, MINER_EVENT_CAPACITY};
pub use metrics::{Metrics, MetricsSnapshot};
pub use miner::Miner;
pub use ports::TxSource;
pub use worker::{Clock, Worker};
