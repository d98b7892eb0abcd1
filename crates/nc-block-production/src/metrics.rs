//! Metrics collection for block production.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

/// Counters updated by the worker, readable from any thread.
#[derive(Debug, Default)]
pub struct Metrics {
    /// Build attempts started.
    pub attempts: AtomicU64,

    /// Attempts skipped by a slot guard or because the producer was not eligible.
    pub skipped: AtomicU64,

    /// Attempts cancelled by a competing head.
    pub preempted: AtomicU64,

    /// Attempts aborted by chain, consensus, state or write errors.
    pub failed: AtomicU64,

    /// Blocks written.
    pub blocks_mined: AtomicU64,

    /// Transactions included across all mined blocks.
    pub transactions_included: AtomicU64,

    /// Gas used across all mined blocks.
    pub total_gas_used: AtomicU64,
}

/// Point-in-time copy of [`Metrics`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    /// Build attempts started.
    pub attempts: u64,
    /// Attempts skipped.
    pub skipped: u64,
    /// Attempts preempted.
    pub preempted: u64,
    /// Attempts failed.
    pub failed: u64,
    /// Blocks written.
    pub blocks_mined: u64,
    /// Transactions included.
    pub transactions_included: u64,
    /// Gas used.
    pub total_gas_used: u64,
}

impl Metrics {
    /// Create new metrics collector
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the start of a build attempt
    pub fn record_attempt(&self) {
        self.attempts.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a skipped attempt
    pub fn record_skipped(&self) {
        self.skipped.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a preempted attempt
    pub fn record_preempted(&self) {
        self.preempted.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a failed attempt
    pub fn record_failed(&self) {
        self.failed.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a mined block
    pub fn record_block_mined(&self, tx_count: usize, gas_used: u64) {
        self.blocks_mined.fetch_add(1, Ordering::Relaxed);
        self.transactions_included
            .fetch_add(tx_count as u64, Ordering::Relaxed);
        self.total_gas_used.fetch_add(gas_used, Ordering::Relaxed);
    }

    /// Get blocks mined
    pub fn get_blocks_mined(&self) -> u64 {
        self.blocks_mined.load(Ordering::Relaxed)
    }

    /// Get average transactions per block
    pub fn get_avg_transactions_per_block(&self) -> f64 {
        let blocks = self.blocks_mined.load(Ordering::Relaxed);
        if blocks == 0 {
            return 0.0;
        }
        let txs = self.transactions_included.load(Ordering::Relaxed);
        txs as f64 / blocks as f64
    }

    /// Copy every counter.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            attempts: self.attempts.load(Ordering::Relaxed),
            skipped: self.skipped.load(Ordering::Relaxed),
            preempted: self.preempted.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            blocks_mined: self.blocks_mined.load(Ordering::Relaxed),
            transactions_included: self.transactions_included.load(Ordering::Relaxed),
            total_gas_used: self.total_gas_used.load(Ordering::Relaxed),
        }
    }
}
