//! # Ports Layer
//!
//! The transaction pool as seen by the worker.

use std::collections::BTreeMap;

use shared_types::{Name, Transaction};

/// Source of pending transactions.
pub trait TxSource: Send + Sync {
    /// Executable transactions grouped by sender, each list nonce-ordered.
    fn pending(&self) -> BTreeMap<Name, Vec<Transaction>>;
}
