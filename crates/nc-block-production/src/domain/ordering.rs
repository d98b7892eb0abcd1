//! Price-and-nonce ordering over pending transactions.
//!
//! Each sender's transactions are nonce-ordered and only the head of every
//! sender competes on gas price, so admission never skips a nonce.

use std::cmp::Ordering;
use std::collections::{BTreeMap, BinaryHeap, VecDeque};

use primitive_types::U256;
use shared_types::{Name, Transaction};

/// A sender's head transaction in the price heap.
#[derive(Debug)]
struct HeadTx {
    gas_price: U256,
    sender: Name,
    tx: Transaction,
}

impl PartialEq for HeadTx {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for HeadTx {}

impl PartialOrd for HeadTx {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for HeadTx {
    // Higher price first; equal prices fall back to the smaller sender name.
    fn cmp(&self, other: &Self) -> Ordering {
        self.gas_price
            .cmp(&other.gas_price)
            .then_with(|| other.sender.cmp(&self.sender))
    }
}

/// Max-heap on gas price over each sender's next transaction.
#[derive(Debug, Default)]
pub struct TransactionsByPriceAndNonce {
    heads: BinaryHeap<HeadTx>,
    rest: BTreeMap<Name, VecDeque<Transaction>>,
}

impl TransactionsByPriceAndNonce {
    /// Build from a nonce-ordered pending snapshot.
    pub fn new(pending: BTreeMap<Name, Vec<Transaction>>) -> Self {
        let mut heads = BinaryHeap::with_capacity(pending.len());
        let mut rest = BTreeMap::new();
        for (sender, txs) in pending {
            let mut txs = VecDeque::from(txs);
            if let Some(tx) = txs.pop_front() {
                heads.push(HeadTx {
                    gas_price: tx.gas_price,
                    sender: sender.clone(),
                    tx,
                });
                rest.insert(sender, txs);
            }
        }
        Self { heads, rest }
    }

    /// Best transaction, if any.
    pub fn peek(&self) -> Option<&Transaction> {
        self.heads.peek().map(|head| &head.tx)
    }

    /// Replace the best transaction with its sender's next one.
    pub fn shift(&mut self) {
        if let Some(head) = self.heads.pop() {
            let next = self.rest.get_mut(&head.sender).and_then(VecDeque::pop_front);
            match next {
                Some(tx) => self.heads.push(HeadTx {
                    gas_price: tx.gas_price,
                    sender: head.sender,
                    tx,
                }),
                None => {
                    self.rest.remove(&head.sender);
                }
            }
        }
    }

    /// Drop the best transaction together with the rest of its sender's.
    pub fn pop(&mut self) {
        if let Some(head) = self.heads.pop() {
            self.rest.remove(&head.sender);
        }
    }

    /// Number of senders with transactions left.
    pub fn senders(&self) -> usize {
        self.heads.len()
    }

    /// True when nothing is left.
    pub fn is_empty(&self) -> bool {
        self.heads.is_empty()
    }
}
