//! Gas attribution map produced by one action.
//!
//! Keys are fee recipient objects; values are signed gas. Nested frames add
//! their burnt gas to their own key and subtract it from their parent's, so
//! the map always sums to the gas burnt at the top level.

use std::collections::BTreeMap;

use shared_types::{DistributeKey, GasAllot};

/// Signed map from recipient object to attributed gas.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct GasDistribution(BTreeMap<DistributeKey, i64>);

fn signed(gas: u64) -> i64 {
    i64::try_from(gas).unwrap_or(i64::MAX)
}

impl GasDistribution {
    /// Empty map.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Attribute `gas` to `key`.
    pub fn credit(&mut self, key: DistributeKey, gas: u64) {
        if gas == 0 {
            return;
        }
        let entry = self.0.entry(key).or_insert(0);
        *entry = entry.saturating_add(signed(gas));
    }

    /// Take `gas` back from `key`.
    pub fn debit(&mut self, key: DistributeKey, gas: u64) {
        if gas == 0 {
            return;
        }
        let entry = self.0.entry(key).or_insert(0);
        *entry = entry.saturating_sub(signed(gas));
    }

    /// Fold another map into this one.
    pub fn merge(&mut self, other: GasDistribution) {
        for (key, gas) in other.0 {
            let entry = self.0.entry(key).or_insert(0);
            *entry = entry.saturating_add(gas);
        }
    }

    /// Reduce positive buckets in key order by a total of `amount`, never
    /// taking a bucket below zero. Returns what could not be absorbed.
    pub fn absorb(&mut self, mut amount: u64) -> u64 {
        for gas in self.0.values_mut() {
            if amount == 0 {
                break;
            }
            if *gas <= 0 {
                continue;
            }
            let take = amount.min(gas.unsigned_abs());
            *gas -= signed(take);
            amount -= take;
        }
        self.0.retain(|_, gas| *gas != 0);
        amount
    }

    /// Sum of all entries.
    #[must_use]
    pub fn total(&self) -> i64 {
        self.0.values().fold(0i64, |acc, g| acc.saturating_add(*g))
    }

    /// Gas attributed to `key`.
    #[must_use]
    pub fn get(&self, key: &DistributeKey) -> i64 {
        self.0.get(key).copied().unwrap_or(0)
    }

    /// Entries in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&DistributeKey, &i64)> {
        self.0.iter()
    }

    /// True when nothing is attributed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Receipt representation, dropping zero entries.
    #[must_use]
    pub fn to_allots(&self) -> Vec<GasAllot> {
        self.0
            .iter()
            .filter(|(_, gas)| **gas != 0)
            .map(|(key, gas)| GasAllot {
                key: key.clone(),
                gas: *gas,
            })
            .collect()
    }
}
