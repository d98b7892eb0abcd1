//! # Jump Destination Analysis
//!
//! A code position is a valid jump target when it holds `JUMPDEST` and is not
//! inside PUSH immediate data. The analysis is cached by code hash and shared
//! by every frame running the same code.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use shared_types::Hash;

use super::opcodes::Opcode;

/// Entries kept before the cache is flushed.
const CACHE_LIMIT: usize = 4096;

/// Bitmap of valid jump destinations for one piece of code.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct JumpDests {
    bits: Vec<u64>,
}

impl JumpDests {
    /// Scan `code`.
    #[must_use]
    pub fn analyze(code: &[u8]) -> Self {
        let mut bits = vec![0u64; code.len().div_ceil(64)];
        let mut pc = 0;
        while pc < code.len() {
            let byte = code[pc];
            if byte == Opcode::JumpDest.byte() {
                bits[pc / 64] |= 1 << (pc % 64);
                pc += 1;
            } else if let Some(n) = Opcode::from_byte(byte).and_then(Opcode::push_size) {
                pc += n + 1;
            } else {
                pc += 1;
            }
        }
        Self { bits }
    }

    /// True if `pc` is a valid jump target.
    #[must_use]
    pub fn is_valid(&self, pc: usize) -> bool {
        self.bits
            .get(pc / 64)
            .is_some_and(|word| word & (1 << (pc % 64)) != 0)
    }
}

/// Process-wide analysis cache keyed by code hash.
#[derive(Clone, Debug, Default)]
pub struct JumpDestCache {
    inner: Arc<RwLock<HashMap<Hash, Arc<JumpDests>>>>,
}

impl JumpDestCache {
    /// Empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached analysis for `code_hash`, computing it from `code` on a miss.
    pub fn get_or_analyze(&self, code_hash: &Hash, code: &[u8]) -> Arc<JumpDests> {
        if let Some(found) = self.inner.read().get(code_hash) {
            return Arc::clone(found);
        }
        let analysis = Arc::new(JumpDests::analyze(code));
        let mut map = self.inner.write();
        if map.len() >= CACHE_LIMIT {
            map.clear();
        }
        Arc::clone(map.entry(*code_hash).or_insert(analysis))
    }

    /// Number of cached analyses.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.read().len()
    }

    /// True when nothing is cached.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.read().is_empty()
    }
}
