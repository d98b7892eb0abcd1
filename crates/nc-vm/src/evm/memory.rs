//! # Frame Memory
//!
//! Byte-addressable, word-aligned scratch memory. Expansion is paid for
//! quadratically; the last charged total is kept here so each expansion is
//! billed only for the difference.

use primitive_types::U256;

/// Word size in bytes (32 bytes = 256 bits).
pub const WORD_SIZE: usize = 32;

/// Linear memory of one frame.
#[derive(Clone, Debug, Default)]
pub struct Memory {
    data: Vec<u8>,
    last_gas_cost: u64,
}

impl Memory {
    /// Empty memory.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Current size in bytes (always a multiple of [`WORD_SIZE`]).
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// True when nothing has been allocated.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Total expansion fee charged so far.
    #[must_use]
    pub fn last_gas_cost(&self) -> u64 {
        self.last_gas_cost
    }

    pub(crate) fn set_last_gas_cost(&mut self, cost: u64) {
        self.last_gas_cost = cost;
    }

    /// Grow to `size` bytes, rounded up to a whole word. Never shrinks.
    pub fn resize(&mut self, size: usize) {
        let size = size.div_ceil(WORD_SIZE) * WORD_SIZE;
        if size > self.data.len() {
            self.data.resize(size, 0);
        }
    }

    /// Copy at most `size` bytes of `value` to `offset`. The region must
    /// already be allocated; bytes past the end of `value` are left as is.
    pub fn set(&mut self, offset: usize, size: usize, value: &[u8]) {
        let n = value.len().min(size);
        if n == 0 {
            return;
        }
        self.data[offset..offset + n].copy_from_slice(&value[..n]);
    }

    /// Store a big-endian word at `offset`.
    pub fn set_word(&mut self, offset: usize, value: U256) {
        value.to_big_endian(&mut self.data[offset..offset + WORD_SIZE]);
    }

    /// Store a single byte.
    pub fn set_byte(&mut self, offset: usize, value: u8) {
        self.data[offset] = value;
    }

    /// Load a big-endian word from allocated memory.
    #[must_use]
    pub fn word(&self, offset: usize) -> U256 {
        U256::from_big_endian(&self.data[offset..offset + WORD_SIZE])
    }

    /// Copy out `size` bytes, zero-padded past the end of memory.
    #[must_use]
    pub fn get_copy(&self, offset: usize, size: usize) -> Vec<u8> {
        let mut out = vec![0u8; size];
        if offset < self.data.len() {
            let end = (offset + size).min(self.data.len());
            out[..end - offset].copy_from_slice(&self.data[offset..end]);
        }
        out
    }
}

/// Copy `size` bytes of `src` starting at `offset`, zero-padded. Used by the
/// CALLDATA*/CODECOPY/EXTCODECOPY family where `offset` may be far out of range.
#[must_use]
pub fn padded_slice(src: &[u8], offset: U256, size: usize) -> Vec<u8> {
    let mut out = vec![0u8; size];
    if offset < U256::from(src.len()) {
        let start = offset.low_u64() as usize;
        let end = start.saturating_add(size).min(src.len());
        out[..end - start].copy_from_slice(&src[start..end]);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resize_rounds_to_words() {
        let mut mem = Memory::new();
        mem.resize(10);
        assert_eq!(mem.len(), 32);
        mem.resize(33);
        assert_eq!(mem.len(), 64);
        mem.resize(1);
        assert_eq!(mem.len(), 64);
    }

    #[test]
    fn test_word_round_trip() {
        let mut mem = Memory::new();
        mem.resize(64);
        mem.set_word(16, U256::from(0xABCDu64));
        assert_eq!(mem.word(16), U256::from(0xABCDu64));
        assert_eq!(mem.get_copy(46, 2), vec![0xAB, 0xCD]);
    }

    #[test]
    fn test_set_keeps_tail() {
        let mut mem = Memory::new();
        mem.resize(32);
        mem.set(0, 4, &[9, 9, 9, 9]);
        mem.set(0, 4, &[1]);
        assert_eq!(mem.get_copy(0, 4), vec![1, 9, 9, 9]);
        mem.set(8, 2, &[5, 5, 5]);
        assert_eq!(mem.get_copy(8, 3), vec![5, 5, 0]);
    }

    #[test]
    fn test_get_copy_pads_past_end() {
        let mut mem = Memory::new();
        mem.resize(32);
        mem.set_byte(31, 7);
        assert_eq!(mem.get_copy(30, 4), vec![0, 7, 0, 0]);
        assert_eq!(mem.get_copy(100, 2), vec![0, 0]);
    }

    #[test]
    fn test_padded_slice() {
        let code = [1u8, 2, 3];
        assert_eq!(padded_slice(&code, U256::from(1), 4), vec![2, 3, 0, 0]);
        assert_eq!(padded_slice(&code, U256::MAX, 2), vec![0, 0]);
    }
}
