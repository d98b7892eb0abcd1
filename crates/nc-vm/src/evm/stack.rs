//! # Operand Stack
//!
//! 256-bit word stack, at most 1024 entries, allocated once per frame.

use primitive_types::U256;
use shared_types::Name;

use crate::errors::VmError;

/// Maximum stack depth.
pub const STACK_LIMIT: usize = 1024;

/// LIFO operand stack of a single frame.
#[derive(Clone, Debug)]
pub struct Stack {
    data: Vec<U256>,
}

impl Default for Stack {
    fn default() -> Self {
        Self::new()
    }
}

impl Stack {
    /// Empty stack with room for [`STACK_LIMIT`] words.
    #[must_use]
    pub fn new() -> Self {
        Self {
            data: Vec::with_capacity(STACK_LIMIT),
        }
    }

    /// Number of words on the stack.
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// True when nothing is on the stack.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Push a word.
    ///
    /// # Errors
    ///
    /// `StackOverflow` if the stack already holds [`STACK_LIMIT`] words.
    pub fn push(&mut self, value: U256) -> Result<(), VmError> {
        if self.data.len() >= STACK_LIMIT {
            return Err(VmError::StackOverflow);
        }
        self.data.push(value);
        Ok(())
    }

    /// Push a boolean as 0 or 1.
    pub fn push_bool(&mut self, value: bool) -> Result<(), VmError> {
        self.push(if value { U256::one() } else { U256::zero() })
    }

    /// Pop the top word.
    ///
    /// # Errors
    ///
    /// `StackUnderflow` if the stack is empty.
    pub fn pop(&mut self) -> Result<U256, VmError> {
        self.data.pop().ok_or(VmError::StackUnderflow)
    }

    /// Pop `N` words, top first. Nothing is removed on underflow.
    pub fn pop_n<const N: usize>(&mut self) -> Result<[U256; N], VmError> {
        if self.data.len() < N {
            return Err(VmError::StackUnderflow);
        }
        let mut out = [U256::zero(); N];
        for slot in &mut out {
            *slot = self.data.pop().ok_or(VmError::StackUnderflow)?;
        }
        Ok(out)
    }

    /// Pop a word and decode it as an account name.
    pub fn pop_name(&mut self) -> Result<Name, VmError> {
        let word = self.pop()?;
        Ok(Name::from_word(word)?)
    }

    /// Word at `depth` below the top (0 = top), without removing it.
    pub fn back(&self, depth: usize) -> Result<U256, VmError> {
        self.data
            .len()
            .checked_sub(depth + 1)
            .map(|i| self.data[i])
            .ok_or(VmError::StackUnderflow)
    }

    /// Exchange the top with the word `n` below it (SWAPn).
    pub fn swap(&mut self, n: usize) -> Result<(), VmError> {
        let top = self.data.len().checked_sub(1).ok_or(VmError::StackUnderflow)?;
        let other = top.checked_sub(n).ok_or(VmError::StackUnderflow)?;
        self.data.swap(top, other);
        Ok(())
    }

    /// Push a copy of the `n`-th word from the top, 1-based (DUPn).
    pub fn dup(&mut self, n: usize) -> Result<(), VmError> {
        let value = self.back(n.checked_sub(1).ok_or(VmError::StackUnderflow)?)?;
        self.push(value)
    }

    /// Words bottom-first, for tracing.
    #[must_use]
    pub fn as_slice(&self) -> &[U256] {
        &self.data
    }
}
