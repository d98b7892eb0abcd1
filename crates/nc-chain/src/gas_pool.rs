//! Gas remaining in the block under construction or validation.

use crate::error::GasPoolError;

/// Block-level gas counter.
///
/// Owned by exactly one producer or validation pass. It is `Copy` so a
/// caller can save it before a transaction and restore it on failure.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GasPool(u64);

impl GasPool {
    /// Empty pool.
    #[must_use]
    pub fn new() -> Self {
        Self(0)
    }

    /// Make `amount` gas available. The pool is unchanged on overflow.
    pub fn add_gas(&mut self, amount: u64) -> Result<(), GasPoolError> {
        self.0 = self.0.checked_add(amount).ok_or(GasPoolError::Overflow {
            have: self.0,
            add: amount,
        })?;
        Ok(())
    }

    /// Take `amount` gas out. The pool is unchanged if it holds less.
    pub fn sub_gas(&mut self, amount: u64) -> Result<(), GasPoolError> {
        if amount > self.0 {
            return Err(GasPoolError::LimitReached {
                have: self.0,
                want: amount,
            });
        }
        self.0 -= amount;
        Ok(())
    }

    /// Gas remaining.
    #[must_use]
    pub fn gas(&self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for GasPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
