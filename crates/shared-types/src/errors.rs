//! # Error Types
//!
//! Errors raised while constructing or decoding shared types.

use thiserror::Error;

/// Errors produced by shared-type constructors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TypeError {
    /// Name is shorter or longer than allowed.
    #[error("invalid name length: {len} (allowed {min}..={max})")]
    NameLength {
        /// Observed length in bytes.
        len: usize,
        /// Minimum allowed length.
        min: usize,
        /// Maximum allowed length.
        max: usize,
    },

    /// Name contains a character outside `[a-z0-9.]` or is badly formed.
    #[error("invalid name {0:?}: must start with a-z and contain only a-z, 0-9 and single dots")]
    NameFormat(String),

    /// A 256-bit word does not decode to a name.
    #[error("word does not encode a name")]
    NotAName,
}
