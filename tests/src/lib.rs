//! # NameChain Scenario Suite
//!
//! Cross-crate scenarios that need more than one crate's public API: two
//! nodes exchanging blocks, the worker under a real clock, preemption by a
//! rival head and the miner's slot loop.
//!
//! ## Structure
//!
//! ```text
//! tests/src/
//! ├── fixtures.rs          # Node configs, contract code, worker builders
//! └── integration/
//!     ├── block_exchange.rs  # Producer node → importing node
//!     ├── transitions.rs     # Gas accounting over real blocks
//!     ├── deadlines.rs       # Admission deadline and preemption
//!     └── miner.rs           # Slot loop liveness
//! ```
//!
//! ## Running Tests
//!
//! ```bash
//! cargo test -p nc-tests
//! cargo test -p nc-tests integration::deadlines::
//! ```

#[cfg(test)]
pub mod fixtures;
pub mod integration;
