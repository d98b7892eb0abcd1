//! # NC-VM - Execution Engine
//!
//! Bytecode interpreter for contract actions over named accounts and
//! multi-asset balances.
//!
//! ## Purpose
//!
//! Runs `CreateContract` and `CallContract` actions on behalf of the state
//! transition engine. Meters gas, enforces the call-depth and code-size
//! limits, rolls state back on failure and records which account each unit of
//! burnt gas belongs to.
//!
//! ## Domain Rules
//!
//! | Rule | Enforcement |
//! |------|-------------|
//! | Call depth never exceeds 1024 | `Evm::precheck` |
//! | A failed frame leaves no state behind | snapshot/revert in `Evm::execute` and `Evm::create` |
//! | Only explicit reverts hand gas back | `VmError::consumes_all_gas` |
//! | Static calls never mutate state | `Opcode::is_write` check in the interpreter loop |
//! | Per-frame attribution nets out to the gas used | `Evm::settle` |
//! | Long runs stop at the deadline | `Interrupt`, polled every 256 steps and at each call |
//!
//! ## Differences From The Ethereum Instruction Set
//!
//! | Change | Detail |
//! |--------|--------|
//! | Account operands | Name words (`Name::to_word`) instead of 20-byte addresses |
//! | `CREATE` | Pops an explicit `target_name` after `(value, offset, size)` |
//! | `CREATE2`, `SELFDESTRUCT` | Invalid opcodes |
//! | `CALLASSETID` (0x46) | Asset of the current call value |
//! | `BALANCEEX` (0xC0) | Balance of a named account in a given asset |
//! | `PLUGINCALL` (0xF6) | Routes a system action to the account manager |
//!
//! ## Usage Example
//!
//! ```ignore
//! use nc_vm::prelude::*;
//!
//! let config = VmConfig::default();
//! let interrupt = Interrupt::new();
//! let mut evm = Evm::new(&block, tx, &config, &mut state, &interrupt);
//! let outcome = evm.call(&caller, &contract, input, gas, value, asset_id);
//! let distribution = evm.take_distribution();
//! ```

#![warn(missing_docs)]
#![allow(clippy::module_name_repetitions)]

// =============================================================================
// MODULES
// =============================================================================

pub mod adapters;
pub mod domain;
pub mod errors;
pub mod evm;
pub mod ports;

pub use domain::{BlockContext, GasDistribution, Interrupt, TxContext, VmConfig};
pub use errors::{StateError, VmError};
pub use evm::{CallOutcome, Evm};
pub use ports::{AccountManager, ExecutionState, StateDb};

// =============================================================================
// PRELUDE
// =============================================================================

/// Convenient re-exports for common usage.
pub mod prelude {
    pub use crate::adapters::MemoryState;
    pub use crate::domain::{BlockContext, GasDistribution, Interrupt, TxContext, VmConfig};
    pub use crate::errors::{StateError, VmError};
    pub use crate::evm::gas::{params, GasTable};
    pub use crate::evm::{CallOutcome, Evm};
    pub use crate::ports::{AccountManager, ExecutionState, StateDb};
}
