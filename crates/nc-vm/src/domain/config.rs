//! VM configuration, built once per process and passed by reference into
//! every [`Evm`](crate::Evm).

use crate::evm::analysis::JumpDestCache;
use crate::evm::gas::{params, GasTable};

/// Native stack of the thread running an action's outermost frame: room for
/// `CALL_CREATE_DEPTH` nested interpreter frames in unoptimized builds.
pub const DEFAULT_EXEC_STACK_SIZE: usize = 256 * 1024 * 1024;

/// Immutable execution parameters.
#[derive(Clone, Debug)]
pub struct VmConfig {
    /// Costs of state-touching opcodes.
    pub gas_table: GasTable,
    /// Maximum nesting of calls and creates.
    pub call_create_depth: usize,
    /// Maximum deployed code size.
    pub max_code_size: usize,
    /// Shared jump-destination analysis.
    pub jump_dests: JumpDestCache,
    /// Stack size in bytes of the execution thread.
    pub exec_stack_size: usize,
}

impl Default for VmConfig {
    fn default() -> Self {
        Self {
            gas_table: GasTable::default(),
            call_create_depth: params::CALL_CREATE_DEPTH,
            max_code_size: params::MAX_CODE_SIZE,
            jump_dests: JumpDestCache::new(),
            exec_stack_size: DEFAULT_EXEC_STACK_SIZE,
        }
    }
}
