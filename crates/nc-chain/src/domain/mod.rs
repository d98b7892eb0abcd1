//! Chain-core domain logic.

pub mod intrinsic;
pub mod processor;
pub mod transition;
pub mod validator;

pub use intrinsic::intrinsic_gas;
pub use processor::{apply_transaction, block_context, ProcessOutput, StateProcessor};
pub use transition::{ExecutionOutcome, StateTransition, TransitionEnv};
pub use validator::{BlockValidator, MAX_GAS_LIMIT};
