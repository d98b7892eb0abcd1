//! # Interpreter Core
//!
//! - `machine.rs` - `Evm` call/create entry points and gas attribution
//! - `interpreter.rs` - Opcode execution loop
//! - `gas.rs` - Gas table and dynamic cost functions
//! - `memory.rs` - Frame memory
//! - `stack.rs` - Operand stack
//! - `opcodes.rs` - Instruction set
//! - `analysis.rs` - Jump-destination analysis and cache
//! - `frame.rs` - Call stack entries

pub mod analysis;
pub mod frame;
pub mod gas;
pub mod interpreter;
pub mod machine;
pub mod memory;
pub mod opcodes;
pub mod stack;

pub use analysis::{JumpDestCache, JumpDests};
pub use frame::{CallKind, Frame, FrameMeta};
pub use gas::GasTable;
pub use interpreter::Interpreter;
pub use machine::{CallOutcome, Evm};
pub use memory::Memory;
pub use opcodes::Opcode;
pub use stack::Stack;
