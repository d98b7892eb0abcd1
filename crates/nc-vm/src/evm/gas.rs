//! # Gas Metering
//!
//! Constant step costs, the fork-dependent [`GasTable`] and the dynamic
//! gas-cost functions. Every dynamic cost is computed with overflow-checked
//! arithmetic; overflow surfaces as [`VmError::GasUintOverflow`].
//!
//! These values are part of the consensus contract.

use primitive_types::U256;

use super::memory::Memory;
use super::opcodes::Opcode;
use crate::errors::VmError;

// =============================================================================
// CONSTANT COSTS
// =============================================================================

/// Fixed gas parameters.
pub mod params {
    /// Free.
    pub const ZERO: u64 = 0;
    /// Environment reads (`ADDRESS`, `CALLER`, `POP`, ...).
    pub const QUICK_STEP: u64 = 2;
    /// Cheap arithmetic and stack moves.
    pub const FASTEST_STEP: u64 = 3;
    /// `MUL`, `DIV` and friends.
    pub const FAST_STEP: u64 = 5;
    /// `ADDMOD`, `MULMOD`, `JUMP`.
    pub const MID_STEP: u64 = 8;
    /// `JUMPI`, `EXP` base.
    pub const SLOW_STEP: u64 = 10;
    /// `BLOCKHASH`.
    pub const EXT_STEP: u64 = 20;

    /// `JUMPDEST`.
    pub const JUMPDEST: u64 = 1;
    /// Linear memory coefficient.
    pub const MEMORY_GAS: u64 = 3;
    /// Quadratic memory divisor.
    pub const QUAD_COEFF_DIV: u64 = 512;
    /// `SHA3` base cost.
    pub const SHA3: u64 = 30;
    /// `SHA3` cost per word.
    pub const SHA3_WORD: u64 = 6;
    /// Copy cost per word.
    pub const COPY: u64 = 3;

    /// `LOGn` base cost.
    pub const LOG: u64 = 375;
    /// `LOGn` cost per topic.
    pub const LOG_TOPIC: u64 = 375;
    /// `LOGn` cost per data byte.
    pub const LOG_DATA: u64 = 8;

    /// `SSTORE` zero to non-zero.
    pub const SSTORE_SET: u64 = 20_000;
    /// `SSTORE` any other change.
    pub const SSTORE_RESET: u64 = 5_000;
    /// Refund for `SSTORE` non-zero to zero.
    pub const SSTORE_CLEAR_REFUND: u64 = 15_000;

    /// `CREATE` base cost.
    pub const CREATE: u64 = 32_000;
    /// Code storage cost per byte of deployed code.
    pub const CREATE_DATA: u64 = 200;
    /// Surcharge for a value-bearing call.
    pub const CALL_VALUE_TRANSFER: u64 = 9_000;
    /// Free gas handed to the callee of a value-bearing call.
    pub const CALL_STIPEND: u64 = 2_300;

    /// Maximum nesting of calls and creates.
    pub const CALL_CREATE_DEPTH: usize = 1024;
    /// Maximum deployed code size in bytes.
    pub const MAX_CODE_SIZE: usize = 24_576;
}

/// Largest memory size the gas functions accept before reporting overflow.
pub const MAX_MEMORY_SIZE: u64 = 0x1F_FFFF_FFE0;

// =============================================================================
// GAS TABLE
// =============================================================================

/// Fork-dependent costs of state-touching opcodes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GasTable {
    /// `EXTCODESIZE`.
    pub ext_code_size: u64,
    /// `EXTCODECOPY` base.
    pub ext_code_copy: u64,
    /// `EXTCODEHASH`.
    pub ext_code_hash: u64,
    /// `BALANCE` and `BALANCEEX`.
    pub balance: u64,
    /// `SLOAD`.
    pub sload: u64,
    /// `CALL`, `CALLCODE`, `DELEGATECALL`, `STATICCALL` base.
    pub calls: u64,
    /// Per byte of `EXP` exponent.
    pub exp_byte: u64,
    /// `PLUGINCALL` base.
    pub plugin_call: u64,
}

impl Default for GasTable {
    fn default() -> Self {
        Self {
            ext_code_size: 700,
            ext_code_copy: 700,
            ext_code_hash: 400,
            balance: 400,
            sload: 200,
            calls: 700,
            exp_byte: 50,
            plugin_call: 700,
        }
    }
}

impl GasTable {
    /// Gas charged before executing `op`. Dynamic parts are charged by the
    /// interpreter through the functions below.
    #[must_use]
    pub fn constant_gas(&self, op: Opcode) -> u64 {
        use params::*;
        use Opcode::*;

        match op {
            Stop | Return | Revert | Invalid => ZERO,
            Add | Sub | Lt | Gt | SLt | SGt | Eq | IsZero | And | Or | Xor | Not | Byte | Shl
            | Shr | Sar | CallDataLoad | MLoad | MStore | MStore8 | CallDataCopy | CodeCopy
            | ReturnDataCopy => FASTEST_STEP,
            Mul | Div | SDiv | Mod | SMod | SignExtend => FAST_STEP,
            AddMod | MulMod | Jump => MID_STEP,
            JumpI | Exp => SLOW_STEP,
            Sha3 => SHA3,
            Address | Origin | Caller | CallValue | CallDataSize | CodeSize | GasPrice
            | ReturnDataSize | Coinbase | Timestamp | Number | Difficulty | GasLimit
            | CallAssetId | Pop | Pc | MSize | Gas => QUICK_STEP,
            Balance | BalanceEx => self.balance,
            ExtCodeSize => self.ext_code_size,
            ExtCodeCopy => self.ext_code_copy,
            ExtCodeHash => self.ext_code_hash,
            BlockHash => EXT_STEP,
            SLoad => self.sload,
            SStore => ZERO,
            JumpDest => JUMPDEST,
            Log0 | Log1 | Log2 | Log3 | Log4 => LOG,
            Create => CREATE,
            Call | CallCode | DelegateCall | StaticCall => self.calls,
            PluginCall => self.plugin_call,
            _ => FASTEST_STEP, // PUSHn, DUPn, SWAPn
        }
    }
}

// =============================================================================
// SAFE ARITHMETIC
// =============================================================================

/// Checked addition.
pub fn safe_add(a: u64, b: u64) -> Result<u64, VmError> {
    a.checked_add(b).ok_or(VmError::GasUintOverflow)
}

/// Checked multiplication.
pub fn safe_mul(a: u64, b: u64) -> Result<u64, VmError> {
    a.checked_mul(b).ok_or(VmError::GasUintOverflow)
}

/// Number of 32-byte words needed for `size` bytes.
#[must_use]
pub fn to_word_size(size: u64) -> u64 {
    if size > u64::MAX - 31 {
        return u64::MAX / 32 + 1;
    }
    (size + 31) / 32
}

/// A U256 that must fit 64 bits.
pub fn to_u64(value: U256) -> Result<u64, VmError> {
    if value > U256::from(u64::MAX) {
        return Err(VmError::GasUintOverflow);
    }
    Ok(value.low_u64())
}

/// Memory size required to touch `[offset, offset + size)`; zero when
/// `size` is zero regardless of offset.
pub fn memory_size(offset: U256, size: U256) -> Result<u64, VmError> {
    if size.is_zero() {
        return Ok(0);
    }
    safe_add(to_u64(offset)?, to_u64(size)?)
}

// =============================================================================
// DYNAMIC GAS FUNCTIONS
// =============================================================================

/// Quadratic memory expansion fee for growing `mem` to `new_size` bytes.
///
/// Only the difference to the last charged total is returned; the new total
/// is recorded on `mem`.
pub fn memory_gas_cost(mem: &mut Memory, new_size: u64) -> Result<u64, VmError> {
    if new_size == 0 {
        return Ok(0);
    }
    if new_size > MAX_MEMORY_SIZE {
        return Err(VmError::GasUintOverflow);
    }
    let words = to_word_size(new_size);
    if words * 32 <= mem.len() as u64 {
        return Ok(0);
    }
    let linear = safe_mul(words, params::MEMORY_GAS)?;
    let quadratic = safe_mul(words, words)? / params::QUAD_COEFF_DIV;
    let total = safe_add(linear, quadratic)?;
    let fee = total - mem.last_gas_cost();
    mem.set_last_gas_cost(total);
    Ok(fee)
}

/// Per-word copy fee for `size` bytes (CALLDATACOPY, CODECOPY, ...).
pub fn copy_gas(size: u64) -> Result<u64, VmError> {
    safe_mul(to_word_size(size), params::COPY)
}

/// SHA3 per-word fee.
pub fn sha3_gas(size: u64) -> Result<u64, VmError> {
    safe_mul(to_word_size(size), params::SHA3_WORD)
}

/// LOGn topic and data fee (base charged as constant gas).
pub fn log_gas(topics: u64, size: u64) -> Result<u64, VmError> {
    let topic_gas = safe_mul(topics, params::LOG_TOPIC)?;
    let data_gas = safe_mul(size, params::LOG_DATA)?;
    safe_add(topic_gas, data_gas)
}

/// EXP per-byte fee.
#[must_use]
pub fn exp_gas(table: &GasTable, exponent: U256) -> u64 {
    let bytes = (exponent.bits() as u64).div_ceil(8);
    bytes * table.exp_byte
}

/// SSTORE fee and refund under the legacy rules.
///
/// Returns `(gas, refund)`.
#[must_use]
pub fn sstore_gas(current: &[u8; 32], new_value: U256) -> (u64, u64) {
    let current_zero = current.iter().all(|b| *b == 0);
    match (current_zero, new_value.is_zero()) {
        (true, false) => (params::SSTORE_SET, 0),
        (false, true) => (params::SSTORE_RESET, params::SSTORE_CLEAR_REFUND),
        _ => (params::SSTORE_RESET, 0),
    }
}

/// Gas forwarded to a sub-call: all but 1/64th of what remains after the
/// call's own cost, capped by the requested amount.
pub fn call_gas(available: u64, base: u64, requested: U256) -> Result<u64, VmError> {
    let remaining = available.checked_sub(base).ok_or(VmError::OutOfGas)?;
    let cap = remaining - remaining / 64;
    if requested > U256::from(cap) {
        return Ok(cap);
    }
    Ok(requested.low_u64())
}

/// Value-transfer surcharge for CALL, CALLCODE and PLUGINCALL.
#[must_use]
pub fn value_transfer_gas(value: U256) -> u64 {
    if value.is_zero() {
        0
    } else {
        params::CALL_VALUE_TRANSFER
    }
}

/// Code storage fee for deployed code of `len` bytes.
pub fn create_data_gas(len: usize) -> Result<u64, VmError> {
    safe_mul(len as u64, params::CREATE_DATA)
}
