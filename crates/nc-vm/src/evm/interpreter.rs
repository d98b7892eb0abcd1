//! # Interpreter
//!
//! Fetch/charge/execute loop for one frame. Nested calls go back through
//! [`Evm`], which owns the call stack and the snapshots.

use primitive_types::{U256, U512};
use shared_types::{keccak256, ActionType, Log, Name};

use super::frame::Frame;
use super::gas::{
    call_gas, copy_gas, exp_gas, log_gas, memory_gas_cost, memory_size, params, sha3_gas,
    sstore_gas, to_u64, value_transfer_gas,
};
use super::machine::{CallOutcome, Evm};
use super::memory::{padded_slice, Memory};
use super::opcodes::Opcode;
use super::stack::Stack;
use crate::domain::POLL_INTERVAL;
use crate::errors::VmError;

enum Step {
    Continue,
    Stop(Vec<u8>),
    Revert(Vec<u8>),
}

/// Executes the code of a single frame.
pub struct Interpreter<'e, 'a> {
    evm: &'e mut Evm<'a>,
    frame: Frame,
    pc: usize,
    steps: u64,
    stack: Stack,
    memory: Memory,
    return_data: Vec<u8>,
}

impl<'e, 'a> Interpreter<'e, 'a> {
    /// Interpreter positioned at the start of `frame`'s code.
    pub fn new(evm: &'e mut Evm<'a>, frame: Frame) -> Self {
        Self {
            evm,
            frame,
            pc: 0,
            steps: 0,
            stack: Stack::new(),
            memory: Memory::new(),
            return_data: Vec::new(),
        }
    }

    /// Run to completion: `(output, gas_left, result)`.
    pub fn run(mut self) -> (Vec<u8>, u64, Result<(), VmError>) {
        let outcome = self.execute();
        let gas_left = self.frame.gas;
        match outcome {
            Ok(Step::Revert(output)) => (output, gas_left, Err(VmError::ExecutionReverted)),
            Ok(Step::Stop(output)) => (output, gas_left, Ok(())),
            Ok(Step::Continue) => (Vec::new(), gas_left, Ok(())),
            Err(err) => (Vec::new(), gas_left, Err(err)),
        }
    }

    fn execute(&mut self) -> Result<Step, VmError> {
        loop {
            if self.steps % POLL_INTERVAL == 0 {
                self.evm.interrupt.check()?;
            }
            self.steps += 1;

            let Some(&byte) = self.frame.code.get(self.pc) else {
                return Ok(Step::Stop(Vec::new()));
            };
            let op = Opcode::from_byte(byte).ok_or(VmError::InvalidOpcode(byte))?;
            if self.frame.meta.read_only && op.is_write() {
                return Err(VmError::WriteProtection);
            }
            let cost = self.evm.config.gas_table.constant_gas(op);
            self.charge(cost)?;

            self.pc += 1;
            match self.step(op)? {
                Step::Continue => {}
                halt => return Ok(halt),
            }
        }
    }

    fn charge(&mut self, gas: u64) -> Result<(), VmError> {
        if self.frame.use_gas(gas) {
            Ok(())
        } else {
            Err(VmError::OutOfGas)
        }
    }

    /// Charge expansion for `[offset, offset + size)` and grow memory.
    /// Returns the region as native offsets; `(0, 0)` for an empty region.
    fn expand(&mut self, offset: U256, size: U256) -> Result<(usize, usize), VmError> {
        let needed = memory_size(offset, size)?;
        self.expand_to(needed)?;
        if size.is_zero() {
            return Ok((0, 0));
        }
        Ok((offset.low_u64() as usize, size.low_u64() as usize))
    }

    fn expand_to(&mut self, needed: u64) -> Result<(), VmError> {
        let fee = memory_gas_cost(&mut self.memory, needed)?;
        self.charge(fee)?;
        self.memory.resize(needed as usize);
        Ok(())
    }

    fn jump(&mut self, dest: U256) -> Result<(), VmError> {
        let target = if dest > U256::from(usize::MAX) {
            usize::MAX
        } else {
            dest.low_u64() as usize
        };
        if !self.frame.jump_dests.is_valid(target) {
            return Err(VmError::InvalidJump(target));
        }
        self.pc = target;
        Ok(())
    }

    fn step(&mut self, op: Opcode) -> Result<Step, VmError> {
        match op {
            // =================================================================
            // STOP & ARITHMETIC
            // =================================================================
            Opcode::Stop => return Ok(Step::Stop(Vec::new())),

            Opcode::Add => {
                let [a, b] = self.stack.pop_n()?;
                self.stack.push(a.overflowing_add(b).0)?;
            }

            Opcode::Mul => {
                let [a, b] = self.stack.pop_n()?;
                self.stack.push(a.overflowing_mul(b).0)?;
            }

            Opcode::Sub => {
                let [a, b] = self.stack.pop_n()?;
                self.stack.push(a.overflowing_sub(b).0)?;
            }

            Opcode::Div => {
                let [a, b] = self.stack.pop_n()?;
                self.stack.push(if b.is_zero() { U256::zero() } else { a / b })?;
            }

            Opcode::SDiv => {
                let [a, b] = self.stack.pop_n()?;
                self.stack.push(if b.is_zero() { U256::zero() } else { signed_div(a, b) })?;
            }

            Opcode::Mod => {
                let [a, b] = self.stack.pop_n()?;
                self.stack.push(if b.is_zero() { U256::zero() } else { a % b })?;
            }

            Opcode::SMod => {
                let [a, b] = self.stack.pop_n()?;
                self.stack.push(if b.is_zero() { U256::zero() } else { signed_mod(a, b) })?;
            }

            Opcode::AddMod => {
                let [a, b, n] = self.stack.pop_n()?;
                let result = if n.is_zero() {
                    U256::zero()
                } else {
                    narrow((U512::from(a) + U512::from(b)) % U512::from(n))
                };
                self.stack.push(result)?;
            }

            Opcode::MulMod => {
                let [a, b, n] = self.stack.pop_n()?;
                let result = if n.is_zero() {
                    U256::zero()
                } else {
                    narrow((U512::from(a) * U512::from(b)) % U512::from(n))
                };
                self.stack.push(result)?;
            }

            Opcode::Exp => {
                let [base, exponent] = self.stack.pop_n()?;
                let cost = exp_gas(&self.evm.config.gas_table, exponent);
                self.charge(cost)?;
                self.stack.push(base.overflowing_pow(exponent).0)?;
            }

            Opcode::SignExtend => {
                let [k, x] = self.stack.pop_n()?;
                let result = if k < U256::from(31) {
                    let bit = 8 * k.low_u64() as usize + 7;
                    let mask = (U256::one() << (bit + 1)) - U256::one();
                    if x.bit(bit) {
                        x | !mask
                    } else {
                        x & mask
                    }
                } else {
                    x
                };
                self.stack.push(result)?;
            }

            // =================================================================
            // COMPARISON & BITWISE
            // =================================================================
            Opcode::Lt => {
                let [a, b] = self.stack.pop_n()?;
                self.stack.push_bool(a < b)?;
            }

            Opcode::Gt => {
                let [a, b] = self.stack.pop_n()?;
                self.stack.push_bool(a > b)?;
            }

            Opcode::SLt => {
                let [a, b] = self.stack.pop_n()?;
                self.stack.push_bool(signed_lt(a, b))?;
            }

            Opcode::SGt => {
                let [a, b] = self.stack.pop_n()?;
                self.stack.push_bool(signed_lt(b, a))?;
            }

            Opcode::Eq => {
                let [a, b] = self.stack.pop_n()?;
                self.stack.push_bool(a == b)?;
            }

            Opcode::IsZero => {
                let a = self.stack.pop()?;
                self.stack.push_bool(a.is_zero())?;
            }

            Opcode::And => {
                let [a, b] = self.stack.pop_n()?;
                self.stack.push(a & b)?;
            }

            Opcode::Or => {
                let [a, b] = self.stack.pop_n()?;
                self.stack.push(a | b)?;
            }

            Opcode::Xor => {
                let [a, b] = self.stack.pop_n()?;
                self.stack.push(a ^ b)?;
            }

            Opcode::Not => {
                let a = self.stack.pop()?;
                self.stack.push(!a)?;
            }

            Opcode::Byte => {
                let [i, x] = self.stack.pop_n()?;
                let result = if i < U256::from(32) {
                    (x >> (8 * (31 - i.low_u64() as usize))) & U256::from(0xFF)
                } else {
                    U256::zero()
                };
                self.stack.push(result)?;
            }

            Opcode::Shl => {
                let [shift, value] = self.stack.pop_n()?;
                let result = if shift < U256::from(256) {
                    value << shift.low_u64() as usize
                } else {
                    U256::zero()
                };
                self.stack.push(result)?;
            }

            Opcode::Shr => {
                let [shift, value] = self.stack.pop_n()?;
                let result = if shift < U256::from(256) {
                    value >> shift.low_u64() as usize
                } else {
                    U256::zero()
                };
                self.stack.push(result)?;
            }

            Opcode::Sar => {
                let [shift, value] = self.stack.pop_n()?;
                self.stack.push(sar(value, shift))?;
            }

            // =================================================================
            // KECCAK256
            // =================================================================
            Opcode::Sha3 => {
                let [offset, size] = self.stack.pop_n()?;
                let (offset, size) = self.expand(offset, size)?;
                self.charge(sha3_gas(size as u64)?)?;
                let digest = keccak256(&self.memory.get_copy(offset, size));
                self.stack.push(U256::from_big_endian(&digest))?;
            }

            // =================================================================
            // ENVIRONMENT
            // =================================================================
            Opcode::Address => self.stack.push(self.frame.meta.address.to_word())?,

            Opcode::Balance => {
                let name = self.stack.pop_name()?;
                let balance = self.balance_of(&name, self.frame.meta.asset_id)?;
                self.stack.push(balance)?;
            }

            Opcode::BalanceEx => {
                let name = self.stack.pop_name()?;
                let asset_id = to_u64(self.stack.pop()?)?;
                let balance = self.balance_of(&name, asset_id)?;
                self.stack.push(balance)?;
            }

            Opcode::Origin => self.stack.push(self.evm.tx.origin.to_word())?,

            Opcode::Caller => self.stack.push(self.frame.meta.caller.to_word())?,

            Opcode::CallValue => self.stack.push(self.frame.meta.value)?,

            Opcode::CallAssetId => self.stack.push(U256::from(self.frame.meta.asset_id))?,

            Opcode::CallDataLoad => {
                let offset = self.stack.pop()?;
                let word = padded_slice(&self.frame.input, offset, 32);
                self.stack.push(U256::from_big_endian(&word))?;
            }

            Opcode::CallDataSize => self.stack.push(U256::from(self.frame.input.len()))?,

            Opcode::CallDataCopy => {
                let [mem_offset, data_offset, length] = self.stack.pop_n()?;
                let (mem_offset, length) = self.expand(mem_offset, length)?;
                self.charge(copy_gas(length as u64)?)?;
                let data = padded_slice(&self.frame.input, data_offset, length);
                self.memory.set(mem_offset, length, &data);
            }

            Opcode::CodeSize => self.stack.push(U256::from(self.frame.code.len()))?,

            Opcode::CodeCopy => {
                let [mem_offset, code_offset, length] = self.stack.pop_n()?;
                let (mem_offset, length) = self.expand(mem_offset, length)?;
                self.charge(copy_gas(length as u64)?)?;
                let data = padded_slice(&self.frame.code, code_offset, length);
                self.memory.set(mem_offset, length, &data);
            }

            Opcode::GasPrice => self.stack.push(self.evm.tx.gas_price)?,

            Opcode::ExtCodeSize => {
                let name = self.stack.pop_name()?;
                let size = self.code_of(&name)?.len();
                self.stack.push(U256::from(size))?;
            }

            Opcode::ExtCodeCopy => {
                let name = self.stack.pop_name()?;
                let [mem_offset, code_offset, length] = self.stack.pop_n()?;
                let (mem_offset, length) = self.expand(mem_offset, length)?;
                self.charge(copy_gas(length as u64)?)?;
                let code = self.code_of(&name)?;
                let data = padded_slice(&code, code_offset, length);
                self.memory.set(mem_offset, length, &data);
            }

            Opcode::ReturnDataSize => self.stack.push(U256::from(self.return_data.len()))?,

            Opcode::ReturnDataCopy => {
                let [mem_offset, data_offset, length] = self.stack.pop_n()?;
                let (mem_offset, size) = self.expand(mem_offset, length)?;
                self.charge(copy_gas(size as u64)?)?;
                let end = data_offset
                    .checked_add(length)
                    .ok_or(VmError::ReturnDataOutOfBounds)?;
                if end > U256::from(self.return_data.len()) {
                    return Err(VmError::ReturnDataOutOfBounds);
                }
                let start = data_offset.low_u64() as usize;
                let data = self.return_data[start..start + size].to_vec();
                self.memory.set(mem_offset, size, &data);
            }

            Opcode::ExtCodeHash => {
                let name = self.stack.pop_name()?;
                let hash = if self.evm.state.account_exists(&name)? {
                    U256::from_big_endian(&self.evm.state.get_code_hash(&name)?)
                } else {
                    U256::zero()
                };
                self.stack.push(hash)?;
            }

            // =================================================================
            // BLOCK INFORMATION
            // =================================================================
            Opcode::BlockHash => {
                let number = self.stack.pop()?;
                let hash = if number > U256::from(u64::MAX) {
                    U256::zero()
                } else {
                    U256::from_big_endian(&self.evm.block.block_hash(number.low_u64()))
                };
                self.stack.push(hash)?;
            }

            Opcode::Coinbase => self.stack.push(self.evm.block.coinbase.to_word())?,

            Opcode::Timestamp => self.stack.push(U256::from(self.evm.block.time))?,

            Opcode::Number => self.stack.push(U256::from(self.evm.block.number))?,

            Opcode::Difficulty => self.stack.push(self.evm.block.difficulty)?,

            Opcode::GasLimit => self.stack.push(U256::from(self.evm.block.gas_limit))?,

            // =================================================================
            // STACK, MEMORY, STORAGE & FLOW
            // =================================================================
            Opcode::Pop => {
                self.stack.pop()?;
            }

            Opcode::MLoad => {
                let offset = self.stack.pop()?;
                let (offset, _) = self.expand(offset, U256::from(32))?;
                self.stack.push(self.memory.word(offset))?;
            }

            Opcode::MStore => {
                let [offset, value] = self.stack.pop_n()?;
                let (offset, _) = self.expand(offset, U256::from(32))?;
                self.memory.set_word(offset, value);
            }

            Opcode::MStore8 => {
                let [offset, value] = self.stack.pop_n()?;
                let (offset, _) = self.expand(offset, U256::one())?;
                self.memory.set_byte(offset, value.low_u32() as u8);
            }

            Opcode::SLoad => {
                let key = word_bytes(self.stack.pop()?);
                let value = self.evm.state.get_state(&self.frame.meta.address, &key);
                self.stack.push(U256::from_big_endian(&value))?;
            }

            Opcode::SStore => {
                let [key, value] = self.stack.pop_n()?;
                let key = word_bytes(key);
                let current = self.evm.state.get_state(&self.frame.meta.address, &key);
                let (gas, refund) = sstore_gas(&current, value);
                self.charge(gas)?;
                if refund > 0 {
                    self.evm.state.add_refund(refund);
                }
                let address = self.frame.meta.address.clone();
                self.evm.state.set_state(&address, key, word_bytes(value));
            }

            Opcode::Jump => {
                let dest = self.stack.pop()?;
                self.jump(dest)?;
            }

            Opcode::JumpI => {
                let [dest, cond] = self.stack.pop_n()?;
                if !cond.is_zero() {
                    self.jump(dest)?;
                }
            }

            Opcode::Pc => self.stack.push(U256::from(self.pc - 1))?,

            Opcode::MSize => self.stack.push(U256::from(self.memory.len()))?,

            Opcode::Gas => self.stack.push(U256::from(self.frame.gas))?,

            Opcode::JumpDest => {}

            // =================================================================
            // LOGGING
            // =================================================================
            Opcode::Log0 | Opcode::Log1 | Opcode::Log2 | Opcode::Log3 | Opcode::Log4 => {
                let topics = (op.byte() - Opcode::Log0.byte()) as usize;
                let [offset, size] = self.stack.pop_n()?;
                let (offset, size) = self.expand(offset, size)?;
                self.charge(log_gas(topics as u64, size as u64)?)?;
                let mut hashes = Vec::with_capacity(topics);
                for _ in 0..topics {
                    hashes.push(word_bytes(self.stack.pop()?));
                }
                let mut log = Log::new(
                    self.frame.meta.address.clone(),
                    hashes,
                    self.memory.get_copy(offset, size),
                );
                log.block_number = self.evm.block.number;
                log.action_index = self.evm.tx.action_index;
                self.evm.state.add_log(log);
            }

            // =================================================================
            // SYSTEM
            // =================================================================
            Opcode::Create => self.op_create()?,

            Opcode::Call | Opcode::CallCode | Opcode::DelegateCall | Opcode::StaticCall => {
                self.op_call(op)?;
            }

            Opcode::PluginCall => self.op_plugin_call()?,

            Opcode::Return => {
                let [offset, size] = self.stack.pop_n()?;
                let (offset, size) = self.expand(offset, size)?;
                return Ok(Step::Stop(self.memory.get_copy(offset, size)));
            }

            Opcode::Revert => {
                let [offset, size] = self.stack.pop_n()?;
                let (offset, size) = self.expand(offset, size)?;
                return Ok(Step::Revert(self.memory.get_copy(offset, size)));
            }

            Opcode::Invalid => return Err(VmError::InvalidOpcode(op.byte())),

            // =================================================================
            // PUSH, DUP & SWAP
            // =================================================================
            _ => {
                let byte = op.byte();
                if let Some(n) = op.push_size() {
                    let end = (self.pc + n).min(self.frame.code.len());
                    let mut word = [0u8; 32];
                    let immediate = &self.frame.code[self.pc.min(end)..end];
                    word[32 - n..32 - n + immediate.len()].copy_from_slice(immediate);
                    self.stack.push(U256::from_big_endian(&word))?;
                    self.pc += n;
                } else if (0x80..=0x8F).contains(&byte) {
                    self.stack.dup((byte - 0x7F) as usize)?;
                } else if (0x90..=0x9F).contains(&byte) {
                    self.stack.swap((byte - 0x8F) as usize)?;
                } else {
                    return Err(VmError::InvalidOpcode(byte));
                }
            }
        }
        Ok(Step::Continue)
    }

    fn balance_of(&self, name: &Name, asset_id: u64) -> Result<U256, VmError> {
        if !self.evm.state.account_exists(name)? {
            return Ok(U256::zero());
        }
        Ok(self.evm.state.get_balance(name, asset_id)?)
    }

    fn code_of(&self, name: &Name) -> Result<Vec<u8>, VmError> {
        if !self.evm.state.account_exists(name)? {
            return Ok(Vec::new());
        }
        Ok(self.evm.state.get_code(name)?)
    }

    // =========================================================================
    // NESTED CALLS
    // =========================================================================

    fn op_call(&mut self, op: Opcode) -> Result<(), VmError> {
        let requested = self.stack.pop()?;
        let to = self.stack.pop_name()?;
        let value = if matches!(op, Opcode::Call | Opcode::CallCode) {
            self.stack.pop()?
        } else {
            U256::zero()
        };
        let [in_offset, in_size, out_offset, out_size] = self.stack.pop_n()?;

        if op == Opcode::Call && self.frame.meta.read_only && !value.is_zero() {
            return Err(VmError::WriteProtection);
        }

        let needed = memory_size(in_offset, in_size)?.max(memory_size(out_offset, out_size)?);
        self.expand_to(needed)?;
        self.charge(value_transfer_gas(value))?;

        let mut gas = call_gas(self.frame.gas, 0, requested)?;
        self.charge(gas)?;
        if !value.is_zero() {
            gas += params::CALL_STIPEND;
        }

        let input = if in_size.is_zero() {
            Vec::new()
        } else {
            self.memory.get_copy(in_offset.low_u64() as usize, in_size.low_u64() as usize)
        };
        let me = self.frame.meta.address.clone();
        let asset_id = self.frame.meta.asset_id;
        let outcome = match op {
            Opcode::Call => self.evm.call(&me, &to, input, gas, value, asset_id),
            Opcode::CallCode => self.evm.call_code(&me, &to, input, gas, value, asset_id),
            Opcode::DelegateCall => self.evm.delegate_call(&me, &to, input, gas),
            _ => self.evm.static_call(&me, &to, input, gas),
        };
        self.finish_call(outcome, out_offset, out_size)
    }

    fn finish_call(&mut self, outcome: CallOutcome, out_offset: U256, out_size: U256) -> Result<(), VmError> {
        if outcome.result == Err(VmError::ExecOverTime) {
            return Err(VmError::ExecOverTime);
        }
        let wrote = matches!(outcome.result, Ok(()) | Err(VmError::ExecutionReverted));
        if wrote && !out_size.is_zero() {
            self.memory.set(
                out_offset.low_u64() as usize,
                out_size.low_u64() as usize,
                &outcome.output,
            );
        }
        self.stack.push_bool(outcome.is_ok())?;
        self.frame.gas += outcome.gas_left;
        self.return_data = outcome.output;
        Ok(())
    }

    fn op_create(&mut self) -> Result<(), VmError> {
        let [value, offset, size] = self.stack.pop_n()?;
        let target = self.stack.pop_name()?;
        let (offset, size) = self.expand(offset, size)?;
        let code = self.memory.get_copy(offset, size);

        let gas = self.frame.gas - self.frame.gas / 64;
        self.charge(gas)?;

        let me = self.frame.meta.address.clone();
        let asset_id = self.frame.meta.asset_id;
        let outcome = self.evm.create(&me, &target, code, gas, value, asset_id);
        if outcome.result == Err(VmError::ExecOverTime) {
            return Err(VmError::ExecOverTime);
        }
        self.frame.gas += outcome.gas_left;
        if outcome.is_ok() {
            self.stack.push(target.to_word())?;
            self.return_data = Vec::new();
        } else {
            self.stack.push(U256::zero())?;
            self.return_data = if outcome.result == Err(VmError::ExecutionReverted) {
                outcome.output
            } else {
                Vec::new()
            };
        }
        Ok(())
    }

    fn op_plugin_call(&mut self) -> Result<(), VmError> {
        let code = to_u64(self.stack.pop()?)?;
        let to = self.stack.pop_name()?;
        let asset_id = to_u64(self.stack.pop()?)?;
        let [value, in_offset, in_size] = self.stack.pop_n()?;
        let (in_offset, in_size) = self.expand(in_offset, in_size)?;
        let transfer_gas = value_transfer_gas(value);
        self.charge(transfer_gas)?;

        let owner = self.frame.meta.code_owner.clone();
        let metered = self.evm.config.gas_table.plugin_call + transfer_gas;
        self.evm.attribute_to_asset(&owner, asset_id, metered);

        let payload = self.memory.get_copy(in_offset, in_size);
        let me = self.frame.meta.address.clone();
        let result = match ActionType::from_code(code) {
            Some(action_type) => self.evm.plugin_call(&me, action_type, &to, asset_id, value, payload),
            None => Err(VmError::UnknownActionType(code)),
        };
        self.return_data = Vec::new();
        match result {
            Err(VmError::ExecOverTime) => Err(VmError::ExecOverTime),
            other => self.stack.push_bool(other.is_ok()),
        }
    }
}

// =============================================================================
// HELPERS
// =============================================================================

fn word_bytes(value: U256) -> [u8; 32] {
    let mut out = [0u8; 32];
    value.to_big_endian(&mut out);
    out
}

fn narrow(value: U512) -> U256 {
    let mut bytes = [0u8; 64];
    value.to_big_endian(&mut bytes);
    U256::from_big_endian(&bytes[32..])
}

fn twos_neg(value: U256) -> U256 {
    (!value).overflowing_add(U256::one()).0
}

fn abs(value: U256) -> U256 {
    if value.bit(255) {
        twos_neg(value)
    } else {
        value
    }
}

fn signed_lt(a: U256, b: U256) -> bool {
    match (a.bit(255), b.bit(255)) {
        (true, false) => true,
        (false, true) => false,
        _ => a < b,
    }
}

fn signed_div(a: U256, b: U256) -> U256 {
    let quotient = abs(a) / abs(b);
    if a.bit(255) == b.bit(255) {
        quotient
    } else {
        twos_neg(quotient)
    }
}

fn signed_mod(a: U256, b: U256) -> U256 {
    let rem = abs(a) % abs(b);
    if a.bit(255) {
        twos_neg(rem)
    } else {
        rem
    }
}

fn sar(value: U256, shift: U256) -> U256 {
    let negative = value.bit(255);
    if shift >= U256::from(256) {
        return if negative { U256::MAX } else { U256::zero() };
    }
    let shift = shift.low_u64() as usize;
    if shift == 0 {
        return value;
    }
    let shifted = value >> shift;
    if negative {
        shifted | (U256::MAX << (256 - shift))
    } else {
        shifted
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::MemoryState;
    use crate::domain::{BlockContext, Interrupt, TxContext, VmConfig};
    use crate::ports::{AccountManager, StateDb};
    use shared_types::DistributeKey;

    fn name(s: &str) -> Name {
        Name::new(s).unwrap()
    }

    fn block() -> BlockContext {
        BlockContext {
            coinbase: name("producer"),
            number: 7,
            time: 1_000,
            difficulty: U256::one(),
            gas_limit: 10_000_000,
            fork_id: 1,
            ancestor_hashes: Default::default(),
        }
    }

    fn tx() -> TxContext {
        TxContext {
            origin: name("alice"),
            gas_price: U256::one(),
            action_index: 0,
        }
    }

    fn state_with(contracts: &[(&str, Vec<u8>)]) -> MemoryState {
        let mut state = MemoryState::new();
        state.create_account(&name("alice"), &name("alice")).unwrap();
        state.add_balance(&name("alice"), 1, U256::from(1_000_000)).unwrap();
        for (contract, code) in contracts {
            state.create_account(&name(contract), &name("alice")).unwrap();
            state.set_code(&name(contract), code.clone()).unwrap();
        }
        state
    }

    fn push_name(code: &mut Vec<u8>, n: &str) {
        let word = word_bytes(name(n).to_word());
        let start = word.iter().position(|b| *b != 0).unwrap_or(31);
        let bytes = &word[start..];
        code.push(0x5F + bytes.len() as u8);
        code.extend_from_slice(bytes);
    }

    fn call_code(state: &mut MemoryState, to: &str, gas: u64) -> CallOutcome {
        let (block, config, interrupt) = (block(), VmConfig::default(), Interrupt::new());
        let mut evm = Evm::new(&block, tx(), &config, state, &interrupt);
        evm.call(&name("alice"), &name(to), Vec::new(), gas, U256::zero(), 1)
    }

    // PUSH1 2 PUSH1 3 ADD PUSH1 0 MSTORE PUSH1 32 PUSH1 0 RETURN
    const ADD_AND_RETURN: &[u8] = &[
        0x60, 0x02, 0x60, 0x03, 0x01, 0x60, 0x00, 0x52, 0x60, 0x20, 0x60, 0x00, 0xF3,
    ];

    #[test]
    fn test_arithmetic_and_return() {
        let mut state = state_with(&[("adder", ADD_AND_RETURN.to_vec())]);
        let out = call_code(&mut state, "adder", 100_000);
        assert!(out.is_ok());
        assert_eq!(U256::from_big_endian(&out.output), U256::from(5));
        // 3+3+3+3+3(+3 mem)+3+3 = 24
        assert_eq!(out.gas_left, 100_000 - 24);
    }

    #[test]
    fn test_revert_returns_gas_and_data() {
        // PUSH1 0x2A PUSH1 0 MSTORE8 PUSH1 1 PUSH1 0 REVERT
        let code = vec![0x60, 0x2A, 0x60, 0x00, 0x53, 0x60, 0x01, 0x60, 0x00, 0xFD];
        let mut state = state_with(&[("reverter", code)]);
        let out = call_code(&mut state, "reverter", 50_000);
        assert_eq!(out.result, Err(VmError::ExecutionReverted));
        assert_eq!(out.output, vec![0x2A]);
        assert!(out.gas_left > 49_000);
    }

    #[test]
    fn test_invalid_jump_burns_gas() {
        // PUSH1 3 JUMP
        let mut state = state_with(&[("jumper", vec![0x60, 0x03, 0x56])]);
        let out = call_code(&mut state, "jumper", 50_000);
        assert_eq!(out.result, Err(VmError::InvalidJump(3)));
        assert_eq!(out.gas_left, 0);
    }

    #[test]
    fn test_sstore_rolls_back_on_failure() {
        // PUSH1 1 PUSH1 0 SSTORE INVALID
        let code = vec![0x60, 0x01, 0x60, 0x00, 0x55, 0xFE];
        let mut state = state_with(&[("store", code)]);
        let out = call_code(&mut state, "store", 100_000);
        assert_eq!(out.result, Err(VmError::InvalidOpcode(0xFE)));
        assert_eq!(state.get_state(&name("store"), &[0u8; 32]), [0u8; 32]);
    }

    #[test]
    fn test_sstore_persists_and_refunds() {
        // PUSH1 1 PUSH1 0 SSTORE PUSH1 0 PUSH1 0 SSTORE STOP
        let code = vec![0x60, 0x01, 0x60, 0x00, 0x55, 0x60, 0x00, 0x60, 0x00, 0x55, 0x00];
        let mut state = state_with(&[("store", code)]);
        let out = call_code(&mut state, "store", 100_000);
        assert!(out.is_ok());
        assert_eq!(out.gas_left, 100_000 - 12 - 20_000 - 5_000);
        assert_eq!(state.get_refund(), 15_000);
    }

    #[test]
    fn test_call_missing_account_returns_gas() {
        let mut state = state_with(&[]);
        let out = call_code(&mut state, "ghost", 10_000);
        assert_eq!(out.result, Err(VmError::AccountNotExist(name("ghost"))));
        assert_eq!(out.gas_left, 10_000);
    }

    #[test]
    fn test_static_call_blocks_writes() {
        let store = vec![0x60, 0x01, 0x60, 0x00, 0x55, 0x00];
        // STATICCALL(gas, store, 0, 0, 0, 0); return the success flag
        let mut caller = vec![0x60, 0x00, 0x60, 0x00, 0x60, 0x00, 0x60, 0x00];
        push_name(&mut caller, "store");
        caller.extend_from_slice(&[0x61, 0xFF, 0xFF, 0xFA]);
        caller.extend_from_slice(&[0x60, 0x00, 0x52, 0x60, 0x20, 0x60, 0x00, 0xF3]);
        let mut state = state_with(&[("store", store), ("viewer", caller)]);
        let out = call_code(&mut state, "viewer", 200_000);
        assert!(out.is_ok());
        assert_eq!(U256::from_big_endian(&out.output), U256::zero());
        assert_eq!(state.get_state(&name("store"), &[0u8; 32]), [0u8; 32]);
    }

    #[test]
    fn test_nested_attribution_sums_to_gas_used() {
        let callee = ADD_AND_RETURN.to_vec();
        let mut caller = vec![0x60, 0x20, 0x60, 0x00, 0x60, 0x00, 0x60, 0x00, 0x60, 0x00];
        push_name(&mut caller, "adder");
        caller.extend_from_slice(&[0x61, 0x27, 0x10, 0xF1, 0x00]);
        let mut state = state_with(&[("adder", callee), ("proxy", caller)]);

        let (block, config, interrupt) = (block(), VmConfig::default(), Interrupt::new());
        let mut evm = Evm::new(&block, tx(), &config, &mut state, &interrupt);
        let out = evm.call(&name("alice"), &name("proxy"), Vec::new(), 100_000, U256::zero(), 1);
        assert!(out.is_ok());
        let dist = evm.take_distribution();
        assert_eq!(dist.total(), (100_000 - out.gas_left) as i64);
        assert_eq!(dist.get(&DistributeKey::Contract(name("adder"))), 24);
    }

    #[test]
    fn test_cancelled_interrupt_aborts() {
        let mut state = state_with(&[("adder", ADD_AND_RETURN.to_vec())]);
        let (block, config, interrupt) = (block(), VmConfig::default(), Interrupt::new());
        interrupt.cancel();
        let mut evm = Evm::new(&block, tx(), &config, &mut state, &interrupt);
        let out = evm.call(&name("alice"), &name("adder"), Vec::new(), 10_000, U256::zero(), 1);
        assert_eq!(out.result, Err(VmError::ExecOverTime));
    }

    #[test]
    fn test_create_installs_code_and_detects_collision() {
        // init code: return one byte (0x00) as runtime code
        let init = vec![0x60, 0x01, 0x60, 0x00, 0xF3];
        let mut state = state_with(&[]);
        let (block, config, interrupt) = (block(), VmConfig::default(), Interrupt::new());
        let mut evm = Evm::new(&block, tx(), &config, &mut state, &interrupt);
        let out = evm.create(&name("alice"), &name("token"), init.clone(), 100_000, U256::zero(), 1);
        assert!(out.is_ok());
        assert_eq!(out.gas_left, 100_000 - 9 - 200);

        let again = evm.create(&name("alice"), &name("token"), init, 100_000, U256::zero(), 1);
        assert_eq!(again.result, Err(VmError::ContractCodeCollision(name("token"))));
        assert_eq!(again.gas_left, 0);
        drop(evm);
        assert_eq!(state.get_code(&name("token")).unwrap(), vec![0x00]);
    }

    #[test]
    fn test_code_store_out_of_gas_keeps_gas() {
        // return 32 zero bytes: storage fee 6400
        let init = vec![0x60, 0x20, 0x60, 0x00, 0xF3];
        let mut state = state_with(&[]);
        let (block, config, interrupt) = (block(), VmConfig::default(), Interrupt::new());
        let mut evm = Evm::new(&block, tx(), &config, &mut state, &interrupt);
        let out = evm.create(&name("alice"), &name("token"), init, 1_000, U256::zero(), 1);
        assert_eq!(out.result, Err(VmError::CodeStoreOutOfGas));
        assert_eq!(out.gas_left, 1_000 - 9);
        drop(evm);
        assert!(!state.account_exists(&name("token")).unwrap());
    }

    // slot0 += 1; CALL(GAS, ADDRESS, 0, 0, 0, 0, 0); on failure slot1 = slot0
    const RECURSE: &[u8] = &[
        0x60, 0x00, 0x54, 0x60, 0x01, 0x01, 0x60, 0x00, 0x55, // counter
        0x60, 0x00, 0x60, 0x00, 0x60, 0x00, 0x60, 0x00, 0x60, 0x00, 0x30, 0x5A, 0xF1,
        0x60, 0x1F, 0x57, // JUMPI to the tail on success
        0x60, 0x00, 0x54, 0x60, 0x01, 0x55, 0x5B, 0x00,
    ];

    #[test]
    fn test_self_call_stops_at_depth_limit() {
        let mut state = state_with(&[("recurse", RECURSE.to_vec())]);
        // (63/64)^1024 of this still leaves the deepest frame enough to run
        let out = call_code(&mut state, "recurse", 1_000_000_000_000);
        assert!(out.is_ok());

        let frames = U256::from(params::CALL_CREATE_DEPTH + 1);
        let slot = |i: u8| {
            let mut key = [0u8; 32];
            key[31] = i;
            U256::from_big_endian(&state.get_state(&name("recurse"), &key))
        };
        assert_eq!(slot(0), frames);
        assert_eq!(slot(1), frames);
    }

    #[test]
    fn test_call_past_depth_limit_fails_with_depth() {
        let mut state = state_with(&[("recurse", RECURSE.to_vec())]);
        let (block, interrupt) = (block(), Interrupt::new());
        let config = VmConfig {
            call_create_depth: 3,
            ..VmConfig::default()
        };
        let mut evm = Evm::new(&block, tx(), &config, &mut state, &interrupt);
        let out = evm.call(&name("alice"), &name("recurse"), Vec::new(), 10_000_000, U256::zero(), 1);
        assert!(out.is_ok());
        assert_eq!(evm.depth(), 0);
        drop(evm);

        let mut key = [0u8; 32];
        key[31] = 1;
        assert_eq!(U256::from_big_endian(&state.get_state(&name("recurse"), &key)), U256::from(4));
    }

    #[test]
    fn test_plugin_call_transfers_and_bills_asset() {
        // PLUGINCALL(Transfer, bob, asset 1, 5, 0, 0); return the success flag
        let mut code = vec![0x60, 0x00, 0x60, 0x00, 0x60, 0x05, 0x60, 0x01];
        push_name(&mut code, "bob");
        code.extend_from_slice(&[0x61, 0x02, 0x05, 0xF6]);
        code.extend_from_slice(&[0x60, 0x00, 0x52, 0x60, 0x20, 0x60, 0x00, 0xF3]);
        let mut state = state_with(&[("plugger", code)]);
        state.create_account(&name("bob"), &name("bob")).unwrap();
        state.add_balance(&name("plugger"), 1, U256::from(100)).unwrap();

        let (block, config, interrupt) = (block(), VmConfig::default(), Interrupt::new());
        let mut evm = Evm::new(&block, tx(), &config, &mut state, &interrupt);
        let out = evm.call(&name("alice"), &name("plugger"), Vec::new(), 100_000, U256::zero(), 1);
        assert!(out.is_ok());
        assert_eq!(U256::from_big_endian(&out.output), U256::one());

        let dist = evm.take_distribution();
        assert_eq!(dist.total(), (100_000 - out.gas_left) as i64);
        assert_eq!(dist.get(&DistributeKey::Contract(name("plugger"))), 33);
        assert_eq!(dist.get(&DistributeKey::Asset(1)), 9_700);
        drop(evm);
        assert_eq!(state.get_balance(&name("bob"), 1).unwrap(), U256::from(5));
        assert_eq!(state.get_balance(&name("plugger"), 1).unwrap(), U256::from(95));
    }

    #[test]
    fn test_plugin_call_failure_pushes_zero() {
        // same call without funds in the contract, then an unknown action type
        let mut code = vec![0x60, 0x00, 0x60, 0x00, 0x60, 0x05, 0x60, 0x01];
        push_name(&mut code, "bob");
        code.extend_from_slice(&[0x61, 0x02, 0x05, 0xF6, 0x60, 0x00, 0x52]);
        code.extend_from_slice(&[0x60, 0x00, 0x60, 0x00, 0x60, 0x00, 0x60, 0x01]);
        push_name(&mut code, "bob");
        code.extend_from_slice(&[0x61, 0x0F, 0xFF, 0xF6, 0x60, 0x20, 0x52]);
        code.extend_from_slice(&[0x60, 0x40, 0x60, 0x00, 0xF3]);
        let mut state = state_with(&[("plugger", code)]);
        state.create_account(&name("bob"), &name("bob")).unwrap();

        let out = call_code(&mut state, "plugger", 100_000);
        assert!(out.is_ok());
        assert_eq!(out.output, vec![0u8; 64]);
        assert_eq!(state.get_balance(&name("bob"), 1).unwrap(), U256::zero());
    }

    #[test]
    fn test_signed_helpers() {
        let minus_one = U256::MAX;
        let minus_eight = twos_neg(U256::from(8));
        assert_eq!(signed_div(minus_eight, U256::from(2)), twos_neg(U256::from(4)));
        assert_eq!(signed_mod(minus_eight, U256::from(3)), twos_neg(U256::from(2)));
        assert!(signed_lt(minus_one, U256::zero()));
        assert_eq!(sar(minus_eight, U256::one()), twos_neg(U256::from(4)));
        assert_eq!(sar(minus_one, U256::from(300)), U256::MAX);
        assert_eq!(sar(U256::from(16), U256::zero()), U256::from(16));
    }
}
