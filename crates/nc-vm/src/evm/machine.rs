//! # Evm
//!
//! Entry points for running contract code: `call`, `call_code`,
//! `delegate_call`, `static_call`, `create` and `plugin_call`.
//!
//! Every entry point enforces the depth limit and the caller's ability to pay
//! the transferred value, snapshots state before any side effect, and rolls
//! back on failure. Explicit reverts hand the remaining gas back; any other
//! execution error burns it.

use std::sync::Arc;
use std::{panic, thread};

use primitive_types::U256;
use shared_types::{keccak256, Action, ActionType, AssetId, DistributeKey, Name};
use tracing::{trace, warn};

use super::frame::{CallKind, Frame, FrameMeta};
use super::gas::create_data_gas;
use super::interpreter::Interpreter;
use crate::domain::{BlockContext, GasDistribution, Interrupt, TxContext, VmConfig};
use crate::errors::VmError;
use crate::ports::ExecutionState;

/// Result of a call or create: output, unspent gas and status.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CallOutcome {
    /// Return data (revert data on `ExecutionReverted`).
    pub output: Vec<u8>,
    /// Gas handed back to the caller.
    pub gas_left: u64,
    /// `Ok` on success.
    pub result: Result<(), VmError>,
}

impl CallOutcome {
    fn ok(output: Vec<u8>, gas_left: u64) -> Self {
        Self {
            output,
            gas_left,
            result: Ok(()),
        }
    }

    fn failed(err: VmError, gas_left: u64) -> Self {
        Self {
            output: Vec::new(),
            gas_left,
            result: Err(err),
        }
    }

    /// True on success.
    #[must_use]
    pub fn is_ok(&self) -> bool {
        self.result.is_ok()
    }
}

/// Execution engine bound to one action.
pub struct Evm<'a> {
    /// Block values.
    pub block: &'a BlockContext,
    /// Transaction values.
    pub tx: TxContext,
    /// Process-wide configuration.
    pub config: &'a VmConfig,
    /// State being executed against.
    pub state: &'a mut dyn ExecutionState,
    /// Cancellation and deadline.
    pub interrupt: &'a Interrupt,
    call_stack: Vec<FrameMeta>,
    distribution: GasDistribution,
}

impl<'a> Evm<'a> {
    /// Bind an engine to its context.
    pub fn new(
        block: &'a BlockContext,
        tx: TxContext,
        config: &'a VmConfig,
        state: &'a mut dyn ExecutionState,
        interrupt: &'a Interrupt,
    ) -> Self {
        Self {
            block,
            tx,
            config,
            state,
            interrupt,
            call_stack: Vec::new(),
            distribution: GasDistribution::new(),
        }
    }

    /// Current nesting depth.
    #[must_use]
    pub fn depth(&self) -> usize {
        self.call_stack.len()
    }

    /// Gas attribution accumulated so far.
    #[must_use]
    pub fn distribution(&self) -> &GasDistribution {
        &self.distribution
    }

    /// Hand over the gas attribution.
    pub fn take_distribution(&mut self) -> GasDistribution {
        std::mem::take(&mut self.distribution)
    }

    fn read_only(&self) -> bool {
        self.call_stack.last().is_some_and(|m| m.read_only)
    }

    fn precheck(&self, caller: &Name, asset_id: AssetId, value: U256) -> Result<(), VmError> {
        self.interrupt.check()?;
        if self.call_stack.len() > self.config.call_create_depth {
            return Err(VmError::Depth);
        }
        if !value.is_zero() && !self.state.can_transfer(caller, asset_id, value)? {
            return Err(VmError::InsufficientBalance);
        }
        Ok(())
    }

    fn require_account(&self, name: &Name) -> Result<(), VmError> {
        if self.state.account_exists(name)? {
            Ok(())
        } else {
            Err(VmError::AccountNotExist(name.clone()))
        }
    }

    // =========================================================================
    // CALLS
    // =========================================================================

    /// Run `to`'s code in `to`'s storage, transferring `value` first.
    pub fn call(&mut self, caller: &Name, to: &Name, input: Vec<u8>, gas: u64, value: U256, asset_id: AssetId) -> CallOutcome {
        if let Err(err) = self
            .precheck(caller, asset_id, value)
            .and_then(|()| self.require_account(to))
        {
            return CallOutcome::failed(err, gas);
        }
        let snapshot = self.state.snapshot();
        if !value.is_zero() {
            if let Err(err) = self.state.transfer_asset(caller, to, asset_id, value) {
                self.state.revert_to_snapshot(snapshot);
                return CallOutcome::failed(err.into(), gas);
            }
        }
        let meta = FrameMeta {
            kind: CallKind::Call,
            caller: caller.clone(),
            address: to.clone(),
            code_owner: to.clone(),
            value,
            asset_id,
            read_only: self.read_only(),
        };
        self.execute(meta, input, gas, snapshot)
    }

    /// Run `to`'s code in the caller's storage.
    pub fn call_code(&mut self, caller: &Name, to: &Name, input: Vec<u8>, gas: u64, value: U256, asset_id: AssetId) -> CallOutcome {
        if let Err(err) = self
            .precheck(caller, asset_id, value)
            .and_then(|()| self.require_account(to))
        {
            return CallOutcome::failed(err, gas);
        }
        let snapshot = self.state.snapshot();
        let meta = FrameMeta {
            kind: CallKind::CallCode,
            caller: caller.clone(),
            address: caller.clone(),
            code_owner: to.clone(),
            value,
            asset_id,
            read_only: self.read_only(),
        };
        self.execute(meta, input, gas, snapshot)
    }

    /// Run `to`'s code in the caller's storage, keeping the parent frame's
    /// caller and value.
    pub fn delegate_call(&mut self, caller: &Name, to: &Name, input: Vec<u8>, gas: u64) -> CallOutcome {
        if let Err(err) = self
            .precheck(caller, 0, U256::zero())
            .and_then(|()| self.require_account(to))
        {
            return CallOutcome::failed(err, gas);
        }
        let (parent_caller, value, asset_id) = match self.call_stack.last() {
            Some(parent) => (parent.caller.clone(), parent.value, parent.asset_id),
            None => (caller.clone(), U256::zero(), 0),
        };
        let snapshot = self.state.snapshot();
        let meta = FrameMeta {
            kind: CallKind::DelegateCall,
            caller: parent_caller,
            address: caller.clone(),
            code_owner: to.clone(),
            value,
            asset_id,
            read_only: self.read_only(),
        };
        self.execute(meta, input, gas, snapshot)
    }

    /// Run `to`'s code with every state mutation forbidden.
    pub fn static_call(&mut self, caller: &Name, to: &Name, input: Vec<u8>, gas: u64) -> CallOutcome {
        if let Err(err) = self
            .precheck(caller, 0, U256::zero())
            .and_then(|()| self.require_account(to))
        {
            return CallOutcome::failed(err, gas);
        }
        let snapshot = self.state.snapshot();
        let meta = FrameMeta {
            kind: CallKind::StaticCall,
            caller: caller.clone(),
            address: to.clone(),
            code_owner: to.clone(),
            value: U256::zero(),
            asset_id: 0,
            read_only: true,
        };
        self.execute(meta, input, gas, snapshot)
    }

    fn execute(&mut self, meta: FrameMeta, input: Vec<u8>, gas: u64, snapshot: usize) -> CallOutcome {
        let code = match self.state.get_code(&meta.code_owner) {
            Ok(code) => code,
            Err(err) => {
                self.state.revert_to_snapshot(snapshot);
                return CallOutcome::failed(err.into(), gas);
            }
        };
        if code.is_empty() {
            return CallOutcome::ok(Vec::new(), gas);
        }
        let code_hash = match self.state.get_code_hash(&meta.code_owner) {
            Ok(hash) => hash,
            Err(err) => {
                self.state.revert_to_snapshot(snapshot);
                return CallOutcome::failed(err.into(), gas);
            }
        };

        let owner = meta.code_owner.clone();
        let (output, mut gas_left, result) = self.run_code(meta, Arc::new(code), code_hash, input, gas);
        if let Err(err) = &result {
            self.state.revert_to_snapshot(snapshot);
            if err.consumes_all_gas() {
                gas_left = 0;
            }
        }
        self.settle(&owner, gas - gas_left);
        CallOutcome {
            output,
            gas_left,
            result,
        }
    }

    // =========================================================================
    // CREATE
    // =========================================================================

    /// Run init `code` for `target` and install the code it returns.
    ///
    /// The target account is created inside the snapshot if missing. A target
    /// that already holds code is a collision: nothing is transferred or
    /// written and the gas is consumed. Code larger than the configured limit
    /// fails before any storage fee is charged; a storage fee the frame
    /// cannot pay fails with [`VmError::CodeStoreOutOfGas`], which rolls back
    /// like a revert and hands the remaining gas back.
    pub fn create(&mut self, caller: &Name, target: &Name, code: Vec<u8>, gas: u64, value: U256, asset_id: AssetId) -> CallOutcome {
        if let Err(err) = self.precheck(caller, asset_id, value) {
            return CallOutcome::failed(err, gas);
        }
        let exists = match self.state.account_exists(target) {
            Ok(exists) => exists,
            Err(err) => return CallOutcome::failed(err.into(), gas),
        };
        if exists {
            match self.state.get_code(target) {
                Ok(existing) if !existing.is_empty() => {
                    return CallOutcome::failed(VmError::ContractCodeCollision(target.clone()), 0);
                }
                Ok(_) => {}
                Err(err) => return CallOutcome::failed(err.into(), gas),
            }
        }

        let snapshot = self.state.snapshot();
        let setup = (|| -> Result<(), VmError> {
            if !exists {
                self.state.create_account(target, caller)?;
            }
            if !value.is_zero() {
                self.state.transfer_asset(caller, target, asset_id, value)?;
            }
            Ok(())
        })();
        if let Err(err) = setup {
            self.state.revert_to_snapshot(snapshot);
            return CallOutcome::failed(err, gas);
        }

        let meta = FrameMeta {
            kind: CallKind::Create,
            caller: caller.clone(),
            address: target.clone(),
            code_owner: target.clone(),
            value,
            asset_id,
            read_only: self.read_only(),
        };
        let code_hash = keccak256(&code);
        let (output, mut gas_left, mut result) = self.run_code(meta, Arc::new(code), code_hash, Vec::new(), gas);

        if result.is_ok() {
            if output.len() > self.config.max_code_size {
                result = Err(VmError::MaxCodeSizeExceeded {
                    size: output.len(),
                    max: self.config.max_code_size,
                });
            } else {
                match create_data_gas(output.len()) {
                    Ok(fee) if fee <= gas_left => {
                        gas_left -= fee;
                        if let Err(err) = self.state.set_code(target, output.clone()) {
                            result = Err(err.into());
                        }
                    }
                    _ => result = Err(VmError::CodeStoreOutOfGas),
                }
            }
        }
        if let Err(err) = &result {
            self.state.revert_to_snapshot(snapshot);
            if err.consumes_all_gas() {
                gas_left = 0;
            }
        }
        self.settle(target, gas - gas_left);
        CallOutcome {
            output,
            gas_left,
            result,
        }
    }

    // =========================================================================
    // PLUGIN CALL
    // =========================================================================

    /// Route a system action issued by contract code to the account manager.
    pub fn plugin_call(
        &mut self,
        caller: &Name,
        action_type: ActionType,
        to: &Name,
        asset_id: AssetId,
        value: U256,
        payload: Vec<u8>,
    ) -> Result<(), VmError> {
        self.interrupt.check()?;
        if action_type.is_contract() {
            return Err(VmError::UnknownActionType(action_type.code()));
        }
        let action = Action {
            action_type,
            nonce: 0,
            asset_id,
            from: caller.clone(),
            to: to.clone(),
            gas_limit: 0,
            amount: value,
            payload,
        };
        let snapshot = self.state.snapshot();
        if let Err(err) = self.state.exec_tx(&action) {
            self.state.revert_to_snapshot(snapshot);
            return Err(err.into());
        }
        Ok(())
    }

    /// Move gas already attributed to the running contract over to an asset.
    pub(crate) fn attribute_to_asset(&mut self, contract: &Name, asset_id: AssetId, gas: u64) {
        self.distribution.debit(DistributeKey::Contract(contract.clone()), gas);
        self.distribution.credit(DistributeKey::Asset(asset_id), gas);
    }

    // =========================================================================
    // FRAME PLUMBING
    // =========================================================================

    fn run_code(
        &mut self,
        meta: FrameMeta,
        code: Arc<Vec<u8>>,
        code_hash: shared_types::Hash,
        input: Vec<u8>,
        gas: u64,
    ) -> (Vec<u8>, u64, Result<(), VmError>) {
        let jump_dests = self.config.jump_dests.get_or_analyze(&code_hash, &code);
        let frame = Frame {
            meta: meta.clone(),
            code,
            code_hash,
            input,
            gas,
            jump_dests,
        };
        self.call_stack.push(meta);
        let (output, gas_left, result) = if self.call_stack.len() == 1 {
            self.run_outermost(frame)
        } else {
            Interpreter::new(self, frame).run()
        };
        self.call_stack.pop();
        if let Err(err) = &result {
            trace!(depth = self.call_stack.len(), error = %err, "frame failed");
        }
        (output, gas_left, result)
    }

    /// Run the outermost frame on a scoped thread sized by
    /// `VmConfig::exec_stack_size`, so a call chain at the depth limit never
    /// exhausts the caller's native stack. Panics are resumed on the caller.
    fn run_outermost(&mut self, frame: Frame) -> (Vec<u8>, u64, Result<(), VmError>) {
        let gas = frame.gas;
        let builder = thread::Builder::new()
            .name(String::from("nc-vm-exec"))
            .stack_size(self.config.exec_stack_size);
        thread::scope(|scope| {
            match builder.spawn_scoped(scope, move || Interpreter::new(self, frame).run()) {
                Ok(handle) => handle.join().unwrap_or_else(|payload| panic::resume_unwind(payload)),
                Err(err) => {
                    warn!(error = %err, "failed to spawn execution thread");
                    (Vec::new(), gas, Err(VmError::ExecutorUnavailable(err.to_string())))
                }
            }
        })
    }

    /// Attribute `used` gas to `owner` and take it back from the parent frame.
    fn settle(&mut self, owner: &Name, used: u64) {
        self.distribution.credit(DistributeKey::Contract(owner.clone()), used);
        if let Some(parent) = self.call_stack.last() {
            let parent = parent.code_owner.clone();
            self.distribution.debit(DistributeKey::Contract(parent), used);
        }
    }
}
