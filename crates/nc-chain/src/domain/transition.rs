//! # State Transition
//!
//! Applies exactly one action: nonce check, gas purchase, intrinsic gas,
//! dispatch to the VM or the account manager, nonce advance, refund and fee
//! distribution.
//!
//! Gas conservation holds on every path past the purchase:
//! `intrinsic_gas + run_gas + refunded_gas == gas_limit`,
//! `gas_used + refunded_gas == gas_limit` and the distribution sums to
//! `gas_used`. The SSTORE refund is netted out of `run_gas` first and out of
//! `intrinsic_gas` for any remainder, so both report gas actually charged.

use nc_vm::{BlockContext, Evm, ExecutionState, GasDistribution, Interrupt, TxContext, VmConfig, VmError};
use primitive_types::U256;
use shared_types::{Action, ActionType, ChainConfig, DistributeKey};
use tracing::trace;

use super::intrinsic::intrinsic_gas;
use crate::error::TransitionError;
use crate::gas_pool::GasPool;

/// Block-wide inputs shared by every action of the block.
#[derive(Clone, Copy)]
pub struct TransitionEnv<'a> {
    /// Chain parameters.
    pub chain: &'a ChainConfig,
    /// VM parameters.
    pub vm: &'a VmConfig,
    /// Block values visible to contracts.
    pub block: &'a BlockContext,
    /// Cancellation and deadline of the surrounding build or import.
    pub interrupt: &'a Interrupt,
}

/// Result of one action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionOutcome {
    /// Return data of the top-level frame.
    pub return_data: Vec<u8>,
    /// Gas charged to the sender after refunds.
    pub gas_used: u64,
    /// True when the action failed but the transaction stays valid.
    pub failed: bool,
    /// Execution error, if any.
    pub vm_err: Option<VmError>,
    /// Intrinsic gas charged (all purchased gas if it did not fit), net of
    /// any SSTORE refund left over after `run_gas`.
    pub intrinsic_gas: u64,
    /// Gas consumed by execution, net of the SSTORE refund.
    pub run_gas: u64,
    /// Gas handed back to the sender: unused gas plus `storage_refund`.
    pub refunded_gas: u64,
    /// Part of `refunded_gas` earned by clearing storage slots.
    pub storage_refund: u64,
    /// Who receives the fee for `gas_used`.
    pub distribution: GasDistribution,
}

impl ExecutionOutcome {
    /// Consensus-significant error carried by an otherwise valid outcome.
    #[must_use]
    pub fn consensus_error(&self) -> Option<&VmError> {
        self.vm_err.as_ref().filter(|e| e.is_consensus_significant())
    }
}

/// Single-action state transition.
pub struct StateTransition<'a> {
    env: TransitionEnv<'a>,
    action: &'a Action,
    action_index: u32,
    gas_price: U256,
    gas_pool: &'a mut GasPool,
    state: &'a mut dyn ExecutionState,
}

impl<'a> StateTransition<'a> {
    /// Prepare a transition of `action` paid at `gas_price`.
    pub fn new(
        env: TransitionEnv<'a>,
        action: &'a Action,
        gas_price: U256,
        gas_pool: &'a mut GasPool,
        state: &'a mut dyn ExecutionState,
    ) -> Self {
        Self {
            env,
            action,
            action_index: 0,
            gas_price,
            gas_pool,
            state,
        }
    }

    /// Position of the action in its transaction.
    #[must_use]
    pub fn with_action_index(mut self, index: u32) -> Self {
        self.action_index = index;
        self
    }

    /// Apply the action.
    ///
    /// Errors are returned only before any mutation (nonce, gas purchase) or
    /// for unexpected state failures. Execution failures come back inside the
    /// outcome; see [`ExecutionOutcome::consensus_error`].
    pub fn transition_db(self) -> Result<ExecutionOutcome, TransitionError> {
        let Self {
            env,
            action,
            action_index,
            gas_price,
            gas_pool,
            state,
        } = self;
        let from = &action.from;
        let fee_account = &env.chain.fee_name;

        // 0. nonce
        let nonce = state.get_nonce(from)?;
        if action.nonce > nonce {
            return Err(TransitionError::NonceTooHigh {
                name: from.clone(),
                expected: nonce,
                got: action.nonce,
            });
        }
        if action.nonce < nonce {
            return Err(TransitionError::NonceTooLow {
                name: from.clone(),
                expected: nonce,
                got: action.nonce,
            });
        }

        // 1. buy gas
        let purchased = action.gas_limit;
        let cost = U256::from(purchased)
            .checked_mul(gas_price)
            .ok_or(TransitionError::GasCostOverflow)?;
        let balance = state.get_balance(from, action.asset_id)?;
        if balance < cost {
            return Err(TransitionError::InsufficientBalanceForGas {
                name: from.clone(),
                have: balance,
                want: cost,
            });
        }
        gas_pool.sub_gas(purchased)?;
        state.transfer_asset(from, fee_account, action.asset_id, cost)?;

        // 2. intrinsic gas
        let intrinsic = intrinsic_gas(action, &env.chain.intrinsic)?;
        let mut distribution = GasDistribution::new();
        let (charged_intrinsic, return_data, gas_left, run_gas, vm_err) = if purchased < intrinsic {
            (purchased, Vec::new(), 0, 0, Some(VmError::OutOfGas))
        } else {
            let gas = purchased - intrinsic;

            // 3. dispatch
            let (output, left, result, attributed) = match action.action_type {
                ActionType::CreateContract | ActionType::CallContract => {
                    let tx = TxContext {
                        origin: from.clone(),
                        gas_price,
                        action_index,
                    };
                    let mut evm = Evm::new(env.block, tx, env.vm, &mut *state, env.interrupt);
                    let outcome = if action.action_type == ActionType::CreateContract {
                        evm.create(from, &action.to, action.payload.clone(), gas, action.amount, action.asset_id)
                    } else {
                        evm.call(from, &action.to, action.payload.clone(), gas, action.amount, action.asset_id)
                    };
                    let attributed = evm.take_distribution();
                    (outcome.output, outcome.gas_left, outcome.result, attributed)
                }
                _ => {
                    let snapshot = state.snapshot();
                    let result = state.exec_tx(action).map_err(|err| {
                        state.revert_to_snapshot(snapshot);
                        VmError::from(err)
                    });
                    (Vec::new(), gas, result, GasDistribution::new())
                }
            };

            // 4. attribute execution gas no contract claimed
            let run_gas = gas - left;
            distribution.merge(attributed);
            let unattributed = run_gas as i64 - distribution.total();
            if unattributed > 0 {
                distribution.credit(DistributeKey::Coinbase(env.block.coinbase.clone()), unattributed as u64);
            }
            (intrinsic, output, left, run_gas, result.err())
        };

        // 5. nonce advance
        let next = state.get_nonce(from)? + 1;
        state.set_nonce(from, next)?;

        // 6. refund
        let used = purchased - gas_left;
        let counter = state.get_refund();
        let refund = (used / 2).min(counter);
        state.sub_refund(counter);
        let refunded = gas_left + refund;
        if refunded > 0 {
            let amount = U256::from(refunded)
                .checked_mul(gas_price)
                .ok_or(TransitionError::GasCostOverflow)?;
            state.transfer_asset(fee_account, from, action.asset_id, amount)?;
            gas_pool.add_gas(refunded)?;
        }
        let gas_used = purchased - refunded;
        let from_run = refund.min(run_gas);
        let net_run = run_gas - from_run;
        let net_intrinsic = charged_intrinsic - (refund - from_run);

        // 7. distribution
        distribution.credit(DistributeKey::Coinbase(env.block.coinbase.clone()), charged_intrinsic);
        distribution.absorb(refund);
        state.distribute_gas(fee_account, &distribution, gas_price, action.asset_id)?;

        if let Some(err) = &vm_err {
            trace!(from = %from, action = ?action.action_type, error = %err, gas_used, "action failed");
        }

        Ok(ExecutionOutcome {
            return_data,
            gas_used,
            failed: vm_err.is_some(),
            vm_err,
            intrinsic_gas: net_intrinsic,
            run_gas: net_run,
            refunded_gas: refunded,
            storage_refund: refund,
            distribution,
        })
    }
}
