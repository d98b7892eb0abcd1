//! Intrinsic gas: the fixed cost of an action before any execution.

use nc_vm::evm::gas::{safe_add, safe_mul};
use nc_vm::VmError;
use shared_types::{Action, ActionType, IntrinsicGasConfig};

/// Base cost by action type plus the payload byte cost.
pub fn intrinsic_gas(action: &Action, config: &IntrinsicGasConfig) -> Result<u64, VmError> {
    let base = match action.action_type {
        ActionType::CreateContract => config.action_gas_create,
        ActionType::CallContract => config.action_gas_call_contract,
        _ => config.action_gas,
    };
    let non_zero = action.payload.iter().filter(|b| **b != 0).count() as u64;
    let zero = action.payload.len() as u64 - non_zero;
    let data = safe_add(
        safe_mul(non_zero, config.tx_data_non_zero_gas)?,
        safe_mul(zero, config.tx_data_zero_gas)?,
    )?;
    safe_add(base, data)
}
