//! # State Processor
//!
//! Replays the transactions of a block on top of its parent state and produces
//! the receipts. Shared with block production through [`apply_transaction`].

use std::sync::Arc;

use nc_vm::domain::context::BLOCKHASH_WINDOW;
use nc_vm::{BlockContext, ExecutionState, Interrupt, VmConfig};
use shared_types::{ActionResult, ActionStatus, Block, Bloom, Header, Log, Receipt, Transaction};
use tracing::{debug, instrument};

use super::transition::{StateTransition, TransitionEnv};
use crate::error::{ChainError, TransitionError};
use crate::gas_pool::GasPool;
use crate::ports::{ChainReader, ConsensusEngine};

/// Receipts, logs and gas of a processed block.
#[derive(Debug, Clone, Default)]
pub struct ProcessOutput {
    /// One receipt per transaction.
    pub receipts: Vec<Receipt>,
    /// All logs of the block in emission order.
    pub logs: Vec<Log>,
    /// Total gas used.
    pub gas_used: u64,
}

/// VM context for executing on top of `header`'s parent.
///
/// Ancestor hashes are collected parent first, as far back as BLOCKHASH can
/// reach or until the chain runs out.
pub fn block_context(chain: &dyn ChainReader, header: &Header) -> BlockContext {
    let mut ancestors = Vec::new();
    let mut hash = header.parent_hash;
    let mut number = header.number;
    while number > 0 && (ancestors.len() as u64) < BLOCKHASH_WINDOW {
        number -= 1;
        ancestors.push(hash);
        match chain.get_header(&hash, number) {
            Some(parent) => hash = parent.parent_hash,
            None => break,
        }
    }
    BlockContext {
        coinbase: header.coinbase.clone(),
        number: header.number,
        time: header.time,
        difficulty: header.difficulty,
        gas_limit: header.gas_limit,
        fork_id: header.fork_id.cur,
        ancestor_hashes: Arc::new(ancestors),
    }
}

/// Apply every action of `tx` and build its receipt.
///
/// The caller must have called `state.prepare(tx_hash, index)`. A
/// consensus-significant execution error fails the transaction; on any error
/// the state is left partially modified and must be reverted by the caller.
pub fn apply_transaction(
    env: TransitionEnv<'_>,
    gas_pool: &mut GasPool,
    state: &mut dyn ExecutionState,
    tx: &Transaction,
    used_gas: &mut u64,
) -> Result<Receipt, TransitionError> {
    let tx_hash = tx.hash();
    let mut total_gas_used = 0u64;
    let mut action_results = Vec::with_capacity(tx.actions.len());

    for (index, action) in tx.actions.iter().enumerate() {
        let index = index as u32;
        let outcome = StateTransition::new(env, action, tx.gas_price, &mut *gas_pool, &mut *state)
            .with_action_index(index)
            .transition_db()?;
        if let Some(err) = outcome.consensus_error() {
            return Err(TransitionError::Vm(err.clone()));
        }

        total_gas_used += outcome.gas_used;
        action_results.push(ActionResult {
            status: if outcome.failed {
                ActionStatus::Failed
            } else {
                ActionStatus::Successful
            },
            index,
            gas_used: outcome.gas_used,
            gas_allot: outcome.distribution.to_allots(),
            error: outcome.vm_err.map(|e| e.to_string()).unwrap_or_default(),
        });
    }

    *used_gas += total_gas_used;
    let logs = state.get_logs(&tx_hash);
    Ok(Receipt {
        post_state: state.intermediate_root(),
        cumulative_gas_used: *used_gas,
        action_results,
        bloom: Bloom::from_logs(&logs),
        logs,
        tx_hash,
        total_gas_used,
    })
}

/// Block replay against a consensus engine.
pub struct StateProcessor {
    engine: Arc<dyn ConsensusEngine>,
    vm: VmConfig,
}

impl StateProcessor {
    /// Create a processor finalizing through `engine`.
    pub fn new(engine: Arc<dyn ConsensusEngine>, vm: VmConfig) -> Self {
        Self { engine, vm }
    }

    /// VM parameters used for every block.
    pub fn vm_config(&self) -> &VmConfig {
        &self.vm
    }

    /// Execute `block` on `state`, which must be the parent's post state.
    #[instrument(skip_all, fields(number = block.header.number))]
    pub fn process(
        &self,
        chain: &dyn ChainReader,
        block: &Block,
        state: &mut dyn ExecutionState,
        interrupt: &Interrupt,
    ) -> Result<ProcessOutput, ChainError> {
        let header = &block.header;
        let context = block_context(chain, header);
        let env = TransitionEnv {
            chain: chain.config(),
            vm: &self.vm,
            block: &context,
            interrupt,
        };

        let mut gas_pool = GasPool::new();
        gas_pool.add_gas(header.gas_limit)?;
        let mut output = ProcessOutput::default();

        for (index, tx) in block.transactions.iter().enumerate() {
            state.prepare(tx.hash(), index as u32);
            let receipt = apply_transaction(env, &mut gas_pool, &mut *state, tx, &mut output.gas_used)
                .map_err(|source| ChainError::Transaction { index, source })?;
            output.logs.extend(receipt.logs.iter().cloned());
            output.receipts.push(receipt);
        }

        self.engine.finalize(
            chain,
            header.clone(),
            block.transactions.clone(),
            &output.receipts,
            state,
        )?;

        debug!(
            number = header.number,
            txs = block.transactions.len(),
            gas_used = output.gas_used,
            "processed block"
        );
        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::mocks::{name, transfer_tx, MockChain, MockEngine};
    use nc_vm::{AccountManager, StateDb};
    use primitive_types::U256;

    #[test]
    fn test_block_context_ancestors() {
        let chain = MockChain::with_blocks(3);
        let head = chain.current_header();
        let mut child = head.clone();
        child.parent_hash = head.hash();
        child.number = head.number + 1;

        let ctx = block_context(&chain, &child);
        assert_eq!(ctx.number, 4);
        assert_eq!(ctx.ancestor_hashes.len(), 4);
        assert_eq!(ctx.block_hash(3), head.hash());
        assert_eq!(ctx.block_hash(0), chain.genesis_hash());
    }

    #[test]
    fn test_apply_transaction_receipt() {
        let chain = MockChain::new();
        let mut state = chain.genesis_state();
        let tx = transfer_tx("alice", "bob", U256::from(7), 0, 21);
        let context = block_context(&chain, &chain.child_header());
        let (vm, interrupt) = (VmConfig::default(), Interrupt::new());
        let env = TransitionEnv {
            chain: chain.config(),
            vm: &vm,
            block: &context,
            interrupt: &interrupt,
        };
        let mut pool = GasPool::new();
        pool.add_gas(1_000_000).unwrap();
        let mut used = 100;

        state.prepare(tx.hash(), 0);
        let receipt = apply_transaction(env, &mut pool, &mut *state, &tx, &mut used).unwrap();
        assert!(receipt.is_success());
        assert_eq!(receipt.total_gas_used, 21);
        assert_eq!(receipt.cumulative_gas_used, 121);
        assert_eq!(used, 121);
        assert_eq!(receipt.tx_hash, tx.hash());
        assert_eq!(receipt.post_state, state.intermediate_root());
        assert_eq!(receipt.action_results[0].gas_allot.len(), 1);
        assert_eq!(state.get_balance(&name("bob"), 0).unwrap(), U256::from(1_000_007));
    }

    #[test]
    fn test_process_accumulates_gas() {
        let chain = MockChain::new();
        let engine = Arc::new(MockEngine::default());
        let processor = StateProcessor::new(engine.clone(), VmConfig::default());
        let txs = vec![
            transfer_tx("alice", "bob", U256::from(1), 0, 21),
            transfer_tx("alice", "bob", U256::from(1), 1, 21),
        ];
        let block = chain.build_child(engine.as_ref(), txs);

        let mut state = chain.genesis_state();
        let out = processor.process(&chain, &block, &mut *state, &Interrupt::new()).unwrap();
        assert_eq!(out.receipts.len(), 2);
        assert_eq!(out.gas_used, 42);
        assert_eq!(out.receipts[1].cumulative_gas_used, 42);
        assert_eq!(state.intermediate_root(), block.header.state_root);
    }

    #[test]
    fn test_process_rejects_bad_nonce() {
        let chain = MockChain::new();
        let engine = Arc::new(MockEngine::default());
        let processor = StateProcessor::new(engine.clone(), VmConfig::default());
        let mut block = chain.build_child(engine.as_ref(), vec![transfer_tx("alice", "bob", U256::one(), 0, 21)]);
        block.transactions.push(transfer_tx("alice", "bob", U256::one(), 5, 21));

        let mut state = chain.genesis_state();
        let err = processor.process(&chain, &block, &mut *state, &Interrupt::new()).unwrap_err();
        match err {
            ChainError::Transaction { index, source } => {
                assert_eq!(index, 1);
                assert!(source.is_nonce_too_high());
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_process_rejects_consensus_vm_error() {
        let chain = MockChain::new();
        let engine = Arc::new(MockEngine::default());
        let processor = StateProcessor::new(engine.clone(), VmConfig::default());
        let mut block = chain.build_child(engine.as_ref(), vec![]);
        block.transactions.push(transfer_tx("alice", "bob", U256::from(u64::MAX), 0, 21));

        let mut state = chain.genesis_state();
        let err = processor.process(&chain, &block, &mut *state, &Interrupt::new()).unwrap_err();
        assert!(matches!(
            err.transition(),
            Some(TransitionError::Vm(nc_vm::VmError::InsufficientBalance))
        ));
    }
}
