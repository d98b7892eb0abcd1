//! Shared builders for the scenarios.

use std::sync::Arc;
use std::time::Duration;

use nc_block_production::{Clock, Worker};
use nc_chain::{ChainReader, GasPool, TransitionEnv};
use nc_vm::{AccountManager, BlockContext, ExecutionState, Interrupt, StateDb, VmConfig};
use node_runtime::genesis::{GenesisAlloc, GenesisBuilder};
use node_runtime::{NodeConfig, NodeContainer};
use primitive_types::U256;
use shared_types::{Action, ActionType, Block, Name, Transaction};

/// `JUMPDEST PUSH1 0 JUMP`: spins until the gas or the interrupt runs out.
pub const LOOP_CODE: [u8; 4] = [0x5b, 0x60, 0x00, 0x56];

/// Contract preinstalled by [`node_with_looper`].
pub const LOOPER: &str = "looper";

/// `PUSH1 0 SLOAD ISZERO PUSH1 0 SSTORE STOP`: flips slot 0 between 0 and 1,
/// so every second call clears it and earns the SSTORE refund.
pub const TOGGLE_CODE: [u8; 8] = [0x60, 0x00, 0x54, 0x15, 0x60, 0x00, 0x55, 0x00];

/// Contract preinstalled by [`node_with_looper`] next to [`LOOPER`].
pub const TOGGLER: &str = "toggler";

/// Balance of every funded account.
pub const FUNDS: u64 = 1_000_000_000_000;

/// Gas target used by nodes that run the loop contract.
pub const BIG_GAS: u64 = 1_000_000_000;

pub fn name(s: &str) -> Name {
    Name::new(s).unwrap()
}

/// Init code returning [`LOOP_CODE`] as the runtime code.
pub fn loop_init_code() -> Vec<u8> {
    // PUSH4 code PUSH1 0 MSTORE PUSH1 4 PUSH1 28 RETURN
    let mut code = vec![0x63];
    code.extend_from_slice(&LOOP_CODE);
    code.extend_from_slice(&[0x60, 0x00, 0x52, 0x60, 0x04, 0x60, 0x1c, 0xf3]);
    code
}

/// Node config with a fixed genesis time of zero, funded `alice` and `bob`,
/// and `producers` rotating every `interval_ms`. The miner runs as the first
/// producer and never waits for a late parent.
pub fn node_config(producers: &[&str], interval_ms: u64) -> NodeConfig {
    let mut config = NodeConfig::default();
    config.block_interval_ms = interval_ms;
    config.genesis.timestamp = Some(0);
    config.genesis.producers = producers.iter().map(|p| name(p)).collect();
    config.genesis.alloc = ["alice", "bob"]
        .iter()
        .map(|account| GenesisAlloc {
            name: name(account),
            balance: U256::from(FUNDS),
        })
        .collect();
    config.miner.coinbase = name(producers[0]);
    config.miner.parent_wait = Duration::ZERO;
    config
}

/// Raise the genesis gas limit and the miner's target to [`BIG_GAS`].
pub fn with_big_gas(mut config: NodeConfig) -> NodeConfig {
    config.genesis.gas_limit = BIG_GAS;
    config.miner.gas_floor = BIG_GAS;
    config.miner.gas_ceil = BIG_GAS;
    config
}

/// Node whose genesis already holds [`LOOP_CODE`] at [`LOOPER`] and
/// [`TOGGLE_CODE`] at [`TOGGLER`], both founded by the system account.
pub fn node_with_looper(config: NodeConfig) -> NodeContainer {
    node_with_contracts(config, &[(LOOPER, &LOOP_CODE), (TOGGLER, &TOGGLE_CODE)])
}

/// Node whose genesis holds each `(name, code)` contract.
pub fn node_with_contracts(config: NodeConfig, contracts: &[(&str, &[u8])]) -> NodeContainer {
    let mut genesis = GenesisBuilder::new(&config.chain, config.genesis.clone())
        .build()
        .unwrap();
    let founder = config.chain.sys_name.clone();
    for (contract, code) in contracts {
        genesis.state.create_account(&name(contract), &founder).unwrap();
        genesis.state.set_code(&name(contract), code.to_vec()).unwrap();
    }

    let mut header = genesis.block.header.clone();
    header.state_root = genesis.state.intermediate_root();
    genesis.block = Block::new(header, Vec::new(), &[], config.chain.merkle_tx_root_fork);
    NodeContainer::with_genesis(config, genesis).unwrap()
}

/// Worker over the node's chain, engine and pool, reading `clock`.
pub fn worker(node: &NodeContainer, clock: Clock) -> Worker {
    Worker::new(
        node.chain.clone(),
        node.engine.clone(),
        node.pool.clone(),
        node.head_tx.clone(),
        node.config.miner.clone(),
    )
    .with_clock(clock)
}

pub fn fixed_clock(now: u64) -> Clock {
    Arc::new(move || now)
}

/// Call into [`LOOPER`] from `from` with `gas_limit`, priced at 1.
pub fn loop_call(from: &str, nonce: u64, gas_limit: u64) -> Transaction {
    Transaction::new(vec![call_action(from, LOOPER, nonce, gas_limit)], U256::one())
}

/// Value-free contract call action.
pub fn call_action(from: &str, contract: &str, nonce: u64, gas_limit: u64) -> Action {
    let mut action = Action::transfer(name(from), name(contract), 0, U256::zero(), nonce, gas_limit);
    action.action_type = ActionType::CallContract;
    action
}

/// Deploy `init_code` to `target`, priced at 1.
pub fn create_tx(from: &str, target: &str, init_code: Vec<u8>, amount: u64, nonce: u64, gas_limit: u64) -> Transaction {
    let mut action = Action::transfer(name(from), name(target), 0, U256::from(amount), nonce, gas_limit);
    action.action_type = ActionType::CreateContract;
    action.payload = init_code;
    Transaction::new(vec![action], U256::one())
}

pub fn transfer(from: &str, to: &str, amount: u64, nonce: u64) -> Transaction {
    Transaction::new(
        vec![Action::transfer(name(from), name(to), 0, U256::from(amount), nonce, 21_000)],
        U256::one(),
    )
}

/// Block context for executing on top of the node's head.
pub fn head_context(node: &NodeContainer, coinbase: &str) -> BlockContext {
    let parent = node.chain.current_header();
    BlockContext {
        coinbase: name(coinbase),
        number: parent.number + 1,
        time: parent.time + node.config.block_interval_ms,
        difficulty: U256::one(),
        gas_limit: parent.gas_limit,
        fork_id: parent.fork_id.cur,
        ancestor_hashes: Arc::new(vec![parent.hash()]),
    }
}

/// Run `f` with a transition environment over the node's chain config.
pub fn with_env<R>(
    node: &NodeContainer,
    context: &BlockContext,
    interrupt: &Interrupt,
    f: impl FnOnce(TransitionEnv<'_>) -> R,
) -> R {
    let vm = VmConfig::default();
    f(TransitionEnv {
        chain: node.chain.config(),
        vm: &vm,
        block: context,
        interrupt,
    })
}

/// Post state of the node's head.
pub fn head_state(node: &NodeContainer) -> Box<dyn ExecutionState> {
    node.chain.state_at(&node.chain.current_header().state_root).unwrap()
}

pub fn gas_pool(gas: u64) -> GasPool {
    let mut pool = GasPool::new();
    pool.add_gas(gas).unwrap();
    pool
}
