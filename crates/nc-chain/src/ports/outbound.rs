//! # Driven Ports (SPI - Outbound)
//!
//! Collaborators the chain core consumes:
//!
//! - [`ChainReader`]: headers, blocks and state views of the local chain, and
//!   the single write path for validated blocks.
//! - [`ConsensusEngine`]: the DPoS engine, treated as a black box.
//! - [`BlockBackend`]: async block access for the gas-price oracle.

use async_trait::async_trait;
use nc_vm::{ExecutionState, Interrupt};
use primitive_types::U256;
use shared_types::{Block, ChainConfig, Hash, Header, Name, Receipt, Transaction};

use crate::error::{BlockValidationError, ChainError};
use crate::fork;

// =============================================================================
// CHAIN READER
// =============================================================================

/// Read access to the local chain plus the block write path.
pub trait ChainReader: Send + Sync {
    /// Chain parameters.
    fn config(&self) -> &ChainConfig;

    /// Header of the canonical head.
    fn current_header(&self) -> Header;

    /// Canonical head block.
    fn current_block(&self) -> Block;

    /// Header by hash and number.
    fn get_header(&self, hash: &Hash, number: u64) -> Option<Header>;

    /// Canonical header at `number`.
    fn get_header_by_number(&self, number: u64) -> Option<Header>;

    /// Block by hash and number.
    fn get_block(&self, hash: &Hash, number: u64) -> Option<Block>;

    /// True if the block and its post state are present.
    fn has_block_and_state(&self, hash: &Hash, number: u64) -> bool;

    /// True if state for `root` is available.
    fn has_state(&self, root: &Hash) -> bool;

    /// Independent state view opened at `root`.
    fn state_at(&self, root: &Hash) -> Result<Box<dyn ExecutionState>, ChainError>;

    /// Persist a validated block with its receipts and post state.
    /// Returns true if the block became the canonical head.
    fn write_block_with_state(
        &self,
        block: &Block,
        receipts: &[Receipt],
        state: Box<dyn ExecutionState>,
    ) -> Result<bool, ChainError>;

    /// Fill the fork ID of a header under construction.
    fn fill_fork_id(&self, header: &mut Header, parent: &Header) {
        fork::fill_fork_id(header, parent, self.config().fork_id);
    }

    /// Check the fork ID of an incoming header.
    fn check_fork_id(&self, header: &Header, parent: &Header) -> Result<(), BlockValidationError> {
        fork::check_fork_id(header, parent, self.config().fork_id)
    }

    /// Record the fork vote of a newly written block.
    fn fork_update(&self, _block: &Block) -> Result<(), ChainError> {
        Ok(())
    }
}

// =============================================================================
// CONSENSUS ENGINE
// =============================================================================

/// Block-production and verification rules of the consensus protocol.
pub trait ConsensusEngine: Send + Sync {
    /// Producer of `header`.
    fn author(&self, header: &Header) -> Result<Name, ChainError>;

    /// Fill consensus fields of a header under construction.
    fn prepare(&self, chain: &dyn ChainReader, header: &mut Header) -> Result<(), ChainError>;

    /// Apply block rewards, compute the state root and assemble the block.
    fn finalize(
        &self,
        chain: &dyn ChainReader,
        header: Header,
        transactions: Vec<Transaction>,
        receipts: &[Receipt],
        state: &mut dyn ExecutionState,
    ) -> Result<Block, ChainError>;

    /// Seal `block`, giving up when `stop` fires.
    fn seal(&self, chain: &dyn ChainReader, block: Block, stop: &Interrupt) -> Result<Block, ChainError>;

    /// Difficulty of a block at `time` on top of `parent`.
    fn calc_difficulty(&self, chain: &dyn ChainReader, time: u64, parent: &Header) -> U256;

    /// Verify the producer seal.
    fn verify_seal(&self, chain: &dyn ChainReader, header: &Header) -> Result<(), ChainError>;

    /// Slot width in milliseconds.
    fn block_interval_ms(&self) -> u64;

    /// True if `coinbase` may produce the block at `slot_ms` on `parent`.
    fn is_eligible(&self, chain: &dyn ChainReader, parent: &Header, coinbase: &Name, slot_ms: u64) -> bool;
}

// =============================================================================
// BLOCK BACKEND
// =============================================================================

/// Async block access for the gas-price oracle.
#[async_trait]
pub trait BlockBackend: Send + Sync {
    /// Current head header.
    async fn head(&self) -> Header;

    /// Canonical block at `number`.
    async fn block_by_number(&self, number: u64) -> Option<Block>;
}

/// In-memory chain and engine doubles for unit tests.
#[cfg(any(test, feature = "test-utils"))]
#[allow(missing_docs, clippy::unwrap_used)]
pub mod mocks {
    use std::collections::HashMap;

    use nc_vm::adapters::MemoryState;
    use nc_vm::{AccountManager, StateDb, VmConfig};
    use parking_lot::RwLock;
    use shared_types::{Action, Bloom, ForkId, IntrinsicGasConfig, EMPTY_HASH};

    use super::*;
    use crate::domain::processor::{apply_transaction, block_context};
    use crate::domain::transition::TransitionEnv;
    use crate::gas_pool::GasPool;

    /// Seal written by [`MockEngine::seal`].
    pub const MOCK_SEAL: &[u8] = b"mock-seal";

    /// Genesis block gas limit.
    pub const GENESIS_GAS_LIMIT: u64 = 10_000_000;

    pub fn name(s: &str) -> Name {
        Name::new(s).unwrap()
    }

    /// Single native-asset transfer priced at 1.
    pub fn transfer_tx(from: &str, to: &str, amount: U256, nonce: u64, gas_limit: u64) -> Transaction {
        Transaction::new(
            vec![Action::transfer(name(from), name(to), 0, amount, nonce, gas_limit)],
            U256::one(),
        )
    }

    pub fn test_config() -> ChainConfig {
        ChainConfig {
            intrinsic: IntrinsicGasConfig {
                action_gas: 21,
                action_gas_call_contract: 21,
                action_gas_create: 53,
                ..IntrinsicGasConfig::default()
            },
            ..ChainConfig::default()
        }
    }

    fn genesis_memory_state(config: &ChainConfig) -> MemoryState {
        let mut state = MemoryState::new();
        for account in ["alice", "bob", "producer"] {
            state.create_account(&name(account), &name(account)).unwrap();
        }
        for account in [&config.sys_name, &config.fee_name, &config.reward_name] {
            state.create_account(account, &config.sys_name).unwrap();
        }
        for account in ["alice", "bob"] {
            state
                .add_balance(&name(account), config.sys_asset_id, U256::from(1_000_000))
                .unwrap();
        }
        state
    }

    #[derive(Default)]
    struct Inner {
        headers: HashMap<Hash, Header>,
        blocks: HashMap<Hash, Block>,
        canonical: Vec<Hash>,
        states: HashMap<Hash, Box<dyn ExecutionState>>,
    }

    /// Chain kept entirely in memory, canonical by arrival.
    pub struct MockChain {
        config: ChainConfig,
        inner: RwLock<Inner>,
    }

    impl MockChain {
        pub fn new() -> Self {
            Self::with_gas_limit(GENESIS_GAS_LIMIT)
        }

        /// Chain whose genesis declares `gas_limit`.
        pub fn with_gas_limit(gas_limit: u64) -> Self {
            let config = test_config();
            let mut state = genesis_memory_state(&config);
            let header = Header {
                parent_hash: EMPTY_HASH,
                coinbase: name("producer"),
                proposed_irreversible: 0,
                tx_root: EMPTY_HASH,
                receipt_root: EMPTY_HASH,
                state_root: state.intermediate_root(),
                bloom: Bloom::default(),
                difficulty: U256::one(),
                number: 0,
                gas_limit,
                gas_used: 0,
                time: 0,
                extra: Vec::new(),
                fork_id: ForkId { cur: 1, next: 1 },
                sign: Vec::new(),
            };
            let genesis = Block::new(header, Vec::new(), &[], config.merkle_tx_root_fork);
            let chain = Self {
                config,
                inner: RwLock::new(Inner::default()),
            };
            chain.insert(genesis, Box::new(state));
            chain
        }

        /// Chain with `count` empty blocks on top of genesis.
        pub fn with_blocks(count: u64) -> Self {
            let chain = Self::new();
            let engine = MockEngine::default();
            for _ in 0..count {
                let (block, _, state) = chain.build_child_with_state(&engine, Vec::new());
                chain.insert(block, state);
            }
            chain
        }

        fn insert(&self, block: Block, state: Box<dyn ExecutionState>) {
            let mut inner = self.inner.write();
            let hash = block.hash();
            inner.headers.insert(hash, block.header.clone());
            inner.states.insert(block.header.state_root, state);
            inner.blocks.insert(hash, block);
            inner.canonical.push(hash);
        }

        /// Forget the post state under `root`, as pruning would.
        pub fn drop_state(&self, root: &Hash) {
            self.inner.write().states.remove(root);
        }

        pub fn genesis_hash(&self) -> Hash {
            self.inner.read().canonical[0]
        }

        /// Post state of genesis.
        pub fn genesis_state(&self) -> Box<dyn ExecutionState> {
            let genesis = self.genesis_hash();
            let root = self.inner.read().headers[&genesis].state_root;
            self.state_at(&root).unwrap()
        }

        /// Unsealed header extending the head by one slot.
        pub fn child_header(&self) -> Header {
            let parent = self.current_header();
            let mut header = Header {
                parent_hash: parent.hash(),
                coinbase: name("producer"),
                proposed_irreversible: 0,
                tx_root: EMPTY_HASH,
                receipt_root: EMPTY_HASH,
                state_root: EMPTY_HASH,
                bloom: Bloom::default(),
                difficulty: U256::one(),
                number: parent.number + 1,
                gas_limit: parent.gas_limit,
                gas_used: 0,
                time: parent.time + 3_000,
                extra: Vec::new(),
                fork_id: ForkId::default(),
                sign: Vec::new(),
            };
            self.fill_fork_id(&mut header, &parent);
            header
        }

        /// Sealed child of the head carrying `txs`, not yet inserted.
        pub fn build_child(&self, engine: &MockEngine, txs: Vec<Transaction>) -> Block {
            self.build_child_with_state(engine, txs).0
        }

        pub fn build_child_with_state(
            &self,
            engine: &MockEngine,
            txs: Vec<Transaction>,
        ) -> (Block, Vec<Receipt>, Box<dyn ExecutionState>) {
            let mut header = self.child_header();
            let mut state = self.state_at(&self.current_header().state_root).unwrap();
            let context = block_context(self, &header);
            let (vm, interrupt) = (VmConfig::default(), Interrupt::new());
            let env = TransitionEnv {
                chain: &self.config,
                vm: &vm,
                block: &context,
                interrupt: &interrupt,
            };
            let mut pool = GasPool::new();
            pool.add_gas(header.gas_limit).unwrap();
            let mut receipts = Vec::new();
            for (index, tx) in txs.iter().enumerate() {
                state.prepare(tx.hash(), index as u32);
                receipts.push(apply_transaction(env, &mut pool, &mut *state, tx, &mut header.gas_used).unwrap());
            }
            let block = engine.finalize(self, header, txs, &receipts, &mut *state).unwrap();
            let block = engine.seal(self, block, &interrupt).unwrap();
            (block, receipts, state)
        }
    }

    impl ChainReader for MockChain {
        fn config(&self) -> &ChainConfig {
            &self.config
        }

        fn current_header(&self) -> Header {
            self.current_block().header
        }

        fn current_block(&self) -> Block {
            let inner = self.inner.read();
            let head = inner.canonical[inner.canonical.len() - 1];
            inner.blocks[&head].clone()
        }

        fn get_header(&self, hash: &Hash, number: u64) -> Option<Header> {
            self.inner
                .read()
                .headers
                .get(hash)
                .filter(|h| h.number == number)
                .cloned()
        }

        fn get_header_by_number(&self, number: u64) -> Option<Header> {
            let inner = self.inner.read();
            let hash = inner.canonical.get(number as usize)?;
            inner.headers.get(hash).cloned()
        }

        fn get_block(&self, hash: &Hash, number: u64) -> Option<Block> {
            self.inner
                .read()
                .blocks
                .get(hash)
                .filter(|b| b.number() == number)
                .cloned()
        }

        fn has_block_and_state(&self, hash: &Hash, number: u64) -> bool {
            self.get_block(hash, number)
                .map_or(false, |b| self.has_state(&b.header.state_root))
        }

        fn has_state(&self, root: &Hash) -> bool {
            self.inner.read().states.contains_key(root)
        }

        fn state_at(&self, root: &Hash) -> Result<Box<dyn ExecutionState>, ChainError> {
            self.inner
                .read()
                .states
                .get(root)
                .map(|s| s.copy())
                .ok_or(ChainError::MissingState(*root))
        }

        fn write_block_with_state(
            &self,
            block: &Block,
            _receipts: &[Receipt],
            state: Box<dyn ExecutionState>,
        ) -> Result<bool, ChainError> {
            self.insert(block.clone(), state);
            Ok(true)
        }
    }

    /// Engine with a fixed difficulty of one. Every producer is eligible
    /// unless `eligible` is cleared.
    pub struct MockEngine {
        pub interval_ms: u64,
        pub eligible: bool,
    }

    impl Default for MockEngine {
        fn default() -> Self {
            Self {
                interval_ms: 3_000,
                eligible: true,
            }
        }
    }

    impl ConsensusEngine for MockEngine {
        fn author(&self, header: &Header) -> Result<Name, ChainError> {
            Ok(header.coinbase.clone())
        }

        fn prepare(&self, chain: &dyn ChainReader, header: &mut Header) -> Result<(), ChainError> {
            let parent = chain
                .get_header(&header.parent_hash, header.number.saturating_sub(1))
                .ok_or(ChainError::MissingHeader {
                    hash: header.parent_hash,
                    number: header.number.saturating_sub(1),
                })?;
            header.difficulty = self.calc_difficulty(chain, header.time, &parent);
            Ok(())
        }

        fn finalize(
            &self,
            chain: &dyn ChainReader,
            mut header: Header,
            transactions: Vec<Transaction>,
            receipts: &[Receipt],
            state: &mut dyn ExecutionState,
        ) -> Result<Block, ChainError> {
            let config = chain.config();
            if !config.block_reward.is_zero() {
                state.transfer_asset(&config.reward_name, &header.coinbase, config.sys_asset_id, config.block_reward)?;
            }
            header.state_root = state.intermediate_root();
            Ok(Block::new(header, transactions, receipts, config.merkle_tx_root_fork))
        }

        fn seal(&self, _chain: &dyn ChainReader, block: Block, stop: &Interrupt) -> Result<Block, ChainError> {
            if stop.is_cancelled() {
                return Err(ChainError::Consensus("seal aborted".into()));
            }
            let mut header = block.header.clone();
            header.sign = MOCK_SEAL.to_vec();
            Ok(block.with_seal(header))
        }

        fn calc_difficulty(&self, _chain: &dyn ChainReader, _time: u64, _parent: &Header) -> U256 {
            U256::one()
        }

        fn verify_seal(&self, _chain: &dyn ChainReader, header: &Header) -> Result<(), ChainError> {
            if header.sign == MOCK_SEAL {
                Ok(())
            } else {
                Err(ChainError::Consensus("bad signature".into()))
            }
        }

        fn block_interval_ms(&self) -> u64 {
            self.interval_ms
        }

        fn is_eligible(&self, _chain: &dyn ChainReader, _parent: &Header, _coinbase: &Name, _slot_ms: u64) -> bool {
            self.eligible
        }
    }
}
