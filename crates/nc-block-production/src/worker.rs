//! # Mint Worker
//!
//! Slot-timed block builder. One loop task owns the slot timer and listens
//! for chain heads; every slot boundary starts one build attempt on the
//! blocking pool, after the previous attempt has exited.
//!
//! ## Attempt Lifecycle
//!
//! ```text
//! waiting-for-slot ──▶ guards ──▶ open work ──▶ admit txs ──▶ finalize ──▶ seal ──▶ write ──▶ publish
//!                        │                          │
//!                        └─ skip / retry            └─ preempted by a foreign head
//! ```
//!
//! Admission stops at `end_time`, which keeps the last two fifths of the slot
//! for sealing and propagation.

use std::sync::Arc;
use std::time::{Duration, Instant};

use nc_chain::{
    apply_transaction, block_context, ChainHeadEvent, ChainReader, ConsensusEngine, GasPool, HeadSender,
    TransitionEnv,
};
use nc_vm::{ExecutionState, Interrupt, StateDb, VmConfig};
use parking_lot::{Mutex, RwLock};
use shared_types::{short_hex, Block, Bloom, ForkId, Header, Receipt, Transaction, EMPTY_HASH};
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, instrument, trace, warn};

use crate::config::{MinerConfig, MinerSettings};
use crate::domain::{calc_gas_limit, end_time, next_slot, TransactionsByPriceAndNonce};
use crate::error::{MintError, Result, WaitError, WorkerError};
use crate::events::{MinerEvent, MinerEventSender, MINER_EVENT_CAPACITY};
use crate::metrics::Metrics;
use crate::ports::TxSource;

/// Source of the local time in unix milliseconds.
pub type Clock = Arc<dyn Fn() -> u64 + Send + Sync>;

/// A block under construction. Exclusively owned by one attempt.
struct Work {
    header: Header,
    state: Box<dyn ExecutionState>,
    gas_pool: GasPool,
    txs: Vec<Transaction>,
    receipts: Vec<Receipt>,
}

/// Block producer for the local coinbase.
pub struct Worker {
    chain: Arc<dyn ChainReader>,
    engine: Arc<dyn ConsensusEngine>,
    tx_source: Arc<dyn TxSource>,
    vm: VmConfig,
    config: MinerConfig,
    settings: RwLock<MinerSettings>,
    metrics: Metrics,
    events: MinerEventSender,
    head_tx: HeadSender,
    current: Mutex<Option<Interrupt>>,
    clock: Clock,
}

impl Worker {
    /// Create a worker producing on `chain` with transactions from `tx_source`.
    pub fn new(
        chain: Arc<dyn ChainReader>,
        engine: Arc<dyn ConsensusEngine>,
        tx_source: Arc<dyn TxSource>,
        head_tx: HeadSender,
        config: MinerConfig,
    ) -> Self {
        let (events, _) = broadcast::channel(MINER_EVENT_CAPACITY);
        Self {
            chain,
            engine,
            tx_source,
            vm: VmConfig::default(),
            settings: RwLock::new(MinerSettings::from(&config)),
            config,
            metrics: Metrics::new(),
            events,
            head_tx,
            current: Mutex::new(None),
            clock: Arc::new(nc_chain::now_ms),
        }
    }

    /// Replace the wall clock.
    #[must_use]
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    /// Replace the VM configuration.
    #[must_use]
    pub fn with_vm_config(mut self, vm: VmConfig) -> Self {
        self.vm = vm;
        self
    }

    /// Mutable producer settings.
    pub fn settings(&self) -> &RwLock<MinerSettings> {
        &self.settings
    }

    /// Static configuration.
    pub fn config(&self) -> &MinerConfig {
        &self.config
    }

    /// Production counters.
    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    /// Sender of miner events.
    pub fn events(&self) -> &MinerEventSender {
        &self.events
    }

    /// New receiver of miner events.
    pub fn subscribe(&self) -> broadcast::Receiver<MinerEvent> {
        self.events.subscribe()
    }

    /// Register the interrupt of a new attempt so head events can cancel it.
    pub fn begin_attempt(&self) -> Interrupt {
        let interrupt = Interrupt::new();
        *self.current.lock() = Some(interrupt.clone());
        interrupt
    }

    /// Cancel the in-flight attempt if the new head was produced by someone
    /// else.
    pub fn on_chain_head(&self, event: &ChainHeadEvent) {
        if event.coinbase == self.settings.read().coinbase {
            return;
        }
        if let Some(interrupt) = self.current.lock().as_ref() {
            debug!(number = event.number, producer = %event.coinbase, "new head, preempting build");
            interrupt.cancel();
        }
    }

    // =========================================================================
    // LOOP
    // =========================================================================

    /// Slot loop. Exits when `quit` flips to true or its sender is dropped.
    pub async fn run(self: Arc<Self>, mut quit: watch::Receiver<bool>) {
        let mut heads = self.head_tx.subscribe();
        let mut attempt: Option<JoinHandle<()>> = None;
        info!("[nc-block-production] worker loop started");

        loop {
            let interval = self.engine.block_interval_ms();
            let now = (self.clock)();
            let slot = next_slot(now, interval);
            let timer = tokio::time::sleep(Duration::from_millis(slot - now));

            tokio::select! {
                () = timer => {
                    if let Some(previous) = attempt.take() {
                        if let Err(err) = previous.await {
                            error!(error = %err, "build attempt task failed");
                        }
                    }
                    let interrupt = self.begin_attempt();
                    attempt = Some(tokio::spawn(Arc::clone(&self).mint(slot, interrupt)));
                }
                event = heads.recv() => match event {
                    Ok(event) => self.on_chain_head(&event),
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        debug!(skipped, "head events lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                },
                changed = quit.changed() => {
                    if changed.is_err() || *quit.borrow() {
                        break;
                    }
                }
            }
        }

        if let Some(interrupt) = self.current.lock().take() {
            interrupt.cancel();
        }
        if let Some(previous) = attempt {
            if let Err(err) = previous.await {
                error!(error = %err, "build attempt task failed");
            }
        }
        info!("[nc-block-production] worker loop stopped");
    }

    /// One slot: run the build on the blocking pool, retrying while the
    /// previous slot's block is still expected.
    async fn mint(self: Arc<Self>, slot: u64, interrupt: Interrupt) {
        self.metrics.record_attempt();
        let mut retries = 0;
        loop {
            let worker = Arc::clone(&self);
            let stop = interrupt.clone();
            let result = tokio::task::spawn_blocking(move || worker.commit_new_work(slot, &stop)).await;
            match result {
                Ok(Ok(Some(_))) => break,
                Ok(Ok(None)) => {
                    self.metrics.record_skipped();
                    break;
                }
                Ok(Err(WorkerError::Wait(err))) if retries < self.config.max_mint_retries => {
                    debug!(slot, retries, %err, "retrying in slot");
                    retries += 1;
                    tokio::time::sleep(self.config.mint_retry).await;
                }
                Ok(Err(WorkerError::Mint(MintError::Preempted))) => {
                    debug!(slot, "build preempted");
                    self.metrics.record_preempted();
                    break;
                }
                Ok(Err(err)) if err.is_expected() => {
                    debug!(slot, %err, "slot skipped");
                    self.metrics.record_skipped();
                    break;
                }
                Ok(Err(err @ WorkerError::Write(_))) => {
                    error!(slot, %err, "failed to write mined block");
                    self.metrics.record_failed();
                    break;
                }
                Ok(Err(err)) => {
                    warn!(slot, %err, "aborted slot");
                    self.metrics.record_failed();
                    break;
                }
                Err(err) => {
                    error!(slot, error = %err, "build attempt panicked");
                    self.metrics.record_failed();
                    break;
                }
            }
        }
        self.current.lock().take();
    }

    // =========================================================================
    // BUILD ATTEMPT
    // =========================================================================

    /// Build, seal and write the block of `slot`.
    ///
    /// Returns `Ok(None)` when the local producer is not eligible for the
    /// slot. Blocking: call from a blocking thread.
    #[instrument(skip(self, interrupt))]
    pub fn commit_new_work(&self, slot: u64, interrupt: &Interrupt) -> Result<Option<Block>> {
        let chain = self.chain.as_ref();
        let interval = self.engine.block_interval_ms();
        let now = (self.clock)();

        if now >= slot + interval {
            return Err(MintError::SlotPassed { slot, now }.into());
        }
        let end = end_time(slot, interval);
        if now >= end {
            return Err(MintError::DeadlinePassed { end, now }.into());
        }
        let parent = chain.current_header();
        if parent.time >= slot {
            return Err(MintError::ParentNotBefore {
                parent: parent.time,
                slot,
            }
            .into());
        }
        let parent_wait = u64::try_from(self.config.parent_wait.as_millis()).unwrap_or(u64::MAX);
        if parent.time + interval < slot && now < slot.saturating_add(parent_wait) {
            return Err(WaitError::MissingParent {
                number: parent.number,
                time: parent.time,
                slot,
            }
            .into());
        }

        let settings = self.settings.read().clone();
        if !self.engine.is_eligible(chain, &parent, &settings.coinbase, slot) {
            debug!(coinbase = %settings.coinbase, "not eligible for slot");
            return Ok(None);
        }

        let mut work = self.open_work(&parent, slot, &settings)?;
        let stop = interrupt.with_deadline(Instant::now() + Duration::from_millis(end - now));
        self.commit_transactions(&mut work, &stop, end)?;
        self.finalize_and_write(work, &stop)
    }

    fn open_work(&self, parent: &Header, slot: u64, settings: &MinerSettings) -> Result<Work> {
        let chain = self.chain.as_ref();
        let state = chain.state_at(&parent.state_root)?;
        let mut header = Header {
            parent_hash: parent.hash(),
            coinbase: settings.coinbase.clone(),
            proposed_irreversible: 0,
            tx_root: EMPTY_HASH,
            receipt_root: EMPTY_HASH,
            state_root: EMPTY_HASH,
            bloom: Bloom::default(),
            difficulty: self.engine.calc_difficulty(chain, slot, parent),
            number: parent.number + 1,
            gas_limit: calc_gas_limit(parent, self.config.gas_floor, self.config.gas_ceil, chain.config()),
            gas_used: 0,
            time: slot,
            extra: settings.extra.clone(),
            fork_id: ForkId::default(),
            sign: Vec::new(),
        };
        chain.fill_fork_id(&mut header, parent);
        self.engine
            .prepare(chain, &mut header)
            .map_err(WorkerError::Consensus)?;

        let mut gas_pool = GasPool::new();
        gas_pool
            .add_gas(header.gas_limit)
            .map_err(|err| WorkerError::Chain(err.into()))?;
        Ok(Work {
            header,
            state,
            gas_pool,
            txs: Vec::new(),
            receipts: Vec::new(),
        })
    }

    /// Admission loop. Never retries a transaction within the build.
    fn commit_transactions(&self, work: &mut Work, interrupt: &Interrupt, end: u64) -> Result<()> {
        let chain = self.chain.as_ref();
        let config = chain.config();
        let context = block_context(chain, &work.header);
        let env = TransitionEnv {
            chain: config,
            vm: &self.vm,
            block: &context,
            interrupt,
        };
        let mut txs = TransactionsByPriceAndNonce::new(self.tx_source.pending());

        loop {
            if interrupt.is_cancelled() {
                return Err(MintError::Preempted.into());
            }
            if work.gas_pool.gas() < config.intrinsic.action_gas {
                trace!(have = work.gas_pool.gas(), "not enough gas for further transactions");
                break;
            }
            if (self.clock)() >= end {
                debug!(included = work.txs.len(), "admission deadline reached");
                break;
            }
            let Some(tx) = txs.peek().cloned() else {
                break;
            };

            let snapshot = work.state.snapshot();
            let pool = work.gas_pool;
            let tx_hash = tx.hash();
            work.state.prepare(tx_hash, work.txs.len() as u32);

            match apply_transaction(env, &mut work.gas_pool, work.state.as_mut(), &tx, &mut work.header.gas_used) {
                Ok(receipt) => {
                    work.txs.push(tx);
                    work.receipts.push(receipt);
                    txs.shift();
                }
                Err(err) => {
                    work.state.revert_to_snapshot(snapshot);
                    work.gas_pool = pool;
                    let hash = short_hex(&tx_hash);
                    if err.is_gas_limit_reached() || err.is_exec_over_time() {
                        trace!(tx = %hash, %err, "dropping sender");
                        txs.pop();
                    } else if err.is_nonce_too_low() {
                        trace!(tx = %hash, %err, "skipping stale transaction");
                        txs.shift();
                    } else if err.is_nonce_too_high() {
                        trace!(tx = %hash, %err, "skipping sender with nonce gap");
                        txs.pop();
                    } else {
                        warn!(tx = %hash, %err, "transaction failed");
                        txs.shift();
                    }
                }
            }
        }
        Ok(())
    }

    fn finalize_and_write(&self, work: Work, interrupt: &Interrupt) -> Result<Option<Block>> {
        let chain = self.chain.as_ref();
        let Work {
            header,
            mut state,
            txs,
            mut receipts,
            ..
        } = work;

        let block = self
            .engine
            .finalize(chain, header, txs, &receipts, state.as_mut())
            .map_err(WorkerError::Consensus)?;
        if interrupt.is_cancelled() {
            return Err(MintError::Preempted.into());
        }
        let block = self.engine.seal(chain, block, interrupt).map_err(|err| {
            if interrupt.is_cancelled() {
                WorkerError::Mint(MintError::Preempted)
            } else {
                WorkerError::Consensus(err)
            }
        })?;

        let hash = block.hash();
        for receipt in &mut receipts {
            receipt.set_block_hash(hash);
        }
        let canonical = chain
            .write_block_with_state(&block, &receipts, state)
            .map_err(WorkerError::Write)?;

        let tx_count = block.transactions.len();
        info!(
            number = block.number(),
            hash = %short_hex(&hash),
            txs = tx_count,
            gas_used = block.header.gas_used,
            "mined block"
        );
        self.metrics.record_block_mined(tx_count, block.header.gas_used);

        let delay = self.settings.read().delay;
        if !delay.is_zero() {
            std::thread::sleep(delay);
        }
        if self.events.send(MinerEvent::mined(&block)).is_err() {
            trace!("no miner event subscribers");
        }
        if canonical && self.head_tx.send(ChainHeadEvent::from_block(&block)).is_err() {
            trace!("no head subscribers");
        }
        Ok(Some(block))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nc_chain::ports::mocks::{name, transfer_tx, MockChain, MockEngine};
    use nc_chain::{head_channel, BlockImporter, ImportOutcome};
    use primitive_types::U256;
    use shared_types::Name;
    use std::collections::BTreeMap;
    use std::sync::atomic::{AtomicU64, Ordering};

    struct Pool(BTreeMap<Name, Vec<Transaction>>);

    impl TxSource for Pool {
        fn pending(&self) -> BTreeMap<Name, Vec<Transaction>> {
            self.0.clone()
        }
    }

    fn pool(txs: Vec<Transaction>) -> Arc<Pool> {
        let mut pending: BTreeMap<Name, Vec<Transaction>> = BTreeMap::new();
        for tx in txs {
            pending.entry(tx.sender().unwrap().clone()).or_default().push(tx);
        }
        Arc::new(Pool(pending))
    }

    fn fixed(now: u64) -> Clock {
        Arc::new(move || now)
    }

    fn config() -> MinerConfig {
        MinerConfig {
            coinbase: name("producer"),
            parent_wait: Duration::from_millis(500),
            ..MinerConfig::default()
        }
    }

    fn worker(chain: &Arc<MockChain>, engine: MockEngine, txs: Vec<Transaction>, clock: Clock) -> Worker {
        let (head_tx, _) = head_channel();
        Worker::new(chain.clone(), Arc::new(engine), pool(txs), head_tx, config()).with_clock(clock)
    }

    #[test]
    fn test_mints_pending_transactions() {
        let chain = Arc::new(MockChain::new());
        let txs = vec![
            transfer_tx("alice", "bob", U256::from(1), 0, 21),
            transfer_tx("alice", "bob", U256::from(2), 1, 21),
        ];
        let worker = worker(&chain, MockEngine::default(), txs, fixed(3_000));
        let mut events = worker.subscribe();

        let block = worker.commit_new_work(3_000, &Interrupt::new()).unwrap().unwrap();
        assert_eq!(block.number(), 1);
        assert_eq!(block.header.time, 3_000);
        assert_eq!(block.transactions.len(), 2);
        assert_eq!(block.header.gas_used, 42);
        assert_eq!(chain.current_header().hash(), block.hash());
        assert!(matches!(events.try_recv().unwrap(), MinerEvent::NewMinedBlock { number: 1, .. }));
        assert_eq!(worker.metrics().snapshot().blocks_mined, 1);
    }

    #[test]
    fn test_mined_block_imports_on_second_chain() {
        let producer = Arc::new(MockChain::new());
        let txs = vec![transfer_tx("alice", "bob", U256::from(9), 0, 21)];
        let worker = worker(&producer, MockEngine::default(), txs, fixed(3_000));
        let block = worker.commit_new_work(3_000, &Interrupt::new()).unwrap().unwrap();

        let follower = Arc::new(MockChain::new());
        let (head_tx, _) = head_channel();
        let importer = BlockImporter::new(follower.clone(), Arc::new(MockEngine::default()), VmConfig::default(), head_tx);
        let outcome = importer.insert_block_at(&block, 3_000).unwrap();
        assert!(matches!(outcome, ImportOutcome::Inserted { canonical: true, .. }));
        let head = follower.current_header();
        assert_eq!(head.state_root, block.header.state_root);
        assert_eq!(head.receipt_root, block.header.receipt_root);
        assert_eq!(head.tx_root, block.header.tx_root);
    }

    #[test]
    fn test_slot_guards() {
        let chain = Arc::new(MockChain::new());
        let stop = Interrupt::new();

        let late = worker(&chain, MockEngine::default(), vec![], fixed(6_000));
        assert!(matches!(
            late.commit_new_work(3_000, &stop),
            Err(WorkerError::Mint(MintError::SlotPassed { .. }))
        ));

        let after_deadline = worker(&chain, MockEngine::default(), vec![], fixed(4_800));
        assert!(matches!(
            after_deadline.commit_new_work(3_000, &stop),
            Err(WorkerError::Mint(MintError::DeadlinePassed { end: 4_800, .. }))
        ));

        let genesis_slot = worker(&chain, MockEngine::default(), vec![], fixed(0));
        assert!(matches!(
            genesis_slot.commit_new_work(0, &stop),
            Err(WorkerError::Mint(MintError::ParentNotBefore { .. }))
        ));
    }

    #[test]
    fn test_waits_for_missing_parent() {
        let chain = Arc::new(MockChain::new());
        let early = worker(&chain, MockEngine::default(), vec![], fixed(9_100));
        let err = early.commit_new_work(9_000, &Interrupt::new()).unwrap_err();
        assert!(matches!(err, WorkerError::Wait(WaitError::MissingParent { slot: 9_000, .. })));
        assert!(err.is_expected());

        let later = worker(&chain, MockEngine::default(), vec![], fixed(9_600));
        let block = later.commit_new_work(9_000, &Interrupt::new()).unwrap().unwrap();
        assert_eq!(block.header.time, 9_000);
    }

    #[test]
    fn test_not_eligible_skips() {
        let chain = Arc::new(MockChain::new());
        let engine = MockEngine {
            eligible: false,
            ..MockEngine::default()
        };
        let worker = worker(&chain, engine, vec![], fixed(3_000));
        assert!(worker.commit_new_work(3_000, &Interrupt::new()).unwrap().is_none());
        assert_eq!(chain.current_header().number, 0);
    }

    #[test]
    fn test_cancelled_attempt_is_preempted() {
        let chain = Arc::new(MockChain::new());
        let txs = vec![transfer_tx("alice", "bob", U256::one(), 0, 21)];
        let worker = worker(&chain, MockEngine::default(), txs, fixed(3_000));
        let stop = worker.begin_attempt();

        worker.on_chain_head(&ChainHeadEvent {
            hash: [1u8; 32],
            number: 1,
            coinbase: name("rival"),
            time: 3_000,
        });
        assert!(stop.is_cancelled());
        assert!(matches!(
            worker.commit_new_work(3_000, &stop),
            Err(WorkerError::Mint(MintError::Preempted))
        ));
        assert_eq!(chain.current_header().number, 0);
    }

    #[test]
    fn test_own_head_does_not_preempt() {
        let chain = Arc::new(MockChain::new());
        let worker = worker(&chain, MockEngine::default(), vec![], fixed(3_000));
        let stop = worker.begin_attempt();
        worker.on_chain_head(&ChainHeadEvent {
            hash: [1u8; 32],
            number: 1,
            coinbase: name("producer"),
            time: 3_000,
        });
        assert!(!stop.is_cancelled());
    }

    #[test]
    fn test_nonce_gap_and_failures_are_skipped() {
        let chain = Arc::new(MockChain::new());
        let txs = vec![
            transfer_tx("alice", "bob", U256::one(), 4, 21),
            transfer_tx("bob", "alice", U256::from(u64::MAX), 0, 21),
            transfer_tx("bob", "alice", U256::one(), 1, 21),
        ];
        let worker = worker(&chain, MockEngine::default(), txs, fixed(3_000));
        let block = worker.commit_new_work(3_000, &Interrupt::new()).unwrap().unwrap();
        // alice is dropped for the gap; bob's first transfer fails and is
        // skipped, leaving his next nonce too high
        assert!(block.transactions.is_empty());
        assert_eq!(block.header.gas_used, 0);
    }

    #[test]
    fn test_sender_dropped_when_block_gas_runs_out() {
        // block gas limit lands just above 100_000
        let chain = Arc::new(MockChain::with_gas_limit(100_000));
        let txs = vec![
            transfer_tx("alice", "bob", U256::one(), 0, 50_000),
            transfer_tx("alice", "bob", U256::one(), 1, 200_000),
            transfer_tx("alice", "bob", U256::one(), 2, 21),
            transfer_tx("bob", "alice", U256::one(), 0, 21),
        ];
        let worker = worker(&chain, MockEngine::default(), txs, fixed(3_000));
        let block = worker.commit_new_work(3_000, &Interrupt::new()).unwrap().unwrap();

        assert!(block.header.gas_limit < 200_000);
        let included: Vec<_> = block
            .transactions
            .iter()
            .map(|tx| (tx.sender().unwrap().clone(), tx.actions[0].nonce))
            .collect();
        assert_eq!(included.len(), 2);
        assert!(included.contains(&(name("alice"), 0)));
        assert!(included.contains(&(name("bob"), 0)));
        assert_eq!(block.header.gas_used, 42);
    }

    #[test]
    fn test_admission_stops_at_deadline() {
        let chain = Arc::new(MockChain::new());
        let txs = (0..50).map(|n| transfer_tx("alice", "bob", U256::one(), n, 21)).collect();
        let ticks = Arc::new(AtomicU64::new(3_000));
        let clock_ticks = ticks.clone();
        let clock: Clock = Arc::new(move || clock_ticks.fetch_add(100, Ordering::SeqCst));
        let worker = worker(&chain, MockEngine::default(), txs, clock);

        let block = worker.commit_new_work(3_000, &Interrupt::new()).unwrap().unwrap();
        let included = block.transactions.len();
        assert!(included > 0 && included < 50);
        // the last clock read is the one that ended admission
        let last_read = ticks.load(Ordering::SeqCst) - 100;
        assert!(last_read >= 4_800);
        assert!(last_read < 6_000);
    }
}
