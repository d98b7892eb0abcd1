//! Block import service.
//!
//! Runs the full acceptance pipeline for blocks received from peers:
//! body and ancestry checks, header checks, execution on the parent state,
//! post-state checks, the chain write and the head notification.

use std::sync::Arc;

use nc_vm::{Interrupt, VmConfig};
use shared_types::{short_hex, Block, Hash};
use tokio::sync::broadcast;
use tracing::{debug, info, instrument};

use crate::domain::processor::StateProcessor;
use crate::domain::validator::BlockValidator;
use crate::error::{BlockValidationError, ChainError, Result};
use crate::events::{ChainHeadEvent, HeadSender};
use crate::ports::{ChainReader, ConsensusEngine};

/// Result of a successful import.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportOutcome {
    /// The block was executed and written.
    Inserted {
        /// Block hash.
        hash: Hash,
        /// Block height.
        number: u64,
        /// True if the block became the canonical head.
        canonical: bool,
    },
    /// The block and its state were already present.
    AlreadyKnown {
        /// Block hash.
        hash: Hash,
        /// Block height.
        number: u64,
    },
}

/// Validates, executes and writes blocks from the network.
pub struct BlockImporter {
    chain: Arc<dyn ChainReader>,
    processor: StateProcessor,
    validator: BlockValidator,
    head_tx: HeadSender,
}

impl BlockImporter {
    /// Create an importer writing to `chain` and announcing heads on `head_tx`.
    pub fn new(
        chain: Arc<dyn ChainReader>,
        engine: Arc<dyn ConsensusEngine>,
        vm: VmConfig,
        head_tx: HeadSender,
    ) -> Self {
        info!("[nc-chain] Initializing block importer");
        Self {
            chain,
            processor: StateProcessor::new(Arc::clone(&engine), vm),
            validator: BlockValidator::new(engine),
            head_tx,
        }
    }

    /// New receiver of head events.
    pub fn subscribe(&self) -> broadcast::Receiver<ChainHeadEvent> {
        self.head_tx.subscribe()
    }

    /// Import `block` against the local wall clock.
    pub fn insert_block(&self, block: &Block) -> Result<ImportOutcome> {
        self.insert_block_at(block, now_ms())
    }

    /// Import `block`, treating `now_ms` as the local clock.
    #[instrument(skip_all, fields(number = block.number(), hash = %short_hex(&block.hash())))]
    pub fn insert_block_at(&self, block: &Block, now_ms: u64) -> Result<ImportOutcome> {
        let chain = self.chain.as_ref();
        let hash = block.hash();
        let number = block.number();

        let parent = match self.validator.validate_body(chain, block) {
            Ok(parent) => parent,
            Err(BlockValidationError::KnownBlock { .. }) => {
                debug!("block already known");
                return Ok(ImportOutcome::AlreadyKnown { hash, number });
            }
            Err(err) => return Err(err.into()),
        };
        self.validator
            .validate_header(chain, &block.header, &parent, true, now_ms)?;

        let mut state = chain.state_at(&parent.state_root)?;
        let output = self
            .processor
            .process(chain, block, state.as_mut(), &Interrupt::new())?;
        self.validator
            .validate_state(block, state.as_mut(), &output.receipts, output.gas_used)?;

        let canonical = chain.write_block_with_state(block, &output.receipts, state)?;
        chain.fork_update(block)?;

        info!(
            txs = block.transactions.len(),
            gas_used = output.gas_used,
            canonical,
            "imported block"
        );
        if canonical && self.head_tx.send(ChainHeadEvent::from_block(block)).is_err() {
            debug!("no head subscribers");
        }
        Ok(ImportOutcome::Inserted {
            hash,
            number,
            canonical,
        })
    }
}

/// Unix time in milliseconds.
pub fn now_ms() -> u64 {
    u64::try_from(chrono::Utc::now().timestamp_millis()).unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::head_channel;
    use crate::ports::mocks::{transfer_tx, MockChain, MockEngine};
    use primitive_types::U256;

    fn importer() -> (Arc<MockChain>, Arc<MockEngine>, BlockImporter) {
        let chain = Arc::new(MockChain::new());
        let engine = Arc::new(MockEngine::default());
        let (head_tx, _) = head_channel();
        let importer = BlockImporter::new(chain.clone(), engine.clone(), VmConfig::default(), head_tx);
        (chain, engine, importer)
    }

    #[test]
    fn test_import_then_already_known() {
        let (chain, engine, importer) = importer();
        let mut heads = importer.subscribe();
        let block = chain.build_child(&engine, vec![transfer_tx("alice", "bob", U256::from(5), 0, 21)]);

        let outcome = importer.insert_block_at(&block, 1_000_000).unwrap();
        assert_eq!(
            outcome,
            ImportOutcome::Inserted {
                hash: block.hash(),
                number: 1,
                canonical: true
            }
        );
        assert_eq!(chain.current_header().hash(), block.hash());
        assert_eq!(heads.try_recv().unwrap(), ChainHeadEvent::from_block(&block));

        let again = importer.insert_block_at(&block, 1_000_000).unwrap();
        assert!(matches!(again, ImportOutcome::AlreadyKnown { number: 1, .. }));
        assert!(heads.try_recv().is_err());
    }

    #[test]
    fn test_bad_state_root_rejected() {
        let (chain, engine, importer) = importer();
        let genesis = chain.current_header().hash();
        let mut block = chain.build_child(&engine, vec![transfer_tx("alice", "bob", U256::from(5), 0, 21)]);
        block.header.state_root = [1u8; 32];

        let err = importer.insert_block_at(&block, 1_000_000).unwrap_err();
        assert!(matches!(
            err,
            ChainError::Validation(BlockValidationError::StateRootMismatch { .. })
        ));
        assert_eq!(chain.current_header().hash(), genesis);
    }

    #[test]
    fn test_future_block_rejected() {
        let (chain, engine, importer) = importer();
        let mut block = chain.build_child(&engine, vec![]);
        block.header.time = 20_000;
        let err = importer.insert_block_at(&block, 0).unwrap_err();
        assert!(matches!(
            err,
            ChainError::Validation(BlockValidationError::FutureBlock { .. })
        ));
    }

    #[test]
    fn test_invalid_transaction_fails_import() {
        let (chain, engine, importer) = importer();
        let mut block = chain.build_child(&engine, vec![]);
        block.transactions.push(transfer_tx("alice", "bob", U256::one(), 7, 21));
        block.header.tx_root = shared_types::derive_tx_root(
            &block.transactions,
            block.header.fork_id.cur,
            chain.config().merkle_tx_root_fork,
        );
        let err = importer.insert_block_at(&block, 1_000_000).unwrap_err();
        assert_eq!(err.transition().map(|e| e.is_nonce_too_high()), Some(true));
    }
}
