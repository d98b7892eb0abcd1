//! # In-Memory Chain
//!
//! Headers, blocks, receipts and post states kept in process memory behind a
//! `parking_lot::RwLock`. The head is the highest block; on equal height the
//! first arrival wins.

use std::collections::HashMap;

use async_trait::async_trait;
use nc_chain::{BlockBackend, ChainError, ChainReader};
use nc_vm::ExecutionState;
use parking_lot::RwLock;
use shared_types::{short_hex, Block, ChainConfig, Hash, Header, Receipt};
use tracing::debug;

use crate::genesis::Genesis;

struct Inner {
    headers: HashMap<Hash, Header>,
    blocks: HashMap<Hash, Block>,
    receipts: HashMap<Hash, Vec<Receipt>>,
    states: HashMap<Hash, Box<dyn ExecutionState>>,
    canonical: Vec<Hash>,
    head: Hash,
}

/// Process-local chain store.
pub struct InMemoryChain {
    config: ChainConfig,
    inner: RwLock<Inner>,
}

impl InMemoryChain {
    /// Chain holding only `genesis`.
    pub fn new(config: ChainConfig, genesis: Genesis) -> Self {
        let Genesis { block, state } = genesis;
        let hash = block.hash();
        let mut inner = Inner {
            headers: HashMap::new(),
            blocks: HashMap::new(),
            receipts: HashMap::new(),
            states: HashMap::new(),
            canonical: vec![hash],
            head: hash,
        };
        inner.headers.insert(hash, block.header.clone());
        inner.states.insert(block.header.state_root, Box::new(state));
        inner.receipts.insert(hash, Vec::new());
        inner.blocks.insert(hash, block);
        Self {
            config,
            inner: RwLock::new(inner),
        }
    }

    /// Receipts written with block `hash`.
    pub fn receipts(&self, hash: &Hash) -> Option<Vec<Receipt>> {
        self.inner.read().receipts.get(hash).cloned()
    }

    /// Height of the head.
    pub fn height(&self) -> u64 {
        let inner = self.inner.read();
        inner.headers.get(&inner.head).map_or(0, |h| h.number)
    }

    /// Canonical block at `number`.
    pub fn block_by_number(&self, number: u64) -> Option<Block> {
        let inner = self.inner.read();
        let hash = inner.canonical.get(usize::try_from(number).ok()?)?;
        inner.blocks.get(hash).cloned()
    }

    /// Rebuild the canonical index by walking back from `head`.
    fn set_head(inner: &mut Inner, head: Hash) {
        let mut canonical = Vec::new();
        let mut cursor = Some(head);
        while let Some(hash) = cursor {
            let Some(header) = inner.headers.get(&hash) else {
                break;
            };
            canonical.push(hash);
            cursor = (header.number > 0).then_some(header.parent_hash);
        }
        canonical.reverse();
        inner.canonical = canonical;
        inner.head = head;
    }
}

impl ChainReader for InMemoryChain {
    fn config(&self) -> &ChainConfig {
        &self.config
    }

    fn current_header(&self) -> Header {
        let inner = self.inner.read();
        inner.headers[&inner.head].clone()
    }

    fn current_block(&self) -> Block {
        let inner = self.inner.read();
        inner.blocks[&inner.head].clone()
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
        let hash = inner.canonical.get(usize::try_from(number).ok()?)?;
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
        let inner = self.inner.read();
        inner
            .blocks
            .get(hash)
            .is_some_and(|b| b.number() == number && inner.states.contains_key(&b.header.state_root))
    }

    fn has_state(&self, root: &Hash) -> bool {
        self.inner.read().states.contains_key(root)
    }

    fn state_at(&self, root: &Hash) -> Result<Box<dyn ExecutionState>, ChainError> {
        self.inner
            .read()
            .states
            .get(root)
            .map(|state| state.copy())
            .ok_or(ChainError::MissingState(*root))
    }

    fn write_block_with_state(
        &self,
        block: &Block,
        receipts: &[Receipt],
        state: Box<dyn ExecutionState>,
    ) -> Result<bool, ChainError> {
        let hash = block.hash();
        let mut inner = self.inner.write();
        if !inner.headers.contains_key(&block.header.parent_hash) {
            return Err(ChainError::Write(format!(
                "parent {} of block {} not stored",
                short_hex(&block.header.parent_hash),
                short_hex(&hash)
            )));
        }
        inner.headers.insert(hash, block.header.clone());
        inner.blocks.insert(hash, block.clone());
        inner.receipts.insert(hash, receipts.to_vec());
        inner.states.insert(block.header.state_root, state);

        let head_number = inner.headers[&inner.head].number;
        let canonical = block.number() > head_number;
        if canonical {
            Self::set_head(&mut inner, hash);
        }
        debug!(number = block.number(), hash = %short_hex(&hash), canonical, "stored block");
        Ok(canonical)
    }
}

#[async_trait]
impl BlockBackend for InMemoryChain {
    async fn head(&self) -> Header {
        self.current_header()
    }

    async fn block_by_number(&self, number: u64) -> Option<Block> {
        InMemoryChain::block_by_number(self, number)
    }
}
