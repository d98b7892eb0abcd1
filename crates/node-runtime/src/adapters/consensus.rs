//! # Development DPoS Engine
//!
//! Round-robin producer schedule over a fixed list of names. The producer of
//! a slot is `producers[(slot / interval) % producers.len()]`.
//!
//! The seal is a keccak commitment to the seal hash and the producer name.
//! It binds a header to its slot owner but carries no key material, so this
//! engine is only fit for development networks.

use std::collections::HashSet;

use nc_chain::{ChainError, ChainReader, ConsensusEngine};
use nc_vm::{ExecutionState, Interrupt};
use primitive_types::U256;
use sha3::{Digest, Keccak256};
use shared_types::{Block, Header, Name, Receipt, Transaction};

/// Round-robin development engine.
#[derive(Debug, Clone)]
pub struct DevDpos {
    producers: Vec<Name>,
    interval_ms: u64,
}

impl DevDpos {
    /// Engine rotating over `producers` every `interval_ms`.
    pub fn new(producers: Vec<Name>, interval_ms: u64) -> Result<Self, ChainError> {
        if producers.is_empty() {
            return Err(ChainError::Consensus("empty producer schedule".into()));
        }
        if interval_ms == 0 {
            return Err(ChainError::Consensus("zero block interval".into()));
        }
        Ok(Self {
            producers,
            interval_ms,
        })
    }

    /// Scheduled producer of the slot starting at `slot_ms`.
    pub fn producer_at(&self, slot_ms: u64) -> &Name {
        let turn = (slot_ms / self.interval_ms) % self.producers.len() as u64;
        &self.producers[turn as usize]
    }

    /// Development seal of `header`.
    pub fn seal_of(header: &Header) -> Vec<u8> {
        let mut hasher = Keccak256::new();
        hasher.update(header.seal_hash());
        hasher.update(header.coinbase.as_str().as_bytes());
        hasher.finalize().to_vec()
    }

    /// Highest ancestor of `parent` (inclusive) confirmed by more than two
    /// thirds of the producers.
    fn proposed_irreversible(&self, chain: &dyn ChainReader, parent: &Header) -> u64 {
        let threshold = self.producers.len() * 2 / 3 + 1;
        let mut seen: HashSet<&Name> = HashSet::new();
        let mut cursor = parent.clone();
        for _ in 0..self.producers.len() * 3 {
            if let Some(producer) = self.producers.iter().find(|p| **p == cursor.coinbase) {
                seen.insert(producer);
                if seen.len() >= threshold {
                    return cursor.number;
                }
            }
            if cursor.number == 0 {
                break;
            }
            match chain.get_header(&cursor.parent_hash, cursor.number - 1) {
                Some(header) => cursor = header,
                None => break,
            }
        }
        parent.proposed_irreversible
    }
}

impl ConsensusEngine for DevDpos {
    fn author(&self, header: &Header) -> Result<Name, ChainError> {
        Ok(header.coinbase.clone())
    }

    fn prepare(&self, chain: &dyn ChainReader, header: &mut Header) -> Result<(), ChainError> {
        let number = header.number.saturating_sub(1);
        let parent = chain
            .get_header(&header.parent_hash, number)
            .ok_or(ChainError::MissingHeader {
                hash: header.parent_hash,
                number,
            })?;
        header.proposed_irreversible = self.proposed_irreversible(chain, &parent);
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
        header.sign = Self::seal_of(&header);
        Ok(block.with_seal(header))
    }

    fn calc_difficulty(&self, _chain: &dyn ChainReader, _time: u64, _parent: &Header) -> U256 {
        U256::one()
    }

    fn verify_seal(&self, _chain: &dyn ChainReader, header: &Header) -> Result<(), ChainError> {
        let scheduled = self.producer_at(header.time);
        if *scheduled != header.coinbase {
            return Err(ChainError::Consensus(format!(
                "{} produced the slot of {scheduled}",
                header.coinbase
            )));
        }
        if header.sign != Self::seal_of(header) {
            return Err(ChainError::Consensus("bad seal".into()));
        }
        Ok(())
    }

    fn block_interval_ms(&self) -> u64 {
        self.interval_ms
    }

    fn is_eligible(&self, _chain: &dyn ChainReader, _parent: &Header, coinbase: &Name, slot_ms: u64) -> bool {
        self.producer_at(slot_ms) == coinbase
    }
}
