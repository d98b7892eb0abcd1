//! # Block Validator
//!
//! Header, body and post-state acceptance rules for imported blocks.
//!
//! ## Check Order
//!
//! | Stage | Checks |
//! |-------|--------|
//! | Body | already known, parent present, parent state present, tx root |
//! | Header | extra size, clock, timestamp, difficulty, gas limits, number, fork ID, seal |
//! | State | gas used, bloom, receipt root, state root |

use std::sync::Arc;

use nc_vm::ExecutionState;
use shared_types::{derive_receipt_root, derive_tx_root, Block, Bloom, Header, Receipt};

use crate::error::BlockValidationError;
use crate::ports::{ChainReader, ConsensusEngine};

/// Largest gas limit a header may declare.
pub const MAX_GAS_LIMIT: u64 = i64::MAX as u64;

/// Stateless apart from the consensus engine it consults for difficulty and
/// seals.
pub struct BlockValidator {
    engine: Arc<dyn ConsensusEngine>,
}

impl BlockValidator {
    /// Create a validator bound to `engine`.
    pub fn new(engine: Arc<dyn ConsensusEngine>) -> Self {
        Self { engine }
    }

    /// Ancestry and transaction-root checks. Returns the parent header.
    pub fn validate_body(&self, chain: &dyn ChainReader, block: &Block) -> Result<Header, BlockValidationError> {
        let header = &block.header;
        let hash = block.hash();
        if chain.has_block_and_state(&hash, header.number) {
            return Err(BlockValidationError::KnownBlock {
                hash,
                number: header.number,
            });
        }

        let parent = header
            .number
            .checked_sub(1)
            .and_then(|number| chain.get_header(&header.parent_hash, number))
            .ok_or(BlockValidationError::UnknownAncestor {
                parent: header.parent_hash,
            })?;
        if !chain.has_state(&parent.state_root) {
            return Err(BlockValidationError::PrunedAncestor {
                parent: header.parent_hash,
            });
        }

        let tx_root = derive_tx_root(
            &block.transactions,
            header.fork_id.cur,
            chain.config().merkle_tx_root_fork,
        );
        if tx_root != header.tx_root {
            return Err(BlockValidationError::TxRootMismatch {
                have: tx_root,
                want: header.tx_root,
            });
        }
        Ok(parent)
    }

    /// Header rules against `parent`. `now_ms` is the local clock in unix
    /// milliseconds.
    pub fn validate_header(
        &self,
        chain: &dyn ChainReader,
        header: &Header,
        parent: &Header,
        seal: bool,
        now_ms: u64,
    ) -> Result<(), BlockValidationError> {
        let config = chain.config();

        if header.extra.len() > config.max_extra_size {
            return Err(BlockValidationError::ExtraTooLong {
                len: header.extra.len(),
                max: config.max_extra_size,
            });
        }
        if header.time > now_ms.saturating_add(config.allowed_future_block_time_ms) {
            return Err(BlockValidationError::FutureBlock {
                time: header.time,
                now: now_ms,
            });
        }
        if header.time <= parent.time {
            return Err(BlockValidationError::InvalidTimestamp {
                time: header.time,
                parent: parent.time,
            });
        }

        let difficulty = self.engine.calc_difficulty(chain, header.time, parent);
        if header.difficulty != difficulty {
            return Err(BlockValidationError::InvalidDifficulty {
                have: header.difficulty,
                want: difficulty,
            });
        }

        if header.gas_limit > MAX_GAS_LIMIT {
            return Err(BlockValidationError::GasLimitTooHigh {
                limit: header.gas_limit,
            });
        }
        if header.gas_used > header.gas_limit {
            return Err(BlockValidationError::GasUsedExceedsLimit {
                used: header.gas_used,
                limit: header.gas_limit,
            });
        }
        let diff = header.gas_limit.abs_diff(parent.gas_limit);
        let bound = parent.gas_limit / config.gas_limit_bound_divisor.max(1);
        if diff >= bound {
            return Err(BlockValidationError::InvalidGasLimit {
                have: header.gas_limit,
                parent: parent.gas_limit,
            });
        }
        if header.gas_limit < config.min_gas_limit {
            return Err(BlockValidationError::GasLimitBelowMinimum {
                have: header.gas_limit,
                min: config.min_gas_limit,
            });
        }

        if header.number != parent.number + 1 {
            return Err(BlockValidationError::InvalidNumber {
                have: header.number,
                want: parent.number + 1,
            });
        }

        chain.check_fork_id(header, parent)?;

        if seal {
            self.engine
                .verify_seal(chain, header)
                .map_err(|err| BlockValidationError::InvalidSeal {
                    reason: err.to_string(),
                })?;
        }
        Ok(())
    }

    /// Compare the result of executing `block` with what its header claims.
    pub fn validate_state(
        &self,
        block: &Block,
        state: &mut dyn ExecutionState,
        receipts: &[Receipt],
        used_gas: u64,
    ) -> Result<(), BlockValidationError> {
        let header = &block.header;
        if header.gas_used != used_gas {
            return Err(BlockValidationError::GasUsedMismatch {
                have: used_gas,
                want: header.gas_used,
            });
        }
        if Bloom::from_receipts(receipts) != header.bloom {
            return Err(BlockValidationError::BloomMismatch);
        }
        let receipt_root = derive_receipt_root(receipts);
        if receipt_root != header.receipt_root {
            return Err(BlockValidationError::ReceiptRootMismatch {
                have: receipt_root,
                want: header.receipt_root,
            });
        }
        let root = state.intermediate_root();
        if root != header.state_root {
            return Err(BlockValidationError::StateRootMismatch {
                have: root,
                want: header.state_root,
            });
        }
        Ok(())
    }
}
