//! Fork-ID rules.
//!
//! A header's `cur` is the ruleset its parent voted for; `next` is the
//! highest ruleset its producer is ready for.

use shared_types::Header;

use crate::error::BlockValidationError;

/// Fill `header.fork_id` from its parent and the locally supported fork.
pub fn fill_fork_id(header: &mut Header, parent: &Header, supported: u64) {
    header.fork_id.cur = parent.fork_id.next;
    header.fork_id.next = header.fork_id.cur.max(supported);
}

/// Check `header.fork_id` against its parent and the locally supported fork.
pub fn check_fork_id(header: &Header, parent: &Header, supported: u64) -> Result<(), BlockValidationError> {
    let id = header.fork_id;
    if id.cur != parent.fork_id.next {
        return Err(BlockValidationError::InvalidForkId {
            reason: format!("cur {} does not follow parent next {}", id.cur, parent.fork_id.next),
        });
    }
    if id.next < id.cur {
        return Err(BlockValidationError::InvalidForkId {
            reason: format!("next {} below cur {}", id.next, id.cur),
        });
    }
    if id.cur > supported {
        return Err(BlockValidationError::InvalidForkId {
            reason: format!("fork {} not supported (max {})", id.cur, supported),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared_types::{Bloom, ForkId, Name, U256};

    fn header(cur: u64, next: u64) -> Header {
        Header {
            parent_hash: [0u8; 32],
            coinbase: Name::new("producer").unwrap(),
            proposed_irreversible: 0,
            tx_root: [0u8; 32],
            receipt_root: [0u8; 32],
            state_root: [0u8; 32],
            bloom: Bloom::default(),
            difficulty: U256::one(),
            number: 1,
            gas_limit: 5_000,
            gas_used: 0,
            time: 0,
            extra: Vec::new(),
            fork_id: ForkId { cur, next },
            sign: Vec::new(),
        }
    }

    #[test]
    fn test_fill_follows_parent_vote() {
        let parent = header(0, 1);
        let mut child = header(0, 0);
        fill_fork_id(&mut child, &parent, 2);
        assert_eq!(child.fork_id, ForkId { cur: 1, next: 2 });
        assert!(check_fork_id(&child, &parent, 2).is_ok());
    }

    #[test]
    fn test_check_rejects() {
        let parent = header(1, 1);
        assert!(check_fork_id(&header(0, 1), &parent, 1).is_err());
        assert!(check_fork_id(&header(1, 0), &parent, 1).is_err());
        let ahead = header(2, 2);
        assert!(check_fork_id(&header(2, 2), &ahead, 1).is_err());
    }
}
