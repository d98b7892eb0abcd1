//! # Block Exchange
//!
//! A producing node mints blocks with its worker; a second node with the
//! same genesis imports them through its `BlockImporter`. Both must end on
//! the same head, state root and receipts.
//!
//! ## Flow Tested
//!
//! 1. **Worker → chain**: transfers and a contract deployment are minted into
//!    block 1 at the producer's slot.
//! 2. **Importer**: the peer re-executes the block on its own genesis state.
//! 3. **Failed actions**: an out-of-gas call and a code collision are still
//!    included and replay identically.
//! 4. **Tampering**: a forged producer or a dropped transaction is rejected.

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use nc_chain::{BlockValidationError, ChainError, ChainReader, ImportOutcome};
    use nc_vm::{AccountManager, Interrupt};
    use node_runtime::NodeContainer;
    use primitive_types::U256;
    use shared_types::{ActionStatus, Block, Hash, Receipt};

    use crate::fixtures::*;

    const INTERVAL: u64 = 3_000;
    /// First slot of `alpha` after genesis.
    const SLOT_1: u64 = 6_000;
    /// Next slot of `alpha`.
    const SLOT_2: u64 = 12_000;

    fn pair() -> (NodeContainer, NodeContainer) {
        let producer = NodeContainer::new(node_config(&["alpha", "beta"], INTERVAL)).unwrap();
        let peer = NodeContainer::new(node_config(&["alpha", "beta"], INTERVAL)).unwrap();
        assert_eq!(
            producer.chain.current_header().hash(),
            peer.chain.current_header().hash()
        );
        (producer, peer)
    }

    fn mint(node: &NodeContainer, slot: u64) -> Block {
        worker(node, fixed_clock(slot))
            .commit_new_work(slot, &Interrupt::new())
            .unwrap()
            .expect("alpha owns the slot")
    }

    fn by_tx(receipts: Vec<Receipt>) -> HashMap<Hash, Receipt> {
        receipts.into_iter().map(|r| (r.tx_hash, r)).collect()
    }

    /// Block 1: two transfers and the deployment of the loop contract.
    fn first_block(producer: &NodeContainer) -> Block {
        producer.submit(transfer("alice", "bob", 500, 0)).unwrap();
        producer
            .submit(create_tx("alice", LOOPER, loop_init_code(), 0, 1, 200_000))
            .unwrap();
        producer.submit(transfer("bob", "alice", 7, 0)).unwrap();
        let block = mint(producer, SLOT_1);
        assert_eq!(block.transactions.len(), 3);
        producer.pool.remove_included(&block);
        block
    }

    #[test]
    fn test_peer_replays_minted_blocks() {
        let (producer, peer) = pair();
        let mut heads = peer.importer.subscribe();

        let block1 = first_block(&producer);
        let outcome = peer.importer.insert_block_at(&block1, SLOT_1).unwrap();
        assert_eq!(
            outcome,
            ImportOutcome::Inserted {
                hash: block1.hash(),
                number: 1,
                canonical: true
            }
        );
        let event = heads.try_recv().unwrap();
        assert_eq!(event.number, 1);
        assert_eq!(event.coinbase, name("alpha"));

        assert_eq!(peer.chain.current_header(), producer.chain.current_header());
        let mut state = peer.chain.state_at(&block1.header.state_root).unwrap();
        assert_eq!(state.get_code(&name(LOOPER)).unwrap(), LOOP_CODE.to_vec());
        assert_eq!(
            state.get_balance(&name("bob"), 0).unwrap(),
            U256::from(FUNDS + 500 - 7 - 21_000)
        );
        assert_eq!(state.intermediate_root(), block1.header.state_root);

        let mine = producer.chain.receipts(&block1.hash()).unwrap();
        let theirs = peer.chain.receipts(&block1.hash()).unwrap();
        assert_eq!(mine.len(), theirs.len());
        for (a, b) in mine.iter().zip(&theirs) {
            assert_eq!(a.consensus_hash(), b.consensus_hash());
        }
    }

    #[test]
    fn test_failed_actions_replay_identically() {
        let (producer, peer) = pair();
        let block1 = first_block(&producer);
        peer.importer.insert_block_at(&block1, SLOT_1).unwrap();

        let spin = loop_call("alice", 2, 100_000);
        let collide = create_tx("bob", LOOPER, loop_init_code(), 5, 1, 300_000);
        producer.submit(spin.clone()).unwrap();
        producer.submit(collide.clone()).unwrap();
        let block2 = mint(&producer, SLOT_2);
        assert_eq!(block2.transactions.len(), 2);

        let outcome = peer.importer.insert_block_at(&block2, SLOT_2).unwrap();
        assert!(matches!(outcome, ImportOutcome::Inserted { number: 2, canonical: true, .. }));
        assert_eq!(peer.chain.current_header().state_root, block2.header.state_root);

        let receipts = by_tx(peer.chain.receipts(&block2.hash()).unwrap());
        let spin = &receipts[&spin.hash()].action_results[0];
        assert_eq!(spin.status, ActionStatus::Failed);
        assert_eq!(spin.gas_used, 100_000);

        let collide = &receipts[&collide.hash()].action_results[0];
        assert_eq!(collide.status, ActionStatus::Failed);
        assert_eq!(collide.gas_used, 300_000);

        let state = peer.chain.state_at(&block2.header.state_root).unwrap();
        assert_eq!(state.get_code(&name(LOOPER)).unwrap(), LOOP_CODE.to_vec());
        assert_eq!(state.get_balance(&name(LOOPER), 0).unwrap(), U256::zero());
        assert_eq!(state.get_nonce(&name("bob")).unwrap(), 2);
    }

    #[test]
    fn test_tampered_blocks_are_rejected() {
        let (producer, peer) = pair();
        let block1 = first_block(&producer);

        let mut header = block1.header.clone();
        header.coinbase = name("beta");
        let forged = block1.clone().with_seal(header);
        let err = peer.importer.insert_block_at(&forged, SLOT_1).unwrap_err();
        assert!(matches!(
            err,
            ChainError::Validation(BlockValidationError::InvalidSeal { .. })
        ));

        let stripped = Block {
            header: block1.header.clone(),
            transactions: Vec::new(),
        };
        let err = peer.importer.insert_block_at(&stripped, SLOT_1).unwrap_err();
        assert!(matches!(
            err,
            ChainError::Validation(BlockValidationError::TxRootMismatch { .. })
        ));
        assert_eq!(peer.chain.current_header().number, 0);

        assert!(matches!(
            peer.importer.insert_block_at(&block1, SLOT_1).unwrap(),
            ImportOutcome::Inserted { .. }
        ));
        assert_eq!(
            peer.importer.insert_block_at(&block1, SLOT_1).unwrap(),
            ImportOutcome::AlreadyKnown {
                hash: block1.hash(),
                number: 1
            }
        );
    }

    #[test]
    fn test_orphan_is_rejected() {
        let (producer, peer) = pair();
        first_block(&producer);
        producer.submit(transfer("bob", "alice", 1, 1)).unwrap();
        let block2 = mint(&producer, SLOT_2);

        let err = peer.importer.insert_block_at(&block2, SLOT_2).unwrap_err();
        assert!(matches!(
            err,
            ChainError::Validation(BlockValidationError::UnknownAncestor { .. })
        ));
    }

    #[test]
    fn test_future_block_is_rejected() {
        let producer = NodeContainer::new(node_config(&["alpha", "beta"], INTERVAL)).unwrap();
        let mut config = node_config(&["alpha", "beta"], INTERVAL);
        config.chain.allowed_future_block_time_ms = 1_000;
        let peer = NodeContainer::new(config).unwrap();
        let block1 = first_block(&producer);

        let err = peer.importer.insert_block_at(&block1, SLOT_1 - 1_001).unwrap_err();
        assert!(matches!(
            err,
            ChainError::Validation(BlockValidationError::FutureBlock { .. })
        ));
        assert!(peer.importer.insert_block_at(&block1, SLOT_1 - 1_000).is_ok());
    }
}
