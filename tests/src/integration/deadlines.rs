//! # Deadlines and Preemption
//!
//! The worker under a wall clock, with a pool holding a transaction that
//! never terminates on its own.
//!
//! ## Flow Tested
//!
//! 1. **Admission deadline**: the spinning call is cut off when the slot's
//!    admission window closes, dropped, and the block is still sealed before
//!    the slot ends.
//! 2. **Preemption**: a head from another producer cancels the build while
//!    the VM is spinning; nothing is written.

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::thread;
    use std::time::{Duration, Instant};

    use nc_block_production::{end_time, MintError, WorkerError};
    use nc_chain::{now_ms, ChainHeadEvent, ChainReader};
    use nc_vm::Interrupt;
    use node_runtime::NodeContainer;

    use crate::fixtures::*;

    const INTERVAL: u64 = 1_000;

    fn spinning_node() -> NodeContainer {
        let node = node_with_looper(with_big_gas(node_config(&["alpha"], INTERVAL)));
        node.submit(loop_call("alice", 0, 900_000_000)).unwrap();
        node.submit(transfer("bob", "alice", 3, 0)).unwrap();
        node
    }

    #[test]
    fn test_block_sealed_before_slot_end() {
        let node = spinning_node();
        let worker = worker(&node, Arc::new(now_ms));

        let slot = now_ms() - 450;
        let started = Instant::now();
        let block = worker
            .commit_new_work(slot, &Interrupt::new())
            .unwrap()
            .expect("single producer owns every slot");
        let finished = now_ms();

        assert!(finished < slot + INTERVAL, "sealed at {finished}, slot ends {}", slot + INTERVAL);
        assert!(started.elapsed() < Duration::from_millis(INTERVAL));
        assert_eq!(block.header.time, slot);
        assert!(block
            .transactions
            .iter()
            .all(|tx| tx.sender().map(|s| s.as_str()) != Some("alice")));
        assert_eq!(node.chain.current_header().hash(), block.hash());
    }

    #[test]
    fn test_late_slots_are_refused() {
        let node = spinning_node();
        let worker = worker(&node, Arc::new(now_ms));

        let closed = now_ms() - 700;
        assert!(matches!(
            worker.commit_new_work(closed, &Interrupt::new()),
            Err(WorkerError::Mint(MintError::DeadlinePassed { end, .. })) if end == end_time(closed, INTERVAL)
        ));
        let gone = now_ms() - INTERVAL - 1;
        assert!(matches!(
            worker.commit_new_work(gone, &Interrupt::new()),
            Err(WorkerError::Mint(MintError::SlotPassed { .. }))
        ));
        assert_eq!(node.chain.current_header().number, 0);
        assert_eq!(node.pool.len(), 2);
    }

    #[test]
    fn test_rival_head_preempts_spinning_build() {
        let node = spinning_node();
        let worker = Arc::new(worker(&node, fixed_clock(INTERVAL)));
        let genesis = node.chain.current_header();

        let interrupt = worker.begin_attempt();
        let builder = {
            let worker = Arc::clone(&worker);
            thread::spawn(move || worker.commit_new_work(INTERVAL, &interrupt))
        };
        thread::sleep(Duration::from_millis(50));
        worker.on_chain_head(&ChainHeadEvent {
            hash: genesis.hash(),
            number: 1,
            coinbase: name("rival"),
            time: INTERVAL,
        });

        let result = builder.join().unwrap();
        assert!(matches!(result, Err(WorkerError::Mint(MintError::Preempted))));
        assert_eq!(node.chain.current_header(), genesis);
        assert_eq!(node.pool.len(), 2);
    }

    #[test]
    fn test_own_head_does_not_preempt() {
        let node = node_with_looper(node_config(&["alpha"], INTERVAL));
        node.submit(transfer("bob", "alice", 3, 0)).unwrap();
        let worker = worker(&node, fixed_clock(INTERVAL));

        let interrupt = worker.begin_attempt();
        worker.on_chain_head(&ChainHeadEvent {
            hash: node.chain.current_header().hash(),
            number: 0,
            coinbase: name("alpha"),
            time: 0,
        });
        assert!(!interrupt.is_cancelled());
        let block = worker.commit_new_work(INTERVAL, &interrupt).unwrap().unwrap();
        assert_eq!(block.transactions.len(), 1);
    }
}
