//! # Miner Liveness
//!
//! The full slot loop on a multi-threaded runtime with a short block
//! interval: blocks keep coming, pooled transactions get included, a peer
//! follows along, and stopping the miner halts production.

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use nc_block_production::MinerEvent;
    use nc_chain::{now_ms, ChainReader, ImportOutcome};
    use node_runtime::NodeContainer;
    use tokio::sync::{broadcast, watch};
    use tokio::time::timeout;

    use crate::fixtures::*;

    const INTERVAL: u64 = 200;

    fn fast_node() -> NodeContainer {
        let mut config = node_config(&["alpha"], INTERVAL);
        config.miner.mint_retry = Duration::from_millis(20);
        NodeContainer::new(config).unwrap()
    }

    async fn next_mined(events: &mut broadcast::Receiver<MinerEvent>) -> (u64, usize) {
        loop {
            match events.recv().await.unwrap() {
                MinerEvent::NewMinedBlock { number, tx_count, .. } => return (number, tx_count),
                _ => continue,
            }
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_miner_produces_consecutive_blocks() {
        let node = fast_node();
        node.submit(transfer("alice", "bob", 9, 0)).unwrap();
        let (quit, quit_rx) = watch::channel(false);
        let pruner = node.spawn_pool_pruner(quit_rx);
        let mut events = node.miner.subscribe();

        node.miner.start(false).unwrap();
        assert!(node.miner.mining());

        let (first, txs) = timeout(Duration::from_secs(5), next_mined(&mut events)).await.unwrap();
        assert_eq!(first, 1);
        assert_eq!(txs, 1);
        let (second, _) = timeout(Duration::from_secs(5), next_mined(&mut events)).await.unwrap();
        assert_eq!(second, 2);

        node.miner.stop().await.unwrap();
        assert!(!node.miner.mining());
        let height = node.chain.height();
        assert!(height >= 2);

        tokio::time::sleep(Duration::from_millis(3 * INTERVAL)).await;
        assert_eq!(node.chain.height(), height);
        assert!(node.pool.is_empty());

        let snapshot = node.miner.metrics().snapshot();
        assert!(snapshot.blocks_mined >= 2);

        quit.send(true).unwrap();
        pruner.await.unwrap();
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_peer_follows_running_miner() {
        let producer = fast_node();
        let peer = fast_node();
        let mut heads = producer.head_tx.subscribe();

        producer.miner.start(false).unwrap();
        for expected in 1..=3 {
            let event = timeout(Duration::from_secs(5), heads.recv()).await.unwrap().unwrap();
            assert_eq!(event.number, expected);
            let block = producer.chain.get_block(&event.hash, event.number).unwrap();
            let outcome = peer.importer.insert_block_at(&block, now_ms()).unwrap();
            assert!(matches!(outcome, ImportOutcome::Inserted { canonical: true, .. }));
        }
        producer.miner.stop().await.unwrap();

        let head = peer.chain.current_header();
        assert_eq!(head.number, 3);
        assert_eq!(
            producer.chain.get_header_by_number(3).unwrap().hash(),
            head.hash()
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_restart_resumes_production() {
        let node = fast_node();
        let mut events = node.miner.subscribe();

        node.miner.start(false).unwrap();
        timeout(Duration::from_secs(5), next_mined(&mut events)).await.unwrap();
        node.miner.stop().await.unwrap();
        let height = node.chain.height();

        node.miner.start(false).unwrap();
        let (number, _) = timeout(Duration::from_secs(5), next_mined(&mut events)).await.unwrap();
        assert!(number > height);
        node.miner.stop().await.unwrap();
    }
}
