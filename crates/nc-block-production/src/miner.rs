//! Miner lifecycle.
//!
//! Owns the worker loop task. `start` and `stop` move an atomic state machine
//! with `compare_exchange`, so concurrent callers cannot double-start or
//! double-stop.

use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use parking_lot::Mutex;
use shared_types::Name;
use tokio::runtime::Handle;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use crate::error::MinerError;
use crate::events::MinerEvent;
use crate::metrics::Metrics;
use crate::worker::Worker;

const STOPPED: u8 = 0;
const STARTING: u8 = 1;
const STARTED: u8 = 2;
const STOPPING: u8 = 3;

struct Running {
    quit: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

/// Start/stop control over a [`Worker`].
pub struct Miner {
    worker: Arc<Worker>,
    max_extra_size: usize,
    state: AtomicU8,
    syncing: AtomicBool,
    running: Mutex<Option<Running>>,
}

impl Miner {
    /// Wrap `worker`. `max_extra_size` bounds [`Miner::set_extra`].
    pub fn new(worker: Arc<Worker>, max_extra_size: usize) -> Self {
        Self {
            worker,
            max_extra_size,
            state: AtomicU8::new(STOPPED),
            syncing: AtomicBool::new(false),
            running: Mutex::new(None),
        }
    }

    /// Spawn the worker loop on the current Tokio runtime.
    ///
    /// Refused while the node is syncing unless `force` is set.
    pub fn start(&self, force: bool) -> Result<(), MinerError> {
        if !force && self.syncing.load(Ordering::Acquire) {
            return Err(MinerError::Syncing);
        }
        let runtime = Handle::try_current().map_err(|_| MinerError::NoRuntime)?;
        self.state
            .compare_exchange(STOPPED, STARTING, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| MinerError::AlreadyStarted)?;

        let (quit, quit_rx) = watch::channel(false);
        let handle = runtime.spawn(Arc::clone(&self.worker).run(quit_rx));
        *self.running.lock() = Some(Running { quit, handle });
        self.state.store(STARTED, Ordering::Release);

        let coinbase = self.worker.settings().read().coinbase.clone();
        info!(%coinbase, "miner started");
        self.publish(MinerEvent::Started {
            coinbase,
            at: Utc::now(),
        });
        Ok(())
    }

    /// Signal the worker loop and wait for it to exit.
    pub async fn stop(&self) -> Result<(), MinerError> {
        self.state
            .compare_exchange(STARTED, STOPPING, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| MinerError::NotStarted)?;

        let running = self.running.lock().take();
        if let Some(Running { quit, handle }) = running {
            if quit.send(true).is_err() {
                debug!("worker loop already gone");
            }
            if let Err(err) = handle.await {
                error!(error = %err, "worker loop task failed");
            }
        }
        self.state.store(STOPPED, Ordering::Release);

        info!("miner stopped");
        self.publish(MinerEvent::Stopped { at: Utc::now() });
        Ok(())
    }

    /// True while the worker loop runs.
    pub fn mining(&self) -> bool {
        self.state.load(Ordering::Acquire) == STARTED
    }

    /// Mark the node as syncing. Does not stop a running miner.
    pub fn set_syncing(&self, syncing: bool) {
        self.syncing.store(syncing, Ordering::Release);
    }

    /// Producer account for subsequent attempts.
    pub fn set_coinbase(&self, coinbase: Name) {
        self.worker.settings().write().coinbase = coinbase;
    }

    /// Header extra data for subsequent attempts.
    pub fn set_extra(&self, extra: Vec<u8>) -> Result<(), MinerError> {
        if extra.len() > self.max_extra_size {
            return Err(MinerError::ExtraTooLong {
                len: extra.len(),
                max: self.max_extra_size,
            });
        }
        self.worker.settings().write().extra = extra;
        Ok(())
    }

    /// Pause between writing a block and announcing it.
    pub fn set_delay(&self, delay: Duration) {
        self.worker.settings().write().delay = delay;
    }

    /// Current producer account.
    pub fn coinbase(&self) -> Name {
        self.worker.settings().read().coinbase.clone()
    }

    /// New receiver of miner events.
    pub fn subscribe(&self) -> broadcast::Receiver<MinerEvent> {
        self.worker.subscribe()
    }

    /// Production counters.
    pub fn metrics(&self) -> &Metrics {
        self.worker.metrics()
    }

    fn publish(&self, event: MinerEvent) {
        if self.worker.events().send(event).is_err() {
            debug!("no miner event subscribers");
        }
    }
}
