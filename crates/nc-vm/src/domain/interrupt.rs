//! Cooperative cancellation shared by a build attempt and the VM.
//!
//! The interpreter polls the token every [`POLL_INTERVAL`] steps and at every
//! call boundary. A cancelled token or a passed deadline surfaces as
//! [`VmError::ExecOverTime`].

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use crate::errors::VmError;

/// Interpreter steps between polls.
pub const POLL_INTERVAL: u64 = 256;

/// Cancellation flag plus optional deadline.
#[derive(Clone, Debug, Default)]
pub struct Interrupt {
    cancelled: Arc<AtomicBool>,
    deadline: Option<Instant>,
}

impl Interrupt {
    /// Token that never fires unless cancelled.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Same flag, with a deadline.
    #[must_use]
    pub fn with_deadline(&self, deadline: Instant) -> Self {
        Self {
            cancelled: Arc::clone(&self.cancelled),
            deadline: Some(deadline),
        }
    }

    /// Request cancellation. Every clone observes it.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    /// True once [`Interrupt::cancel`] was called on any clone.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }

    /// True once the deadline has passed.
    #[must_use]
    pub fn is_expired(&self) -> bool {
        self.deadline.is_some_and(|d| Instant::now() >= d)
    }

    /// Deadline, if any.
    #[must_use]
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Poll from inside the VM.
    pub fn check(&self) -> Result<(), VmError> {
        if self.is_cancelled() || self.is_expired() {
            return Err(VmError::ExecOverTime);
        }
        Ok(())
    }
}
