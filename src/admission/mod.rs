//! Call admission: bounds how many calls may be in flight at once.
//!
//! Two interchangeable strategies sit behind one contract:
//! - **bounded**: a counting semaphore with capacity N; acquisition suspends
//!   when the capacity is taken
//! - **unbounded**: every acquire succeeds immediately and is registered in
//!   a concurrent set so the outstanding count stays exact
//!
//! Release happens in [`CallSlot`]'s drop, exactly once per slot, and stamps
//! the shared last-activity time the idle reaper reads.

mod strategy;

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::error::ClientError;
use strategy::{AdmitStrategy, BoundedAdmission, Ticket, UnboundedAdmission};

struct Inner {
    strategy: Box<dyn AdmitStrategy>,
    epoch: Instant,
    /// Millis since `epoch` of the most recent slot release. Written on the
    /// call completion hot path; the reaper reads it without any lock.
    last_activity: AtomicU64,
}

impl Inner {
    fn stamp_activity(&self) {
        let now = self.epoch.elapsed().as_millis() as u64;
        self.last_activity.store(now, Ordering::Release);
    }
}

/// Shared handle to the admission state. Clones are cheap and refer to the
/// same controller.
#[derive(Clone)]
pub struct AdmissionController {
    inner: Arc<Inner>,
}

impl AdmissionController {
    /// `max_concurrency == 0` selects the unbounded strategy.
    pub fn new(max_concurrency: usize) -> Self {
        let strategy: Box<dyn AdmitStrategy> = if max_concurrency == 0 {
            Box::new(UnboundedAdmission::new())
        } else {
            Box::new(BoundedAdmission::new(max_concurrency))
        };
        Self {
            inner: Arc::new(Inner {
                strategy,
                epoch: Instant::now(),
                last_activity: AtomicU64::new(0),
            }),
        }
    }

    /// Wait for an admission slot.
    ///
    /// Fails with [`ClientError::Cancelled`] if the token fires before a
    /// slot becomes available.
    pub async fn acquire(&self, cancel: &CancellationToken) -> Result<CallSlot, ClientError> {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(ClientError::Cancelled),
            ticket = self.inner.strategy.admit() => Ok(CallSlot {
                ticket: Some(ticket),
                inner: Arc::clone(&self.inner),
            }),
        }
    }

    /// Number of acquired-but-not-released slots.
    pub fn outstanding(&self) -> usize {
        self.inner.strategy.outstanding()
    }

    /// Time since the most recent slot release (or since construction, while
    /// no call has completed yet).
    pub fn last_activity_elapsed(&self) -> Duration {
        let last = self.inner.last_activity.load(Ordering::Acquire);
        let now = self.inner.epoch.elapsed().as_millis() as u64;
        Duration::from_millis(now.saturating_sub(last))
    }
}

/// An admission ticket: permission to have one call in flight.
///
/// Dropping the slot releases it exactly once and stamps last-activity, on
/// every exit path.
pub struct CallSlot {
    ticket: Option<Ticket>,
    inner: Arc<Inner>,
}

impl Drop for CallSlot {
    fn drop(&mut self) {
        if let Some(ticket) = self.ticket.take() {
            self.inner.strategy.release(ticket);
            self.inner.stamp_activity();
        }
    }
}
