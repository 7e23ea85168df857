//! Admission strategies.

use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use uuid::Uuid;

/// Proof of admission, handed back on release.
pub(crate) enum Ticket {
    Permit(OwnedSemaphorePermit),
    Registered(Uuid),
}

/// One admission discipline. Selected once at construction; the contract is
/// identical either way, only whether `admit` can suspend differs.
#[async_trait]
pub(crate) trait AdmitStrategy: Send + Sync {
    /// Obtain a ticket, suspending while the strategy is at capacity.
    async fn admit(&self) -> Ticket;

    fn release(&self, ticket: Ticket);

    /// Number of admitted-but-not-released tickets.
    fn outstanding(&self) -> usize;
}

/// Counting admission: at most `capacity` outstanding tickets.
pub(crate) struct BoundedAdmission {
    permits: Arc<Semaphore>,
    capacity: usize,
}

impl BoundedAdmission {
    pub(crate) fn new(capacity: usize) -> Self {
        Self {
            permits: Arc::new(Semaphore::new(capacity)),
            capacity,
        }
    }
}

#[async_trait]
impl AdmitStrategy for BoundedAdmission {
    async fn admit(&self) -> Ticket {
        let permit = Arc::clone(&self.permits)
            .acquire_owned()
            .await
            .expect("admission semaphore is never closed");
        Ticket::Permit(permit)
    }

    fn release(&self, ticket: Ticket) {
        // The permit returns to the semaphore on drop.
        drop(ticket);
    }

    fn outstanding(&self) -> usize {
        self.capacity - self.permits.available_permits()
    }
}

/// Unlimited admission: tickets are registered only so the outstanding
/// count stays exact.
pub(crate) struct UnboundedAdmission {
    active: DashMap<Uuid, ()>,
}

impl UnboundedAdmission {
    pub(crate) fn new() -> Self {
        Self {
            active: DashMap::new(),
        }
    }
}

#[async_trait]
impl AdmitStrategy for UnboundedAdmission {
    async fn admit(&self) -> Ticket {
        let id = Uuid::new_v4();
        self.active.insert(id, ());
        Ticket::Registered(id)
    }

    fn release(&self, ticket: Ticket) {
        match ticket {
            Ticket::Registered(id) => {
                self.active.remove(&id);
            }
            Ticket::Permit(_) => {
                debug_assert!(false, "permit ticket released to unbounded strategy");
                tracing::error!("Bug: permit ticket released to unbounded strategy");
            }
        }
    }

    fn outstanding(&self) -> usize {
        self.active.len()
    }
}
