//! Reusable duplex connection pool.
//!
//! Capacity is a semaphore sized at the configured maximum: every leased
//! connection holds one permit. Idle connections do not hold permits: a
//! healthy return pushes the transport onto the idle list and then frees
//! its permit, so a suspended leaser wakes up and finds the idle entry.

use std::sync::Arc;
use std::sync::Mutex as StdMutex;
use std::sync::MutexGuard;

use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::config::ExhaustionPolicy;
use crate::error::ClientError;
use crate::transport::{Connector, DuplexTransport};

/// A connection leased to one streaming session.
///
/// Exclusively owned by that session until it is given back. Dropping it
/// without `give_back` closes the transport abruptly and frees the
/// capacity permit.
pub struct PooledConnection {
    transport: Box<dyn DuplexTransport>,
    _permit: OwnedSemaphorePermit,
}

impl PooledConnection {
    pub fn transport_mut(&mut self) -> &mut dyn DuplexTransport {
        self.transport.as_mut()
    }

    pub fn is_open(&self) -> bool {
        self.transport.is_open()
    }
}

/// An idle pooled connection with its last-returned timestamp.
pub(crate) struct IdleConn {
    transport: Box<dyn DuplexTransport>,
    returned_at: Instant,
}

impl IdleConn {
    /// Attempt the close handshake, then release the handle by dropping the
    /// transport; a failed handshake never keeps the resource alive.
    pub(crate) async fn close_graceful(mut self) {
        let idle_for = self.returned_at.elapsed();
        if let Err(e) = self.transport.close().await {
            tracing::warn!(error = %e, ?idle_for, "Close handshake failed; dropping connection");
        } else {
            tracing::debug!(?idle_for, "Closed idle connection");
        }
    }
}

pub struct ConnectionPool {
    connector: Arc<dyn Connector>,
    capacity: Arc<Semaphore>,
    max_connections: usize,
    policy: ExhaustionPolicy,
    idle: StdMutex<Vec<IdleConn>>,
}

impl ConnectionPool {
    pub fn new(
        connector: Arc<dyn Connector>,
        max_connections: usize,
        policy: ExhaustionPolicy,
    ) -> Self {
        let max_connections = max_connections.max(1);
        Self {
            connector,
            capacity: Arc::new(Semaphore::new(max_connections)),
            max_connections,
            policy,
            idle: StdMutex::new(Vec::new()),
        }
    }

    /// Lease a connection: reuse a healthy idle one, otherwise create a new
    /// one while under the size cap. At capacity the configured policy
    /// decides between suspending and failing fast with `PoolExhausted`.
    pub async fn lease(&self, cancel: &CancellationToken) -> Result<PooledConnection, ClientError> {
        let permit = match self.policy {
            ExhaustionPolicy::FailFast => Arc::clone(&self.capacity)
                .try_acquire_owned()
                .map_err(|_| ClientError::PoolExhausted)?,
            ExhaustionPolicy::Wait => {
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => return Err(ClientError::Cancelled),
                    permit = Arc::clone(&self.capacity).acquire_owned() => {
                        permit.expect("pool capacity semaphore is never closed")
                    }
                }
            }
        };

        // Health-check idle entries; stale ones are closed and skipped.
        while let Some(conn) = self.take_idle() {
            if conn.transport.is_open() {
                tracing::debug!(idle_for = ?conn.returned_at.elapsed(), "Reusing pooled connection");
                return Ok(PooledConnection {
                    transport: conn.transport,
                    _permit: permit,
                });
            }
            conn.close_graceful().await;
        }

        let transport = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(ClientError::Cancelled),
            result = self.connector.connect() => {
                result.map_err(|e| ClientError::Transport(format!("connect: {e}")))?
            }
        };
        tracing::debug!("Created pooled connection");
        Ok(PooledConnection {
            transport,
            _permit: permit,
        })
    }

    /// Return a leased connection. Healthy and open goes back to the idle
    /// list with a refreshed timestamp; anything else is closed and
    /// discarded, never silently leaked.
    pub async fn give_back(&self, conn: PooledConnection, healthy: bool) {
        let PooledConnection { transport, _permit } = conn;
        if healthy && transport.is_open() && self.idle_count() < self.max_connections {
            self.idle_list().push(IdleConn {
                transport,
                returned_at: Instant::now(),
            });
            // Freed after the push so a waiting leaser finds the idle entry.
            drop(_permit);
        } else {
            let conn = IdleConn {
                transport,
                returned_at: Instant::now(),
            };
            conn.close_graceful().await;
        }
    }

    /// Pop one idle connection, oldest-returned last.
    pub(crate) fn take_idle(&self) -> Option<IdleConn> {
        self.idle_list().pop()
    }

    pub fn idle_count(&self) -> usize {
        self.idle_list().len()
    }

    fn idle_list(&self) -> MutexGuard<'_, Vec<IdleConn>> {
        match self.idle.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}
