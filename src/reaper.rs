//! Background reclamation of idle pooled connections.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::admission::AdmissionController;
use crate::pool::ConnectionPool;

/// Spawn the eviction loop. One reaper runs for the lifetime of the owning
/// client, bound to its shutdown token.
///
/// Each pass sleeps for the idle threshold (waking early on shutdown), skips
/// when a call completed within the threshold, and otherwise closes idle
/// connections for as long as no calls are outstanding. On shutdown the loop
/// drains and closes every remaining idle connection before exiting; no
/// pooled connection outlives the client.
pub(crate) fn spawn(
    pool: Arc<ConnectionPool>,
    admission: AdmissionController,
    idle_after: Duration,
    shutdown: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = tokio::time::sleep(idle_after) => {}
            }

            // A call finished recently; its connections may be wanted again.
            if admission.last_activity_elapsed() < idle_after {
                continue;
            }

            while admission.outstanding() == 0 {
                let Some(conn) = pool.take_idle() else { break };
                conn.close_graceful().await;
            }
        }

        let mut drained = 0usize;
        while let Some(conn) = pool.take_idle() {
            conn.close_graceful().await;
            drained += 1;
        }
        if drained > 0 {
            tracing::debug!(drained, "Closed idle connections on shutdown");
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ExhaustionPolicy;
    use crate::transport::testing::{ScriptedConnector, ScriptedTransport, init_tracing};
    use std::sync::atomic::Ordering;

    const IDLE_AFTER: Duration = Duration::from_secs(30);

    struct Fixture {
        pool: Arc<ConnectionPool>,
        admission: AdmissionController,
        shutdown: CancellationToken,
        handle: JoinHandle<()>,
    }

    fn fixture(connector: Arc<ScriptedConnector>) -> Fixture {
        let pool = Arc::new(ConnectionPool::new(connector, 2, ExhaustionPolicy::Wait));
        let admission = AdmissionController::new(0);
        let shutdown = CancellationToken::new();
        let handle = spawn(
            Arc::clone(&pool),
            admission.clone(),
            IDLE_AFTER,
            shutdown.clone(),
        );
        Fixture {
            pool,
            admission,
            shutdown,
            handle,
        }
    }

    /// Complete one streaming-shaped call: slot + connection, both released.
    async fn one_call(fx: &Fixture) {
        let cancel = CancellationToken::new();
        let slot = fx.admission.acquire(&cancel).await.unwrap();
        let conn = fx.pool.lease(&cancel).await.unwrap();
        fx.pool.give_back(conn, true).await;
        drop(slot);
    }

    #[tokio::test(start_paused = true)]
    async fn evicts_after_quiet_period() {
        init_tracing();
        let connector = Arc::new(ScriptedConnector::new());
        let transport = ScriptedTransport::hanging(Vec::new());
        let closed = transport.closed_flag();
        connector.push(transport);

        let fx = fixture(connector);
        one_call(&fx).await;
        assert_eq!(fx.pool.idle_count(), 1);

        tokio::time::sleep(IDLE_AFTER + Duration::from_secs(1)).await;
        assert_eq!(fx.pool.idle_count(), 0);
        assert!(closed.load(Ordering::Acquire), "eviction closes gracefully");

        fx.shutdown.cancel();
        fx.handle.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn fresh_activity_skips_the_pass() {
        let connector = Arc::new(ScriptedConnector::new());
        let fx = fixture(connector);

        one_call(&fx).await;
        assert_eq!(fx.pool.idle_count(), 1);

        // Another call completes two thirds into the eviction window; the
        // wake at the threshold must leave the pool alone.
        tokio::time::sleep(Duration::from_secs(20)).await;
        let cancel = CancellationToken::new();
        let slot = fx.admission.acquire(&cancel).await.unwrap();
        drop(slot);

        tokio::time::sleep(Duration::from_secs(11)).await;
        assert_eq!(fx.pool.idle_count(), 1, "recent activity blocks eviction");

        // Quiet from here on: the following pass evicts.
        tokio::time::sleep(IDLE_AFTER).await;
        assert_eq!(fx.pool.idle_count(), 0);

        fx.shutdown.cancel();
        fx.handle.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn outstanding_calls_block_eviction() {
        let connector = Arc::new(ScriptedConnector::new());
        let fx = fixture(connector);

        one_call(&fx).await;
        let cancel = CancellationToken::new();
        let _held = fx.admission.acquire(&cancel).await.unwrap();

        tokio::time::sleep(IDLE_AFTER * 3).await;
        assert_eq!(
            fx.pool.idle_count(),
            1,
            "an active call keeps pooled connections alive"
        );

        fx.shutdown.cancel();
        fx.handle.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_drains_remaining_idle_connections() {
        init_tracing();
        let connector = Arc::new(ScriptedConnector::new());
        let transport = ScriptedTransport::hanging(Vec::new());
        let closed = transport.closed_flag();
        connector.push(transport);

        let fx = fixture(connector);
        one_call(&fx).await;
        assert_eq!(fx.pool.idle_count(), 1);

        // Cancel well before the idle threshold: the drain must not depend
        // on a reap pass having run.
        fx.shutdown.cancel();
        fx.handle.await.unwrap();

        assert_eq!(fx.pool.idle_count(), 0);
        assert!(closed.load(Ordering::Acquire));
    }
}
