//! Client facade: ties admission, pooling, reaping, and the two call paths
//! together.

use std::sync::Arc;
use std::sync::Mutex as StdMutex;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::admission::AdmissionController;
use crate::blocking::BlockingExecutor;
use crate::config::ClientConfig;
use crate::error::ClientError;
use crate::pool::ConnectionPool;
use crate::reaper;
use crate::request::CompletionRequest;
use crate::stream::CompletionStream;
use crate::transport::{Connector, WsConnector};

/// Links a caller's cancellation token with client shutdown so every
/// suspension point in a call watches a single token. The forwarder task is
/// aborted when the link drops.
pub(crate) struct LinkedCancel {
    token: CancellationToken,
    forwarder: Option<JoinHandle<()>>,
}

impl LinkedCancel {
    pub(crate) fn new(caller: &CancellationToken, shutdown: &CancellationToken) -> Self {
        let token = shutdown.child_token();
        if caller.is_cancelled() {
            token.cancel();
            return Self {
                token,
                forwarder: None,
            };
        }
        let linked = token.clone();
        let caller = caller.clone();
        let forwarder = tokio::spawn(async move {
            tokio::select! {
                _ = caller.cancelled() => linked.cancel(),
                _ = linked.cancelled() => {}
            }
        });
        Self {
            token,
            forwarder: Some(forwarder),
        }
    }

    pub(crate) fn token(&self) -> &CancellationToken {
        &self.token
    }
}

impl Drop for LinkedCancel {
    fn drop(&mut self) {
        if let Some(forwarder) = self.forwarder.take() {
            forwarder.abort();
        }
    }
}

/// Asynchronous client for a KoboldCpp-compatible generation service.
///
/// Construction spawns the idle reaper, so the client must be created inside
/// a tokio runtime. [`shutdown`](Self::shutdown) stops the reaper and closes
/// every pooled connection; dropping the client without calling it still
/// cancels the reaper, which drains the pool on its way out.
pub struct Client {
    config: ClientConfig,
    admission: AdmissionController,
    pool: Arc<ConnectionPool>,
    executor: BlockingExecutor,
    shutdown: CancellationToken,
    reaper: StdMutex<Option<JoinHandle<()>>>,
}

impl Client {
    /// Client over a live websocket connector to the configured endpoint.
    pub fn new(config: ClientConfig) -> Result<Self, ClientError> {
        let connector = Arc::new(WsConnector::new(
            config.streaming_url(),
            config.request_timeout,
        ));
        Self::with_connector(config, connector)
    }

    /// Client over a custom duplex connector.
    pub fn with_connector(
        config: ClientConfig,
        connector: Arc<dyn Connector>,
    ) -> Result<Self, ClientError> {
        let admission = AdmissionController::new(config.max_concurrency);
        let pool = Arc::new(ConnectionPool::new(
            connector,
            config.max_connections,
            config.exhaustion_policy,
        ));
        let executor = BlockingExecutor::new(&config)?;
        let shutdown = CancellationToken::new();
        let reaper = reaper::spawn(
            Arc::clone(&pool),
            admission.clone(),
            config.idle_eviction,
            shutdown.clone(),
        );
        Ok(Self {
            config,
            admission,
            pool,
            executor,
            shutdown,
            reaper: StdMutex::new(Some(reaper)),
        })
    }

    /// Run a blocking completion and return the generated texts.
    pub async fn complete(
        &self,
        request: &CompletionRequest,
        cancel: &CancellationToken,
    ) -> Result<Vec<String>, ClientError> {
        let linked = LinkedCancel::new(cancel, &self.shutdown);
        // The slot is released (and last-activity stamped) by drop, on every
        // exit path.
        let _slot = self.admission.acquire(linked.token()).await?;

        let payload = request.to_payload();
        tokio::select! {
            biased;
            _ = linked.token().cancelled() => Err(ClientError::Cancelled),
            result = self.executor.send(&payload) => result,
        }
    }

    /// Start a streamed completion: sends the request over a pooled duplex
    /// connection and returns the lazy increment sequence.
    pub async fn complete_streaming(
        &self,
        request: &CompletionRequest,
        cancel: &CancellationToken,
    ) -> Result<CompletionStream, ClientError> {
        let linked = LinkedCancel::new(cancel, &self.shutdown);
        let slot = self.admission.acquire(linked.token()).await?;
        // A lease failure drops the slot right here: admission is released
        // even when no connection was ever obtained.
        let mut conn = self.pool.lease(linked.token()).await?;

        let payload = serde_json::to_string(&request.to_payload())
            .expect("request payload serializes to JSON");
        if let Err(e) = conn.transport_mut().send_text(payload).await {
            self.pool.give_back(conn, false).await;
            return Err(ClientError::Transport(format!("send request: {e}")));
        }

        Ok(CompletionStream::new(
            conn,
            Arc::clone(&self.pool),
            slot,
            linked,
            self.config.stream_buffer_size,
        ))
    }

    /// Stop the reaper and close all pooled connections. In-flight calls
    /// fail with [`ClientError::Cancelled`].
    pub async fn shutdown(&self) {
        self.shutdown.cancel();
        let handle = match self.reaper.lock() {
            Ok(mut guard) => guard.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };
        if let Some(handle) = handle
            && let Err(e) = handle.await
        {
            tracing::warn!(error = %e, "Reaper task ended abnormally");
        }
    }

    /// Calls currently in flight (blocking and streaming).
    pub fn outstanding_calls(&self) -> usize {
        self.admission.outstanding()
    }

    /// Connections currently idle in the pool.
    pub fn idle_connections(&self) -> usize {
        self.pool.idle_count()
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }
}

impl Drop for Client {
    fn drop(&mut self) {
        // Stops the reaper; it drains remaining idle connections on exit.
        self.shutdown.cancel();
    }
}
