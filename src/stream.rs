//! Streaming response assembly.
//!
//! A [`CompletionStream`] drives one leased duplex connection: frames are
//! buffered until a full message is available, the message is decoded as a
//! typed event, and text increments come out in strict index order. The
//! sequence is single-pass; it ends exactly when the session completes or
//! fails.

use std::sync::Arc;

use tokio_util::bytes::{Bytes, BytesMut};

use crate::admission::CallSlot;
use crate::client::LinkedCancel;
use crate::error::ClientError;
use crate::pool::{ConnectionPool, PooledConnection};
use crate::protocol::{StreamEvent, StreamPayload};
use crate::transport::WireFrame;

/// One fragment of generated text, tagged with its stream index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextIncrement {
    pub message_num: u64,
    pub text: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SessionState {
    Receiving,
    Completed,
    Failed,
}

/// Lazily yields the text increments of one streamed generation.
///
/// Increments come out in index order, at most once each; `next` returns
/// `None` once the session has completed or failed. The admission slot and
/// the leased connection are released on every exit path, including a
/// mid-stream drop.
pub struct CompletionStream {
    conn: Option<PooledConnection>,
    pool: Arc<ConnectionPool>,
    _slot: CallSlot,
    cancel: LinkedCancel,
    state: SessionState,
    next_expected: u64,
    buffer: BytesMut,
}

impl std::fmt::Debug for CompletionStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompletionStream")
            .field("state", &self.state)
            .field("next_expected", &self.next_expected)
            .field("buffered", &self.buffer.len())
            .finish_non_exhaustive()
    }
}

impl CompletionStream {
    pub(crate) fn new(
        conn: PooledConnection,
        pool: Arc<ConnectionPool>,
        slot: CallSlot,
        cancel: LinkedCancel,
        buffer_capacity: usize,
    ) -> Self {
        Self {
            conn: Some(conn),
            pool,
            _slot: slot,
            cancel,
            state: SessionState::Receiving,
            next_expected: 0,
            buffer: BytesMut::with_capacity(buffer_capacity),
        }
    }

    /// Next text increment, an error, or `None` once the stream is over.
    ///
    /// A yielded error is terminal: the sequence is exhausted afterwards.
    pub async fn next(&mut self) -> Option<Result<TextIncrement, ClientError>> {
        loop {
            if self.state != SessionState::Receiving {
                return None;
            }

            let message = match self.read_message().await {
                Ok(Some(message)) => message,
                Ok(None) => {
                    // Peer close without a stream_end event still terminates
                    // the stream normally.
                    self.finish(SessionState::Completed).await;
                    return None;
                }
                Err(e) => {
                    self.finish(SessionState::Failed).await;
                    return Some(Err(e));
                }
            };

            let payload: StreamPayload = match serde_json::from_slice(&message) {
                Ok(payload) => payload,
                Err(_) => {
                    let raw = String::from_utf8_lossy(&message).into_owned();
                    self.finish(SessionState::Failed).await;
                    return Some(Err(ClientError::InvalidResponseContent { raw }));
                }
            };

            match payload.classify() {
                StreamEvent::Text { message_num, text } => {
                    if message_num != self.next_expected {
                        let expected = self.next_expected;
                        self.finish(SessionState::Failed).await;
                        return Some(Err(ClientError::ProtocolOrderingViolation {
                            expected,
                            got: message_num,
                        }));
                    }
                    self.next_expected += 1;
                    return Some(Ok(TextIncrement { message_num, text }));
                }
                StreamEvent::End { .. } => {
                    self.finish(SessionState::Completed).await;
                    return None;
                }
                // Unrecognized events are ignored, not errors.
                StreamEvent::Other => continue,
            }
        }
    }

    /// Drain the remaining increments into one string.
    pub async fn collect_text(mut self) -> Result<String, ClientError> {
        let mut text = String::new();
        while let Some(item) = self.next().await {
            text.push_str(&item?.text);
        }
        Ok(text)
    }

    /// Read frames until one full message has been reassembled.
    ///
    /// `Ok(None)` means the peer closed (or the transport ended) cleanly.
    async fn read_message(&mut self) -> Result<Option<Bytes>, ClientError> {
        let Self {
            conn,
            cancel,
            buffer,
            ..
        } = self;
        let Some(conn) = conn.as_mut() else {
            return Ok(None);
        };
        let cancel = cancel.token().clone();

        buffer.clear();
        loop {
            let frame = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(ClientError::Cancelled),
                frame = conn.transport_mut().next_frame() => frame,
            };
            match frame {
                None => return Ok(None),
                Some(Err(e)) => return Err(ClientError::Transport(e.to_string())),
                Some(Ok(WireFrame::Close)) => return Ok(None),
                Some(Ok(WireFrame::Fragment {
                    payload,
                    end_of_message,
                })) => {
                    buffer.extend_from_slice(&payload);
                    // Decoding waits for the end-of-message marker; a partial
                    // message is never parsed.
                    if end_of_message {
                        return Ok(Some(buffer.split().freeze()));
                    }
                }
            }
        }
    }

    async fn finish(&mut self, state: SessionState) {
        self.state = state;
        if let Some(conn) = self.conn.take() {
            // Completed sessions hand the connection back for reuse; failed
            // or cancelled ones discard it: its read state is indeterminate.
            self.pool
                .give_back(conn, state == SessionState::Completed)
                .await;
        }
    }
}

impl Drop for CompletionStream {
    fn drop(&mut self) {
        if let Some(mut conn) = self.conn.take() {
            // Dropped mid-stream: never pooled. Close in the background when
            // a runtime is available; dropping the transport releases the
            // handle regardless.
            if let Ok(handle) = tokio::runtime::Handle::try_current() {
                handle.spawn(async move {
                    let _ = conn.transport_mut().close().await;
                });
            }
            tracing::debug!("Streaming session dropped mid-stream; discarding connection");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::admission::AdmissionController;
    use crate::client::LinkedCancel;
    use crate::config::ExhaustionPolicy;
    use crate::transport::testing::{
        ScriptedConnector, ScriptedTransport, end_frame, increment_frame, partial_frame,
        text_frame,
    };
    use std::io;
    use std::sync::atomic::{AtomicBool, Ordering};
    use tokio_util::sync::CancellationToken;

    struct Session {
        stream: CompletionStream,
        pool: Arc<ConnectionPool>,
        cancel: CancellationToken,
        closed: Arc<AtomicBool>,
    }

    async fn session_over(transport: ScriptedTransport) -> Session {
        let closed = transport.closed_flag();
        let connector = Arc::new(ScriptedConnector::new());
        connector.push(transport);

        let pool = Arc::new(ConnectionPool::new(connector, 2, ExhaustionPolicy::Wait));
        let admission = AdmissionController::new(0);
        let cancel = CancellationToken::new();
        let shutdown = CancellationToken::new();

        let slot = admission.acquire(&cancel).await.unwrap();
        let conn = pool.lease(&cancel).await.unwrap();
        let stream = CompletionStream::new(
            conn,
            Arc::clone(&pool),
            slot,
            LinkedCancel::new(&cancel, &shutdown),
            2048,
        );
        Session {
            stream,
            pool,
            cancel,
            closed,
        }
    }

    async fn session(frames: Vec<io::Result<WireFrame>>) -> Session {
        session_over(ScriptedTransport::new(frames)).await
    }

    #[tokio::test]
    async fn yields_increments_in_order_then_terminates() {
        let mut s = session(vec![
            increment_frame(0, "Hel"),
            increment_frame(1, "lo"),
            end_frame(2),
        ])
        .await;

        let first = s.stream.next().await.unwrap().unwrap();
        assert_eq!(first, TextIncrement { message_num: 0, text: "Hel".into() });
        let second = s.stream.next().await.unwrap().unwrap();
        assert_eq!(second, TextIncrement { message_num: 1, text: "lo".into() });

        assert!(s.stream.next().await.is_none());
        // Exhausted for good, and the connection went back for reuse.
        assert!(s.stream.next().await.is_none());
        assert_eq!(s.pool.idle_count(), 1);
    }

    #[tokio::test]
    async fn collect_text_concatenates() {
        let s = session(vec![
            increment_frame(0, "Hello, "),
            increment_frame(1, "world!"),
            end_frame(2),
        ])
        .await;
        assert_eq!(s.stream.collect_text().await.unwrap(), "Hello, world!");
    }

    #[tokio::test]
    async fn index_gap_fails_the_session() {
        let mut s = session(vec![
            increment_frame(0, "a"),
            increment_frame(1, "b"),
            increment_frame(3, "d"),
        ])
        .await;

        assert!(s.stream.next().await.unwrap().is_ok());
        assert!(s.stream.next().await.unwrap().is_ok());

        let err = s.stream.next().await.unwrap().unwrap_err();
        assert!(matches!(
            err,
            ClientError::ProtocolOrderingViolation { expected: 2, got: 3 }
        ));
        assert!(s.stream.next().await.is_none());
        assert_eq!(s.pool.idle_count(), 0, "failed session discards the connection");
    }

    #[tokio::test]
    async fn malformed_payload_fails_with_raw_content() {
        let mut s = session(vec![increment_frame(0, "a"), text_frame("not json")]).await;

        assert!(s.stream.next().await.unwrap().is_ok());
        let err = s.stream.next().await.unwrap().unwrap_err();
        match err {
            ClientError::InvalidResponseContent { raw } => assert_eq!(raw, "not json"),
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(s.stream.next().await.is_none());
        assert_eq!(s.pool.idle_count(), 0);
    }

    #[tokio::test]
    async fn fragmented_message_is_reassembled_before_decoding() {
        let mut s = session(vec![
            partial_frame(r#"{"event":"text_stream","mess"#),
            partial_frame(r#"age_num":0,"te"#),
            text_frame(r#"xt":"spliced"}"#),
            end_frame(1),
        ])
        .await;

        let first = s.stream.next().await.unwrap().unwrap();
        assert_eq!(first.text, "spliced");
        assert!(s.stream.next().await.is_none());
    }

    #[tokio::test]
    async fn unknown_events_are_skipped() {
        let mut s = session(vec![
            text_frame(r#"{"event":"keepalive","message_num":99}"#),
            increment_frame(0, "x"),
            end_frame(1),
        ])
        .await;

        let first = s.stream.next().await.unwrap().unwrap();
        assert_eq!(first.message_num, 0);
        assert!(s.stream.next().await.is_none());
    }

    #[tokio::test]
    async fn peer_close_completes_the_stream() {
        let mut s = session(vec![increment_frame(0, "x"), Ok(WireFrame::Close)]).await;

        assert!(s.stream.next().await.unwrap().is_ok());
        assert!(s.stream.next().await.is_none());
        // The transport is no longer open, so it cannot be pooled.
        assert_eq!(s.pool.idle_count(), 0);
    }

    #[tokio::test]
    async fn transport_error_fails_the_session() {
        let mut s = session(vec![
            increment_frame(0, "x"),
            Err(io::Error::other("connection reset")),
        ])
        .await;

        assert!(s.stream.next().await.unwrap().is_ok());
        let err = s.stream.next().await.unwrap().unwrap_err();
        assert!(matches!(err, ClientError::Transport(_)));
        assert_eq!(s.pool.idle_count(), 0);
    }

    #[tokio::test]
    async fn cancellation_discards_the_connection() {
        let mut s = session_over(ScriptedTransport::hanging(vec![increment_frame(0, "x")])).await;

        assert!(s.stream.next().await.unwrap().is_ok());

        s.cancel.cancel();
        let err = s.stream.next().await.unwrap().unwrap_err();
        assert!(matches!(err, ClientError::Cancelled));
        assert!(s.stream.next().await.is_none());

        assert_eq!(s.pool.idle_count(), 0, "cancelled session never pools");
        assert!(s.closed.load(Ordering::Acquire), "discard closes the transport");
    }

    #[tokio::test]
    async fn dropping_mid_stream_discards_the_connection() {
        let s = session_over(ScriptedTransport::hanging(vec![increment_frame(0, "x")])).await;
        let pool = Arc::clone(&s.pool);

        drop(s.stream);
        tokio::task::yield_now().await;
        assert_eq!(pool.idle_count(), 0);
    }
}
