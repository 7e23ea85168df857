//! Duplex transport seam for the streaming path.
//!
//! The assembler and pool work against [`DuplexTransport`]/[`Connector`]
//! rather than a concrete socket, so message reassembly and pooling can be
//! exercised without a live endpoint. [`WsConnector`] is the production
//! implementation over a websocket.

use std::io;
use std::time::Duration;

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::http::header::USER_AGENT;
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tokio_util::bytes::Bytes;

use crate::config::USER_AGENT_VALUE;

/// One transport-level chunk of a duplex stream.
///
/// A single application message may arrive as several fragments; the final
/// one carries `end_of_message`.
#[derive(Debug)]
pub enum WireFrame {
    Fragment { payload: Bytes, end_of_message: bool },
    /// Peer-initiated close.
    Close,
}

/// A persistent bidirectional connection carrying framed text messages.
#[async_trait]
pub trait DuplexTransport: Send {
    /// Send one complete text message.
    async fn send_text(&mut self, payload: String) -> io::Result<()>;

    /// Receive the next frame. `None` means the transport is exhausted.
    async fn next_frame(&mut self) -> Option<io::Result<WireFrame>>;

    /// Graceful close handshake. The underlying handle is released when the
    /// transport is dropped, whether or not this succeeds.
    async fn close(&mut self) -> io::Result<()>;

    /// Whether the connection is still believed open and usable.
    fn is_open(&self) -> bool;
}

/// Establishes fresh duplex connections, including the protocol handshake.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self) -> io::Result<Box<dyn DuplexTransport>>;
}

fn to_io(error: tungstenite::Error) -> io::Error {
    io::Error::other(error.to_string())
}

/// Websocket-backed transport.
pub struct WebSocketTransport {
    inner: WebSocketStream<MaybeTlsStream<TcpStream>>,
    open: bool,
}

#[async_trait]
impl DuplexTransport for WebSocketTransport {
    async fn send_text(&mut self, payload: String) -> io::Result<()> {
        let result = self.inner.send(Message::Text(payload.into())).await;
        if let Err(e) = result {
            self.open = false;
            return Err(to_io(e));
        }
        Ok(())
    }

    async fn next_frame(&mut self) -> Option<io::Result<WireFrame>> {
        loop {
            match self.inner.next().await {
                None => {
                    self.open = false;
                    return None;
                }
                Some(Err(e)) => {
                    self.open = false;
                    return Some(Err(to_io(e)));
                }
                Some(Ok(Message::Text(text))) => {
                    // The websocket layer reassembles wire fragments, so a
                    // text message always arrives whole.
                    return Some(Ok(WireFrame::Fragment {
                        payload: Bytes::copy_from_slice(text.as_bytes()),
                        end_of_message: true,
                    }));
                }
                Some(Ok(Message::Close(_))) => {
                    self.open = false;
                    return Some(Ok(WireFrame::Close));
                }
                // Binary payloads and control pings are not part of the protocol.
                Some(Ok(_)) => continue,
            }
        }
    }

    async fn close(&mut self) -> io::Result<()> {
        if !self.open {
            return Ok(());
        }
        self.open = false;
        match self.inner.close(None).await {
            Ok(())
            | Err(tungstenite::Error::ConnectionClosed | tungstenite::Error::AlreadyClosed) => {
                Ok(())
            }
            Err(e) => Err(to_io(e)),
        }
    }

    fn is_open(&self) -> bool {
        self.open
    }
}

/// Production connector: opens a websocket to the streaming endpoint.
pub struct WsConnector {
    url: String,
    connect_timeout: Duration,
}

impl WsConnector {
    pub fn new(url: String, connect_timeout: Duration) -> Self {
        Self {
            url,
            connect_timeout,
        }
    }
}

#[async_trait]
impl Connector for WsConnector {
    async fn connect(&self) -> io::Result<Box<dyn DuplexTransport>> {
        let mut request = self.url.as_str().into_client_request().map_err(to_io)?;
        request
            .headers_mut()
            .insert(USER_AGENT, HeaderValue::from_static(USER_AGENT_VALUE));

        let (stream, _response) = tokio::time::timeout(self.connect_timeout, connect_async(request))
            .await
            .map_err(|_| {
                io::Error::new(
                    io::ErrorKind::TimedOut,
                    format!("websocket connect to {} timed out", self.url),
                )
            })?
            .map_err(to_io)?;

        tracing::debug!(url = %self.url, "Opened streaming connection");
        Ok(Box::new(WebSocketTransport {
            inner: stream,
            open: true,
        }))
    }
}
