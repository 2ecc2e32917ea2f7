//! WebSocket Transport
//!
//! [`FrameTransport`] adapter over a single `tokio-tungstenite` connection.
//! The socket is split so a writer never waits on a pending read. A shutdown
//! token owned by the transport lets `close()` interrupt a read in progress.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tokio_util::sync::CancellationToken;

use crate::application::ports::{FrameTransport, TransportError};

/// Upper bound on the close handshake so `close()` never hangs.
const CLOSE_TIMEOUT: Duration = Duration::from_secs(2);

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

impl From<tungstenite::Error> for TransportError {
    fn from(err: tungstenite::Error) -> Self {
        Self::Failed(Box::new(err))
    }
}

/// Reject anything but `ws://` and `wss://` before dialing.
fn check_scheme(endpoint: &str) -> Result<(), ConnectError> {
    let scheme = endpoint
        .split_once("://")
        .map(|(scheme, _)| scheme.to_ascii_lowercase());

    match scheme.as_deref() {
        Some("ws" | "wss") => Ok(()),
        _ => Err(ConnectError::InvalidEndpoint {
            endpoint: endpoint.to_string(),
            reason: "expected a ws:// or wss:// URL".to_string(),
        }),
    }
}

/// Errors raised while establishing a connection.
#[derive(Debug, thiserror::Error)]
pub enum ConnectError {
    /// The endpoint is not a usable WebSocket URL.
    #[error("invalid endpoint {endpoint}: {reason}")]
    InvalidEndpoint {
        /// Endpoint as given.
        endpoint: String,
        /// Why it was rejected.
        reason: String,
    },

    /// TCP, TLS or WebSocket handshake failed.
    #[error("WebSocket connection to {endpoint} failed: {source}")]
    Handshake {
        /// Endpoint as given.
        endpoint: String,
        /// Underlying failure.
        #[source]
        source: Box<tungstenite::Error>,
    },
}

/// WebSocket connection carrying JSON-RPC text frames.
pub struct WsTransport {
    sink: Mutex<SplitSink<WsStream, Message>>,
    stream: Mutex<SplitStream<WsStream>>,
    shutdown: CancellationToken,
    closed: AtomicBool,
}

impl WsTransport {
    /// Connect to `endpoint` with a single attempt.
    ///
    /// # Errors
    ///
    /// Returns [`ConnectError`] if the URL is malformed or the handshake fails.
    pub async fn connect(endpoint: &str) -> Result<Self, ConnectError> {
        check_scheme(endpoint)?;
        tracing::info!(endpoint, "Connecting to realtime endpoint");

        let (ws_stream, _response) =
            tokio_tungstenite::connect_async(endpoint)
                .await
                .map_err(|e| match e {
                    tungstenite::Error::Url(url_err) => ConnectError::InvalidEndpoint {
                        endpoint: endpoint.to_string(),
                        reason: url_err.to_string(),
                    },
                    tungstenite::Error::HttpFormat(http_err) => ConnectError::InvalidEndpoint {
                        endpoint: endpoint.to_string(),
                        reason: http_err.to_string(),
                    },
                    other => ConnectError::Handshake {
                        endpoint: endpoint.to_string(),
                        source: Box::new(other),
                    },
                })?;

        tracing::debug!(endpoint, "WebSocket handshake complete");

        let (sink, stream) = ws_stream.split();
        Ok(Self {
            sink: Mutex::new(sink),
            stream: Mutex::new(stream),
            shutdown: CancellationToken::new(),
            closed: AtomicBool::new(false),
        })
    }

    fn mark_closed(&self) {
        self.closed.store(true, Ordering::SeqCst);
        self.shutdown.cancel();
    }
}

#[async_trait]
impl FrameTransport for WsTransport {
    async fn write_frame(&self, text: String) -> Result<(), TransportError> {
        if self.is_closed() {
            return Err(TransportError::Closed);
        }

        let mut sink = self.sink.lock().await;
        sink.send(Message::Text(text.into())).await?;
        Ok(())
    }

    async fn read_frame(&self) -> Result<String, TransportError> {
        if self.is_closed() {
            return Err(TransportError::Closed);
        }

        let mut stream = tokio::select! {
            () = self.shutdown.cancelled() => return Err(TransportError::Closed),
            guard = self.stream.lock() => guard,
        };

        loop {
            let next = tokio::select! {
                biased;
                () = self.shutdown.cancelled() => return Err(TransportError::Closed),
                next = stream.next() => next,
            };

            match next {
                Some(Ok(Message::Text(text))) => return Ok(text.as_str().to_owned()),
                Some(Ok(Message::Binary(data))) => {
                    return String::from_utf8(data.to_vec()).map_err(|_| {
                        TransportError::InvalidFrame("binary frame is not UTF-8".to_string())
                    });
                }
                Some(Ok(Message::Ping(_) | Message::Pong(_) | Message::Frame(_))) => {}
                Some(Ok(Message::Close(frame))) => {
                    tracing::info!(?frame, "Server sent close frame");
                    self.mark_closed();
                    return Err(TransportError::Closed);
                }
                Some(Err(e)) => {
                    self.mark_closed();
                    return Err(e.into());
                }
                None => {
                    tracing::info!("WebSocket stream ended");
                    self.mark_closed();
                    return Err(TransportError::Closed);
                }
            }
        }
    }

    async fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) && self.shutdown.is_cancelled() {
            return;
        }
        self.shutdown.cancel();

        let mut sink = self.sink.lock().await;
        match tokio::time::timeout(CLOSE_TIMEOUT, sink.close()).await {
            Ok(Ok(())) => tracing::debug!("WebSocket closed"),
            Ok(Err(e)) => tracing::debug!(error = %e, "WebSocket close handshake failed"),
            Err(_) => tracing::debug!("WebSocket close handshake timed out"),
        }
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}
