//! JSON-RPC Client
//!
//! Speaks JSON-RPC 2.0 notifications over one [`FrameTransport`]. There are
//! no request ids: `send` fires a request without waiting, and `read_typed`
//! accepts the next frame only if it carries the method the caller expects.

use std::sync::Arc;

use serde::Serialize;
use serde::de::DeserializeOwned;

use super::envelope::{IncomingRequest, JSONRPC_VERSION, OutgoingRequest};
use super::error::RpcError;
use crate::application::ports::FrameTransport;
use crate::infrastructure::bufferpool::BufferPool;
use crate::infrastructure::websocket::{ConnectError, WsTransport};

/// JSON-RPC 2.0 client bound to a single connection.
///
/// Clones share the connection, so one clone may `close()` while another is
/// blocked in `read_typed`.
#[derive(Clone)]
pub struct RpcClient {
    transport: Arc<dyn FrameTransport>,
    buffers: BufferPool,
}

impl std::fmt::Debug for RpcClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RpcClient")
            .field("closed", &self.transport.is_closed())
            .finish_non_exhaustive()
    }
}

impl RpcClient {
    /// Connect to a WebSocket JSON-RPC endpoint.
    ///
    /// Closing the client is the caller's responsibility.
    ///
    /// # Errors
    ///
    /// Returns [`ConnectError`] if the connection cannot be established.
    pub async fn connect(endpoint: &str) -> Result<Self, ConnectError> {
        let transport = WsTransport::connect(endpoint).await?;
        Ok(Self::with_transport(Arc::new(transport), BufferPool::new()))
    }

    /// Build a client over an existing transport and encode-buffer pool.
    #[must_use]
    pub fn with_transport(transport: Arc<dyn FrameTransport>, buffers: BufferPool) -> Self {
        Self { transport, buffers }
    }

    /// Send a request. No response is awaited.
    ///
    /// # Errors
    ///
    /// Returns [`RpcError::Encode`] if `params` cannot be serialized, or
    /// [`RpcError::Transport`] if the frame cannot be written.
    pub async fn send<P: Serialize + Sync>(
        &self,
        method: &str,
        params: Option<&P>,
    ) -> Result<(), RpcError> {
        let frame = {
            let mut buf = self.buffers.acquire();
            serde_json::to_writer(&mut *buf, &OutgoingRequest::new(method, params))
                .map_err(RpcError::Encode)?;
            // serde_json only emits UTF-8.
            String::from_utf8_lossy(&buf).into_owned()
        };

        tracing::trace!(method, frame = %frame, "Sending JSON-RPC request");
        self.transport.write_frame(frame).await?;
        Ok(())
    }

    /// Read one frame and decode its params as `T`.
    ///
    /// Checks run in order: envelope shape, protocol version, method, params.
    /// `T` is only decoded once every earlier check has passed.
    ///
    /// # Errors
    ///
    /// Returns [`RpcError::Transport`] if no frame could be read,
    /// [`RpcError::MalformedEnvelope`] if the frame is not an envelope,
    /// [`RpcError::VersionMismatch`] / [`RpcError::MethodMismatch`] if it does
    /// not match, and [`RpcError::Decode`] if `params` is not a `T`.
    pub async fn read_typed<T: DeserializeOwned>(&self, method: &str) -> Result<T, RpcError> {
        let frame = self.transport.read_frame().await?;
        Self::accept(&frame, method)
    }

    /// Validate a raw frame against `method` and decode its params.
    fn accept<T: DeserializeOwned>(frame: &str, method: &str) -> Result<T, RpcError> {
        let req: IncomingRequest =
            serde_json::from_str(frame).map_err(RpcError::MalformedEnvelope)?;

        if req.jsonrpc != JSONRPC_VERSION {
            return Err(RpcError::VersionMismatch {
                observed: req.jsonrpc,
                expected: JSONRPC_VERSION.to_string(),
            });
        }

        if req.method != method {
            return Err(RpcError::MethodMismatch {
                observed: req.method,
                expected: method.to_string(),
            });
        }

        serde_json::from_str(req.params_json()).map_err(RpcError::Decode)
    }

    /// Close the underlying connection. Idempotent.
    pub async fn close(&self) {
        self.transport.close().await;
    }

    /// Whether the underlying connection is closed.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.transport.is_closed()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use mockall::predicate::eq;
    use serde::Deserialize;
    use test_case::test_case;

    use super::*;
    use crate::application::ports::{MockFrameTransport, TransportError};

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct ChannelParams {
        channel: String,
    }

    fn client_reading(frame: &'static str) -> RpcClient {
        let mut transport = MockFrameTransport::new();
        transport
            .expect_read_frame()
            .times(1)
            .returning(move || Ok(frame.to_string()));
        RpcClient::with_transport(Arc::new(transport), BufferPool::new())
    }

    static DECODE_CALLS: AtomicUsize = AtomicUsize::new(0);

    /// Counts how often decoding is attempted.
    #[derive(Debug)]
    struct CountingParams;

    impl<'de> Deserialize<'de> for CountingParams {
        fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
            DECODE_CALLS.fetch_add(1, Ordering::SeqCst);
            serde::de::IgnoredAny::deserialize(deserializer)?;
            Ok(Self)
        }
    }

    #[tokio::test]
    async fn send_writes_one_subscribe_frame() {
        let mut transport = MockFrameTransport::new();
        transport
            .expect_write_frame()
            .with(eq(
                r#"{"jsonrpc":"2.0","method":"subscribe","params":{"channel":"lightning_ticker_BTC_JPY"}}"#
                    .to_string(),
            ))
            .times(1)
            .returning(|_| Ok(()));
        let client = RpcClient::with_transport(Arc::new(transport), BufferPool::new());

        let params = ChannelParams {
            channel: "lightning_ticker_BTC_JPY".to_string(),
        };
        client.send("subscribe", Some(&params)).await.unwrap();
    }

    #[tokio::test]
    async fn send_omits_absent_params() {
        let mut transport = MockFrameTransport::new();
        transport
            .expect_write_frame()
            .with(eq(r#"{"jsonrpc":"2.0","method":"heartbeat"}"#.to_string()))
            .times(1)
            .returning(|_| Ok(()));
        let client = RpcClient::with_transport(Arc::new(transport), BufferPool::new());

        client.send::<()>("heartbeat", None).await.unwrap();
    }

    #[tokio::test]
    async fn send_returns_encode_buffer_to_pool() {
        let mut transport = MockFrameTransport::new();
        transport.expect_write_frame().returning(|_| Ok(()));
        let pool = BufferPool::new();
        let client = RpcClient::with_transport(Arc::new(transport), pool.clone());

        client.send::<()>("heartbeat", None).await.unwrap();
        assert_eq!(pool.idle_count(), 1);
    }

    #[tokio::test]
    async fn send_surfaces_transport_failure() {
        let mut transport = MockFrameTransport::new();
        transport
            .expect_write_frame()
            .returning(|_| Err(TransportError::Closed));
        let client = RpcClient::with_transport(Arc::new(transport), BufferPool::new());

        let err = client.send::<()>("heartbeat", None).await.unwrap_err();
        assert!(matches!(err, RpcError::Transport(TransportError::Closed)));
        assert!(!err.is_recoverable());
    }

    #[tokio::test]
    async fn read_typed_decodes_matching_params() {
        let client = client_reading(
            r#"{"jsonrpc":"2.0","method":"channelMessage","params":{"channel":"lightning_ticker_BTC_JPY"}}"#,
        );

        let params: ChannelParams = client.read_typed("channelMessage").await.unwrap();
        assert_eq!(params.channel, "lightning_ticker_BTC_JPY");
    }

    #[tokio::test]
    async fn method_mismatch_never_decodes_params() {
        let client = client_reading(r#"{"jsonrpc":"2.0","method":"other","params":{"x":1}}"#);
        let before = DECODE_CALLS.load(Ordering::SeqCst);

        let err = client
            .read_typed::<CountingParams>("channelMessage")
            .await
            .unwrap_err();

        match err {
            RpcError::MethodMismatch { observed, expected } => {
                assert_eq!(observed, "other");
                assert_eq!(expected, "channelMessage");
            }
            other => panic!("expected MethodMismatch, got {other:?}"),
        }
        assert_eq!(DECODE_CALLS.load(Ordering::SeqCst), before);
    }

    #[test_case(r#"{"jsonrpc":"1.0","method":"channelMessage","params":{}}"# ; "old version")]
    #[test_case(r#"{"jsonrpc":"1.0","method":"other","params":{}}"# ; "version checked before method")]
    #[test_case(r#"{"jsonrpc":"","method":"channelMessage"}"# ; "empty version")]
    #[tokio::test]
    async fn version_mismatch_is_reported(frame: &'static str) {
        let client = client_reading(frame);

        let err = client
            .read_typed::<serde_json::Value>("channelMessage")
            .await
            .unwrap_err();

        assert!(
            matches!(&err, RpcError::VersionMismatch { expected, .. } if expected == "2.0"),
            "got {err:?}"
        );
        assert!(err.is_recoverable());
    }

    #[test_case("not json" ; "garbage")]
    #[test_case(r#"{"jsonrpc":"2.0","id":1,"result":true}"# ; "response without method")]
    #[tokio::test]
    async fn non_envelope_frames_are_malformed(frame: &'static str) {
        let client = client_reading(frame);

        let err = client
            .read_typed::<serde_json::Value>("channelMessage")
            .await
            .unwrap_err();

        assert!(matches!(err, RpcError::MalformedEnvelope(_)), "got {err:?}");
    }

    #[tokio::test]
    async fn params_shape_mismatch_is_decode_error() {
        let client =
            client_reading(r#"{"jsonrpc":"2.0","method":"channelMessage","params":[1,2,3]}"#);

        let err = client
            .read_typed::<ChannelParams>("channelMessage")
            .await
            .unwrap_err();

        assert!(matches!(err, RpcError::Decode(_)), "got {err:?}");
        assert_eq!(err.kind(), "decode");
    }

    #[tokio::test]
    async fn read_surfaces_transport_failure() {
        let mut transport = MockFrameTransport::new();
        transport
            .expect_read_frame()
            .returning(|| Err(TransportError::Closed));
        let client = RpcClient::with_transport(Arc::new(transport), BufferPool::new());

        let err = client
            .read_typed::<serde_json::Value>("channelMessage")
            .await
            .unwrap_err();
        assert!(matches!(err, RpcError::Transport(TransportError::Closed)));
    }

    #[tokio::test]
    async fn close_delegates_to_transport() {
        let mut transport = MockFrameTransport::new();
        transport.expect_close().times(2).returning(|| ());
        let client = RpcClient::with_transport(Arc::new(transport), BufferPool::new());

        client.close().await;
        client.close().await;
    }

    mod props {
        use parking_lot::Mutex;
        use proptest::prelude::*;

        use super::*;

        /// Send through a client whose transport captures the written frame.
        fn send_captured(method: &str, params: &serde_json::Value) -> String {
            let captured = Arc::new(Mutex::new(None));
            let sink = Arc::clone(&captured);

            let mut transport = MockFrameTransport::new();
            transport
                .expect_write_frame()
                .times(1)
                .returning(move |frame| {
                    *sink.lock() = Some(frame);
                    Ok(())
                });
            let client = RpcClient::with_transport(Arc::new(transport), BufferPool::new());

            tokio::runtime::Builder::new_current_thread()
                .build()
                .unwrap()
                .block_on(client.send(method, Some(params)))
                .unwrap();

            let frame = captured.lock().take();
            frame.unwrap()
        }

        proptest! {
            #[test]
            fn sent_request_decodes_on_the_peer(
                method in "[a-zA-Z_][a-zA-Z0-9_.]{0,24}",
                channel in "\\PC{0,40}",
                depth in any::<u32>(),
            ) {
                let params = serde_json::json!({ "channel": channel, "depth": depth });
                let frame = send_captured(&method, &params);

                let decoded: IncomingRequest = serde_json::from_str(&frame).unwrap();
                prop_assert_eq!(decoded.jsonrpc.as_str(), JSONRPC_VERSION);
                prop_assert_eq!(&decoded.method, &method);
                let round: serde_json::Value = serde_json::from_str(decoded.params_json()).unwrap();
                prop_assert_eq!(round, params);
            }
        }
    }
}
