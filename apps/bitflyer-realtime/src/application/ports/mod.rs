//! Port Interfaces
//!
//! ## Driven Ports (Outbound)
//!
//! - `FrameTransport`: one live message-socket connection carrying text frames.
//!   The WebSocket adapter lives in `infrastructure::websocket`.

use async_trait::async_trait;

/// Errors raised on an established connection.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The connection was closed, locally or by the peer.
    #[error("connection closed")]
    Closed,

    /// Protocol or network failure reported by the adapter.
    #[error("connection failed: {0}")]
    Failed(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// A frame arrived that cannot be read as text.
    #[error("invalid frame: {0}")]
    InvalidFrame(String),
}

/// A single bidirectional text-frame connection.
///
/// Implementations make no retry attempts. `close` may be called from any
/// task, including while another task is awaiting `read_frame`; the pending
/// read must then resolve with [`TransportError::Closed`].
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait FrameTransport: Send + Sync {
    /// Write one text frame.
    async fn write_frame(&self, text: String) -> Result<(), TransportError>;

    /// Read the next text frame, skipping control frames.
    async fn read_frame(&self) -> Result<String, TransportError>;

    /// Close the connection. Idempotent.
    async fn close(&self);

    /// Whether `close` has been called or the peer hung up.
    fn is_closed(&self) -> bool;
}
