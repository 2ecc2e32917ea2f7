//! JSON-RPC client errors.

use crate::application::ports::TransportError;

/// Errors from [`super::RpcClient`] operations.
#[derive(Debug, thiserror::Error)]
pub enum RpcError {
    /// The connection failed. Fatal to anything reading from it.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// The outgoing request could not be serialized.
    #[error("encoding request: {0}")]
    Encode(#[source] serde_json::Error),

    /// The frame is not a JSON-RPC envelope.
    #[error("malformed envelope: {0}")]
    MalformedEnvelope(#[source] serde_json::Error),

    /// The envelope carries another protocol version.
    #[error("jsonrpc version mismatch: {observed} != {expected}")]
    VersionMismatch {
        /// Version found in the frame.
        observed: String,
        /// Version this client speaks.
        expected: String,
    },

    /// The envelope carries another method than the one being read.
    #[error("method mismatch: {observed} != {expected}")]
    MethodMismatch {
        /// Method found in the frame.
        observed: String,
        /// Method the caller asked for.
        expected: String,
    },

    /// `params` did not match the requested shape.
    #[error("decoding params: {0}")]
    Decode(#[source] serde_json::Error),
}

impl RpcError {
    /// Whether the connection is still usable after this error.
    #[must_use]
    pub const fn is_recoverable(&self) -> bool {
        !matches!(self, Self::Transport(_))
    }

    /// Short label used for metrics and logs.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Transport(_) => "transport",
            Self::Encode(_) => "encode",
            Self::MalformedEnvelope(_) => "malformed_envelope",
            Self::VersionMismatch { .. } => "version_mismatch",
            Self::MethodMismatch { .. } => "method_mismatch",
            Self::Decode(_) => "decode",
        }
    }
}
