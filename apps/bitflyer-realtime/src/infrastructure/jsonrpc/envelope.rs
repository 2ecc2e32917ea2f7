//! JSON-RPC 2.0 Envelopes
//!
//! # Wire Format (JSON)
//!
//! Outgoing:
//! ```json
//! {"jsonrpc":"2.0","method":"subscribe","params":{"channel":"lightning_ticker_BTC_JPY"}}
//! ```
//!
//! Incoming:
//! ```json
//! {"jsonrpc":"2.0","method":"channelMessage","params":{"channel":"...","message":{}}}
//! ```

use serde::{Deserialize, Serialize};
use serde_json::value::RawValue;

/// Protocol version carried by every envelope.
pub const JSONRPC_VERSION: &str = "2.0";

/// Request written to the peer. No `id`: every call is a notification.
#[derive(Debug, Serialize)]
pub struct OutgoingRequest<'a, P: Serialize> {
    /// Always [`JSONRPC_VERSION`].
    pub jsonrpc: &'static str,

    /// Method name.
    pub method: &'a str,

    /// Parameters, omitted when absent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<&'a P>,
}

impl<'a, P: Serialize> OutgoingRequest<'a, P> {
    /// Build a request for `method`.
    #[must_use]
    pub const fn new(method: &'a str, params: Option<&'a P>) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION,
            method,
            params,
        }
    }
}

/// Request or notification received from the peer.
///
/// `params` stays as raw JSON until the caller names a target type.
#[derive(Debug, Deserialize)]
pub struct IncomingRequest {
    /// Version as sent by the peer.
    pub jsonrpc: String,

    /// Method name as sent by the peer.
    pub method: String,

    /// Undecoded parameters.
    #[serde(default)]
    pub params: Option<Box<RawValue>>,
}

impl IncomingRequest {
    /// Raw params text, `null` when absent.
    #[must_use]
    pub fn params_json(&self) -> &str {
        self.params.as_deref().map_or("null", RawValue::get)
    }
}
