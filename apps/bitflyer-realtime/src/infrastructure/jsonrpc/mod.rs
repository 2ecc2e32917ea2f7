//! JSON-RPC 2.0 over WebSocket
//!
//! - `envelope`: wire types for outgoing and incoming requests
//! - `client`: send/read operations with strict version and method checks
//! - `error`: error taxonomy separating transport failures from per-frame ones

pub mod client;
pub mod envelope;
pub mod error;

pub use client::RpcClient;
pub use envelope::{IncomingRequest, JSONRPC_VERSION, OutgoingRequest};
pub use error::RpcError;
