#![cfg_attr(
    test,
    allow(
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::float_cmp,
        clippy::significant_drop_tightening,
        clippy::too_many_lines,
        clippy::needless_pass_by_value,
        clippy::items_after_statements
    )
)]

//! bitFlyer Realtime - JSON-RPC Channel Subscriptions
//!
//! A JSON-RPC 2.0 client over a single WebSocket connection, and typed
//! channel subscriptions fed by a background pump into a bounded queue.
//!
//! # Layers (inside -> outside)
//!
//! - **Domain**: Subscription lifecycle
//!   - `streaming`: Stream states and close reasons
//!
//! - **Application**: Port definitions
//!   - `ports`: Frame transport interface
//!
//! - **Infrastructure**: Adapters and protocol machinery
//!   - `websocket`: WebSocket frame transport
//!   - `jsonrpc`: Envelope encoding and validation
//!   - `stream`: Subscriptions and their pumps
//!   - `bitflyer`: Lightning ticker and executions channels
//!   - `config`, `telemetry`, `metrics`, `bufferpool`
//!
//! # Data Flow
//!
//! ```text
//! subscribe(channel) -> RpcClient::send -> WsTransport::write_frame
//!
//! WsTransport::read_frame -> RpcClient::read_typed("channelMessage")
//!     -> pump: match channel, decode message -> bounded queue -> Subscription::recv
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::pedantic)]

// =============================================================================
// Module Declarations
// =============================================================================

/// Domain layer - Stream lifecycle types with no external dependencies.
pub mod domain;

/// Application layer - Port definitions.
pub mod application;

/// Infrastructure layer - Adapters and protocol machinery.
pub mod infrastructure;

// =============================================================================
// Re-exports
// =============================================================================

// Domain types
pub use domain::streaming::{CloseReason, StreamState};

// Ports
pub use application::ports::{FrameTransport, TransportError};

// Infrastructure config
pub use infrastructure::config::{ConfigError, StreamSettings};

// Transport and RPC
pub use infrastructure::bufferpool::{BufferPool, PooledBuffer};
pub use infrastructure::jsonrpc::{RpcClient, RpcError};
pub use infrastructure::websocket::{ConnectError, WsTransport};

// Subscriptions
pub use infrastructure::stream::{
    BackoffConfig, ChannelStream, DEFAULT_QUEUE_CAPACITY, StreamConfig, Subscription,
};

// bitFlyer
pub use infrastructure::bitflyer::{
    DEFAULT_REALTIME_ENDPOINT, Execution, RealtimeClient, RealtimeError, Side, Ticker,
};

// Telemetry
pub use infrastructure::telemetry::{TelemetryConfig, TelemetryGuard, init as init_telemetry};
