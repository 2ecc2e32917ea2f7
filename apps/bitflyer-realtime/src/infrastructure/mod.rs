//! Infrastructure Layer - Adapters and external integrations.
//!
//! Concrete implementations of the ports defined in the application layer,
//! plus the JSON-RPC and subscription machinery built on them.

/// bitFlyer Lightning realtime channels.
pub mod bitflyer;

/// Reusable byte buffers for outgoing frames.
pub mod bufferpool;

/// Configuration loaded from the environment.
pub mod config;

/// JSON-RPC 2.0 client over a frame transport.
pub mod jsonrpc;

/// Stream counters through the `metrics` facade.
pub mod metrics;

/// Channel subscriptions and their background pumps.
pub mod stream;

/// Tracing and OpenTelemetry setup.
pub mod telemetry;

/// WebSocket frame transport.
pub mod websocket;
