//! bitFlyer Lightning Realtime Adapter
//!
//! Typed channel subscriptions on top of the JSON-RPC stream:
//!
//! - **Ticker**: best bid/ask snapshots
//! - **Executions**: trade batches

pub mod messages;
pub mod realtime;

pub use messages::{Execution, Side, Ticker};
pub use realtime::{
    DEFAULT_REALTIME_ENDPOINT, RealtimeClient, RealtimeError, executions_channel, ticker_channel,
};
