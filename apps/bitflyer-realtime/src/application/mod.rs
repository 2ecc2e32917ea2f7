//! Application Layer - Port definitions.
//!
//! This layer holds the contracts that infrastructure adapters implement.

/// Port interfaces for external systems (message-socket transport).
pub mod ports;
