//! Domain Layer - Core streaming types.
//!
//! This layer contains the subscription lifecycle types shared by the
//! stream pump and its consumers. No I/O happens here.

/// Subscription lifecycle state and close reasons.
pub mod streaming;
