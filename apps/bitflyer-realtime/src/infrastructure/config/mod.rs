//! Configuration Module
//!
//! Stream settings loaded from environment variables.

mod settings;

pub use settings::{ConfigError, StreamSettings};
