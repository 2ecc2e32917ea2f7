//! bitFlyer Realtime Client
//!
//! Opens one JSON-RPC connection per subscription to the Lightning realtime
//! API and hands back a typed [`Subscription`].
//!
//! # Stream URL
//!
//! - `wss://ws.lightstream.bitflyer.com/json-rpc`
//!
//! # Channels
//!
//! - `lightning_ticker_{product_code}`: [`Ticker`]
//! - `lightning_executions_{product_code}`: batches of [`Execution`]

use serde::de::DeserializeOwned;

use super::messages::{Execution, Ticker};
use crate::infrastructure::jsonrpc::{RpcClient, RpcError};
use crate::infrastructure::stream::{ChannelStream, StreamConfig, Subscription};
use crate::infrastructure::websocket::ConnectError;

/// Production realtime endpoint.
pub const DEFAULT_REALTIME_ENDPOINT: &str = "wss://ws.lightstream.bitflyer.com/json-rpc";

/// Errors that can occur when opening a realtime subscription.
#[derive(Debug, thiserror::Error)]
pub enum RealtimeError {
    /// The connection could not be established.
    #[error(transparent)]
    Connect(#[from] ConnectError),

    /// The subscribe request could not be sent.
    #[error("subscribe failed: {0}")]
    Subscribe(#[from] RpcError),
}

/// Ticker channel name for a product.
#[must_use]
pub fn ticker_channel(product_code: &str) -> String {
    format!("lightning_ticker_{product_code}")
}

/// Executions channel name for a product.
#[must_use]
pub fn executions_channel(product_code: &str) -> String {
    format!("lightning_executions_{product_code}")
}

/// Client for bitFlyer Lightning realtime channels.
#[derive(Debug, Clone)]
pub struct RealtimeClient {
    endpoint: String,
    config: StreamConfig,
}

impl Default for RealtimeClient {
    fn default() -> Self {
        Self::new(DEFAULT_REALTIME_ENDPOINT, StreamConfig::default())
    }
}

impl RealtimeClient {
    /// Create a client for `endpoint`.
    #[must_use]
    pub fn new(endpoint: impl Into<String>, config: StreamConfig) -> Self {
        Self {
            endpoint: endpoint.into(),
            config,
        }
    }

    /// Create a client from `StreamSettings`.
    #[must_use]
    pub fn from_settings(settings: &crate::StreamSettings) -> Self {
        Self::new(
            settings.endpoint.clone(),
            StreamConfig::from_stream_settings(settings),
        )
    }

    /// Endpoint this client connects to.
    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Subscribe to the ticker of `product_code`, e.g. `BTC_JPY`.
    ///
    /// # Errors
    ///
    /// Returns [`RealtimeError`] if connecting or subscribing fails.
    pub async fn ticker(&self, product_code: &str) -> Result<Subscription<Ticker>, RealtimeError> {
        self.subscribe(ticker_channel(product_code)).await
    }

    /// Subscribe to executions of `product_code`.
    ///
    /// # Errors
    ///
    /// Returns [`RealtimeError`] if connecting or subscribing fails.
    pub async fn executions(
        &self,
        product_code: &str,
    ) -> Result<Subscription<Vec<Execution>>, RealtimeError> {
        self.subscribe(executions_channel(product_code)).await
    }

    /// Subscribe to any channel whose messages decode as `T`.
    ///
    /// # Errors
    ///
    /// Returns [`RealtimeError`] if connecting or subscribing fails.
    pub async fn subscribe<T>(&self, channel: String) -> Result<Subscription<T>, RealtimeError>
    where
        T: DeserializeOwned + Send + 'static,
    {
        let client = RpcClient::connect(&self.endpoint).await?;
        let subscription = ChannelStream::new(client, self.config.clone())
            .subscribe(channel)
            .await?;
        Ok(subscription)
    }
}
