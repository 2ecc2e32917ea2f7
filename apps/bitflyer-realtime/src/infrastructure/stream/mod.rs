//! Channel Subscription Stream
//!
//! Turns one `subscribe` notification into a typed, bounded push channel.
//!
//! # Flow
//!
//! ```text
//! subscribe(channel) ──► RpcClient::send("subscribe", {channel})
//!                         │
//!                         ▼
//!                  ┌─────────────┐  read_typed("channelMessage")
//!                  │    Pump     │◄──────────────────────────── transport
//!                  └──────┬──────┘
//!                         │ decode message as T
//!                         ▼
//!                  bounded mpsc queue ──► Subscription::recv()
//! ```
//!
//! Per-frame problems (wrong version or method, unexpected shape, another
//! channel) are skipped and never end the stream. A transport failure ends the
//! stream. A full queue stalls the pump; nothing is dropped.

pub mod backoff;

use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::value::RawValue;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

pub use backoff::{BackoffConfig, BackoffPolicy};

use crate::domain::streaming::{CloseReason, StreamState};
use crate::infrastructure::jsonrpc::{RpcClient, RpcError};
use crate::infrastructure::metrics;

/// Method used to open a channel subscription.
pub const SUBSCRIBE_METHOD: &str = "subscribe";

/// Method carried by every pushed channel message.
pub const CHANNEL_MESSAGE_METHOD: &str = "channelMessage";

/// Default delivery queue capacity.
pub const DEFAULT_QUEUE_CAPACITY: usize = 100;

#[derive(Debug, Serialize)]
struct SubscribeParams<'a> {
    channel: &'a str,
}

/// Params of a `channelMessage` notification.
///
/// # Wire Format (JSON)
/// ```json
/// {"channel": "lightning_ticker_BTC_JPY", "message": {"product_code": "BTC_JPY"}}
/// ```
#[derive(Debug, Deserialize)]
pub struct ChannelEnvelope {
    /// Channel the message belongs to.
    pub channel: String,
    /// Undecoded payload.
    pub message: Box<RawValue>,
}

/// Delivery and retry settings for a subscription.
#[derive(Debug, Clone)]
pub struct StreamConfig {
    /// Capacity of the delivery queue. Values below 1 are raised to 1.
    pub queue_capacity: usize,
    /// Pacing for consecutive rejected frames.
    pub backoff: BackoffConfig,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            backoff: BackoffConfig::default(),
        }
    }
}

impl StreamConfig {
    /// Create configuration from `StreamSettings`.
    #[must_use]
    pub const fn from_stream_settings(settings: &crate::StreamSettings) -> Self {
        Self {
            queue_capacity: settings.queue_capacity,
            backoff: BackoffConfig::from_stream_settings(settings),
        }
    }
}

/// A connected client that has not subscribed yet.
pub struct ChannelStream {
    client: RpcClient,
    config: StreamConfig,
    state_tx: watch::Sender<StreamState>,
}

impl ChannelStream {
    /// Wrap a connected client.
    #[must_use]
    pub fn new(client: RpcClient, config: StreamConfig) -> Self {
        let (state_tx, _) = watch::channel(StreamState::Created);
        Self {
            client,
            config,
            state_tx,
        }
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> StreamState {
        self.state_tx.borrow().clone()
    }

    /// Subscribe to `channel` and start the pump.
    ///
    /// Returns as soon as the subscribe request is written. No acknowledgment
    /// is awaited; the first delivered event shows the stream is live. On
    /// failure the connection is closed.
    ///
    /// # Errors
    ///
    /// Returns [`RpcError::Encode`] or [`RpcError::Transport`] if the
    /// subscribe request cannot be sent.
    pub async fn subscribe<T>(self, channel: impl Into<String>) -> Result<Subscription<T>, RpcError>
    where
        T: DeserializeOwned + Send + 'static,
    {
        let channel = channel.into();
        self.state_tx.send_replace(StreamState::Subscribing);

        let params = SubscribeParams { channel: &channel };
        if let Err(e) = self.client.send(SUBSCRIBE_METHOD, Some(&params)).await {
            tracing::warn!(channel = %channel, error = %e, "Subscribe request failed");
            self.client.close().await;
            if let Some(reason) = subscribe_failure(&e) {
                self.state_tx.send_replace(StreamState::Closed(reason));
            }
            return Err(e);
        }

        tracing::info!(channel = %channel, "Subscribed");
        metrics::describe_metrics();

        let (events_tx, events_rx) = mpsc::channel(self.config.queue_capacity.max(1));
        let cancel = CancellationToken::new();
        let pump = Pump {
            client: self.client.clone(),
            channel: channel.clone(),
            events: events_tx,
            cancel: cancel.clone(),
            backoff: BackoffPolicy::new(self.config.backoff.clone()),
        };

        self.state_tx.send_replace(StreamState::Streaming);
        let state_rx = self.state_tx.subscribe();
        let state_tx = self.state_tx;
        let pump_channel = channel.clone();

        let handle = tokio::spawn(async move {
            let reason = pump.run().await;
            metrics::record_stream_closed(reason.as_str());
            if reason.is_failure() {
                tracing::warn!(channel = %pump_channel, reason = %reason, "Subscription broke");
            } else {
                tracing::info!(channel = %pump_channel, "Subscription closed");
            }
            state_tx.send_replace(StreamState::Closed(reason.clone()));
            reason
        });

        Ok(Subscription {
            channel,
            events: events_rx,
            state: state_rx,
            cancel,
            client: self.client,
            pump: Some(handle),
        })
    }
}

/// Close reason for a subscribe request that could not be sent.
///
/// Only transport failures have one; an unencodable request leaves the state
/// at `Subscribing`.
fn subscribe_failure(error: &RpcError) -> Option<CloseReason> {
    match error {
        RpcError::Transport(e) => Some(CloseReason::TransportFailed {
            error: e.to_string(),
        }),
        _ => None,
    }
}

/// Consumer side of a live channel subscription.
///
/// Dropping it cancels the pump and closes the connection.
pub struct Subscription<T> {
    channel: String,
    events: mpsc::Receiver<T>,
    state: watch::Receiver<StreamState>,
    cancel: CancellationToken,
    client: RpcClient,
    pump: Option<JoinHandle<CloseReason>>,
}

impl<T> Subscription<T> {
    /// Subscribed channel name.
    #[must_use]
    pub fn channel(&self) -> &str {
        &self.channel
    }

    /// Next event in arrival order.
    ///
    /// Returns `None` once the pump has stopped and the queue is drained;
    /// check [`Subscription::state`] to learn why.
    pub async fn recv(&mut self) -> Option<T> {
        self.events.recv().await
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> StreamState {
        self.state.borrow().clone()
    }

    /// Wait until the pump stops and return why.
    pub async fn closed(&self) -> CloseReason {
        let mut state = self.state.clone();
        let reason = match state.wait_for(StreamState::is_closed).await {
            Ok(s) => s.close_reason().cloned(),
            Err(_) => None,
        };
        reason.unwrap_or(CloseReason::Cancelled)
    }

    /// Stop the pump and close the connection. Idempotent.
    ///
    /// A pending read is interrupted immediately. Events already queued stay
    /// readable; no new ones are pushed. Returns the reason the pump stopped,
    /// which is the earlier failure if the stream had already broken.
    pub async fn close(&mut self) -> CloseReason {
        self.cancel.cancel();
        self.client.close().await;
        self.events.close();

        if let Some(handle) = self.pump.take()
            && let Err(e) = handle.await
        {
            tracing::error!(channel = %self.channel, error = %e, "Stream pump panicked");
        }

        self.state()
            .close_reason()
            .cloned()
            .unwrap_or(CloseReason::Cancelled)
    }
}

impl<T> Drop for Subscription<T> {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// Background task draining the connection onto the delivery queue.
struct Pump<T> {
    client: RpcClient,
    channel: String,
    events: mpsc::Sender<T>,
    cancel: CancellationToken,
    backoff: BackoffPolicy,
}

impl<T: DeserializeOwned> Pump<T> {
    async fn run(mut self) -> CloseReason {
        loop {
            if self.cancel.is_cancelled() {
                return self.shutdown(CloseReason::Cancelled).await;
            }

            let read = tokio::select! {
                biased;
                () = self.cancel.cancelled() => {
                    return self.shutdown(CloseReason::Cancelled).await;
                }
                read = self.client.read_typed::<ChannelEnvelope>(CHANNEL_MESSAGE_METHOD) => read,
            };

            let envelope = match read {
                Ok(envelope) => {
                    metrics::record_frame_received();
                    envelope
                }
                Err(e) if e.is_recoverable() => {
                    metrics::record_frame_received();
                    let delay = self.reject(e.kind(), &e);
                    if let Some(reason) = self.pause(delay).await {
                        return reason;
                    }
                    continue;
                }
                Err(e) => {
                    let reason = if self.cancel.is_cancelled() {
                        CloseReason::Cancelled
                    } else {
                        CloseReason::TransportFailed {
                            error: e.to_string(),
                        }
                    };
                    return self.shutdown(reason).await;
                }
            };

            if envelope.channel != self.channel {
                let note = format!("message for channel {}", envelope.channel);
                let delay = self.reject("channel_mismatch", &note);
                if let Some(reason) = self.pause(delay).await {
                    return reason;
                }
                continue;
            }

            let event: T = match serde_json::from_str(envelope.message.get()) {
                Ok(event) => event,
                Err(e) => {
                    let delay = self.reject("message_decode", &e);
                    if let Some(reason) = self.pause(delay).await {
                        return reason;
                    }
                    continue;
                }
            };

            self.backoff.reset();

            tokio::select! {
                biased;
                () = self.cancel.cancelled() => {
                    return self.shutdown(CloseReason::Cancelled).await;
                }
                sent = self.events.send(event) => {
                    if sent.is_err() {
                        return self.shutdown(CloseReason::Cancelled).await;
                    }
                }
            }

            metrics::record_event_delivered(&self.channel);
        }
    }

    /// Record a rejected frame.
    ///
    /// Returns the delay before the next read, or `None` once the budget of
    /// consecutive failures is spent.
    fn reject(&mut self, reason: &'static str, error: &dyn std::fmt::Display) -> Option<Duration> {
        metrics::record_frame_skipped(reason);
        tracing::debug!(channel = %self.channel, reason, error = %error, "Skipping frame");
        self.backoff.next_delay()
    }

    /// Wait out a retry delay. Returns a close reason if the stream must stop.
    async fn pause(&self, delay: Option<Duration>) -> Option<CloseReason> {
        let Some(delay) = delay else {
            let count = self.backoff.attempt_count();
            tracing::warn!(channel = %self.channel, count, "Too many consecutive invalid frames");
            return Some(self.shutdown(CloseReason::TooManyInvalidFrames { count }).await);
        };

        if delay.is_zero() {
            return None;
        }

        tokio::select! {
            biased;
            () = self.cancel.cancelled() => Some(self.shutdown(CloseReason::Cancelled).await),
            () = tokio::time::sleep(delay) => None,
        }
    }

    async fn shutdown(&self, reason: CloseReason) -> CloseReason {
        self.client.close().await;
        reason
    }
}
