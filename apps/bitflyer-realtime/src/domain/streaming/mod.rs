//! Subscription Lifecycle
//!
//! A subscription moves through `Created → Subscribing → Streaming → Closed`.
//! `Closed` carries the reason so a consumer can tell an intentional shutdown
//! apart from a broken connection.

use std::fmt;

/// Why a subscription stream stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CloseReason {
    /// The owner closed or dropped the subscription.
    Cancelled,
    /// The connection failed while streaming.
    TransportFailed {
        /// Rendered transport error.
        error: String,
    },
    /// Too many consecutive frames could not be decoded.
    TooManyInvalidFrames {
        /// Number of consecutive rejected frames.
        count: u32,
    },
}

impl CloseReason {
    /// Whether the stream ended because something broke rather than on request.
    #[must_use]
    pub const fn is_failure(&self) -> bool {
        matches!(
            self,
            Self::TransportFailed { .. } | Self::TooManyInvalidFrames { .. }
        )
    }

    /// Short label used for metrics and logs.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Cancelled => "cancelled",
            Self::TransportFailed { .. } => "transport_failed",
            Self::TooManyInvalidFrames { .. } => "too_many_invalid_frames",
        }
    }
}

impl fmt::Display for CloseReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cancelled => f.write_str("cancelled"),
            Self::TransportFailed { error } => write!(f, "transport failed: {error}"),
            Self::TooManyInvalidFrames { count } => {
                write!(f, "{count} consecutive invalid frames")
            }
        }
    }
}

/// Current state of a subscription stream.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum StreamState {
    /// Stream built, no subscribe request sent yet.
    #[default]
    Created,
    /// Subscribe request is being sent.
    Subscribing,
    /// Pump is running.
    Streaming,
    /// Pump has exited.
    Closed(CloseReason),
}

impl StreamState {
    /// Whether the pump has exited.
    #[must_use]
    pub const fn is_closed(&self) -> bool {
        matches!(self, Self::Closed(_))
    }

    /// Close reason, if closed.
    #[must_use]
    pub const fn close_reason(&self) -> Option<&CloseReason> {
        match self {
            Self::Closed(reason) => Some(reason),
            _ => None,
        }
    }
}
