//! Stream Metrics
//!
//! Counters recorded through the `metrics` facade. Without an installed
//! recorder every call is a no-op, so the library never forces an exporter
//! on its users.
//!
//! # Metrics
//!
//! - `bitflyer_stream_frames_received_total`: frames read by stream pumps
//! - `bitflyer_stream_frames_skipped_total{reason}`: frames dropped per cause
//! - `bitflyer_stream_events_delivered_total{channel}`: events queued
//! - `bitflyer_stream_closed_total{reason}`: pump exits per cause

use std::sync::Once;

use metrics::{counter, describe_counter};

static DESCRIBE: Once = Once::new();

/// Register metric descriptions with the installed recorder.
pub fn describe_metrics() {
    DESCRIBE.call_once(|| {
        describe_counter!(
            "bitflyer_stream_frames_received_total",
            "Total frames read by subscription pumps"
        );
        describe_counter!(
            "bitflyer_stream_frames_skipped_total",
            "Frames skipped because they could not be decoded or matched"
        );
        describe_counter!(
            "bitflyer_stream_events_delivered_total",
            "Domain events pushed onto delivery queues"
        );
        describe_counter!(
            "bitflyer_stream_closed_total",
            "Subscription pumps that stopped, by reason"
        );
    });
}

/// Record a frame read from the transport.
pub fn record_frame_received() {
    counter!("bitflyer_stream_frames_received_total").increment(1);
}

/// Record a frame the pump could not use.
pub fn record_frame_skipped(reason: &'static str) {
    counter!("bitflyer_stream_frames_skipped_total", "reason" => reason).increment(1);
}

/// Record an event pushed onto a delivery queue.
pub fn record_event_delivered(channel: &str) {
    counter!("bitflyer_stream_events_delivered_total", "channel" => channel.to_string())
        .increment(1);
}

/// Record a pump exit.
pub fn record_stream_closed(reason: &'static str) {
    counter!("bitflyer_stream_closed_total", "reason" => reason).increment(1);
}
