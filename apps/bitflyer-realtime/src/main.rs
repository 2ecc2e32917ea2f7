//! bitFlyer Ticker Binary
//!
//! Subscribes to the Lightning ticker channel and logs every tick until
//! interrupted.
//!
//! # Usage
//!
//! ```bash
//! cargo run --bin bitflyer-ticker
//! ```
//!
//! # Environment Variables
//!
//! - `BITFLYER_REALTIME_ENDPOINT`: JSON-RPC WebSocket endpoint
//!   (default: `wss://ws.lightstream.bitflyer.com/json-rpc`)
//! - `BITFLYER_PRODUCT_CODE`: Product to follow (default: `BTC_JPY`)
//! - `STREAM_QUEUE_CAPACITY`: Delivery queue capacity (default: 100)
//! - `STREAM_RETRY_DELAY_INITIAL_MS`: First delay after a bad frame (default: 0, no pacing)
//! - `STREAM_RETRY_DELAY_MAX_MS`: Maximum delay between bad frames (default: 0)
//! - `STREAM_RETRY_DELAY_MULTIPLIER`: Backoff multiplier (default: 2.0)
//! - `STREAM_MAX_CONSECUTIVE_ERRORS`: Bad frames in a row before giving up (default: 0, unlimited)
//! - `OTEL_ENABLED`: Export spans over OTLP (default: false)
//! - `RUST_LOG`: Log level (default: info)

use anyhow::{Context, bail};
use bitflyer_realtime::infrastructure::telemetry;
use bitflyer_realtime::{RealtimeClient, StreamSettings, Ticker};
use tokio::signal;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    load_dotenv();

    let _telemetry_guard = telemetry::init();

    if rustls::crypto::ring::default_provider()
        .install_default()
        .is_err()
    {
        tracing::debug!("rustls crypto provider already installed");
    }

    tracing::info!("Starting bitFlyer ticker");

    let settings = StreamSettings::from_env().context("invalid stream configuration")?;
    log_config(&settings);

    let client = RealtimeClient::from_settings(&settings);
    let mut subscription = client
        .ticker(&settings.product_code)
        .await
        .with_context(|| format!("failed to subscribe to {}", settings.product_code))?;

    let shutdown = await_shutdown();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            () = &mut shutdown => break,
            tick = subscription.recv() => match tick {
                Some(ticker) => log_tick(&ticker),
                None => break,
            },
        }
    }

    let reason = subscription.close().await;
    if reason.is_failure() {
        bail!("ticker stream for {} broke: {reason}", subscription.channel());
    }

    tracing::info!("bitFlyer ticker stopped");
    Ok(())
}

fn log_tick(ticker: &Ticker) {
    tracing::info!(
        product_code = %ticker.product_code,
        tick_id = ticker.tick_id,
        best_bid = %ticker.best_bid,
        best_ask = %ticker.best_ask,
        spread = %ticker.spread(),
        ltp = %ticker.last_trade_price,
        volume = %ticker.volume,
        timestamp = %ticker.timestamp,
        "Tick"
    );
}

/// Load .env file from current or ancestor directories.
fn load_dotenv() {
    if dotenvy::dotenv().is_ok() {
        return;
    }

    if let Ok(cwd) = std::env::current_dir() {
        let mut dir = cwd.as_path();
        while let Some(parent) = dir.parent() {
            let env_path = parent.join(".env");
            if env_path.exists() {
                let _ = dotenvy::from_path(&env_path);
                return;
            }
            dir = parent;
        }
    }
}

/// Log the parsed configuration.
fn log_config(settings: &StreamSettings) {
    tracing::info!(
        endpoint = %settings.endpoint,
        product_code = %settings.product_code,
        queue_capacity = settings.queue_capacity,
        "Configuration loaded"
    );
    tracing::debug!(
        retry_delay_initial = ?settings.retry_delay_initial,
        retry_delay_max = ?settings.retry_delay_max,
        retry_delay_multiplier = settings.retry_delay_multiplier,
        max_consecutive_errors = settings.max_consecutive_errors,
        "Retry settings"
    );
}

/// Wait for shutdown signal (SIGTERM or SIGINT).
#[allow(clippy::expect_used)]
async fn await_shutdown() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("signal handler installation is critical for graceful shutdown");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("SIGTERM handler installation is critical for graceful shutdown")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received Ctrl+C, closing subscription");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, closing subscription");
        }
    }
}
