//! Stream Configuration Settings
//!
//! Settings for realtime subscriptions, loaded from environment variables.
//! Unset variables fall back to defaults; set but unusable values are errors.

use std::fmt::Display;
use std::str::FromStr;
use std::time::Duration;

use crate::infrastructure::bitflyer::DEFAULT_REALTIME_ENDPOINT;
use crate::infrastructure::stream::DEFAULT_QUEUE_CAPACITY;

const ENDPOINT_VAR: &str = "BITFLYER_REALTIME_ENDPOINT";
const PRODUCT_CODE_VAR: &str = "BITFLYER_PRODUCT_CODE";
const QUEUE_CAPACITY_VAR: &str = "STREAM_QUEUE_CAPACITY";
const RETRY_DELAY_INITIAL_VAR: &str = "STREAM_RETRY_DELAY_INITIAL_MS";
const RETRY_DELAY_MAX_VAR: &str = "STREAM_RETRY_DELAY_MAX_MS";
const RETRY_DELAY_MULTIPLIER_VAR: &str = "STREAM_RETRY_DELAY_MULTIPLIER";
const MAX_CONSECUTIVE_ERRORS_VAR: &str = "STREAM_MAX_CONSECUTIVE_ERRORS";

/// Realtime stream settings.
#[derive(Debug, Clone, PartialEq)]
pub struct StreamSettings {
    /// WebSocket JSON-RPC endpoint.
    pub endpoint: String,
    /// Product to subscribe to, e.g. `BTC_JPY`.
    pub product_code: String,
    /// Capacity of each subscription's delivery queue.
    pub queue_capacity: usize,
    /// Delay after the first rejected frame (0 = no pacing).
    pub retry_delay_initial: Duration,
    /// Maximum delay between rejected frames.
    pub retry_delay_max: Duration,
    /// Delay multiplier for exponential backoff.
    pub retry_delay_multiplier: f64,
    /// Consecutive rejected frames before the stream gives up (0 = unlimited).
    pub max_consecutive_errors: u32,
}

impl Default for StreamSettings {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_REALTIME_ENDPOINT.to_string(),
            product_code: "BTC_JPY".to_string(),
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            retry_delay_initial: Duration::ZERO,
            retry_delay_max: Duration::ZERO,
            retry_delay_multiplier: 2.0,
            max_consecutive_errors: 0,
        }
    }
}

impl StreamSettings {
    /// Create settings from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if a variable is set but empty or invalid.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Create settings from an arbitrary variable lookup.
    ///
    /// # Errors
    ///
    /// Returns an error if a variable is set but empty or invalid.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let endpoint = read_var(&lookup, ENDPOINT_VAR)?.unwrap_or(defaults.endpoint);
        if !(endpoint.starts_with("ws://") || endpoint.starts_with("wss://")) {
            return Err(ConfigError::invalid(
                ENDPOINT_VAR,
                &endpoint,
                "expected a ws:// or wss:// URL",
            ));
        }

        let product_code =
            read_var(&lookup, PRODUCT_CODE_VAR)?.unwrap_or(defaults.product_code);

        let queue_capacity = parse_var(&lookup, QUEUE_CAPACITY_VAR, defaults.queue_capacity)?;
        if queue_capacity == 0 {
            return Err(ConfigError::invalid(
                QUEUE_CAPACITY_VAR,
                "0",
                "must be greater than zero",
            ));
        }

        let retry_delay_initial = parse_millis(
            &lookup,
            RETRY_DELAY_INITIAL_VAR,
            defaults.retry_delay_initial,
        )?;
        let retry_delay_max = parse_millis(&lookup, RETRY_DELAY_MAX_VAR, defaults.retry_delay_max)?;
        if retry_delay_max < retry_delay_initial {
            return Err(ConfigError::invalid(
                RETRY_DELAY_MAX_VAR,
                &retry_delay_max.as_millis().to_string(),
                "must not be below the initial delay",
            ));
        }

        let retry_delay_multiplier = parse_var(
            &lookup,
            RETRY_DELAY_MULTIPLIER_VAR,
            defaults.retry_delay_multiplier,
        )?;
        if !retry_delay_multiplier.is_finite() || retry_delay_multiplier < 1.0 {
            return Err(ConfigError::invalid(
                RETRY_DELAY_MULTIPLIER_VAR,
                &retry_delay_multiplier.to_string(),
                "must be a finite number >= 1.0",
            ));
        }

        let max_consecutive_errors = parse_var(
            &lookup,
            MAX_CONSECUTIVE_ERRORS_VAR,
            defaults.max_consecutive_errors,
        )?;

        Ok(Self {
            endpoint,
            product_code,
            queue_capacity,
            retry_delay_initial,
            retry_delay_max,
            retry_delay_multiplier,
            max_consecutive_errors,
        })
    }
}

/// Configuration error.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Environment variable has empty value.
    #[error("environment variable {0} cannot be empty")]
    EmptyValue(String),
    /// Environment variable could not be used.
    #[error("environment variable {key}={value:?} is invalid: {reason}")]
    InvalidValue {
        /// Variable name.
        key: String,
        /// Offending value.
        value: String,
        /// What was wrong with it.
        reason: String,
    },
}

impl ConfigError {
    fn invalid(key: &str, value: &str, reason: impl Display) -> Self {
        Self::InvalidValue {
            key: key.to_string(),
            value: value.to_string(),
            reason: reason.to_string(),
        }
    }
}

fn read_var<F>(lookup: &F, key: &str) -> Result<Option<String>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        None => Ok(None),
        Some(raw) => {
            let value = raw.trim();
            if value.is_empty() {
                Err(ConfigError::EmptyValue(key.to_string()))
            } else {
                Ok(Some(value.to_string()))
            }
        }
    }
}

fn parse_var<F, T>(lookup: &F, key: &str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: Display,
{
    match read_var(lookup, key)? {
        None => Ok(default),
        Some(raw) => raw
            .parse()
            .map_err(|e| ConfigError::invalid(key, &raw, e)),
    }
}

fn parse_millis<F>(lookup: &F, key: &str, default: Duration) -> Result<Duration, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    read_var(lookup, key)?.map_or(Ok(default), |raw| {
        raw.parse::<u64>()
            .map(Duration::from_millis)
            .map_err(|e| ConfigError::invalid(key, &raw, e))
    })
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use test_case::test_case;

    use super::*;
    use crate::infrastructure::stream::BackoffConfig;

    fn load(vars: &[(&str, &str)]) -> Result<StreamSettings, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        StreamSettings::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_when_nothing_is_set() {
        let settings = load(&[]).unwrap();
        assert_eq!(settings, StreamSettings::default());
        assert_eq!(settings.endpoint, "wss://ws.lightstream.bitflyer.com/json-rpc");
        assert_eq!(settings.product_code, "BTC_JPY");
        assert_eq!(settings.queue_capacity, 100);
        assert_eq!(settings.retry_delay_initial, Duration::ZERO);
        assert_eq!(settings.retry_delay_max, Duration::ZERO);
        assert!((settings.retry_delay_multiplier - 2.0).abs() < f64::EPSILON);
        assert_eq!(settings.max_consecutive_errors, 0);
        assert!(BackoffConfig::from_stream_settings(&settings).is_disabled());
    }

    #[test]
    fn overrides_are_applied() {
        let settings = load(&[
            ("BITFLYER_REALTIME_ENDPOINT", "ws://127.0.0.1:9000/json-rpc"),
            ("BITFLYER_PRODUCT_CODE", " FX_BTC_JPY "),
            ("STREAM_QUEUE_CAPACITY", "8"),
            ("STREAM_RETRY_DELAY_INITIAL_MS", "5"),
            ("STREAM_RETRY_DELAY_MAX_MS", "250"),
            ("STREAM_RETRY_DELAY_MULTIPLIER", "1.5"),
            ("STREAM_MAX_CONSECUTIVE_ERRORS", "500"),
        ])
        .unwrap();

        assert_eq!(settings.endpoint, "ws://127.0.0.1:9000/json-rpc");
        assert_eq!(settings.product_code, "FX_BTC_JPY");
        assert_eq!(settings.queue_capacity, 8);
        assert_eq!(settings.retry_delay_initial, Duration::from_millis(5));
        assert_eq!(settings.retry_delay_max, Duration::from_millis(250));
        assert!((settings.retry_delay_multiplier - 1.5).abs() < f64::EPSILON);
        assert_eq!(settings.max_consecutive_errors, 500);
    }

    #[test]
    fn empty_value_is_rejected() {
        let err = load(&[("BITFLYER_PRODUCT_CODE", "   ")]).unwrap_err();
        assert!(matches!(err, ConfigError::EmptyValue(key) if key == "BITFLYER_PRODUCT_CODE"));
    }

    #[test_case("BITFLYER_REALTIME_ENDPOINT", "https://example.com" ; "non websocket endpoint")]
    #[test_case("STREAM_QUEUE_CAPACITY", "0" ; "zero capacity")]
    #[test_case("STREAM_QUEUE_CAPACITY", "many" ; "non numeric capacity")]
    #[test_case("STREAM_RETRY_DELAY_INITIAL_MS", "-1" ; "negative delay")]
    #[test_case("STREAM_RETRY_DELAY_MULTIPLIER", "0.5" ; "shrinking multiplier")]
    #[test_case("STREAM_RETRY_DELAY_MULTIPLIER", "NaN" ; "nan multiplier")]
    #[test_case("STREAM_MAX_CONSECUTIVE_ERRORS", "lots" ; "non numeric error budget")]
    fn invalid_value_is_rejected(key: &str, value: &str) {
        let err = load(&[(key, value)]).unwrap_err();
        assert!(
            matches!(&err, ConfigError::InvalidValue { key: k, .. } if k == key),
            "unexpected error: {err}"
        );
    }

    #[test]
    fn max_delay_below_initial_is_rejected() {
        let err = load(&[
            ("STREAM_RETRY_DELAY_INITIAL_MS", "50"),
            ("STREAM_RETRY_DELAY_MAX_MS", "10"),
        ])
        .unwrap_err();
        assert!(
            matches!(&err, ConfigError::InvalidValue { key, .. } if key == "STREAM_RETRY_DELAY_MAX_MS")
        );
    }

    #[test]
    fn error_message_names_the_variable() {
        let err = load(&[("STREAM_QUEUE_CAPACITY", "many")]).unwrap_err();
        let message = err.to_string();
        assert!(message.contains("STREAM_QUEUE_CAPACITY"));
        assert!(message.contains("many"));
    }
}
