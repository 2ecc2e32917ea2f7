//! Frame Retry Backoff
//!
//! Optional exponential backoff with jitter between consecutive rejected
//! frames, plus an optional cap on how many may arrive in a row.
//!
//! Both are off by default: a rejected frame is skipped and the next one is
//! read at once, and no run of rejected frames ends the stream.

use std::time::Duration;

use rand::Rng;

/// Configuration for retry pacing.
#[derive(Debug, Clone)]
pub struct BackoffConfig {
    /// Delay after the first rejected frame.
    pub initial_delay: Duration,
    /// Maximum delay between reads.
    pub max_delay: Duration,
    /// Multiplier for exponential backoff (e.g., 2.0 doubles delay each attempt).
    pub multiplier: f64,
    /// Jitter factor as a fraction (e.g., 0.1 = ±10% randomization).
    pub jitter_factor: f64,
    /// Maximum consecutive rejected frames (0 = unlimited).
    pub max_attempts: u32,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self::disabled()
    }
}

impl BackoffConfig {
    /// Create configuration from `StreamSettings`.
    #[must_use]
    pub const fn from_stream_settings(settings: &crate::StreamSettings) -> Self {
        Self {
            initial_delay: settings.retry_delay_initial,
            max_delay: settings.retry_delay_max,
            multiplier: settings.retry_delay_multiplier,
            jitter_factor: 0.1,
            max_attempts: settings.max_consecutive_errors,
        }
    }

    /// No delay between rejected frames, unlimited attempts.
    #[must_use]
    pub const fn disabled() -> Self {
        Self {
            initial_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            multiplier: 2.0,
            jitter_factor: 0.0,
            max_attempts: 0,
        }
    }

    /// Whether this configuration ever waits or gives up.
    #[must_use]
    pub const fn is_disabled(&self) -> bool {
        self.initial_delay.is_zero() && self.max_attempts == 0
    }
}

/// Backoff state for one stream.
#[derive(Debug)]
pub struct BackoffPolicy {
    config: BackoffConfig,
    current_delay: Duration,
    attempt_count: u32,
}

impl BackoffPolicy {
    /// Create a new policy.
    #[must_use]
    pub const fn new(config: BackoffConfig) -> Self {
        let initial_delay = config.initial_delay;
        Self {
            config,
            current_delay: initial_delay,
            attempt_count: 0,
        }
    }

    /// Delay to wait before the next read.
    ///
    /// Returns `None` once `max_attempts` consecutive failures are reached.
    #[must_use]
    pub fn next_delay(&mut self) -> Option<Duration> {
        if self.config.max_attempts > 0 && self.attempt_count >= self.config.max_attempts {
            return None;
        }

        self.attempt_count += 1;

        let delay_with_jitter = self.apply_jitter(self.current_delay);

        #[allow(clippy::cast_precision_loss)]
        let scaled = (self.current_delay.as_millis() as f64 * self.config.multiplier).round();
        let next_millis = if scaled.is_finite() && scaled > 0.0 {
            #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
            {
                scaled as u128
            }
        } else {
            0
        };
        let capped = next_millis.min(self.config.max_delay.as_millis());
        self.current_delay = Duration::from_millis(u64::try_from(capped).unwrap_or(u64::MAX));

        Some(delay_with_jitter)
    }

    /// Reset after a frame was delivered.
    pub const fn reset(&mut self) {
        self.current_delay = self.config.initial_delay;
        self.attempt_count = 0;
    }

    /// Consecutive failures recorded since the last reset.
    #[must_use]
    pub const fn attempt_count(&self) -> u32 {
        self.attempt_count
    }

    fn apply_jitter(&self, duration: Duration) -> Duration {
        if self.config.jitter_factor <= 0.0 || duration.is_zero() {
            return duration;
        }

        #[allow(clippy::cast_precision_loss)]
        let base_millis = duration.as_millis() as f64;
        let jitter_range = base_millis * self.config.jitter_factor;
        let jitter: f64 = rand::rng().random_range(-jitter_range..=jitter_range);
        let adjusted_millis = (base_millis + jitter).max(1.0);

        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let adjusted_u64 = adjusted_millis as u64;
        Duration::from_millis(adjusted_u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn no_jitter(initial_ms: u64, max_ms: u64, max_attempts: u32) -> BackoffConfig {
        BackoffConfig {
            initial_delay: Duration::from_millis(initial_ms),
            max_delay: Duration::from_millis(max_ms),
            multiplier: 2.0,
            jitter_factor: 0.0,
            max_attempts,
        }
    }

    #[test]
    fn default_config_never_waits_or_gives_up() {
        let config = BackoffConfig::default();
        assert!(config.is_disabled());
        assert_eq!(config.initial_delay, Duration::ZERO);
        assert_eq!(config.max_attempts, 0);

        let mut policy = BackoffPolicy::new(config);
        for _ in 0..1000 {
            assert_eq!(policy.next_delay(), Some(Duration::ZERO));
        }
    }

    #[test]
    fn pacing_or_cap_enables_policy() {
        assert!(!no_jitter(10, 50, 0).is_disabled());
        assert!(!BackoffConfig {
            max_attempts: 5,
            ..BackoffConfig::disabled()
        }
        .is_disabled());
    }

    #[test]
    fn delays_grow_exponentially_up_to_cap() {
        let mut policy = BackoffPolicy::new(no_jitter(10, 50, 0));

        assert_eq!(policy.next_delay(), Some(Duration::from_millis(10)));
        assert_eq!(policy.next_delay(), Some(Duration::from_millis(20)));
        assert_eq!(policy.next_delay(), Some(Duration::from_millis(40)));
        assert_eq!(policy.next_delay(), Some(Duration::from_millis(50)));
        assert_eq!(policy.next_delay(), Some(Duration::from_millis(50)));
    }

    #[test]
    fn gives_up_after_max_attempts() {
        let mut policy = BackoffPolicy::new(no_jitter(1, 10, 2));

        assert!(policy.next_delay().is_some());
        assert!(policy.next_delay().is_some());
        assert_eq!(policy.attempt_count(), 2);
        assert!(policy.next_delay().is_none());
    }

    #[test]
    fn reset_restarts_from_initial_delay() {
        let mut policy = BackoffPolicy::new(no_jitter(10, 1000, 3));
        let _ = policy.next_delay();
        let _ = policy.next_delay();

        policy.reset();

        assert_eq!(policy.attempt_count(), 0);
        assert_eq!(policy.next_delay(), Some(Duration::from_millis(10)));
    }

    #[test]
    fn jitter_stays_within_bounds() {
        for _ in 0..100 {
            let mut policy = BackoffPolicy::new(BackoffConfig {
                initial_delay: Duration::from_millis(1000),
                max_delay: Duration::from_secs(10),
                multiplier: 2.0,
                jitter_factor: 0.1,
                max_attempts: 0,
            });

            let millis = policy.next_delay().unwrap().as_millis();
            assert!((900..=1100).contains(&millis), "delay {millis}ms out of range");
        }
    }
}
