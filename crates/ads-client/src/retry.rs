//! Retry policy with exponential backoff and jitter.
//!
//! Delays are computed by a pure function of the attempt number; the actual
//! waiting goes through a [`Sleeper`] so tests can run the retry loop without
//! wall-clock delays.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures::future::BoxFuture;
use rand::Rng;

/// Configuration for retry behavior.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Total network attempts per logical request, including the first.
    pub max_attempts: u32,
    /// Delay before the first retry.
    pub initial_delay: Duration,
    /// Maximum delay between retries.
    pub max_delay: Duration,
    /// Backoff strategy to use.
    pub backoff: BackoffStrategy,
    /// Whether to respect Retry-After headers.
    pub respect_retry_after: bool,
    /// Maximum time to wait from a Retry-After header.
    pub max_retry_after: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            backoff: BackoffStrategy::ExponentialWithJitter { factor: 2.0 },
            respect_retry_after: true,
            max_retry_after: Duration::from_secs(60),
        }
    }
}

impl RetryConfig {
    /// Set the total number of attempts (values below 1 are treated as 1).
    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts.max(1);
        self
    }

    /// Set the delay before the first retry.
    pub fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    /// Set the max delay between retries.
    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    /// Set the backoff strategy.
    pub fn with_backoff(mut self, backoff: BackoffStrategy) -> Self {
        self.backoff = backoff;
        self
    }

    /// Single attempt, never retry.
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            ..Default::default()
        }
    }
}

/// Backoff strategy for determining retry delays.
#[derive(Debug, Clone, Copy)]
pub enum BackoffStrategy {
    /// Constant delay between retries.
    Constant,
    /// Exponential increase in delay (delay * factor^attempt).
    Exponential { factor: f64 },
    /// Exponential with up to 100% random jitter on top.
    ExponentialWithJitter { factor: f64 },
}

impl BackoffStrategy {
    /// Calculate the delay for a given retry number (0-indexed).
    pub fn delay(&self, attempt: u32, initial_delay: Duration, max_delay: Duration) -> Duration {
        let jitter = match self {
            BackoffStrategy::ExponentialWithJitter { .. } => rand::rng().random::<f64>(),
            _ => 0.0,
        };
        self.delay_with_jitter(attempt, initial_delay, max_delay, jitter)
    }

    /// Deterministic core of [`BackoffStrategy::delay`]; `jitter` is in `[0, 1)`.
    pub fn delay_with_jitter(
        &self,
        attempt: u32,
        initial_delay: Duration,
        max_delay: Duration,
        jitter: f64,
    ) -> Duration {
        let base = match self {
            BackoffStrategy::Constant => initial_delay.as_secs_f64(),
            BackoffStrategy::Exponential { factor }
            | BackoffStrategy::ExponentialWithJitter { factor } => {
                initial_delay.as_secs_f64() * factor.powi(attempt as i32)
            }
        };

        let seconds = match self {
            BackoffStrategy::ExponentialWithJitter { .. } => base + base * jitter.clamp(0.0, 1.0),
            _ => base,
        };

        // Cap before converting so huge exponents cannot overflow Duration.
        let seconds = seconds.min(max_delay.as_secs_f64());
        Duration::from_secs_f64(seconds.max(0.0))
    }
}

/// Tracks the attempts of one logical request.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    config: RetryConfig,
    retries: u32,
}

impl RetryPolicy {
    pub fn new(config: RetryConfig) -> Self {
        Self { config, retries: 0 }
    }

    /// Network attempts made so far, assuming the current one has been sent.
    pub fn attempts(&self) -> u32 {
        self.retries + 1
    }

    /// Returns true if another attempt is allowed after a failure.
    pub fn should_retry(&self) -> bool {
        self.attempts() < self.config.max_attempts
    }

    /// Record a failed attempt and return the delay before the next one,
    /// or `None` once the attempt budget is spent.
    pub fn next_delay(&mut self, retry_after: Option<Duration>) -> Option<Duration> {
        if !self.should_retry() {
            return None;
        }

        let delay = match retry_after {
            Some(hint) if self.config.respect_retry_after => {
                std::cmp::min(hint, self.config.max_retry_after)
            }
            _ => self.config.backoff.delay(
                self.retries,
                self.config.initial_delay,
                self.config.max_delay,
            ),
        };

        self.retries += 1;
        Some(delay)
    }
}

/// Suspends the current task between retries.
pub trait Sleeper: Send + Sync + std::fmt::Debug {
    fn sleep(&self, duration: Duration) -> BoxFuture<'_, ()>;
}

/// Sleeps on the tokio timer.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSleeper;

impl Sleeper for TokioSleeper {
    fn sleep(&self, duration: Duration) -> BoxFuture<'_, ()> {
        Box::pin(tokio::time::sleep(duration))
    }
}

/// Returns immediately and records every requested delay.
#[derive(Debug, Clone, Default)]
pub struct RecordingSleeper {
    delays: Arc<Mutex<Vec<Duration>>>,
}

impl RecordingSleeper {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delays requested so far, in order.
    pub fn delays(&self) -> Vec<Duration> {
        self.delays.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

impl Sleeper for RecordingSleeper {
    fn sleep(&self, duration: Duration) -> BoxFuture<'_, ()> {
        self.delays
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(duration);
        Box::pin(async {})
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = RetryConfig::default();
        assert_eq!(config.max_attempts, 3);
        assert_eq!(config.initial_delay, Duration::from_secs(1));
        assert!(config.respect_retry_after);
    }

    #[test]
    fn test_no_retry() {
        let policy = RetryPolicy::new(RetryConfig::no_retry());
        assert!(!policy.should_retry());
    }

    #[test]
    fn test_max_attempts_floor_is_one() {
        let config = RetryConfig::default().with_max_attempts(0);
        assert_eq!(config.max_attempts, 1);
    }

    #[test]
    fn test_exponential_backoff() {
        let strategy = BackoffStrategy::Exponential { factor: 2.0 };
        let initial = Duration::from_secs(1);
        let max = Duration::from_secs(60);

        assert_eq!(strategy.delay(0, initial, max), Duration::from_secs(1));
        assert_eq!(strategy.delay(1, initial, max), Duration::from_secs(2));
        assert_eq!(strategy.delay(2, initial, max), Duration::from_secs(4));
        assert_eq!(strategy.delay(3, initial, max), Duration::from_secs(8));
        assert_eq!(strategy.delay(10, initial, max), Duration::from_secs(60));
        assert_eq!(strategy.delay(500, initial, max), Duration::from_secs(60));
    }

    #[test]
    fn test_jitter_bounds() {
        let strategy = BackoffStrategy::ExponentialWithJitter { factor: 2.0 };
        let initial = Duration::from_secs(1);
        let max = Duration::from_secs(60);

        assert_eq!(
            strategy.delay_with_jitter(1, initial, max, 0.0),
            Duration::from_secs(2)
        );
        assert_eq!(
            strategy.delay_with_jitter(1, initial, max, 0.5),
            Duration::from_secs(3)
        );

        let delay = strategy.delay(0, initial, max);
        assert!(delay >= Duration::from_secs(1));
        assert!(delay <= Duration::from_secs(2));
    }

    #[test]
    fn test_policy_exhausts_after_max_attempts() {
        let config = RetryConfig::default()
            .with_max_attempts(3)
            .with_backoff(BackoffStrategy::Constant);
        let mut policy = RetryPolicy::new(config);

        assert_eq!(policy.attempts(), 1);
        assert!(policy.next_delay(None).is_some());
        assert_eq!(policy.attempts(), 2);
        assert!(policy.next_delay(None).is_some());
        assert_eq!(policy.attempts(), 3);
        assert!(policy.next_delay(None).is_none());
        assert_eq!(policy.attempts(), 3);
    }

    #[test]
    fn test_retry_after_header() {
        let mut config = RetryConfig::default().with_max_attempts(5);
        config.max_retry_after = Duration::from_secs(60);
        let mut policy = RetryPolicy::new(config);

        let delay = policy.next_delay(Some(Duration::from_secs(30))).unwrap();
        assert_eq!(delay, Duration::from_secs(30));

        let delay = policy.next_delay(Some(Duration::from_secs(120))).unwrap();
        assert_eq!(delay, Duration::from_secs(60));
    }

    #[tokio::test]
    async fn test_recording_sleeper_records_without_waiting() {
        let sleeper = RecordingSleeper::new();
        sleeper.sleep(Duration::from_secs(3600)).await;
        sleeper.sleep(Duration::from_millis(5)).await;
        assert_eq!(
            sleeper.delays(),
            vec![Duration::from_secs(3600), Duration::from_millis(5)]
        );
    }
}
