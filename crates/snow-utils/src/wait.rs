//! Waiting on eventually-consistent resources with exponential backoff.
//!
//! IAM changes take a few seconds to propagate. Callers poll a check with
//! [`wait_until`] and treat an exhausted budget as non-fatal: the workflow
//! logs a warning and proceeds.

use backon::{BackoffBuilder, ExponentialBuilder};
use snow_utils_common::defaults::{
    WAIT_FACTOR, WAIT_INITIAL_DELAY, WAIT_MAX_ATTEMPTS, WAIT_MAX_DELAY,
};
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

/// Configuration for resource waiting with exponential backoff.
#[derive(Debug, Clone)]
pub struct WaitConfig {
    /// Number of times the check is invoked before giving up (0 behaves as 1)
    pub max_attempts: u32,
    /// Delay after the first failed check
    pub initial_delay: Duration,
    /// Maximum delay between checks (cap for exponential growth)
    pub max_delay: Duration,
    /// Multiplier applied to the delay after each failed check
    pub factor: f64,
}

impl Default for WaitConfig {
    fn default() -> Self {
        Self {
            max_attempts: WAIT_MAX_ATTEMPTS,
            initial_delay: WAIT_INITIAL_DELAY,
            max_delay: WAIT_MAX_DELAY,
            factor: WAIT_FACTOR,
        }
    }
}

impl WaitConfig {
    /// Delays slept between consecutive attempts.
    ///
    /// Yields `max_attempts - 1` values: `initial, min(initial * factor, max), ...`
    pub fn delays(&self) -> impl Iterator<Item = Duration> + use<> {
        ExponentialBuilder::default()
            .with_min_delay(self.initial_delay)
            .with_max_delay(self.max_delay)
            .with_factor(self.factor as f32)
            .with_max_times(self.max_attempts.saturating_sub(1) as usize)
            .build()
    }
}

/// Poll `check` until it returns `true` or the attempt budget is spent.
///
/// The check always runs at least once. Sleeps only between attempts,
/// never after the last one.
///
/// # Returns
/// * `true` - the check succeeded
/// * `false` - every attempt returned `false`
///
/// # Example
/// ```ignore
/// let ready = wait_until(&WaitConfig::default(), || async { role_exists().await }, "IAM role").await;
/// if !ready {
///     // proceed anyway
/// }
/// ```
pub async fn wait_until<F, Fut>(config: &WaitConfig, mut check: F, resource_name: &str) -> bool
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    let mut delays = config.delays();
    let mut attempt = 0u32;

    loop {
        attempt += 1;

        if check().await {
            debug!(resource = %resource_name, attempts = attempt, "Resource ready");
            return true;
        }

        match delays.next() {
            Some(delay) => {
                debug!(
                    resource = %resource_name,
                    attempt,
                    delay_ms = delay.as_millis(),
                    "Resource not ready, retrying"
                );
                tokio::time::sleep(delay).await;
            }
            None => {
                warn!(
                    resource = %resource_name,
                    attempts = attempt,
                    "Resource not ready after all attempts, proceeding anyway"
                );
                return false;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};
    use tokio::time::Instant;

    fn secs(s: &[u64]) -> Vec<Duration> {
        s.iter().map(|s| Duration::from_secs(*s)).collect()
    }

    #[test]
    fn test_default_delay_sequence() {
        let delays: Vec<_> = WaitConfig::default().delays().collect();
        assert_eq!(delays, secs(&[2, 4, 8, 16, 30]));
    }

    #[test]
    fn test_single_attempt_has_no_delays() {
        let config = WaitConfig {
            max_attempts: 1,
            ..Default::default()
        };
        assert_eq!(config.delays().count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_attempts_checks_once() {
        let config = WaitConfig {
            max_attempts: 0,
            ..Default::default()
        };
        let calls = Arc::new(Mutex::new(0u32));
        let ready = wait_until(
            &config,
            || {
                let calls = calls.clone();
                async move {
                    *calls.lock().unwrap() += 1;
                    false
                }
            },
            "zero",
        )
        .await;
        assert!(!ready);
        assert_eq!(*calls.lock().unwrap(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_succeeds_immediately() {
        let start = Instant::now();
        assert!(wait_until(&WaitConfig::default(), || async { true }, "test-resource").await);
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_retries_then_succeeds() {
        let calls = Arc::new(Mutex::new(0u32));

        let ready = wait_until(
            &WaitConfig::default(),
            || {
                let calls = calls.clone();
                async move {
                    let mut n = calls.lock().unwrap();
                    *n += 1;
                    *n >= 3 // Succeed on 3rd attempt
                }
            },
            "test-resource",
        )
        .await;

        assert!(ready);
        assert_eq!(*calls.lock().unwrap(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_exhausts_attempts() {
        let seen: Arc<Mutex<Vec<Instant>>> = Arc::default();
        let start = Instant::now();

        let ready = wait_until(
            &WaitConfig::default(),
            || {
                let seen = seen.clone();
                async move {
                    seen.lock().unwrap().push(Instant::now());
                    false
                }
            },
            "test-resource",
        )
        .await;

        assert!(!ready, "never-ready check must return false");

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 6, "check runs exactly max_attempts times");

        let gaps: Vec<Duration> = seen.windows(2).map(|w| w[1] - w[0]).collect();
        assert_eq!(gaps, secs(&[2, 4, 8, 16, 30]));

        // No sleep after the final attempt
        assert_eq!(start.elapsed(), Duration::from_secs(60));
    }

    #[tokio::test(start_paused = true)]
    async fn test_custom_factor_and_cap() {
        let config = WaitConfig {
            max_attempts: 4,
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_millis(250),
            factor: 3.0,
        };
        let delays: Vec<_> = config.delays().collect();
        assert_eq!(
            delays,
            vec![
                Duration::from_millis(100),
                Duration::from_millis(250),
                Duration::from_millis(250)
            ]
        );

        let start = Instant::now();
        assert!(!wait_until(&config, || async { false }, "capped").await);
        assert_eq!(start.elapsed(), Duration::from_millis(600));
    }
}
