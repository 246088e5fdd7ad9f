use std::str::FromStr;
use std::time::Duration;

use crate::error::AppError;

/// Retry policy with exponential backoff for transient fetch failures.
///
/// Delay schedule with the defaults: 500ms, 1s, 2s, 4s, ... capped at 10s.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Extra attempts after the first one. `0` disables retries.
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 0,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(10),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_retries: u32) -> Self {
        Self {
            max_retries,
            ..Self::default()
        }
    }

    pub fn with_base_delay(mut self, delay: Duration) -> Self {
        self.base_delay = delay;
        self
    }

    /// Delay before retry number `attempt` (1-indexed).
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16);
        let delay = self.base_delay.saturating_mul(1 << exponent);
        std::cmp::min(delay, self.max_delay)
    }
}

/// Configuration for a batch run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchConfig {
    /// Maximum number of templates processed at once. `0` means unbounded.
    pub max_concurrency: usize,
    pub retry: RetryPolicy,
    /// Upper bound on one template's fetch, retries included.
    pub template_timeout: Option<Duration>,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            max_concurrency: 8,
            retry: RetryPolicy::default(),
            template_timeout: None,
        }
    }
}

impl BatchConfig {
    /// Read configuration from environment variables.
    ///
    /// - `GLEANER_CONCURRENCY` (optional, defaults to 8, `0` = unbounded)
    /// - `GLEANER_RETRIES` (optional, defaults to 0)
    pub fn from_env() -> Result<Self, AppError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, AppError> {
        let defaults = Self::default();

        let max_concurrency =
            parse_var(&lookup, "GLEANER_CONCURRENCY")?.unwrap_or(defaults.max_concurrency);
        let max_retries =
            parse_var(&lookup, "GLEANER_RETRIES")?.unwrap_or(defaults.retry.max_retries);

        Ok(Self {
            max_concurrency,
            retry: RetryPolicy::new(max_retries),
            ..defaults
        })
    }

    pub fn with_max_concurrency(mut self, max: usize) -> Self {
        self.max_concurrency = max;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_template_timeout(mut self, timeout: Duration) -> Self {
        self.template_timeout = Some(timeout);
        self
    }
}

fn parse_var<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &str,
) -> Result<Option<T>, AppError> {
    match lookup(name) {
        None => Ok(None),
        Some(raw) => raw.trim().parse().map(Some).map_err(|_| {
            AppError::config(format!(
                "Invalid {name} '{raw}': must be a non-negative integer"
            ))
        }),
    }
}
