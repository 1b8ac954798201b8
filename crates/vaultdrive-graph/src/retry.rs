//! Bounded retry with exponential backoff
//!
//! Transient failures ([`DriveError::is_transient`]) are retried up to
//! [`RetryPolicy::max_retries`] times. The delay doubles (by
//! `backoff_multiplier`) after each attempt and is capped at `max_delay`.
//! A `Retry-After` hint from the server replaces the computed delay for
//! that attempt. Authentication failures are returned immediately.

use std::future::Future;
use std::time::Duration;

use thiserror::Error;
use tracing::{info, warn};
use vaultdrive_core::config::RetryConfig;
use vaultdrive_core::domain::DriveError;

/// Upper bound accepted from a `Retry-After` header
const MAX_RETRY_AFTER: Duration = Duration::from_secs(3600);

/// A failed attempt, optionally carrying the server's `Retry-After` hint
#[derive(Debug, Error)]
#[error("{error}")]
pub struct AttemptError {
    pub error: DriveError,
    pub retry_after: Option<Duration>,
}

impl From<DriveError> for AttemptError {
    fn from(error: DriveError) -> Self {
        Self {
            error,
            retry_after: None,
        }
    }
}

/// Backoff parameters for one retried operation
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Retries after the first attempt
    pub max_retries: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub backoff_multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&RetryConfig::default())
    }
}

impl RetryPolicy {
    pub fn from_config(config: &RetryConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            initial_delay: Duration::from_millis(config.initial_delay_ms),
            max_delay: Duration::from_millis(config.max_delay_ms),
            backoff_multiplier: config.backoff_multiplier,
        }
    }

    /// A policy that never retries
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            initial_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            backoff_multiplier: 1.0,
        }
    }

    /// Delay before retry number `attempt` (0-based)
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = self.backoff_multiplier.max(1.0).powi(attempt as i32);
        let millis = (self.initial_delay.as_millis() as f64 * factor).min(u64::MAX as f64);
        Duration::from_millis(millis as u64).min(self.max_delay)
    }
}

/// Parses a `Retry-After` header value
///
/// Accepts delta-seconds (`"120"`) and HTTP-dates. Returns `None` for
/// unparseable values, dates in the past, or waits longer than an hour.
pub fn parse_retry_after(value: &str) -> Option<Duration> {
    let value = value.trim();
    if let Ok(seconds) = value.parse::<u64>() {
        return Some(Duration::from_secs(seconds).min(MAX_RETRY_AFTER));
    }

    let date = chrono::DateTime::parse_from_rfc2822(value).ok()?;
    let diff = date.with_timezone(&chrono::Utc) - chrono::Utc::now();
    let wait = diff.to_std().ok()?;
    (wait <= MAX_RETRY_AFTER).then_some(wait)
}

/// Runs `f` until it succeeds, fails permanently, or retries are exhausted
pub async fn with_retry<F, Fut, T>(
    policy: &RetryPolicy,
    operation_name: &str,
    mut f: F,
) -> Result<T, DriveError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, AttemptError>>,
{
    let mut attempt: u32 = 0;
    loop {
        match f().await {
            Ok(value) => {
                if attempt > 0 {
                    info!(
                        operation = operation_name,
                        attempt, "Operation succeeded after retry"
                    );
                }
                return Ok(value);
            }
            Err(failure) => {
                if attempt >= policy.max_retries || !failure.error.is_transient() {
                    return Err(failure.error);
                }

                let delay = failure
                    .retry_after
                    .unwrap_or_else(|| policy.delay_for(attempt));
                warn!(
                    operation = operation_name,
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    error = %failure.error,
                    "Transient error, retrying"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
        }
    }
}
