//! Bounded retry for external calls.
//!
//! The bound lives in configuration, not in call sites: the issue
//! sink (and anything else that needs it) runs through [`with_retry`]
//! with a [`RetryConfig`] instead of an ad-hoc attempt loop.

use crate::{Result, TriageError};
use std::future::Future;
use std::time::Duration;
use tracing::{error, info, warn};

/// Retry strategy configuration.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct RetryConfig {
    /// Total number of attempts, including the first.
    pub max_attempts: u32,

    /// Delay between attempts in milliseconds. 0 retries immediately,
    /// which matches the observed tracking-system behavior; a delay
    /// is opt-in configuration.
    #[serde(default)]
    pub backoff_ms: u64,

    /// Whether to add up to 25% random jitter to the delay.
    #[serde(default)]
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff_ms: 0,
            jitter: false,
        }
    }
}

impl RetryConfig {
    /// Create a configuration with a custom attempt bound.
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            ..Default::default()
        }
    }

    /// Set the delay between attempts.
    pub fn with_backoff(mut self, ms: u64) -> Self {
        self.backoff_ms = ms;
        self
    }

    /// Enable or disable jitter.
    pub fn with_jitter(mut self, jitter: bool) -> Self {
        self.jitter = jitter;
        self
    }

    /// Delay to sleep after a failed attempt.
    pub fn delay(&self) -> Duration {
        let delay_ms = if self.jitter && self.backoff_ms > 0 {
            let jitter_amount = (self.backoff_ms as f64 * 0.25 * rand::random::<f64>()) as u64;
            self.backoff_ms + jitter_amount
        } else {
            self.backoff_ms
        };

        Duration::from_millis(delay_ms)
    }
}

/// Execute an async operation with a bounded number of attempts.
///
/// Every failure counts against the bound; there is no transient/
/// permanent distinction, so the attempt count observed by callers is
/// exact. Each failed attempt is logged with its number; the last
/// error propagates after the bound is exhausted.
pub async fn with_retry<F, Fut, T>(
    config: &RetryConfig,
    operation_name: &str,
    mut f: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let max_attempts = config.max_attempts.max(1);
    let mut last_error = None;

    for attempt in 1..=max_attempts {
        match f().await {
            Ok(result) => {
                if attempt > 1 {
                    info!(
                        operation = operation_name,
                        attempt,
                        "Operation succeeded after retry"
                    );
                }
                return Ok(result);
            }
            Err(e) => {
                warn!(
                    operation = operation_name,
                    attempt,
                    max_attempts,
                    error = %e,
                    "Operation attempt failed"
                );
                last_error = Some(e);

                if attempt < max_attempts && config.backoff_ms > 0 {
                    tokio::time::sleep(config.delay()).await;
                }
            }
        }
    }

    let final_error = last_error.unwrap_or_else(|| {
        TriageError::Queue(format!("operation '{operation_name}' never ran"))
    });

    error!(
        operation = operation_name,
        max_attempts,
        error = %final_error,
        "All attempts exhausted"
    );

    Err(final_error)
}
