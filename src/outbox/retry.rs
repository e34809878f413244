use std::time::Duration;
use tokio::time::sleep;

// ============================================================================
// Bounded Exponential Backoff for Event Dispatch
// ============================================================================
//
// Publishing drained events is at-least-once: a transient broker failure
// must not lose the batch, so dispatch attempts are retried with backoff
// until the attempt budget is exhausted.
//
// ============================================================================

#[derive(Clone, Debug)]
pub struct RetryConfig {
    /// Maximum number of attempts, including the first.
    pub max_attempts: u32,
    /// Delay before the first retry.
    pub initial_delay: Duration,
    /// Ceiling for the backoff delay.
    pub max_delay: Duration,
    /// Multiplier applied to the delay after each failed attempt.
    pub multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(10),
            multiplier: 2.0,
        }
    }
}

/// Execute an async operation, retrying failures with exponential backoff.
///
/// Returns the last error when every attempt fails.
pub async fn retry_with_backoff<F, Fut, T, E>(config: &RetryConfig, mut operation: F) -> Result<T, E>
where
    F: FnMut(u32) -> Fut,
    Fut: std::future::Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    let max_attempts = config.max_attempts.max(1);
    let mut delay = config.initial_delay;
    let mut attempt = 0;

    loop {
        attempt += 1;
        match operation(attempt).await {
            Ok(result) => {
                if attempt > 1 {
                    tracing::info!(attempt = attempt, "operation succeeded after retry");
                }
                return Ok(result);
            }
            Err(err) if attempt < max_attempts => {
                tracing::warn!(
                    attempt = attempt,
                    max_attempts = max_attempts,
                    error = %err,
                    "operation failed, retrying"
                );
                sleep(delay).await;
                delay = delay.mul_f64(config.multiplier).min(config.max_delay);
            }
            Err(err) => return Err(err),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
