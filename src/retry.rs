//! Retry envelope for upstream calls: bounded attempts, exponential
//! backoff, and blocked-response detection.

use crate::config::EngineConfig;
use crate::sleeper::{Sleeper, TokioSleeper};
use crate::upstream::UpstreamError;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

/// Signatures a structured-parse failure of an anti-bot HTML page leaves in
/// an error message.
const BLOCKED_SIGNATURES: [&str; 4] =
    ["Unexpected token", "is not valid JSON", "html", "DOCTYPE"];

/// Whether a failure message looks like the provider served its anti-bot
/// page instead of data.
pub fn looks_blocked(message: &str) -> bool {
    BLOCKED_SIGNATURES.iter().any(|needle| message.contains(needle))
}

/// Outcome of a retried upstream call.
#[derive(Debug, thiserror::Error)]
pub enum RetryError {
    /// Every attempt failed. Carries the last underlying failure, the
    /// attempt count, and whether that last failure looked blocked.
    #[error("upstream failed after {attempts} attempts: {last}")]
    Exhausted {
        attempts: u32,
        blocked: bool,
        #[source]
        last: UpstreamError,
    },

    /// A non-retryable failure short-circuited the envelope.
    #[error(transparent)]
    Fatal(UpstreamError),
}

/// Wraps an upstream thunk in up to `max_attempts` tries.
///
/// Delay before attempt n+1 is `base_delay × 2^(n−1)`, plus
/// `blocked_penalty` when the failure that triggered the retry looks like
/// an anti-bot block. Delays run through the injected [`Sleeper`].
#[derive(Clone)]
pub struct RetryPolicy {
    max_attempts: u32,
    base_delay: Duration,
    blocked_penalty: Duration,
    sleeper: Arc<dyn Sleeper>,
}

impl std::fmt::Debug for RetryPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetryPolicy")
            .field("max_attempts", &self.max_attempts)
            .field("base_delay", &self.base_delay)
            .field("blocked_penalty", &self.blocked_penalty)
            .finish()
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration, blocked_penalty: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
            blocked_penalty,
            sleeper: Arc::new(TokioSleeper),
        }
    }

    pub fn from_config(config: &EngineConfig) -> Self {
        Self::new(
            config.max_attempts,
            config.retry_base_delay(),
            config.blocked_penalty(),
        )
    }

    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    /// Delay inserted before attempt `attempt + 1` (1-indexed attempts),
    /// before any blocked penalty.
    fn backoff_delay(&self, attempt: u32) -> Duration {
        let multiplier = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.base_delay
            .checked_mul(multiplier)
            .unwrap_or(Duration::from_secs(u64::MAX))
    }

    pub async fn execute<T, Fut, Op>(&self, mut operation: Op) -> Result<T, RetryError>
    where
        Fut: Future<Output = Result<T, UpstreamError>>,
        Op: FnMut() -> Fut,
    {
        for attempt in 1..=self.max_attempts {
            match operation().await {
                Ok(value) => return Ok(value),
                Err(err) if !err.is_retryable() => return Err(RetryError::Fatal(err)),
                Err(err) => {
                    let blocked = looks_blocked(&err.to_string());
                    if attempt == self.max_attempts {
                        return Err(RetryError::Exhausted {
                            attempts: self.max_attempts,
                            blocked,
                            last: err,
                        });
                    }

                    let mut delay = self.backoff_delay(attempt);
                    if blocked {
                        delay = delay.saturating_add(self.blocked_penalty);
                    }
                    tracing::warn!(
                        attempt,
                        max_attempts = self.max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        blocked,
                        error = %err,
                        "upstream attempt failed, backing off"
                    );
                    self.sleeper.sleep(delay).await;
                }
            }
        }
        unreachable!("retry loop returns from within")
    }
}
