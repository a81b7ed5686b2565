//! Exponential backoff retry.
//!
//! [`RetryPolicy`] is plain data describing a schedule; it decides how many
//! attempts to make and how long to sleep between them, never which errors
//! deserve another attempt. Classification stays with the caller as a
//! predicate, so the same policy works for connects, queries, and whole
//! transactions.

use std::fmt;
use std::future::Future;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::{Error, Result};

/// Retry schedule: bounded attempts with exponential backoff.
///
/// The delay before retry `n` is `base_delay * backoff_factor^(n-1)`, capped
/// at `max_delay`, with optional jitter.
#[derive(Debug, Clone, Copy, PartialEq)]
#[non_exhaustive]
pub struct RetryPolicy {
    /// Total attempts, including the first. Minimum 1.
    pub max_attempts: u32,
    /// Delay before the first retry.
    pub base_delay: Duration,
    /// Multiplier applied for each further retry. Minimum 1.0.
    pub backoff_factor: f64,
    /// Upper bound on any single delay.
    pub max_delay: Duration,
    /// Randomize each delay by up to ±25% to spread out competing retries.
    pub jitter: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(100),
            backoff_factor: 2.0,
            max_delay: Duration::from_secs(30),
            jitter: false,
        }
    }
}

impl RetryPolicy {
    /// Create the default policy: 3 attempts, 100ms base, doubling.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A single attempt, failures surface immediately.
    #[must_use]
    pub fn no_retry() -> Self {
        Self::default().max_attempts(1)
    }

    /// Set the total number of attempts, including the first.
    #[must_use]
    pub fn max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts;
        self
    }

    /// Set the delay before the first retry.
    #[must_use]
    pub fn base_delay(mut self, delay: Duration) -> Self {
        self.base_delay = delay;
        self
    }

    /// Set the backoff multiplier.
    #[must_use]
    pub fn backoff_factor(mut self, factor: f64) -> Self {
        self.backoff_factor = factor;
        self
    }

    /// Set the upper bound on any single delay.
    #[must_use]
    pub fn max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    /// Enable or disable jitter.
    #[must_use]
    pub fn jitter(mut self, enabled: bool) -> Self {
        self.jitter = enabled;
        self
    }

    /// Validate the policy parameters.
    pub fn validate(&self) -> Result<()> {
        if self.max_attempts == 0 {
            return Err(Error::Config("max_attempts must be at least 1".into()));
        }
        if self.base_delay.is_zero() {
            return Err(Error::Config("base_delay must be positive".into()));
        }
        if self.backoff_factor < 1.0 || self.backoff_factor.is_nan() {
            return Err(Error::Config("backoff_factor must be at least 1.0".into()));
        }
        Ok(())
    }

    /// Delay before retry number `attempt` (1-based, counting failures).
    ///
    /// Total for any parameter values: a policy built without
    /// [`RetryPolicy::validate`] may carry an out-of-range factor, and the
    /// resulting delay clamps to zero instead of panicking.
    #[must_use]
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(63);
        let raw = self.base_delay.as_secs_f64() * self.backoff_factor.powi(exponent as i32);
        let capped = raw.min(self.max_delay.as_secs_f64());
        let seconds = if self.jitter {
            apply_jitter(capped)
        } else {
            capped
        };
        // from_secs_f64 rejects sign-negative input, -0.0 included.
        if seconds > 0.0 {
            Duration::from_secs_f64(seconds)
        } else {
            Duration::ZERO
        }
    }
}

/// Scale by a factor in [0.75, 1.25) drawn from the clock's nanoseconds.
/// Decorrelation is all that matters here, not statistical quality.
fn apply_jitter(seconds: f64) -> f64 {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |since| since.subsec_nanos());
    let unit = f64::from(nanos) / 1e9;
    seconds * (0.75 + unit * 0.5)
}

/// Context passed to the retry observer before each backoff sleep.
#[derive(Debug, Clone, Copy)]
#[non_exhaustive]
pub struct RetryContext {
    /// The attempt that just failed, 1-based.
    pub attempt: u32,
    /// Time since the first attempt started.
    pub elapsed: Duration,
    /// Sleep before the next attempt.
    pub next_delay: Duration,
}

/// Run `op` until it succeeds, a non-retryable error occurs, or attempts run
/// out. The error from the final attempt is returned as-is; this function
/// never substitutes an error of its own.
///
/// `op` is called once per attempt and must own what it captures, typically
/// by cloning handles into the future it returns.
pub async fn with_retry<T, E, Op, Fut, Pred>(
    policy: &RetryPolicy,
    op: Op,
    is_retryable: Pred,
) -> std::result::Result<T, E>
where
    Op: FnMut() -> Fut,
    Fut: Future<Output = std::result::Result<T, E>>,
    Pred: Fn(&E) -> bool,
    E: fmt::Display,
{
    with_retry_observed(policy, op, is_retryable, |_, _| {}, None).await
}

/// Like [`with_retry`], with an observer called before each backoff sleep
/// and an optional token that aborts the sleep.
///
/// When the token fires during a backoff sleep, the error from the last
/// attempt is returned immediately;
/// [`Executor::run_with_retry`](crate::Executor::run_with_retry) reports
/// the same interruption as its `Cancelled` variant instead.
pub async fn with_retry_observed<T, E, Op, Fut, Pred, Obs>(
    policy: &RetryPolicy,
    mut op: Op,
    is_retryable: Pred,
    mut observe: Obs,
    cancel: Option<&CancellationToken>,
) -> std::result::Result<T, E>
where
    Op: FnMut() -> Fut,
    Fut: Future<Output = std::result::Result<T, E>>,
    Pred: Fn(&E) -> bool,
    Obs: FnMut(&RetryContext, &E),
    E: fmt::Display,
{
    let started = Instant::now();
    let mut attempt = 1u32;
    loop {
        match op().await {
            Ok(value) => {
                if attempt > 1 {
                    debug!(attempt, "operation recovered after retry");
                }
                return Ok(value);
            }
            Err(err) if attempt < policy.max_attempts.max(1) && is_retryable(&err) => {
                let delay = policy.delay_for(attempt);
                let context = RetryContext {
                    attempt,
                    elapsed: started.elapsed(),
                    next_delay: delay,
                };
                observe(&context, &err);
                debug!(
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    error = %err,
                    "retrying after backoff"
                );
                let interrupted = match cancel {
                    Some(token) => tokio::select! {
                        () = tokio::time::sleep(delay) => false,
                        () = token.cancelled() => true,
                    },
                    None => {
                        tokio::time::sleep(delay).await;
                        false
                    }
                };
                if interrupted {
                    debug!(attempt, error = %err, "backoff interrupted by cancellation");
                    return Err(err);
                }
                attempt += 1;
            }
            Err(err) => {
                if attempt > 1 {
                    warn!(
                        attempts = attempt,
                        elapsed_ms = started.elapsed().as_millis() as u64,
                        error = %err,
                        "giving up after retries"
                    );
                }
                return Err(err);
            }
        }
    }
}
