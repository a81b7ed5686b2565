//! Transaction scopes with retry composition.
//!
//! [`Executor`] is the entry point: it borrows capacity from a [`Pool`],
//! opens a [`Session`] per unit of work, and guarantees the transaction
//! resolves exactly once no matter how the work ends. Retries always run on
//! a fresh session, and nothing is checked out while a backoff sleep is
//! pending.

use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use futures_core::future::BoxFuture;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use txflow_backend::{ConnectionManager, Event, Hooks, TransactionOptions};
use txflow_pool::{Pool, PoolError};

use crate::error::{Error, Result};
use crate::retry::RetryPolicy;
use crate::session::Session;

/// Runs units of work in transaction scopes over pooled sessions.
///
/// Cloning is cheap; clones share the pool and configuration.
///
/// # Example
///
/// ```rust,ignore
/// let executor = Executor::new(pool).retry_policy(RetryPolicy::new());
///
/// let total = executor
///     .run_with_retry(|session| {
///         Box::pin(async move {
///             session.execute("insert orders widget", &[]).await?;
///             let row = session.query_opt("count orders", &[]).await?;
///             Ok(row)
///         })
///     })
///     .await?;
/// ```
pub struct Executor<M: ConnectionManager> {
    pool: Pool<M>,
    policy: RetryPolicy,
    classify: Arc<dyn Fn(&Error) -> bool + Send + Sync>,
    hooks: Arc<dyn Hooks>,
    cancel: CancellationToken,
}

impl<M: ConnectionManager> Clone for Executor<M> {
    fn clone(&self) -> Self {
        Self {
            pool: self.pool.clone(),
            policy: self.policy,
            classify: Arc::clone(&self.classify),
            hooks: Arc::clone(&self.hooks),
            cancel: self.cancel.clone(),
        }
    }
}

impl<M: ConnectionManager> Executor<M> {
    /// Create an executor with the default retry policy and classification,
    /// reporting events to the pool's hooks.
    pub fn new(pool: Pool<M>) -> Self {
        let hooks = pool.hooks();
        Self {
            pool,
            policy: RetryPolicy::default(),
            classify: Arc::new(Error::is_retryable),
            hooks,
            cancel: CancellationToken::new(),
        }
    }

    /// Set the retry policy used by [`Executor::run_with_retry`].
    #[must_use]
    pub fn retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Replace the retry classification.
    ///
    /// The default is [`Error::is_retryable`]. Override to widen it, for
    /// example also retrying pool exhaustion:
    ///
    /// ```rust,ignore
    /// let executor = executor.classifier(|err| {
    ///     err.is_retryable() || matches!(err, Error::Pool(PoolError::Exhausted { .. }))
    /// });
    /// ```
    #[must_use]
    pub fn classifier(mut self, classify: impl Fn(&Error) -> bool + Send + Sync + 'static) -> Self {
        self.classify = Arc::new(classify);
        self
    }

    /// Replace the hooks receiving session and retry events.
    #[must_use]
    pub fn hooks(mut self, hooks: Arc<dyn Hooks>) -> Self {
        self.hooks = hooks;
        self
    }

    /// Bind a cancellation token.
    ///
    /// When it fires, blocked acquires and backoff sleeps abort with
    /// [`Error::Cancelled`]; a unit of work already running is interrupted
    /// and its transaction rolled back.
    #[must_use]
    pub fn cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// The pool this executor draws connections from.
    #[must_use]
    pub fn pool(&self) -> &Pool<M> {
        &self.pool
    }

    /// Open a session with an active transaction for manual control.
    ///
    /// Prefer [`Executor::with_transaction`]; use this when commit and
    /// rollback decisions have to live outside a closure.
    pub async fn session(&self) -> Result<Session<M>> {
        self.session_opts(TransactionOptions::new()).await
    }

    /// Like [`Executor::session`], with explicit transaction options.
    pub async fn session_opts(&self, options: TransactionOptions) -> Result<Session<M>> {
        let conn = match self.pool.acquire_cancellable(&self.cancel).await {
            Ok(conn) => conn,
            Err(PoolError::Cancelled) => return Err(Error::Cancelled),
            Err(err) => return Err(Error::Pool(err)),
        };
        Session::open(conn, options, Arc::clone(&self.hooks)).await
    }

    /// Run `work` inside a transaction scope.
    ///
    /// On success the transaction commits and the work's value is returned.
    /// On failure it rolls back and the work's error surfaces unchanged. If
    /// the rollback itself fails, the connection is discarded and
    /// [`Error::RollbackFailed`] surfaces with the work's error as cause.
    pub async fn with_transaction<T, F>(&self, work: F) -> Result<T>
    where
        F: for<'s> FnMut(&'s mut Session<M>) -> BoxFuture<'s, Result<T>>,
    {
        self.with_transaction_opts(TransactionOptions::new(), work).await
    }

    /// Like [`Executor::with_transaction`], with explicit transaction options.
    pub async fn with_transaction_opts<T, F>(
        &self,
        options: TransactionOptions,
        mut work: F,
    ) -> Result<T>
    where
        F: for<'s> FnMut(&'s mut Session<M>) -> BoxFuture<'s, Result<T>>,
    {
        let mut session = self.session_opts(options).await?;
        let outcome = tokio::select! {
            result = work(&mut session) => result,
            () = self.cancel.cancelled() => {
                debug!(
                    connection_id = session.connection_id(),
                    "unit of work cancelled"
                );
                Err(Error::Cancelled)
            }
        };
        match outcome {
            Ok(value) => match session.commit().await {
                Ok(()) => Ok(value),
                Err(commit_err) => Err(self.resolve_failure(session, commit_err).await),
            },
            Err(err) => Err(self.resolve_failure(session, err).await),
        }
    }

    /// Roll back after `cause`; escalate if the rollback also fails.
    async fn resolve_failure(&self, mut session: Session<M>, cause: Error) -> Error {
        debug!(
            connection_id = session.connection_id(),
            error = %cause,
            "rolling back after failure"
        );
        match session.rollback_inner().await {
            Ok(()) => cause,
            Err(rollback) => {
                session.discard();
                Error::RollbackFailed {
                    cause: Box::new(cause),
                    rollback,
                }
            }
        }
    }

    /// Run `work` through [`Executor::with_transaction`], retrying failed
    /// attempts per the executor's policy and classification.
    ///
    /// Every attempt gets a fresh session on a fresh checkout; between
    /// attempts no connection is held. The error from the final attempt is
    /// surfaced as-is, with one exception: cancellation during a backoff
    /// sleep surfaces [`Error::Cancelled`]. The free
    /// [`with_retry_observed`](crate::retry::with_retry_observed) helper,
    /// generic over its error type, returns the interrupted attempt's error
    /// for the same event.
    pub async fn run_with_retry<T, F>(&self, work: F) -> Result<T>
    where
        F: for<'s> FnMut(&'s mut Session<M>) -> BoxFuture<'s, Result<T>>,
    {
        self.run_with_retry_opts(TransactionOptions::new(), work).await
    }

    /// Like [`Executor::run_with_retry`], with explicit transaction options.
    pub async fn run_with_retry_opts<T, F>(
        &self,
        options: TransactionOptions,
        mut work: F,
    ) -> Result<T>
    where
        F: for<'s> FnMut(&'s mut Session<M>) -> BoxFuture<'s, Result<T>>,
    {
        self.policy.validate()?;
        let started = Instant::now();
        let mut attempt = 1u32;
        loop {
            match self.with_transaction_opts(options, &mut work).await {
                Ok(value) => {
                    if attempt > 1 {
                        debug!(attempt, "transaction recovered after retry");
                    }
                    return Ok(value);
                }
                Err(err) if attempt < self.policy.max_attempts && (self.classify)(&err) => {
                    let delay = self.policy.delay_for(attempt);
                    self.hooks.on_event(&Event::RetryAttempted { attempt, delay });
                    debug!(
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "retrying transaction after backoff"
                    );
                    tokio::select! {
                        () = tokio::time::sleep(delay) => {}
                        () = self.cancel.cancelled() => {
                            debug!(attempt, error = %err, "backoff interrupted by cancellation");
                            return Err(Error::Cancelled);
                        }
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
}

impl<M: ConnectionManager> fmt::Debug for Executor<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Executor")
            .field("pool", &self.pool)
            .field("policy", &self.policy)
            .field("cancelled", &self.cancel.is_cancelled())
            .finish()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use txflow_pool::PoolConfig;
    use txflow_testing::TestBackend;

    #[tokio::test]
    async fn clones_share_the_pool() {
        let backend = TestBackend::new();
        let pool = Pool::new(backend.manager.clone(), PoolConfig::new()).unwrap();
        let executor = Executor::new(pool);
        let cloned = executor.clone();

        cloned
            .with_transaction(|session| {
                Box::pin(async move {
                    session.execute("insert events shared", &[]).await?;
                    Ok(())
                })
            })
            .await
            .unwrap();

        assert_eq!(backend.store.count("events"), 1);
        assert_eq!(executor.pool().stats().created, 1);
    }

    #[tokio::test]
    async fn debug_formatting_is_stable() {
        let backend = TestBackend::new();
        let pool = Pool::new(backend.manager.clone(), PoolConfig::new()).unwrap();
        let executor = Executor::new(pool);
        let rendered = format!("{executor:?}");
        assert!(rendered.contains("Executor"));
        assert!(rendered.contains("policy"));
    }
}
