//! Connection pool implementation.
//!
//! Capacity is a semaphore sized `max_size + max_overflow`; the idle set is a
//! queue capped at `max_size`, so overflow connections exist only while
//! checked out and are destroyed on return. Checkout and checkin touch one
//! mutex held for pushes and pops only; nothing async happens under it.

use std::collections::VecDeque;
use std::fmt;
use std::ops::{Deref, DerefMut};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};
use txflow_backend::{Connection, ConnectionManager, Event, Hooks, NopHooks};

use crate::config::PoolConfig;
use crate::error::PoolError;

/// Attempts at opening a fresh connection inside one `acquire` call.
/// The second attempt only happens for transient open failures.
const FRESH_OPEN_ATTEMPTS: u32 = 2;

/// A bounded connection pool.
///
/// The pool is cheap to clone; clones share the same state. Create it once
/// at startup, pass it to whoever needs it, and call [`Pool::dispose`] at
/// shutdown.
pub struct Pool<M: ConnectionManager> {
    inner: Arc<PoolInner<M>>,
}

impl<M: ConnectionManager> Clone for Pool<M> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

struct PoolInner<M: ConnectionManager> {
    manager: M,
    config: PoolConfig,
    semaphore: Arc<Semaphore>,
    state: Mutex<PoolState<M::Connection>>,
    hooks: Arc<dyn Hooks>,
    counters: Counters,
    next_id: AtomicU64,
}

struct PoolState<C> {
    idle: VecDeque<Entry<C>>,
    shutdown: bool,
}

struct Entry<C> {
    conn: C,
    id: u64,
    created_at: Instant,
    returned_at: Instant,
}

impl<C> Entry<C> {
    fn is_expired(&self, idle_timeout: Duration, max_lifetime: Option<Duration>) -> bool {
        if self.returned_at.elapsed() > idle_timeout {
            return true;
        }
        max_lifetime.is_some_and(|lifetime| self.created_at.elapsed() > lifetime)
    }
}

#[derive(Default)]
struct Counters {
    created: AtomicU64,
    destroyed: AtomicU64,
    checked_out: AtomicU64,
    checked_in: AtomicU64,
    discarded: AtomicU64,
    in_use: AtomicUsize,
    waiting: AtomicUsize,
}

/// Point-in-time pool counters.
///
/// The cumulative counters satisfy `checked_out == checked_in + discarded +
/// in_use` and `created == destroyed + idle + in_use` whenever no acquire is
/// mid-flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub struct PoolStats {
    /// Physical connections opened.
    pub created: u64,
    /// Physical connections destroyed.
    pub destroyed: u64,
    /// Checkouts handed to callers.
    pub checked_out: u64,
    /// Checkouts returned to the idle set.
    pub checked_in: u64,
    /// Checkouts destroyed at return instead of re-pooled.
    pub discarded: u64,
    /// Connections currently idle.
    pub idle: usize,
    /// Connections currently checked out.
    pub in_use: usize,
    /// Callers currently waiting for capacity.
    pub waiting: usize,
    /// Total concurrent checkouts admitted (`max_size + max_overflow`).
    pub capacity: usize,
}

/// Decrements the waiting gauge when a waiter leaves, on any path.
struct WaitGuard<'a>(&'a AtomicUsize);

impl Drop for WaitGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl<M: ConnectionManager> Pool<M> {
    /// Create a pool over `manager` with the given configuration.
    ///
    /// No connection is opened yet; see [`Pool::warm`] for eager opening.
    pub fn new(manager: M, config: PoolConfig) -> Result<Self, PoolError> {
        Self::with_hooks(manager, config, Arc::new(NopHooks))
    }

    /// Create a pool that reports lifecycle events to `hooks`.
    pub fn with_hooks(
        manager: M,
        config: PoolConfig,
        hooks: Arc<dyn Hooks>,
    ) -> Result<Self, PoolError> {
        config.validate()?;
        let semaphore = Arc::new(Semaphore::new(config.capacity()));
        info!(
            max_size = config.max_size,
            max_overflow = config.max_overflow,
            pre_ping = config.pre_ping,
            "pool created"
        );
        hooks.on_event(&Event::PoolCreated {
            max_size: config.max_size as usize,
            max_overflow: config.max_overflow as usize,
        });
        Ok(Self {
            inner: Arc::new(PoolInner {
                manager,
                config,
                semaphore,
                state: Mutex::new(PoolState {
                    idle: VecDeque::new(),
                    shutdown: false,
                }),
                hooks,
                counters: Counters::default(),
                next_id: AtomicU64::new(1),
            }),
        })
    }

    /// Check out a connection, waiting up to `pool_timeout` for capacity.
    ///
    /// Idle connections past `idle_timeout` or `max_lifetime` are discarded
    /// on the way; with `pre_ping` enabled, reused connections are probed
    /// first and dead ones replaced transparently.
    pub async fn acquire(&self) -> Result<PooledConn<M>, PoolError> {
        self.acquire_inner(None).await
    }

    /// Like [`Pool::acquire`], aborting immediately when `cancel` fires.
    pub async fn acquire_cancellable(
        &self,
        cancel: &CancellationToken,
    ) -> Result<PooledConn<M>, PoolError> {
        self.acquire_inner(Some(cancel)).await
    }

    async fn acquire_inner(
        &self,
        cancel: Option<&CancellationToken>,
    ) -> Result<PooledConn<M>, PoolError> {
        if self.is_closed() {
            return Err(PoolError::Closed);
        }
        let started = Instant::now();
        let pool_timeout = self.inner.config.pool_timeout;

        self.inner.counters.waiting.fetch_add(1, Ordering::SeqCst);
        let waiting = WaitGuard(&self.inner.counters.waiting);
        let wait = timeout(
            pool_timeout,
            Arc::clone(&self.inner.semaphore).acquire_owned(),
        );
        let outcome = match cancel {
            Some(token) => tokio::select! {
                res = wait => Some(res),
                () = token.cancelled() => None,
            },
            None => Some(wait.await),
        };
        drop(waiting);
        let permit = match outcome {
            Some(Ok(Ok(permit))) => permit,
            Some(Ok(Err(_))) => return Err(PoolError::Closed),
            Some(Err(_)) => {
                warn!(waited = ?pool_timeout, "pool exhausted");
                return Err(PoolError::Exhausted {
                    waited: pool_timeout,
                });
            }
            None => {
                trace!("acquire cancelled while waiting for capacity");
                return Err(PoolError::Cancelled);
            }
        };
        // dispose() may have raced the wait
        if self.is_closed() {
            return Err(PoolError::Closed);
        }

        // Prefer an idle connection, discarding expired or dead ones.
        loop {
            let entry = self.inner.state.lock().idle.pop_front();
            let Some(mut entry) = entry else { break };

            if entry.is_expired(self.inner.config.idle_timeout, self.inner.config.max_lifetime) {
                self.inner.destroy(entry.conn, entry.id, "expired");
                continue;
            }
            if !entry.conn.is_open() {
                self.inner.destroy(entry.conn, entry.id, "broken");
                continue;
            }
            if self.inner.config.pre_ping {
                let probed = match cancel {
                    Some(token) => tokio::select! {
                        res = entry.conn.ping() => Some(res),
                        () = token.cancelled() => None,
                    },
                    None => Some(entry.conn.ping().await),
                };
                match probed {
                    Some(Ok(())) => {}
                    Some(Err(err)) => {
                        debug!(
                            connection_id = entry.id,
                            error = %err,
                            "liveness probe failed, discarding"
                        );
                        self.inner.destroy(entry.conn, entry.id, "failed probe");
                        continue;
                    }
                    None => {
                        self.inner.destroy(entry.conn, entry.id, "probe interrupted");
                        return Err(PoolError::Cancelled);
                    }
                }
            }
            return Ok(self.deliver(permit, entry.conn, entry.id, entry.created_at, true, started));
        }

        // Idle set exhausted: open a fresh connection.
        let mut attempt = 0;
        loop {
            attempt += 1;
            let opened = match cancel {
                Some(token) => tokio::select! {
                    res = self.inner.manager.connect() => Some(res),
                    () = token.cancelled() => None,
                },
                None => Some(self.inner.manager.connect().await),
            };
            match opened {
                Some(Ok(conn)) => {
                    let id = self.inner.next_id.fetch_add(1, Ordering::SeqCst);
                    self.inner.counters.created.fetch_add(1, Ordering::SeqCst);
                    debug!(connection_id = id, "opened new connection");
                    return Ok(self.deliver(permit, conn, id, Instant::now(), false, started));
                }
                Some(Err(err)) if err.is_transient() && attempt < FRESH_OPEN_ATTEMPTS => {
                    debug!(error = %err, attempt, "transient open failure, retrying");
                }
                Some(Err(err)) => return Err(PoolError::Connect(err)),
                None => return Err(PoolError::Cancelled),
            }
        }
    }

    fn deliver(
        &self,
        permit: OwnedSemaphorePermit,
        conn: M::Connection,
        id: u64,
        created_at: Instant,
        reused: bool,
        started: Instant,
    ) -> PooledConn<M> {
        let waited = started.elapsed();
        self.inner.counters.checked_out.fetch_add(1, Ordering::SeqCst);
        self.inner.counters.in_use.fetch_add(1, Ordering::SeqCst);
        trace!(
            connection_id = id,
            reused,
            waited_us = waited.as_micros() as u64,
            "connection checked out"
        );
        self.inner.hooks.on_event(&Event::CheckedOut {
            connection_id: id,
            reused,
            waited,
        });
        PooledConn {
            conn: Some(conn),
            id,
            created_at,
            dirty: false,
            pool: Arc::clone(&self.inner),
            _permit: permit,
        }
    }

    /// Eagerly open and pool up to `count` probed connections.
    ///
    /// Stops early when the idle set reaches `max_size`. Returns how many
    /// connections were opened; a connect or probe failure surfaces
    /// immediately, which makes this double as a startup connectivity check.
    pub async fn warm(&self, count: u32) -> Result<u32, PoolError> {
        let mut opened = 0;
        for _ in 0..count {
            {
                let state = self.inner.state.lock();
                if state.shutdown {
                    return Err(PoolError::Closed);
                }
                if state.idle.len() >= self.inner.config.max_size as usize {
                    break;
                }
            }
            let mut conn = self.inner.manager.connect().await?;
            conn.ping().await?;
            let id = self.inner.next_id.fetch_add(1, Ordering::SeqCst);
            self.inner.counters.created.fetch_add(1, Ordering::SeqCst);
            let now = Instant::now();
            // The cap must be re-checked here: a concurrent warm or a
            // returning guard may have filled the idle set while this
            // connection was being opened.
            let mut state = self.inner.state.lock();
            if state.shutdown {
                drop(state);
                self.inner.destroy(conn, id, "pool disposed");
                return Err(PoolError::Closed);
            }
            if state.idle.len() >= self.inner.config.max_size as usize {
                drop(state);
                self.inner.destroy(conn, id, "surplus");
                break;
            }
            state.idle.push_back(Entry {
                conn,
                id,
                created_at: now,
                returned_at: now,
            });
            drop(state);
            trace!(connection_id = id, "warmed connection");
            opened += 1;
        }
        Ok(opened)
    }

    /// Close every idle connection and mark the pool closed.
    ///
    /// Idempotent. Waiters blocked in `acquire` are woken with
    /// [`PoolError::Closed`]; connections still checked out are destroyed
    /// when their guards drop.
    pub fn dispose(&self) {
        let drained = {
            let mut state = self.inner.state.lock();
            if state.shutdown {
                return;
            }
            state.shutdown = true;
            std::mem::take(&mut state.idle)
        };
        self.inner.semaphore.close();
        let closed = drained.len();
        for entry in drained {
            self.inner.destroy(entry.conn, entry.id, "pool disposed");
        }
        info!(closed, "pool disposed");
    }

    /// Check if the pool has been disposed.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.inner.state.lock().shutdown
    }

    /// Snapshot the pool counters.
    #[must_use]
    pub fn stats(&self) -> PoolStats {
        let idle = self.inner.state.lock().idle.len();
        let c = &self.inner.counters;
        PoolStats {
            created: c.created.load(Ordering::SeqCst),
            destroyed: c.destroyed.load(Ordering::SeqCst),
            checked_out: c.checked_out.load(Ordering::SeqCst),
            checked_in: c.checked_in.load(Ordering::SeqCst),
            discarded: c.discarded.load(Ordering::SeqCst),
            idle,
            in_use: c.in_use.load(Ordering::SeqCst),
            waiting: c.waiting.load(Ordering::SeqCst),
            capacity: self.inner.config.capacity(),
        }
    }

    /// The pool's configuration.
    #[must_use]
    pub fn config(&self) -> &PoolConfig {
        &self.inner.config
    }

    /// The hooks this pool reports to, for sharing with an executor.
    #[must_use]
    pub fn hooks(&self) -> Arc<dyn Hooks> {
        Arc::clone(&self.inner.hooks)
    }
}

impl<M: ConnectionManager> fmt::Debug for Pool<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let stats = self.stats();
        f.debug_struct("Pool")
            .field("idle", &stats.idle)
            .field("in_use", &stats.in_use)
            .field("capacity", &stats.capacity)
            .field("closed", &self.is_closed())
            .finish()
    }
}

impl<M: ConnectionManager> PoolInner<M> {
    /// Return a checked-out connection. Dirty, broken, surplus, or
    /// post-shutdown connections are destroyed instead of re-pooled.
    fn check_in(&self, conn: M::Connection, id: u64, created_at: Instant, dirty: bool) {
        self.counters.in_use.fetch_sub(1, Ordering::SeqCst);
        let rejected = if dirty {
            Some(("dirty", conn))
        } else if !conn.is_open() {
            Some(("broken", conn))
        } else {
            let mut state = self.state.lock();
            if state.shutdown {
                Some(("pool disposed", conn))
            } else if state.idle.len() >= self.config.max_size as usize {
                Some(("overflow", conn))
            } else {
                state.idle.push_back(Entry {
                    conn,
                    id,
                    created_at,
                    returned_at: Instant::now(),
                });
                None
            }
        };
        match rejected {
            None => {
                self.counters.checked_in.fetch_add(1, Ordering::SeqCst);
                trace!(connection_id = id, "connection returned to pool");
                self.hooks.on_event(&Event::CheckedIn {
                    connection_id: id,
                    discarded: false,
                });
            }
            Some((reason, conn)) => {
                self.counters.discarded.fetch_add(1, Ordering::SeqCst);
                self.destroy(conn, id, reason);
                self.hooks.on_event(&Event::CheckedIn {
                    connection_id: id,
                    discarded: true,
                });
            }
        }
    }

    fn destroy(&self, conn: M::Connection, id: u64, reason: &str) {
        self.counters.destroyed.fetch_add(1, Ordering::SeqCst);
        trace!(connection_id = id, reason, "destroying connection");
        drop(conn);
    }
}

/// A checked-out connection.
///
/// Dereferences to the provider's connection type. Dropping the guard
/// returns the connection to the pool; a guard marked dirty (or holding a
/// dead connection) is destroyed instead. Capacity is freed either way.
pub struct PooledConn<M: ConnectionManager> {
    conn: Option<M::Connection>,
    id: u64,
    created_at: Instant,
    dirty: bool,
    pool: Arc<PoolInner<M>>,
    _permit: OwnedSemaphorePermit,
}

impl<M: ConnectionManager> PooledConn<M> {
    /// Pool-assigned connection id.
    #[must_use]
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Whether this connection will be destroyed on return.
    #[must_use]
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Mark the connection in-use state as not safe to re-pool.
    ///
    /// Callers running multi-statement state (an open transaction, a held
    /// lock) set this before they start and clear it once the connection is
    /// known clean again.
    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    /// Clear the dirty mark.
    pub fn clear_dirty(&mut self) {
        self.dirty = false;
    }

    /// Destroy the connection immediately instead of returning it.
    pub fn discard(mut self) {
        self.dirty = true;
        drop(self);
    }
}

// The connection is always present between construction and drop.
#[allow(clippy::expect_used)]
impl<M: ConnectionManager> Deref for PooledConn<M> {
    type Target = M::Connection;

    fn deref(&self) -> &Self::Target {
        self.conn.as_ref().expect("connection present until drop")
    }
}

#[allow(clippy::expect_used)]
impl<M: ConnectionManager> DerefMut for PooledConn<M> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.conn.as_mut().expect("connection present until drop")
    }
}

impl<M: ConnectionManager> Drop for PooledConn<M> {
    fn drop(&mut self) {
        if let Some(conn) = self.conn.take() {
            self.pool.check_in(conn, self.id, self.created_at, self.dirty);
        }
    }
}

impl<M: ConnectionManager> fmt::Debug for PooledConn<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PooledConn")
            .field("id", &self.id)
            .field("dirty", &self.dirty)
            .finish()
    }
}
