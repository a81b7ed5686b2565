//! In-memory transactional backend.
//!
//! [`MemManager`] implements the provider traits against a store that lives
//! entirely in process memory, which makes pool and transaction behavior
//! testable without a database. Commands use a tiny verb grammar instead of
//! SQL:
//!
//! - `execute("insert <table> <value>")` adds a row, affected count 1
//! - `query("select <table>")` returns `(id, value)` rows
//! - `query("count <table>")` returns a single count row
//!
//! Outside a transaction, writes apply immediately. Inside one they stay
//! pending on the connection until `commit`, so other connections observe
//! them only after the commit, and `rollback` drops them.
//!
//! [`FaultPlan`] scripts failures: each provider operation consumes the next
//! queued error for it, if any, before doing real work. An injected error
//! that is fatal for the connection also marks the connection closed. It can
//! also stall `connect` to model a slow dial.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use once_cell::sync::Lazy;
use parking_lot::Mutex;
use txflow_backend::{
    BackendError, Connection, ConnectionManager, Dsn, Row, TransactionOptions, Value,
};

/// Shared handle to one store's committed state and counters.
///
/// Clones share state. Hand the same store to several managers (or use
/// [`MemManager::from_dsn`] with the same name) to model several pools over
/// one database.
#[derive(Debug, Clone, Default)]
pub struct MemStore {
    inner: Arc<Mutex<StoreState>>,
}

#[derive(Debug, Default)]
struct StoreState {
    tables: HashMap<String, Vec<(i64, String)>>,
    next_id: i64,
    connects: u64,
    begins: u64,
    commits: u64,
    rollbacks: u64,
    last_begin: Option<TransactionOptions>,
}

impl MemStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Committed rows of `table`, in insertion order.
    #[must_use]
    pub fn rows(&self, table: &str) -> Vec<(i64, String)> {
        self.inner
            .lock()
            .tables
            .get(table)
            .cloned()
            .unwrap_or_default()
    }

    /// Number of committed rows in `table`.
    #[must_use]
    pub fn count(&self, table: &str) -> usize {
        self.inner.lock().tables.get(table).map_or(0, Vec::len)
    }

    /// Insert a committed row directly, bypassing any connection.
    ///
    /// Returns the id of the new row. Used to seed fixtures.
    pub fn insert_committed(&self, table: &str, value: &str) -> i64 {
        let mut state = self.inner.lock();
        state.next_id += 1;
        let id = state.next_id;
        state
            .tables
            .entry(table.to_string())
            .or_default()
            .push((id, value.to_string()));
        id
    }

    /// Connections opened against this store.
    #[must_use]
    pub fn connects(&self) -> u64 {
        self.inner.lock().connects
    }

    /// Transactions begun against this store.
    #[must_use]
    pub fn begins(&self) -> u64 {
        self.inner.lock().begins
    }

    /// Transactions committed against this store.
    #[must_use]
    pub fn commits(&self) -> u64 {
        self.inner.lock().commits
    }

    /// Transactions rolled back against this store.
    #[must_use]
    pub fn rollbacks(&self) -> u64 {
        self.inner.lock().rollbacks
    }

    /// Options of the most recent `begin`, for asserting they plumb through.
    #[must_use]
    pub fn last_begin_options(&self) -> Option<TransactionOptions> {
        self.inner.lock().last_begin
    }
}

/// Scripted failures for provider operations.
///
/// Each `fail_*` call queues one error; the corresponding operation consumes
/// queued errors in order before doing real work. Clones share the queues.
#[derive(Debug, Clone, Default)]
pub struct FaultPlan {
    inner: Arc<Mutex<FaultQueues>>,
}

#[derive(Debug, Default)]
struct FaultQueues {
    connect: VecDeque<BackendError>,
    ping: VecDeque<BackendError>,
    execute: VecDeque<BackendError>,
    query: VecDeque<BackendError>,
    begin: VecDeque<BackendError>,
    commit: VecDeque<BackendError>,
    rollback: VecDeque<BackendError>,
    connect_delay: Duration,
}

impl FaultPlan {
    /// Create an empty plan.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue an error for the next `connect`.
    pub fn fail_connect(&self, err: BackendError) {
        self.inner.lock().connect.push_back(err);
    }

    /// Queue an error for the next `ping`.
    pub fn fail_ping(&self, err: BackendError) {
        self.inner.lock().ping.push_back(err);
    }

    /// Stall every `connect` by `delay`, modeling a slow backend dial.
    pub fn delay_connect(&self, delay: Duration) {
        self.inner.lock().connect_delay = delay;
    }

    /// Queue an error for the next `execute`.
    pub fn fail_execute(&self, err: BackendError) {
        self.inner.lock().execute.push_back(err);
    }

    /// Queue an error for the next `query`.
    pub fn fail_query(&self, err: BackendError) {
        self.inner.lock().query.push_back(err);
    }

    /// Queue an error for the next `begin`.
    pub fn fail_begin(&self, err: BackendError) {
        self.inner.lock().begin.push_back(err);
    }

    /// Queue an error for the next `commit`.
    pub fn fail_commit(&self, err: BackendError) {
        self.inner.lock().commit.push_back(err);
    }

    /// Queue an error for the next `rollback`.
    pub fn fail_rollback(&self, err: BackendError) {
        self.inner.lock().rollback.push_back(err);
    }

    fn take(
        &self,
        pick: fn(&mut FaultQueues) -> &mut VecDeque<BackendError>,
    ) -> Option<BackendError> {
        pick(&mut self.inner.lock()).pop_front()
    }
}

/// Connection provider over a [`MemStore`].
#[derive(Debug, Clone, Default)]
pub struct MemManager {
    store: MemStore,
    faults: FaultPlan,
}

static REGISTRY: Lazy<Mutex<HashMap<String, MemStore>>> = Lazy::new(|| Mutex::new(HashMap::new()));

impl MemManager {
    /// Create a manager over a fresh private store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a manager over an existing store.
    #[must_use]
    pub fn with_store(store: MemStore) -> Self {
        Self {
            store,
            faults: FaultPlan::new(),
        }
    }

    /// Create a manager over an existing store with a fault plan.
    #[must_use]
    pub fn with_faults(store: MemStore, faults: FaultPlan) -> Self {
        Self { store, faults }
    }

    /// Resolve a `mem://<name>` DSN against the process-wide store registry.
    ///
    /// Managers resolved from the same name share one store.
    pub fn from_dsn(dsn: &Dsn) -> Result<Self, BackendError> {
        if dsn.scheme() != "mem" {
            return Err(BackendError::Dsn(format!(
                "unsupported scheme: {}",
                dsn.scheme()
            )));
        }
        let store = REGISTRY
            .lock()
            .entry(dsn.host().to_string())
            .or_default()
            .clone();
        Ok(Self::with_store(store))
    }

    /// The store this manager connects to.
    #[must_use]
    pub fn store(&self) -> MemStore {
        self.store.clone()
    }

    /// The fault plan consulted by this manager's connections.
    #[must_use]
    pub fn faults(&self) -> FaultPlan {
        self.faults.clone()
    }
}

#[async_trait]
impl ConnectionManager for MemManager {
    type Connection = MemConnection;

    async fn connect(&self) -> Result<Self::Connection, BackendError> {
        let delay = self.faults.inner.lock().connect_delay;
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        if let Some(err) = self.faults.take(|q| &mut q.connect) {
            return Err(err);
        }
        self.store.inner.lock().connects += 1;
        Ok(MemConnection {
            store: self.store.clone(),
            faults: self.faults.clone(),
            open: true,
            txn: None,
        })
    }
}

#[derive(Debug)]
struct Txn {
    pending: Vec<(String, i64, String)>,
    read_only: bool,
}

/// One connection to a [`MemStore`].
#[derive(Debug)]
pub struct MemConnection {
    store: MemStore,
    faults: FaultPlan,
    open: bool,
    txn: Option<Txn>,
}

impl MemConnection {
    /// Sever the connection, as if the peer dropped it.
    ///
    /// Subsequent operations fail with [`BackendError::ConnectionLost`] and
    /// `is_open` reports false.
    pub fn sever(&mut self) {
        self.open = false;
    }

    fn ensure_open(&self) -> Result<(), BackendError> {
        if self.open {
            Ok(())
        } else {
            Err(BackendError::ConnectionLost("connection severed".into()))
        }
    }

    fn injected(
        &mut self,
        pick: fn(&mut FaultQueues) -> &mut VecDeque<BackendError>,
    ) -> Result<(), BackendError> {
        if let Some(err) = self.faults.take(pick) {
            if err.is_fatal_for_connection() {
                self.open = false;
            }
            return Err(err);
        }
        Ok(())
    }
}

/// Split a command into verb, target, and trailing payload.
fn split_command(raw: &str) -> (&str, &str, &str) {
    let mut parts = raw.trim().splitn(3, ' ');
    let verb = parts.next().unwrap_or("");
    let target = parts.next().unwrap_or("");
    let rest = parts.next().unwrap_or("");
    (verb, target, rest)
}

fn read_only_violation() -> BackendError {
    BackendError::Database {
        code: 25006,
        message: "cannot execute insert in a read-only transaction".into(),
    }
}

#[async_trait]
impl Connection for MemConnection {
    async fn execute(&mut self, command: &str, params: &[Value]) -> Result<u64, BackendError> {
        self.ensure_open()?;
        self.injected(|q| &mut q.execute)?;
        let (verb, table, rest) = split_command(command);
        match verb {
            "insert" => {
                if table.is_empty() {
                    return Err(BackendError::Unsupported("insert needs a table".into()));
                }
                // `?` binds the first parameter as the row value.
                let value = if rest == "?" {
                    match params.first() {
                        Some(Value::Text(text)) => text.clone(),
                        Some(other) => {
                            return Err(BackendError::Type {
                                expected: "text",
                                actual: other.type_name(),
                            });
                        }
                        None => {
                            return Err(BackendError::Unsupported(
                                "insert placeholder without a parameter".into(),
                            ));
                        }
                    }
                } else {
                    rest.to_string()
                };
                if self.txn.as_ref().is_some_and(|txn| txn.read_only) {
                    return Err(read_only_violation());
                }
                let mut state = self.store.inner.lock();
                state.next_id += 1;
                let id = state.next_id;
                match &mut self.txn {
                    Some(txn) => txn.pending.push((table.to_string(), id, value)),
                    None => state
                        .tables
                        .entry(table.to_string())
                        .or_default()
                        .push((id, value)),
                }
                Ok(1)
            }
            other => Err(BackendError::Unsupported(format!(
                "unknown command: {other}"
            ))),
        }
    }

    async fn query(&mut self, command: &str, _params: &[Value]) -> Result<Vec<Row>, BackendError> {
        self.ensure_open()?;
        self.injected(|q| &mut q.query)?;
        let (verb, table, _rest) = split_command(command);
        match verb {
            "select" => {
                let mut rows: Vec<(i64, String)> = {
                    let state = self.store.inner.lock();
                    state.tables.get(table).cloned().unwrap_or_default()
                };
                // A transaction reads its own pending writes.
                if let Some(txn) = &self.txn {
                    rows.extend(
                        txn.pending
                            .iter()
                            .filter(|(t, _, _)| t == table)
                            .map(|(_, id, value)| (*id, value.clone())),
                    );
                }
                let columns: Arc<[String]> = Arc::from(vec!["id".to_string(), "value".to_string()]);
                Ok(rows
                    .into_iter()
                    .map(|(id, value)| {
                        Row::new(
                            Arc::clone(&columns),
                            vec![Value::Int(id), Value::Text(value)],
                        )
                    })
                    .collect())
            }
            "count" => {
                let committed = self.store.count(table);
                let pending = self.txn.as_ref().map_or(0, |txn| {
                    txn.pending.iter().filter(|(t, _, _)| t == table).count()
                });
                let columns: Arc<[String]> = Arc::from(vec!["count".to_string()]);
                Ok(vec![Row::new(
                    columns,
                    vec![Value::Int((committed + pending) as i64)],
                )])
            }
            other => Err(BackendError::Unsupported(format!(
                "unknown command: {other}"
            ))),
        }
    }

    async fn ping(&mut self) -> Result<(), BackendError> {
        self.ensure_open()?;
        self.injected(|q| &mut q.ping)?;
        Ok(())
    }

    async fn begin(&mut self, options: &TransactionOptions) -> Result<(), BackendError> {
        self.ensure_open()?;
        self.injected(|q| &mut q.begin)?;
        if self.txn.is_some() {
            return Err(BackendError::Database {
                code: 25001,
                message: "transaction already in progress".into(),
            });
        }
        {
            let mut state = self.store.inner.lock();
            state.begins += 1;
            state.last_begin = Some(*options);
        }
        self.txn = Some(Txn {
            pending: Vec::new(),
            read_only: options.read_only,
        });
        Ok(())
    }

    async fn commit(&mut self) -> Result<(), BackendError> {
        self.ensure_open()?;
        // An injected failure leaves the transaction active so the caller
        // can still roll back, like a real driver after a lost commit ack.
        self.injected(|q| &mut q.commit)?;
        let Some(txn) = self.txn.take() else {
            return Err(BackendError::Database {
                code: 25000,
                message: "no transaction in progress".into(),
            });
        };
        let mut state = self.store.inner.lock();
        for (table, id, value) in txn.pending {
            state.tables.entry(table).or_default().push((id, value));
        }
        state.commits += 1;
        Ok(())
    }

    async fn rollback(&mut self) -> Result<(), BackendError> {
        self.ensure_open()?;
        self.injected(|q| &mut q.rollback)?;
        let Some(_txn) = self.txn.take() else {
            return Err(BackendError::Database {
                code: 25000,
                message: "no transaction in progress".into(),
            });
        };
        self.store.inner.lock().rollbacks += 1;
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.open
    }
}
