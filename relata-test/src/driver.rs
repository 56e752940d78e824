use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use relata_data::{Command, Connection, DataError, DataTable, Dialect, Driver, RowSink, Value};

use crate::db::MockDb;

/// What a statement produced.
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    Affected(u64),
    Rows {
        columns: Vec<String>,
        rows: Vec<Vec<Value>>,
    },
}

impl Reply {
    /// One row with one column.
    pub fn scalar(value: impl Into<Value>) -> Self {
        Reply::Rows {
            columns: vec!["value".to_string()],
            rows: vec![vec![value.into()]],
        }
    }
}

/// Error raised by scripted failures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MockError(pub String);

impl std::fmt::Display for MockError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::error::Error for MockError {}

type HandlerFn = dyn Fn(&mut MockDb, &mut Command) -> Result<Reply, DataError> + Send + Sync;

struct Handler {
    /// Lowercased fragment the command text must contain.
    pattern: String,
    reply: Arc<HandlerFn>,
}

/// Connection lifecycle counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Stats {
    pub opened: usize,
    pub closed: usize,
    pub begun: usize,
    pub committed: usize,
    pub rolled_back: usize,
}

#[derive(Default)]
struct Shared {
    db: MockDb,
    handlers: Vec<Handler>,
    executed: Vec<Command>,
    stats: Stats,
    refuse_connections: bool,
    fail_rollback: bool,
}

/// In-memory [`Driver`] for tests.
///
/// Clones share the same tables, scripts and counters, so a test can hand
/// one clone to a [`Database`](relata_data::Database) and inspect another.
///
/// ```ignore
/// let driver = MockDriver::new(Dialect::SqlServer);
/// driver.with_db(|db| db.create_table(fixtures::config_dic_table()));
/// let db = Database::new(DatabaseSettings::new("mock", Dialect::SqlServer))
///     .with_driver(driver.clone());
/// ```
#[derive(Clone)]
pub struct MockDriver {
    dialect: Dialect,
    shared: Arc<Mutex<Shared>>,
}

impl MockDriver {
    pub fn new(dialect: Dialect) -> Self {
        Self {
            dialect,
            shared: Arc::new(Mutex::new(Shared::default())),
        }
    }

    fn shared(&self) -> MutexGuard<'_, Shared> {
        self.shared.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Read or change the committed tables.
    pub fn with_db<R>(&self, f: impl FnOnce(&mut MockDb) -> R) -> R {
        f(&mut self.shared().db)
    }

    /// Committed row count of `table`.
    pub fn count(&self, table: &str) -> usize {
        self.shared().db.count(table)
    }

    /// Answer commands whose text contains `pattern` (case-insensitive)
    /// with `reply` instead of the interpreter. Later scripts win.
    pub fn on<F>(&self, pattern: &str, reply: F)
    where
        F: Fn(&mut MockDb, &mut Command) -> Result<Reply, DataError> + Send + Sync + 'static,
    {
        self.shared().handlers.push(Handler {
            pattern: pattern.to_ascii_lowercase(),
            reply: Arc::new(reply),
        });
    }

    /// Fail commands whose text contains `pattern`.
    pub fn fail_on(&self, pattern: &str, message: &str) {
        let message = message.to_string();
        self.on(pattern, move |_, _| Err(DataError::database(MockError(message.clone()))));
    }

    pub fn refuse_connections(&self) {
        self.shared().refuse_connections = true;
    }

    pub fn fail_rollback(&self) {
        self.shared().fail_rollback = true;
    }

    /// Every command executed so far, with parameters as bound (and outputs
    /// as returned).
    pub fn executed(&self) -> Vec<Command> {
        self.shared().executed.clone()
    }

    pub fn last_command(&self) -> Option<Command> {
        self.shared().executed.last().cloned()
    }

    pub fn stats(&self) -> Stats {
        self.shared().stats
    }
}

impl Driver for MockDriver {
    fn dialect(&self) -> Dialect {
        self.dialect
    }

    fn connect(&self, connection_string: &str) -> Result<Box<dyn Connection>, DataError> {
        let mut shared = self.shared();
        if shared.refuse_connections {
            return Err(DataError::database(MockError(format!(
                "cannot open connection to '{connection_string}'"
            ))));
        }
        shared.stats.opened += 1;
        Ok(Box::new(MockConnection {
            shared: Arc::clone(&self.shared),
            pending: None,
            closed: false,
        }))
    }
}

/// Connection handed out by [`MockDriver`]. Inside a transaction, writes go
/// to a private copy of the tables that replaces the shared ones on commit.
pub struct MockConnection {
    shared: Arc<Mutex<Shared>>,
    pending: Option<MockDb>,
    closed: bool,
}

impl MockConnection {
    fn shared(&self) -> MutexGuard<'_, Shared> {
        self.shared.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn ensure_open(&self) -> Result<(), DataError> {
        if self.closed {
            return Err(DataError::database(MockError("connection is closed".into())));
        }
        Ok(())
    }

    fn dispatch(&mut self, command: &mut Command) -> Result<Reply, DataError> {
        self.ensure_open()?;
        let mut guard = self.shared.lock().unwrap_or_else(PoisonError::into_inner);
        let shared = &mut *guard;
        let text = command.text().to_ascii_lowercase();
        let handler = shared
            .handlers
            .iter()
            .rev()
            .find(|h| text.contains(&h.pattern))
            .map(|h| Arc::clone(&h.reply));
        let db = match self.pending.as_mut() {
            Some(db) => db,
            None => &mut shared.db,
        };
        let reply = match handler {
            Some(reply) => reply(db, command),
            None => db.execute(command),
        };
        shared.executed.push(command.clone());
        reply
    }
}

impl Connection for MockConnection {
    fn execute(&mut self, command: &mut Command) -> Result<u64, DataError> {
        match self.dispatch(command)? {
            Reply::Affected(n) => Ok(n),
            Reply::Rows { .. } => Ok(0),
        }
    }

    fn query(&mut self, command: &mut Command, sink: &mut dyn RowSink) -> Result<(), DataError> {
        match self.dispatch(command)? {
            Reply::Affected(_) => sink.columns(&[]),
            Reply::Rows { columns, rows } => {
                sink.columns(&columns)?;
                for row in rows {
                    sink.row(row)?;
                }
                Ok(())
            }
        }
    }

    fn begin(&mut self) -> Result<(), DataError> {
        self.ensure_open()?;
        if self.pending.is_some() {
            return Err(DataError::database(MockError("transaction already open".into())));
        }
        let mut shared = self.shared();
        shared.stats.begun += 1;
        let snapshot = shared.db.clone();
        drop(shared);
        self.pending = Some(snapshot);
        Ok(())
    }

    fn commit(&mut self) -> Result<(), DataError> {
        let pending = self
            .pending
            .take()
            .ok_or_else(|| DataError::database(MockError("no open transaction".into())))?;
        let mut shared = self.shared();
        shared.db = pending;
        shared.stats.committed += 1;
        Ok(())
    }

    fn rollback(&mut self) -> Result<(), DataError> {
        self.pending = None;
        let mut shared = self.shared();
        if shared.fail_rollback {
            return Err(DataError::database(MockError("rollback failed".into())));
        }
        shared.stats.rolled_back += 1;
        Ok(())
    }

    fn bulk_copy(&mut self, table: &str, data: &DataTable) -> Result<u64, DataError> {
        self.ensure_open()?;
        let mut guard = self.shared.lock().unwrap_or_else(PoisonError::into_inner);
        let db = match self.pending.as_mut() {
            Some(db) => db,
            None => &mut guard.db,
        };
        db.copy_in(table, data)
    }

    fn close(&mut self) -> Result<(), DataError> {
        if !self.closed {
            self.closed = true;
            self.shared().stats.closed += 1;
        }
        Ok(())
    }
}
