// crates/prepared-registry-sqlite/src/database.rs
// ============================================================================
// Module: SQLite Database
// Description: Pooled SQLite implementation of the registry database interface.
// Purpose: Prepare, execute, and transaction-bind statements with rusqlite.
// Dependencies: prepared-registry-core, rusqlite, serde, thiserror
// ============================================================================

//! ## Overview
//! [`SqliteDatabase`] opens a fixed pool of connections to one database file.
//! Preparing a statement compiles it on a pooled connection, which surfaces
//! syntax and schema errors immediately and warms that connection's
//! statement cache. Executions reuse each connection's cached compilation.
//!
//! A [`SqliteTransaction`] reserves one pooled connection until it commits or
//! rolls back; other callers skip reserved connections, so a thread holding a
//! transaction can still prepare statements on the rest of the pool.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;
use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::MutexGuard;
use std::sync::TryLockError;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;
use std::time::Duration;

use prepared_registry_core::Database;
use prepared_registry_core::DatabaseError;
use rusqlite::Connection;
use rusqlite::ErrorCode;
use rusqlite::OpenFlags;
use rusqlite::params_from_iter;
use rusqlite::types::Value;
use serde::Deserialize;
use thiserror::Error;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default busy timeout (ms).
const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;
/// Default number of pooled connections.
const DEFAULT_POOL_SIZE: usize = 4;
/// Default per-connection statement cache capacity.
const DEFAULT_STATEMENT_CACHE_CAPACITY: usize = 64;
/// Maximum number of pooled connections.
pub const MAX_POOL_SIZE: usize = 64;
/// Maximum length of a single path component.
const MAX_PATH_COMPONENT_LENGTH: usize = 255;
/// Maximum total path length.
const MAX_TOTAL_PATH_LENGTH: usize = 4096;

// ============================================================================
// SECTION: Config
// ============================================================================

/// `SQLite` journal mode configuration.
///
/// # Invariants
/// - Values map 1:1 to `SQLite` `journal_mode` pragma settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SqliteJournalMode {
    /// WAL journal mode (recommended).
    #[default]
    Wal,
    /// Delete journal mode (legacy).
    Delete,
}

impl SqliteJournalMode {
    /// Returns the `SQLite` pragma value.
    #[must_use]
    pub const fn pragma_value(self) -> &'static str {
        match self {
            Self::Wal => "wal",
            Self::Delete => "delete",
        }
    }
}

/// `SQLite` sync mode configuration.
///
/// # Invariants
/// - Values map 1:1 to `SQLite` `synchronous` pragma settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SqliteSyncMode {
    /// Full synchronous mode (safest).
    #[default]
    Full,
    /// Normal synchronous mode (balanced).
    Normal,
}

impl SqliteSyncMode {
    /// Returns the `SQLite` pragma value.
    #[must_use]
    pub const fn pragma_value(self) -> &'static str {
        match self {
            Self::Full => "full",
            Self::Normal => "normal",
        }
    }
}

/// Configuration for a pooled `SQLite` database.
///
/// # Invariants
/// - `path` must resolve to a file path (not a directory).
/// - `pool_size` is in `1 ..= MAX_POOL_SIZE`.
/// - `statement_cache_capacity` is greater than zero.
#[derive(Debug, Clone, Deserialize)]
pub struct SqliteDatabaseConfig {
    /// Path to the `SQLite` database file.
    pub path: PathBuf,
    /// Busy timeout in milliseconds.
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
    /// `SQLite` journal mode.
    #[serde(default)]
    pub journal_mode: SqliteJournalMode,
    /// `SQLite` sync mode.
    #[serde(default)]
    pub sync_mode: SqliteSyncMode,
    /// Number of pooled connections.
    #[serde(default = "default_pool_size")]
    pub pool_size: usize,
    /// Compiled statements cached per connection.
    ///
    /// Should be at least the number of catalog queries; smaller caches evict
    /// and recompile statements on every pass through the catalog.
    #[serde(default = "default_statement_cache_capacity")]
    pub statement_cache_capacity: usize,
}

impl SqliteDatabaseConfig {
    /// Returns a configuration for `path` with default settings.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            busy_timeout_ms: DEFAULT_BUSY_TIMEOUT_MS,
            journal_mode: SqliteJournalMode::default(),
            sync_mode: SqliteSyncMode::default(),
            pool_size: DEFAULT_POOL_SIZE,
            statement_cache_capacity: DEFAULT_STATEMENT_CACHE_CAPACITY,
        }
    }

    /// Validates path and pool limits.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteDatabaseError::Invalid`] when a limit is violated.
    pub fn validate(&self) -> Result<(), SqliteDatabaseError> {
        validate_database_path(&self.path)?;
        if self.pool_size > 1 && is_in_memory_path(&self.path) {
            return Err(SqliteDatabaseError::Invalid(
                "in-memory databases require pool_size = 1".to_string(),
            ));
        }
        if self.pool_size == 0 || self.pool_size > MAX_POOL_SIZE {
            return Err(SqliteDatabaseError::Invalid(format!(
                "pool_size out of range: {} (max {MAX_POOL_SIZE})",
                self.pool_size
            )));
        }
        if self.statement_cache_capacity == 0 {
            return Err(SqliteDatabaseError::Invalid(
                "statement_cache_capacity must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

/// Returns the default busy timeout for `SQLite` connections.
const fn default_busy_timeout_ms() -> u64 {
    DEFAULT_BUSY_TIMEOUT_MS
}

/// Returns the default connection pool size.
const fn default_pool_size() -> usize {
    DEFAULT_POOL_SIZE
}

/// Returns the default statement cache capacity.
const fn default_statement_cache_capacity() -> usize {
    DEFAULT_STATEMENT_CACHE_CAPACITY
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Errors raised while opening a [`SqliteDatabase`].
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SqliteDatabaseError {
    /// Filesystem error.
    #[error("sqlite database io error: {0}")]
    Io(String),
    /// `SQLite` engine error.
    #[error("sqlite database error: {0}")]
    Db(String),
    /// Invalid configuration.
    #[error("sqlite database invalid config: {0}")]
    Invalid(String),
}

impl From<SqliteDatabaseError> for DatabaseError {
    fn from(error: SqliteDatabaseError) -> Self {
        Self::Connection(error.to_string())
    }
}

/// Maps `rusqlite` errors onto the registry error taxonomy.
fn map_sqlite_error(error: &rusqlite::Error) -> DatabaseError {
    match error.sqlite_error_code() {
        Some(
            ErrorCode::CannotOpen
            | ErrorCode::DatabaseBusy
            | ErrorCode::DatabaseLocked
            | ErrorCode::DatabaseCorrupt
            | ErrorCode::NotADatabase
            | ErrorCode::PermissionDenied
            | ErrorCode::SystemIoFailure
            | ErrorCode::DiskFull,
        ) => DatabaseError::Connection(error.to_string()),
        _ => DatabaseError::Rejected(error.to_string()),
    }
}

// ============================================================================
// SECTION: Connection Pool
// ============================================================================

/// Connection slot in the pool.
struct PooledConnection {
    /// Underlying connection.
    connection: Mutex<Connection>,
    /// Set while a transaction owns the connection.
    reserved: AtomicBool,
}

/// Fixed-size pool of connections to one database file.
struct ConnectionPool {
    /// Pooled connections.
    connections: Vec<PooledConnection>,
    /// Round-robin cursor for connection selection.
    cursor: AtomicUsize,
}

impl ConnectionPool {
    /// Returns an unreserved connection, preferring idle ones.
    ///
    /// Reservation is re-checked once the lock is held, since `begin` may
    /// reserve a connection between the first check and the lock.
    fn acquire(&self) -> Result<MutexGuard<'_, Connection>, DatabaseError> {
        let len = self.connections.len();
        loop {
            let start = self.cursor.fetch_add(1, Ordering::Relaxed) % len;
            let mut busy = None;
            for offset in 0 .. len {
                let index = (start + offset) % len;
                let pooled = &self.connections[index];
                if pooled.reserved.load(Ordering::Acquire) {
                    continue;
                }
                match pooled.connection.try_lock() {
                    Ok(guard) if !pooled.reserved.load(Ordering::Acquire) => return Ok(guard),
                    Ok(_) => {}
                    Err(TryLockError::Poisoned(_)) => return Err(poisoned()),
                    Err(TryLockError::WouldBlock) => {
                        busy.get_or_insert(index);
                    }
                }
            }
            let Some(index) = busy else {
                return Err(DatabaseError::Connection(
                    "all pooled connections are reserved by open transactions".to_string(),
                ));
            };
            let pooled = &self.connections[index];
            let guard = pooled.connection.lock().map_err(|_| poisoned())?;
            if !pooled.reserved.load(Ordering::Acquire) {
                return Ok(guard);
            }
        }
    }

    /// Reserves a connection for exclusive transaction use.
    fn reserve(&self) -> Result<usize, DatabaseError> {
        self.connections
            .iter()
            .position(|pooled| {
                pooled
                    .reserved
                    .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
                    .is_ok()
            })
            .ok_or_else(|| {
                DatabaseError::Transaction(
                    "no pooled connection available for a new transaction".to_string(),
                )
            })
    }

    /// Locks the connection at `index`.
    fn connection(&self, index: usize) -> Result<MutexGuard<'_, Connection>, DatabaseError> {
        self.connections[index].connection.lock().map_err(|_| poisoned())
    }

    /// Releases a reservation made by [`Self::reserve`].
    fn release(&self, index: usize) {
        self.connections[index].reserved.store(false, Ordering::Release);
    }
}

/// Error returned when a connection mutex is poisoned.
fn poisoned() -> DatabaseError {
    DatabaseError::Connection("sqlite connection mutex poisoned".to_string())
}

// ============================================================================
// SECTION: Database
// ============================================================================

/// Pooled `SQLite` database.
///
/// # Invariants
/// - Every pooled connection has the configured pragmas applied.
/// - Clones share the same pool.
#[derive(Clone)]
pub struct SqliteDatabase {
    /// Database configuration.
    config: SqliteDatabaseConfig,
    /// Shared connection pool.
    pool: Arc<ConnectionPool>,
}

impl SqliteDatabase {
    /// Opens the database and its connection pool.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteDatabaseError`] when the configuration is invalid or a
    /// connection cannot be opened.
    pub fn open(config: SqliteDatabaseConfig) -> Result<Self, SqliteDatabaseError> {
        config.validate()?;
        ensure_parent_dir(&config.path)?;
        let mut connections = Vec::with_capacity(config.pool_size);
        for _ in 0 .. config.pool_size {
            connections.push(PooledConnection {
                connection: Mutex::new(open_connection(&config)?),
                reserved: AtomicBool::new(false),
            });
        }
        Ok(Self {
            config,
            pool: Arc::new(ConnectionPool {
                connections,
                cursor: AtomicUsize::new(0),
            }),
        })
    }

    /// Returns the database configuration.
    #[must_use]
    pub const fn config(&self) -> &SqliteDatabaseConfig {
        &self.config
    }

    /// Runs one or more semicolon-separated statements outside any transaction.
    ///
    /// # Errors
    ///
    /// Returns [`DatabaseError`] when execution fails.
    pub fn execute_batch(&self, sql: &str) -> Result<(), DatabaseError> {
        let connection = self.pool.acquire()?;
        connection.execute_batch(sql).map_err(|err| map_sqlite_error(&err))
    }

    /// Begins a transaction on a reserved pooled connection.
    ///
    /// # Errors
    ///
    /// Returns [`DatabaseError::Transaction`] when every connection is
    /// reserved, or the `BEGIN` error from `SQLite`.
    pub fn begin(&self) -> Result<SqliteTransaction, DatabaseError> {
        let index = self.pool.reserve()?;
        let begun = self
            .pool
            .connection(index)
            .and_then(|connection| connection.execute_batch("BEGIN").map_err(|err| map_sqlite_error(&err)));
        if let Err(error) = begun {
            self.pool.release(index);
            return Err(error);
        }
        Ok(SqliteTransaction {
            pool: Arc::clone(&self.pool),
            index,
            finished: false,
        })
    }
}

impl fmt::Debug for SqliteDatabase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SqliteDatabase")
            .field("path", &self.config.path)
            .field("pool_size", &self.config.pool_size)
            .finish_non_exhaustive()
    }
}

impl Database for SqliteDatabase {
    type Statement = SqliteStatement;
    type Transaction = SqliteTransaction;
    type BoundStatement<'tx> = SqliteTxStatement<'tx>;

    fn prepare(&self, sql: &str) -> Result<Self::Statement, DatabaseError> {
        if sql.trim().is_empty() {
            return Err(DatabaseError::Rejected("statement text is empty".to_string()));
        }
        let connection = self.pool.acquire()?;
        let statement = connection.prepare_cached(sql).map_err(|err| map_sqlite_error(&err))?;
        let column_names = statement.column_names().into_iter().map(str::to_string).collect();
        let parameter_count = statement.parameter_count();
        drop(statement);
        drop(connection);
        Ok(SqliteStatement {
            sql: Arc::from(sql),
            column_names,
            parameter_count,
            pool: Arc::clone(&self.pool),
        })
    }

    fn bind_to_transaction<'tx>(
        &self,
        transaction: &'tx Self::Transaction,
        statement: &Arc<Self::Statement>,
    ) -> Result<Self::BoundStatement<'tx>, DatabaseError> {
        if !Arc::ptr_eq(&transaction.pool, &self.pool) || !Arc::ptr_eq(&statement.pool, &self.pool)
        {
            return Err(DatabaseError::Transaction(
                "transaction and statement belong to different databases".to_string(),
            ));
        }
        Ok(SqliteTxStatement {
            transaction,
            statement: Arc::clone(statement),
        })
    }
}

// ============================================================================
// SECTION: Statements
// ============================================================================

/// Materialized query result.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryRows {
    /// Result column names in select order.
    pub columns: Vec<String>,
    /// Row values in column order.
    pub rows: Vec<Vec<Value>>,
}

impl QueryRows {
    /// Returns the number of rows.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Returns true when the query produced no rows.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Returns the value at `row` for the named column.
    #[must_use]
    pub fn value(&self, row: usize, column: &str) -> Option<&Value> {
        let index = self.columns.iter().position(|name| name == column)?;
        self.rows.get(row)?.get(index)
    }
}

/// Prepared `SQLite` statement.
///
/// # Invariants
/// - `sql` compiled successfully when the statement was prepared.
pub struct SqliteStatement {
    /// Statement text.
    sql: Arc<str>,
    /// Result column names.
    column_names: Vec<String>,
    /// Number of bind parameters.
    parameter_count: usize,
    /// Pool the statement executes on.
    pool: Arc<ConnectionPool>,
}

impl SqliteStatement {
    /// Returns the statement text.
    #[must_use]
    pub fn sql(&self) -> &str {
        &self.sql
    }

    /// Returns the result column names.
    #[must_use]
    pub fn column_names(&self) -> &[String] {
        &self.column_names
    }

    /// Returns the number of bind parameters.
    #[must_use]
    pub const fn parameter_count(&self) -> usize {
        self.parameter_count
    }

    /// Executes the statement and returns the number of changed rows.
    ///
    /// # Errors
    ///
    /// Returns [`DatabaseError`] when execution fails.
    pub fn execute(&self, params: &[Value]) -> Result<usize, DatabaseError> {
        let connection = self.pool.acquire()?;
        execute_on(&connection, &self.sql, params)
    }

    /// Runs the statement and materializes every row.
    ///
    /// # Errors
    ///
    /// Returns [`DatabaseError`] when execution fails.
    pub fn query(&self, params: &[Value]) -> Result<QueryRows, DatabaseError> {
        let connection = self.pool.acquire()?;
        query_on(&connection, &self.sql, params)
    }
}

impl fmt::Debug for SqliteStatement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SqliteStatement")
            .field("sql", &self.sql)
            .field("parameter_count", &self.parameter_count)
            .finish_non_exhaustive()
    }
}

/// Statement bound to an open [`SqliteTransaction`].
pub struct SqliteTxStatement<'tx> {
    /// Transaction the statement executes in.
    transaction: &'tx SqliteTransaction,
    /// Base statement shared with the registry cache.
    statement: Arc<SqliteStatement>,
}

impl SqliteTxStatement<'_> {
    /// Returns the base statement.
    #[must_use]
    pub const fn statement(&self) -> &Arc<SqliteStatement> {
        &self.statement
    }

    /// Executes the statement inside the transaction.
    ///
    /// # Errors
    ///
    /// Returns [`DatabaseError`] when execution fails.
    pub fn execute(&self, params: &[Value]) -> Result<usize, DatabaseError> {
        let connection = self.transaction.connection()?;
        execute_on(&connection, self.statement.sql(), params)
    }

    /// Runs the statement inside the transaction and materializes every row.
    ///
    /// # Errors
    ///
    /// Returns [`DatabaseError`] when execution fails.
    pub fn query(&self, params: &[Value]) -> Result<QueryRows, DatabaseError> {
        let connection = self.transaction.connection()?;
        query_on(&connection, self.statement.sql(), params)
    }
}

impl fmt::Debug for SqliteTxStatement<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SqliteTxStatement")
            .field("sql", &self.statement.sql)
            .field("transaction", self.transaction)
            .finish_non_exhaustive()
    }
}

/// Executes `sql` through the connection statement cache.
fn execute_on(connection: &Connection, sql: &str, params: &[Value]) -> Result<usize, DatabaseError> {
    let mut statement = connection.prepare_cached(sql).map_err(|err| map_sqlite_error(&err))?;
    statement.execute(params_from_iter(params.iter())).map_err(|err| map_sqlite_error(&err))
}

/// Runs `sql` through the connection statement cache and collects all rows.
fn query_on(connection: &Connection, sql: &str, params: &[Value]) -> Result<QueryRows, DatabaseError> {
    let mut statement = connection.prepare_cached(sql).map_err(|err| map_sqlite_error(&err))?;
    let columns: Vec<String> =
        statement.column_names().into_iter().map(str::to_string).collect();
    let width = columns.len();
    let mut cursor =
        statement.query(params_from_iter(params.iter())).map_err(|err| map_sqlite_error(&err))?;
    let mut rows = Vec::new();
    while let Some(row) = cursor.next().map_err(|err| map_sqlite_error(&err))? {
        let mut values = Vec::with_capacity(width);
        for index in 0 .. width {
            values.push(row.get::<_, Value>(index).map_err(|err| map_sqlite_error(&err))?);
        }
        rows.push(values);
    }
    Ok(QueryRows {
        columns,
        rows,
    })
}

// ============================================================================
// SECTION: Transactions
// ============================================================================

/// Open transaction on a reserved pooled connection.
///
/// # Invariants
/// - The reserved connection is released exactly once.
/// - Dropping an unfinished transaction rolls it back.
pub struct SqliteTransaction {
    /// Pool owning the reserved connection.
    pool: Arc<ConnectionPool>,
    /// Index of the reserved connection.
    index: usize,
    /// True once committed or rolled back.
    finished: bool,
}

impl SqliteTransaction {
    /// Runs one or more statements inside the transaction.
    ///
    /// # Errors
    ///
    /// Returns [`DatabaseError`] when execution fails.
    pub fn execute_batch(&self, sql: &str) -> Result<(), DatabaseError> {
        let connection = self.connection()?;
        connection.execute_batch(sql).map_err(|err| map_sqlite_error(&err))
    }

    /// Commits the transaction.
    ///
    /// # Errors
    ///
    /// Returns [`DatabaseError`] when the commit fails; the transaction is
    /// rolled back in that case.
    pub fn commit(mut self) -> Result<(), DatabaseError> {
        self.finish("COMMIT")
    }

    /// Rolls the transaction back.
    ///
    /// # Errors
    ///
    /// Returns [`DatabaseError`] when the rollback fails.
    pub fn rollback(mut self) -> Result<(), DatabaseError> {
        self.finish("ROLLBACK")
    }

    /// Locks the reserved connection.
    fn connection(&self) -> Result<MutexGuard<'_, Connection>, DatabaseError> {
        self.pool.connection(self.index)
    }

    /// Ends the transaction and releases the connection.
    fn finish(&mut self, command: &str) -> Result<(), DatabaseError> {
        self.finished = true;
        let result = self.connection().and_then(|connection| {
            let outcome = connection.execute_batch(command).map_err(|err| map_sqlite_error(&err));
            if outcome.is_err() && !connection.is_autocommit() {
                let _ = connection.execute_batch("ROLLBACK");
            }
            outcome
        });
        self.pool.release(self.index);
        result
    }
}

impl Drop for SqliteTransaction {
    fn drop(&mut self) {
        if !self.finished {
            let _ = self.finish("ROLLBACK");
        }
    }
}

impl fmt::Debug for SqliteTransaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SqliteTransaction")
            .field("connection", &self.index)
            .field("finished", &self.finished)
            .finish_non_exhaustive()
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Ensures the parent directory for the database exists.
fn ensure_parent_dir(path: &Path) -> Result<(), SqliteDatabaseError> {
    let Some(parent) = path.parent() else {
        return Err(SqliteDatabaseError::Io("database path missing parent directory".to_string()));
    };
    if parent.as_os_str().is_empty() {
        return Ok(());
    }
    std::fs::create_dir_all(parent).map_err(|err| SqliteDatabaseError::Io(err.to_string()))
}

/// Returns true when `path` names a private in-memory database.
///
/// Each connection to such a path opens its own empty database.
fn is_in_memory_path(path: &Path) -> bool {
    let text = path.to_string_lossy();
    let text = text.trim();
    text == ":memory:" || (text.starts_with("file:") && text.contains("mode=memory"))
}

/// Validates database paths for safety limits.
fn validate_database_path(path: &Path) -> Result<(), SqliteDatabaseError> {
    let path_string = path.display().to_string();
    if path_string.trim().is_empty() {
        return Err(SqliteDatabaseError::Invalid("database path must be non-empty".to_string()));
    }
    if path_string.len() > MAX_TOTAL_PATH_LENGTH {
        return Err(SqliteDatabaseError::Invalid("database path exceeds length limit".to_string()));
    }
    for component in path.components() {
        let name = component.as_os_str().to_string_lossy();
        if name.len() > MAX_PATH_COMPONENT_LENGTH {
            return Err(SqliteDatabaseError::Invalid(
                "database path contains an overlong component".to_string(),
            ));
        }
    }
    if path.exists() && path.is_dir() {
        return Err(SqliteDatabaseError::Invalid(
            "database path must be a file, not a directory".to_string(),
        ));
    }
    Ok(())
}

/// Opens an `SQLite` connection with the configured pragmas.
fn open_connection(config: &SqliteDatabaseConfig) -> Result<Connection, SqliteDatabaseError> {
    let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
        | OpenFlags::SQLITE_OPEN_CREATE
        | OpenFlags::SQLITE_OPEN_FULL_MUTEX;
    let connection = Connection::open_with_flags(&config.path, flags)
        .map_err(|err| SqliteDatabaseError::Db(err.to_string()))?;
    apply_pragmas(&connection, config)?;
    connection.set_prepared_statement_cache_capacity(config.statement_cache_capacity);
    Ok(connection)
}

/// Applies connection pragmas.
fn apply_pragmas(
    connection: &Connection,
    config: &SqliteDatabaseConfig,
) -> Result<(), SqliteDatabaseError> {
    connection
        .busy_timeout(Duration::from_millis(config.busy_timeout_ms))
        .map_err(|err| SqliteDatabaseError::Db(err.to_string()))?;
    connection
        .execute_batch("PRAGMA foreign_keys = ON;")
        .map_err(|err| SqliteDatabaseError::Db(err.to_string()))?;
    connection
        .execute_batch(&format!("PRAGMA journal_mode = {};", config.journal_mode.pragma_value()))
        .map_err(|err| SqliteDatabaseError::Db(err.to_string()))?;
    connection
        .execute_batch(&format!("PRAGMA synchronous = {};", config.sync_mode.pragma_value()))
        .map_err(|err| SqliteDatabaseError::Db(err.to_string()))?;
    Ok(())
}
