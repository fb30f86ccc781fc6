//! DuckDB executor behind a bounded connection pool
//!
//! The pool hands out RAII guards: a connection is returned to the idle set
//! on every exit path, success or failure, when the guard drops. Callers
//! await acquisition, which fails after the configured timeout instead of
//! blocking indefinitely. Driver errors propagate uninterpreted; there is
//! no retry policy here.

use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use duckdb::types::ValueRef;
use duckdb::Connection;
use thiserror::Error;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::debug;

use vizql_spec::{Row, ScalarValue};

#[derive(Debug, Error)]
pub enum ExecutionError {
    #[error("Database error: {0}")]
    Database(#[from] duckdb::Error),

    #[error("Timed out waiting for a pooled connection")]
    AcquireTimeout,

    #[error("Connection pool is closed")]
    PoolClosed,
}

/// Rows from one executed statement.
#[derive(Debug, Default)]
pub struct QueryResult {
    pub columns: Vec<String>,
    pub rows: Vec<Row>,
}

impl QueryResult {
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }
}

/// Bounded pool of DuckDB connections over one database.
#[derive(Clone)]
pub struct Pool {
    inner: Arc<PoolInner>,
}

struct PoolInner {
    semaphore: Arc<Semaphore>,
    idle: Mutex<Vec<Connection>>,
    path: Option<PathBuf>,
    acquire_timeout: Duration,
}

impl Pool {
    /// Open a pool over a database file, or an in-memory database when
    /// `path` is None. Connections are created lazily up to `size`. An
    /// in-memory database is private to its connection, so the pool
    /// collapses to a single slot in that mode.
    pub fn open(
        path: Option<PathBuf>,
        size: usize,
        acquire_timeout: Duration,
    ) -> Result<Self, ExecutionError> {
        let size = if path.is_none() { 1 } else { size.max(1) };
        let pool = Self {
            inner: Arc::new(PoolInner {
                semaphore: Arc::new(Semaphore::new(size)),
                idle: Mutex::new(Vec::new()),
                path,
                acquire_timeout,
            }),
        };
        // Fail fast on an unopenable database instead of at first query.
        let probe = pool.connect()?;
        if let Ok(mut idle) = pool.inner.idle.lock() {
            idle.push(probe);
        }
        Ok(pool)
    }

    pub fn in_memory(size: usize) -> Result<Self, ExecutionError> {
        Self::open(None, size, Duration::from_secs(10))
    }

    /// Await a pool slot. Blocks up to the configured timeout, then fails
    /// with `AcquireTimeout`.
    pub async fn acquire(&self) -> Result<PooledConn, ExecutionError> {
        let permit = tokio::time::timeout(
            self.inner.acquire_timeout,
            self.inner.semaphore.clone().acquire_owned(),
        )
        .await
        .map_err(|_| ExecutionError::AcquireTimeout)?
        .map_err(|_| ExecutionError::PoolClosed)?;

        let reused = self.inner.idle.lock().ok().and_then(|mut idle| idle.pop());
        let conn = match reused {
            Some(conn) => conn,
            None => self.connect()?,
        };

        Ok(PooledConn {
            conn: Some(conn),
            pool: Arc::clone(&self.inner),
            _permit: permit,
        })
    }

    fn connect(&self) -> Result<Connection, ExecutionError> {
        let conn = match &self.inner.path {
            Some(path) => Connection::open(path)?,
            None => Connection::open_in_memory()?,
        };
        Ok(conn)
    }
}

/// A pooled connection. Dropping the guard returns the connection to the
/// pool and frees the slot, on every exit path.
pub struct PooledConn {
    conn: Option<Connection>,
    pool: Arc<PoolInner>,
    _permit: OwnedSemaphorePermit,
}

impl PooledConn {
    pub fn connection(&self) -> &Connection {
        // The slot is only vacated by Drop.
        self.conn.as_ref().expect("connection present until drop")
    }

    /// Execute a SELECT and collect every row as field -> scalar.
    pub fn query(&self, sql: &str) -> Result<QueryResult, ExecutionError> {
        let started = Instant::now();
        let mut stmt = self.connection().prepare(sql)?;
        let mut rows = stmt.query([])?;

        let mut columns: Vec<String> = Vec::new();
        let mut collected: Vec<Row> = Vec::new();
        while let Some(row) = rows.next()? {
            if columns.is_empty() {
                let stmt = row.as_ref();
                for i in 0..stmt.column_count() {
                    columns.push(stmt.column_name(i)?.to_string());
                }
            }
            let mut record = Row::new();
            for (i, name) in columns.iter().enumerate() {
                record.insert(name.clone(), scalar_of(row.get_ref(i)?));
            }
            collected.push(record);
        }

        debug!(
            rows = collected.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "query executed"
        );
        Ok(QueryResult {
            columns,
            rows: collected,
        })
    }

    /// Batch DDL/DML helper, used by setup code and tests.
    pub fn execute_batch(&self, sql: &str) -> Result<(), ExecutionError> {
        self.connection().execute_batch(sql)?;
        Ok(())
    }

    /// Column names of a table, for data-source field validation.
    pub fn table_columns(&self, table: &str) -> Result<Vec<String>, ExecutionError> {
        let mut stmt = self.connection().prepare(
            "SELECT column_name FROM information_schema.columns \
             WHERE table_name = ? ORDER BY ordinal_position",
        )?;
        let mut rows = stmt.query([table])?;
        let mut columns = Vec::new();
        while let Some(row) = rows.next()? {
            columns.push(row.get::<_, String>(0)?);
        }
        Ok(columns)
    }
}

impl Drop for PooledConn {
    fn drop(&mut self) {
        if let Some(conn) = self.conn.take() {
            if let Ok(mut idle) = self.pool.idle.lock() {
                idle.push(conn);
            }
        }
    }
}

/// Convert one DuckDB cell into a scalar. Temporal values render as ISO
/// strings; unsupported exotic types collapse to Null.
fn scalar_of(value: ValueRef<'_>) -> ScalarValue {
    match value {
        ValueRef::Null => ScalarValue::Null,
        ValueRef::Boolean(b) => ScalarValue::Bool(b),
        ValueRef::TinyInt(i) => ScalarValue::Int(i as i64),
        ValueRef::SmallInt(i) => ScalarValue::Int(i as i64),
        ValueRef::Int(i) => ScalarValue::Int(i as i64),
        ValueRef::BigInt(i) => ScalarValue::Int(i),
        ValueRef::HugeInt(i) => ScalarValue::Float(i as f64),
        ValueRef::UTinyInt(i) => ScalarValue::Int(i as i64),
        ValueRef::USmallInt(i) => ScalarValue::Int(i as i64),
        ValueRef::UInt(i) => ScalarValue::Int(i as i64),
        ValueRef::UBigInt(i) => ScalarValue::Float(i as f64),
        ValueRef::Float(f) => ScalarValue::Float(f as f64),
        ValueRef::Double(f) => ScalarValue::Float(f),
        ValueRef::Text(bytes) => {
            ScalarValue::String(String::from_utf8_lossy(bytes).to_string())
        }
        ValueRef::Date32(days) => {
            let date = chrono::NaiveDate::from_num_days_from_ce_opt(days + EPOCH_CE_DAYS);
            match date {
                Some(d) => ScalarValue::String(d.format("%Y-%m-%d").to_string()),
                None => ScalarValue::Null,
            }
        }
        ValueRef::Timestamp(unit, raw) => match chrono::DateTime::from_timestamp_micros(
            to_micros(unit, raw),
        ) {
            Some(ts) => ScalarValue::String(ts.format("%Y-%m-%d %H:%M:%S").to_string()),
            None => ScalarValue::Null,
        },
        _ => ScalarValue::Null,
    }
}

/// Days from 0001-01-01 (CE) to the Unix epoch.
const EPOCH_CE_DAYS: i32 = 719_163;

fn to_micros(unit: duckdb::types::TimeUnit, raw: i64) -> i64 {
    use duckdb::types::TimeUnit;
    match unit {
        TimeUnit::Second => raw * 1_000_000,
        TimeUnit::Millisecond => raw * 1_000,
        TimeUnit::Microsecond => raw,
        TimeUnit::Nanosecond => raw / 1_000,
    }
}
