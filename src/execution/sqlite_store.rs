//! SQLite Store
//!
//! Embedded file store. A connection is opened for every query, the
//! statement runs on the blocking pool, and a query that outlives its
//! timeout is interrupted so the worker releases the connection. The
//! deadline is also enforced inside the worker, which covers statements
//! that only start after the caller has given up.

use crate::execution::result::{unique_column_names, QueryResult, Row};
use crate::execution::store::{DataStore, SqlDialect, StoreError};
use async_trait::async_trait;
use rusqlite::types::ValueRef;
use rusqlite::{Connection, ErrorCode, OpenFlags};
use serde_json::Value;
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

pub struct SqliteStore {
    path: PathBuf,
    read_only: bool,
}

impl SqliteStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            read_only: false,
        }
    }

    /// Open connections with SQLITE_OPEN_READ_ONLY
    pub fn read_only(mut self, read_only: bool) -> Self {
        self.read_only = read_only;
        self
    }

    fn open(&self) -> Result<Connection, StoreError> {
        let access = if self.read_only {
            OpenFlags::SQLITE_OPEN_READ_ONLY
        } else {
            OpenFlags::SQLITE_OPEN_READ_WRITE
        };
        // No CREATE flag: a missing database file is an unavailable store
        Connection::open_with_flags(&self.path, access | OpenFlags::SQLITE_OPEN_NO_MUTEX).map_err(|e| {
            StoreError::Unavailable(format!("cannot open {}: {}", self.path.display(), e))
        })
    }
}

fn value_from_sqlite(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::from(i),
        ValueRef::Real(f) => serde_json::Number::from_f64(f)
            .map(Value::Number)
            .unwrap_or(Value::Null),
        ValueRef::Text(t) => Value::String(String::from_utf8_lossy(t).into_owned()),
        ValueRef::Blob(b) => Value::String(format!("<blob {} bytes>", b.len())),
    }
}

/// SQLite VM instructions between deadline checks
const PROGRESS_INTERVAL: i32 = 1_000;

/// Run `sql`, aborting with SQLITE_INTERRUPT once `deadline` has passed
fn run_until(conn: &Connection, sql: &str, deadline: Instant) -> rusqlite::Result<(Vec<String>, Vec<Row>)> {
    conn.progress_handler(PROGRESS_INTERVAL, Some(move || Instant::now() >= deadline));
    run_query(conn, sql)
}

fn run_query(conn: &Connection, sql: &str) -> rusqlite::Result<(Vec<String>, Vec<Row>)> {
    let mut stmt = conn.prepare(sql)?;
    let columns = unique_column_names(stmt.column_names());

    let mut rows = stmt.query([])?;
    let mut materialized = Vec::new();
    while let Some(row) = rows.next()? {
        let mut record = Row::new();
        for (idx, name) in columns.iter().enumerate() {
            record.insert(name.clone(), value_from_sqlite(row.get_ref(idx)?));
        }
        materialized.push(record);
    }

    Ok((columns, materialized))
}

#[async_trait]
impl DataStore for SqliteStore {
    fn name(&self) -> &'static str {
        "sqlite"
    }

    fn dialect(&self) -> SqlDialect {
        SqlDialect::Sqlite
    }

    async fn query(&self, sql: &str, timeout: Duration) -> Result<QueryResult, StoreError> {
        let start = Instant::now();
        let conn = self.open()?;
        let interrupt = conn.get_interrupt_handle();
        let sql = sql.to_string();

        let deadline = start + timeout;
        // The connection moves into the worker and is dropped there on every path
        let worker = tokio::task::spawn_blocking(move || run_until(&conn, &sql, deadline));

        match tokio::time::timeout(timeout, worker).await {
            Ok(Ok(Ok((columns, rows)))) => {
                let elapsed = start.elapsed().as_millis() as u64;
                debug!(rows = rows.len(), elapsed_ms = elapsed, "SQLite query finished");
                Ok(QueryResult::new(columns, rows, elapsed))
            }
            Ok(Ok(Err(e))) if e.sqlite_error_code() == Some(ErrorCode::OperationInterrupted) => {
                Err(StoreError::Timeout(timeout))
            }
            Ok(Ok(Err(e))) => Err(StoreError::Query(e.to_string())),
            Ok(Err(join_error)) => Err(StoreError::Unavailable(format!("query worker failed: {}", join_error))),
            Err(_) => {
                warn!(timeout_ms = timeout.as_millis() as u64, "Interrupting SQLite query");
                interrupt.interrupt();
                Err(StoreError::Timeout(timeout))
            }
        }
    }
}
