//! Query Executor
//!
//! Boundary between the pipeline and the store: every failure comes back as
//! an ExecutionError value, never as a panic or a propagated error.

use crate::execution::guard::ReadOnlyGuard;
use crate::execution::result::QueryResult;
use crate::execution::store::{DataStore, SqlDialect};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{error, info};

#[derive(Error, Debug, Clone, PartialEq)]
#[error("{message}")]
pub struct ExecutionError {
    pub message: String,
}

impl ExecutionError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

pub struct QueryExecutor {
    store: Arc<dyn DataStore>,
    guard: Option<ReadOnlyGuard>,
}

impl QueryExecutor {
    pub fn new(store: Arc<dyn DataStore>) -> Self {
        Self { store, guard: None }
    }

    /// Refuse anything but a single read query before it reaches the store
    pub fn with_read_only_guard(mut self) -> Self {
        self.guard = Some(ReadOnlyGuard::new(self.store.dialect()));
        self
    }

    pub fn dialect(&self) -> SqlDialect {
        self.store.dialect()
    }

    pub async fn execute(&self, sql: &str, timeout: Duration) -> Result<QueryResult, ExecutionError> {
        if sql.trim().is_empty() {
            return Err(ExecutionError::new("no SQL statement to execute"));
        }

        if let Some(guard) = self.guard {
            if let Err(reason) = guard.check(sql) {
                error!(store = self.store.name(), %reason, "Read-only guard refused statement");
                return Err(ExecutionError::new(format!("statement refused: {}", reason)));
            }
        }

        match self.store.query(sql, timeout).await {
            Ok(result) => {
                info!(
                    store = self.store.name(),
                    rows = result.row_count,
                    elapsed_ms = result.execution_time_ms,
                    "Query executed"
                );
                Ok(result)
            }
            Err(e) => {
                error!(store = self.store.name(), error = %e, "Query execution failed");
                Err(ExecutionError::new(e.to_string()))
            }
        }
    }
}
