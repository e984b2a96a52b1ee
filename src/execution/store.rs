//! Data Store Trait - Contract for every backing store

use crate::execution::result::QueryResult;
use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

/// SQL flavour a store understands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SqlDialect {
    Sqlite,
    BigQuery,
}

impl SqlDialect {
    pub fn label(&self) -> &'static str {
        match self {
            SqlDialect::Sqlite => "SQLite",
            SqlDialect::BigQuery => "BigQuery Standard SQL",
        }
    }
}

#[derive(Error, Debug, Clone)]
pub enum StoreError {
    #[error("query timed out after {0:?}")]
    Timeout(Duration),

    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("query failed: {0}")]
    Query(String),
}

/// Backing store for generated SQL
#[async_trait]
pub trait DataStore: Send + Sync {
    /// Store name (e.g., "sqlite", "bigquery")
    fn name(&self) -> &'static str;

    fn dialect(&self) -> SqlDialect;

    /// Run one statement and materialize every returned row.
    /// Connections are acquired per call.
    async fn query(&self, sql: &str, timeout: Duration) -> Result<QueryResult, StoreError>;
}
