//! Execution Module - Runs candidate SQL against the configured store
//!
//! - DataStore trait for the embedded file store and the cloud warehouse
//! - QueryResult with an ordered column -> value row shape
//! - QueryExecutor, the boundary that turns every failure into an ExecutionError
//! - ReadOnlyGuard, an opt-in parse-level refusal of non-query statements

pub mod bigquery_store;
pub mod executor;
pub mod guard;
pub mod result;
pub mod sqlite_store;
pub mod store;

pub use bigquery_store::BigQueryStore;
pub use executor::{ExecutionError, QueryExecutor};
pub use guard::ReadOnlyGuard;
pub use result::{QueryResult, Row};
pub use sqlite_store::SqliteStore;
pub use store::{DataStore, SqlDialect, StoreError};
