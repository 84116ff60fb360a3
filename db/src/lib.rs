pub mod ingest;
pub mod query;
pub mod sqlite;

use async_trait::async_trait;
use serde_json::Value;
use std::collections::BTreeMap;
use thiserror::Error;

pub use query::{Param, Query};

/// Table the salary CSV is loaded into.
pub const SALARY_TABLE: &str = "salaries_2023";

/// One result row, keyed by column name in select order.
pub type Record = serde_json::Map<String, Value>;

/// Table name to its `(column, declared type)` pairs.
pub type Schema = BTreeMap<String, Vec<(String, String)>>;

#[derive(Debug, Error)]
pub enum DatabaseError {
    #[error("refusing to run a statement that is not a single read-only query")]
    ReadOnly,
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

/// Trait defining the interface for read-only database access
#[async_trait]
pub trait Database: Send + Sync + std::fmt::Debug {
    /// Execute a parameterized query and return every row as a record.
    /// Statements other than a single `SELECT`/`WITH` are rejected with
    /// [`DatabaseError::ReadOnly`] before they reach the store.
    async fn get_results(&self, query: &Query) -> Result<Vec<Record>, DatabaseError>;

    /// Get the database schema information
    /// Returns every table with its columns and their declared types.
    async fn get_schema(&self) -> Result<Schema, DatabaseError>;

    /// First `limit` rows of the salary table.
    async fn preview(&self, limit: i64) -> Result<Vec<Record>, DatabaseError> {
        let query = Query::new(format!("SELECT * FROM {SALARY_TABLE} LIMIT ?")).bind(limit);
        self.get_results(&query).await
    }
}
