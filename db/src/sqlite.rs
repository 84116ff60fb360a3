use std::path::Path;

use serde_json::{Value, json};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::{Column, Row, TypeInfo, ValueRef};

use crate::{Database, DatabaseError, Param, Query, Record, Schema};

/// Read-only handle on the salary store. Cloning shares the pool.
#[derive(Debug, Clone)]
pub struct SqliteDatabase {
    pool: SqlitePool,
}

impl SqliteDatabase {
    /// Opens an existing database file in SQLite read-only mode.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, DatabaseError> {
        let options = SqliteConnectOptions::new()
            .filename(path.as_ref())
            .read_only(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect_with(options)
            .await?;

        Ok(Self { pool })
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

#[async_trait::async_trait]
impl Database for SqliteDatabase {
    async fn get_results(&self, query: &Query) -> Result<Vec<Record>, DatabaseError> {
        if !query.is_read_only() {
            tracing::warn!(sql = query.sql(), "rejected non read-only statement");
            return Err(DatabaseError::ReadOnly);
        }

        let mut statement = sqlx::query(query.sql());
        for param in query.params() {
            statement = match param {
                Param::Text(value) => statement.bind(value.as_str()),
                Param::Real(value) => statement.bind(*value),
                Param::Integer(value) => statement.bind(*value),
            };
        }

        let rows = statement.fetch_all(&self.pool).await?;
        tracing::debug!(sql = query.sql(), rows = rows.len(), "query finished");

        rows.iter().map(to_record).collect()
    }

    async fn get_schema(&self) -> Result<Schema, DatabaseError> {
        let tables: Vec<String> = sqlx::query_scalar(
            r"SELECT name FROM sqlite_master
              WHERE type = 'table' AND name NOT LIKE 'sqlite_%'
              ORDER BY name",
        )
        .fetch_all(&self.pool)
        .await?;

        let mut schema = Schema::new();

        for table in tables {
            let columns: Vec<(String, String)> =
                sqlx::query_as("SELECT name, type FROM pragma_table_info(?) ORDER BY cid")
                    .bind(table.as_str())
                    .fetch_all(&self.pool)
                    .await?;

            schema.insert(table, columns);
        }

        Ok(schema)
    }
}

/// Converts a row into a record, mapping each value by its runtime storage class.
fn to_record(row: &SqliteRow) -> Result<Record, DatabaseError> {
    let mut record = Record::new();

    for (i, col) in row.columns().iter().enumerate() {
        let raw = row.try_get_raw(i)?;

        let value = if raw.is_null() {
            Value::Null
        } else {
            let type_name = raw.type_info().name().to_string();
            match type_name.as_str() {
                "INTEGER" | "BIGINT" | "INT8" => row
                    .try_get::<i64, _>(i)
                    .map(|v| json!(v))
                    .unwrap_or(Value::Null),

                "REAL" | "NUMERIC" => row
                    .try_get::<f64, _>(i)
                    .map(|v| json!(v))
                    .unwrap_or(Value::Null),

                "BOOLEAN" => row
                    .try_get::<bool, _>(i)
                    .map(|v| json!(v))
                    .unwrap_or(Value::Null),

                _ => row
                    .try_get::<String, _>(i)
                    .map(|v| json!(v))
                    .unwrap_or(Value::Null),
            }
        };

        record.insert(col.name().to_string(), value);
    }

    Ok(record)
}
