//! Loads the salary CSV into the SQLite store.
//!
//! The CSV replaces any previous contents of [`SALARY_TABLE`]. Column types are
//! inferred: a column whose non-empty cells all parse as numbers becomes `REAL`,
//! anything else `TEXT`. Empty cells are filled with `0` in numeric columns and
//! left as empty strings in text columns.

use std::path::{Path, PathBuf};

use sqlx::sqlite::{SqliteConnectOptions, SqliteConnection};
use sqlx::Connection;
use thiserror::Error;

use crate::SALARY_TABLE;

/// Columns the analytic tools query.
pub const REQUIRED_COLUMNS: [&str; 7] = [
    "Division",
    "Department_Name",
    "Grade",
    "Gender",
    "Base_Salary",
    "Overtime_Pay",
    "Longevity_Pay",
];

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("could not read {}: {source}", path.display())]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("could not create {}: {source}", path.display())]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed CSV: {0}")]
    Csv(#[from] csv::Error),
    #[error("CSV is missing required column {0}")]
    MissingColumn(&'static str),
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestReport {
    pub table: String,
    pub rows: usize,
    pub columns: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ColumnKind {
    Real,
    Text,
}

impl ColumnKind {
    fn infer<'a>(mut cells: impl Iterator<Item = &'a str>) -> Self {
        if cells.all(|cell| cell.is_empty() || cell.parse::<f64>().is_ok()) {
            ColumnKind::Real
        } else {
            ColumnKind::Text
        }
    }

    fn sql_type(self) -> &'static str {
        match self {
            ColumnKind::Real => "REAL",
            ColumnKind::Text => "TEXT",
        }
    }
}

/// Reads `csv_path` and writes it into the database at `database_path`,
/// creating the file and its parent directory when needed.
pub async fn load_csv(csv_path: &Path, database_path: &Path) -> Result<IngestReport, IngestError> {
    let bytes = tokio::fs::read(csv_path)
        .await
        .map_err(|source| IngestError::ReadFile {
            path: csv_path.to_path_buf(),
            source,
        })?;

    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(bytes.as_slice());

    let headers: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();

    if let Some(missing) = REQUIRED_COLUMNS
        .into_iter()
        .find(|required| !headers.iter().any(|header| header == required))
    {
        return Err(IngestError::MissingColumn(missing));
    }

    let records = reader
        .records()
        .collect::<Result<Vec<csv::StringRecord>, _>>()?;

    let kinds: Vec<ColumnKind> = (0..headers.len())
        .map(|i| ColumnKind::infer(records.iter().map(|record| record.get(i).unwrap_or(""))))
        .collect();

    if let Some(parent) = database_path.parent()
        && !parent.as_os_str().is_empty()
    {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|source| IngestError::CreateDir {
                path: parent.to_path_buf(),
                source,
            })?;
    }

    let options = SqliteConnectOptions::new()
        .filename(database_path)
        .create_if_missing(true);
    let mut connection = SqliteConnection::connect_with(&options).await?;
    let mut tx = connection.begin().await?;

    let table = quote_ident(SALARY_TABLE);
    let column_defs = headers
        .iter()
        .zip(&kinds)
        .map(|(name, kind)| format!("{} {}", quote_ident(name), kind.sql_type()))
        .collect::<Vec<_>>()
        .join(", ");
    let placeholders = vec!["?"; headers.len()].join(", ");

    sqlx::query(&format!("DROP TABLE IF EXISTS {table}"))
        .execute(&mut *tx)
        .await?;
    sqlx::query(&format!("CREATE TABLE {table} ({column_defs})"))
        .execute(&mut *tx)
        .await?;

    let insert_sql = format!("INSERT INTO {table} VALUES ({placeholders})");
    for record in &records {
        let mut insert = sqlx::query(&insert_sql);
        for (cell, kind) in record.iter().zip(&kinds) {
            insert = match kind {
                ColumnKind::Real => insert.bind(cell.parse::<f64>().unwrap_or(0.0)),
                ColumnKind::Text => insert.bind(cell),
            };
        }
        insert.execute(&mut *tx).await?;
    }

    tx.commit().await?;
    connection.close().await?;

    let report = IngestReport {
        table: SALARY_TABLE.to_string(),
        rows: records.len(),
        columns: headers.len(),
    };

    tracing::info!(
        csv = %csv_path.display(),
        database = %database_path.display(),
        rows = report.rows,
        columns = report.columns,
        "loaded salary data"
    );

    Ok(report)
}

fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}
