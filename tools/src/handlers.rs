//! Read-only salary queries behind each operation.
//!
//! Model-supplied values are only ever bound as parameters. A failing query
//! is logged and answered with the operation's default result.

use db::{Database, DatabaseError, Query, Record, SALARY_TABLE};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::catalog::Operation;
use crate::schema::Arguments;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DivisionSummary {
    pub avg_salary: Option<f64>,
    pub female_count: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OvertimeTotal {
    pub total_overtime_pay: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LongevityTotal {
    pub total_longevity_pay: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenderCount {
    #[serde(rename = "Gender")]
    pub gender: String,
    pub employee_count: i64,
}

#[derive(Debug, Error)]
enum HandlerError {
    #[error(transparent)]
    Database(#[from] DatabaseError),
    #[error("unexpected row shape: {0}")]
    Decode(#[from] serde_json::Error),
}

/// Runs `operation` and serializes its result. Never fails.
pub(crate) async fn run(operation: Operation, args: &Arguments, db: &dyn Database) -> Value {
    let text = |name: &str| args.text(name).unwrap_or_default().to_string();

    match operation {
        Operation::AvgSalaryAndFemaleCount => {
            let query = Query::new(format!(
                "SELECT AVG(Base_Salary) AS avg_salary, COUNT(*) AS female_count \
                 FROM {SALARY_TABLE} WHERE Division = ? AND Gender = 'F'"
            ))
            .bind(text("division_name"));
            to_value(&single::<DivisionSummary>(operation, db, &query).await)
        }
        Operation::TotalOvertimePay => {
            let query = Query::new(format!(
                "SELECT COALESCE(SUM(Overtime_Pay), 0.0) AS total_overtime_pay \
                 FROM {SALARY_TABLE} WHERE Department_Name = ?"
            ))
            .bind(text("department_name"));
            to_value(&single::<OvertimeTotal>(operation, db, &query).await)
        }
        Operation::TotalLongevityPay => {
            let query = Query::new(format!(
                "SELECT COALESCE(SUM(Longevity_Pay), 0.0) AS total_longevity_pay \
                 FROM {SALARY_TABLE} WHERE Grade = ?"
            ))
            .bind(text("grade"));
            to_value(&single::<LongevityTotal>(operation, db, &query).await)
        }
        Operation::EmployeeCountByGender => {
            let query = Query::new(format!(
                "SELECT Gender, COUNT(*) AS employee_count FROM {SALARY_TABLE} \
                 WHERE Department_Name = ? GROUP BY Gender ORDER BY Gender"
            ))
            .bind(text("department_name"));
            to_value(&rows::<GenderCount>(operation, db, &query).await)
        }
        Operation::EmployeesWithOvertimeAbove => {
            let amount = args.number("amount").unwrap_or(f64::INFINITY);
            let query = Query::new(format!(
                "SELECT * FROM {SALARY_TABLE} WHERE Overtime_Pay > ? ORDER BY rowid"
            ))
            .bind(amount);
            to_value(&rows::<Record>(operation, db, &query).await)
        }
    }
}

/// First row of an aggregate, or `T::default()` when there is none or the query failed.
async fn single<T>(operation: Operation, db: &dyn Database, query: &Query) -> T
where
    T: DeserializeOwned + Default,
{
    match fetch::<T>(db, query).await {
        Ok(rows) => rows.into_iter().next().unwrap_or_default(),
        Err(err) => fallback(operation, &err),
    }
}

async fn rows<T: DeserializeOwned>(
    operation: Operation,
    db: &dyn Database,
    query: &Query,
) -> Vec<T> {
    fetch(db, query)
        .await
        .unwrap_or_else(|err| fallback(operation, &err))
}

async fn fetch<T: DeserializeOwned>(
    db: &dyn Database,
    query: &Query,
) -> Result<Vec<T>, HandlerError> {
    db.get_results(query)
        .await?
        .into_iter()
        .map(|record| serde_json::from_value(Value::Object(record)).map_err(HandlerError::from))
        .collect()
}

fn fallback<T: Default>(operation: Operation, err: &HandlerError) -> T {
    tracing::warn!(
        operation = operation.name(),
        error = %err,
        "query failed, answering with the default result"
    );
    T::default()
}

fn to_value<T: Serialize>(output: &T) -> Value {
    serde_json::to_value(output).unwrap_or(Value::Null)
}
