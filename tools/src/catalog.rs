use ai::{Tool, create_tool};
use thiserror::Error;

use crate::schema::{ParamType, Parameter, ParameterSchema};

/// The analytic operations that can be offered to a model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    AvgSalaryAndFemaleCount,
    TotalOvertimePay,
    TotalLongevityPay,
    EmployeeCountByGender,
    EmployeesWithOvertimeAbove,
}

impl Operation {
    pub const ALL: [Operation; 5] = [
        Operation::AvgSalaryAndFemaleCount,
        Operation::TotalOvertimePay,
        Operation::TotalLongevityPay,
        Operation::EmployeeCountByGender,
        Operation::EmployeesWithOvertimeAbove,
    ];

    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Operation::AvgSalaryAndFemaleCount => "get_avg_salary_and_female_count_for_division",
            Operation::TotalOvertimePay => "get_total_overtime_pay_for_department",
            Operation::TotalLongevityPay => "get_total_longevity_pay_for_grade",
            Operation::EmployeeCountByGender => "get_employee_count_by_gender_in_department",
            Operation::EmployeesWithOvertimeAbove => "get_employees_with_overtime_above",
        }
    }

    #[must_use]
    pub fn description(self) -> &'static str {
        match self {
            Operation::AvgSalaryAndFemaleCount => {
                "Retrieves the average salary and the count of female employees in a specific division."
            }
            Operation::TotalOvertimePay => {
                "Retrieves the total overtime pay for a specific department."
            }
            Operation::TotalLongevityPay => {
                "Retrieves the total longevity pay for a specific grade."
            }
            Operation::EmployeeCountByGender => {
                "Retrieves the count of employees by gender in a specific department."
            }
            Operation::EmployeesWithOvertimeAbove => {
                "Retrieves the employees with overtime pay above a specified amount."
            }
        }
    }

    #[must_use]
    pub fn schema(self) -> ParameterSchema {
        let param = match self {
            Operation::AvgSalaryAndFemaleCount => Parameter::required(
                "division_name",
                ParamType::String,
                "The name of the division (e.g., 'ABS 85 Administrative Services').",
            ),
            Operation::TotalOvertimePay | Operation::EmployeeCountByGender => Parameter::required(
                "department_name",
                ParamType::String,
                "The name of the department (e.g., 'Alcohol Beverage Services').",
            ),
            Operation::TotalLongevityPay => Parameter::required(
                "grade",
                ParamType::String,
                "The grade of the employees (e.g., 'M3', 'N25').",
            ),
            Operation::EmployeesWithOvertimeAbove => Parameter::required(
                "amount",
                ParamType::Number,
                "The minimum amount of overtime pay (e.g., 1000.0).",
            ),
        };

        ParameterSchema::new(vec![param])
    }

    /// Wire form: `{"type": "function", "function": {...}}`.
    #[must_use]
    pub fn tool(self) -> Tool {
        create_tool(self.name(), self.description(), self.schema().to_json())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CatalogError {
    #[error("no operation named `{0}`")]
    NotFound(String),
    #[error("operation `{0}` is registered twice")]
    DuplicateName(&'static str),
}

#[derive(Debug)]
struct Entry {
    operation: Operation,
    schema: ParameterSchema,
}

impl Entry {
    fn new(operation: Operation) -> Self {
        Self {
            operation,
            schema: operation.schema(),
        }
    }
}

/// Fixed set of operations advertised for one session.
#[derive(Debug)]
pub struct Catalog {
    entries: Vec<Entry>,
}

impl Catalog {
    pub fn new(operations: impl IntoIterator<Item = Operation>) -> Result<Self, CatalogError> {
        let mut entries: Vec<Entry> = vec![];
        for operation in operations {
            if entries.iter().any(|entry| entry.operation.name() == operation.name()) {
                return Err(CatalogError::DuplicateName(operation.name()));
            }
            entries.push(Entry::new(operation));
        }

        Ok(Self { entries })
    }

    /// Every salary operation.
    ///
    /// Skips the duplicate check of [`Catalog::new`]: `Operation::ALL` lists each variant
    /// once and [`Operation::name`] gives every variant its own literal.
    #[must_use]
    pub fn salary() -> Self {
        Self {
            entries: Operation::ALL.into_iter().map(Entry::new).collect(),
        }
    }

    pub fn lookup(&self, name: &str) -> Result<Operation, CatalogError> {
        self.entry(name).map(|entry| entry.operation)
    }

    pub fn schema_for(&self, name: &str) -> Result<&ParameterSchema, CatalogError> {
        self.entry(name).map(|entry| &entry.schema)
    }

    pub fn operations(&self) -> impl Iterator<Item = Operation> + '_ {
        self.entries.iter().map(|entry| entry.operation)
    }

    #[must_use]
    pub fn tools(&self) -> Vec<Tool> {
        self.operations().map(Operation::tool).collect()
    }

    fn entry(&self, name: &str) -> Result<&Entry, CatalogError> {
        self.entries
            .iter()
            .find(|entry| entry.operation.name() == name)
            .ok_or_else(|| CatalogError::NotFound(name.to_string()))
    }
}
