//! Salary analytics exposed as model-callable tools.
//!
//! [`Catalog`] describes what the model may call, [`Dispatcher`] runs the
//! calls it makes against a [`db::Database`].

mod catalog;
mod dispatcher;
mod handlers;
mod schema;

pub use catalog::{Catalog, CatalogError, Operation};
pub use dispatcher::{DispatchError, Dispatcher};
pub use handlers::{DivisionSummary, GenderCount, LongevityTotal, OvertimeTotal};
pub use schema::{ArgValue, ArgumentError, Arguments, ParamType, Parameter, ParameterSchema};
