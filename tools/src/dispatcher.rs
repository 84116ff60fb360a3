use std::sync::Arc;

use ai::{Tool, ToolCallInfo, ToolDispatch, ToolOutput};
use async_trait::async_trait;
use db::Database;
use futures::future::join_all;
use serde_json::{Value, json};
use thiserror::Error;

use crate::catalog::{Catalog, CatalogError};
use crate::handlers;
use crate::schema::ArgumentError;

/// Per-call failures. They are reported to the model as the call's output.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DispatchError {
    #[error("unknown operation `{0}`")]
    UnknownOperation(String),
    #[error("invalid arguments for `{name}`: {reason}")]
    InvalidArguments { name: String, reason: ArgumentError },
}

impl DispatchError {
    /// `{"error": "unknown_operation" | "invalid_arguments", "name": ..., "message": ...}`
    #[must_use]
    pub fn to_payload(&self) -> Value {
        let (kind, name) = match self {
            DispatchError::UnknownOperation(name) => ("unknown_operation", name),
            DispatchError::InvalidArguments { name, .. } => ("invalid_arguments", name),
        };
        json!({ "error": kind, "name": name, "message": self.to_string() })
    }
}

/// Routes model tool calls to the catalog's handlers.
#[derive(Debug, Clone)]
pub struct Dispatcher {
    catalog: Arc<Catalog>,
    db: Arc<dyn Database>,
}

impl Dispatcher {
    pub fn new(catalog: Arc<Catalog>, db: Arc<dyn Database>) -> Self {
        Self { catalog, db }
    }

    #[must_use]
    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// Resolves, validates and runs one call.
    pub async fn invoke(&self, call: &ToolCallInfo) -> Result<Value, DispatchError> {
        let unknown = |_: CatalogError| DispatchError::UnknownOperation(call.name.clone());
        let operation = self.catalog.lookup(&call.name).map_err(unknown)?;
        let schema = self.catalog.schema_for(&call.name).map_err(unknown)?;
        let args = schema
            .validate(&call.arguments)
            .map_err(|reason| DispatchError::InvalidArguments {
                name: call.name.clone(),
                reason,
            })?;

        tracing::debug!(operation = operation.name(), call_id = %call.id, "running operation");
        Ok(handlers::run(operation, &args, self.db.as_ref()).await)
    }

    async fn answer(&self, call: &ToolCallInfo) -> ToolOutput {
        let payload = self.invoke(call).await.unwrap_or_else(|err| {
            tracing::warn!(call_id = %call.id, error = %err, "tool call rejected");
            err.to_payload()
        });

        ToolOutput {
            tool_call_id: call.id.clone(),
            output: payload.to_string(),
        }
    }
}

#[async_trait]
impl ToolDispatch for Dispatcher {
    fn tools(&self) -> Vec<Tool> {
        self.catalog.tools()
    }

    async fn dispatch(&self, calls: &[ToolCallInfo]) -> Vec<ToolOutput> {
        join_all(calls.iter().map(|call| self.answer(call))).await
    }
}
