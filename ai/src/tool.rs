use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::message::{ToolCallInfo, ToolOutput};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolType {
    Function,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Function {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// JSON-Schema object describing the arguments.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parameters: Option<Map<String, Value>>,
}

/// A tool as advertised to the model: `{"type": "function", "function": {...}}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tool {
    #[serde(rename = "type")]
    pub tp: ToolType,
    pub function: Function,
}

/// Executes the tool calls a model asks for.
///
/// Implementations must return exactly one output per call, in call order,
/// and report per-call failures inside the output instead of failing the batch.
#[async_trait]
pub trait ToolDispatch: Send + Sync + std::fmt::Debug {
    /// The catalog advertised to the model.
    fn tools(&self) -> Vec<Tool>;

    async fn dispatch(&self, calls: &[ToolCallInfo]) -> Vec<ToolOutput>;
}
