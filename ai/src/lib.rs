mod driver;
mod error;
mod message;
mod model;
mod openai;
mod tool;

pub use driver::chat::Conversation;
pub use driver::run::{PollPolicy, RunDriver};
pub use driver::{DriverError, DriverState, Session};
pub use error::AiError;
pub use message::{Message, ToolCallInfo, ToolOutput};
pub use model::{AssistantSpec, AssistantsApi, ChatModel, ModelReply, Run, RunStatus};
pub use openai::OpenAiClient;
pub use tool::{Function, Tool, ToolDispatch, ToolType};

// Re-export types that consumers will need to create and use tools
pub use serde_json::{Map, Value, json};

/// Helper function to create a tool with the given name, description, and parameters
///
/// # Example
/// ```rust
/// use ai::{create_tool, json};
///
/// let parameters = json!({
///     "type": "object",
///     "properties": {
///         "grade": {
///             "type": "string",
///             "description": "The grade of the employees (e.g., 'M3', 'N25').",
///         },
///     },
///     "required": ["grade"],
/// })
/// .as_object()
/// .cloned()
/// .unwrap_or_default();
///
/// let tool = create_tool(
///     "get_total_longevity_pay_for_grade",
///     "Retrieves the total longevity pay for a specific grade.",
///     parameters,
/// );
/// assert_eq!(tool.function.name, "get_total_longevity_pay_for_grade");
/// ```
pub fn create_tool(
    name: impl Into<String>,
    description: impl Into<String>,
    parameters: Map<String, Value>,
) -> Tool {
    Tool {
        tp: ToolType::Function,
        function: Function {
            name: name.into(),
            description: Some(description.into()),
            parameters: Some(parameters),
        },
    }
}
