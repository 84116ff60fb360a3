use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::AiError;
use crate::message::{Message, ToolCallInfo, ToolOutput};
use crate::tool::Tool;

/// What a chat model produced for one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelReply {
    /// A final answer.
    Text(String),
    /// The model wants these tools run before it answers.
    ToolCalls {
        content: Option<String>,
        calls: Vec<ToolCallInfo>,
    },
}

/// A chat-completion service.
#[async_trait]
pub trait ChatModel: Send + Sync + fmt::Debug {
    /// Sends the whole history. An empty `tools` slice disables tool use.
    async fn complete(&self, messages: &[Message], tools: &[Tool]) -> Result<ModelReply, AiError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Queued,
    InProgress,
    RequiresAction,
    Cancelling,
    Cancelled,
    Failed,
    Completed,
    Incomplete,
    Expired,
    #[serde(other)]
    Unknown,
}

impl RunStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            RunStatus::Queued => "queued",
            RunStatus::InProgress => "in_progress",
            RunStatus::RequiresAction => "requires_action",
            RunStatus::Cancelling => "cancelling",
            RunStatus::Cancelled => "cancelled",
            RunStatus::Failed => "failed",
            RunStatus::Completed => "completed",
            RunStatus::Incomplete => "incomplete",
            RunStatus::Expired => "expired",
            RunStatus::Unknown => "unknown",
        }
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Snapshot of an assistant run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Run {
    pub id: String,
    pub thread_id: String,
    pub status: RunStatus,
    /// Calls awaiting outputs; only filled while `status` is `RequiresAction`.
    pub tool_calls: Vec<ToolCallInfo>,
    pub last_error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssistantSpec {
    pub name: String,
    pub description: String,
    pub instructions: Option<String>,
}

/// The asynchronous assistant/thread/run service.
#[async_trait]
pub trait AssistantsApi: Send + Sync + fmt::Debug {
    /// Registers an assistant that may call `tools`; returns its id.
    async fn create_assistant(&self, spec: &AssistantSpec, tools: &[Tool])
    -> Result<String, AiError>;

    async fn create_thread(&self) -> Result<String, AiError>;

    async fn add_user_message(&self, thread_id: &str, content: &str) -> Result<(), AiError>;

    async fn create_run(&self, thread_id: &str, assistant_id: &str) -> Result<Run, AiError>;

    async fn retrieve_run(&self, thread_id: &str, run_id: &str) -> Result<Run, AiError>;

    async fn submit_tool_outputs(
        &self,
        thread_id: &str,
        run_id: &str,
        outputs: &[ToolOutput],
    ) -> Result<Run, AiError>;

    async fn cancel_run(&self, thread_id: &str, run_id: &str) -> Result<Run, AiError>;

    /// Text of the newest assistant message on the thread.
    async fn latest_reply(&self, thread_id: &str) -> Result<Option<String>, AiError>;
}
