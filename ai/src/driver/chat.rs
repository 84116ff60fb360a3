use std::fmt::Display;
use std::sync::Arc;

use super::{DriverError, DriverState, transition};
use crate::message::Message;
use crate::model::{ChatModel, ModelReply};
use crate::tool::{Tool, ToolDispatch};

/// Single-round function-calling driver.
///
/// The first request carries the tool catalog. If the model asks for tools,
/// they are dispatched and exactly one more request is made, without tools,
/// for the final answer.
#[derive(Debug)]
pub struct Conversation {
    model: Arc<dyn ChatModel>,
    tools: Arc<dyn ToolDispatch>,
    history: Vec<Message>,
    state: DriverState,
}

impl Conversation {
    pub fn new(model: Arc<dyn ChatModel>, tools: Arc<dyn ToolDispatch>) -> Self {
        Self {
            model,
            tools,
            history: vec![],
            state: DriverState::AwaitingUserInput,
        }
    }

    pub fn set_system_prompt(&mut self, prompt: impl Display) {
        self.history.push(Message::System(prompt.to_string()));
    }

    #[must_use]
    pub fn history(&self) -> &[Message] {
        &self.history
    }

    #[must_use]
    pub fn state(&self) -> DriverState {
        self.state
    }

    /// Asks one question and drives it to a terminal state.
    pub async fn ask(&mut self, question: impl Display) -> Result<String, DriverError> {
        self.history.push(Message::User(question.to_string()));
        transition(&mut self.state, DriverState::ModelPending);

        let catalog = self.tools.tools();
        let calls = match self.call_model(&catalog).await? {
            ModelReply::Text(answer) => return Ok(self.finish(answer)),
            ModelReply::ToolCalls { content, calls } => {
                self.history.push(Message::Assistant {
                    content,
                    tool_calls: calls.clone(),
                });
                calls
            }
        };

        transition(&mut self.state, DriverState::ToolsRequested);
        tracing::debug!(
            calls = calls.len(),
            tools = ?calls.iter().map(|call| call.name.as_str()).collect::<Vec<_>>(),
            "dispatching tool calls"
        );
        let outputs = self.tools.dispatch(&calls).await;
        self.history.extend(outputs.into_iter().map(Message::Tool));

        transition(&mut self.state, DriverState::ModelPending);
        match self.call_model(&[]).await? {
            ModelReply::Text(answer) => Ok(self.finish(answer)),
            ModelReply::ToolCalls { .. } => {
                transition(&mut self.state, DriverState::Failed);
                Err(DriverError::UnexpectedToolRound)
            }
        }
    }

    async fn call_model(&mut self, tools: &[Tool]) -> Result<ModelReply, DriverError> {
        match self.model.complete(&self.history, tools).await {
            Ok(reply) => Ok(reply),
            Err(err) => {
                tracing::warn!(error = %err, "model request failed");
                transition(&mut self.state, DriverState::Failed);
                Err(err.into())
            }
        }
    }

    fn finish(&mut self, answer: String) -> String {
        self.history.push(Message::assistant(answer.clone()));
        transition(&mut self.state, DriverState::TerminalAnswer);
        answer
    }
}
