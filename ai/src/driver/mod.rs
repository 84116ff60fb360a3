//! Conversation drivers.
//!
//! Both drivers walk the same state machine:
//!
//! ```text
//! AwaitingUserInput -> ModelPending -> TerminalAnswer
//!                           |  ^    -> Failed
//!                           v  |    -> TimedOut
//!                      ToolsRequested
//! ```
//!
//! Remote errors end the question in `Failed` and are never retried here.
//! Dropping the future returned by `ask` abandons the question at its next
//! await point; nothing already sent to the service is undone.

pub(crate) mod chat;
pub(crate) mod run;

use std::fmt::Display;
use std::time::Duration;

use thiserror::Error;

use self::chat::Conversation;
use self::run::RunDriver;

use crate::error::AiError;
use crate::model::RunStatus;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverState {
    AwaitingUserInput,
    ModelPending,
    ToolsRequested,
    TerminalAnswer,
    Failed,
    TimedOut,
}

impl DriverState {
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            DriverState::TerminalAnswer | DriverState::Failed | DriverState::TimedOut
        )
    }
}

/// Session-fatal outcomes of a question.
#[derive(Debug, Error)]
pub enum DriverError {
    #[error("model service error: {0}")]
    Remote(#[from] AiError),
    #[error("the model asked for more tools after its tool round")]
    UnexpectedToolRound,
    #[error("run {run_id} ended as {status}: {}", reason.as_deref().unwrap_or("no reason given"))]
    RunEnded {
        run_id: String,
        status: RunStatus,
        reason: Option<String>,
    },
    #[error("gave up on run {run_id} after {polls} polls ({}s)", elapsed.as_secs())]
    TimedOut {
        run_id: String,
        polls: u32,
        elapsed: Duration,
    },
}

impl DriverError {
    /// The terminal state this error leaves a driver in.
    #[must_use]
    pub fn state(&self) -> DriverState {
        match self {
            DriverError::TimedOut { .. } => DriverState::TimedOut,
            _ => DriverState::Failed,
        }
    }
}

/// Whichever driver a session was started with.
#[derive(Debug)]
pub enum Session {
    Chat(Conversation),
    Assistant(RunDriver),
}

impl Session {
    pub async fn ask(&mut self, question: impl Display) -> Result<String, DriverError> {
        match self {
            Session::Chat(conversation) => conversation.ask(question).await,
            Session::Assistant(driver) => driver.ask(question).await,
        }
    }

    #[must_use]
    pub fn state(&self) -> DriverState {
        match self {
            Session::Chat(conversation) => conversation.state(),
            Session::Assistant(driver) => driver.state(),
        }
    }
}

fn transition(state: &mut DriverState, next: DriverState) {
    tracing::debug!(from = ?*state, to = ?next, "driver transition");
    *state = next;
}
