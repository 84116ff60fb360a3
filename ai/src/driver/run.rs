use std::fmt::Display;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;

use super::{DriverError, DriverState, transition};
use crate::error::AiError;
use crate::model::{AssistantSpec, AssistantsApi, Run, RunStatus};
use crate::tool::ToolDispatch;

/// How long the run poller may wait before giving up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollPolicy {
    pub interval: Duration,
    pub max_polls: u32,
    pub max_wait: Duration,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self::from(&config::PollingConfig::default())
    }
}

impl From<&config::PollingConfig> for PollPolicy {
    fn from(conf: &config::PollingConfig) -> Self {
        Self {
            interval: conf.interval(),
            max_polls: conf.max_polls,
            max_wait: conf.max_wait(),
        }
    }
}

/// Polling driver for assistant runs.
///
/// The assistant is registered once, with the dispatcher's catalog, when the
/// driver is created. Every question of the session goes to the same thread.
#[derive(Debug)]
pub struct RunDriver {
    api: Arc<dyn AssistantsApi>,
    tools: Arc<dyn ToolDispatch>,
    assistant_id: String,
    thread_id: Option<String>,
    policy: PollPolicy,
    state: DriverState,
}

impl RunDriver {
    pub async fn create(
        api: Arc<dyn AssistantsApi>,
        tools: Arc<dyn ToolDispatch>,
        spec: &AssistantSpec,
        policy: PollPolicy,
    ) -> Result<Self, AiError> {
        let assistant_id = api.create_assistant(spec, &tools.tools()).await?;
        tracing::info!(%assistant_id, name = %spec.name, "registered assistant");

        Ok(Self {
            api,
            tools,
            assistant_id,
            thread_id: None,
            policy,
            state: DriverState::AwaitingUserInput,
        })
    }

    #[must_use]
    pub fn state(&self) -> DriverState {
        self.state
    }

    #[must_use]
    pub fn assistant_id(&self) -> &str {
        &self.assistant_id
    }

    /// Asks one question and polls its run to a terminal state.
    ///
    /// After a timeout the thread is dropped and the next question starts a new one.
    pub async fn ask(&mut self, question: impl Display) -> Result<String, DriverError> {
        transition(&mut self.state, DriverState::ModelPending);

        let result = self.drive(&question.to_string()).await;
        match &result {
            Ok(_) => transition(&mut self.state, DriverState::TerminalAnswer),
            Err(err) => {
                tracing::warn!(error = %err, "run did not produce an answer");
                if matches!(err, DriverError::TimedOut { .. }) {
                    // The abandoned run may still be active and would block new messages.
                    self.thread_id = None;
                }
                transition(&mut self.state, err.state());
            }
        }

        result
    }

    async fn drive(&mut self, question: &str) -> Result<String, DriverError> {
        let thread_id = self.thread().await?;
        self.api.add_user_message(&thread_id, question).await?;

        let mut run = self.api.create_run(&thread_id, &self.assistant_id).await?;
        tracing::info!(run_id = %run.id, %thread_id, status = %run.status, "run created");

        let started = Instant::now();
        let mut polls: u32 = 0;

        loop {
            match run.status {
                RunStatus::Completed => {
                    return self.api.latest_reply(&thread_id).await?.ok_or_else(|| {
                        AiError::Malformed("completed run left no assistant message".to_string())
                            .into()
                    });
                }
                RunStatus::Cancelled
                | RunStatus::Expired
                | RunStatus::Failed
                | RunStatus::Incomplete => {
                    return Err(DriverError::RunEnded {
                        run_id: run.id,
                        status: run.status,
                        reason: run.last_error,
                    });
                }
                RunStatus::RequiresAction
                | RunStatus::Queued
                | RunStatus::InProgress
                | RunStatus::Cancelling
                | RunStatus::Unknown => {}
            }

            // Submit rounds count toward the budget like retrievals do.
            let elapsed = started.elapsed();
            if polls >= self.policy.max_polls || elapsed >= self.policy.max_wait {
                self.cancel(&thread_id, &run.id).await;
                return Err(DriverError::TimedOut {
                    run_id: run.id,
                    polls,
                    elapsed,
                });
            }

            if run.status == RunStatus::RequiresAction {
                run = self.submit_tools(&thread_id, &run).await?;
            } else {
                tokio::time::sleep(self.policy.interval).await;
                run = self.api.retrieve_run(&thread_id, &run.id).await?;
            }
            polls += 1;

            tracing::debug!(
                run_id = %run.id,
                status = %run.status,
                polls,
                elapsed_secs = started.elapsed().as_secs(),
                "polled run"
            );
        }
    }

    async fn thread(&mut self) -> Result<String, AiError> {
        if let Some(thread_id) = &self.thread_id {
            return Ok(thread_id.clone());
        }

        let thread_id = self.api.create_thread().await?;
        tracing::info!(%thread_id, "created thread");
        self.thread_id = Some(thread_id.clone());
        Ok(thread_id)
    }

    /// Runs every pending call and submits all outputs in one batch.
    async fn submit_tools(&mut self, thread_id: &str, run: &Run) -> Result<Run, AiError> {
        transition(&mut self.state, DriverState::ToolsRequested);
        tracing::debug!(run_id = %run.id, calls = run.tool_calls.len(), "dispatching tool calls");

        let outputs = self.tools.dispatch(&run.tool_calls).await;
        let next = self
            .api
            .submit_tool_outputs(thread_id, &run.id, &outputs)
            .await?;

        transition(&mut self.state, DriverState::ModelPending);
        Ok(next)
    }

    async fn cancel(&self, thread_id: &str, run_id: &str) {
        if let Err(err) = self.api.cancel_run(thread_id, run_id).await {
            tracing::warn!(%run_id, error = %err, "could not cancel abandoned run");
        }
    }
}
