use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use ai::{
    AiError, AssistantSpec, AssistantsApi, ChatModel, Conversation, DriverError, DriverState,
    Message, ModelReply, PollPolicy, Run, RunDriver, RunStatus, Session, Tool, ToolCallInfo,
    ToolDispatch, ToolOutput, create_tool,
};
use async_trait::async_trait;

fn call(id: &str, name: &str, arguments: &str) -> ToolCallInfo {
    ToolCallInfo {
        id: id.to_string(),
        name: name.to_string(),
        arguments: arguments.to_string(),
    }
}

/// Answers every call with `{"ok":true}` and counts dispatch rounds.
#[derive(Debug, Default)]
struct CountingTools {
    rounds: AtomicUsize,
}

impl CountingTools {
    fn rounds(&self) -> usize {
        self.rounds.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ToolDispatch for CountingTools {
    fn tools(&self) -> Vec<Tool> {
        vec![create_tool(
            "get_total_overtime_pay_for_department",
            "Retrieves the total overtime pay for a specific department.",
            ai::Map::new(),
        )]
    }

    async fn dispatch(&self, calls: &[ToolCallInfo]) -> Vec<ToolOutput> {
        self.rounds.fetch_add(1, Ordering::SeqCst);
        calls
            .iter()
            .map(|call| ToolOutput {
                tool_call_id: call.id.clone(),
                output: r#"{"ok":true}"#.to_string(),
            })
            .collect()
    }
}

/// Replays scripted replies and records how many tools each request offered.
#[derive(Debug)]
struct ScriptedModel {
    replies: Mutex<VecDeque<Result<ModelReply, AiError>>>,
    offered: Mutex<Vec<usize>>,
}

impl ScriptedModel {
    fn new(replies: Vec<Result<ModelReply, AiError>>) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(replies.into()),
            offered: Mutex::new(vec![]),
        })
    }

    fn offered(&self) -> Vec<usize> {
        self.offered.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChatModel for ScriptedModel {
    async fn complete(
        &self,
        _messages: &[Message],
        tools: &[Tool],
    ) -> Result<ModelReply, AiError> {
        self.offered.lock().unwrap().push(tools.len());
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .expect("model called more often than scripted")
    }
}

#[tokio::test]
async fn direct_answer_skips_dispatch() {
    let model = ScriptedModel::new(vec![Ok(ModelReply::Text("Hello there".to_string()))]);
    let tools = Arc::new(CountingTools::default());
    let mut conversation = Conversation::new(model.clone(), tools.clone());

    let answer = conversation.ask("hi").await.unwrap();

    assert_eq!(answer, "Hello there");
    assert_eq!(conversation.state(), DriverState::TerminalAnswer);
    assert_eq!(tools.rounds(), 0);
    assert_eq!(model.offered(), vec![1]);
}

#[tokio::test]
async fn tool_round_is_followed_by_one_toolless_request() {
    let model = ScriptedModel::new(vec![
        Ok(ModelReply::ToolCalls {
            content: None,
            calls: vec![
                call(
                    "call_1",
                    "get_total_overtime_pay_for_department",
                    r#"{"department_name":"Alcohol Beverage Services"}"#,
                ),
                call(
                    "call_2",
                    "get_total_overtime_pay_for_department",
                    r#"{"department_name":"Police"}"#,
                ),
            ],
        }),
        Ok(ModelReply::Text("$350.00".to_string())),
    ]);
    let tools = Arc::new(CountingTools::default());
    let mut conversation = Conversation::new(model.clone(), tools.clone());
    conversation.set_system_prompt("You answer questions about salaries.");

    let answer = conversation.ask("overtime?").await.unwrap();

    assert_eq!(answer, "$350.00");
    assert_eq!(tools.rounds(), 1);
    assert_eq!(model.offered(), vec![1, 0]);

    let roles: Vec<_> = conversation.history().iter().map(Message::role).collect();
    assert_eq!(
        roles,
        vec!["system", "user", "assistant", "tool", "tool", "assistant"]
    );
    let Message::Tool(first) = &conversation.history()[3] else {
        panic!("expected a tool message");
    };
    assert_eq!(first.tool_call_id, "call_1");
}

#[tokio::test]
async fn remote_failure_fails_the_question() {
    let model = ScriptedModel::new(vec![Err(AiError::Api {
        status: 500,
        message: "upstream exploded".to_string(),
    })]);
    let tools = Arc::new(CountingTools::default());
    let mut conversation = Conversation::new(model, tools.clone());

    let err = conversation.ask("hi").await.unwrap_err();

    assert!(matches!(err, DriverError::Remote(AiError::Api { status: 500, .. })));
    assert_eq!(conversation.state(), DriverState::Failed);
    assert_eq!(tools.rounds(), 0);
}

#[tokio::test]
async fn second_tool_request_is_not_honoured() {
    let again = || {
        Ok(ModelReply::ToolCalls {
            content: None,
            calls: vec![call("call_1", "get_total_overtime_pay_for_department", "{}")],
        })
    };
    let model = ScriptedModel::new(vec![again(), again()]);
    let tools = Arc::new(CountingTools::default());
    let mut conversation = Conversation::new(model, tools.clone());

    let err = conversation.ask("overtime?").await.unwrap_err();

    assert!(matches!(err, DriverError::UnexpectedToolRound));
    assert_eq!(conversation.state(), DriverState::Failed);
    assert_eq!(tools.rounds(), 1);
}

#[derive(Debug, Default)]
struct RunLog {
    threads: usize,
    retrieves: usize,
    cancels: usize,
    submitted: Vec<Vec<ToolOutput>>,
}

/// Plays back a scripted sequence of run statuses.
///
/// `create_run` returns the first status, each retrieve or submit the next;
/// once the script is exhausted the last status repeats.
#[derive(Debug)]
struct ScriptedRuns {
    statuses: Mutex<VecDeque<RunStatus>>,
    last: Mutex<RunStatus>,
    log: Mutex<RunLog>,
}

impl ScriptedRuns {
    fn new(statuses: &[RunStatus]) -> Arc<Self> {
        Arc::new(Self {
            statuses: Mutex::new(statuses.iter().copied().collect()),
            last: Mutex::new(RunStatus::Queued),
            log: Mutex::new(RunLog::default()),
        })
    }

    fn next_run(&self) -> Run {
        let status = match self.statuses.lock().unwrap().pop_front() {
            Some(status) => {
                *self.last.lock().unwrap() = status;
                status
            }
            None => *self.last.lock().unwrap(),
        };

        let (tool_calls, last_error) = match status {
            RunStatus::RequiresAction => (
                vec![
                    call("call_1", "get_total_overtime_pay_for_department", "{}"),
                    call("call_2", "get_total_longevity_pay_for_grade", "{}"),
                ],
                None,
            ),
            RunStatus::Failed => (vec![], Some("Rate limit reached".to_string())),
            _ => (vec![], None),
        };

        Run {
            id: "run_1".to_string(),
            thread_id: "thread_1".to_string(),
            status,
            tool_calls,
            last_error,
        }
    }
}

#[async_trait]
impl AssistantsApi for ScriptedRuns {
    async fn create_assistant(
        &self,
        spec: &AssistantSpec,
        tools: &[Tool],
    ) -> Result<String, AiError> {
        assert_eq!(tools.len(), 1);
        Ok(format!("asst_{}", spec.name.to_lowercase()))
    }

    async fn create_thread(&self) -> Result<String, AiError> {
        self.log.lock().unwrap().threads += 1;
        Ok("thread_1".to_string())
    }

    async fn add_user_message(&self, thread_id: &str, _content: &str) -> Result<(), AiError> {
        assert_eq!(thread_id, "thread_1");
        Ok(())
    }

    async fn create_run(&self, _thread_id: &str, _assistant_id: &str) -> Result<Run, AiError> {
        Ok(self.next_run())
    }

    async fn retrieve_run(&self, _thread_id: &str, _run_id: &str) -> Result<Run, AiError> {
        self.log.lock().unwrap().retrieves += 1;
        Ok(self.next_run())
    }

    async fn submit_tool_outputs(
        &self,
        _thread_id: &str,
        _run_id: &str,
        outputs: &[ToolOutput],
    ) -> Result<Run, AiError> {
        self.log.lock().unwrap().submitted.push(outputs.to_vec());
        Ok(self.next_run())
    }

    async fn cancel_run(&self, _thread_id: &str, _run_id: &str) -> Result<Run, AiError> {
        self.log.lock().unwrap().cancels += 1;
        Ok(Run {
            id: "run_1".to_string(),
            thread_id: "thread_1".to_string(),
            status: RunStatus::Cancelling,
            tool_calls: vec![],
            last_error: None,
        })
    }

    async fn latest_reply(&self, _thread_id: &str) -> Result<Option<String>, AiError> {
        Ok(Some("The total overtime pay is $350.".to_string()))
    }
}

fn spec() -> AssistantSpec {
    AssistantSpec {
        name: "Salary".to_string(),
        description: "Assistant to help with salary data".to_string(),
        instructions: None,
    }
}

fn policy(interval_secs: u64, max_polls: u32, max_wait_secs: u64) -> PollPolicy {
    PollPolicy {
        interval: Duration::from_secs(interval_secs),
        max_polls,
        max_wait: Duration::from_secs(max_wait_secs),
    }
}

#[tokio::test(start_paused = true)]
async fn run_dispatches_once_then_completes() {
    let api = ScriptedRuns::new(&[
        RunStatus::Queued,
        RunStatus::InProgress,
        RunStatus::RequiresAction,
        RunStatus::Queued,
        RunStatus::Completed,
    ]);
    let tools = Arc::new(CountingTools::default());
    let mut driver = RunDriver::create(api.clone(), tools.clone(), &spec(), policy(5, 60, 300))
        .await
        .unwrap();
    assert_eq!(driver.assistant_id(), "asst_salary");

    let answer = driver.ask("overtime?").await.unwrap();

    assert_eq!(answer, "The total overtime pay is $350.");
    assert_eq!(driver.state(), DriverState::TerminalAnswer);
    assert_eq!(tools.rounds(), 1);

    let log = api.log.lock().unwrap();
    assert_eq!(log.submitted.len(), 1);
    let ids: Vec<_> = log.submitted[0]
        .iter()
        .map(|output| output.tool_call_id.as_str())
        .collect();
    assert_eq!(ids, vec!["call_1", "call_2"]);
    assert_eq!(log.cancels, 0);
}

#[tokio::test(start_paused = true)]
async fn stuck_run_is_cancelled_after_max_polls() {
    let api = ScriptedRuns::new(&[RunStatus::Queued]);
    let tools = Arc::new(CountingTools::default());
    let mut driver = RunDriver::create(api.clone(), tools, &spec(), policy(5, 3, 300))
        .await
        .unwrap();

    let err = driver.ask("overtime?").await.unwrap_err();

    let DriverError::TimedOut { polls, elapsed, .. } = err else {
        panic!("expected a timeout, got {err:?}");
    };
    assert_eq!(polls, 3);
    assert!(elapsed >= Duration::from_secs(15));
    assert_eq!(driver.state(), DriverState::TimedOut);

    let log = api.log.lock().unwrap();
    assert_eq!(log.retrieves, 3);
    assert_eq!(log.cancels, 1);
}

#[tokio::test(start_paused = true)]
async fn wall_clock_budget_bounds_the_wait() {
    let api = ScriptedRuns::new(&[RunStatus::InProgress]);
    let tools = Arc::new(CountingTools::default());
    let mut driver = RunDriver::create(api.clone(), tools, &spec(), policy(10, 100, 25))
        .await
        .unwrap();

    let err = driver.ask("overtime?").await.unwrap_err();

    assert!(matches!(err, DriverError::TimedOut { polls: 3, .. }));
    assert_eq!(api.log.lock().unwrap().cancels, 1);
}

#[tokio::test(start_paused = true)]
async fn repeated_tool_requests_count_toward_max_polls() {
    let api = ScriptedRuns::new(&[RunStatus::RequiresAction]);
    let tools = Arc::new(CountingTools::default());
    let mut driver = RunDriver::create(api.clone(), tools.clone(), &spec(), policy(5, 3, 300))
        .await
        .unwrap();

    let err = driver.ask("overtime?").await.unwrap_err();

    assert!(matches!(err, DriverError::TimedOut { polls: 3, .. }));
    assert_eq!(driver.state(), DriverState::TimedOut);
    assert_eq!(tools.rounds(), 3);

    let log = api.log.lock().unwrap();
    assert_eq!(log.submitted.len(), 3);
    assert_eq!(log.retrieves, 0);
    assert_eq!(log.cancels, 1);
}

#[tokio::test(start_paused = true)]
async fn timed_out_thread_is_replaced_on_the_next_question() {
    let api = ScriptedRuns::new(&[RunStatus::Queued, RunStatus::Queued, RunStatus::Completed]);
    let tools = Arc::new(CountingTools::default());
    let mut driver = RunDriver::create(api.clone(), tools, &spec(), policy(5, 1, 300))
        .await
        .unwrap();

    let err = driver.ask("first").await.unwrap_err();
    assert!(matches!(err, DriverError::TimedOut { polls: 1, .. }));

    let answer = driver.ask("second").await.unwrap();

    assert_eq!(answer, "The total overtime pay is $350.");
    assert_eq!(driver.state(), DriverState::TerminalAnswer);
    let log = api.log.lock().unwrap();
    assert_eq!(log.threads, 2);
    assert_eq!(log.cancels, 1);
}

#[tokio::test(start_paused = true)]
async fn failed_run_reports_its_reason() {
    let api = ScriptedRuns::new(&[RunStatus::Queued, RunStatus::Failed]);
    let tools = Arc::new(CountingTools::default());
    let mut driver = RunDriver::create(api, tools.clone(), &spec(), PollPolicy::default())
        .await
        .unwrap();

    let err = driver.ask("overtime?").await.unwrap_err();

    match err {
        DriverError::RunEnded { status, reason, .. } => {
            assert_eq!(status, RunStatus::Failed);
            assert_eq!(reason.as_deref(), Some("Rate limit reached"));
        }
        other => panic!("expected the run to end, got {other:?}"),
    }
    assert_eq!(driver.state(), DriverState::Failed);
    assert_eq!(tools.rounds(), 0);
}

#[tokio::test(start_paused = true)]
async fn questions_share_one_thread() {
    let api = ScriptedRuns::new(&[RunStatus::Completed]);
    let tools = Arc::new(CountingTools::default());
    let mut driver = RunDriver::create(api.clone(), tools, &spec(), PollPolicy::default())
        .await
        .unwrap();

    driver.ask("first").await.unwrap();
    driver.ask("second").await.unwrap();

    assert_eq!(api.log.lock().unwrap().threads, 1);
}

#[tokio::test(start_paused = true)]
async fn sessions_forward_to_their_driver() {
    let model = ScriptedModel::new(vec![Ok(ModelReply::Text("Hello there".to_string()))]);
    let mut chat = Session::Chat(Conversation::new(
        model,
        Arc::new(CountingTools::default()),
    ));
    assert_eq!(chat.ask("hi").await.unwrap(), "Hello there");
    assert_eq!(chat.state(), DriverState::TerminalAnswer);

    let api = ScriptedRuns::new(&[RunStatus::Expired]);
    let driver = RunDriver::create(
        api,
        Arc::new(CountingTools::default()),
        &spec(),
        PollPolicy::default(),
    )
    .await
    .unwrap();
    let mut assistant = Session::Assistant(driver);
    assert!(matches!(
        assistant.ask("hi").await,
        Err(DriverError::RunEnded {
            status: RunStatus::Expired,
            ..
        })
    ));
    assert_eq!(assistant.state(), DriverState::Failed);
}
