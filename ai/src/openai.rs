//! HTTP client for OpenAI-compatible Chat Completions and Assistants (v2) endpoints.

use async_trait::async_trait;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};

use crate::error::AiError;
use crate::message::{Message, ToolCallInfo, ToolOutput};
use crate::model::{AssistantSpec, AssistantsApi, ChatModel, ModelReply, Run, RunStatus};
use crate::tool::Tool;

const ASSISTANTS_BETA: (&str, &str) = ("OpenAI-Beta", "assistants=v2");

#[derive(Clone)]
pub struct OpenAiClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl std::fmt::Debug for OpenAiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiClient")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .finish_non_exhaustive()
    }
}

impl OpenAiClient {
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into(),
            api_key: api_key.into(),
            model: model.into(),
        }
    }

    pub fn from_config(conf: &config::AIConfig) -> Self {
        Self::new(&conf.url, &conf.api_key, &conf.model)
    }

    #[must_use]
    pub fn model(&self) -> &str {
        &self.model
    }

    fn url(&self, path: &str) -> String {
        format!("{}/v1/{path}", self.base_url.trim_end_matches('/'))
    }

    async fn post<T: DeserializeOwned>(&self, path: &str, body: &Value) -> Result<T, AiError> {
        self.send(self.http.post(self.url(path)).json(body)).await
    }

    async fn send<T: DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<T, AiError> {
        let response = request.bearer_auth(&self.api_key).send().await?;
        let status = response.status();

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AiError::Api {
                status: status.as_u16(),
                message: error_message(&body),
            });
        }

        Ok(response.json::<T>().await?)
    }

    async fn assistants_post<T: DeserializeOwned>(
        &self,
        path: &str,
        body: &Value,
    ) -> Result<T, AiError> {
        let (header, value) = ASSISTANTS_BETA;
        self.send(self.http.post(self.url(path)).header(header, value).json(body))
            .await
    }

    async fn assistants_get<T: DeserializeOwned>(&self, path: &str) -> Result<T, AiError> {
        let (header, value) = ASSISTANTS_BETA;
        self.send(self.http.get(self.url(path)).header(header, value))
            .await
    }
}

#[async_trait]
impl ChatModel for OpenAiClient {
    async fn complete(&self, messages: &[Message], tools: &[Tool]) -> Result<ModelReply, AiError> {
        let mut body = json!({
            "model": self.model,
            "messages": messages.iter().map(message_json).collect::<Vec<_>>(),
        });
        if !tools.is_empty() {
            body["tools"] = json!(tools);
            body["tool_choice"] = json!("auto");
        }

        tracing::debug!(
            model = %self.model,
            message_count = messages.len(),
            tool_count = tools.len(),
            "requesting chat completion"
        );

        let completion: ChatCompletion = self.post("chat/completions", &body).await?;
        let message = completion
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| AiError::Malformed("completion has no choices".to_string()))?
            .message;

        if message.tool_calls.is_empty() {
            Ok(ModelReply::Text(message.content.unwrap_or_default()))
        } else {
            Ok(ModelReply::ToolCalls {
                content: message.content,
                calls: message.tool_calls.into_iter().map(Into::into).collect(),
            })
        }
    }
}

#[async_trait]
impl AssistantsApi for OpenAiClient {
    async fn create_assistant(
        &self,
        spec: &AssistantSpec,
        tools: &[Tool],
    ) -> Result<String, AiError> {
        let mut body = json!({
            "name": spec.name,
            "description": spec.description,
            "model": self.model,
            "tools": tools,
        });
        if let Some(instructions) = &spec.instructions {
            body["instructions"] = json!(instructions);
        }

        let created: Created = self.assistants_post("assistants", &body).await?;
        Ok(created.id)
    }

    async fn create_thread(&self) -> Result<String, AiError> {
        let created: Created = self.assistants_post("threads", &json!({})).await?;
        Ok(created.id)
    }

    async fn add_user_message(&self, thread_id: &str, content: &str) -> Result<(), AiError> {
        let _: Created = self
            .assistants_post(
                &format!("threads/{thread_id}/messages"),
                &json!({ "role": "user", "content": content }),
            )
            .await?;
        Ok(())
    }

    async fn create_run(&self, thread_id: &str, assistant_id: &str) -> Result<Run, AiError> {
        let run: WireRun = self
            .assistants_post(
                &format!("threads/{thread_id}/runs"),
                &json!({ "assistant_id": assistant_id }),
            )
            .await?;
        Ok(run.into())
    }

    async fn retrieve_run(&self, thread_id: &str, run_id: &str) -> Result<Run, AiError> {
        let run: WireRun = self
            .assistants_get(&format!("threads/{thread_id}/runs/{run_id}"))
            .await?;
        Ok(run.into())
    }

    async fn submit_tool_outputs(
        &self,
        thread_id: &str,
        run_id: &str,
        outputs: &[ToolOutput],
    ) -> Result<Run, AiError> {
        let run: WireRun = self
            .assistants_post(
                &format!("threads/{thread_id}/runs/{run_id}/submit_tool_outputs"),
                &json!({ "tool_outputs": outputs }),
            )
            .await?;
        Ok(run.into())
    }

    async fn cancel_run(&self, thread_id: &str, run_id: &str) -> Result<Run, AiError> {
        let run: WireRun = self
            .assistants_post(
                &format!("threads/{thread_id}/runs/{run_id}/cancel"),
                &json!({}),
            )
            .await?;
        Ok(run.into())
    }

    async fn latest_reply(&self, thread_id: &str) -> Result<Option<String>, AiError> {
        let list: MessageList = self
            .assistants_get(&format!("threads/{thread_id}/messages?order=desc&limit=20"))
            .await?;

        Ok(list
            .data
            .into_iter()
            .find(|message| message.role == "assistant")
            .map(|message| {
                message
                    .content
                    .into_iter()
                    .filter_map(|block| match block {
                        ContentBlock::Text { text } => Some(text.value),
                        ContentBlock::Other => None,
                    })
                    .collect::<Vec<_>>()
                    .join("\n")
            }))
    }
}

fn message_json(message: &Message) -> Value {
    match message {
        Message::System(content) => json!({ "role": "system", "content": content }),
        Message::User(content) => json!({ "role": "user", "content": content }),
        Message::Assistant {
            content,
            tool_calls,
        } if tool_calls.is_empty() => json!({ "role": "assistant", "content": content }),
        Message::Assistant {
            content,
            tool_calls,
        } => json!({
            "role": "assistant",
            "content": content,
            "tool_calls": tool_calls
                .iter()
                .map(|call| json!({
                    "id": call.id,
                    "type": "function",
                    "function": { "name": call.name, "arguments": call.arguments },
                }))
                .collect::<Vec<_>>(),
        }),
        Message::Tool(output) => json!({
            "role": "tool",
            "tool_call_id": output.tool_call_id,
            "content": output.output,
        }),
    }
}

/// Pulls `error.message` out of an API error body, falling back to the raw text.
fn error_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| v["error"]["message"].as_str().map(ToString::to_string))
        .unwrap_or_else(|| body.to_string())
}

#[derive(Deserialize)]
struct ChatCompletion {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: AssistantMessage,
}

#[derive(Deserialize)]
struct AssistantMessage {
    content: Option<String>,
    #[serde(default)]
    tool_calls: Vec<WireToolCall>,
}

#[derive(Deserialize)]
struct WireToolCall {
    id: String,
    function: WireFunctionCall,
}

#[derive(Deserialize)]
struct WireFunctionCall {
    name: String,
    arguments: String,
}

impl From<WireToolCall> for ToolCallInfo {
    fn from(call: WireToolCall) -> Self {
        ToolCallInfo {
            id: call.id,
            name: call.function.name,
            arguments: call.function.arguments,
        }
    }
}

#[derive(Deserialize)]
struct Created {
    id: String,
}

#[derive(Deserialize)]
struct WireRun {
    id: String,
    thread_id: String,
    status: RunStatus,
    required_action: Option<RequiredAction>,
    last_error: Option<RunError>,
}

#[derive(Deserialize)]
struct RequiredAction {
    submit_tool_outputs: SubmitToolOutputs,
}

#[derive(Deserialize)]
struct SubmitToolOutputs {
    tool_calls: Vec<WireToolCall>,
}

#[derive(Deserialize)]
struct RunError {
    message: String,
}

impl From<WireRun> for Run {
    fn from(run: WireRun) -> Self {
        Run {
            id: run.id,
            thread_id: run.thread_id,
            status: run.status,
            tool_calls: run
                .required_action
                .map(|action| {
                    action
                        .submit_tool_outputs
                        .tool_calls
                        .into_iter()
                        .map(Into::into)
                        .collect()
                })
                .unwrap_or_default(),
            last_error: run.last_error.map(|err| err.message),
        }
    }
}

#[derive(Deserialize)]
struct MessageList {
    data: Vec<ThreadMessage>,
}

#[derive(Deserialize)]
struct ThreadMessage {
    role: String,
    content: Vec<ContentBlock>,
}

#[derive(Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentBlock {
    Text { text: TextContent },
    #[serde(other)]
    Other,
}

#[derive(Deserialize)]
struct TextContent {
    value: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn assistant_tool_calls_use_the_wire_shape() {
        let message = Message::Assistant {
            content: None,
            tool_calls: vec![ToolCallInfo {
                id: "call_1".to_string(),
                name: "get_total_longevity_pay_for_grade".to_string(),
                arguments: r#"{"grade":"M3"}"#.to_string(),
            }],
        };

        assert_eq!(
            message_json(&message),
            json!({
                "role": "assistant",
                "content": null,
                "tool_calls": [{
                    "id": "call_1",
                    "type": "function",
                    "function": {
                        "name": "get_total_longevity_pay_for_grade",
                        "arguments": "{\"grade\":\"M3\"}",
                    },
                }],
            })
        );
    }

    #[test]
    fn tool_results_reference_their_call() {
        let message = Message::Tool(ToolOutput {
            tool_call_id: "call_1".to_string(),
            output: r#"{"total_longevity_pay":0.0}"#.to_string(),
        });

        assert_eq!(message_json(&message)["tool_call_id"], json!("call_1"));
        assert_eq!(message_json(&message)["role"], json!("tool"));
    }

    #[test]
    fn error_bodies_are_unwrapped() {
        assert_eq!(
            error_message(r#"{"error":{"message":"Incorrect API key provided"}}"#),
            "Incorrect API key provided"
        );
        assert_eq!(error_message("bad gateway"), "bad gateway");
    }
}
