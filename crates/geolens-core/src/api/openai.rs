//! Streaming client for OpenAI-compatible chat-completions endpoints.
//!
//! Used for every built-in provider; each one is reached through its
//! OpenAI-compatible surface with a provider-specific base URL.

use async_trait::async_trait;
use futures::{Stream, StreamExt};
use reqwest::header;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::api::error::{ApiError, SseParseError, StreamError};
use crate::api::provider::{CompletionRequest, CompletionStream, Provider, StreamChunk};
use crate::api::sse::{SseEvent, parse_sse_stream};
use crate::api::HTTP_TIMEOUT_SECS;
use crate::session::{Message, MessagePart, Role};
use geolens_tools::{ToolCall, ToolSchema};

#[derive(Clone)]
pub struct OpenAiChatProvider {
    name: String,
    http_client: reqwest::Client,
    url: String,
}

impl OpenAiChatProvider {
    pub fn new(
        name: impl Into<String>,
        api_key: Option<&str>,
        url: impl Into<String>,
    ) -> Result<Self, ApiError> {
        let mut headers = header::HeaderMap::new();
        if let Some(api_key) = api_key {
            let value = header::HeaderValue::from_str(&format!("Bearer {api_key}"))
                .map_err(|e| ApiError::Configuration(format!("invalid API key: {e}")))?;
            headers.insert(header::AUTHORIZATION, value);
        }

        let http_client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(HTTP_TIMEOUT_SECS))
            .build()?;

        Ok(Self {
            name: name.into(),
            http_client,
            url: url.into(),
        })
    }

    fn build_request(request: CompletionRequest) -> OpenAiRequest {
        let mut messages = Vec::new();
        if let Some(system) = request.system {
            messages.push(OpenAiMessage::System { content: system });
        }
        for message in &request.messages {
            messages.extend(convert_message(message));
        }

        let tools = (!request.tools.is_empty())
            .then(|| request.tools.into_iter().map(OpenAiTool::from).collect());

        OpenAiRequest {
            model: request.model,
            messages,
            tools,
            stream: true,
        }
    }

    fn convert_stream(
        provider: String,
        mut sse_stream: impl Stream<Item = Result<SseEvent, SseParseError>> + Unpin + Send + 'static,
        token: CancellationToken,
    ) -> impl Stream<Item = StreamChunk> + Send + 'static {
        #[derive(Default)]
        struct ToolCallAccumulator {
            id: String,
            name: String,
            args: String,
        }

        fn flush(tool_calls: BTreeMap<usize, ToolCallAccumulator>) -> Vec<ToolCall> {
            tool_calls
                .into_values()
                .filter(|tc| !tc.id.is_empty() && !tc.name.is_empty())
                .map(|tc| ToolCall {
                    id: tc.id,
                    name: tc.name,
                    parameters: serde_json::from_str(&tc.args)
                        .unwrap_or(Value::Object(Map::new())),
                })
                .collect()
        }

        async_stream::stream! {
            let mut tool_calls: BTreeMap<usize, ToolCallAccumulator> = BTreeMap::new();
            loop {
                let event = tokio::select! {
                    biased;
                    () = token.cancelled() => {
                        yield StreamChunk::Error(StreamError::Cancelled);
                        break;
                    }
                    event = sse_stream.next() => event
                };

                let event = match event {
                    // Some compatible servers close the body without `[DONE]`.
                    None => None,
                    Some(Ok(event)) if event.data == "[DONE]" => None,
                    Some(Ok(event)) => Some(event),
                    Some(Err(e)) => {
                        yield StreamChunk::Error(StreamError::SseParse(e));
                        break;
                    }
                };

                let Some(event) = event else {
                    for call in flush(std::mem::take(&mut tool_calls)) {
                        yield StreamChunk::ToolCall(call);
                    }
                    yield StreamChunk::MessageComplete;
                    break;
                };

                if let Ok(error) = serde_json::from_str::<OpenAiErrorEnvelope>(&event.data) {
                    yield StreamChunk::Error(StreamError::Provider {
                        provider: provider.clone(),
                        message: error.error.message,
                    });
                    break;
                }

                let chunk: OpenAiStreamChunk = match serde_json::from_str(&event.data) {
                    Ok(chunk) => chunk,
                    Err(e) => {
                        debug!(target: "openai::stream", "Skipping unparseable chunk: {} data: {}", e, event.data);
                        continue;
                    }
                };

                let Some(choice) = chunk.choices.into_iter().next() else {
                    continue;
                };

                if let Some(text) = choice.delta.content {
                    if !text.is_empty() {
                        yield StreamChunk::TextDelta(text);
                    }
                }

                for tc in choice.delta.tool_calls.unwrap_or_default() {
                    let entry = tool_calls.entry(tc.index).or_default();
                    if let Some(id) = tc.id.filter(|id| !id.is_empty()) {
                        entry.id = id;
                    }
                    if let Some(function) = tc.function {
                        if let Some(name) = function.name.filter(|n| !n.is_empty()) {
                            entry.name = name;
                        }
                        if let Some(args) = function.arguments {
                            entry.args.push_str(&args);
                        }
                    }
                }
            }
        }
    }
}

#[async_trait]
impl Provider for OpenAiChatProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn stream_complete(
        &self,
        request: CompletionRequest,
        token: CancellationToken,
    ) -> Result<CompletionStream, ApiError> {
        let body = Self::build_request(request);
        debug!(target: "openai::stream", provider = %self.name, model = %body.model, messages = body.messages.len(), "Sending request");

        let send = self.http_client.post(&self.url).json(&body).send();
        let response = tokio::select! {
            biased;
            () = token.cancelled() => {
                return Err(ApiError::Cancelled { provider: self.name.clone() });
            }
            response = send => response?,
        };

        if !response.status().is_success() {
            let status = response.status();
            let details = response.text().await.unwrap_or_default();
            debug!(target: "openai::stream", "API error status={} body={}", status, details);
            return Err(ApiError::ServerError {
                provider: self.name.clone(),
                status_code: status.as_u16(),
                details,
            });
        }

        let sse_stream = parse_sse_stream(response.bytes_stream());
        Ok(Box::pin(Self::convert_stream(
            self.name.clone(),
            sse_stream,
            token,
        )))
    }
}

fn convert_message(message: &Message) -> Vec<OpenAiMessage> {
    match message.role {
        Role::System => vec![OpenAiMessage::System {
            content: message.text(),
        }],
        Role::User => vec![OpenAiMessage::User {
            content: message.text(),
        }],
        Role::Assistant | Role::Tool => {
            let mut tool_calls = Vec::new();
            let mut tool_results = Vec::new();
            for part in &message.parts {
                if let MessagePart::ToolInvocation {
                    tool_call_id,
                    tool_name,
                    args,
                    result,
                    ..
                } = part
                {
                    tool_calls.push(OpenAiToolCall {
                        id: tool_call_id.to_string(),
                        call_type: "function".to_string(),
                        function: OpenAiFunctionCall {
                            name: tool_name.clone(),
                            arguments: args.to_string(),
                        },
                    });
                    if let Some(result) = result {
                        tool_results.push(OpenAiMessage::Tool {
                            tool_call_id: tool_call_id.to_string(),
                            content: match result {
                                Value::String(s) => s.clone(),
                                other => other.to_string(),
                            },
                        });
                    }
                }
            }

            let text = message.text();
            let mut out = Vec::with_capacity(1 + tool_results.len());
            if message.role == Role::Assistant || !tool_calls.is_empty() {
                out.push(OpenAiMessage::Assistant {
                    content: (!text.is_empty()).then_some(text),
                    tool_calls: (!tool_calls.is_empty()).then_some(tool_calls),
                });
            }
            out.extend(tool_results);
            out
        }
    }
}

#[derive(Debug, Serialize)]
struct OpenAiRequest {
    model: String,
    messages: Vec<OpenAiMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<OpenAiTool>>,
    stream: bool,
}

#[derive(Debug, Serialize, PartialEq)]
#[serde(tag = "role", rename_all = "lowercase")]
enum OpenAiMessage {
    System {
        content: String,
    },
    User {
        content: String,
    },
    Assistant {
        #[serde(skip_serializing_if = "Option::is_none")]
        content: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        tool_calls: Option<Vec<OpenAiToolCall>>,
    },
    Tool {
        tool_call_id: String,
        content: String,
    },
}

#[derive(Debug, Serialize, PartialEq)]
struct OpenAiToolCall {
    id: String,
    #[serde(rename = "type")]
    call_type: String,
    function: OpenAiFunctionCall,
}

#[derive(Debug, Serialize, PartialEq)]
struct OpenAiFunctionCall {
    name: String,
    arguments: String,
}

#[derive(Debug, Serialize)]
struct OpenAiTool {
    #[serde(rename = "type")]
    tool_type: String,
    function: OpenAiFunction,
}

#[derive(Debug, Serialize)]
struct OpenAiFunction {
    name: String,
    description: String,
    parameters: Value,
}

impl From<ToolSchema> for OpenAiTool {
    fn from(tool: ToolSchema) -> Self {
        Self {
            tool_type: "function".to_string(),
            function: OpenAiFunction {
                name: tool.name,
                description: tool.description,
                parameters: tool.input_schema.to_json(),
            },
        }
    }
}

#[derive(Debug, Deserialize)]
struct OpenAiStreamChunk {
    #[serde(default)]
    choices: Vec<OpenAiStreamChoice>,
}

#[derive(Debug, Deserialize)]
struct OpenAiStreamChoice {
    delta: OpenAiDelta,
}

#[derive(Debug, Default, Deserialize)]
struct OpenAiDelta {
    content: Option<String>,
    tool_calls: Option<Vec<OpenAiToolCallDelta>>,
}

#[derive(Debug, Deserialize)]
struct OpenAiToolCallDelta {
    index: usize,
    id: Option<String>,
    function: Option<OpenAiFunctionDelta>,
}

#[derive(Debug, Deserialize)]
struct OpenAiFunctionDelta {
    name: Option<String>,
    arguments: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OpenAiErrorEnvelope {
    error: OpenAiErrorBody,
}

#[derive(Debug, Deserialize)]
struct OpenAiErrorBody {
    message: String,
}
