use futures::StreamExt;
use serde_json::Value;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::{DeltaEvent, DeltaStream, SelectionSource, SubmitRequest, ToolCompletionSink, Transport};
use crate::api::{CompletionRequest, ProviderFactory, StreamChunk, StreamError};
use crate::config::{CredentialResolver, DEFAULT_MAX_STEPS};
use crate::session::{Message, MessagePart, ToolDataUpdate, ToolInvocationState};
use crate::tools::{ToolContext, ToolRegistry};
use crate::types::ToolCallId;
use geolens_tools::ToolError;

/// Runs the exchange in-process: model calls through a [`ProviderFactory`],
/// tool calls through a [`ToolRegistry`].
///
/// Provider and model are read from the selection source at the start of
/// every model step, so changing the current session's model mid-run takes
/// effect on the next step.
#[derive(Clone)]
pub struct LocalTransport {
    selection: Arc<dyn SelectionSource>,
    sink: Arc<dyn ToolCompletionSink>,
    credentials: CredentialResolver,
    providers: Arc<dyn ProviderFactory>,
    tools: Arc<ToolRegistry>,
    system_prompt: Option<String>,
    max_steps: usize,
}

impl LocalTransport {
    pub fn new(
        selection: Arc<dyn SelectionSource>,
        sink: Arc<dyn ToolCompletionSink>,
        credentials: CredentialResolver,
        providers: Arc<dyn ProviderFactory>,
        tools: Arc<ToolRegistry>,
    ) -> Self {
        Self {
            selection,
            sink,
            credentials,
            providers,
            tools,
            system_prompt: None,
            max_steps: DEFAULT_MAX_STEPS,
        }
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(prompt.into());
        self
    }

    pub fn with_max_steps(mut self, max_steps: usize) -> Self {
        self.max_steps = max_steps.max(1);
        self
    }
}

impl Transport for LocalTransport {
    fn name(&self) -> &'static str {
        "local"
    }

    fn submit(&self, request: SubmitRequest, token: CancellationToken) -> DeltaStream {
        let this = self.clone();

        Box::pin(async_stream::stream! {
            let SubmitRequest { session_id, messages: mut log } = request;

            for step in 0..this.max_steps {
                if token.is_cancelled() {
                    yield DeltaEvent::error(StreamError::Cancelled);
                    return;
                }

                let Some(selection) = this.selection.current_selection() else {
                    yield DeltaEvent::error(StreamError::Configuration {
                        details: "No current session to take a model from".to_string(),
                    });
                    return;
                };
                let credential = match this.credentials.resolve(&selection.provider, &selection.model) {
                    Ok(credential) => credential,
                    Err(e) => {
                        yield DeltaEvent::error(StreamError::Configuration { details: e.to_string() });
                        return;
                    }
                };
                let provider = match this.providers.create(&selection.provider, &credential) {
                    Ok(provider) => provider,
                    Err(e) => {
                        yield DeltaEvent::error(e.into());
                        return;
                    }
                };

                info!(
                    target: "transport::local",
                    %session_id,
                    step,
                    provider = %selection.provider,
                    model = %selection.model,
                    "Calling model"
                );
                let completion = CompletionRequest {
                    model: selection.model.clone(),
                    messages: log.clone(),
                    system: this.system_prompt.clone(),
                    tools: this.tools.schemas(),
                };
                let mut chunks = match provider.stream_complete(completion, token.clone()).await {
                    Ok(chunks) => chunks,
                    Err(e) => {
                        yield DeltaEvent::error(e.into());
                        return;
                    }
                };

                let mut parts: Vec<MessagePart> = Vec::new();
                let mut tool_calls = Vec::new();
                let mut completed = false;
                while let Some(chunk) = chunks.next().await {
                    match chunk {
                        StreamChunk::TextDelta(text) => {
                            match parts.last_mut() {
                                Some(MessagePart::Text { text: existing }) => existing.push_str(&text),
                                _ => parts.push(MessagePart::text(text.clone())),
                            }
                            yield DeltaEvent::text(text);
                        }
                        StreamChunk::ToolCall(call) => tool_calls.push(call),
                        StreamChunk::MessageComplete => {
                            completed = true;
                            break;
                        }
                        StreamChunk::Error(e) => {
                            yield DeltaEvent::error(e);
                            return;
                        }
                    }
                }
                if !completed {
                    yield DeltaEvent::error(if token.is_cancelled() {
                        StreamError::Cancelled
                    } else {
                        StreamError::Provider {
                            provider: selection.provider.to_string(),
                            message: "stream ended before the response completed".to_string(),
                        }
                    });
                    return;
                }

                if tool_calls.is_empty() {
                    debug!(target: "transport::local", %session_id, step, "Model finished without tool calls");
                    yield DeltaEvent::StreamEnd;
                    return;
                }

                for call in tool_calls {
                    let tool_call_id = ToolCallId::from_string(call.id);
                    yield DeltaEvent::ToolCallStart {
                        tool_call_id: tool_call_id.clone(),
                        tool_name: call.name.clone(),
                        args: call.parameters.clone(),
                    };

                    let ctx = ToolContext {
                        tool_call_id: tool_call_id.clone(),
                        session_id: session_id.clone(),
                        cancellation_token: token.child_token(),
                    };
                    let outcome = tokio::select! {
                        biased;
                        () = token.cancelled() => {
                            yield DeltaEvent::error(StreamError::Cancelled);
                            return;
                        }
                        outcome = this.tools.execute(&call.name, call.parameters.clone(), &ctx) => outcome,
                    };

                    let (result, is_error) = match outcome {
                        Ok(output) => {
                            let (primary, side_channel) = output.into_parts();
                            // Recorded before the model sees the result.
                            if let Some(data) = side_channel {
                                this.sink.record_tool_completion(
                                    &session_id,
                                    &tool_call_id,
                                    ToolDataUpdate::merge(data),
                                );
                            }
                            (primary, false)
                        }
                        Err(ToolError::Cancelled(_)) => {
                            yield DeltaEvent::error(StreamError::Cancelled);
                            return;
                        }
                        Err(e) => {
                            warn!(target: "transport::local", tool = %call.name, %tool_call_id, error = %e, "Tool failed");
                            (Value::String(e.to_string()), true)
                        }
                    };

                    parts.push(MessagePart::ToolInvocation {
                        tool_call_id: tool_call_id.clone(),
                        tool_name: call.name,
                        args: call.parameters,
                        state: if is_error {
                            ToolInvocationState::Error
                        } else {
                            ToolInvocationState::Result
                        },
                        result: Some(result.clone()),
                    });
                    yield DeltaEvent::ToolCallResult {
                        tool_call_id,
                        result,
                        is_error,
                    };
                }

                log.push(Message::assistant(parts));
            }

            warn!(target: "transport::local", %session_id, max_steps = this.max_steps, "Step limit reached");
            yield DeltaEvent::StreamEnd;
        })
    }
}
