use futures::StreamExt;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};
use url::Url;

use super::{DeltaEvent, DeltaStream, SubmitRequest, Transport};
use crate::api::sse::parse_sse_stream;
use crate::api::{ApiError, HTTP_TIMEOUT_SECS, StreamError};
use crate::config::RemoteSettings;
use crate::session::Message;
use crate::types::{SessionId, ToolCallId};

const PROVIDER_NAME: &str = "remote";

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RemoteRequest<'a> {
    session_id: &'a SessionId,
    messages: &'a [Message],
}

/// One SSE `data:` payload from the remote endpoint.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
enum RemoteDelta {
    TextDelta {
        #[serde(rename = "textDelta")]
        text_delta: String,
    },
    ToolCallStart {
        #[serde(rename = "toolCallId")]
        tool_call_id: ToolCallId,
        #[serde(rename = "toolName")]
        tool_name: String,
        #[serde(default)]
        args: Value,
    },
    ToolCallResult {
        #[serde(rename = "toolCallId")]
        tool_call_id: ToolCallId,
        #[serde(default)]
        result: Value,
        #[serde(default, rename = "isError")]
        is_error: bool,
    },
    Finish,
    Error {
        message: String,
    },
}

impl RemoteDelta {
    fn into_event(self) -> DeltaEvent {
        match self {
            Self::TextDelta { text_delta } => DeltaEvent::text(text_delta),
            Self::ToolCallStart {
                tool_call_id,
                tool_name,
                args,
            } => DeltaEvent::ToolCallStart {
                tool_call_id,
                tool_name,
                args,
            },
            Self::ToolCallResult {
                tool_call_id,
                result,
                is_error,
            } => DeltaEvent::ToolCallResult {
                tool_call_id,
                result,
                is_error,
            },
            Self::Finish => DeltaEvent::StreamEnd,
            Self::Error { message } => DeltaEvent::error(StreamError::Provider {
                provider: PROVIDER_NAME.to_string(),
                message,
            }),
        }
    }
}

/// Delegates the whole exchange to an HTTP endpoint. No model or credential
/// resolution happens locally and tools run on the remote side.
#[derive(Debug, Clone)]
pub struct RemoteTransport {
    http_client: reqwest::Client,
    endpoint: Url,
    headers: HeaderMap,
}

impl RemoteTransport {
    pub fn new(endpoint: Url, headers: &BTreeMap<String, String>) -> Result<Self, ApiError> {
        let mut header_map = HeaderMap::new();
        for (name, value) in headers {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| ApiError::Configuration(format!("invalid header name '{name}': {e}")))?;
            let value = HeaderValue::from_str(value)
                .map_err(|e| ApiError::Configuration(format!("invalid value for header '{name}': {e}")))?;
            header_map.insert(name, value);
        }

        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(HTTP_TIMEOUT_SECS))
            .build()?;

        Ok(Self {
            http_client,
            endpoint,
            headers: header_map,
        })
    }

    pub fn from_settings(settings: &RemoteSettings) -> Result<Self, ApiError> {
        Self::new(settings.endpoint.clone(), &settings.headers)
    }
}

impl Transport for RemoteTransport {
    fn name(&self) -> &'static str {
        PROVIDER_NAME
    }

    fn submit(&self, request: SubmitRequest, token: CancellationToken) -> DeltaStream {
        let this = self.clone();

        Box::pin(async_stream::stream! {
            info!(
                target: "transport::remote",
                session_id = %request.session_id,
                endpoint = %this.endpoint,
                messages = request.messages.len(),
                "Forwarding message log"
            );
            let body = RemoteRequest {
                session_id: &request.session_id,
                messages: &request.messages,
            };
            let send = this
                .http_client
                .post(this.endpoint.clone())
                .headers(this.headers.clone())
                .json(&body)
                .send();

            let response = tokio::select! {
                biased;
                () = token.cancelled() => {
                    yield DeltaEvent::error(StreamError::Cancelled);
                    return;
                }
                response = send => response,
            };
            let response = match response {
                Ok(response) => response,
                Err(e) => {
                    yield DeltaEvent::error(ApiError::Network(e).into());
                    return;
                }
            };

            let status = response.status();
            if !status.is_success() {
                let details = response.text().await.unwrap_or_default();
                debug!(target: "transport::remote", %status, body = %details, "Endpoint rejected request");
                yield DeltaEvent::error(StreamError::Provider {
                    provider: PROVIDER_NAME.to_string(),
                    message: format!("status {}: {details}", status.as_u16()),
                });
                return;
            }

            let mut events = parse_sse_stream(response.bytes_stream());
            loop {
                let next = tokio::select! {
                    biased;
                    () = token.cancelled() => {
                        yield DeltaEvent::error(StreamError::Cancelled);
                        return;
                    }
                    next = events.next() => next,
                };

                let event = match next {
                    None => {
                        debug!(target: "transport::remote", "Body closed without a finish event");
                        yield DeltaEvent::error(StreamError::Provider {
                            provider: PROVIDER_NAME.to_string(),
                            message: "stream ended before the response completed".to_string(),
                        });
                        return;
                    }
                    Some(Err(e)) => {
                        yield DeltaEvent::error(StreamError::SseParse(e));
                        return;
                    }
                    Some(Ok(event)) => event,
                };

                if event.data == "[DONE]" {
                    yield DeltaEvent::StreamEnd;
                    return;
                }

                match serde_json::from_str::<RemoteDelta>(&event.data) {
                    Ok(delta) => {
                        let event = delta.into_event();
                        let terminal = event.is_terminal();
                        yield event;
                        if terminal {
                            return;
                        }
                    }
                    Err(e) => {
                        debug!(target: "transport::remote", error = %e, data = %event.data, "Skipping unrecognized event");
                    }
                }
            }
        })
    }
}
