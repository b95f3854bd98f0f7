//! Transport gateway: turns a message log into a stream of delta events.
//!
//! Two strategies share the [`Transport`] contract. [`LocalTransport`] drives
//! a model provider in-process and executes tools itself; [`RemoteTransport`]
//! forwards the log to an HTTP endpoint that streams the same deltas back.
//! Neither ever fails outside the stream: every fault arrives as a terminal
//! [`DeltaEvent::StreamError`].

use futures::{Stream, StreamExt};
use serde_json::Value;
use std::pin::Pin;
use tokio_util::sync::CancellationToken;

use crate::api::StreamError;
use crate::config::ModelSelection;
use crate::session::{Message, ToolDataUpdate};
use crate::types::{SessionId, ToolCallId};

pub mod local;
pub mod remote;

pub use local::LocalTransport;
pub use remote::RemoteTransport;

#[derive(Debug, Clone, PartialEq)]
pub enum DeltaEvent {
    TextDelta {
        text: String,
    },
    ToolCallStart {
        tool_call_id: ToolCallId,
        tool_name: String,
        args: Value,
    },
    ToolCallResult {
        tool_call_id: ToolCallId,
        result: Value,
        is_error: bool,
    },
    StreamEnd,
    StreamError {
        error: StreamError,
    },
}

impl DeltaEvent {
    pub fn text(text: impl Into<String>) -> Self {
        Self::TextDelta { text: text.into() }
    }

    pub fn error(error: StreamError) -> Self {
        Self::StreamError { error }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::StreamEnd | Self::StreamError { .. })
    }
}

pub type DeltaStream = Pin<Box<dyn Stream<Item = DeltaEvent> + Send>>;

#[derive(Debug, Clone)]
pub struct SubmitRequest {
    /// Session the run belongs to. Tool data is recorded here.
    pub session_id: SessionId,
    pub messages: Vec<Message>,
}

pub trait Transport: Send + Sync + 'static {
    fn name(&self) -> &'static str;

    /// Start an exchange. Must stop yielding soon after `token` fires and
    /// must not yield anything after a terminal event.
    fn submit(&self, request: SubmitRequest, token: CancellationToken) -> DeltaStream;
}

/// Where the local strategy reads the provider/model from at call time.
pub trait SelectionSource: Send + Sync {
    fn current_selection(&self) -> Option<ModelSelection>;
}

/// Receives side-channel tool data keyed by session and tool-call id.
pub trait ToolCompletionSink: Send + Sync {
    fn record_tool_completion(
        &self,
        session_id: &SessionId,
        tool_call_id: &ToolCallId,
        update: ToolDataUpdate,
    ) -> bool;
}

/// Cut `stream` after its first terminal event. A stream that ends without
/// one is truncated and closes with a transport error.
pub fn until_terminal(stream: DeltaStream) -> DeltaStream {
    Box::pin(async_stream::stream! {
        let mut stream = stream;
        while let Some(event) = stream.next().await {
            let terminal = event.is_terminal();
            yield event;
            if terminal {
                return;
            }
        }
        yield DeltaEvent::error(StreamError::Transport {
            details: "stream closed before a terminal event".to_string(),
        });
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::stream;

    #[tokio::test]
    async fn nothing_passes_a_terminal_event() {
        let inner: DeltaStream = Box::pin(stream::iter(vec![
            DeltaEvent::text("a"),
            DeltaEvent::error(StreamError::Transport {
                details: "reset".into(),
            }),
            DeltaEvent::text("late"),
        ]));
        let events: Vec<_> = until_terminal(inner).collect().await;
        assert_eq!(events.len(), 2);
        assert!(events[1].is_terminal());
    }

    #[tokio::test]
    async fn unterminated_stream_ends_in_error() {
        let inner: DeltaStream = Box::pin(stream::iter(vec![DeltaEvent::text("a")]));
        let events: Vec<_> = until_terminal(inner).collect().await;
        assert_eq!(events.len(), 2);
        assert!(matches!(
            &events[1],
            DeltaEvent::StreamError {
                error: StreamError::Transport { .. }
            }
        ));
    }
}
