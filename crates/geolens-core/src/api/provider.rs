use async_trait::async_trait;
use futures::Stream;
use std::pin::Pin;
use tokio_util::sync::CancellationToken;

use crate::api::error::{ApiError, StreamError};
use crate::session::Message;
use geolens_tools::{ToolCall, ToolSchema};

/// One model turn's worth of input.
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub model: String,
    pub messages: Vec<Message>,
    pub system: Option<String>,
    pub tools: Vec<ToolSchema>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum StreamChunk {
    TextDelta(String),
    /// A fully assembled tool call; arguments are already parsed.
    ToolCall(ToolCall),
    MessageComplete,
    Error(StreamError),
}

pub type CompletionStream = Pin<Box<dyn Stream<Item = StreamChunk> + Send>>;

/// A model backend that can stream one completion.
#[async_trait]
pub trait Provider: Send + Sync + 'static {
    fn name(&self) -> &str;

    /// Start streaming. The returned stream must end after
    /// `StreamChunk::MessageComplete` or `StreamChunk::Error`, and must yield
    /// `StreamError::Cancelled` promptly once `token` fires.
    async fn stream_complete(
        &self,
        request: CompletionRequest,
        token: CancellationToken,
    ) -> Result<CompletionStream, ApiError>;
}
