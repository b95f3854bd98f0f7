use eventsource_stream::Eventsource;
use futures::{Stream, StreamExt};
use std::pin::Pin;
use tokio_util::bytes::Bytes;

use crate::api::error::SseParseError;

#[derive(Debug, Clone)]
pub struct SseEvent {
    pub event_type: Option<String>,
    pub data: String,
}

pub type SseStream = Pin<Box<dyn Stream<Item = Result<SseEvent, SseParseError>> + Send>>;

/// Decode a response byte stream into server-sent events.
pub fn parse_sse_stream<S, E>(byte_stream: S) -> SseStream
where
    S: Stream<Item = Result<Bytes, E>> + Send + 'static,
    E: std::error::Error + Send + 'static,
{
    let event_stream = byte_stream
        .map(|result| result.map_err(|e| std::io::Error::other(e.to_string())))
        .eventsource()
        .map(|result| {
            result
                .map(|event| SseEvent {
                    event_type: (!event.event.is_empty() && event.event != "message")
                        .then_some(event.event),
                    data: event.data,
                })
                .map_err(SseParseError::from)
        });

    Box::pin(event_stream)
}
