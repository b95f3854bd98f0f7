//! Test doubles shared by unit and integration tests.
//!
//! Transports and providers here are driven by scripts or channels instead of
//! the network, so tests control exactly when each delta arrives.

use async_trait::async_trait;
use futures::stream;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::api::{
    ApiError, CompletionRequest, CompletionStream, Provider, ProviderFactory, StreamChunk,
    StreamError,
};
use crate::config::{Credential, ProviderId, ProviderSettings, Settings};
use crate::transport::{DeltaEvent, DeltaStream, SubmitRequest, Transport};

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Settings with an OpenAI key so credential resolution succeeds.
pub fn test_settings() -> Settings {
    let mut settings = Settings::default();
    settings.providers.insert(
        ProviderId::from("openai"),
        ProviderSettings {
            api_key: Some("test-key".to_string()),
            base_url: Some("http://127.0.0.1:9/v1/chat/completions".to_string()),
        },
    );
    settings
}

/// Sends deltas into a [`ChannelTransport`] stream.
#[derive(Clone)]
pub struct DeltaSender {
    tx: mpsc::UnboundedSender<DeltaEvent>,
}

impl DeltaSender {
    /// Returns `false` once the receiving stream is gone.
    pub fn send(&self, event: DeltaEvent) -> bool {
        self.tx.send(event).is_ok()
    }
}

/// A transport whose deltas are pushed one by one by the test.
pub struct ChannelTransport {
    rx: Arc<tokio::sync::Mutex<mpsc::UnboundedReceiver<DeltaEvent>>>,
    submissions: Arc<Mutex<Vec<SubmitRequest>>>,
}

impl ChannelTransport {
    pub fn new() -> (Self, DeltaSender) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Self {
                rx: Arc::new(tokio::sync::Mutex::new(rx)),
                submissions: Arc::new(Mutex::new(Vec::new())),
            },
            DeltaSender { tx },
        )
    }

    pub fn submissions(&self) -> Vec<SubmitRequest> {
        lock(&self.submissions).clone()
    }
}

impl Transport for ChannelTransport {
    fn name(&self) -> &'static str {
        "channel"
    }

    fn submit(&self, request: SubmitRequest, token: CancellationToken) -> DeltaStream {
        lock(&self.submissions).push(request);
        let rx = Arc::clone(&self.rx);

        Box::pin(async_stream::stream! {
            let mut rx = rx.lock().await;
            loop {
                let next = tokio::select! {
                    biased;
                    () = token.cancelled() => {
                        yield DeltaEvent::error(StreamError::Cancelled);
                        return;
                    }
                    next = rx.recv() => next,
                };
                match next {
                    Some(event) => yield event,
                    None => return,
                }
            }
        })
    }
}

/// A transport that replays the same events for every submission.
pub struct StaticTransport {
    events: Vec<DeltaEvent>,
}

impl StaticTransport {
    pub fn new(events: Vec<DeltaEvent>) -> Self {
        Self { events }
    }

    pub fn text_reply(text: &str) -> Self {
        Self::new(vec![DeltaEvent::text(text), DeltaEvent::StreamEnd])
    }
}

impl Transport for StaticTransport {
    fn name(&self) -> &'static str {
        "static"
    }

    fn submit(&self, _request: SubmitRequest, _token: CancellationToken) -> DeltaStream {
        Box::pin(stream::iter(self.events.clone()))
    }
}

/// A provider that answers each call with the next scripted chunk list.
#[derive(Default)]
pub struct ScriptedProvider {
    responses: Mutex<VecDeque<Vec<StreamChunk>>>,
    requests: Mutex<Vec<CompletionRequest>>,
}

impl ScriptedProvider {
    pub fn new(responses: Vec<Vec<StreamChunk>>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn requests(&self) -> Vec<CompletionRequest> {
        lock(&self.requests).clone()
    }
}

#[async_trait]
impl Provider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn stream_complete(
        &self,
        request: CompletionRequest,
        _token: CancellationToken,
    ) -> Result<CompletionStream, ApiError> {
        lock(&self.requests).push(request);
        let chunks = lock(&self.responses).pop_front().ok_or_else(|| ApiError::StreamError {
            provider: "scripted".to_string(),
            details: "no scripted response left".to_string(),
        })?;
        Ok(Box::pin(stream::iter(chunks)))
    }
}

/// Hands out one shared [`ScriptedProvider`] and records which provider
/// and credential each model step resolved.
pub struct ScriptedProviderFactory {
    provider: Arc<ScriptedProvider>,
    created: Mutex<Vec<(ProviderId, Credential)>>,
}

impl ScriptedProviderFactory {
    pub fn new(provider: Arc<ScriptedProvider>) -> Self {
        Self {
            provider,
            created: Mutex::new(Vec::new()),
        }
    }

    pub fn created(&self) -> Vec<(ProviderId, Credential)> {
        lock(&self.created).clone()
    }
}

impl ProviderFactory for ScriptedProviderFactory {
    fn create(
        &self,
        provider: &ProviderId,
        credential: &Credential,
    ) -> Result<Arc<dyn Provider>, ApiError> {
        lock(&self.created).push((provider.clone(), credential.clone()));
        Ok(Arc::clone(&self.provider) as Arc<dyn Provider>)
    }
}
