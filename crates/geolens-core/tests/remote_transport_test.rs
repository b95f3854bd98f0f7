use axum::Router;
use axum::extract::Json;
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::response::sse::{Event, Sse};
use axum::routing::post;
use futures::StreamExt;
use futures::stream;
use geolens_core::api::StreamError;
use geolens_core::session::Message;
use geolens_core::transport::{DeltaEvent, RemoteTransport, SubmitRequest, Transport};
use geolens_core::types::{SessionId, ToolCallId};
use serde_json::{Value, json};
use std::collections::BTreeMap;
use std::convert::Infallible;
use tokio_util::sync::CancellationToken;
use url::Url;

fn sse(payloads: Vec<String>) -> impl IntoResponse {
    Sse::new(stream::iter(
        payloads
            .into_iter()
            .map(|data| Ok::<_, Infallible>(Event::default().data(data))),
    ))
}

async fn analysis(headers: HeaderMap, Json(body): Json<Value>) -> impl IntoResponse {
    let session = body["sessionId"].as_str().unwrap_or_default().to_string();
    let prompt = body["messages"][0]["parts"][0]["text"]
        .as_str()
        .unwrap_or_default()
        .to_string();
    let tenant = headers
        .get("x-tenant")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();

    sse(vec![
        json!({"type": "text-delta", "textDelta": format!("{tenant}/{session}: {prompt}")}).to_string(),
        json!({"type": "tool-call-start", "toolCallId": "t1", "toolName": "morans_i", "args": {"k": 8}})
            .to_string(),
        json!({"type": "reasoning", "text": "ignored"}).to_string(),
        json!({"type": "tool-call-result", "toolCallId": "t1", "result": {"i": 0.42}}).to_string(),
        json!({"type": "finish"}).to_string(),
        json!({"type": "text-delta", "textDelta": "after finish"}).to_string(),
    ])
}

async fn done_marker() -> impl IntoResponse {
    sse(vec![
        json!({"type": "text-delta", "textDelta": "short"}).to_string(),
        "[DONE]".to_string(),
    ])
}

async fn silent_close() -> impl IntoResponse {
    sse(vec![json!({"type": "text-delta", "textDelta": "cut"}).to_string()])
}

async fn failing() -> impl IntoResponse {
    (StatusCode::UNAUTHORIZED, "bad token")
}

async fn remote_error() -> impl IntoResponse {
    sse(vec![json!({"type": "error", "message": "model overloaded"}).to_string()])
}

async fn spawn_server() -> Url {
    let app = Router::new()
        .route("/api/chat", post(analysis))
        .route("/api/done", post(done_marker))
        .route("/api/silent", post(silent_close))
        .route("/api/fail", post(failing))
        .route("/api/error", post(remote_error));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    Url::parse(&format!("http://{addr}/")).unwrap()
}

fn request() -> SubmitRequest {
    SubmitRequest {
        session_id: SessionId::from("s1"),
        messages: vec![Message::user("Is crime clustered?").with_id("u1")],
    }
}

async fn collect(base: &Url, path: &str, headers: BTreeMap<String, String>) -> Vec<DeltaEvent> {
    let transport = RemoteTransport::new(base.join(path).unwrap(), &headers).unwrap();
    transport
        .submit(request(), CancellationToken::new())
        .collect()
        .await
}

#[tokio::test]
async fn streams_deltas_until_finish() {
    let base = spawn_server().await;
    let mut headers = BTreeMap::new();
    headers.insert("x-tenant".to_string(), "acme".to_string());

    let events = collect(&base, "api/chat", headers).await;

    assert_eq!(
        events,
        vec![
            DeltaEvent::text("acme/s1: Is crime clustered?"),
            DeltaEvent::ToolCallStart {
                tool_call_id: ToolCallId::from("t1"),
                tool_name: "morans_i".into(),
                args: json!({"k": 8}),
            },
            DeltaEvent::ToolCallResult {
                tool_call_id: ToolCallId::from("t1"),
                result: json!({"i": 0.42}),
                is_error: false,
            },
            DeltaEvent::StreamEnd,
        ]
    );
}

#[tokio::test]
async fn done_marker_ends_stream() {
    let base = spawn_server().await;
    let events = collect(&base, "api/done", BTreeMap::new()).await;
    assert_eq!(events, vec![DeltaEvent::text("short"), DeltaEvent::StreamEnd]);
}

#[tokio::test]
async fn body_closed_without_finish_is_a_provider_error() {
    let base = spawn_server().await;
    let events = collect(&base, "api/silent", BTreeMap::new()).await;

    assert_eq!(events.len(), 2);
    assert_eq!(events[0], DeltaEvent::text("cut"));
    match &events[1] {
        DeltaEvent::StreamError {
            error: StreamError::Provider { provider, message },
        } => {
            assert_eq!(provider, "remote");
            assert!(message.contains("ended before"));
        }
        other => panic!("unexpected event: {other:?}"),
    }
}

#[tokio::test]
async fn rejected_request_is_a_stream_error() {
    let base = spawn_server().await;
    let events = collect(&base, "api/fail", BTreeMap::new()).await;

    assert_eq!(events.len(), 1);
    match &events[0] {
        DeltaEvent::StreamError {
            error: StreamError::Provider { provider, message },
        } => {
            assert_eq!(provider, "remote");
            assert!(message.contains("401"));
            assert!(message.contains("bad token"));
        }
        other => panic!("unexpected event: {other:?}"),
    }
}

#[tokio::test]
async fn remote_error_payload_is_terminal() {
    let base = spawn_server().await;
    let events = collect(&base, "api/error", BTreeMap::new()).await;
    assert_eq!(
        events,
        vec![DeltaEvent::error(StreamError::Provider {
            provider: "remote".into(),
            message: "model overloaded".into(),
        })]
    );
}

#[tokio::test]
async fn cancelled_before_send_yields_cancellation() {
    let base = spawn_server().await;
    let transport = RemoteTransport::new(base.join("api/chat").unwrap(), &BTreeMap::new()).unwrap();
    let token = CancellationToken::new();
    token.cancel();

    let events: Vec<DeltaEvent> = transport.submit(request(), token).collect().await;
    assert_eq!(events, vec![DeltaEvent::error(StreamError::Cancelled)]);
}
