//! Shared utilities for integration tests.
#![allow(dead_code)]

use axum::body::Body;
use axum::extract::State;
use axum::http::{header, HeaderMap, Request};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use futures_util::future::BoxFuture;
use futures_util::stream::{self, StreamExt};
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use tokio::net::TcpListener;

use nutri_gateway::config::GatewayConfig;
use nutri_gateway::llm::{CompletionProvider, CompletionRequest, LlmError, TextStream};
use nutri_gateway::security::ManualClock;
use nutri_gateway::HttpServer;

pub fn t0() -> DateTime<Utc> {
    DateTime::from_timestamp(1_700_000_000, 0).unwrap()
}

/// Provider replaying fixed chunks and recording what it was asked.
#[derive(Debug, Default)]
pub struct ScriptedProvider {
    chunks: Vec<String>,
    fail_after_chunks: bool,
    reject: bool,
    stall: bool,
    requests: Mutex<Vec<CompletionRequest>>,
}

impl ScriptedProvider {
    pub fn replying(chunks: &[&str]) -> Arc<Self> {
        Arc::new(Self {
            chunks: chunks.iter().map(|c| c.to_string()).collect(),
            ..Default::default()
        })
    }

    /// Emits `chunks`, then fails mid-stream.
    pub fn failing_after(chunks: &[&str]) -> Arc<Self> {
        Arc::new(Self {
            chunks: chunks.iter().map(|c| c.to_string()).collect(),
            fail_after_chunks: true,
            ..Default::default()
        })
    }

    /// Refuses before streaming anything.
    pub fn rejecting() -> Arc<Self> {
        Arc::new(Self {
            reject: true,
            ..Default::default()
        })
    }

    /// Accepts the call, then never yields a chunk.
    pub fn stalling() -> Arc<Self> {
        Arc::new(Self {
            stall: true,
            ..Default::default()
        })
    }

    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

impl CompletionProvider for ScriptedProvider {
    fn stream_completion(&self, request: CompletionRequest) -> BoxFuture<'_, Result<TextStream, LlmError>> {
        Box::pin(async move {
            self.requests.lock().unwrap().push(request);
            if self.reject {
                return Err(LlmError::Status {
                    status: 503,
                    body: "overloaded".into(),
                });
            }

            if self.stall {
                return Ok(stream::pending::<Result<String, LlmError>>().boxed());
            }

            let mut items: Vec<Result<String, LlmError>> = self.chunks.iter().cloned().map(Ok).collect();
            if self.fail_after_chunks {
                items.push(Err(LlmError::Decode("connection reset".into())));
            }
            Ok(stream::iter(items).boxed())
        })
    }
}

/// Defaults with the limiter windows untouched.
pub fn test_config() -> GatewayConfig {
    GatewayConfig::default()
}

/// Router over `provider` with a manual clock pinned to [`t0`].
pub fn router(config: GatewayConfig, provider: Arc<ScriptedProvider>) -> (Router, ManualClock) {
    let clock = ManualClock::new(t0());
    let server = HttpServer::with_provider(config, provider, Arc::new(clock.clone())).unwrap();
    (server.router(), clock)
}

pub fn profile() -> Value {
    json!({
        "gender": "female",
        "age": "31",
        "height": "165",
        "heightUnit": "cm",
        "weight": "58",
        "weightUnit": "kg",
        "fitnessObjective": "longevity",
        "trainingFrequency": "3"
    })
}

pub fn payload(content: &str) -> Value {
    json!({
        "messages": [{ "role": "user", "content": content }],
        "user": profile(),
    })
}

/// JSON POST from `ip` with a fixed user agent.
pub fn post_json(path: &str, ip: &str, body: &Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(path)
        .header(header::CONTENT_TYPE, "application/json")
        .header(header::USER_AGENT, "integration-test")
        .header("x-forwarded-for", ip)
        .body(Body::from(serde_json::to_vec(body).unwrap()))
        .unwrap()
}

pub async fn body_text(response: Response) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

pub async fn body_json(response: Response) -> Value {
    serde_json::from_str(&body_text(response).await).unwrap()
}

/// What the mock OpenAI endpoint saw.
#[derive(Debug, Default, Clone)]
pub struct Captured {
    pub authorization: Option<String>,
    pub body: Option<Value>,
}

#[derive(Clone)]
struct MockOpenAi {
    events: Arc<Vec<String>>,
    captured: Arc<Mutex<Captured>>,
}

async fn mock_completions(
    State(mock): State<MockOpenAi>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    {
        let mut captured = mock.captured.lock().unwrap();
        captured.authorization = headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned);
        captured.body = Some(body);
    }

    let mut sse = String::new();
    for event in mock.events.iter() {
        sse.push_str("data: ");
        sse.push_str(event);
        sse.push_str("\n\n");
    }
    sse.push_str("data: [DONE]\n\n");

    ([(header::CONTENT_TYPE, "text/event-stream")], sse).into_response()
}

/// Start an OpenAI-compatible `/v1/chat/completions` that streams one delta
/// per entry of `deltas`. Returns the base URL and the capture handle.
pub async fn start_mock_openai(deltas: &[&str]) -> (String, Arc<Mutex<Captured>>) {
    let events = deltas
        .iter()
        .map(|d| json!({ "choices": [{ "index": 0, "delta": { "content": d } }] }).to_string())
        .collect();
    let captured = Arc::new(Mutex::new(Captured::default()));
    let mock = MockOpenAi {
        events: Arc::new(events),
        captured: captured.clone(),
    };

    let app = Router::new()
        .route("/v1/chat/completions", post(mock_completions))
        .with_state(mock);
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr: SocketAddr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (format!("http://{addr}/v1"), captured)
}
