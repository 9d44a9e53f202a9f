//! OpenAI-compatible chat completions over server-sent events.

use axum::body::Bytes;
use futures_util::future::BoxFuture;
use futures_util::stream::{self, BoxStream};
use futures_util::StreamExt;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::time::Duration;

use crate::config::ProviderConfig;
use crate::llm::{ChatMessage, CompletionProvider, CompletionRequest, LlmError, Role, TextStream};

/// Longest upstream error body kept for logging.
const MAX_ERROR_BODY: usize = 512;

/// Client for `POST {base_url}/chat/completions` with `stream: true`.
#[derive(Debug, Clone)]
pub struct OpenAiProvider {
    client: reqwest::Client,
    endpoint: String,
    model: String,
    api_key: String,
}

impl OpenAiProvider {
    pub fn new(config: &ProviderConfig) -> Result<Self, LlmError> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;

        Ok(Self {
            client,
            endpoint: format!("{}/chat/completions", config.base_url.trim_end_matches('/')),
            model: config.model.clone(),
            api_key: config.api_key.clone(),
        })
    }

    async fn start(&self, request: CompletionRequest) -> Result<TextStream, LlmError> {
        if self.api_key.is_empty() {
            return Err(LlmError::NotConfigured("missing API key"));
        }

        let mut messages = Vec::with_capacity(request.messages.len() + 1);
        messages.push(WireMessage {
            role: Role::System,
            content: &request.system,
        });
        messages.extend(request.messages.iter().map(WireMessage::from));

        let body = WireRequest {
            model: &self.model,
            stream: true,
            messages,
        };

        tracing::debug!(model = %self.model, turns = request.messages.len(), "Starting completion");

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let mut body = response.text().await.unwrap_or_default();
            truncate_chars(&mut body, MAX_ERROR_BODY);
            return Err(LlmError::Status {
                status: status.as_u16(),
                body,
            });
        }

        Ok(text_stream(response.bytes_stream().boxed()))
    }
}

impl CompletionProvider for OpenAiProvider {
    fn stream_completion(&self, request: CompletionRequest) -> BoxFuture<'_, Result<TextStream, LlmError>> {
        Box::pin(self.start(request))
    }
}

#[derive(Serialize)]
struct WireRequest<'a> {
    model: &'a str,
    stream: bool,
    messages: Vec<WireMessage<'a>>,
}

#[derive(Serialize)]
struct WireMessage<'a> {
    role: Role,
    content: &'a str,
}

impl<'a> From<&'a ChatMessage> for WireMessage<'a> {
    fn from(message: &'a ChatMessage) -> Self {
        Self {
            role: message.role,
            content: &message.content,
        }
    }
}

#[derive(Deserialize)]
struct ChunkEnvelope {
    #[serde(default)]
    choices: Vec<ChunkChoice>,
}

#[derive(Deserialize)]
struct ChunkChoice {
    #[serde(default)]
    delta: ChunkDelta,
}

#[derive(Deserialize, Default)]
struct ChunkDelta {
    content: Option<String>,
}

#[derive(Debug, PartialEq, Eq)]
enum SseEvent {
    Data(String),
    Done,
}

/// Splits a byte stream into `data:` payloads. Bytes are buffered until a
/// full line arrives, so multi-byte characters split across chunks survive.
#[derive(Debug, Default)]
struct SseDecoder {
    buffer: Vec<u8>,
}

impl SseDecoder {
    fn push(&mut self, chunk: &[u8]) -> Vec<SseEvent> {
        self.buffer.extend_from_slice(chunk);

        let mut events = Vec::new();
        while let Some(pos) = self.buffer.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=pos).collect();
            if let Some(event) = parse_line(&line) {
                events.push(event);
            }
        }
        events
    }

    /// Flush an unterminated final line.
    fn finish(&mut self) -> Option<SseEvent> {
        let line = std::mem::take(&mut self.buffer);
        parse_line(&line)
    }
}

fn parse_line(line: &[u8]) -> Option<SseEvent> {
    let line = String::from_utf8_lossy(line);
    let line = line.trim_end_matches(['\r', '\n']);
    let data = line.strip_prefix("data:")?;
    let data = data.strip_prefix(' ').unwrap_or(data);

    if data == "[DONE]" {
        Some(SseEvent::Done)
    } else if data.is_empty() {
        None
    } else {
        Some(SseEvent::Data(data.to_string()))
    }
}

struct StreamState {
    body: BoxStream<'static, reqwest::Result<Bytes>>,
    decoder: SseDecoder,
    pending: VecDeque<Result<String, LlmError>>,
    finished: bool,
}

impl StreamState {
    fn absorb(&mut self, events: Vec<SseEvent>) {
        for event in events {
            if self.finished {
                break;
            }
            match event {
                SseEvent::Done => self.finished = true,
                SseEvent::Data(payload) => match serde_json::from_str::<ChunkEnvelope>(&payload) {
                    Ok(envelope) => {
                        let text = envelope
                            .choices
                            .into_iter()
                            .next()
                            .and_then(|choice| choice.delta.content)
                            .filter(|text| !text.is_empty());
                        if let Some(text) = text {
                            self.pending.push_back(Ok(text));
                        }
                    }
                    Err(e) => {
                        self.pending.push_back(Err(LlmError::Decode(e.to_string())));
                        self.finished = true;
                    }
                },
            }
        }
    }
}

fn text_stream(body: BoxStream<'static, reqwest::Result<Bytes>>) -> TextStream {
    let state = StreamState {
        body,
        decoder: SseDecoder::default(),
        pending: VecDeque::new(),
        finished: false,
    };

    stream::unfold(state, |mut state| async move {
        loop {
            if let Some(item) = state.pending.pop_front() {
                return Some((item, state));
            }
            if state.finished {
                return None;
            }
            match state.body.next().await {
                Some(Ok(bytes)) => {
                    let events = state.decoder.push(&bytes);
                    state.absorb(events);
                }
                Some(Err(e)) => {
                    state.pending.push_back(Err(LlmError::Http(e)));
                    state.finished = true;
                }
                None => {
                    let tail = state.decoder.finish();
                    state.absorb(tail.into_iter().collect());
                    state.finished = true;
                }
            }
        }
    })
    .boxed()
}

fn truncate_chars(text: &mut String, max: usize) {
    if let Some((idx, _)) = text.char_indices().nth(max) {
        text.truncate(idx);
    }
}
