//! `POST /api/chat`: streamed nutritionist conversation.
//!
//! The body uses the data-stream line protocol understood by the web client:
//! one `0:<json string>\n` frame per text chunk, and a single
//! `3:<json string>\n` frame if the upstream fails mid-stream.

use axum::body::{Body, Bytes};
use axum::extract::State;
use axum::http::{header, HeaderName, HeaderValue};
use axum::response::Response;
use futures_util::stream::{Stream, StreamExt};
use std::convert::Infallible;
use std::future;

use crate::http::error::ApiError;
use crate::http::handlers::AiPayload;
use crate::http::server::AppState;
use crate::llm::{CompletionRequest, TextStream};
use crate::nutrition::chat_system_prompt;
use crate::observability::metrics;

const DATA_STREAM_HEADER: HeaderName = HeaderName::from_static("x-vercel-ai-data-stream");

/// Client-facing text of a mid-stream failure.
const STREAM_ERROR_MESSAGE: &str = "An error occurred.";

pub async fn chat(State(state): State<AppState>, body: Bytes) -> Result<Response, ApiError> {
    let payload = AiPayload::decode(&body)?;

    let request = CompletionRequest {
        system: chat_system_prompt(&payload.user),
        messages: payload.messages,
    };
    let stream = state.provider.stream_completion(request).await?;

    let mut response = Response::new(Body::from_stream(data_stream(stream)));
    let headers = response.headers_mut();
    headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("text/plain; charset=utf-8"));
    headers.insert(DATA_STREAM_HEADER, HeaderValue::from_static("v1"));
    Ok(response)
}

/// Frame text chunks; the first upstream error becomes an error frame and
/// ends the body.
fn data_stream(stream: TextStream) -> impl Stream<Item = Result<Bytes, Infallible>> + Send + 'static {
    stream.scan(false, |failed, item| {
        if *failed {
            return future::ready(None);
        }
        let frame = match item {
            Ok(text) => frame('0', &text),
            Err(e) => {
                *failed = true;
                tracing::error!(error = %e, "Completion stream failed");
                metrics::record_upstream_error();
                frame('3', STREAM_ERROR_MESSAGE)
            }
        };
        future::ready(Some(Ok(frame)))
    })
}

fn frame(code: char, text: &str) -> Bytes {
    let escaped = serde_json::to_string(text).unwrap_or_default();
    Bytes::from(format!("{code}:{escaped}\n"))
}
