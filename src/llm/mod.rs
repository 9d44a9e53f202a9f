//! Streaming language-model collaborator.
//!
//! Route handlers only see [`CompletionProvider`]; which vendor sits behind it
//! is a startup decision.
//!
//! # Data Flow
//! ```text
//! handler builds CompletionRequest (system prompt + history)
//!     → CompletionProvider::stream_completion
//!     → TextStream (incremental text chunks)
//!     → streamed to the client, or collected for JSON responses
//! ```
//!
//! Dropping a [`TextStream`] drops the upstream response, so a client that
//! disconnects stops token consumption.

pub mod openai;

use futures_util::future::BoxFuture;
use futures_util::stream::BoxStream;
use futures_util::StreamExt;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use openai::OpenAiProvider;

/// Speaker of a conversation turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// One conversation turn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
}

/// Input to a completion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletionRequest {
    pub system: String,
    pub messages: Vec<ChatMessage>,
}

/// Errors raised by a completion provider.
#[derive(Debug, Error)]
pub enum LlmError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Upstream returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Failed to decode upstream payload: {0}")]
    Decode(String),

    #[error("Provider not configured: {0}")]
    NotConfigured(&'static str),
}

/// Incrementally produced completion text.
pub type TextStream = BoxStream<'static, Result<String, LlmError>>;

/// A streaming text-completion backend.
pub trait CompletionProvider: Send + Sync {
    /// Start a completion. Resolves once the upstream accepted the request;
    /// text then arrives through the returned stream.
    fn stream_completion(&self, request: CompletionRequest) -> BoxFuture<'_, Result<TextStream, LlmError>>;
}

/// Drain a stream into a single string.
pub async fn collect_text(mut stream: TextStream) -> Result<String, LlmError> {
    let mut text = String::new();
    while let Some(chunk) = stream.next().await {
        text.push_str(&chunk?);
    }
    Ok(text)
}
