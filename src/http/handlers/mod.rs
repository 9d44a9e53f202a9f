//! Route handlers.

pub mod analysis;
pub mod chat;
pub mod health;

use axum::body::Bytes;
use serde::Deserialize;

use crate::http::error::ApiError;
use crate::llm::ChatMessage;
use crate::nutrition::UserProfile;

/// Body shared by both AI-backed routes.
#[derive(Debug, Deserialize)]
pub struct AiPayload {
    pub messages: Vec<ChatMessage>,
    /// Required; individual fields inside it may still be blank.
    pub user: UserProfile,
}

impl AiPayload {
    /// Decode and validate the profile.
    pub fn decode(body: &Bytes) -> Result<Self, ApiError> {
        let payload: AiPayload = serde_json::from_slice(body)?;
        payload.user.validate()?;
        Ok(payload)
    }
}
