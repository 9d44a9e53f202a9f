//! `GET /health`.

use axum::extract::State;
use axum::Json;
use chrono::SecondsFormat;
use serde_json::{json, Value};

use crate::http::server::AppState;

pub async fn health(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "timestamp": state.clock.now().to_rfc3339_opts(SecondsFormat::Millis, true),
    }))
}
