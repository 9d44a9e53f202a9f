//! `POST /api/nutrition-analysis`: structured meal breakdown.

use axum::body::Bytes;
use axum::extract::State;
use axum::Json;

use crate::http::error::ApiError;
use crate::http::handlers::AiPayload;
use crate::http::server::AppState;
use crate::llm::{collect_text, CompletionRequest, LlmError};
use crate::nutrition::{analysis_system_prompt, parse_analysis, NutritionAnalysis};

pub async fn nutrition_analysis(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<NutritionAnalysis>, ApiError> {
    let payload = AiPayload::decode(&body)?;

    let request = CompletionRequest {
        system: analysis_system_prompt(&payload.user),
        messages: payload.messages,
    };
    let stream = state.provider.stream_completion(request).await?;
    let text = collect_text(stream).await?;

    let analysis = parse_analysis(&text).map_err(|e| {
        tracing::debug!(output_chars = text.chars().count(), "Model output is not an analysis object");
        LlmError::Decode(e.to_string())
    })?;

    if let Some(reason) = &analysis.error {
        tracing::info!(reason = %reason, "Model declined to analyze input");
    }

    Ok(Json(analysis))
}
