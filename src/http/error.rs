//! Route-boundary errors and their HTTP mapping.
//!
//! Bodies are fixed strings: the client never learns which security check
//! fired or what the upstream said.

use axum::http::{HeaderName, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::SecondsFormat;
use serde_json::json;
use thiserror::Error;

use crate::llm::LlmError;
use crate::nutrition::ProfileErrors;
use crate::security::{RateLimitRejection, SecurityViolation};

const X_RATELIMIT_RESET: HeaderName = HeaderName::from_static("x-ratelimit-reset");

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("rate limit exceeded ({} scope)", .0.scope)]
    RateLimited(RateLimitRejection),

    #[error("security violation: {0}")]
    Security(#[from] SecurityViolation),

    #[error(transparent)]
    InvalidProfile(#[from] ProfileErrors),

    #[error("malformed payload: {0}")]
    MalformedPayload(#[from] serde_json::Error),

    #[error("upstream failure: {0}")]
    Upstream(#[from] LlmError),
}

impl From<RateLimitRejection> for ApiError {
    fn from(rejection: RateLimitRejection) -> Self {
        ApiError::RateLimited(rejection)
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::RateLimited(_) => StatusCode::TOO_MANY_REQUESTS,
            ApiError::Security(_) => StatusCode::FORBIDDEN,
            ApiError::InvalidProfile(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::MalformedPayload(_) | ApiError::Upstream(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        match self {
            ApiError::RateLimited(rejection) => {
                let retry_after = rejection.retry_after_secs;
                let body = Json(json!({
                    "error": "Rate limit exceeded",
                    "message": format!("Too many requests. Try again in {retry_after} seconds."),
                    "retryAfter": retry_after,
                }));

                let mut response = (status, body).into_response();
                let headers = response.headers_mut();
                headers.insert(axum::http::header::RETRY_AFTER, HeaderValue::from(retry_after));
                let reset = rejection.reset_time.to_rfc3339_opts(SecondsFormat::Millis, true);
                if let Ok(value) = HeaderValue::from_str(&reset) {
                    headers.insert(X_RATELIMIT_RESET, value);
                }
                response
            }
            ApiError::Security(_) => (
                status,
                Json(json!({
                    "error": "Request blocked",
                    "message": "Your request was blocked for security reasons.",
                    "code": "SECURITY_VIOLATION",
                })),
            )
                .into_response(),
            ApiError::InvalidProfile(errors) => (
                status,
                Json(json!({
                    "error": "Invalid profile",
                    "fields": errors,
                })),
            )
                .into_response(),
            ApiError::MalformedPayload(e) => {
                tracing::warn!(error = %e, "Failed to decode request payload");
                internal_error()
            }
            ApiError::Upstream(e) => {
                tracing::error!(error = %e, "Completion provider failed");
                crate::observability::metrics::record_upstream_error();
                internal_error()
            }
        }
    }
}

fn internal_error() -> Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({ "error": "Internal server error" })),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::security::{ClientIdentity, RateLimitScope, ViolationReason};
    use axum::body::to_bytes;
    use chrono::DateTime;
    use serde_json::Value;

    async fn body_json(response: Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_rate_limited_response() {
        let reset_time = DateTime::from_timestamp_millis(1_700_000_060_250).unwrap();
        let response = ApiError::RateLimited(RateLimitRejection {
            scope: RateLimitScope::Chat,
            reset_time,
            retry_after_secs: 42,
        })
        .into_response();

        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(response.headers()["retry-after"], "42");
        assert_eq!(response.headers()["x-ratelimit-reset"], "2023-11-14T22:14:20.250Z");
        assert_eq!(
            body_json(response).await,
            json!({
                "error": "Rate limit exceeded",
                "message": "Too many requests. Try again in 42 seconds.",
                "retryAfter": 42
            })
        );
    }

    #[tokio::test]
    async fn test_security_response_hides_reason() {
        let response = ApiError::from(SecurityViolation {
            reason: ViolationReason::SuspiciousMessageContent,
            client: ClientIdentity::from("1.1.1.1"),
            rule: Some("jailbreak".into()),
        })
        .into_response();

        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        let body = body_json(response).await;
        assert_eq!(body["code"], "SECURITY_VIOLATION");
        assert!(!body.to_string().contains("jailbreak"));
        assert!(!body.to_string().contains("Suspicious"));
    }

    #[tokio::test]
    async fn test_upstream_failure_is_generic() {
        let response = ApiError::from(LlmError::Status {
            status: 401,
            body: "invalid api key sk-123".into(),
        })
        .into_response();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body_json(response).await, json!({ "error": "Internal server error" }));
    }
}
