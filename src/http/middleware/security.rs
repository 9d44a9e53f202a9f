//! Heuristic security filter in front of a route.

use axum::body::Body;
use axum::extract::State;
use axum::http::Request;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use std::sync::Arc;

use crate::http::error::ApiError;
use crate::http::middleware::peer_ip;
use crate::http::request::request_id;
use crate::observability::metrics;
use crate::security::{ClientIdentity, SecurityFilter};

/// Validate the request and hand the handler a re-buffered body.
pub async fn security_middleware(
    State(filter): State<Arc<SecurityFilter>>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let client = ClientIdentity::for_filter(request.headers(), peer_ip(&request));
    let request_id = request_id(&request).to_owned();

    match filter.validate_request(request, &client).await {
        Ok(validated) => next.run(validated.into_request()).await,
        Err(violation) => {
            tracing::warn!(
                request_id = %request_id,
                client = %violation.client,
                reason = %violation.reason,
                rule = violation.rule.as_deref().unwrap_or("-"),
                "Request blocked by security filter"
            );
            metrics::record_security_violation(violation.reason.label());
            ApiError::from(violation).into_response()
        }
    }
}
