//! Fixed-window rate limiting in front of a route.

use axum::body::Body;
use axum::extract::State;
use axum::http::{HeaderName, HeaderValue, Request};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use std::sync::Arc;

use crate::http::error::ApiError;
use crate::http::middleware::peer_ip;
use crate::observability::metrics;
use crate::security::{ClientIdentity, QuotaReport, RateLimitScope, RateLimiters};

/// Middleware state: the shared limiters plus the scope of this route.
#[derive(Debug, Clone)]
pub struct ScopedRateLimit {
    pub limiters: Arc<RateLimiters>,
    pub scope: RateLimitScope,
}

/// Count the request against the global and route limiters.
///
/// Successful responses carry the remaining quota of both.
pub async fn rate_limit_middleware(
    State(state): State<ScopedRateLimit>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let client = ClientIdentity::for_rate_limit(request.headers(), peer_ip(&request));

    match state.limiters.check(&client, state.scope) {
        Ok(report) => {
            let mut response = next.run(request).await;
            if response.status().is_success() {
                insert_quota_headers(&mut response, &report);
            }
            response
        }
        Err(rejection) => {
            tracing::warn!(
                client = %client,
                scope = %rejection.scope,
                retry_after_secs = rejection.retry_after_secs,
                "Rate limit exceeded"
            );
            metrics::record_rate_limited(rejection.scope.as_str());
            ApiError::from(rejection).into_response()
        }
    }
}

fn insert_quota_headers(response: &mut Response, report: &QuotaReport) {
    let headers = response.headers_mut();
    headers.insert(
        HeaderName::from_static(RateLimitScope::Global.remaining_header()),
        HeaderValue::from(report.global_remaining),
    );
    headers.insert(
        HeaderName::from_static(report.endpoint.remaining_header()),
        HeaderValue::from(report.endpoint_remaining),
    );
}
