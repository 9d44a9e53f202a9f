//! Per-route middleware.
//!
//! Stacked on each AI-backed route, outermost first:
//! ```text
//! track_request → rate_limit (global, then endpoint) → security → handler
//! ```
//! The rate limit and security layers are only installed when their feature
//! flag is on.

pub mod metrics;
pub mod rate_limit;
pub mod security;

pub use self::metrics::track_request;
pub use rate_limit::{rate_limit_middleware, ScopedRateLimit};
pub use security::security_middleware;

use axum::extract::ConnectInfo;
use axum::http::Request;
use std::net::{IpAddr, SocketAddr};

/// Socket peer address, when the server was started with connect info.
pub(crate) fn peer_ip<B>(request: &Request<B>) -> Option<IpAddr> {
    request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip())
}
