//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, request ID, timeout, optional trace span)
//!     → middleware/ (metrics, rate limits, security filter)
//!     → handlers/ (decode payload, validate profile, call the provider)
//!     → error.rs (map failures to JSON responses)
//!     → Send to client (streamed for chat)
//! ```

pub mod error;
pub mod handlers;
pub mod middleware;
pub mod request;
pub mod server;

pub use error::ApiError;
pub use request::{UuidRequestId, X_REQUEST_ID};
pub use server::{build_router, AppState, HttpServer, ServerError};
