//! Nutrition API gateway.
//!
//! An HTTP backend for a nutrition chat and meal-analysis application. Every
//! AI-backed route sits behind a fixed-window rate limiter and a heuristic
//! security filter before its prompt reaches the model.
//!
//! # Architecture Overview
//!
//! ```text
//!   Client ──▶ request id ──▶ global limit ──▶ route limit ──▶ security filter
//!                                                                   │
//!                                                                   ▼
//!   Client ◀── data stream / JSON ◀── completion provider ◀── payload + profile
//!
//!   Cross-cutting: config (file + env + hot reload), observability
//!   (tracing, metrics), lifecycle (signals, shutdown), store sweeper
//! ```

// Core subsystems
pub mod config;
pub mod http;
pub mod llm;
pub mod nutrition;

// Cross-cutting concerns
pub mod lifecycle;
pub mod observability;
pub mod security;

pub use config::schema::GatewayConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
