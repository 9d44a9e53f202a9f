//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → logging.rs (structured log events via `tracing`)
//!     → metrics.rs (counters, gauges, histograms via the `metrics` facade)
//!
//! Consumers:
//!     → stdout (pretty for development, JSON for aggregation)
//!     → Prometheus scrape endpoint (when enabled)
//! ```
//!
//! # Design Decisions
//! - Request ID flows through the request span, so every log line of a
//!   request carries it
//! - Recording a metric without an installed exporter is a no-op, so tests
//!   and disabled deployments pay nothing

pub mod logging;
pub mod metrics;
