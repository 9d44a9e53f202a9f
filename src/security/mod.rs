//! Request protection subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request to a model route:
//!     → identity.rs (derive caller fingerprint from proxy headers)
//!     → rate_limit.rs (global window, then endpoint window)
//!     → filter.rs (size, content type, throttle, patterns, structure)
//!     → Pass to handler with the body already buffered
//!
//! Background:
//!     sweeper.rs evicts expired windows and suspicion records
//! ```
//!
//! # Design Decisions
//! - Fail closed: reject on any filter check failure
//! - State lives in injectable stores (store.rs), never in globals
//! - Time comes from a Clock port so windows are testable without sleeping
//! - Pattern lists are data (patterns.rs), swappable at runtime

pub mod clock;
pub mod filter;
pub mod identity;
pub mod patterns;
pub mod rate_limit;
pub mod store;
pub mod sweeper;

pub use clock::{Clock, ManualClock, SystemClock};
pub use filter::{SecurityFilter, SecuritySettings, SecurityViolation, ValidatedRequest, ViolationReason};
pub use identity::ClientIdentity;
pub use patterns::PatternPolicy;
pub use rate_limit::{
    FixedWindowLimiter, QuotaReport, RateLimitDecision, RateLimitRejection, RateLimitScope, RateLimiters,
};
pub use store::{MemoryRateStore, MemorySuspicionStore, RateStore, RateWindow, SuspicionRecord, SuspicionStore};
pub use sweeper::Sweeper;
