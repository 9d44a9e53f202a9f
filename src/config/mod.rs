//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! optional config file (TOML)
//!     → loader.rs (parse & deserialize, overlay environment variables)
//!     → validation.rs (semantic checks)
//!     → GatewayConfig (validated, immutable)
//!     → shared via AppState to all subsystems
//!
//! On file change:
//!     watcher.rs detects change (partial writes skipped)
//!     → loader.rs loads new config
//!     → validation.rs validates
//!     → SecuritySettings built and sent to the server
//!     → security filter settings swapped atomically
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; only the security filter settings are
//!   hot-swappable
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;
pub mod watcher;

pub use loader::{load_config, load_config_str, ConfigError};
pub use watcher::{reload_security_settings, ConfigWatcher, ReloadError};
pub use schema::{
    FeatureFlags, GatewayConfig, ListenerConfig, ObservabilityConfig, ProviderConfig,
    RateLimitsConfig, SecurityConfig, TimeoutConfig, WindowConfig,
};
