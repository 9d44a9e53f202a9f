//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the gateway.
//! All types derive Serde traits for deserialization from config files, and
//! every section carries defaults so an empty file (or no file) is valid.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Root configuration for the gateway.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct GatewayConfig {
    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// Per-scope rate limit windows.
    pub rate_limits: RateLimitsConfig,

    /// Security filter ceilings and pattern policy.
    pub security: SecurityConfig,

    /// Feature toggles for the protective layers.
    pub features: FeatureFlags,

    /// Language model provider settings.
    pub provider: ProviderConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:3000").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:3000".to_string(),
        }
    }
}

/// A single fixed-window limit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub struct WindowConfig {
    /// Window length in milliseconds.
    pub window_ms: u64,

    /// Requests allowed per identity per window.
    pub max_requests: u32,
}

impl WindowConfig {
    pub fn window(&self) -> Duration {
        Duration::from_millis(self.window_ms)
    }
}

/// Rate limiting configuration for every scope.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RateLimitsConfig {
    /// Chat endpoint limit.
    pub chat: WindowConfig,

    /// Nutrition analysis endpoint limit.
    pub nutrition: WindowConfig,

    /// Limit applied across all AI-backed endpoints.
    pub global: WindowConfig,

    /// Interval between expired-entry sweeps, in seconds.
    pub sweep_interval_secs: u64,
}

impl Default for RateLimitsConfig {
    fn default() -> Self {
        Self {
            chat: WindowConfig {
                window_ms: 60_000,
                max_requests: 20,
            },
            nutrition: WindowConfig {
                window_ms: 60_000,
                max_requests: 10,
            },
            global: WindowConfig {
                window_ms: 300_000,
                max_requests: 100,
            },
            sweep_interval_secs: 300,
        }
    }
}

/// Security filter configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SecurityConfig {
    /// Maximum request body size in bytes.
    pub max_request_size: usize,

    /// Maximum characters per message content.
    pub max_message_length: usize,

    /// Maximum messages in a conversation.
    pub max_messages: usize,

    /// Suspicious attempts tolerated before an identity is blocked.
    pub max_suspicious_attempts: u32,

    /// How long a suspicious-attempt record lives after its last increment.
    pub suspicious_ttl_secs: u64,

    /// Custom pattern list replacing the built-in prompt-injection policy.
    pub patterns: Option<Vec<String>>,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            max_request_size: 50 * 1024,
            max_message_length: 2000,
            max_messages: 50,
            max_suspicious_attempts: 3,
            suspicious_ttl_secs: 3600,
            patterns: None,
        }
    }
}

/// Feature flags.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct FeatureFlags {
    pub enable_rate_limiting: bool,
    pub enable_security_filter: bool,
    /// Attach the HTTP trace layer.
    pub enable_request_logging: bool,
}

impl Default for FeatureFlags {
    fn default() -> Self {
        Self {
            enable_rate_limiting: true,
            enable_security_filter: true,
            enable_request_logging: false,
        }
    }
}

/// Language model provider configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ProviderConfig {
    /// Base URL of an OpenAI-compatible API.
    pub base_url: String,

    /// Model identifier.
    pub model: String,

    /// API key. Only ever read from the environment or the config file.
    #[serde(skip_serializing)]
    pub api_key: String,

    /// Upstream request timeout in seconds.
    pub request_timeout_secs: u64,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com/v1".to_string(),
            model: "gpt-4o".to_string(),
            api_key: String::new(),
            request_timeout_secs: 60,
        }
    }
}

/// Timeout configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Total time allowed for a request/response exchange, in seconds.
    pub request_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self { request_secs: 60 }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Log output format: "pretty" or "json".
    pub log_format: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: "pretty".to_string(),
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}
