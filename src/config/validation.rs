//! Configuration validation.
//!
//! Semantic checks on top of what serde already enforces. Validation is a
//! pure function `GatewayConfig -> Result<(), Vec<ValidationError>>` and
//! reports every problem found rather than the first one.

use std::net::SocketAddr;
use thiserror::Error;

use crate::config::schema::{GatewayConfig, WindowConfig};
use crate::security::patterns::PatternPolicy;

/// A single semantic problem with a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("{field}: must be greater than zero")]
    Zero { field: &'static str },

    #[error("{field}: invalid socket address '{value}'")]
    Address { field: &'static str, value: String },

    #[error("provider.base_url: invalid URL '{0}'")]
    BaseUrl(String),

    #[error("observability.log_format: expected 'pretty' or 'json', got '{0}'")]
    LogFormat(String),

    #[error("security.patterns: {0}")]
    Pattern(String),
}

/// Validate a fully-assembled configuration.
pub fn validate_config(config: &GatewayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    check_address(&mut errors, "listener.bind_address", &config.listener.bind_address);

    check_window(&mut errors, "rate_limits.chat.window_ms", &config.rate_limits.chat);
    check_window(&mut errors, "rate_limits.nutrition.window_ms", &config.rate_limits.nutrition);
    check_window(&mut errors, "rate_limits.global.window_ms", &config.rate_limits.global);
    check_nonzero(&mut errors, "rate_limits.sweep_interval_secs", config.rate_limits.sweep_interval_secs);

    let security = &config.security;
    check_nonzero(&mut errors, "security.max_request_size", security.max_request_size as u64);
    check_nonzero(&mut errors, "security.max_message_length", security.max_message_length as u64);
    check_nonzero(&mut errors, "security.max_messages", security.max_messages as u64);
    check_nonzero(&mut errors, "security.suspicious_ttl_secs", security.suspicious_ttl_secs);
    if let Some(patterns) = &security.patterns {
        if let Err(e) = PatternPolicy::from_patterns("custom", patterns) {
            errors.push(ValidationError::Pattern(e.to_string()));
        }
    }

    if url::Url::parse(&config.provider.base_url).is_err() {
        errors.push(ValidationError::BaseUrl(config.provider.base_url.clone()));
    }
    check_nonzero(&mut errors, "provider.request_timeout_secs", config.provider.request_timeout_secs);
    check_nonzero(&mut errors, "timeouts.request_secs", config.timeouts.request_secs);

    let observability = &config.observability;
    if !matches!(observability.log_format.as_str(), "pretty" | "json") {
        errors.push(ValidationError::LogFormat(observability.log_format.clone()));
    }
    if observability.metrics_enabled {
        check_address(&mut errors, "observability.metrics_address", &observability.metrics_address);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

// max_requests = 0 is accepted on purpose: the limiter still admits the first
// request of each window.
fn check_window(errors: &mut Vec<ValidationError>, field: &'static str, window: &WindowConfig) {
    check_nonzero(errors, field, window.window_ms);
}

fn check_nonzero(errors: &mut Vec<ValidationError>, field: &'static str, value: u64) {
    if value == 0 {
        errors.push(ValidationError::Zero { field });
    }
}

fn check_address(errors: &mut Vec<ValidationError>, field: &'static str, value: &str) {
    if value.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::Address {
            field,
            value: value.to_string(),
        });
    }
}
