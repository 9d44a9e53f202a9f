//! Configuration loading from disk and environment.
//!
//! The TOML file is optional. Environment variables are applied on top of it
//! and win over file values.

use std::fmt;
use std::fs;
use std::path::Path;
use std::str::FromStr;
use thiserror::Error;

use crate::config::schema::GatewayConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid value '{value}' for environment variable {name}")]
    Env { name: &'static str, value: String },

    #[error("Validation failed: {}", ValidationErrors(.0))]
    Validation(Vec<ValidationError>),
}

struct ValidationErrors<'a>(&'a [ValidationError]);

impl fmt::Display for ValidationErrors<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, err) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", err)?;
        }
        Ok(())
    }
}

/// Load configuration from an optional TOML file, apply the process
/// environment, and validate the result.
pub fn load_config(path: Option<&Path>) -> Result<GatewayConfig, ConfigError> {
    match path {
        Some(path) => load_config_str(&fs::read_to_string(path)?),
        None => finish(GatewayConfig::default()),
    }
}

/// [`load_config`] for TOML text that is already in memory.
pub fn load_config_str(content: &str) -> Result<GatewayConfig, ConfigError> {
    finish(toml::from_str(content)?)
}

fn finish(mut config: GatewayConfig) -> Result<GatewayConfig, ConfigError> {
    apply_env_overrides(&mut config, |name| std::env::var(name).ok())?;
    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

/// Overlay environment values onto `config`.
///
/// Environment variables:
/// - `CHAT_RATE_WINDOW_MS`, `CHAT_MAX_REQUESTS`
/// - `NUTRITION_RATE_WINDOW_MS`, `NUTRITION_MAX_REQUESTS`
/// - `GLOBAL_RATE_WINDOW_MS`, `GLOBAL_MAX_REQUESTS`
/// - `MAX_REQUEST_SIZE`, `MAX_MESSAGE_LENGTH`, `MAX_MESSAGES`,
///   `MAX_SUSPICIOUS_ATTEMPTS`
/// - `ENABLE_RATE_LIMITING`, `ENABLE_SECURITY_MIDDLEWARE` (on unless "false")
/// - `ENABLE_REQUEST_LOGGING` (off unless "true")
/// - `BIND_ADDRESS`, `OPENAI_API_KEY`, `OPENAI_BASE_URL`, `OPENAI_MODEL`
///
/// `lookup` abstracts `std::env::var` so tests do not touch process state.
pub fn apply_env_overrides<F>(config: &mut GatewayConfig, lookup: F) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let limits = &mut config.rate_limits;
    override_parsed(&lookup, "CHAT_RATE_WINDOW_MS", &mut limits.chat.window_ms)?;
    override_parsed(&lookup, "CHAT_MAX_REQUESTS", &mut limits.chat.max_requests)?;
    override_parsed(&lookup, "NUTRITION_RATE_WINDOW_MS", &mut limits.nutrition.window_ms)?;
    override_parsed(&lookup, "NUTRITION_MAX_REQUESTS", &mut limits.nutrition.max_requests)?;
    override_parsed(&lookup, "GLOBAL_RATE_WINDOW_MS", &mut limits.global.window_ms)?;
    override_parsed(&lookup, "GLOBAL_MAX_REQUESTS", &mut limits.global.max_requests)?;

    let security = &mut config.security;
    override_parsed(&lookup, "MAX_REQUEST_SIZE", &mut security.max_request_size)?;
    override_parsed(&lookup, "MAX_MESSAGE_LENGTH", &mut security.max_message_length)?;
    override_parsed(&lookup, "MAX_MESSAGES", &mut security.max_messages)?;
    override_parsed(&lookup, "MAX_SUSPICIOUS_ATTEMPTS", &mut security.max_suspicious_attempts)?;

    let features = &mut config.features;
    if let Some(val) = lookup("ENABLE_RATE_LIMITING") {
        features.enable_rate_limiting = val != "false";
    }
    if let Some(val) = lookup("ENABLE_SECURITY_MIDDLEWARE") {
        features.enable_security_filter = val != "false";
    }
    if let Some(val) = lookup("ENABLE_REQUEST_LOGGING") {
        features.enable_request_logging = val == "true";
    }

    if let Some(val) = lookup("BIND_ADDRESS") {
        config.listener.bind_address = val;
    }
    if let Some(val) = lookup("OPENAI_API_KEY") {
        config.provider.api_key = val;
    }
    if let Some(val) = lookup("OPENAI_BASE_URL") {
        config.provider.base_url = val;
    }
    if let Some(val) = lookup("OPENAI_MODEL") {
        config.provider.model = val;
    }

    Ok(())
}

fn override_parsed<F, T>(lookup: &F, name: &'static str, target: &mut T) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    if let Some(value) = lookup(name) {
        *target = value
            .trim()
            .parse()
            .map_err(|_| ConfigError::Env { name, value })?;
    }
    Ok(())
}
