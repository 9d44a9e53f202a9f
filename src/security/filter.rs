//! Request-shape and content heuristics in front of the model routes.
//!
//! Checks run in a fixed order and stop at the first failure:
//!
//! 1. declared size
//! 2. content type
//! 3. suspicious-attempt throttle for the caller
//! 4. pattern scan over the raw body
//! 5. JSON parse
//! 6. message count, message length and per-message pattern scan
//!
//! Pattern hits in steps 4 and 6 count against the caller. Once a caller has
//! reached the configured number of hits, step 3 refuses everything from it
//! until the records expire.

use arc_swap::ArcSwap;
use axum::body::{Body, Bytes};
use axum::http::{header, request::Parts, HeaderMap, Request};
use chrono::TimeDelta;
use http_body_util::LengthLimitError;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

use crate::config::SecurityConfig;
use crate::security::clock::Clock;
use crate::security::identity::ClientIdentity;
use crate::security::patterns::PatternPolicy;
use crate::security::store::{MemorySuspicionStore, SuspicionStore};

/// Why a request was refused. The strings are stable and used in logs and
/// metrics; they are never sent to the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ViolationReason {
    RequestTooLarge,
    InvalidContentType,
    TooManySuspiciousAttempts,
    SuspiciousContent,
    InvalidJson,
    TooManyMessages,
    MessageTooLong,
    SuspiciousMessageContent,
    ValidationFailed,
}

impl ViolationReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            ViolationReason::RequestTooLarge => "Request too large",
            ViolationReason::InvalidContentType => "Invalid content type",
            ViolationReason::TooManySuspiciousAttempts => "Too many suspicious attempts",
            ViolationReason::SuspiciousContent => "Suspicious content detected",
            ViolationReason::InvalidJson => "Invalid JSON",
            ViolationReason::TooManyMessages => "Too many messages",
            ViolationReason::MessageTooLong => "Message too long",
            ViolationReason::SuspiciousMessageContent => "Suspicious message content",
            ViolationReason::ValidationFailed => "Failed to validate request",
        }
    }

    /// Metric label.
    pub fn label(&self) -> &'static str {
        match self {
            ViolationReason::RequestTooLarge => "request_too_large",
            ViolationReason::InvalidContentType => "invalid_content_type",
            ViolationReason::TooManySuspiciousAttempts => "too_many_suspicious_attempts",
            ViolationReason::SuspiciousContent => "suspicious_content",
            ViolationReason::InvalidJson => "invalid_json",
            ViolationReason::TooManyMessages => "too_many_messages",
            ViolationReason::MessageTooLong => "message_too_long",
            ViolationReason::SuspiciousMessageContent => "suspicious_message_content",
            ViolationReason::ValidationFailed => "validation_failed",
        }
    }

    /// Whether this reason comes from a pattern hit.
    pub fn is_pattern_match(&self) -> bool {
        matches!(
            self,
            ViolationReason::SuspiciousContent | ViolationReason::SuspiciousMessageContent
        )
    }
}

impl fmt::Display for ViolationReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A refused request.
#[derive(Debug, Clone, Error)]
#[error("{reason}")]
pub struct SecurityViolation {
    pub reason: ViolationReason,
    pub client: ClientIdentity,
    /// Name of the pattern rule that fired, for pattern hits.
    pub rule: Option<String>,
}

/// Hot-swappable filter thresholds and pattern policy.
#[derive(Debug, Clone)]
pub struct SecuritySettings {
    pub max_request_size: usize,
    pub max_message_length: usize,
    pub max_messages: usize,
    pub max_suspicious_attempts: u32,
    pub suspicious_ttl: TimeDelta,
    pub policy: PatternPolicy,
}

impl SecuritySettings {
    pub fn from_config(config: &SecurityConfig) -> Result<Self, regex::Error> {
        let policy = match &config.patterns {
            Some(patterns) => PatternPolicy::from_patterns("custom", patterns)?,
            None => PatternPolicy::prompt_injection(),
        };
        Ok(Self {
            max_request_size: config.max_request_size,
            max_message_length: config.max_message_length,
            max_messages: config.max_messages,
            max_suspicious_attempts: config.max_suspicious_attempts,
            suspicious_ttl: i64::try_from(config.suspicious_ttl_secs)
                .ok()
                .and_then(TimeDelta::try_seconds)
                .unwrap_or(TimeDelta::MAX),
            policy,
        })
    }
}

impl Default for SecuritySettings {
    fn default() -> Self {
        Self {
            max_request_size: 50 * 1024,
            max_message_length: 2000,
            max_messages: 50,
            max_suspicious_attempts: 3,
            suspicious_ttl: TimeDelta::hours(1),
            policy: PatternPolicy::prompt_injection(),
        }
    }
}

/// A request that passed every check, with its body already read.
#[derive(Debug)]
pub struct ValidatedRequest {
    pub parts: Parts,
    pub body: Bytes,
    pub json: Value,
}

impl ValidatedRequest {
    /// Reassemble an HTTP request carrying the buffered body.
    pub fn into_request(self) -> Request<Body> {
        Request::from_parts(self.parts, Body::from(self.body))
    }
}

#[derive(Debug)]
struct Rejection {
    reason: ViolationReason,
    rule: Option<String>,
}

impl From<ViolationReason> for Rejection {
    fn from(reason: ViolationReason) -> Self {
        Self { reason, rule: None }
    }
}

/// Heuristic request filter.
#[derive(Debug)]
pub struct SecurityFilter {
    settings: ArcSwap<SecuritySettings>,
    suspicion: Arc<dyn SuspicionStore>,
    clock: Arc<dyn Clock>,
}

impl SecurityFilter {
    pub fn new(
        settings: SecuritySettings,
        suspicion: Arc<dyn SuspicionStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            settings: ArcSwap::from_pointee(settings),
            suspicion,
            clock,
        }
    }

    /// Filter backed by an in-memory suspicion store.
    pub fn in_memory(settings: SecuritySettings, clock: Arc<dyn Clock>) -> Self {
        Self::new(settings, Arc::new(MemorySuspicionStore::new()), clock)
    }

    pub fn settings(&self) -> Arc<SecuritySettings> {
        self.settings.load_full()
    }

    /// Swap thresholds and policy; in-flight requests keep the old ones.
    pub fn replace_settings(&self, settings: SecuritySettings) {
        self.settings.store(Arc::new(settings));
    }

    /// Run every check against `request`, consuming its body.
    pub async fn validate_request(
        &self,
        request: Request<Body>,
        client: &ClientIdentity,
    ) -> Result<ValidatedRequest, SecurityViolation> {
        let settings = self.settings();
        let (parts, body) = request.into_parts();

        let outcome = match self.check_headers(&settings, &parts.headers, client) {
            Ok(()) => match read_body(body, settings.max_request_size).await {
                Ok(bytes) => self.check_body(&settings, &bytes, client).map(|json| (bytes, json)),
                Err(reason) => Err(reason.into()),
            },
            Err(reason) => Err(reason.into()),
        };

        match outcome {
            Ok((body, json)) => Ok(ValidatedRequest { parts, body, json }),
            Err(rejection) => Err(SecurityViolation {
                reason: rejection.reason,
                client: client.clone(),
                rule: rejection.rule,
            }),
        }
    }

    /// Live suspicious-attempt count for `client`.
    pub fn suspicious_attempts(&self, client: &ClientIdentity) -> u32 {
        self.suspicion.count(client.as_str(), self.clock.now())
    }

    /// Drop expired suspicion records.
    pub fn sweep(&self) -> usize {
        self.suspicion.sweep(self.clock.now())
    }

    pub fn tracked_clients(&self) -> usize {
        self.suspicion.len()
    }

    fn check_headers(
        &self,
        settings: &SecuritySettings,
        headers: &HeaderMap,
        client: &ClientIdentity,
    ) -> Result<(), ViolationReason> {
        let declared = headers
            .get(header::CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<u64>().ok());
        if declared.is_some_and(|len| len > settings.max_request_size as u64) {
            return Err(ViolationReason::RequestTooLarge);
        }

        let is_json = headers
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|v| v.contains("application/json"));
        if !is_json {
            return Err(ViolationReason::InvalidContentType);
        }

        if self.suspicious_attempts(client) >= settings.max_suspicious_attempts {
            return Err(ViolationReason::TooManySuspiciousAttempts);
        }

        Ok(())
    }

    fn check_body(
        &self,
        settings: &SecuritySettings,
        body: &[u8],
        client: &ClientIdentity,
    ) -> Result<Value, Rejection> {
        let text = String::from_utf8_lossy(body);
        if let Some(rule) = settings.policy.first_match(&text) {
            return Err(self.flag(settings, client, ViolationReason::SuspiciousContent, rule));
        }

        let json: Value =
            serde_json::from_slice(body).map_err(|_| Rejection::from(ViolationReason::InvalidJson))?;

        if let Some(messages) = json.get("messages").and_then(Value::as_array) {
            if messages.len() > settings.max_messages {
                return Err(ViolationReason::TooManyMessages.into());
            }

            for content in messages
                .iter()
                .filter_map(|message| message.get("content").and_then(Value::as_str))
            {
                if content.chars().count() > settings.max_message_length {
                    return Err(ViolationReason::MessageTooLong.into());
                }
                if let Some(rule) = settings.policy.first_match(content) {
                    return Err(self.flag(
                        settings,
                        client,
                        ViolationReason::SuspiciousMessageContent,
                        rule,
                    ));
                }
            }
        }

        Ok(json)
    }

    fn flag(
        &self,
        settings: &SecuritySettings,
        client: &ClientIdentity,
        reason: ViolationReason,
        rule: &str,
    ) -> Rejection {
        let attempts = self
            .suspicion
            .increment(client.as_str(), self.clock.now(), settings.suspicious_ttl);
        tracing::debug!(client = %client, rule, attempts, "Suspicious attempt recorded");
        Rejection {
            reason,
            rule: Some(rule.to_string()),
        }
    }
}

/// Buffer the body, refusing anything past `limit` bytes regardless of what
/// `content-length` claimed.
async fn read_body(body: Body, limit: usize) -> Result<Bytes, ViolationReason> {
    axum::body::to_bytes(body, limit).await.map_err(|e| {
        if e.into_inner().is::<LengthLimitError>() {
            ViolationReason::RequestTooLarge
        } else {
            ViolationReason::ValidationFailed
        }
    })
}
