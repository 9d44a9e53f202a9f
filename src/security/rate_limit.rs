//! Fixed-window rate limiting per client identity.
//!
//! Each scope (global, chat, nutrition) owns an independent limiter with its
//! own store. Windows are fixed, not sliding: a caller can spend up to twice
//! the limit across a window boundary.

use axum::http::HeaderMap;
use chrono::{DateTime, TimeDelta, Utc};
use std::fmt;
use std::net::IpAddr;
use std::sync::Arc;

use crate::config::{RateLimitsConfig, WindowConfig};
use crate::security::clock::Clock;
use crate::security::identity::ClientIdentity;
use crate::security::store::{MemoryRateStore, RateStore};

/// Logical quota a request is counted against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RateLimitScope {
    Global,
    Chat,
    Nutrition,
}

impl RateLimitScope {
    pub fn as_str(&self) -> &'static str {
        match self {
            RateLimitScope::Global => "global",
            RateLimitScope::Chat => "chat",
            RateLimitScope::Nutrition => "nutrition",
        }
    }

    /// Response header carrying the remaining quota for this scope.
    pub fn remaining_header(&self) -> &'static str {
        match self {
            RateLimitScope::Global => "x-ratelimit-remaining-global",
            RateLimitScope::Chat => "x-ratelimit-remaining-chat",
            RateLimitScope::Nutrition => "x-ratelimit-remaining-nutrition",
        }
    }
}

impl fmt::Display for RateLimitScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of a single limiter check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitDecision {
    pub allowed: bool,
    /// `max - count` when allowed, `0` when denied.
    pub remaining: u32,
    pub reset_time: DateTime<Utc>,
}

/// Fixed-window counter for one scope.
#[derive(Debug)]
pub struct FixedWindowLimiter {
    scope: RateLimitScope,
    store: Arc<dyn RateStore>,
    clock: Arc<dyn Clock>,
    window: TimeDelta,
    max_requests: u32,
}

impl FixedWindowLimiter {
    pub fn new(
        scope: RateLimitScope,
        config: WindowConfig,
        store: Arc<dyn RateStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            scope,
            store,
            clock,
            window: TimeDelta::from_std(config.window()).unwrap_or(TimeDelta::MAX),
            max_requests: config.max_requests,
        }
    }

    /// Count one request for `client` and decide whether it may proceed.
    ///
    /// The first request of a window is always admitted, even with a limit of
    /// zero, because the fresh window already holds it before comparison.
    pub fn check_limit(&self, client: &ClientIdentity) -> RateLimitDecision {
        let now = self.clock.now();
        let window = self.store.record_hit(client.as_str(), now, self.window);

        if window.count == 1 {
            return RateLimitDecision {
                allowed: true,
                remaining: self.max_requests.saturating_sub(1),
                reset_time: window.reset_time,
            };
        }

        if window.count > self.max_requests {
            return RateLimitDecision {
                allowed: false,
                remaining: 0,
                reset_time: window.reset_time,
            };
        }

        RateLimitDecision {
            allowed: true,
            remaining: self.max_requests - window.count,
            reset_time: window.reset_time,
        }
    }

    /// Derive the caller from request headers, then [`check_limit`](Self::check_limit).
    pub fn check_request(&self, headers: &HeaderMap, peer: Option<IpAddr>) -> RateLimitDecision {
        self.check_limit(&ClientIdentity::for_rate_limit(headers, peer))
    }

    /// Drop expired windows.
    pub fn sweep(&self) -> usize {
        self.store.sweep(self.clock.now())
    }

    pub fn scope(&self) -> RateLimitScope {
        self.scope
    }

    pub fn tracked_clients(&self) -> usize {
        self.store.len()
    }
}

/// Remaining quota after a request passed every limiter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuotaReport {
    pub global_remaining: u32,
    pub endpoint: RateLimitScope,
    pub endpoint_remaining: u32,
}

/// A request refused by one of the limiters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitRejection {
    pub scope: RateLimitScope,
    pub reset_time: DateTime<Utc>,
    /// Whole seconds until `reset_time`, rounded up.
    pub retry_after_secs: u64,
}

/// The global limiter plus one limiter per AI-backed endpoint.
#[derive(Debug)]
pub struct RateLimiters {
    global: FixedWindowLimiter,
    chat: FixedWindowLimiter,
    nutrition: FixedWindowLimiter,
    clock: Arc<dyn Clock>,
}

impl RateLimiters {
    /// Build limiters backed by in-memory stores.
    pub fn in_memory(config: &RateLimitsConfig, clock: Arc<dyn Clock>) -> Self {
        let limiter = |scope, window| {
            FixedWindowLimiter::new(scope, window, Arc::new(MemoryRateStore::new()), clock.clone())
        };
        Self {
            global: limiter(RateLimitScope::Global, config.global),
            chat: limiter(RateLimitScope::Chat, config.chat),
            nutrition: limiter(RateLimitScope::Nutrition, config.nutrition),
            clock: clock.clone(),
        }
    }

    pub fn limiter(&self, scope: RateLimitScope) -> &FixedWindowLimiter {
        match scope {
            RateLimitScope::Global => &self.global,
            RateLimitScope::Chat => &self.chat,
            RateLimitScope::Nutrition => &self.nutrition,
        }
    }

    /// Check the global limiter, then the endpoint limiter.
    ///
    /// A request rejected globally is not counted against the endpoint.
    pub fn check(
        &self,
        client: &ClientIdentity,
        endpoint: RateLimitScope,
    ) -> Result<QuotaReport, RateLimitRejection> {
        let global = self.global.check_limit(client);
        if !global.allowed {
            return Err(self.reject(RateLimitScope::Global, global.reset_time));
        }

        let scoped = self.limiter(endpoint).check_limit(client);
        if !scoped.allowed {
            return Err(self.reject(endpoint, scoped.reset_time));
        }

        Ok(QuotaReport {
            global_remaining: global.remaining,
            endpoint,
            endpoint_remaining: scoped.remaining,
        })
    }

    /// Sweep every limiter, returning the total number of windows removed.
    pub fn sweep(&self) -> usize {
        [&self.global, &self.chat, &self.nutrition]
            .iter()
            .map(|limiter| limiter.sweep())
            .sum()
    }

    fn reject(&self, scope: RateLimitScope, reset_time: DateTime<Utc>) -> RateLimitRejection {
        RateLimitRejection {
            scope,
            reset_time,
            retry_after_secs: retry_after_secs(reset_time, self.clock.now()),
        }
    }
}

fn retry_after_secs(reset_time: DateTime<Utc>, now: DateTime<Utc>) -> u64 {
    let millis = (reset_time - now).num_milliseconds().max(0) as u64;
    millis.div_ceil(1000)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::security::clock::ManualClock;

    fn t0() -> DateTime<Utc> {
        DateTime::from_timestamp(1_700_000_000, 0).unwrap()
    }

    fn limiter(window_ms: u64, max_requests: u32, clock: &ManualClock) -> FixedWindowLimiter {
        FixedWindowLimiter::new(
            RateLimitScope::Chat,
            WindowConfig {
                window_ms,
                max_requests,
            },
            Arc::new(MemoryRateStore::new()),
            Arc::new(clock.clone()),
        )
    }

    #[test]
    fn test_worked_example_window_of_two() {
        let clock = ManualClock::new(t0());
        let limiter = limiter(60_000, 2, &clock);
        let client = ClientIdentity::from("1.2.3.4-curl");

        let first = limiter.check_limit(&client);
        assert!(first.allowed);
        assert_eq!(first.remaining, 1);

        let second = limiter.check_limit(&client);
        assert!(second.allowed);
        assert_eq!(second.remaining, 0);

        let third = limiter.check_limit(&client);
        assert!(!third.allowed);
        assert_eq!(third.remaining, 0);
        assert_eq!(third.reset_time, first.reset_time);

        clock.set(first.reset_time + TimeDelta::milliseconds(1));
        let fourth = limiter.check_limit(&client);
        assert!(fourth.allowed);
        assert_eq!(fourth.remaining, 1);
        assert!(fourth.reset_time > first.reset_time);
    }

    #[test]
    fn test_denied_stays_denied_for_rest_of_window() {
        let clock = ManualClock::new(t0());
        let limiter = limiter(1_000, 3, &clock);
        let client = ClientIdentity::from("c");

        for expected in [2, 1, 0] {
            assert_eq!(limiter.check_limit(&client).remaining, expected);
        }
        for _ in 0..5 {
            clock.advance(TimeDelta::milliseconds(100));
            let decision = limiter.check_limit(&client);
            assert!(!decision.allowed);
            assert_eq!(decision.remaining, 0);
        }
    }

    #[test]
    fn test_zero_limit_still_admits_first_request() {
        let clock = ManualClock::new(t0());
        let limiter = limiter(60_000, 0, &clock);
        let client = ClientIdentity::from("c");

        let first = limiter.check_limit(&client);
        assert!(first.allowed);
        assert_eq!(first.remaining, 0);
        assert!(!limiter.check_limit(&client).allowed);
    }

    #[test]
    fn test_check_request_keys_on_ip_and_user_agent() {
        let clock = ManualClock::new(t0());
        let limiter = limiter(60_000, 1, &clock);
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", "9.9.9.9, 10.0.0.1".parse().unwrap());
        headers.insert("user-agent", "curl/8".parse().unwrap());

        assert!(limiter.check_request(&headers, None).allowed);
        assert!(!limiter.check_limit(&ClientIdentity::from("9.9.9.9-curl/8")).allowed);

        headers.insert("user-agent", "firefox".parse().unwrap());
        assert!(limiter.check_request(&headers, None).allowed);
    }

    #[test]
    fn test_identities_are_isolated() {
        let clock = ManualClock::new(t0());
        let limiter = limiter(60_000, 1, &clock);

        assert!(limiter.check_limit(&ClientIdentity::from("a")).allowed);
        assert!(!limiter.check_limit(&ClientIdentity::from("a")).allowed);
        assert!(limiter.check_limit(&ClientIdentity::from("b")).allowed);
    }

    #[test]
    fn test_endpoint_limiters_are_independent() {
        let clock = ManualClock::new(t0());
        let mut config = RateLimitsConfig::default();
        config.chat.max_requests = 2;
        let limiters = RateLimiters::in_memory(&config, Arc::new(clock.clone()));
        let client = ClientIdentity::from("c");

        limiters.check(&client, RateLimitScope::Chat).unwrap();
        limiters.check(&client, RateLimitScope::Chat).unwrap();
        let rejection = limiters.check(&client, RateLimitScope::Chat).unwrap_err();
        assert_eq!(rejection.scope, RateLimitScope::Chat);

        let report = limiters.check(&client, RateLimitScope::Nutrition).unwrap();
        assert_eq!(report.endpoint_remaining, config.nutrition.max_requests - 1);
        // Every call, including the rejected chat one, counted globally.
        assert_eq!(report.global_remaining, config.global.max_requests - 4);
    }

    #[test]
    fn test_global_rejection_skips_endpoint() {
        let clock = ManualClock::new(t0());
        let mut config = RateLimitsConfig::default();
        config.global.max_requests = 1;
        let limiters = RateLimiters::in_memory(&config, Arc::new(clock.clone()));
        let client = ClientIdentity::from("c");

        limiters.check(&client, RateLimitScope::Chat).unwrap();
        let rejection = limiters.check(&client, RateLimitScope::Chat).unwrap_err();
        assert_eq!(rejection.scope, RateLimitScope::Global);
        assert_eq!(rejection.retry_after_secs, 300);

        let chat = limiters.limiter(RateLimitScope::Chat).store.get("c").unwrap();
        assert_eq!(chat.count, 1);
    }

    #[test]
    fn test_retry_after_rounds_up() {
        assert_eq!(retry_after_secs(t0() + TimeDelta::milliseconds(1500), t0()), 2);
        assert_eq!(retry_after_secs(t0() + TimeDelta::seconds(3), t0()), 3);
        assert_eq!(retry_after_secs(t0(), t0()), 0);
    }

    #[test]
    fn test_sweep_clears_expired_windows() {
        let clock = ManualClock::new(t0());
        let limiters = RateLimiters::in_memory(&RateLimitsConfig::default(), Arc::new(clock.clone()));
        limiters.check(&ClientIdentity::from("c"), RateLimitScope::Chat).unwrap();

        clock.advance(TimeDelta::seconds(61));
        // Chat window expired, global window (5 min) still live.
        assert_eq!(limiters.sweep(), 1);
        assert_eq!(limiters.limiter(RateLimitScope::Global).tracked_clients(), 1);
    }
}
