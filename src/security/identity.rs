//! Caller fingerprinting.
//!
//! Identities are derived from proxy headers and are neither authenticated
//! nor collision-free. Two callers behind the same proxy without forwarding
//! headers share a key.

use axum::http::HeaderMap;
use std::fmt;
use std::net::IpAddr;

/// Longest user-agent prefix folded into a rate-limit key.
pub const USER_AGENT_PREFIX_CHARS: usize = 50;

const UNKNOWN: &str = "unknown";

/// Key identifying a caller for quota and throttle purposes.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ClientIdentity(String);

impl ClientIdentity {
    /// Identity used by the rate limiters: `{ip}-{user-agent prefix}`.
    pub fn for_rate_limit(headers: &HeaderMap, peer: Option<IpAddr>) -> Self {
        let ip = client_ip(headers, peer);
        let user_agent = header_str(headers, "user-agent").unwrap_or(UNKNOWN);
        let prefix: String = user_agent.chars().take(USER_AGENT_PREFIX_CHARS).collect();
        Self(format!("{ip}-{prefix}"))
    }

    /// Identity used by the security filter: the client IP alone.
    pub fn for_filter(headers: &HeaderMap, peer: Option<IpAddr>) -> Self {
        Self(client_ip(headers, peer))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ClientIdentity {
    fn from(key: &str) -> Self {
        Self(key.to_string())
    }
}

impl fmt::Display for ClientIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Resolve the client IP from forwarding headers.
///
/// Order: first `x-forwarded-for` entry, `x-real-ip`, `cf-connecting-ip`,
/// then the socket peer when known, else `"unknown"`.
pub fn client_ip(headers: &HeaderMap, peer: Option<IpAddr>) -> String {
    let forwarded = header_str(headers, "x-forwarded-for")
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty());

    forwarded
        .or_else(|| header_str(headers, "x-real-ip"))
        .or_else(|| header_str(headers, "cf-connecting-ip"))
        .map(str::to_string)
        .or_else(|| peer.map(|ip| ip.to_string()))
        .unwrap_or_else(|| UNKNOWN.to_string())
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(pairs: &[(&'static str, &str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (k, v) in pairs {
            map.insert(*k, HeaderValue::from_str(v).unwrap());
        }
        map
    }

    #[test]
    fn test_first_forwarded_ip_wins() {
        let h = headers(&[
            ("x-forwarded-for", "203.0.113.7, 10.0.0.1"),
            ("x-real-ip", "198.51.100.1"),
        ]);
        assert_eq!(client_ip(&h, None), "203.0.113.7");
    }

    #[test]
    fn test_header_fallback_chain() {
        let h = headers(&[("cf-connecting-ip", "192.0.2.44")]);
        assert_eq!(client_ip(&h, None), "192.0.2.44");

        let h = headers(&[("x-real-ip", "198.51.100.1"), ("cf-connecting-ip", "192.0.2.44")]);
        assert_eq!(client_ip(&h, None), "198.51.100.1");
    }

    #[test]
    fn test_peer_then_unknown() {
        let peer: IpAddr = "127.0.0.1".parse().unwrap();
        assert_eq!(client_ip(&HeaderMap::new(), Some(peer)), "127.0.0.1");
        assert_eq!(client_ip(&HeaderMap::new(), None), "unknown");
    }

    #[test]
    fn test_rate_limit_identity_truncates_user_agent() {
        let long_agent = "A".repeat(80);
        let h = headers(&[("x-real-ip", "198.51.100.1"), ("user-agent", &long_agent)]);

        let id = ClientIdentity::for_rate_limit(&h, None);
        assert_eq!(id.as_str(), format!("198.51.100.1-{}", "A".repeat(50)));
    }

    #[test]
    fn test_identity_forms() {
        let h = headers(&[("x-real-ip", "198.51.100.1")]);
        assert_eq!(ClientIdentity::for_rate_limit(&h, None).as_str(), "198.51.100.1-unknown");
        assert_eq!(ClientIdentity::for_filter(&h, None).as_str(), "198.51.100.1");
    }
}
