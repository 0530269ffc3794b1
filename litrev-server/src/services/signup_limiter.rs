//! Per-client rate limiting for the public sign-up endpoint
//!
//! GCRA quota from governor: `max_requests` per `window_secs`, with a burst
//! of `max_requests`. Clients are keyed by the first `X-Forwarded-For` hop,
//! then `X-Real-IP`, then the literal `unknown`.

use axum::http::HeaderMap;
use governor::clock::DefaultClock;
use governor::state::keyed::DefaultKeyedStateStore;
use governor::{Quota, RateLimiter};
use litrev_common::config::SignupConfig;
use sha2::{Digest, Sha256};
use std::num::NonZeroU32;
use std::time::Duration;

/// Key used when no client address header is present
pub const UNKNOWN_CLIENT: &str = "unknown";

pub struct SignupLimiter {
    limiter: RateLimiter<String, DefaultKeyedStateStore<String>, DefaultClock>,
}

impl SignupLimiter {
    pub fn new(max_requests: u32, window: Duration) -> Self {
        let burst = NonZeroU32::new(max_requests).unwrap_or(NonZeroU32::MIN);
        let quota = Quota::with_period(window / burst.get())
            .map(|quota| quota.allow_burst(burst))
            .unwrap_or_else(|| Quota::per_second(burst));

        Self {
            limiter: RateLimiter::keyed(quota),
        }
    }

    pub fn from_config(config: &SignupConfig) -> Self {
        Self::new(config.max_requests, Duration::from_secs(config.window_secs))
    }

    /// Consume one request for `client_key`; false when over quota
    pub fn check(&self, client_key: &str) -> bool {
        self.limiter.check_key(&client_key.to_string()).is_ok()
    }

    /// Forget clients whose quota has fully replenished
    pub fn prune(&self) {
        self.limiter.retain_recent();
        self.limiter.shrink_to_fit();
    }

    pub fn tracked_clients(&self) -> usize {
        self.limiter.len()
    }
}

fn header_text<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
}

/// Client key from proxy headers
pub fn client_key(headers: &HeaderMap) -> String {
    if let Some(first_hop) = header_text(headers, "x-forwarded-for")
        .and_then(|value| value.split(',').next())
        .map(str::trim)
        .filter(|hop| !hop.is_empty())
    {
        return first_hop.to_string();
    }

    header_text(headers, "x-real-ip")
        .unwrap_or(UNKNOWN_CLIENT)
        .to_string()
}

/// Hex SHA-256 of the client key, stored instead of the address
pub fn hash_client_key(client_key: &str) -> String {
    format!("{:x}", Sha256::digest(client_key.as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_limits_per_client() {
        let limiter = SignupLimiter::new(2, Duration::from_secs(3600));
        assert!(limiter.check("10.0.0.1"));
        assert!(limiter.check("10.0.0.1"));
        assert!(!limiter.check("10.0.0.1"));

        // Other clients have their own quota
        assert!(limiter.check("10.0.0.2"));
        assert_eq!(limiter.tracked_clients(), 2);
    }

    #[test]
    fn test_zero_max_requests_still_allows_one() {
        let limiter = SignupLimiter::new(0, Duration::from_secs(60));
        assert!(limiter.check("a"));
        assert!(!limiter.check("a"));
    }

    #[test]
    fn test_client_key_precedence() {
        let mut headers = HeaderMap::new();
        assert_eq!(client_key(&headers), UNKNOWN_CLIENT);

        headers.insert("x-real-ip", HeaderValue::from_static("192.0.2.7"));
        assert_eq!(client_key(&headers), "192.0.2.7");

        headers.insert("x-forwarded-for", HeaderValue::from_static(" 203.0.113.9 , 10.0.0.1"));
        assert_eq!(client_key(&headers), "203.0.113.9");
    }

    #[test]
    fn test_hash_is_stable_hex() {
        let hash = hash_client_key("203.0.113.9");
        assert_eq!(hash.len(), 64);
        assert_eq!(hash, hash_client_key("203.0.113.9"));
        assert_ne!(hash, hash_client_key("203.0.113.10"));
    }
}
