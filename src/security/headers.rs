//! Request header extraction and rate limit header projection.
//!
//! # Responsibilities
//! - Derive the client identifier rate limits are keyed on
//! - Project a [`RateLimitResult`] onto `X-RateLimit-*` response headers
//!
//! # Design Decisions
//! - Header precedence is fixed: `x-forwarded-for` is consulted first even when
//!   more specific headers are present
//! - Reset is reported in whole seconds rounded up, so a blocked client never
//!   sees `0`

use axum::http::{HeaderMap, HeaderName, HeaderValue};

use crate::security::rate_limit::RateLimitResult;

pub const X_RATELIMIT_LIMIT: HeaderName = HeaderName::from_static("x-ratelimit-limit");
pub const X_RATELIMIT_REMAINING: HeaderName = HeaderName::from_static("x-ratelimit-remaining");
pub const X_RATELIMIT_RESET: HeaderName = HeaderName::from_static("x-ratelimit-reset");

/// Identifier used when no forwarding header is present.
pub const UNKNOWN_CLIENT: &str = "unknown-client";

const FORWARDED_FOR: &str = "x-forwarded-for";
const CF_CONNECTING_IP: &str = "cf-connecting-ip";
const REAL_IP: &str = "x-real-ip";

/// Client identifier for rate limiting.
///
/// `x-forwarded-for` (first comma-separated entry, trimmed), then
/// `cf-connecting-ip`, then `x-real-ip`, then [`UNKNOWN_CLIENT`].
pub fn client_identifier(headers: &HeaderMap) -> String {
    if let Some(forwarded) = header_str(headers, FORWARDED_FOR) {
        let first = forwarded.split(',').next().unwrap_or_default();
        return first.trim().to_string();
    }

    header_str(headers, CF_CONNECTING_IP)
        .or_else(|| header_str(headers, REAL_IP))
        .unwrap_or(UNKNOWN_CLIENT)
        .to_string()
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
}

/// Seconds until reset, rounded up.
pub fn reset_seconds(result: &RateLimitResult) -> u64 {
    result.reset_in.div_ceil(1000)
}

/// `X-RateLimit-Limit`, `X-RateLimit-Remaining` and `X-RateLimit-Reset`.
pub fn rate_limit_headers(result: &RateLimitResult) -> HeaderMap {
    let mut headers = HeaderMap::with_capacity(3);
    headers.insert(X_RATELIMIT_LIMIT, HeaderValue::from(result.limit));
    headers.insert(X_RATELIMIT_REMAINING, HeaderValue::from(result.remaining));
    headers.insert(X_RATELIMIT_RESET, HeaderValue::from(reset_seconds(result)));
    headers
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers(pairs: &[(&'static str, &'static str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (k, v) in pairs {
            map.insert(*k, HeaderValue::from_static(*v));
        }
        map
    }

    #[test]
    fn test_forwarded_for_wins() {
        let map = headers(&[
            ("x-forwarded-for", " 203.0.113.7 , 10.0.0.1"),
            ("cf-connecting-ip", "198.51.100.2"),
            ("x-real-ip", "192.0.2.9"),
        ]);
        assert_eq!(client_identifier(&map), "203.0.113.7");
    }

    #[test]
    fn test_fallback_order() {
        let map = headers(&[("cf-connecting-ip", "198.51.100.2"), ("x-real-ip", "192.0.2.9")]);
        assert_eq!(client_identifier(&map), "198.51.100.2");

        let map = headers(&[("x-real-ip", "192.0.2.9")]);
        assert_eq!(client_identifier(&map), "192.0.2.9");

        assert_eq!(client_identifier(&HeaderMap::new()), "unknown-client");
    }

    #[test]
    fn test_empty_forwarded_for_is_skipped() {
        let map = headers(&[("x-forwarded-for", ""), ("x-real-ip", "192.0.2.9")]);
        assert_eq!(client_identifier(&map), "192.0.2.9");
    }

    #[test]
    fn test_reset_rounds_up() {
        let result = RateLimitResult {
            allowed: false,
            remaining: 0,
            reset_in: 15_500,
            limit: 10,
        };
        let map = rate_limit_headers(&result);
        assert_eq!(map.get("X-RateLimit-Reset").unwrap(), "16");
        assert_eq!(map.get("X-RateLimit-Limit").unwrap(), "10");
        assert_eq!(map.get("X-RateLimit-Remaining").unwrap(), "0");

        let exact = RateLimitResult { reset_in: 15_000, ..result };
        assert_eq!(reset_seconds(&exact), 15);
        let tiny = RateLimitResult { reset_in: 1, ..result };
        assert_eq!(reset_seconds(&tiny), 1);
    }
}
