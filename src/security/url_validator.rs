//! Outbound URL validation (SSRF guard).
//!
//! # Pipeline
//! ```text
//! raw input
//!     → required / parse
//!     → scheme (http, https)
//!     → blocked literal prefixes on the full string
//!     → blocked hostnames
//!     → private address ranges on the hostname
//!     → valid
//! ```
//! The first failing stage decides the error.
//!
//! # Design Decisions
//! - [`validate_url`] is pure and never touches DNS. A public name that
//!   resolves to a private address at fetch time is not caught by it; callers
//!   needing that use [`validate_resolved_url`]
//! - Hostnames come from the WHATWG parser, so numeric IPv4 spellings are
//!   normalised before the hostname checks run

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use std::sync::LazyLock;
use thiserror::Error;
use url::Url;

use crate::observability::metrics;

/// Why a URL was refused. `Display` strings are part of the public contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum UrlRejection {
    #[error("URL is required")]
    Required,

    #[error("Invalid URL format")]
    InvalidFormat,

    #[error("Only HTTP and HTTPS URLs are allowed")]
    UnsupportedScheme,

    #[error("This URL is not allowed for security reasons")]
    Blocked,

    #[error("URLs pointing to private IP addresses are not allowed")]
    PrivateAddress,
}

impl UrlRejection {
    fn label(&self) -> &'static str {
        match self {
            UrlRejection::Required => "required",
            UrlRejection::InvalidFormat => "invalid_format",
            UrlRejection::UnsupportedScheme => "scheme",
            UrlRejection::Blocked => "blocked",
            UrlRejection::PrivateAddress => "private_address",
        }
    }
}

/// Result object form of the validator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UrlValidationResult {
    pub is_valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl UrlValidationResult {
    pub fn valid() -> Self {
        Self {
            is_valid: true,
            error: None,
        }
    }

    pub fn rejected(reason: UrlRejection) -> Self {
        Self {
            is_valid: false,
            error: Some(reason.to_string()),
        }
    }
}

impl From<Result<Url, UrlRejection>> for UrlValidationResult {
    fn from(result: Result<Url, UrlRejection>) -> Self {
        match result {
            Ok(_) => Self::valid(),
            Err(reason) => Self::rejected(reason),
        }
    }
}

static BLOCKED_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"^https?://169\.254\.169\.254",
        r"^https?://metadata\.google\.internal",
        r"^https?://metadata\.azure\.com",
        r"^https?://localhost",
        r"^https?://127\.",
        r"^https?://0\.0\.0\.0",
        r"^https?://\[::1\]",
        r"^file:",
        r"^ftp:",
        r"^gopher:",
    ]
    .iter()
    .map(|p| Regex::new(&format!("(?i){p}")).expect("invalid blocked URL pattern"))
    .collect()
});

const BLOCKED_HOSTNAMES: &[&str] = &[
    "localhost",
    "0.0.0.0",
    "[::1]",
    "metadata.google.internal",
    "metadata.azure.com",
    "169.254.169.254",
];

static PRIVATE_RANGES: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        // 127.0.0.0/8
        r"^127\.",
        // 10.0.0.0/8
        r"^10\.",
        // 172.16.0.0/12
        r"^172\.(1[6-9]|2[0-9]|3[01])\.",
        // 192.168.0.0/16
        r"^192\.168\.",
        // 169.254.0.0/16
        r"^169\.254\.",
        r"^fc00:",
        r"^fe80:",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("invalid private range pattern"))
    .collect()
});

/// Validate `url`, returning the result object.
pub fn validate_url(url: &str) -> UrlValidationResult {
    let result = check_url(url);
    if let Err(reason) = &result {
        tracing::debug!(url = %url, reason = %reason, "Rejected outbound URL");
        metrics::record_url_rejection(reason.label());
    }
    result.into()
}

/// Validate `url`, returning the parsed URL or the rejection reason.
pub fn assert_valid_url(url: &str) -> Result<Url, UrlRejection> {
    check_url(url)
}

fn check_url(raw: &str) -> Result<Url, UrlRejection> {
    if raw.is_empty() {
        return Err(UrlRejection::Required);
    }

    let trimmed = raw.trim();
    let url = Url::parse(trimmed).map_err(|_| UrlRejection::InvalidFormat)?;

    if !matches!(url.scheme(), "http" | "https") {
        return Err(UrlRejection::UnsupportedScheme);
    }

    if BLOCKED_PATTERNS.iter().any(|p| p.is_match(trimmed)) {
        return Err(UrlRejection::Blocked);
    }

    let hostname = url.host_str().unwrap_or_default().to_lowercase();

    if BLOCKED_HOSTNAMES.contains(&hostname.as_str()) {
        return Err(UrlRejection::Blocked);
    }

    let bare = hostname.trim_start_matches('[').trim_end_matches(']');
    if PRIVATE_RANGES.iter().any(|p| p.is_match(bare)) {
        return Err(UrlRejection::PrivateAddress);
    }

    Ok(url)
}

/// Whether a resolved address must not be fetched.
pub fn is_private_address(ip: &IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => {
            v4.is_loopback() || v4.is_private() || v4.is_link_local() || v4.is_unspecified()
        }
        IpAddr::V6(v6) => {
            if let Some(mapped) = v6.to_ipv4_mapped() {
                return is_private_address(&IpAddr::V4(mapped));
            }
            let first = v6.segments()[0];
            v6.is_loopback()
                || v6.is_unspecified()
                // fc00::/7 unique local
                || (first & 0xfe00) == 0xfc00
                // fe80::/10 link local
                || (first & 0xffc0) == 0xfe80
        }
    }
}

/// [`validate_url`], then resolve the host and re-check every address.
///
/// Closes the DNS-rebinding gap only for the instant of resolution; the
/// caller should connect to one of the checked addresses rather than
/// resolving again.
pub async fn validate_resolved_url(url: &str) -> UrlValidationResult {
    let parsed = match check_url(url) {
        Ok(parsed) => parsed,
        Err(reason) => {
            metrics::record_url_rejection(reason.label());
            return UrlValidationResult::rejected(reason);
        }
    };

    let Some(host) = parsed.host_str() else {
        return UrlValidationResult::rejected(UrlRejection::InvalidFormat);
    };
    let host = host.trim_start_matches('[').trim_end_matches(']');
    let port = parsed.port_or_known_default().unwrap_or(80);

    let addrs = match tokio::net::lookup_host((host, port)).await {
        Ok(addrs) => addrs,
        // The URL is well formed but its destination cannot be vetted.
        Err(e) => {
            tracing::warn!(host = %host, error = %e, "Failed to resolve outbound URL host");
            metrics::record_url_rejection(UrlRejection::Blocked.label());
            return UrlValidationResult::rejected(UrlRejection::Blocked);
        }
    };

    for addr in addrs {
        if is_private_address(&addr.ip()) {
            tracing::warn!(host = %host, resolved = %addr.ip(), "Outbound URL resolves to private address");
            metrics::record_url_rejection(UrlRejection::PrivateAddress.label());
            return UrlValidationResult::rejected(UrlRejection::PrivateAddress);
        }
    }

    UrlValidationResult::valid()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn error_of(url: &str) -> Option<String> {
        validate_url(url).error
    }

    #[test]
    fn test_public_urls_pass() {
        assert_eq!(validate_url("https://example.com/path"), UrlValidationResult::valid());
        assert!(validate_url("http://172.15.0.1/").is_valid);
        assert!(validate_url("http://172.32.0.1/").is_valid);
        assert!(validate_url("  https://example.com  ").is_valid);
        assert!(validate_url("http://8.8.8.8/dns").is_valid);
    }

    #[test]
    fn test_required_and_format() {
        assert_eq!(error_of("").as_deref(), Some("URL is required"));
        assert_eq!(error_of("   ").as_deref(), Some("Invalid URL format"));
        assert_eq!(error_of("not a url").as_deref(), Some("Invalid URL format"));
    }

    #[test]
    fn test_scheme_rejections() {
        let scheme_error = Some("Only HTTP and HTTPS URLs are allowed");
        assert_eq!(error_of("ftp://host/file").as_deref(), scheme_error);
        assert_eq!(error_of("file:///etc/passwd").as_deref(), scheme_error);
        assert_eq!(error_of("javascript:alert(1)").as_deref(), scheme_error);
        assert_eq!(error_of("data:text/plain,hi").as_deref(), scheme_error);
        assert_eq!(error_of("gopher://host:70/").as_deref(), scheme_error);
    }

    #[test]
    fn test_blocked_hosts() {
        let blocked = Some("This URL is not allowed for security reasons");
        assert_eq!(error_of("http://localhost:3000").as_deref(), blocked);
        assert_eq!(error_of("http://169.254.169.254/latest/meta-data/").as_deref(), blocked);
        assert_eq!(error_of("http://metadata.google.internal/computeMetadata/v1/").as_deref(), blocked);
        assert_eq!(error_of("http://127.0.0.1:8080/").as_deref(), blocked);
        assert_eq!(error_of("http://0.0.0.0/").as_deref(), blocked);
        assert_eq!(error_of("http://[::1]/").as_deref(), blocked);
        assert_eq!(error_of("HTTP://LOCALHOST/").as_deref(), blocked);
    }

    #[test]
    fn test_private_ranges() {
        let private = Some("URLs pointing to private IP addresses are not allowed");
        assert_eq!(error_of("http://172.16.0.1/").as_deref(), private);
        assert_eq!(error_of("http://172.31.255.255/").as_deref(), private);
        assert_eq!(error_of("http://10.1.2.3/").as_deref(), private);
        assert_eq!(error_of("http://192.168.1.1/admin").as_deref(), private);
        assert_eq!(error_of("http://169.254.1.1/").as_deref(), private);
        assert_eq!(error_of("http://[fe80::1]/").as_deref(), private);
        assert_eq!(error_of("http://[fc00::1]/").as_deref(), private);
    }

    #[test]
    fn test_numeric_ipv4_spellings_are_normalised() {
        // 2130706433 == 127.0.0.1; the string prefix check misses it but the
        // parsed hostname does not.
        assert_eq!(
            error_of("http://2130706433/").as_deref(),
            Some("URLs pointing to private IP addresses are not allowed")
        );
        assert!(!validate_url("http://0xa000001/").is_valid);
    }

    #[test]
    fn test_assert_valid_url() {
        let url = assert_valid_url("https://example.com/cv.pdf").unwrap();
        assert_eq!(url.host_str(), Some("example.com"));

        let err = assert_valid_url("http://192.168.0.10/").unwrap_err();
        assert_eq!(err, UrlRejection::PrivateAddress);
        assert_eq!(err.to_string(), "URLs pointing to private IP addresses are not allowed");
    }

    #[test]
    fn test_result_serialization() {
        let json = serde_json::to_value(validate_url("ftp://host/file")).unwrap();
        assert_eq!(
            json,
            serde_json::json!({ "isValid": false, "error": "Only HTTP and HTTPS URLs are allowed" })
        );
        let json = serde_json::to_value(validate_url("https://example.com")).unwrap();
        assert_eq!(json, serde_json::json!({ "isValid": true }));
    }

    #[test]
    fn test_is_private_address() {
        assert!(is_private_address(&"127.0.0.1".parse().unwrap()));
        assert!(is_private_address(&"10.0.0.8".parse().unwrap()));
        assert!(is_private_address(&"169.254.169.254".parse().unwrap()));
        assert!(is_private_address(&"::1".parse().unwrap()));
        assert!(is_private_address(&"fd12::1".parse().unwrap()));
        assert!(is_private_address(&"::ffff:192.168.0.1".parse().unwrap()));
        assert!(!is_private_address(&"93.184.216.34".parse().unwrap()));
        assert!(!is_private_address(&"2606:4700::1111".parse().unwrap()));
    }

    #[tokio::test]
    async fn test_resolved_literal_addresses() {
        assert!(validate_resolved_url("http://93.184.216.34/").await.is_valid);
        assert_eq!(
            validate_resolved_url("ftp://example.com/").await.error.as_deref(),
            Some("Only HTTP and HTTPS URLs are allowed")
        );
    }

    #[tokio::test]
    async fn test_unresolvable_host_is_blocked() {
        // `.invalid` never resolves.
        let result = validate_resolved_url("https://folio-guard.invalid/avatar.png").await;
        assert!(!result.is_valid);
        assert_eq!(
            result.error.as_deref(),
            Some("This URL is not allowed for security reasons")
        );
    }
}
