//! External monitoring module
//!
//! Probes websites and turns the results into human-readable reports:
//! - `website`: HTTP prober (one GET per check, bounded by a timeout)
//! - `digest`: grouping of probe results by status code, alert texts

pub mod digest;
pub mod website;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use url::Url;

/// Status code that counts as "fully up".
pub const STATUS_OK: u16 = 200;

/// Sentinel status code for probes that never got an HTTP response
/// (DNS failure, connection refused, timeout, TLS error).
pub const PROBE_FAILED: u16 = 500;

/// Result of a single probe. Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeResult {
    pub url: String,
    pub status_code: u16,
    /// e.g. `404 Not Found`, or `Failed to ping: <reason>` for transport failures.
    pub status_line: String,
    pub checked_at: DateTime<Utc>,
}

impl ProbeResult {
    pub fn new(url: impl Into<String>, status_code: u16, status_line: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            status_code,
            status_line: status_line.into(),
            checked_at: Utc::now(),
        }
    }

    /// Result for a probe that could not complete.
    pub fn failed(url: impl Into<String>, reason: impl std::fmt::Display) -> Self {
        Self::new(url, PROBE_FAILED, format!("Failed to ping: {}", reason))
    }

    pub fn is_ok(&self) -> bool {
        self.status_code == STATUS_OK
    }
}

/// Something that can check a URL. Implementations absorb every transport
/// failure into the returned `ProbeResult`; a probe never errors.
#[async_trait]
pub trait Prober: Send + Sync {
    async fn probe(&self, url: &str) -> ProbeResult;
}

/// Prepend `https://` when the input carries no http(s) scheme.
pub fn normalize_url(raw: &str) -> String {
    let raw = raw.trim();
    if raw.starts_with("http://") || raw.starts_with("https://") {
        raw.to_string()
    } else {
        format!("https://{}", raw)
    }
}

/// Normalize and validate a user-supplied target. Returns `None` for input that
/// does not form an absolute http(s) URL with a host.
pub fn parse_target(raw: &str) -> Option<String> {
    let normalized = normalize_url(raw);
    let parsed = Url::parse(&normalized).ok()?;
    match parsed.host_str() {
        Some(host) if !host.is_empty() => Some(normalized),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_adds_https() {
        assert_eq!(normalize_url("example.com"), "https://example.com");
        assert_eq!(normalize_url("  example.com/path "), "https://example.com/path");
    }

    #[test]
    fn test_normalize_keeps_scheme() {
        assert_eq!(normalize_url("http://example.com"), "http://example.com");
        assert_eq!(normalize_url("https://example.com"), "https://example.com");
    }

    #[test]
    fn test_normalize_is_idempotent() {
        let once = normalize_url("example.com");
        assert_eq!(normalize_url(&once), once);
    }

    #[test]
    fn test_parse_target() {
        assert_eq!(parse_target("example.com").as_deref(), Some("https://example.com"));
        assert_eq!(parse_target("https://"), None);
        assert_eq!(parse_target("exa mple.com"), None);
    }

    #[test]
    fn test_failed_result_uses_sentinel() {
        let r = ProbeResult::failed("https://a.test", "connection refused");
        assert_eq!(r.status_code, PROBE_FAILED);
        assert_eq!(r.status_line, "Failed to ping: connection refused");
        assert!(!r.is_ok());
    }
}
