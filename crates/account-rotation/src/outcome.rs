//! Classification of upstream responses into rotation signals
//!
//! A 429 means the account is throttled until a reset time. Credential
//! rejections and transport-level failures put the account into a cooldown
//! instead, so it is skipped for a while without being treated as throttled.

use std::time::Duration;

/// What an outbound call tells the manager about the account it used.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Call succeeded or failed for a reason unrelated to the account.
    Success,
    /// Upstream throttled this account.
    RateLimited,
    /// Credentials were rejected (401/403).
    AuthFailure,
    /// Timeout, gateway failure, or other transient upstream error.
    NetworkError,
}

/// Classify an upstream HTTP status.
///
/// 429 is a rate limit, 401/403 are auth failures, 408/500/502/503/504 are
/// network errors. Everything else leaves the account alone.
pub fn classify_status(status: u16) -> Outcome {
    match status {
        429 => Outcome::RateLimited,
        401 | 403 => Outcome::AuthFailure,
        408 | 500 | 502 | 503 | 504 => Outcome::NetworkError,
        _ => Outcome::Success,
    }
}

/// Parse a `Retry-After` header given in delta-seconds.
///
/// HTTP-date values are not supported and yield `None`, which makes the
/// caller fall back to the configured rate-limit window.
pub fn parse_retry_after(value: &str) -> Option<Duration> {
    value.trim().parse::<u64>().ok().map(Duration::from_secs)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classify_status_429_rate_limited() {
        assert_eq!(classify_status(429), Outcome::RateLimited);
    }

    #[test]
    fn classify_status_401_403_auth_failure() {
        assert_eq!(classify_status(401), Outcome::AuthFailure);
        assert_eq!(classify_status(403), Outcome::AuthFailure);
    }

    #[test]
    fn classify_status_transient_network_errors() {
        for status in [408, 500, 502, 503, 504] {
            assert_eq!(classify_status(status), Outcome::NetworkError, "status {status}");
        }
    }

    #[test]
    fn classify_status_other_is_success() {
        assert_eq!(classify_status(200), Outcome::Success);
        assert_eq!(classify_status(400), Outcome::Success);
        assert_eq!(classify_status(418), Outcome::Success);
    }

    #[test]
    fn retry_after_seconds() {
        assert_eq!(parse_retry_after("120"), Some(Duration::from_secs(120)));
        assert_eq!(parse_retry_after(" 7 "), Some(Duration::from_secs(7)));
    }

    #[test]
    fn retry_after_http_date_unsupported() {
        assert_eq!(parse_retry_after("Wed, 21 Oct 2015 07:28:00 GMT"), None);
        assert_eq!(parse_retry_after(""), None);
    }
}
