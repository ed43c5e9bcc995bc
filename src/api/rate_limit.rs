//! Per-source-IP token-bucket rate limiting.
//!
//! Two presets: the auth token endpoint (10 per 15 minutes) and, when
//! enabled, write endpoints (60 per minute). Sources are identified by
//! `X-Forwarded-For`, then `X-Real-IP`, then "unknown".

use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use governor::clock::{Clock, DefaultClock};
use governor::state::keyed::DefaultKeyedStateStore;
use governor::{Quota, RateLimiter};
use std::num::NonZeroU32;
use std::time::Duration;

use crate::domain::models::config::RateLimitConfig;

type KeyedLimiter = RateLimiter<String, DefaultKeyedStateStore<String>, DefaultClock>;

pub struct RateLimits {
    auth: KeyedLimiter,
    writes: Option<KeyedLimiter>,
}

impl RateLimits {
    pub fn new(config: &RateLimitConfig) -> Self {
        let auth_quota = Quota::with_period(Duration::from_secs(15 * 60 / u64::from(config.auth_tokens_per_15min.max(1))))
            .unwrap_or_else(|| Quota::per_hour(NonZeroU32::MIN))
            .allow_burst(NonZeroU32::new(config.auth_tokens_per_15min.max(1)).unwrap_or(NonZeroU32::MIN));

        let writes = config.limit_writes.then(|| {
            let per_min = NonZeroU32::new(config.writes_per_min.max(1)).unwrap_or(NonZeroU32::MIN);
            RateLimiter::keyed(Quota::per_minute(per_min))
        });

        Self {
            auth: RateLimiter::keyed(auth_quota),
            writes,
        }
    }

    /// Check the auth-token preset for one source.
    pub fn check_auth(&self, source: &str) -> Result<(), u64> {
        check(&self.auth, source)
    }

    /// Check the write preset; passes when write limiting is disabled.
    pub fn check_write(&self, source: &str) -> Result<(), u64> {
        match &self.writes {
            Some(limiter) => check(limiter, source),
            None => Ok(()),
        }
    }
}

fn check(limiter: &KeyedLimiter, source: &str) -> Result<(), u64> {
    limiter.check_key(&source.to_string()).map_err(|not_until| {
        not_until
            .wait_time_from(DefaultClock::default().now())
            .as_secs()
            .max(1)
    })
}

/// Resolve the client source identity from proxy headers.
pub fn source_ip(headers: &HeaderMap) -> String {
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .or_else(|| {
            headers
                .get("x-real-ip")
                .and_then(|v| v.to_str().ok())
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        })
        .unwrap_or_else(|| "unknown".to_string())
}

/// 429 with `Retry-After` and a structured body.
pub fn too_many_requests(retry_after_secs: u64) -> Response {
    let mut response = (
        StatusCode::TOO_MANY_REQUESTS,
        Json(serde_json::json!({
            "error": "rate_limited",
            "message": "too many requests",
        })),
    )
        .into_response();
    if let Ok(value) = retry_after_secs.to_string().parse() {
        response.headers_mut().insert("retry-after", value);
    }
    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn source_prefers_forwarded_for_then_real_ip() {
        let mut headers = HeaderMap::new();
        assert_eq!(source_ip(&headers), "unknown");

        headers.insert("x-real-ip", "10.0.0.2".parse().unwrap());
        assert_eq!(source_ip(&headers), "10.0.0.2");

        headers.insert("x-forwarded-for", "10.0.0.1, 10.0.0.9".parse().unwrap());
        assert_eq!(source_ip(&headers), "10.0.0.1");
    }

    #[test]
    fn auth_preset_exhausts_after_burst() {
        let limits = RateLimits::new(&RateLimitConfig {
            auth_tokens_per_15min: 10,
            writes_per_min: 60,
            limit_writes: false,
        });
        for _ in 0..10 {
            assert!(limits.check_auth("1.2.3.4").is_ok());
        }
        let retry_after = limits.check_auth("1.2.3.4").unwrap_err();
        assert!(retry_after >= 1);
        // Other sources are unaffected.
        assert!(limits.check_auth("5.6.7.8").is_ok());
    }

    #[test]
    fn write_preset_disabled_by_default() {
        let limits = RateLimits::new(&RateLimitConfig::default());
        for _ in 0..1000 {
            assert!(limits.check_write("1.2.3.4").is_ok());
        }
    }
}
