//! Rate limiting middleware using Governor.
//!
//! Implements per-caller rate limiting with a token bucket algorithm.
//! Callers are keyed by their `X-User-Id`; requests without one share the
//! `anonymous` bucket.

use axum::{
    Json,
    body::Body,
    extract::State,
    http::{Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use governor::{DefaultKeyedRateLimiter, Quota, RateLimiter};
use serde_json::json;
use std::{
    num::NonZeroU32,
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
    time::Duration,
};

use super::auth::USER_ID_HEADER;

/// Checks between sweeps of callers whose buckets have refilled.
const SWEEP_EVERY: u64 = 1024;

/// Rate limiter state shared across requests.
pub struct RateLimiterState {
    /// One bucket per caller key
    limiter: DefaultKeyedRateLimiter<String>,
    checks: AtomicU64,
    period: Duration,
}

impl Default for RateLimiterState {
    fn default() -> Self {
        Self::new(100, Duration::from_secs(60))
    }
}

impl RateLimiterState {
    /// Allows `requests` per `period`, all of which may arrive as a burst.
    pub fn new(requests: u32, period: Duration) -> Self {
        let burst = NonZeroU32::new(requests).unwrap_or(NonZeroU32::MIN);
        let quota = Quota::with_period(period / burst.get())
            .unwrap_or_else(|| Quota::per_minute(burst))
            .allow_burst(burst);

        Self {
            limiter: RateLimiter::keyed(quota),
            checks: AtomicU64::new(0),
            period,
        }
    }

    /// Returns true if the request is allowed, false if rate limited.
    pub fn check(&self, key: &str) -> bool {
        if self.checks.fetch_add(1, Ordering::Relaxed) % SWEEP_EVERY == SWEEP_EVERY - 1 {
            self.sweep();
        }
        self.limiter.check_key(&key.to_string()).is_ok()
    }

    /// Forgets callers whose bucket has fully refilled. Caller keys come
    /// from a request header, so without this the key set only grows.
    pub fn sweep(&self) {
        let before = self.limiter.len();
        self.limiter.retain_recent();
        self.limiter.shrink_to_fit();
        tracing::debug!(before, after = self.limiter.len(), "Swept idle rate limit buckets");
    }

    /// Number of callers currently holding a bucket.
    pub fn tracked_callers(&self) -> usize {
        self.limiter.len()
    }
}

/// Paths that are never limited: health checks and provider callbacks,
/// which carry no caller identity and must not be dropped.
fn is_exempt(path: &str) -> bool {
    path == "/health" || path.starts_with("/api/webhooks/")
}

/// Rate limiting middleware.
pub async fn rate_limit_middleware(
    State(limiter): State<Arc<RateLimiterState>>,
    request: Request<Body>,
    next: Next,
) -> Response {
    if is_exempt(request.uri().path()) {
        return next.run(request).await;
    }

    let key = request
        .headers()
        .get(USER_ID_HEADER)
        .and_then(|h| h.to_str().ok())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "anonymous".to_string());

    if !limiter.check(&key) {
        tracing::warn!(caller = %key, "Rate limit exceeded");
        return (
            StatusCode::TOO_MANY_REQUESTS,
            Json(json!({
                "error": "Rate limit exceeded. Please try again later.",
                "code": 429,
                "retry_after_seconds": limiter.period.as_secs()
            })),
        )
            .into_response();
    }

    next.run(request).await
}
