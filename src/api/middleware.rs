//! Request middleware: API key check, per-IP rate limiting and request counting.

use std::net::SocketAddr;
use std::num::NonZeroU32;
use std::sync::Arc;

use axum::extract::{ConnectInfo, Request, State};
use axum::http::HeaderMap;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use governor::clock::DefaultClock;
use governor::state::keyed::DefaultKeyedStateStore;
use governor::{Quota, RateLimiter};
use tracing::debug;

use super::error::ApiError;
use super::AppState;

/// Paths reachable without an API key.
pub const PUBLIC_PATHS: [&str; 4] = ["/", "/healthz", "/readiness", "/metrics"];

pub const API_KEY_HEADER: &str = "x-api-key";

type Limiter = RateLimiter<String, DefaultKeyedStateStore<String>, DefaultClock>;

/// Per-client rate limiter with a per-minute quota.
///
/// Once more than `cleanup_threshold` clients are tracked, keys whose quota
/// has fully replenished are dropped. Clients still inside their window keep
/// their state.
pub struct KeyedRateLimiter {
    limiter: Limiter,
    quota: Quota,
    cleanup_threshold: usize,
}

impl KeyedRateLimiter {
    pub fn per_minute(requests: u32) -> Self {
        let quota = Quota::per_minute(NonZeroU32::new(requests).unwrap_or(NonZeroU32::MIN));
        Self {
            limiter: RateLimiter::keyed(quota),
            quota,
            cleanup_threshold: 10_000,
        }
    }

    /// Returns true if the request from `key` is allowed.
    pub fn check(&self, key: &str) -> bool {
        let allowed = self.limiter.check_key(&key.to_string()).is_ok();
        if self.limiter.len() > self.cleanup_threshold {
            self.limiter.retain_recent();
            self.limiter.shrink_to_fit();
            debug!(tracked = self.limiter.len(), "Swept idle rate limit keys");
        }
        allowed
    }
}

impl std::fmt::Debug for KeyedRateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyedRateLimiter")
            .field("quota", &self.quota)
            .field("cleanup_threshold", &self.cleanup_threshold)
            .finish()
    }
}

/// Client address used as the rate limit key.
///
/// The peer address, unless `trust_proxy` is set, in which case
/// `x-forwarded-for` and then `x-real-ip` take precedence.
pub fn client_ip(headers: &HeaderMap, peer: Option<SocketAddr>, trust_proxy: bool) -> String {
    if trust_proxy {
        let forwarded = headers
            .get("x-forwarded-for")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(',').next())
            .map(str::trim)
            .filter(|v| !v.is_empty());
        if let Some(ip) = forwarded {
            return ip.to_string();
        }

        if let Some(ip) = headers
            .get("x-real-ip")
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
        {
            return ip.to_string();
        }
    }

    peer.map(|addr| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

pub async fn require_api_key(
    State(state): State<Arc<AppState>>,
    req: Request,
    next: Next,
) -> Response {
    if let Some(expected) = state.settings.server.api_key.as_deref() {
        if !PUBLIC_PATHS.contains(&req.uri().path()) {
            let provided = req
                .headers()
                .get(API_KEY_HEADER)
                .and_then(|v| v.to_str().ok());
            if provided != Some(expected) {
                return ApiError::Unauthorized.into_response();
            }
        }
    }
    next.run(req).await
}

pub async fn rate_limit(State(state): State<Arc<AppState>>, req: Request, next: Next) -> Response {
    let peer = req
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);
    let ip = client_ip(req.headers(), peer, state.settings.server.trust_proxy_headers);

    if !state.rate_limiter.check(&ip) {
        debug!(client_ip = %ip, "Rate limit exceeded");
        return ApiError::RateLimited.into_response();
    }
    next.run(req).await
}

pub async fn track_metrics(State(state): State<Arc<AppState>>, req: Request, next: Next) -> Response {
    let method = req.method().to_string();
    let response = next.run(req).await;
    state
        .metrics
        .record_request(&method, response.status().as_u16());
    response
}
