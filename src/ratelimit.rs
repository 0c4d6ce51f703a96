use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::{Duration, Instant};

use axum::{
    async_trait,
    extract::{ConnectInfo, FromRequestParts},
    http::request::Parts,
};
use tokio::sync::RwLock;
use tracing::warn;

use crate::{config::RateLimitConfig, error::ApiError, state::AppState};

struct Window {
    count: u32,
    started: Instant,
}

/// Shared fixed-window counter keyed by client + route.
pub struct RateLimiter {
    windows: RwLock<HashMap<String, Window>>,
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new()
    }
}

impl RateLimiter {
    pub fn new() -> Self {
        Self {
            windows: RwLock::new(HashMap::new()),
        }
    }

    /// Count one request for `key`. `Err(retry_after_secs)` when the window
    /// budget is spent.
    pub async fn check(&self, key: &str, budget: RateLimitConfig) -> Result<(), u64> {
        let window_len = Duration::from_secs(budget.seconds);
        let mut windows = self.windows.write().await;

        if windows.len() > 4096 {
            windows.retain(|_, w| w.started.elapsed() < window_len);
        }

        match windows.get_mut(key) {
            Some(window) if window.started.elapsed() < window_len => {
                if window.count >= budget.times {
                    let elapsed = window.started.elapsed().as_secs();
                    Err(budget.seconds.saturating_sub(elapsed).max(1))
                } else {
                    window.count += 1;
                    Ok(())
                }
            }
            _ => {
                windows.insert(
                    key.to_string(),
                    Window {
                        count: 1,
                        started: Instant::now(),
                    },
                );
                Ok(())
            }
        }
    }
}

/// Best identifier we have for the caller: forwarded headers first, then
/// the peer address.
fn client_id(parts: &Parts) -> String {
    let headers = &parts.headers;
    if let Some(forwarded) = headers.get("x-forwarded-for").and_then(|v| v.to_str().ok()) {
        if let Some(first) = forwarded.split(',').next() {
            return first.trim().to_string();
        }
    }
    if let Some(real_ip) = headers.get("x-real-ip").and_then(|v| v.to_str().ok()) {
        return real_ip.to_string();
    }
    parts
        .extensions
        .get::<ConnectInfo<SocketAddr>>()
        .map(|info| info.0.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

/// Route guard: listing it as a handler argument throttles the route with
/// the configured per-route budget.
#[derive(Debug)]
pub struct Throttle;

#[async_trait]
impl FromRequestParts<AppState> for Throttle {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, ApiError> {
        let client = client_id(parts);
        let key = format!("{}:{}", client, parts.uri.path());

        match state.limiter.check(&key, state.config.rate_limit).await {
            Ok(()) => Ok(Throttle),
            Err(retry_after) => {
                warn!(%client, path = %parts.uri.path(), retry_after, "request throttled");
                Err(ApiError::TooManyRequests { retry_after })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn budget(times: u32, seconds: u64) -> RateLimitConfig {
        RateLimitConfig { times, seconds }
    }

    #[tokio::test]
    async fn allows_up_to_budget_then_rejects() {
        let limiter = RateLimiter::new();
        let b = budget(2, 5);
        assert!(limiter.check("1.2.3.4:/api/contacts", b).await.is_ok());
        assert!(limiter.check("1.2.3.4:/api/contacts", b).await.is_ok());
        let retry_after = limiter
            .check("1.2.3.4:/api/contacts", b)
            .await
            .expect_err("third request should be throttled");
        assert!(retry_after >= 1);
    }

    #[tokio::test]
    async fn keys_are_independent() {
        let limiter = RateLimiter::new();
        let b = budget(1, 5);
        assert!(limiter.check("1.2.3.4:/api/contacts", b).await.is_ok());
        assert!(limiter.check("1.2.3.4:/api/contacts", b).await.is_err());
        // Другой клиент и другой маршрут не делят окно
        assert!(limiter.check("5.6.7.8:/api/contacts", b).await.is_ok());
        assert!(limiter.check("1.2.3.4:/api/week_birthday/", b).await.is_ok());
    }

    #[tokio::test]
    async fn window_expiry_resets_budget() {
        let limiter = RateLimiter::new();
        let b = budget(1, 0);
        assert!(limiter.check("c", b).await.is_ok());
        // Zero-length window: the first window is already expired
        assert!(limiter.check("c", b).await.is_ok());
    }

    #[tokio::test]
    async fn throttle_guard_rejects_after_budget() {
        use axum::http::StatusCode;

        // fake() config allows 2 requests per 5 seconds
        let state = AppState::fake();
        let request = axum::http::Request::builder()
            .uri("/api/contacts")
            .header("x-forwarded-for", "9.9.9.9")
            .body(())
            .unwrap();
        let (mut parts, _) = request.into_parts();

        assert!(Throttle::from_request_parts(&mut parts, &state).await.is_ok());
        assert!(Throttle::from_request_parts(&mut parts, &state).await.is_ok());
        let err = Throttle::from_request_parts(&mut parts, &state)
            .await
            .expect_err("third request should be throttled");
        assert_eq!(err.status(), StatusCode::TOO_MANY_REQUESTS);
    }
}
