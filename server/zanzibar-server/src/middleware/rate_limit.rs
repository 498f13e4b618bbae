//! Fixed-window rate limiting per caller
//!
//! Callers are keyed by API client when they present a known key, otherwise
//! by peer address. The health endpoint is never limited.

use crate::{config::ServerSettings, error::ApiError, routes::paths, server::ZanzibarServer};
use axum::{
    extract::{ConnectInfo, Request, State},
    http::{HeaderName, HeaderValue},
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

use super::auth_context;

pub const LIMIT_HEADER: &str = "x-ratelimit-limit";
pub const REMAINING_HEADER: &str = "x-ratelimit-remaining";

/// Entries beyond this count trigger a sweep of expired windows
const SWEEP_THRESHOLD: usize = 10_000;

/// Rate limit configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitConfig {
    /// Maximum requests per window
    pub max_requests: u32,
    pub window: Duration,
}

impl RateLimitConfig {
    /// `None` when rate limiting is turned off
    pub fn from_settings(settings: &ServerSettings) -> Option<Self> {
        (settings.rate_limit_requests > 0).then(|| Self {
            max_requests: settings.rate_limit_requests,
            window: Duration::from_secs(settings.rate_limit_window_secs.max(1)),
        })
    }
}

#[derive(Debug, Clone)]
struct RateLimitEntry {
    count: u32,
    window_start: Instant,
}

/// In-memory rate limiter for a single server instance
#[derive(Debug)]
pub struct RateLimiter {
    entries: Arc<RwLock<HashMap<String, RateLimitEntry>>>,
    config: RateLimitConfig,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            entries: Arc::new(RwLock::new(HashMap::new())),
            config,
        }
    }

    pub fn config(&self) -> RateLimitConfig {
        self.config
    }

    /// Count one request for `key`; returns the requests left in the window
    ///
    /// # Errors
    /// `RateLimited` once `key` has used up the current window.
    pub async fn check(&self, key: &str) -> Result<u32, ApiError> {
        let mut entries = self.entries.write().await;
        let window = self.config.window;

        if entries.len() > SWEEP_THRESHOLD {
            entries.retain(|_, entry| entry.window_start.elapsed() < window);
        }

        let now = Instant::now();
        let entry = entries.entry(key.to_string()).or_insert_with(|| RateLimitEntry {
            count: 0,
            window_start: now,
        });

        if entry.window_start.elapsed() >= window {
            entry.count = 0;
            entry.window_start = now;
        }

        if entry.count >= self.config.max_requests {
            return Err(ApiError::rate_limit(format!(
                "{} requests per {} seconds",
                self.config.max_requests,
                window.as_secs()
            )));
        }

        entry.count += 1;
        Ok(self.config.max_requests - entry.count)
    }
}

/// Key a request by client name, falling back to the peer address
fn caller_key(server: &ZanzibarServer, request: &Request) -> String {
    if let Some(client) =
        auth_context::extract_api_key(request.headers()).and_then(|key| server.clients.get(key))
    {
        return format!("client:{}", client.name);
    }
    request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map_or_else(|| "ip:unknown".to_string(), |info| format!("ip:{}", info.0.ip()))
}

/// Rate limiting middleware
pub async fn rate_limit_middleware(
    State(server): State<ZanzibarServer>,
    request: Request,
    next: Next,
) -> Response {
    let Some(limiter) = server.rate_limiter.clone() else {
        return next.run(request).await;
    };
    if request.uri().path() == paths::health::HEALTH {
        return next.run(request).await;
    }

    let key = caller_key(&server, &request);
    let remaining = match limiter.check(&key).await {
        Ok(remaining) => remaining,
        Err(err) => {
            tracing::warn!(caller = %key, "Rate limit exceeded");
            return err.into_response();
        }
    };

    let mut response = next.run(request).await;
    let headers = response.headers_mut();
    headers.insert(
        HeaderName::from_static(LIMIT_HEADER),
        HeaderValue::from(limiter.config().max_requests),
    );
    headers.insert(
        HeaderName::from_static(REMAINING_HEADER),
        HeaderValue::from(remaining),
    );
    response
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limiter(max_requests: u32, window: Duration) -> RateLimiter {
        RateLimiter::new(RateLimitConfig {
            max_requests,
            window,
        })
    }

    #[tokio::test]
    async fn test_limit_applies_per_key() {
        let limiter = limiter(2, Duration::from_secs(60));

        assert_eq!(limiter.check("client:a").await.unwrap(), 1);
        assert_eq!(limiter.check("client:a").await.unwrap(), 0);
        let err = limiter.check("client:a").await.unwrap_err();
        assert!(matches!(err, ApiError::RateLimited { .. }));

        // Other callers have their own window
        assert_eq!(limiter.check("client:b").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_window_resets() {
        let limiter = limiter(1, Duration::from_millis(20));

        limiter.check("ip:10.0.0.1").await.unwrap();
        assert!(limiter.check("ip:10.0.0.1").await.is_err());

        tokio::time::sleep(Duration::from_millis(30)).await;
        assert!(limiter.check("ip:10.0.0.1").await.is_ok());
    }

    #[test]
    fn test_zero_requests_disables_limiting() {
        let mut settings = ServerSettings::default();
        assert_eq!(
            RateLimitConfig::from_settings(&settings),
            Some(RateLimitConfig {
                max_requests: 100,
                window: Duration::from_secs(60),
            })
        );

        settings.rate_limit_requests = 0;
        assert!(RateLimitConfig::from_settings(&settings).is_none());
    }
}
