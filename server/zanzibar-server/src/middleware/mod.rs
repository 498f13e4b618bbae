//! Middleware for request processing

pub mod auth_context;
pub mod rate_limit;

pub use auth_context::{ApiClient, AuthContext, ClientRegistry, API_KEY_HEADER};
pub use rate_limit::{rate_limit_middleware, RateLimitConfig, RateLimiter};

use crate::{error::ApiError, server::ZanzibarServer};
use axum::{
    extract::{Request, State},
    http::{header, HeaderName, HeaderValue, Method},
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::any::Any as PanicPayload;
use std::time::{Duration, Instant};
use tower_http::cors::{Any, CorsLayer};
use tower_http::set_header::SetResponseHeaderLayer;

/// Request timing middleware
pub async fn request_timing_middleware(request: Request, next: Next) -> Response {
    let start = Instant::now();
    let method = request.method().clone();
    let uri = request.uri().clone();

    let response = next.run(request).await;

    let elapsed = start.elapsed();

    tracing::info!(
        method = %method,
        uri = %uri,
        duration_ms = elapsed.as_millis(),
        status = response.status().as_u16(),
        "Request processed"
    );

    response
}

/// Audit logging middleware
///
/// Records which client issued each request. Rejection of bad credentials is
/// left to the `AuthContext` extractor; here an unknown key is only logged.
pub async fn audit_logging_middleware(
    State(server): State<ZanzibarServer>,
    request: Request,
    next: Next,
) -> Response {
    let method = request.method().clone();
    let uri = request.uri().clone();
    let caller = auth_context::extract_api_key(request.headers())
        .map_or_else(
            || "anonymous".to_string(),
            |key| {
                server
                    .clients
                    .get(key)
                    .map_or_else(|| "unknown".to_string(), |client| client.name.clone())
            },
        );

    tracing::info!(
        method = %method,
        uri = %uri,
        caller = %caller,
        timestamp = %chrono::Utc::now().to_rfc3339(),
        "Audit log: Request received"
    );

    let response = next.run(request).await;

    tracing::info!(
        method = %method,
        uri = %uri,
        caller = %caller,
        status = response.status().as_u16(),
        timestamp = %chrono::Utc::now().to_rfc3339(),
        "Audit log: Response sent"
    );

    response
}

/// CORS layer for browser callers such as the document UI
pub fn create_cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers([
            header::AUTHORIZATION,
            header::CONTENT_TYPE,
            header::ACCEPT,
            HeaderName::from_static(API_KEY_HEADER),
        ])
        .max_age(Duration::from_secs(3600))
}

/// Headers added to every response
pub fn security_headers() -> Vec<SetResponseHeaderLayer<HeaderValue>> {
    [
        (header::X_CONTENT_TYPE_OPTIONS, "nosniff"),
        (header::X_FRAME_OPTIONS, "DENY"),
        (header::REFERRER_POLICY, "strict-origin-when-cross-origin"),
        (header::CONTENT_SECURITY_POLICY, "default-src 'self'"),
        (
            header::STRICT_TRANSPORT_SECURITY,
            "max-age=31536000; includeSubDomains",
        ),
    ]
    .into_iter()
    .map(|(name, value)| {
        SetResponseHeaderLayer::overriding(name, HeaderValue::from_static(value))
    })
    .collect()
}

/// Turn a handler panic into a 500 error body instead of a dropped connection
pub fn handle_panic(payload: Box<dyn PanicPayload + Send + 'static>) -> Response {
    let detail = payload
        .downcast_ref::<String>()
        .map(String::as_str)
        .or_else(|| payload.downcast_ref::<&str>().copied())
        .unwrap_or("unknown panic payload");
    tracing::error!(panic = %detail, "Handler panicked");

    ApiError::Internal {
        message: detail.to_string(),
    }
    .into_response()
}
