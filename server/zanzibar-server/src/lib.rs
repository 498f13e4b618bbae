//! Mini Zanzibar Server - relation-based access control API
//!
//! This library provides the HTTP surface of the authorization engine:
//! tuple writes, checks, expansion, namespace management and the
//! authentication of API clients.

pub mod config;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod openapi;
pub mod routes;
pub mod server;

// Re-export commonly used types
pub use config::Settings;
pub use error::*;
pub use server::ZanzibarServer;

use axum::{
    middleware::{from_fn, from_fn_with_state},
    Router,
};
use tower::ServiceBuilder;
use tower_http::{catch_panic::CatchPanicLayer, trace::TraceLayer};

/// Create the main application router with all routes and middleware
pub fn create_app(server: ZanzibarServer) -> Router {
    with_middleware(routes::create_routes(), server)
}

/// Wrap `routes` in the request pipeline: tracing, security headers, panic
/// recovery, timing, audit and rate limiting, outermost first
fn with_middleware(routes: Router<ZanzibarServer>, server: ZanzibarServer) -> Router {
    let mut router = routes.layer(
        ServiceBuilder::new()
            .layer(from_fn(middleware::request_timing_middleware))
            .layer(from_fn_with_state(
                server.clone(),
                middleware::audit_logging_middleware,
            ))
            .layer(from_fn_with_state(
                server.clone(),
                middleware::rate_limit_middleware,
            )),
    );
    router = router.layer(CatchPanicLayer::custom(middleware::handle_panic));
    for header in middleware::security_headers() {
        router = router.layer(header);
    }
    router = router.layer(TraceLayer::new_for_http());

    if server.settings.server.enable_cors {
        router = router.layer(middleware::create_cors_layer());
    }

    router.with_state(server)
}
