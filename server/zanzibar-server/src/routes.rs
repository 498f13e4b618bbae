pub mod paths;

use crate::{
    handlers::{acl, health, namespace},
    openapi,
    server::ZanzibarServer,
};
use axum::{
    routing::{get, post},
    Router,
};

/// Create health check routes
pub fn health_routes() -> Router<ZanzibarServer> {
    Router::new().route(paths::health::HEALTH, get(health::health_check))
}

/// Create tuple and check routes
pub fn acl_routes() -> Router<ZanzibarServer> {
    Router::new()
        .route(
            paths::acl::ACL,
            post(acl::write_tuple).delete(acl::delete_tuple),
        )
        .route(paths::acl::BATCH, post(acl::batch_write))
        .route(
            paths::acl::CHECK,
            get(acl::check_query).post(acl::check_body),
        )
        .route(paths::acl::CHECK_BATCH, post(acl::batch_check))
        .route(paths::acl::RELATIONS, get(acl::accessible_relations))
        .route(paths::acl::EXPAND, get(acl::expand))
        .route(paths::acl::BY_OBJECT, get(acl::list_by_object))
        .route(paths::acl::BY_USER, get(acl::list_by_user))
}

/// Create namespace management routes
pub fn namespace_routes() -> Router<ZanzibarServer> {
    Router::new()
        .route(paths::namespace::NAMESPACE, post(namespace::define_namespace))
        .route(paths::namespace::NAMESPACES, get(namespace::list_namespaces))
        .route(
            paths::namespace::BY_NAME,
            get(namespace::get_namespace).delete(namespace::delete_namespace),
        )
        .route(
            paths::namespace::BY_VERSION,
            get(namespace::get_namespace_version),
        )
}

/// Unversioned aliases of the write, check and define operations
pub fn legacy_routes() -> Router<ZanzibarServer> {
    Router::new()
        .route(paths::legacy::ACL, post(acl::write_tuple))
        .route(paths::legacy::ACL_CHECK, get(acl::check_query))
        .route(paths::legacy::NAMESPACE, post(namespace::define_namespace))
}

/// Create all application routes
pub fn create_routes() -> Router<ZanzibarServer> {
    Router::new()
        .merge(health_routes())
        .merge(legacy_routes())
        .merge(openapi::create_docs_routes())
        .nest(
            paths::API_V1,
            Router::new().merge(acl_routes()).merge(namespace_routes()),
        )
}
