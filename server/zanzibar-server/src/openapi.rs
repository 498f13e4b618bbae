use crate::{routes::paths, server::ZanzibarServer};
use axum::{routing::get, Json, Router};
use utoipa::{
    openapi::security::{ApiKey, ApiKeyValue, SecurityScheme},
    Modify, OpenApi,
};

/// Main OpenAPI documentation structure
#[derive(OpenApi)]
#[openapi(
    paths(
        // Health endpoints
        crate::handlers::health::health_check,

        // ACL endpoints
        crate::handlers::acl::write_tuple,
        crate::handlers::acl::delete_tuple,
        crate::handlers::acl::batch_write,
        crate::handlers::acl::check_query,
        crate::handlers::acl::check_body,
        crate::handlers::acl::batch_check,
        crate::handlers::acl::accessible_relations,
        crate::handlers::acl::expand,
        crate::handlers::acl::list_by_object,
        crate::handlers::acl::list_by_user,

        // Namespace endpoints
        crate::handlers::namespace::define_namespace,
        crate::handlers::namespace::get_namespace,
        crate::handlers::namespace::get_namespace_version,
        crate::handlers::namespace::list_namespaces,
        crate::handlers::namespace::delete_namespace,
    ),
    components(
        schemas(
            crate::error::ApiErrorResponse,
            crate::handlers::health::HealthResponse,
            crate::handlers::acl::AclTuple,
            crate::handlers::acl::WriteTupleResponse,
            crate::handlers::acl::DeleteTupleResponse,
            crate::handlers::acl::BatchWriteRequest,
            crate::handlers::acl::BatchWriteResponse,
            crate::handlers::acl::CheckParams,
            crate::handlers::acl::CheckResponse,
            crate::handlers::acl::BatchCheckRequest,
            crate::handlers::acl::BatchCheckItem,
            crate::handlers::acl::BatchCheckResponse,
            crate::handlers::acl::RelationsResponse,
            crate::handlers::acl::ExpandResponse,
            crate::handlers::namespace::DefineNamespaceRequest,
            crate::handlers::namespace::DefineNamespaceResponse,
            crate::handlers::namespace::NamespaceResponse,
            crate::handlers::namespace::NamespaceListResponse,
            crate::handlers::namespace::DeleteNamespaceResponse,
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "health", description = "Service health"),
        (name = "acl", description = "Relation tuples, checks and expansion"),
        (name = "namespace", description = "Namespace definitions and their versions"),
    ),
    info(
        title = "Mini Zanzibar API",
        version = "1.0.0",
        description = "Relation-based access control: store relation tuples, define namespaces of rewrite rules and check whether a user holds a relation on an object.",
    ),
)]
pub struct ApiDoc;

/// Registers the `api_key` security scheme referenced by protected paths
struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "api_key",
                SecurityScheme::ApiKey(ApiKey::Header(ApiKeyValue::new("X-API-Key"))),
            );
        }
    }
}

async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}

/// Create OpenAPI documentation routes
pub fn create_docs_routes() -> Router<ZanzibarServer> {
    Router::new().route(paths::docs::OPENAPI_JSON, get(openapi_json))
}
