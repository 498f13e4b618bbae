use crate::{
    error::{api_success, ApiErrorResponse, ApiResponse, Result},
    middleware::AuthContext,
    server::ZanzibarServer,
};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use utoipa::ToSchema;
use zanzibar_core::{NamespaceDefinition, RelationConfig};

/// Namespace definition as submitted by administrators
#[derive(Debug, Deserialize, ToSchema)]
pub struct DefineNamespaceRequest {
    #[schema(example = "doc")]
    pub namespace: String,
    /// Relation name to rule, e.g.
    /// `{"viewer": {"union": [{"this": {}}, {"computed_userset": {"relation": "editor"}}]}}`
    #[schema(value_type = Object)]
    pub relations: HashMap<String, RelationConfig>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct DefineNamespaceResponse {
    pub namespace: String,
    pub version: u32,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct NamespaceResponse {
    pub namespace: String,
    #[schema(value_type = Object)]
    pub relations: HashMap<String, RelationConfig>,
    pub version: u32,
    pub created_at: DateTime<Utc>,
    /// Relations on a computed-userset cycle; checks through them are denied
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub cyclic_relations: Vec<String>,
}

impl From<&NamespaceDefinition> for NamespaceResponse {
    fn from(definition: &NamespaceDefinition) -> Self {
        Self {
            namespace: definition.name.clone(),
            relations: definition.to_config(),
            version: definition.version,
            created_at: definition.created_at,
            cyclic_relations: definition.cyclic_relations(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct NamespaceListResponse {
    pub namespaces: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct DeleteNamespaceResponse {
    pub namespace: String,
    pub deleted: bool,
}

/// Define or replace a namespace; each definition gets the next version
#[utoipa::path(
    post,
    path = "/api/v1/namespace",
    request_body = DefineNamespaceRequest,
    responses(
        (status = 201, description = "Namespace defined", body = DefineNamespaceResponse),
        (status = 400, description = "Invalid namespace definition", body = ApiErrorResponse),
        (status = 401, description = "Missing or unknown API key", body = ApiErrorResponse),
        (status = 403, description = "Client may not manage namespaces", body = ApiErrorResponse)
    ),
    tag = "namespace",
    security(("api_key" = []))
)]
pub async fn define_namespace(
    State(server): State<ZanzibarServer>,
    auth: AuthContext,
    Json(request): Json<DefineNamespaceRequest>,
) -> Result<(StatusCode, Json<ApiResponse<DefineNamespaceResponse>>)> {
    auth.require_namespace_admin()?;

    let definition = server
        .engine()
        .define_namespace_config(&request.namespace, &request.relations)?;
    tracing::info!(
        client = %auth.client.name,
        namespace = %definition.name,
        version = definition.version,
        "Namespace defined via API"
    );

    Ok((
        StatusCode::CREATED,
        Json(api_success(DefineNamespaceResponse {
            namespace: definition.name.clone(),
            version: definition.version,
        })),
    ))
}

/// Latest definition of a namespace
#[utoipa::path(
    get,
    path = "/api/v1/namespace/{namespace}",
    params(("namespace" = String, Path, description = "Namespace name")),
    responses(
        (status = 200, description = "Namespace found", body = NamespaceResponse),
        (status = 401, description = "Missing or unknown API key", body = ApiErrorResponse),
        (status = 404, description = "Namespace not defined", body = ApiErrorResponse)
    ),
    tag = "namespace",
    security(("api_key" = []))
)]
pub async fn get_namespace(
    State(server): State<ZanzibarServer>,
    _auth: AuthContext,
    Path(namespace): Path<String>,
) -> Result<Json<ApiResponse<NamespaceResponse>>> {
    let definition = server.engine().get_namespace(&namespace)?;
    Ok(Json(api_success(NamespaceResponse::from(definition.as_ref()))))
}

/// A specific historical version of a namespace
#[utoipa::path(
    get,
    path = "/api/v1/namespace/{namespace}/version/{version}",
    params(
        ("namespace" = String, Path, description = "Namespace name"),
        ("version" = u32, Path, description = "Version number, starting at 1")
    ),
    responses(
        (status = 200, description = "Namespace version found", body = NamespaceResponse),
        (status = 401, description = "Missing or unknown API key", body = ApiErrorResponse),
        (status = 404, description = "Namespace or version not found", body = ApiErrorResponse)
    ),
    tag = "namespace",
    security(("api_key" = []))
)]
pub async fn get_namespace_version(
    State(server): State<ZanzibarServer>,
    _auth: AuthContext,
    Path((namespace, version)): Path<(String, u32)>,
) -> Result<Json<ApiResponse<NamespaceResponse>>> {
    let definition = server.engine().get_namespace_version(&namespace, version)?;
    Ok(Json(api_success(NamespaceResponse::from(definition.as_ref()))))
}

/// Names of all defined namespaces
#[utoipa::path(
    get,
    path = "/api/v1/namespaces",
    responses(
        (status = 200, description = "Namespace names", body = NamespaceListResponse),
        (status = 401, description = "Missing or unknown API key", body = ApiErrorResponse)
    ),
    tag = "namespace",
    security(("api_key" = []))
)]
pub async fn list_namespaces(
    State(server): State<ZanzibarServer>,
    _auth: AuthContext,
) -> Json<ApiResponse<NamespaceListResponse>> {
    Json(api_success(NamespaceListResponse {
        namespaces: server.engine().list_namespaces(),
    }))
}

/// Delete a namespace and its history. Stored tuples are kept, but checks
/// against the namespace fail until it is defined again.
#[utoipa::path(
    delete,
    path = "/api/v1/namespace/{namespace}",
    params(("namespace" = String, Path, description = "Namespace name")),
    responses(
        (status = 200, description = "Namespace deleted", body = DeleteNamespaceResponse),
        (status = 401, description = "Missing or unknown API key", body = ApiErrorResponse),
        (status = 403, description = "Client may not manage namespaces", body = ApiErrorResponse),
        (status = 404, description = "Namespace not defined", body = ApiErrorResponse)
    ),
    tag = "namespace",
    security(("api_key" = []))
)]
pub async fn delete_namespace(
    State(server): State<ZanzibarServer>,
    auth: AuthContext,
    Path(namespace): Path<String>,
) -> Result<Json<ApiResponse<DeleteNamespaceResponse>>> {
    auth.require_namespace_admin()?;

    server.engine().delete_namespace(&namespace)?;
    tracing::info!(client = %auth.client.name, namespace = %namespace, "Namespace deleted via API");

    Ok(Json(api_success(DeleteNamespaceResponse {
        namespace,
        deleted: true,
    })))
}
