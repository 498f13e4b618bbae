use crate::{
    error::{
        api_success, api_success_with_meta, ApiError, ApiErrorResponse, ApiResponse,
        ResponseMetadata, Result,
    },
    middleware::AuthContext,
    server::ZanzibarServer,
};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use zanzibar_core::{CheckRequest, CheckResult, Identifier, Page, Tuple, UsersetTree, WriteRequest};

/// Upper bound on the number of checks or writes in one batch request
pub const MAX_BATCH_SIZE: usize = 100;

/// One relation tuple in wire form
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AclTuple {
    /// Object identifier, `type:id`
    #[schema(example = "doc:readme")]
    pub object: String,
    #[schema(example = "viewer")]
    pub relation: String,
    /// User identifier, `type:id`
    #[schema(example = "user:alice")]
    pub user: String,
}

impl AclTuple {
    fn to_tuple(&self) -> Result<Tuple> {
        Ok(Tuple::parse(&self.object, &self.relation, &self.user)?)
    }

    fn to_check(&self) -> Result<CheckRequest> {
        let tuple = self.to_tuple()?;
        Ok(CheckRequest::new(tuple.object, &tuple.relation, tuple.user))
    }
}

impl From<&Tuple> for AclTuple {
    fn from(tuple: &Tuple) -> Self {
        Self {
            object: tuple.object.to_string(),
            relation: tuple.relation.clone(),
            user: tuple.user.to_string(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct WriteTupleResponse {
    /// `false` when the tuple was already stored
    pub inserted: bool,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct DeleteTupleResponse {
    /// `false` when there was nothing to delete
    pub existed: bool,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct BatchWriteRequest {
    #[serde(default)]
    pub writes: Vec<AclTuple>,
    #[serde(default)]
    pub deletes: Vec<AclTuple>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct BatchWriteResponse {
    pub inserted: Vec<bool>,
    pub deleted: Vec<bool>,
}

/// Check parameters, accepted as a query string or a JSON body
#[derive(Debug, Clone, Deserialize, ToSchema, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct CheckParams {
    /// Object identifier, `type:id`
    pub object: String,
    pub relation: String,
    /// User identifier, `type:id`
    pub user: String,
    /// Shorter deadline for this check; capped at the configured timeout
    pub timeout_ms: Option<u64>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CheckResponse {
    pub authorized: bool,
    /// Cycle or depth cuts met while evaluating, each of which denied its
    /// path. Only reported when debug tracing is enabled.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub anomalies: Vec<String>,
    /// Evaluation steps, present when debug tracing is enabled
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trace: Option<Vec<String>>,
}

impl CheckResponse {
    /// Anomalies are exposed only when `debug` is set
    fn new(result: CheckResult, debug: bool) -> Self {
        let anomalies = if debug {
            result.anomalies.iter().map(ToString::to_string).collect()
        } else {
            Vec::new()
        };
        Self {
            authorized: result.authorized,
            anomalies,
            trace: result.trace,
        }
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct BatchCheckRequest {
    pub checks: Vec<AclTuple>,
}

/// Outcome of one check in a batch; exactly one of `authorized` and `error` is set
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct BatchCheckItem {
    pub object: String,
    pub relation: String,
    pub user: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub authorized: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct BatchCheckResponse {
    pub results: Vec<BatchCheckItem>,
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct RelationsParams {
    pub object: String,
    pub user: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct RelationsResponse {
    pub object: String,
    pub user: String,
    pub relations: Vec<String>,
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ExpandParams {
    pub object: String,
    pub relation: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ExpandResponse {
    pub object: String,
    pub relation: String,
    /// Every user holding the relation, sorted
    pub users: Vec<String>,
    /// How each user is reached
    #[schema(value_type = Object)]
    pub tree: UsersetTree,
}

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct PageParams {
    /// 1-based page number
    pub page: Option<usize>,
    /// Tuples per page, at most 1000
    pub page_size: Option<usize>,
}

// =============================================================================
// Tuple writes
// =============================================================================

/// Write a relation tuple
#[utoipa::path(
    post,
    path = "/api/v1/acl",
    request_body = AclTuple,
    responses(
        (status = 201, description = "Tuple written", body = WriteTupleResponse),
        (status = 400, description = "Malformed identifier or relation", body = ApiErrorResponse),
        (status = 401, description = "Missing or unknown API key", body = ApiErrorResponse),
        (status = 403, description = "Client may not write tuples", body = ApiErrorResponse),
        (status = 404, description = "Namespace or relation not defined", body = ApiErrorResponse)
    ),
    tag = "acl",
    security(("api_key" = []))
)]
pub async fn write_tuple(
    State(server): State<ZanzibarServer>,
    auth: AuthContext,
    Json(request): Json<AclTuple>,
) -> Result<(StatusCode, Json<ApiResponse<WriteTupleResponse>>)> {
    auth.require_tuple_writer()?;
    let tuple = request.to_tuple()?;

    let inserted = server.engine().write_tuple(&tuple).await?;
    tracing::info!(client = %auth.client.name, tuple = %tuple, inserted, "ACL tuple written");

    Ok((
        StatusCode::CREATED,
        Json(api_success(WriteTupleResponse { inserted })),
    ))
}

/// Delete a relation tuple
#[utoipa::path(
    delete,
    path = "/api/v1/acl",
    request_body = AclTuple,
    responses(
        (status = 200, description = "Tuple deleted or absent", body = DeleteTupleResponse),
        (status = 400, description = "Malformed identifier or relation", body = ApiErrorResponse),
        (status = 401, description = "Missing or unknown API key", body = ApiErrorResponse),
        (status = 403, description = "Client may not write tuples", body = ApiErrorResponse)
    ),
    tag = "acl",
    security(("api_key" = []))
)]
pub async fn delete_tuple(
    State(server): State<ZanzibarServer>,
    auth: AuthContext,
    Json(request): Json<AclTuple>,
) -> Result<Json<ApiResponse<DeleteTupleResponse>>> {
    auth.require_tuple_writer()?;
    let tuple = request.to_tuple()?;

    let existed = server.engine().delete_tuple(&tuple).await?;
    tracing::info!(client = %auth.client.name, tuple = %tuple, existed, "ACL tuple deleted");

    Ok(Json(api_success(DeleteTupleResponse { existed })))
}

/// Apply several writes and deletes; not transactional
#[utoipa::path(
    post,
    path = "/api/v1/acl/batch",
    request_body = BatchWriteRequest,
    responses(
        (status = 200, description = "Batch applied", body = BatchWriteResponse),
        (status = 400, description = "Malformed tuple or batch too large", body = ApiErrorResponse),
        (status = 401, description = "Missing or unknown API key", body = ApiErrorResponse),
        (status = 403, description = "Client may not write tuples", body = ApiErrorResponse),
        (status = 404, description = "Namespace or relation not defined", body = ApiErrorResponse)
    ),
    tag = "acl",
    security(("api_key" = []))
)]
pub async fn batch_write(
    State(server): State<ZanzibarServer>,
    auth: AuthContext,
    Json(request): Json<BatchWriteRequest>,
) -> Result<Json<ApiResponse<BatchWriteResponse>>> {
    auth.require_tuple_writer()?;
    if request.writes.len().saturating_add(request.deletes.len()) > MAX_BATCH_SIZE {
        return Err(ApiError::validation(format!(
            "A batch may hold at most {MAX_BATCH_SIZE} tuples"
        )));
    }

    let write_request = WriteRequest {
        writes: request
            .writes
            .iter()
            .map(AclTuple::to_tuple)
            .collect::<Result<_>>()?,
        deletes: request
            .deletes
            .iter()
            .map(AclTuple::to_tuple)
            .collect::<Result<_>>()?,
    };

    let response = server.engine().batch_write(&write_request).await?;
    Ok(Json(api_success(BatchWriteResponse {
        inserted: response.inserted,
        deleted: response.deleted,
    })))
}

// =============================================================================
// Checks
// =============================================================================

async fn run_check(server: &ZanzibarServer, params: &CheckParams) -> Result<CheckResponse> {
    let request = AclTuple {
        object: params.object.clone(),
        relation: params.relation.clone(),
        user: params.user.clone(),
    }
    .to_check()?;

    let result = server
        .engine()
        .check_with_deadline(&request, server.check_timeout(params.timeout_ms))
        .await?;
    Ok(CheckResponse::new(
        result,
        server.engine().config().debug_trace,
    ))
}

/// Check whether a user holds a relation on an object
#[utoipa::path(
    get,
    path = "/api/v1/acl/check",
    params(CheckParams),
    responses(
        (status = 200, description = "Check decided", body = CheckResponse),
        (status = 400, description = "Malformed identifier or relation", body = ApiErrorResponse),
        (status = 404, description = "Namespace or relation not defined", body = ApiErrorResponse),
        (status = 504, description = "Check deadline exceeded", body = ApiErrorResponse)
    ),
    tag = "acl"
)]
pub async fn check_query(
    State(server): State<ZanzibarServer>,
    Query(params): Query<CheckParams>,
) -> Result<Json<ApiResponse<CheckResponse>>> {
    Ok(Json(api_success(run_check(&server, &params).await?)))
}

/// Check with the parameters in a JSON body
#[utoipa::path(
    post,
    path = "/api/v1/acl/check",
    request_body = CheckParams,
    responses(
        (status = 200, description = "Check decided", body = CheckResponse),
        (status = 400, description = "Malformed identifier or relation", body = ApiErrorResponse),
        (status = 404, description = "Namespace or relation not defined", body = ApiErrorResponse),
        (status = 504, description = "Check deadline exceeded", body = ApiErrorResponse)
    ),
    tag = "acl"
)]
pub async fn check_body(
    State(server): State<ZanzibarServer>,
    Json(params): Json<CheckParams>,
) -> Result<Json<ApiResponse<CheckResponse>>> {
    Ok(Json(api_success(run_check(&server, &params).await?)))
}

/// Evaluate several checks concurrently; failures are reported per item
#[utoipa::path(
    post,
    path = "/api/v1/acl/check/batch",
    request_body = BatchCheckRequest,
    responses(
        (status = 200, description = "Checks decided", body = BatchCheckResponse),
        (status = 400, description = "Malformed tuple or batch too large", body = ApiErrorResponse)
    ),
    tag = "acl"
)]
pub async fn batch_check(
    State(server): State<ZanzibarServer>,
    Json(request): Json<BatchCheckRequest>,
) -> Result<Json<ApiResponse<BatchCheckResponse>>> {
    if request.checks.len() > MAX_BATCH_SIZE {
        return Err(ApiError::validation(format!(
            "A batch may hold at most {MAX_BATCH_SIZE} checks"
        )));
    }

    let checks = request
        .checks
        .iter()
        .map(AclTuple::to_check)
        .collect::<Result<Vec<_>>>()?;

    let outcomes = server.engine().batch_check(&checks).await;
    let results = request
        .checks
        .into_iter()
        .zip(outcomes)
        .map(|(check, outcome)| {
            let (authorized, error, error_code) = match outcome {
                Ok(result) => (Some(result.authorized), None, None),
                Err(err) => {
                    let err = ApiError::from(err);
                    (None, Some(err.to_string()), Some(err.error_code().to_string()))
                }
            };
            BatchCheckItem {
                object: check.object,
                relation: check.relation,
                user: check.user,
                authorized,
                error,
                error_code,
            }
        })
        .collect();

    Ok(Json(api_success(BatchCheckResponse { results })))
}

/// Relations of the object's namespace the user holds
#[utoipa::path(
    get,
    path = "/api/v1/acl/relations",
    params(RelationsParams),
    responses(
        (status = 200, description = "Relations held", body = RelationsResponse),
        (status = 400, description = "Malformed identifier", body = ApiErrorResponse),
        (status = 404, description = "Namespace not defined", body = ApiErrorResponse)
    ),
    tag = "acl"
)]
pub async fn accessible_relations(
    State(server): State<ZanzibarServer>,
    Query(params): Query<RelationsParams>,
) -> Result<Json<ApiResponse<RelationsResponse>>> {
    let object = Identifier::parse(&params.object)?;
    let user = Identifier::parse(&params.user)?;

    let relations = server.engine().accessible_relations(&object, &user).await?;
    Ok(Json(api_success(RelationsResponse {
        object: params.object,
        user: params.user,
        relations,
    })))
}

/// List the users holding a relation
#[utoipa::path(
    get,
    path = "/api/v1/acl/expand",
    params(ExpandParams),
    responses(
        (status = 200, description = "Relation expanded", body = ExpandResponse),
        (status = 400, description = "Malformed identifier", body = ApiErrorResponse),
        (status = 401, description = "Missing or unknown API key", body = ApiErrorResponse),
        (status = 404, description = "Namespace or relation not defined", body = ApiErrorResponse)
    ),
    tag = "acl",
    security(("api_key" = []))
)]
pub async fn expand(
    State(server): State<ZanzibarServer>,
    _auth: AuthContext,
    Query(params): Query<ExpandParams>,
) -> Result<Json<ApiResponse<ExpandResponse>>> {
    let object = Identifier::parse(&params.object)?;

    let tree = server.engine().expand(&object, &params.relation).await?;
    let users = tree.users().iter().map(ToString::to_string).collect();
    Ok(Json(api_success(ExpandResponse {
        object: params.object,
        relation: params.relation,
        users,
        tree,
    })))
}

// =============================================================================
// Listings
// =============================================================================

/// List the tuples stored against an object
#[utoipa::path(
    get,
    path = "/api/v1/acl/object/{object}",
    params(("object" = String, Path, description = "Object identifier, type:id"), PageParams),
    responses(
        (status = 200, description = "Tuples of the object", body = Vec<AclTuple>),
        (status = 400, description = "Malformed identifier", body = ApiErrorResponse),
        (status = 401, description = "Missing or unknown API key", body = ApiErrorResponse)
    ),
    tag = "acl",
    security(("api_key" = []))
)]
pub async fn list_by_object(
    State(server): State<ZanzibarServer>,
    _auth: AuthContext,
    Path(object): Path<String>,
    Query(params): Query<PageParams>,
) -> Result<Json<ApiResponse<Vec<AclTuple>>>> {
    let object = Identifier::parse(&object)?;
    let page = Page::new(params.page, params.page_size);

    let listing = server.engine().list_tuples_by_object(&object, page).await?;
    let tuples = listing.tuples.iter().map(AclTuple::from).collect();
    Ok(Json(api_success_with_meta(
        tuples,
        ResponseMetadata::for_page(page, listing.total),
    )))
}

/// List the tuples granting anything to a user
#[utoipa::path(
    get,
    path = "/api/v1/acl/user/{user}",
    params(("user" = String, Path, description = "User identifier, type:id"), PageParams),
    responses(
        (status = 200, description = "Tuples of the user", body = Vec<AclTuple>),
        (status = 400, description = "Malformed identifier", body = ApiErrorResponse),
        (status = 401, description = "Missing or unknown API key", body = ApiErrorResponse)
    ),
    tag = "acl",
    security(("api_key" = []))
)]
pub async fn list_by_user(
    State(server): State<ZanzibarServer>,
    _auth: AuthContext,
    Path(user): Path<String>,
    Query(params): Query<PageParams>,
) -> Result<Json<ApiResponse<Vec<AclTuple>>>> {
    let user = Identifier::parse(&user)?;
    let page = Page::new(params.page, params.page_size);

    let listing = server.engine().list_tuples_by_user(&user, page).await?;
    let tuples = listing.tuples.iter().map(AclTuple::from).collect();
    Ok(Json(api_success_with_meta(
        tuples,
        ResponseMetadata::for_page(page, listing.total),
    )))
}
