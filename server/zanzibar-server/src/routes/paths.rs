//! Centralized API route path constants
//!
//! utoipa `#[path(...)]` attributes require string literals, so handlers
//! repeat these values; keep both in sync.

/// API base path
pub const API_V1: &str = "/api/v1";

/// Health check endpoints
pub mod health {
    pub const HEALTH: &str = "/health";
}

/// ACL endpoints, relative to `API_V1`
pub mod acl {
    pub const ACL: &str = "/acl";
    pub const BATCH: &str = "/acl/batch";
    pub const CHECK: &str = "/acl/check";
    pub const CHECK_BATCH: &str = "/acl/check/batch";
    pub const RELATIONS: &str = "/acl/relations";
    pub const EXPAND: &str = "/acl/expand";
    pub const BY_OBJECT: &str = "/acl/object/:object";
    pub const BY_USER: &str = "/acl/user/:user";
}

/// Namespace endpoints, relative to `API_V1`
pub mod namespace {
    pub const NAMESPACE: &str = "/namespace";
    pub const NAMESPACES: &str = "/namespaces";
    pub const BY_NAME: &str = "/namespace/:namespace";
    pub const BY_VERSION: &str = "/namespace/:namespace/version/:version";
}

/// Unversioned paths kept for existing callers
pub mod legacy {
    pub const ACL: &str = "/acl";
    pub const ACL_CHECK: &str = "/acl/check";
    pub const NAMESPACE: &str = "/namespace";
}

/// API documentation
pub mod docs {
    pub const OPENAPI_JSON: &str = "/api-docs/openapi.json";
}
