// Stable error codes returned in API error bodies.
// Codes are part of the wire contract: never renumber an existing code.

pub mod validation {
    pub const INVALID_INPUT: &str = "VALIDATION_1001";
    pub const MISSING_REQUIRED_FIELD: &str = "VALIDATION_1002";
    pub const INVALID_FORMAT: &str = "VALIDATION_1003";
}

pub mod authentication {
    pub const MISSING_CREDENTIALS: &str = "AUTH_2001";
    pub const INVALID_CREDENTIALS: &str = "AUTH_2002";
}

pub mod authorization {
    pub const ACCESS_DENIED: &str = "AUTHZ_3001";
    pub const INSUFFICIENT_PERMISSIONS: &str = "AUTHZ_3002";
}

pub mod storage {
    pub const STORE_FAILURE: &str = "STORE_4001";
}

pub mod namespace {
    pub const NAMESPACE_NOT_FOUND: &str = "NAMESPACE_5001";
    pub const RELATION_NOT_FOUND: &str = "NAMESPACE_5002";
    pub const INVALID_SCHEMA: &str = "NAMESPACE_5003";
    pub const VERSION_NOT_FOUND: &str = "NAMESPACE_5004";
}

pub mod engine {
    pub const DEADLINE_EXCEEDED: &str = "ENGINE_6001";
    pub const INTERNAL: &str = "ENGINE_6002";
}

pub mod rate_limit {
    pub const RATE_LIMIT_EXCEEDED: &str = "RATE_7001";
}
