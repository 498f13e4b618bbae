use thiserror::Error;

#[derive(Error, Debug)]
pub enum ZanzibarError {
    /// Malformed identifier, missing field or otherwise unusable input
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Namespace not found: {0}")]
    NamespaceNotFound(String),

    #[error("Relation '{relation}' not found in namespace '{namespace}'")]
    RelationNotFound { namespace: String, relation: String },

    #[error("Namespace '{namespace}' has no version {version}")]
    NamespaceVersionNotFound { namespace: String, version: u32 },

    /// Namespace definition rejected at define time
    #[error("Invalid schema: {0}")]
    InvalidSchema(String),

    #[error("Check deadline of {timeout_ms}ms exceeded")]
    DeadlineExceeded { timeout_ms: u64 },

    /// Raised by `TupleStore` backends; the in-memory store never fails.
    /// A failed lookup surfaces as this error, never as a grant or denial.
    #[error("Storage error: {0}")]
    Storage(String),

    /// Catch-all for backend errors propagated with `?`
    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl ZanzibarError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn relation_not_found(namespace: &str, relation: &str) -> Self {
        Self::RelationNotFound {
            namespace: namespace.to_string(),
            relation: relation.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, ZanzibarError>;
