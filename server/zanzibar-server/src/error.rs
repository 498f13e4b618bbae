use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use error_common::codes;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{error, warn};
use utoipa::ToSchema;
use uuid::Uuid;
use zanzibar_core::ZanzibarError;

/// Standard API error response structure
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ApiErrorResponse {
    /// Unique error ID for tracking
    pub error_id: String,
    /// Error type
    pub error_type: String,
    /// Stable machine-readable code, e.g. `NAMESPACE_5001`
    pub error_code: String,
    /// Human-readable error message
    pub message: String,
    /// Timestamp when error occurred
    pub timestamp: chrono::DateTime<chrono::Utc>,
    /// Suggested actions for resolving the error
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggestions: Option<Vec<String>>,
}

/// Standard API success response wrapper
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: T,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<ResponseMetadata>,
}

/// Response metadata for pagination
#[derive(Debug, Serialize, Deserialize)]
pub struct ResponseMetadata {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pagination: Option<PaginationInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_count: Option<usize>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PaginationInfo {
    pub page: usize,
    pub page_size: usize,
    pub total_pages: usize,
    pub has_next: bool,
    pub has_previous: bool,
}

/// Main API error enum
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Validation error: {message}")]
    Validation { message: String },

    #[error("Authentication error: {message}")]
    Authentication { message: String },

    #[error("Authorization error: {message}")]
    Authorization { message: String },

    #[error("{message}")]
    NotFound {
        message: String,
        code: &'static str,
    },

    #[error("Invalid namespace definition: {message}")]
    InvalidSchema { message: String },

    #[error("Deadline exceeded: {message}")]
    DeadlineExceeded { message: String },

    #[error("Rate limit exceeded: {message}")]
    RateLimited { message: String },

    #[error("Internal server error: {message}")]
    Internal { message: String },
}

impl ApiError {
    /// Create a simple validation error
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Create an authentication error
    pub fn authentication(message: impl Into<String>) -> Self {
        Self::Authentication {
            message: message.into(),
        }
    }

    /// Create an authorization error
    pub fn authorization(message: impl Into<String>) -> Self {
        Self::Authorization {
            message: message.into(),
        }
    }

    /// Create a rate limit error
    pub fn rate_limit(message: impl Into<String>) -> Self {
        Self::RateLimited {
            message: message.into(),
        }
    }

    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Validation { .. } | ApiError::InvalidSchema { .. } => StatusCode::BAD_REQUEST,
            ApiError::Authentication { .. } => StatusCode::UNAUTHORIZED,
            ApiError::Authorization { .. } => StatusCode::FORBIDDEN,
            ApiError::NotFound { .. } => StatusCode::NOT_FOUND,
            ApiError::DeadlineExceeded { .. } => StatusCode::GATEWAY_TIMEOUT,
            ApiError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            ApiError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Get the error type string
    pub fn error_type(&self) -> &'static str {
        match self {
            ApiError::Validation { .. } => "validation_error",
            ApiError::Authentication { .. } => "authentication_error",
            ApiError::Authorization { .. } => "authorization_error",
            ApiError::NotFound { .. } => "not_found",
            ApiError::InvalidSchema { .. } => "invalid_schema",
            ApiError::DeadlineExceeded { .. } => "deadline_exceeded",
            ApiError::RateLimited { .. } => "rate_limit_exceeded",
            ApiError::Internal { .. } => "internal_error",
        }
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            ApiError::Validation { .. } => codes::validation::INVALID_INPUT,
            ApiError::Authentication { .. } => codes::authentication::INVALID_CREDENTIALS,
            ApiError::Authorization { .. } => codes::authorization::INSUFFICIENT_PERMISSIONS,
            ApiError::NotFound { code, .. } => *code,
            ApiError::InvalidSchema { .. } => codes::namespace::INVALID_SCHEMA,
            ApiError::DeadlineExceeded { .. } => codes::engine::DEADLINE_EXCEEDED,
            ApiError::RateLimited { .. } => codes::rate_limit::RATE_LIMIT_EXCEEDED,
            ApiError::Internal { .. } => codes::engine::INTERNAL,
        }
    }

    /// Get suggested actions for resolving the error
    pub fn suggestions(&self) -> Option<Vec<String>> {
        match self {
            ApiError::Validation { .. } => Some(vec![
                "Identifiers take the form type:id with exactly one colon".to_string(),
                "Ensure object, relation and user are all provided".to_string(),
            ]),
            ApiError::Authentication { .. } => Some(vec![
                "Send the API key in the X-API-Key header or as a Bearer token".to_string(),
            ]),
            ApiError::Authorization { .. } => Some(vec![
                "Ask an administrator to grant this client the required capability".to_string(),
            ]),
            ApiError::NotFound { .. } => Some(vec![
                "Define the namespace before writing or checking its relations".to_string(),
                "List defined namespaces with GET /api/v1/namespaces".to_string(),
            ]),
            ApiError::InvalidSchema { .. } => Some(vec![
                "Computed usersets may only reference relations of the same namespace".to_string(),
            ]),
            ApiError::DeadlineExceeded { .. } => Some(vec![
                "Retry the request; the result was not decided".to_string(),
            ]),
            ApiError::RateLimited { .. } => Some(vec![
                "Wait for the current window to end before retrying".to_string(),
            ]),
            ApiError::Internal { .. } => None,
        }
    }
}

impl From<ZanzibarError> for ApiError {
    fn from(err: ZanzibarError) -> Self {
        let message = err.to_string();
        match err {
            ZanzibarError::Validation(_) => Self::Validation { message },
            ZanzibarError::NamespaceNotFound(_) => Self::NotFound {
                message,
                code: codes::namespace::NAMESPACE_NOT_FOUND,
            },
            ZanzibarError::RelationNotFound { .. } => Self::NotFound {
                message,
                code: codes::namespace::RELATION_NOT_FOUND,
            },
            ZanzibarError::NamespaceVersionNotFound { .. } => Self::NotFound {
                message,
                code: codes::namespace::VERSION_NOT_FOUND,
            },
            ZanzibarError::InvalidSchema(_) => Self::InvalidSchema { message },
            ZanzibarError::DeadlineExceeded { .. } => Self::DeadlineExceeded { message },
            ZanzibarError::Storage(_) | ZanzibarError::Internal(_) => Self::Internal { message },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let error_id = Uuid::new_v4().to_string();
        let status_code = self.status_code();

        // Caller mistakes are warnings; only server faults are errors
        if status_code.is_server_error() {
            error!(
                error_id = %error_id,
                error_type = %self.error_type(),
                status_code = %status_code.as_u16(),
                error = %self,
                "API error occurred"
            );
        } else {
            warn!(
                error_id = %error_id,
                error_type = %self.error_type(),
                status_code = %status_code.as_u16(),
                error = %self,
                "API request rejected"
            );
        }

        // Internal details stay in the log
        let message = match &self {
            ApiError::Internal { .. } => "An unexpected error occurred".to_string(),
            _ => self.to_string(),
        };

        let error_response = ApiErrorResponse {
            error_id,
            error_type: self.error_type().to_string(),
            error_code: self.error_code().to_string(),
            message,
            timestamp: chrono::Utc::now(),
            suggestions: self.suggestions(),
        };

        (status_code, Json(error_response)).into_response()
    }
}

/// Result alias for handlers
pub type Result<T> = std::result::Result<T, ApiError>;

/// Helper function to create successful API responses
pub fn api_success<T>(data: T) -> ApiResponse<T> {
    ApiResponse {
        success: true,
        data,
        metadata: None,
    }
}

/// Helper function to create successful API responses with metadata
pub fn api_success_with_meta<T>(data: T, metadata: ResponseMetadata) -> ApiResponse<T> {
    ApiResponse {
        success: true,
        data,
        metadata: Some(metadata),
    }
}

impl ResponseMetadata {
    /// Pagination block for a tuple listing
    pub fn for_page(page: zanzibar_core::Page, total: usize) -> Self {
        let total_pages = total.div_ceil(page.page_size.max(1));
        Self {
            pagination: Some(PaginationInfo {
                page: page.page,
                page_size: page.page_size,
                total_pages,
                has_next: page.page < total_pages,
                has_previous: page.page > 1,
            }),
            total_count: Some(total),
        }
    }
}
