use thiserror::Error;

/// Failures of the service process itself (start-up, binding, serving)
#[derive(Error, Debug)]
pub enum ServiceError {
    /// Network communication errors
    #[error("Network error: {0}")]
    NetworkError(String),

    /// Server runtime errors
    #[error("Server error: {0}")]
    ServerError(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Internal system errors
    #[error("Internal error: {0}")]
    InternalError(String),

    /// Wrapped external errors
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Result type alias for service operations
pub type Result<T> = std::result::Result<T, ServiceError>;

/// Log a service error with the context it occurred in
pub fn log_error(context: &str, error: &ServiceError) {
    tracing::error!(
        context = context,
        error = %error,
        "Service error occurred"
    );
}
