//! Common error handling utilities for the Mini Zanzibar service
//!
//! This crate carries the pieces of error handling that are shared between
//! the authorization core and the HTTP server:
//!
//! - **Error Codes**: stable, machine-readable codes placed in API error bodies
//! - **Service Errors**: failures of the service process itself (configuration,
//!   socket binding, serving) as opposed to per-request errors
//!
//! # Example
//!
//! ```rust
//! use error_common::{codes, ServiceError};
//!
//! fn load_port(raw: &str) -> Result<u16, ServiceError> {
//!     raw.parse()
//!         .map_err(|_| ServiceError::ConfigError(format!("invalid port: {raw}")))
//! }
//!
//! assert_eq!(codes::validation::INVALID_FORMAT, "VALIDATION_1003");
//! assert!(load_port("http").is_err());
//! ```

pub mod codes;
pub mod types;

pub use types::*;
