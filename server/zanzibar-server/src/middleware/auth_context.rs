//! Caller authentication
//!
//! Clients present an API key either in `X-API-Key` or as
//! `Authorization: Bearer <key>`. Each configured key maps to a named client
//! carrying the capabilities it may exercise. Checks are open; listing,
//! expansion and every mutation need an authenticated client.

use crate::{config::ClientSettings, error::ApiError, server::ZanzibarServer};
use async_trait::async_trait;
use axum::{
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts, HeaderMap},
};
use serde::Serialize;
use std::collections::HashMap;
use tracing::warn;

/// Header carrying the API key; lowercase as required by `HeaderName::from_static`
pub const API_KEY_HEADER: &str = "x-api-key";

const BEARER_PREFIX: &str = "bearer ";

/// A configured API client
#[derive(Debug, Clone, Serialize)]
pub struct ApiClient {
    pub name: String,
    pub can_manage_namespaces: bool,
    pub can_write_tuples: bool,
}

/// API keys of every configured client
#[derive(Debug, Default)]
pub struct ClientRegistry {
    clients: HashMap<String, ApiClient>,
}

impl ClientRegistry {
    pub fn from_settings(settings: &[ClientSettings]) -> Self {
        let mut clients = HashMap::new();
        for client in settings {
            if client.api_key.trim().is_empty() {
                warn!(client = %client.name, "Ignoring API client with an empty key");
                continue;
            }
            clients.insert(
                client.api_key.clone(),
                ApiClient {
                    name: client.name.clone(),
                    can_manage_namespaces: client.can_manage_namespaces,
                    can_write_tuples: client.can_write_tuples,
                },
            );
        }
        Self { clients }
    }

    pub fn get(&self, api_key: &str) -> Option<&ApiClient> {
        self.clients.get(api_key)
    }

    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }
}

/// Pull the API key out of the request headers, if any
pub fn extract_api_key(headers: &HeaderMap) -> Option<&str> {
    let from_header = headers
        .get(API_KEY_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|key| !key.is_empty());
    if from_header.is_some() {
        return from_header;
    }

    let authorization = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let prefix = authorization.get(..BEARER_PREFIX.len())?;
    if !prefix.eq_ignore_ascii_case(BEARER_PREFIX) {
        return None;
    }
    authorization
        .get(BEARER_PREFIX.len()..)
        .map(str::trim)
        .filter(|key| !key.is_empty())
}

/// Authenticated caller, extracted from the request headers
#[derive(Debug, Clone)]
pub struct AuthContext {
    pub client: ApiClient,
}

impl AuthContext {
    pub fn require_namespace_admin(&self) -> Result<(), ApiError> {
        if self.client.can_manage_namespaces {
            Ok(())
        } else {
            warn!(client = %self.client.name, "Client may not manage namespaces");
            Err(ApiError::authorization(format!(
                "Client '{}' may not manage namespaces",
                self.client.name
            )))
        }
    }

    pub fn require_tuple_writer(&self) -> Result<(), ApiError> {
        if self.client.can_write_tuples {
            Ok(())
        } else {
            warn!(client = %self.client.name, "Client may not write tuples");
            Err(ApiError::authorization(format!(
                "Client '{}' may not write tuples",
                self.client.name
            )))
        }
    }
}

#[async_trait]
impl FromRequestParts<ZanzibarServer> for AuthContext {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        server: &ZanzibarServer,
    ) -> Result<Self, Self::Rejection> {
        let Some(api_key) = extract_api_key(&parts.headers) else {
            warn!(uri = %parts.uri, "Request without API key");
            return Err(ApiError::authentication("Missing API key"));
        };

        match server.clients.get(api_key) {
            Some(client) => Ok(Self {
                client: client.clone(),
            }),
            None => {
                warn!(uri = %parts.uri, "Request with unknown API key");
                Err(ApiError::authentication("Invalid API key"))
            }
        }
    }
}
