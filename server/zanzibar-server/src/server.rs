use crate::{
    config::Settings,
    middleware::{ClientRegistry, RateLimitConfig, RateLimiter},
};
use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, warn};
use zanzibar_core::AuthorizationEngine;

/// Main server state
#[derive(Clone)]
pub struct ZanzibarServer {
    /// Loaded settings
    pub settings: Arc<Settings>,
    /// Authorization engine shared by all handlers
    pub engine: Arc<AuthorizationEngine>,
    /// Known API clients
    pub clients: Arc<ClientRegistry>,
    /// Absent when rate limiting is turned off
    pub rate_limiter: Option<Arc<RateLimiter>>,
    started_at: Instant,
}

impl ZanzibarServer {
    /// Build the engine and define the bootstrap namespaces
    pub fn new(settings: Settings) -> Result<Self> {
        settings.validate().context("Invalid settings")?;
        let engine = AuthorizationEngine::in_memory(settings.engine.to_engine_config());

        for namespace in &settings.bootstrap.namespaces {
            let definition = engine
                .define_namespace_config(&namespace.name, &namespace.relations)
                .with_context(|| format!("Invalid bootstrap namespace '{}'", namespace.name))?;
            info!(
                namespace = %definition.name,
                version = definition.version,
                "Bootstrap namespace defined"
            );
        }

        let clients = ClientRegistry::from_settings(&settings.auth.clients);
        if clients.is_empty() {
            warn!("No API clients configured; administrative endpoints will reject every request");
        }

        let rate_limiter = RateLimitConfig::from_settings(&settings.server).map(|config| {
            info!(
                max_requests = config.max_requests,
                window_secs = config.window.as_secs(),
                "Rate limiting enabled"
            );
            Arc::new(RateLimiter::new(config))
        });

        Ok(Self {
            settings: Arc::new(settings),
            engine: Arc::new(engine),
            clients: Arc::new(clients),
            rate_limiter,
            started_at: Instant::now(),
        })
    }

    pub fn engine(&self) -> &AuthorizationEngine {
        &self.engine
    }

    /// Deadline for one check, honouring a shorter per-request value
    pub fn check_timeout(&self, requested_ms: Option<u64>) -> Duration {
        self.settings.check_timeout(requested_ms)
    }

    pub fn uptime(&self) -> Duration {
        self.started_at.elapsed()
    }
}
