//! Server settings
//!
//! Layered with the `config` crate: built-in defaults, then an optional
//! settings file (`zanzibar-server.{toml,yaml,json}`), then environment
//! variables such as `ZANZIBAR__SERVER__PORT=9000` or
//! `ZANZIBAR__ENGINE__CHECK_TIMEOUT_MS=500`.

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;
use zanzibar_core::{EngineConfig, RelationConfig, DEFAULT_MAX_DEPTH};

/// Prefix of environment overrides
pub const ENV_PREFIX: &str = "ZANZIBAR";

/// Default settings file, resolved with any supported extension
pub const DEFAULT_CONFIG_FILE: &str = "zanzibar-server";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub server: ServerSettings,
    pub engine: EngineSettings,
    pub auth: AuthSettings,
    pub bootstrap: BootstrapSettings,
    pub logging: LoggingSettings,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
    pub enable_cors: bool,
    /// Requests allowed per caller and window; `0` turns rate limiting off
    pub rate_limit_requests: u32,
    pub rate_limit_window_secs: u64,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            enable_cors: true,
            rate_limit_requests: 100,
            rate_limit_window_secs: 60,
        }
    }
}

/// Check engine tunables
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EngineSettings {
    pub max_depth: u32,
    pub check_timeout_ms: u64,
    pub reject_cyclic_namespaces: bool,
    pub debug_trace: bool,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
            check_timeout_ms: 2000,
            reject_cyclic_namespaces: false,
            debug_trace: false,
        }
    }
}

impl EngineSettings {
    pub fn to_engine_config(&self) -> EngineConfig {
        EngineConfig {
            max_depth: self.max_depth,
            check_timeout: Duration::from_millis(self.check_timeout_ms),
            reject_cyclic_namespaces: self.reject_cyclic_namespaces,
            debug_trace: self.debug_trace,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AuthSettings {
    pub clients: Vec<ClientSettings>,
}

/// One API client and what it may mutate
#[derive(Debug, Clone, Deserialize)]
pub struct ClientSettings {
    pub name: String,
    pub api_key: String,
    #[serde(default)]
    pub can_manage_namespaces: bool,
    #[serde(default)]
    pub can_write_tuples: bool,
}

/// Namespaces defined before the listener starts
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct BootstrapSettings {
    pub namespaces: Vec<NamespaceSettings>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NamespaceSettings {
    pub name: String,
    pub relations: HashMap<String, RelationConfig>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    pub format: LogFormat,
}

impl Settings {
    /// Load settings from `path` (extension optional) and the environment
    pub fn load(path: &str) -> Result<Self, ConfigError> {
        let settings: Self = Config::builder()
            .add_source(File::with_name(path).required(false))
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    /// Reject values the server cannot run with
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.engine.check_timeout_ms == 0 {
            return Err(ConfigError::Message(
                "engine.check_timeout_ms must be at least 1".to_string(),
            ));
        }
        if self.server.rate_limit_requests > 0 && self.server.rate_limit_window_secs == 0 {
            return Err(ConfigError::Message(
                "server.rate_limit_window_secs must be at least 1 when rate limiting is on"
                    .to_string(),
            ));
        }
        Ok(())
    }

    /// Deadline for one check: the caller may shorten it, never extend it.
    /// Never shorter than 1ms.
    pub fn check_timeout(&self, requested_ms: Option<u64>) -> Duration {
        let ceiling = self.engine.check_timeout_ms.max(1);
        let millis = requested_ms.map_or(ceiling, |requested| requested.min(ceiling).max(1));
        Duration::from_millis(millis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = Settings::default();
        assert_eq!(settings.server.port, 8080);
        assert_eq!(settings.engine.max_depth, 25);
        assert_eq!(settings.engine.check_timeout_ms, 2000);
        assert!(!settings.engine.reject_cyclic_namespaces);
        assert_eq!(settings.logging.format, LogFormat::Pretty);
        assert!(settings.auth.clients.is_empty());
    }

    #[test]
    fn test_check_timeout_is_clamped() {
        let settings = Settings::default();
        assert_eq!(settings.check_timeout(None), Duration::from_millis(2000));
        assert_eq!(settings.check_timeout(Some(150)), Duration::from_millis(150));
        assert_eq!(settings.check_timeout(Some(60_000)), Duration::from_millis(2000));
        assert_eq!(settings.check_timeout(Some(0)), Duration::from_millis(1));
    }

    #[test]
    fn test_zero_check_timeout_is_rejected() {
        let mut settings = Settings::default();
        settings.engine.check_timeout_ms = 0;
        assert!(matches!(settings.validate(), Err(ConfigError::Message(_))));

        // Still usable if constructed without validation
        assert_eq!(settings.check_timeout(Some(100)), Duration::from_millis(1));
        assert_eq!(settings.check_timeout(None), Duration::from_millis(1));
    }

    #[test]
    fn test_rate_limit_window_must_be_positive() {
        let mut settings = Settings::default();
        settings.server.rate_limit_window_secs = 0;
        assert!(settings.validate().is_err());

        settings.server.rate_limit_requests = 0;
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_missing_file_falls_back_to_defaults() {
        let settings = Settings::load("does-not-exist/zanzibar-server").unwrap();
        assert_eq!(settings.engine.to_engine_config(), EngineConfig::default());
    }

    #[test]
    fn test_deserialize_clients_and_bootstrap() {
        let raw = r#"{
            "auth": { "clients": [
                { "name": "docs-ui", "api_key": "k1", "can_write_tuples": true }
            ]},
            "bootstrap": { "namespaces": [
                { "name": "doc", "relations": {
                    "owner": {},
                    "viewer": { "union": [ {"this": {}}, {"computed_userset": {"relation": "owner"}} ] }
                }}
            ]},
            "logging": { "format": "json" }
        }"#;
        let settings: Settings = serde_json::from_str(raw).unwrap();
        assert_eq!(settings.auth.clients[0].name, "docs-ui");
        assert!(!settings.auth.clients[0].can_manage_namespaces);
        assert_eq!(settings.bootstrap.namespaces[0].relations.len(), 2);
        assert_eq!(settings.logging.format, LogFormat::Json);
    }
}
