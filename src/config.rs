// Application configuration
// Defaults, then an optional blitz.toml, then BLITZ__* environment variables

//! # Configuration
//!
//! [`AppConfig`] is assembled with the `config` crate from three layers, lowest
//! priority first:
//!
//! 1. Built-in defaults ([`AppConfig::default`])
//! 2. An optional `blitz.toml` in the working directory (or the path given)
//! 3. Environment variables prefixed `BLITZ__`, `__` separating sections:
//!    `BLITZ__SERVER__PORT=8080`, `BLITZ__SECURITY__ENCRYPTION_KEY=...`
//!
//! A `.env` file is read first so its entries count as environment variables.
//!
//! ## Rust Learning Notes:
//!
//! ### Serialize the Defaults
//! `config::Config::try_from(&AppConfig::default())` turns the default struct
//! into the bottom layer, so every field has exactly one default and file/env
//! layers only need to mention what they change.

use config::{Config, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::engine::executor::DEFAULT_MAX_HOPS;
use crate::{BlitzError, Result};

const DEFAULT_CONFIG_FILE: &str = "blitz";
const ENV_PREFIX: &str = "BLITZ";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub cors_enabled: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 4000,
            cors_enabled: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineSettings {
    /// Bound on module executions per run
    pub max_hops: usize,
    /// Timeout for module API bindings that don't set their own
    pub default_module_timeout_ms: u64,
    /// Overall timeout of one classifier call
    pub classifier_timeout_secs: u64,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            max_hops: DEFAULT_MAX_HOPS,
            default_module_timeout_ms: 10_000,
            classifier_timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProvidersConfig {
    pub google_base_url: String,
    pub perplexity_base_url: String,
    /// HTTP client timeout for provider calls
    pub timeout_seconds: u64,
}

impl Default for ProvidersConfig {
    fn default() -> Self {
        Self {
            google_base_url: "https://generativelanguage.googleapis.com/v1beta".to_string(),
            perplexity_base_url: "https://api.perplexity.ai".to_string(),
            timeout_seconds: 30,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SecurityConfig {
    /// Base64 32-byte AES-256-GCM key for stored credentials
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub encryption_key: Option<String>,
}

/// Top-level application configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub engine: EngineSettings,
    pub providers: ProvidersConfig,
    pub security: SecurityConfig,
    pub log_level: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            engine: EngineSettings::default(),
            providers: ProvidersConfig::default(),
            security: SecurityConfig::default(),
            log_level: "info".to_string(),
        }
    }
}

fn config_error(err: config::ConfigError) -> BlitzError {
    BlitzError::Configuration(err.to_string())
}

impl AppConfig {
    /// Load `.env`, defaults, `blitz.toml` (if present) and `BLITZ__*` variables
    pub fn load() -> Result<Self> {
        Self::load_from(None)
    }

    /// Like [`AppConfig::load`], reading the TOML layer from `path` when given
    ///
    /// An explicit path must exist; the default `blitz.toml` is optional.
    pub fn load_from(path: Option<&Path>) -> Result<Self> {
        dotenv::dotenv().ok();

        let file = match path {
            Some(path) => File::from(path).format(FileFormat::Toml).required(true),
            None => File::with_name(DEFAULT_CONFIG_FILE).format(FileFormat::Toml).required(false),
        };

        let builder = Self::defaults()?.add_source(file).add_source(
            Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        );
        Self::build(builder)
    }

    fn defaults() -> Result<config::ConfigBuilder<config::builder::DefaultState>> {
        let defaults = Config::try_from(&AppConfig::default()).map_err(config_error)?;
        Ok(Config::builder().add_source(defaults))
    }

    fn build(builder: config::ConfigBuilder<config::builder::DefaultState>) -> Result<Self> {
        let config: AppConfig = builder
            .build()
            .and_then(|built| built.try_deserialize())
            .map_err(config_error)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values no component can work with
    pub fn validate(&self) -> Result<()> {
        if self.engine.max_hops == 0 {
            return Err(BlitzError::Configuration("engine.max_hops must be at least 1".to_string()));
        }
        if self.engine.default_module_timeout_ms == 0 {
            return Err(BlitzError::Configuration(
                "engine.default_module_timeout_ms must be positive".to_string(),
            ));
        }
        if self.engine.classifier_timeout_secs == 0 {
            return Err(BlitzError::Configuration(
                "engine.classifier_timeout_secs must be positive".to_string(),
            ));
        }
        if let Some(key) = &self.security.encryption_key {
            if key.trim().is_empty() {
                return Err(BlitzError::Configuration("security.encryption_key is empty".to_string()));
            }
        }
        Ok(())
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}
