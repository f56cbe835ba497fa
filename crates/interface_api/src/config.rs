//! API configuration
//!
//! Settings come from `API_`-prefixed environment variables. Nested database
//! settings use a double underscore, e.g. `API_DATABASE__WRITE_URL`.

use std::time::Duration;

use config::{Config, ConfigError, Environment};
use infra_db::{PoolConfig, DEFAULT_SCHEMA};
use serde::Deserialize;

/// API configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Server host
    pub host: String,
    /// Server port
    pub port: u16,
    /// Log level or `EnvFilter` directive
    pub log_level: String,
    /// Database pools
    pub database: DatabaseSettings,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            log_level: "info".to_string(),
            database: DatabaseSettings::default(),
        }
    }
}

/// Settings for the read and write pools
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DatabaseSettings {
    pub write_url: String,
    /// Replica URL; the write URL is used when unset
    pub read_url: Option<String>,
    /// Schema put on the `search_path` of every connection; empty leaves the
    /// server default
    pub schema: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub connect_timeout_secs: u64,
    pub idle_timeout_secs: u64,
    pub max_lifetime_secs: u64,
    /// Log every statement
    pub debug: bool,
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            write_url: "postgres://localhost/pageshare".to_string(),
            read_url: None,
            schema: DEFAULT_SCHEMA.to_string(),
            max_connections: 20,
            min_connections: 0,
            connect_timeout_secs: 30,
            idle_timeout_secs: 5,
            max_lifetime_secs: 10,
            debug: false,
        }
    }
}

impl DatabaseSettings {
    /// Pool configurations for the read and write pools, in that order
    pub fn pool_configs(&self) -> (PoolConfig, PoolConfig) {
        let schema = Some(self.schema.clone()).filter(|s| !s.is_empty());
        let write = PoolConfig::new(self.write_url.clone())
            .max_connections(self.max_connections)
            .min_connections(self.min_connections)
            .connect_timeout(Duration::from_secs(self.connect_timeout_secs))
            .idle_timeout(Duration::from_secs(self.idle_timeout_secs))
            .max_lifetime(Duration::from_secs(self.max_lifetime_secs))
            .search_path(schema)
            .debug(self.debug);
        let read = match &self.read_url {
            Some(url) => write.with_url(url.clone()),
            None => write.clone(),
        };
        (read, write)
    }
}

impl ApiConfig {
    /// Loads configuration from environment
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_source(Environment::default())
    }

    /// Loads configuration from `env`, which is given the `API` prefix
    pub fn from_source(env: Environment) -> Result<Self, ConfigError> {
        Config::builder()
            .add_source(
                env.prefix("API")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()
    }

    /// Returns the server address
    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
