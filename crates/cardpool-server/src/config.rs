//! Server configuration.
//!
//! Layered, lowest precedence first: built-in defaults, the optional TOML
//! file, `CARDPOOL_*` environment variables (a `.env` file is loaded into
//! the environment by the binary), then command-line flags.
//!
//! ```toml
//! listen = "0.0.0.0:3000"
//! log_level = "info"
//!
//! [database]
//! path = "cardpool.db"
//! busy_timeout_ms = 10000
//! acquire_timeout_ms = 30000
//!
//! [api]
//! base_url = "https://pool.example.com"
//! key = "secret"
//! timeout_ms = 10000
//!
//! [auth]
//! accepted_keys = ["client-key-1"]
//!
//! [queue]
//! capacity = 1024
//! ```

use cardpool_allocation::BackgroundConfig;
use cardpool_core::constants::DEFAULT_REMOTE_TIMEOUT_MS;
use cardpool_network::CardPoolClientConfig;
use cardpool_storage::DatabaseConfig;
use cardpool_storage::connection::{
    DEFAULT_ACQUIRE_TIMEOUT, DEFAULT_BUSY_TIMEOUT, DEFAULT_MAX_CONNECTIONS, DEFAULT_MIN_CONNECTIONS,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid value for {key}: {value:?}")]
    InvalidValue { key: &'static str, value: String },

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address the HTTP server binds to
    pub listen: String,

    /// Default tracing filter when `RUST_LOG` is unset
    pub log_level: String,

    pub database: DatabaseSection,
    pub api: RemoteApiSection,
    pub auth: AuthSection,
    pub queue: QueueSection,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseSection {
    pub path: String,
    pub max_connections: u32,
    pub min_connections: u32,
    /// Wait for a pooled connection
    pub acquire_timeout_ms: u64,
    /// Wait on a locked database before a write fails
    pub busy_timeout_ms: u64,
}

/// Remote card-pool service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteApiSection {
    pub base_url: String,
    pub key: String,
    pub timeout_ms: u64,
}

/// Inbound `key` header check
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthSection {
    /// When empty, any non-empty key is accepted
    pub accepted_keys: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueSection {
    pub capacity: usize,
    pub max_attempts: u32,
    pub retry_backoff_ms: u64,
    pub dead_letter_capacity: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: "0.0.0.0:3000".to_string(),
            log_level: "info".to_string(),
            database: DatabaseSection::default(),
            api: RemoteApiSection::default(),
            auth: AuthSection::default(),
            queue: QueueSection::default(),
        }
    }
}

impl Default for DatabaseSection {
    fn default() -> Self {
        Self {
            path: "cardpool.db".to_string(),
            max_connections: DEFAULT_MAX_CONNECTIONS,
            min_connections: DEFAULT_MIN_CONNECTIONS,
            acquire_timeout_ms: DEFAULT_ACQUIRE_TIMEOUT.as_millis() as u64,
            busy_timeout_ms: DEFAULT_BUSY_TIMEOUT.as_millis() as u64,
        }
    }
}

impl Default for RemoteApiSection {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            key: String::new(),
            timeout_ms: DEFAULT_REMOTE_TIMEOUT_MS,
        }
    }
}

impl Default for QueueSection {
    fn default() -> Self {
        let defaults = BackgroundConfig::default();
        Self {
            capacity: defaults.capacity,
            max_attempts: defaults.max_attempts,
            retry_backoff_ms: defaults.retry_backoff.as_millis() as u64,
            dead_letter_capacity: defaults.dead_letter_capacity,
        }
    }
}

impl ServerConfig {
    /// Defaults overlaid with the TOML file at `path`, if given
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(path) => {
                let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
                    path: path.to_path_buf(),
                    source,
                })?;
                Self::from_toml_str(&content)
            }
            None => Ok(Self::default()),
        }
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Apply `CARDPOOL_*` overrides from the process environment
    pub fn apply_env(&mut self) -> Result<(), ConfigError> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    /// Apply `CARDPOOL_*` overrides read through `lookup`
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(listen) = lookup("CARDPOOL_LISTEN") {
            self.listen = listen;
        }
        if let Some(path) = lookup("CARDPOOL_DATABASE_PATH") {
            self.database.path = path;
        }
        if let Some(base_url) = lookup("CARDPOOL_API_BASE_URL") {
            self.api.base_url = base_url;
        }
        if let Some(key) = lookup("CARDPOOL_API_KEY") {
            self.api.key = key;
        }
        if let Some(raw) = lookup("CARDPOOL_API_TIMEOUT_MS") {
            self.api.timeout_ms = parse_number("CARDPOOL_API_TIMEOUT_MS", &raw)?;
        }
        if let Some(raw) = lookup("CARDPOOL_DATABASE_MAX_CONNECTIONS") {
            self.database.max_connections = parse_number("CARDPOOL_DATABASE_MAX_CONNECTIONS", &raw)?;
        }
        if let Some(raw) = lookup("CARDPOOL_DATABASE_ACQUIRE_TIMEOUT_MS") {
            self.database.acquire_timeout_ms =
                parse_number("CARDPOOL_DATABASE_ACQUIRE_TIMEOUT_MS", &raw)?;
        }
        if let Some(raw) = lookup("CARDPOOL_DATABASE_BUSY_TIMEOUT_MS") {
            self.database.busy_timeout_ms = parse_number("CARDPOOL_DATABASE_BUSY_TIMEOUT_MS", &raw)?;
        }
        if let Some(level) = lookup("CARDPOOL_LOG_LEVEL") {
            self.log_level = level;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.api.base_url.trim().is_empty() {
            return Err(ConfigError::Invalid("api.base_url is required".to_string()));
        }
        if self.api.key.trim().is_empty() {
            return Err(ConfigError::Invalid("api.key is required".to_string()));
        }
        if self.api.timeout_ms == 0 {
            return Err(ConfigError::Invalid("api.timeout_ms must be positive".to_string()));
        }
        if self.queue.capacity == 0 {
            return Err(ConfigError::Invalid("queue.capacity must be positive".to_string()));
        }
        self.database_config()
            .validate()
            .map_err(|e| ConfigError::Invalid(format!("database: {e}")))?;
        Ok(())
    }

    pub fn database_config(&self) -> DatabaseConfig {
        DatabaseConfig::new(self.database.path.clone())
            .max_connections(self.database.max_connections)
            .min_connections(self.database.min_connections)
            .acquire_timeout(Duration::from_millis(self.database.acquire_timeout_ms))
            .busy_timeout(Duration::from_millis(self.database.busy_timeout_ms))
    }

    pub fn client_config(&self) -> CardPoolClientConfig {
        CardPoolClientConfig::new(self.api.base_url.clone(), self.api.key.clone())
            .timeout(Duration::from_millis(self.api.timeout_ms))
    }

    pub fn background_config(&self) -> BackgroundConfig {
        BackgroundConfig::default()
            .capacity(self.queue.capacity)
            .max_attempts(self.queue.max_attempts)
            .retry_backoff(Duration::from_millis(self.queue.retry_backoff_ms))
            .dead_letter_capacity(self.queue.dead_letter_capacity)
    }
}

fn parse_number<T: std::str::FromStr>(key: &'static str, raw: &str) -> Result<T, ConfigError> {
    raw.trim().parse().map_err(|_| ConfigError::InvalidValue {
        key,
        value: raw.to_string(),
    })
}
