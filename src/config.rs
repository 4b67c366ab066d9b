use serde::Deserialize;
use std::env;
use std::sync::OnceLock;
use std::time::Duration;
use thiserror::Error;

/// Request timeout applied when `KBFLOW_HTTP_TIMEOUT_SECS` is not provided.
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 30;

/// Errors encountered while loading configuration from environment variables.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Required environment variable was not provided.
    #[error("Missing environment variable: {0}")]
    MissingVariable(String),
    /// Environment variable contained a value that could not be parsed.
    #[error("Invalid value for environment variable: {0}")]
    InvalidValue(String),
}

/// Runtime configuration for the knowledge base workflow.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Base URL of the dashboard backend (e.g. `http://localhost:8000/api`).
    pub api_url: String,
    /// Per-request timeout enforced by the HTTP boundary, in seconds.
    pub http_timeout_secs: u64,
    /// Optional override for the control surface port.
    pub server_port: Option<u16>,
}

impl Config {
    /// Load configuration from environment variables, performing validation along the way.
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            api_url: load_env("KBFLOW_API_URL")?,
            http_timeout_secs: load_env_optional("KBFLOW_HTTP_TIMEOUT_SECS")
                .map(|value| {
                    value
                        .parse()
                        .map_err(|_| ConfigError::InvalidValue("KBFLOW_HTTP_TIMEOUT_SECS".into()))
                })
                .transpose()?
                .unwrap_or(DEFAULT_HTTP_TIMEOUT_SECS),
            server_port: load_env_optional("KBFLOW_SERVER_PORT")
                .map(|value| {
                    value
                        .parse()
                        .map_err(|_| ConfigError::InvalidValue("KBFLOW_SERVER_PORT".into()))
                })
                .transpose()?,
        })
    }

    /// Timeout applied to every backend request.
    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }
}

fn load_env(key: &str) -> Result<String, ConfigError> {
    load_env_optional(key).ok_or_else(|| ConfigError::MissingVariable(key.to_string()))
}

fn load_env_optional(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

/// Global configuration cache populated during process start.
pub static CONFIG: OnceLock<Config> = OnceLock::new();

/// Retrieve the loaded configuration, panicking if initialization has not occurred.
pub fn get_config() -> &'static Config {
    CONFIG.get().expect("Config not initialized")
}

/// Load configuration from the environment and install it in the global cache.
pub fn init_config() -> Result<&'static Config, ConfigError> {
    dotenvy::dotenv().ok();
    let config = Config::from_env()?;
    tracing::debug!(
        api_url = %config.api_url,
        http_timeout_secs = config.http_timeout_secs,
        server_port = ?config.server_port,
        "Loaded configuration"
    );
    Ok(CONFIG.get_or_init(|| config))
}
