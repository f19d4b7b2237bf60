//! API server configuration module.
//!
//! Configuration is loaded from environment variables with fallback to
//! defaults. `main` loads a local `.env` first, so either source works.

use std::env;
use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;

use axum::http::HeaderValue;

/// Deployment environment.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum AppEnv {
    #[default]
    Development,
    Production,
}

impl FromStr for AppEnv {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "development" | "dev" => Ok(AppEnv::Development),
            "production" | "prod" => Ok(AppEnv::Production),
            _ => Err(ConfigError::InvalidValue("APP_ENV".to_string())),
        }
    }
}

/// API server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Listen address
    pub host: IpAddr,

    /// HTTP port
    pub port: u16,

    /// SQLite file path, or `:memory:`
    pub database_path: String,

    /// Upper bound of the connection pool
    pub db_max_connections: u32,

    pub app_env: AppEnv,

    /// Allowed CORS origins; empty allows any origin
    pub cors_origins: Vec<HeaderValue>,

    /// Max request body size in bytes (default: 10 MiB)
    pub body_limit: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            host: IpAddr::from([0, 0, 0, 0]),
            port: 5000,
            database_path: "./data/ombor.db".to_string(),
            db_max_connections: 5,
            app_env: AppEnv::Development,
            cors_origins: Vec::new(),
            body_limit: 10 * 1024 * 1024,
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables.
    pub fn load() -> Result<Self, ConfigError> {
        let defaults = ServerConfig::default();

        let config = ServerConfig {
            host: parse_var("HOST", defaults.host)?,
            port: parse_var("PORT", defaults.port)?,
            database_path: env::var("DATABASE_PATH").unwrap_or(defaults.database_path),
            db_max_connections: parse_var("DB_MAX_CONNECTIONS", defaults.db_max_connections)?,
            app_env: parse_var("APP_ENV", defaults.app_env)?,
            cors_origins: match env::var("CORS_ORIGINS") {
                Ok(raw) => parse_origins(&raw)?,
                Err(_) => defaults.cors_origins,
            },
            body_limit: parse_var("REQUEST_BODY_LIMIT", defaults.body_limit)?,
        };

        if config.db_max_connections == 0 {
            return Err(ConfigError::InvalidValue("DB_MAX_CONNECTIONS".to_string()));
        }
        if config.database_path.trim().is_empty() {
            return Err(ConfigError::MissingRequired("DATABASE_PATH".to_string()));
        }

        Ok(config)
    }

    pub fn addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    pub fn is_production(&self) -> bool {
        self.app_env == AppEnv::Production
    }
}

fn parse_var<T: FromStr>(name: &str, default: T) -> Result<T, ConfigError> {
    match env::var(name) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidValue(name.to_string())),
        _ => Ok(default),
    }
}

fn parse_origins(raw: &str) -> Result<Vec<HeaderValue>, ConfigError> {
    raw.split(',')
        .map(str::trim)
        .filter(|o| !o.is_empty())
        .map(|o| {
            HeaderValue::from_str(o).map_err(|_| ConfigError::InvalidValue("CORS_ORIGINS".to_string()))
        })
        .collect()
}

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {0}")]
    InvalidValue(String),

    #[error("Missing required configuration: {0}")]
    MissingRequired(String),
}
