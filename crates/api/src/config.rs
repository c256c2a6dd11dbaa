use std::path::PathBuf;
use std::str::FromStr;

use autotube_core::liveness::{DEFAULT_RECENT_WINDOW_SECS, DEFAULT_STALE_AFTER_SECS};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("{var} has invalid value '{value}': {reason}")]
    Invalid {
        var: &'static str,
        value: String,
        reason: String,
    },
}

/// Server configuration loaded from environment variables.
///
/// All fields except the database URL have defaults suitable for local
/// development.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `3000`).
    pub port: u16,
    pub database_url: String,
    pub db_max_connections: u32,
    /// Allowed CORS origins, parsed from comma-separated `CORS_ORIGINS` env var.
    pub cors_origins: Vec<String>,
    /// HTTP request timeout in seconds (default: `30`).
    pub request_timeout_secs: u64,
    /// Timeout for `POST /jobs/upload`, which streams whole videos
    /// (default: `600`).
    pub upload_timeout_secs: u64,
    /// Root directory of the artifact store, served under `/storage`.
    pub storage_root: PathBuf,
    /// Base URL artifact URLs are built from, e.g. `http://localhost:3000/storage`.
    pub public_base_url: String,
    /// In-flight jobs untouched this long are flagged `possibly_stuck`.
    pub stale_after_secs: i64,
    /// Window for "recently updated" views and the liveness heuristic.
    pub recent_window_secs: i64,
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                   | Default                          |
    /// |---------------------------|----------------------------------|
    /// | `HOST`                    | `0.0.0.0`                        |
    /// | `PORT`                    | `3000`                           |
    /// | `DATABASE_URL`            | required                         |
    /// | `DB_MAX_CONNECTIONS`      | `10`                             |
    /// | `CORS_ORIGINS`            | `http://localhost:5173`          |
    /// | `REQUEST_TIMEOUT_SECS`    | `30`                             |
    /// | `UPLOAD_TIMEOUT_SECS`     | `600`                            |
    /// | `STORAGE_ROOT`            | `./storage`                      |
    /// | `PUBLIC_BASE_URL`         | `http://localhost:{PORT}/storage`|
    /// | `STALE_AFTER_SECS`        | `900`                            |
    /// | `RECENT_WINDOW_SECS`      | `120`                            |
    pub fn from_env() -> Result<Self, ConfigError> {
        let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into());
        let port: u16 = parse_var("PORT", 3000)?;

        let database_url =
            std::env::var("DATABASE_URL").map_err(|_| ConfigError::Missing("DATABASE_URL"))?;

        let cors_origins: Vec<String> = std::env::var("CORS_ORIGINS")
            .unwrap_or_else(|_| "http://localhost:5173".into())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let public_base_url = std::env::var("PUBLIC_BASE_URL")
            .unwrap_or_else(|_| format!("http://localhost:{port}/storage"));

        Ok(Self {
            host,
            port,
            database_url,
            db_max_connections: parse_var("DB_MAX_CONNECTIONS", 10)?,
            cors_origins,
            request_timeout_secs: parse_var("REQUEST_TIMEOUT_SECS", 30)?,
            upload_timeout_secs: parse_var("UPLOAD_TIMEOUT_SECS", 600)?,
            storage_root: std::env::var("STORAGE_ROOT")
                .unwrap_or_else(|_| "./storage".into())
                .into(),
            public_base_url: public_base_url.trim_end_matches('/').to_string(),
            stale_after_secs: parse_var("STALE_AFTER_SECS", DEFAULT_STALE_AFTER_SECS)?,
            recent_window_secs: parse_var("RECENT_WINDOW_SECS", DEFAULT_RECENT_WINDOW_SECS)?,
        })
    }
}

fn parse_var<T>(var: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(var) {
        Ok(value) => value.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
            var,
            value,
            reason: e.to_string(),
        }),
        Err(_) => Ok(default),
    }
}
