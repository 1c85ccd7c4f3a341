//! Configuration management using Figment
//!
//! Configuration is loaded from multiple sources with the following precedence (highest to lowest):
//! 1. Environment variables (prefix: WORLDCITIES_, nested keys separated by `__`)
//! 2. Current working directory: ./config.toml
//! 3. XDG config directory: ~/.config/worldcities/config.toml
//! 4. System directory: /etc/worldcities/config.toml
//! 5. Default values
//!
//! For example `WORLDCITIES_DATABASE__URL=postgres://localhost/worldcities` sets
//! `database.url`.

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::Result;

const ENV_PREFIX: &str = "WORLDCITIES_";
const XDG_PREFIX: &str = "worldcities";

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Service configuration
    pub service: ServiceConfig,

    /// JWT verification (optional; without it every guarded route answers 401)
    #[serde(default)]
    pub jwt: Option<JwtConfig>,

    /// Middleware configuration
    #[serde(default)]
    pub middleware: MiddlewareConfig,

    /// Database configuration (optional; without it records live in memory)
    #[serde(default)]
    pub database: Option<DatabaseConfig>,
}

/// Service-level configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Service name
    pub name: String,

    /// Port to listen on
    #[serde(default = "default_port")]
    pub port: u16,

    /// Log level, or any `RUST_LOG` style directive
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Request timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    /// Environment (dev, staging, production)
    #[serde(default = "default_environment")]
    pub environment: String,
}

impl ServiceConfig {
    /// Request timeout as a [`Duration`]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// JWT configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JwtConfig {
    /// Path to the verification key (shared secret for HS*, PEM public key otherwise)
    pub key_path: PathBuf,

    /// JWT algorithm (HS256, RS256, ES256, ...)
    #[serde(default = "default_jwt_algorithm")]
    pub algorithm: String,

    /// JWT issuer to validate
    #[serde(default)]
    pub issuer: Option<String>,

    /// JWT audience to validate
    #[serde(default)]
    pub audience: Option<String>,
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Database connection URL
    pub url: String,

    /// Maximum number of connections in the pool
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    /// Minimum idle connections
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,

    /// Connection timeout in seconds
    #[serde(default = "default_connection_timeout")]
    pub connection_timeout_secs: u64,

    /// Maximum retry attempts for establishing database connection
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Delay before the first retry in seconds (doubles each attempt)
    #[serde(default = "default_retry_delay")]
    pub retry_delay_secs: u64,

    /// Apply embedded migrations on startup
    #[serde(default = "default_true")]
    pub run_migrations: bool,
}

/// Middleware configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MiddlewareConfig {
    /// Request body size limit in MB
    #[serde(default = "default_body_limit_mb")]
    pub body_limit_mb: usize,

    /// Enable panic recovery middleware
    #[serde(default = "default_true")]
    pub catch_panic: bool,

    /// Enable compression
    #[serde(default = "default_true")]
    pub compression: bool,

    /// CORS mode: `permissive`, `restrictive` or `disabled`
    #[serde(default = "default_cors_mode")]
    pub cors_mode: String,
}

impl MiddlewareConfig {
    /// Body limit in bytes, capped at `usize::MAX`
    pub fn body_limit_bytes(&self) -> usize {
        self.body_limit_mb.saturating_mul(1024 * 1024)
    }
}

impl Default for MiddlewareConfig {
    fn default() -> Self {
        Self {
            body_limit_mb: default_body_limit_mb(),
            catch_panic: true,
            compression: true,
            cors_mode: default_cors_mode(),
        }
    }
}

fn default_port() -> u16 {
    8080
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_timeout() -> u64 {
    30
}

fn default_environment() -> String {
    "dev".to_string()
}

fn default_jwt_algorithm() -> String {
    "HS256".to_string()
}

fn default_max_connections() -> u32 {
    20
}

fn default_min_connections() -> u32 {
    2
}

fn default_connection_timeout() -> u64 {
    10
}

fn default_true() -> bool {
    true
}

fn default_max_retries() -> u32 {
    5
}

fn default_retry_delay() -> u64 {
    2
}

fn default_body_limit_mb() -> usize {
    10
}

fn default_cors_mode() -> String {
    "permissive".to_string()
}

impl Config {
    /// Load configuration from all sources
    ///
    /// Environment variables (WORLDCITIES_ prefix) override all file-based configs.
    pub fn load() -> Result<Self> {
        let config_paths = Self::find_config_paths();

        tracing::debug!("Searching for config files in order:");
        for path in &config_paths {
            tracing::debug!("  - {}", path.display());
        }

        let mut figment = Figment::new().merge(Serialized::defaults(Config::default()));

        // lowest priority first
        for path in config_paths.iter().rev() {
            if path.exists() {
                tracing::info!("Loading configuration from: {}", path.display());
                figment = figment.merge(Toml::file(path));
            }
        }

        figment = figment.merge(Env::prefixed(ENV_PREFIX).split("__"));

        let config = figment.extract()?;
        Ok(config)
    }

    /// Load configuration from a specific file
    ///
    /// Bypasses the search path; environment variables still apply.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file(path.as_ref()))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()?;

        Ok(config)
    }

    /// Config file locations in priority order (highest first)
    fn find_config_paths() -> Vec<PathBuf> {
        let mut paths = vec![PathBuf::from("config.toml")];

        let xdg_dirs = xdg::BaseDirectories::with_prefix(XDG_PREFIX);
        if let Some(path) = xdg_dirs.find_config_file("config.toml") {
            paths.push(path);
        }

        paths.push(PathBuf::from("/etc").join(XDG_PREFIX).join("config.toml"));
        paths
    }

    /// Address to bind the HTTP listener to, on every interface
    pub fn bind_address(&self) -> SocketAddr {
        SocketAddr::from(([0, 0, 0, 0], self.service.port))
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            service: ServiceConfig {
                name: "worldcities".to_string(),
                port: default_port(),
                log_level: default_log_level(),
                timeout_secs: default_timeout(),
                environment: default_environment(),
            },
            jwt: None,
            middleware: MiddlewareConfig::default(),
            database: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.service.port, 8080);
        assert_eq!(config.service.log_level, "info");
        assert_eq!(config.service.timeout(), Duration::from_secs(30));
        assert!(config.jwt.is_none());
        assert!(config.database.is_none());
        assert_eq!(config.middleware.cors_mode, "permissive");
    }

    #[test]
    fn test_bind_address_uses_port() {
        let mut config = Config::default();
        config.service.port = 9191;
        assert_eq!(config.bind_address().to_string(), "0.0.0.0:9191");
    }

    #[test]
    fn test_body_limit_saturates() {
        let mut middleware = MiddlewareConfig::default();
        assert_eq!(middleware.body_limit_bytes(), 10 * 1024 * 1024);

        middleware.body_limit_mb = usize::MAX / 2;
        assert_eq!(middleware.body_limit_bytes(), usize::MAX);
    }

    #[test]
    fn test_load_from_file_fills_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
[service]
name = "worldcities-test"
port = 9090

[jwt]
key_path = "/run/secrets/jwt.key"
issuer = "worldcities"

[database]
url = "postgres://localhost/worldcities"
max_connections = 4
"#
        )
        .unwrap();

        let config = Config::load_from(file.path()).unwrap();

        assert_eq!(config.service.name, "worldcities-test");
        assert_eq!(config.service.port, 9090);
        assert_eq!(config.service.log_level, "info");

        let jwt = config.jwt.unwrap();
        assert_eq!(jwt.algorithm, "HS256");
        assert_eq!(jwt.issuer.as_deref(), Some("worldcities"));
        assert_eq!(jwt.audience, None);

        let database = config.database.unwrap();
        assert_eq!(database.max_connections, 4);
        assert_eq!(database.min_connections, 2);
        assert!(database.run_migrations);
    }
}
