use serde::Deserialize;
use std::collections::HashSet;
use thiserror::Error;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("jwt_secret must be set via the JWT_SECRET env var or auth.jwt_secret config field")]
    MissingSecret,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),
}

// ---------------------------------------------------------------------------
// Config structs
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_max_connections")]
    pub max_connections: usize,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    #[serde(default = "default_database_url")]
    pub url: String,
    #[serde(default = "default_pool_size")]
    pub pool_size: u32,
}

/// Account created on first start when the `users` table is empty.
#[derive(Debug, Deserialize, Clone)]
pub struct BootstrapAdmin {
    pub username: String,
    pub password: String,
    #[serde(default = "default_admin_name")]
    pub full_name: String,
    pub email: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AuthConfig {
    #[serde(default = "default_token_expiry")]
    pub token_expiry_minutes: u64,
    /// HMAC key used to sign and verify tokens.
    ///
    /// Prefer loading this via the `JWT_SECRET` environment variable.  This
    /// config field is the fallback for deployments that cannot inject env
    /// vars at runtime.
    ///
    /// **Minimum length:** 32 bytes. Read once at start-up; changing it
    /// invalidates every token already handed out.
    pub jwt_secret: Option<String>,
    #[serde(default)]
    pub bootstrap_admin: Option<BootstrapAdmin>,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct CorsConfig {
    /// Origins allowed to call the API from a browser. Empty reflects any
    /// `Origin` header back.
    #[serde(default)]
    pub allowed_origins: HashSet<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    pub auth: AuthConfig,
    #[serde(default)]
    pub cors: CorsConfig,
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            port: default_port(),
            max_connections: default_max_connections(),
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: default_database_url(),
            pool_size: default_pool_size(),
        }
    }
}

impl ServerConfig {
    /// Full bind address, e.g. `"127.0.0.1:8080"`
    pub fn addr(&self) -> String {
        format!("{}:{}", self.bind, self.port)
    }
}

impl AuthConfig {
    /// Token lifetime in seconds. Saturates rather than wrapping for values
    /// that never passed validation.
    pub fn token_expiry_secs(&self) -> u64 {
        self.token_expiry_minutes.saturating_mul(60)
    }

    /// Resolve the signing secret with `JWT_SECRET` env-var taking priority
    /// over the config file field.
    ///
    /// Returns `None` when neither source is set.
    pub fn resolved_jwt_secret(&self) -> Option<String> {
        std::env::var("JWT_SECRET")
            .ok()
            .filter(|s| !s.is_empty())
            .or_else(|| self.jwt_secret.clone())
            .filter(|s| !s.is_empty())
    }
}

impl CorsConfig {
    pub fn allows(&self, origin: &str) -> bool {
        self.allowed_origins.is_empty() || self.allowed_origins.contains(origin)
    }
}

// ---------------------------------------------------------------------------
// Serde defaults
// ---------------------------------------------------------------------------

pub fn default_bind() -> String {
    "127.0.0.1".to_string()
}

pub fn default_port() -> u16 {
    8080
}

pub fn default_max_connections() -> usize {
    1000
}

pub fn default_database_url() -> String {
    "sqlite://certreg.db?mode=rwc".to_string()
}

pub fn default_pool_size() -> u32 {
    5
}

pub fn default_admin_name() -> String {
    "Administrator".to_string()
}

/// 24 hours.
pub fn default_token_expiry() -> u64 {
    24 * 60
}
