use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

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
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    /// Overridden by the `DATABASE_URL` environment variable.
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_max_db_connections")]
    pub max_connections: u32,
    #[serde(default = "default_ping_interval")]
    pub ping_interval_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct BroadcastConfig {
    /// Upper bound on a single send to one viewer. A viewer that does not
    /// accept the frame in time is dropped.
    #[serde(default = "default_send_timeout")]
    pub send_timeout_ms: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct PathsConfig {
    #[serde(default = "default_web_dir")]
    pub web_dir: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DirectoryConfig {
    /// Public page listing every character.
    #[serde(default = "default_site_url")]
    pub site_url: String,
    /// Overridden by the `ADMIN_PASSWORD` environment variable. Unlocks
    /// edit and delete on every record.
    #[serde(default)]
    pub admin_password: Option<String>,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub broadcast: BroadcastConfig,
    #[serde(default)]
    pub paths: PathsConfig,
    #[serde(default)]
    pub directory: DirectoryConfig,
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

impl ServerConfig {
    /// Full bind address, e.g. `"0.0.0.0:8000"`
    pub fn addr(&self) -> String {
        format!("{}:{}", self.bind, self.port)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl DatabaseConfig {
    pub fn ping_interval(&self) -> Duration {
        Duration::from_secs(self.ping_interval_secs)
    }
}

impl BroadcastConfig {
    pub fn send_timeout(&self) -> Duration {
        Duration::from_millis(self.send_timeout_ms)
    }
}

impl DirectoryConfig {
    /// True when `password` matches the configured admin password.
    /// An unset or empty admin password never matches.
    pub fn is_admin_password(&self, password: &str) -> bool {
        self.admin_password
            .as_deref()
            .is_some_and(|admin| !admin.is_empty() && admin == password)
    }
}

impl AppConfig {
    /// Apply `DATABASE_URL`, `ADMIN_PASSWORD` and `PORT` on top of the file
    /// values. `lookup` is normally `std::env::var(..).ok()`.
    pub fn apply_env_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let lookup = |key: &str| lookup(key).filter(|v| !v.is_empty());

        if let Some(url) = lookup("DATABASE_URL") {
            self.database.url = Some(url);
        }
        if let Some(password) = lookup("ADMIN_PASSWORD") {
            self.directory.admin_password = Some(password);
        }
        if let Some(port) = lookup("PORT") {
            self.server.port = port
                .parse()
                .map_err(|_| ConfigError::InvalidConfig(format!("PORT is not a port: {}", port)))?;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Serde defaults
// ---------------------------------------------------------------------------

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            port: default_port(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: None,
            max_connections: default_max_db_connections(),
            ping_interval_secs: default_ping_interval(),
        }
    }
}

impl Default for BroadcastConfig {
    fn default() -> Self {
        Self {
            send_timeout_ms: default_send_timeout(),
        }
    }
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            web_dir: default_web_dir(),
        }
    }
}

impl Default for DirectoryConfig {
    fn default() -> Self {
        Self {
            site_url: default_site_url(),
            admin_password: None,
        }
    }
}

pub fn default_bind() -> String {
    "0.0.0.0".to_string()
}

pub fn default_port() -> u16 {
    8000
}

pub fn default_request_timeout() -> u64 {
    30
}

pub fn default_max_db_connections() -> u32 {
    5
}

pub fn default_ping_interval() -> u64 {
    60
}

pub fn default_send_timeout() -> u64 {
    5000
}

pub fn default_web_dir() -> String {
    "public".to_string()
}

pub fn default_site_url() -> String {
    "http://localhost:8000/".to_string()
}
