use std::fs;
use tracing::{debug, error, info};

use crate::types::server_config::{AppConfig, ConfigError};

/// Read, env-override and validate the TOML config at `path`.
pub fn load_config(path: &str) -> Result<AppConfig, ConfigError> {
    info!("Loading configuration from: {}", path);

    let contents = fs::read_to_string(path)?;
    debug!("Processing file: {}", path);

    if contents.trim().is_empty() {
        error!("Configuration file is empty");
        return Err(ConfigError::InvalidConfig("empty file".into()));
    }

    let config = parse_config(&contents, |key| std::env::var(key).ok())?;

    info!("Configuration loaded successfully");
    Ok(config)
}

/// Parse config text and apply environment overrides from `lookup`.
pub fn parse_config<F>(contents: &str, lookup: F) -> Result<AppConfig, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let mut config: AppConfig = toml::from_str(contents)?;
    config.apply_env_overrides(lookup)?;

    // Config derives Debug with the admin password in it; keep it out of logs.
    debug!(
        "Config: bind={} web_dir={} send_timeout_ms={}",
        config.server.addr(),
        config.paths.web_dir,
        config.broadcast.send_timeout_ms
    );

    validate_config(&config)?;

    info!("Config validated");

    Ok(config)
}

fn validate_config(config: &AppConfig) -> Result<(), ConfigError> {
    if config.paths.web_dir.is_empty() {
        return Err(ConfigError::InvalidConfig("web_dir cannot be empty".into()));
    }

    if config.server.request_timeout_secs == 0 {
        return Err(ConfigError::InvalidConfig(
            "request_timeout_secs must be greater than 0".into(),
        ));
    }

    if config.broadcast.send_timeout_ms == 0 {
        return Err(ConfigError::InvalidConfig(
            "send_timeout_ms must be greater than 0".into(),
        ));
    }

    if config.broadcast.send_timeout() >= config.server.request_timeout() {
        return Err(ConfigError::InvalidConfig(format!(
            "broadcast.send_timeout_ms ({}) must be below server.request_timeout_secs ({}s)",
            config.broadcast.send_timeout_ms, config.server.request_timeout_secs
        )));
    }

    if config.database.max_connections == 0 {
        return Err(ConfigError::InvalidConfig(
            "database.max_connections must be greater than 0".into(),
        ));
    }

    if config.database.ping_interval_secs == 0 {
        return Err(ConfigError::InvalidConfig(
            "database.ping_interval_secs must be greater than 0".into(),
        ));
    }

    match config.database.url.as_deref() {
        None | Some("") => {
            return Err(ConfigError::InvalidConfig(
                "database url must be set via the DATABASE_URL env var or database.url config field"
                    .into(),
            ));
        }
        _ => {}
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
        [database]
        url = "sqlite::memory:"
    "#;

    fn no_env(_: &str) -> Option<String> {
        None
    }

    #[test]
    fn minimal_config_uses_defaults() {
        let cfg = parse_config(MINIMAL, no_env).unwrap();
        assert_eq!(cfg.server.addr(), "0.0.0.0:8000");
        assert_eq!(cfg.broadcast.send_timeout_ms, 5000);
        assert_eq!(cfg.database.ping_interval_secs, 60);
        assert_eq!(cfg.paths.web_dir, "public");
        assert!(cfg.directory.admin_password.is_none());
    }

    #[test]
    fn env_overrides_win_over_file() {
        let cfg = parse_config(MINIMAL, |key| match key {
            "DATABASE_URL" => Some("postgres://db.internal/roster".to_string()),
            "ADMIN_PASSWORD" => Some("hunter2".to_string()),
            "PORT" => Some("9090".to_string()),
            _ => None,
        })
        .unwrap();
        assert_eq!(
            cfg.database.url.as_deref(),
            Some("postgres://db.internal/roster")
        );
        assert!(cfg.directory.is_admin_password("hunter2"));
        assert_eq!(cfg.server.port, 9090);
    }

    #[test]
    fn empty_env_values_are_ignored() {
        let cfg = parse_config(MINIMAL, |_| Some(String::new())).unwrap();
        assert_eq!(cfg.database.url.as_deref(), Some("sqlite::memory:"));
        assert_eq!(cfg.server.port, 8000);
    }

    #[test]
    fn bad_port_override_is_rejected() {
        let err = parse_config(MINIMAL, |key| {
            (key == "PORT").then(|| "eighty".to_string())
        })
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidConfig(_)));
    }

    #[test]
    fn missing_database_url_is_rejected() {
        let err = parse_config("[server]\nport = 8000\n", no_env).unwrap_err();
        assert!(err.to_string().contains("DATABASE_URL"));
    }

    #[test]
    fn zero_send_timeout_is_rejected() {
        let text = format!("{}\n[broadcast]\nsend_timeout_ms = 0\n", MINIMAL);
        assert!(parse_config(&text, no_env).is_err());
    }

    #[test]
    fn send_timeout_must_stay_below_request_timeout() {
        let text = format!(
            "{}\n[server]\nrequest_timeout_secs = 2\n[broadcast]\nsend_timeout_ms = 2000\n",
            MINIMAL
        );
        let err = parse_config(&text, no_env).unwrap_err();
        assert!(err.to_string().contains("send_timeout_ms"));

        let text = format!(
            "{}\n[server]\nrequest_timeout_secs = 2\n[broadcast]\nsend_timeout_ms = 1999\n",
            MINIMAL
        );
        assert!(parse_config(&text, no_env).is_ok());
    }

    #[test]
    fn empty_admin_password_never_matches() {
        let text = format!("{}\n[directory]\nadmin_password = \"\"\n", MINIMAL);
        let cfg = parse_config(&text, no_env).unwrap();
        assert!(!cfg.directory.is_admin_password(""));
    }
}
