use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DatabaseUrlError {
    #[error("Unsupported database URL scheme: {0}")]
    UnsupportedScheme(String),
}

/// Rewrite a deployment-provided database URL into one the driver accepts.
///
/// - `postgres://` and `libsql://` become `postgresql://`
/// - PostgreSQL URLs always carry `sslmode=require` unless an `sslmode` is
///   already set
/// - `sqlite:` URLs are used as-is
pub fn normalize_database_url(raw: &str) -> Result<String, DatabaseUrlError> {
    let raw = raw.trim();

    if raw.starts_with("sqlite:") {
        return Ok(raw.to_string());
    }

    let url = if let Some(rest) = raw.strip_prefix("postgres://") {
        format!("postgresql://{}", rest)
    } else if let Some(rest) = raw.strip_prefix("libsql://") {
        format!("postgresql://{}", rest)
    } else if raw.starts_with("postgresql://") {
        raw.to_string()
    } else {
        // Only the scheme goes into the error; the rest may hold credentials.
        let scheme = raw
            .split_once("://")
            .map(|(scheme, _)| scheme)
            .unwrap_or("<none>");
        return Err(DatabaseUrlError::UnsupportedScheme(scheme.to_string()));
    };

    Ok(require_ssl(url))
}

fn require_ssl(mut url: String) -> String {
    if !url.contains('?') {
        url.push_str("?sslmode=require");
    } else if !url.contains("sslmode=") {
        url.push_str("&sslmode=require");
    }
    url
}
