use std::fmt;
use std::path::{Component, Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use bytes::Bytes;
use http::HeaderValue;
use http_body_util::{BodyExt, Empty, Full, combinators::BoxBody};
use hyper::{Response, StatusCode, header};
use std::convert::Infallible;
use tracing::{debug, error};

#[derive(Debug, Clone, Copy)]
pub enum CacheStrategy {
    Yes,      // 1 hour
    Explicit, // No cache at all
}

impl fmt::Display for CacheStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CacheStrategy::Yes => write!(f, "Yes (1 hour)"),
            CacheStrategy::Explicit => write!(f, "Explicit (no-cache)"),
        }
    }
}

/// Resolve a request path under `web_dir`, refusing anything that would
/// climb out of it.
pub fn resolve_static_path(web_dir: &str, request_path: &str) -> Option<PathBuf> {
    let relative = Path::new(request_path.trim_start_matches('/'));
    if relative
        .components()
        .any(|c| !matches!(c, Component::Normal(_)))
    {
        return None;
    }
    Some(Path::new(web_dir).join(relative))
}

/// Read a file from disk and deliver it with caching headers.
///
/// Returns `Ok(None)` when the file does not exist so the caller can fall
/// through to its 404.
pub async fn deliver_static_file(
    file_path: &Path,
    cache: CacheStrategy,
) -> Result<Option<Response<BoxBody<Bytes, Infallible>>>> {
    debug!(
        "Reading static file from: {} (cache: {})",
        file_path.display(),
        cache
    );

    let content = match tokio::fs::read(file_path).await {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!("Static file not found: {}", file_path.display());
            return Ok(None);
        }
        Err(e) => {
            return Err(e)
                .with_context(|| format!("Failed to read static file: {}", file_path.display()));
        }
    };

    let mime_type = get_mime_type(file_path);

    debug!(
        "Delivering static file, size: {} bytes, mime: {}",
        content.len(),
        mime_type
    );

    let mut response = Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, mime_type)
        .header(header::X_CONTENT_TYPE_OPTIONS, "nosniff")
        .body(full(content))
        .map_err(|e: http::Error| {
            error!("Failed to build static response: {}", e);
            anyhow!("Failed to build static response: {}", e)
        })?;

    let cache_control = match cache {
        CacheStrategy::Yes => HeaderValue::from_static("public, max-age=3600"),
        CacheStrategy::Explicit => HeaderValue::from_static("no-cache, no-store, must-revalidate"),
    };
    response
        .headers_mut()
        .insert(header::CACHE_CONTROL, cache_control);

    Ok(Some(response))
}

/// Helper function to determine MIME type from file extension
fn get_mime_type(path: &Path) -> &'static str {
    match path.extension().and_then(|s| s.to_str()) {
        Some("html") | Some("htm") => "text/html; charset=utf-8",
        Some("css") => "text/css; charset=utf-8",
        Some("js") | Some("mjs") => "application/javascript; charset=utf-8",
        Some("json") => "application/json",
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("svg") => "image/svg+xml",
        Some("ico") => "image/x-icon",
        Some("webp") => "image/webp",
        Some("woff") => "font/woff",
        Some("woff2") => "font/woff2",
        Some("txt") => "text/plain; charset=utf-8",
        _ => "application/octet-stream",
    }
}

/// Helper function to create an empty body
pub fn empty() -> BoxBody<Bytes, Infallible> {
    Empty::<Bytes>::new().boxed()
}

/// Helper function to create a full body from various types
pub fn full<T: Into<Bytes>>(chunk: T) -> BoxBody<Bytes, Infallible> {
    Full::new(chunk.into()).boxed()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn static_path_stays_under_web_dir() {
        assert_eq!(
            resolve_static_path("public", "/static/app.js"),
            Some(PathBuf::from("public/static/app.js"))
        );
    }

    #[test]
    fn static_path_rejects_traversal() {
        assert_eq!(resolve_static_path("public", "/static/../../etc/passwd"), None);
        assert_eq!(resolve_static_path("public", "/./index.html"), None);
    }

    #[test]
    fn mime_type_from_extension() {
        assert_eq!(get_mime_type(Path::new("a/index.html")), "text/html; charset=utf-8");
        assert_eq!(get_mime_type(Path::new("a/b.PNG")), "application/octet-stream");
        assert_eq!(get_mime_type(Path::new("a/b.png")), "image/png");
    }

    #[tokio::test]
    async fn delivers_existing_file_with_headers() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("index.html");
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(b"<h1>roster</h1>").unwrap();

        let response = deliver_static_file(&path, CacheStrategy::Explicit)
            .await
            .unwrap()
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()[header::CONTENT_TYPE],
            "text/html; charset=utf-8"
        );
        assert_eq!(
            response.headers()[header::CACHE_CONTROL],
            "no-cache, no-store, must-revalidate"
        );
        let body = response.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(&body[..], b"<h1>roster</h1>");
    }

    #[tokio::test]
    async fn missing_file_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let result = deliver_static_file(&dir.path().join("nope.css"), CacheStrategy::Yes)
            .await
            .unwrap();
        assert!(result.is_none());
    }
}
