use std::convert::Infallible;
use std::future::Future;
use std::pin::Pin;

use anyhow::{Context, Result};
use bytes::Bytes;
use http_body_util::combinators::BoxBody;
use hyper::{Method, Request, Response, StatusCode};
use tracing::debug;

use crate::AppState;
use crate::handlers::http::{characters, utils::*, viewers};

// ---------------------------------------------------------------------------
// Handler type
// ---------------------------------------------------------------------------
//
// Every route is public: edits and deletes carry their own password in the
// body and are checked by the command layer, not the router.

type RouteHandler = Box<
    dyn Fn(
            Request<hyper::body::Incoming>,
            AppState,
        )
            -> Pin<Box<dyn Future<Output = Result<Response<BoxBody<Bytes, Infallible>>>> + Send>>
        + Send
        + Sync,
>;

struct Route {
    method: Method,
    path: String,
    handler: RouteHandler,
}

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

pub struct Router {
    routes: Vec<Route>,
    web_dir: String,
}

impl std::fmt::Debug for Router {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Router")
            .field("routes_count", &self.routes.len())
            .field("web_dir", &self.web_dir)
            .finish()
    }
}

impl Router {
    pub fn new(web_dir: impl Into<String>) -> Self {
        Self {
            routes: Vec::new(),
            web_dir: web_dir.into(),
        }
    }

    fn add<F, Fut>(mut self, method: Method, path: &str, handler: F) -> Self
    where
        F: Fn(Request<hyper::body::Incoming>, AppState) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Response<BoxBody<Bytes, Infallible>>>> + Send + 'static,
    {
        self.routes.push(Route {
            method,
            path: path.to_string(),
            handler: Box::new(move |req, state| Box::pin(handler(req, state))),
        });
        self
    }

    pub fn get<F, Fut>(self, path: &str, handler: F) -> Self
    where
        F: Fn(Request<hyper::body::Incoming>, AppState) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Response<BoxBody<Bytes, Infallible>>>> + Send + 'static,
    {
        self.add(Method::GET, path, handler)
    }

    pub fn post<F, Fut>(self, path: &str, handler: F) -> Self
    where
        F: Fn(Request<hyper::body::Incoming>, AppState) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Response<BoxBody<Bytes, Infallible>>>> + Send + 'static,
    {
        self.add(Method::POST, path, handler)
    }

    pub fn patch<F, Fut>(self, path: &str, handler: F) -> Self
    where
        F: Fn(Request<hyper::body::Incoming>, AppState) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Response<BoxBody<Bytes, Infallible>>>> + Send + 'static,
    {
        self.add(Method::PATCH, path, handler)
    }

    pub fn delete<F, Fut>(self, path: &str, handler: F) -> Self
    where
        F: Fn(Request<hyper::body::Incoming>, AppState) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Response<BoxBody<Bytes, Infallible>>>> + Send + 'static,
    {
        self.add(Method::DELETE, path, handler)
    }

    // ── Dispatch ──────────────────────────────────────────────────────────────

    pub async fn route(
        &self,
        req: Request<hyper::body::Incoming>,
        state: AppState,
    ) -> Result<Response<BoxBody<Bytes, Infallible>>> {
        let method = req.method().clone();
        let path = req.uri().path().to_string();

        if let Some(route) = self
            .routes
            .iter()
            .find(|route| route.method == method && Self::path_matches(&route.path, &path))
        {
            debug!("{} {} matched {}", method, path, route.path);
            return (route.handler)(req, state).await;
        }

        // No registered route matched: try the static file fallback for GET.
        if method == Method::GET {
            if let Some(static_response) = self.try_serve_static(&path).await? {
                return Ok(static_response);
            }
        }

        deliver_error_json("NOT_FOUND", "Endpoint not found", StatusCode::NOT_FOUND)
            .context("Failed to deliver 404 response")
    }

    // ── Path matching ─────────────────────────────────────────────────────────

    pub fn path_matches(route_path: &str, request_path: &str) -> bool {
        // Strip query string from incoming request path before comparing.
        let clean = request_path.split('?').next().unwrap_or(request_path);

        if route_path == clean {
            return true;
        }

        // Segment-by-segment matching for `:param` wildcards.
        // e.g.  "/api/characters/:name"  matches  "/api/characters/Iris"
        let route_segs: Vec<&str> = route_path.split('/').collect();
        let path_segs: Vec<&str> = clean.split('/').collect();

        if route_segs.len() != path_segs.len() {
            return false;
        }

        route_segs
            .iter()
            .zip(path_segs.iter())
            .all(|(r, p)| (r.starts_with(':') && !p.is_empty()) || r == p)
    }

    // ── Static file fallback ──────────────────────────────────────────────────

    async fn try_serve_static(
        &self,
        path: &str,
    ) -> Result<Option<Response<BoxBody<Bytes, Infallible>>>> {
        let (request_path, cache) = match path {
            "/" | "/index.html" => ("/index.html", CacheStrategy::Explicit),
            path if path.starts_with("/static/") => (path, CacheStrategy::Yes),
            _ => return Ok(None),
        };

        let Some(file_path) = resolve_static_path(&self.web_dir, request_path) else {
            debug!("Refusing static path outside web dir: {}", path);
            return Ok(None);
        };

        deliver_static_file(&file_path, cache)
            .await
            .context("Failed to deliver static file")
    }
}

// ---------------------------------------------------------------------------
// Application router
// ---------------------------------------------------------------------------

pub fn build_router(web_dir: impl Into<String>) -> Router {
    Router::new(web_dir)
        .get("/api/health", |_req, _state| async move {
            deliver_serialized_json(
                &serde_json::json!({ "status": "healthy" }),
                StatusCode::OK,
            )
        })
        // ── Characters ───────────────────────────────────────────────────────
        .get("/api/characters", |req, state| async move {
            characters::handle_list_characters(req, state)
                .await
                .context("List characters failed")
        })
        .post("/api/characters", |req, state| async move {
            characters::handle_create_character(req, state)
                .await
                .context("Create character failed")
        })
        .get("/api/characters/:name", |req, state| async move {
            characters::handle_show_character(req, state)
                .await
                .context("Show character failed")
        })
        .patch("/api/characters/:name", |req, state| async move {
            characters::handle_edit_character(req, state)
                .await
                .context("Edit character failed")
        })
        .delete("/api/characters/:name", |req, state| async move {
            characters::handle_delete_character(req, state)
                .await
                .context("Delete character failed")
        })
        .get("/api/autocomplete/:field", |req, state| async move {
            characters::handle_autocomplete(req, state)
                .await
                .context("Autocomplete failed")
        })
        .get("/api/directory", |req, state| async move {
            characters::handle_directory(req, state)
                .await
                .context("Directory link failed")
        })
        // ── Live viewers ─────────────────────────────────────────────────────
        .get("/ws", |req, state| async move {
            viewers::handle_viewer_upgrade(req, state)
                .await
                .context("Viewer upgrade failed")
        })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
