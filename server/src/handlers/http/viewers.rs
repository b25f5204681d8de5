use std::convert::Infallible;
use std::sync::Arc;

use anyhow::Result;
use bytes::Bytes;
use http_body_util::combinators::BoxBody;
use hyper::body::Incoming as IncomingBody;
use hyper::{Request, Response, StatusCode};
use tracing::{debug, warn};

use crate::AppState;
use crate::broadcast::serve_viewer;
use crate::handlers::http::utils::{
    accept_websocket, deliver_error_json, is_websocket_upgrade, websocket_accept_key,
    websocket_stream,
};

/// `GET /ws`: accept a live viewer.
///
/// Answers the handshake with 101 and hands the upgraded connection to the
/// broadcaster on a separate task, so the request itself completes at once.
pub async fn handle_viewer_upgrade(
    req: Request<IncomingBody>,
    state: AppState,
) -> Result<Response<BoxBody<Bytes, Infallible>>> {
    if !is_websocket_upgrade(&req) {
        return deliver_error_json(
            "UPGRADE_REQUIRED",
            "This endpoint only accepts WebSocket connections",
            StatusCode::UPGRADE_REQUIRED,
        );
    }

    let Some(accept_key) = websocket_accept_key(&req) else {
        return deliver_error_json(
            "BAD_REQUEST",
            "Missing Sec-WebSocket-Key header",
            StatusCode::BAD_REQUEST,
        );
    };

    let broadcaster = Arc::clone(&state.broadcaster);
    tokio::spawn(async move {
        match hyper::upgrade::on(req).await {
            Ok(upgraded) => {
                debug!("Viewer connection upgraded");
                let stream = websocket_stream(upgraded).await;
                serve_viewer(stream, broadcaster).await;
            }
            Err(e) => warn!("Viewer upgrade failed: {}", e),
        }
    });

    accept_websocket(&accept_key)
}
