use std::convert::Infallible;
use std::sync::Arc;

use anyhow::{Context, Result};
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::Request;
use hyper_util::rt::{TokioIo, TokioTimer};
use hyper_util::service::TowerToHyperService;
use shared::types::AppConfig;
use sqlx::AnyPool;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tracing::{debug, error, info, warn};

use crate::AppState;
use crate::handlers::http::build_router;
use crate::handlers::http::utils::internal_error;
use crate::keepalive::spawn_keepalive;
use crate::tower_middle::RequestTimeoutLayer;

/// Accept HTTP connections on `listener` until `shutdown` flips to true.
///
/// Each connection runs on its own task with upgrades enabled so `/ws` can
/// switch protocols. On shutdown the accept loop stops and open HTTP
/// connections are asked to finish their in-flight request and close.
pub async fn serve(
    listener: TcpListener,
    state: AppState,
    mut shutdown: watch::Receiver<bool>,
) -> Result<()> {
    let router = Arc::new(build_router(state.config.paths.web_dir.clone()));
    let request_timeout = state.config.server.request_timeout();

    info!(
        "Listening on http://{}",
        listener
            .local_addr()
            .context("Listener has no local address")?
    );

    loop {
        tokio::select! {
            accepted = listener.accept() => {
                let (stream, peer) = match accepted {
                    Ok(accepted) => accepted,
                    Err(e) => {
                        warn!("Failed to accept connection: {}", e);
                        continue;
                    }
                };

                let router = Arc::clone(&router);
                let state = state.clone();
                let handler = tower::service_fn(move |req: Request<Incoming>| {
                    let router = Arc::clone(&router);
                    let state = state.clone();
                    async move {
                        let method = req.method().clone();
                        let path = req.uri().path().to_string();
                        let response = match router.route(req, state).await {
                            Ok(response) => response,
                            Err(e) => {
                                error!("{} {} failed: {:#}", method, path, e);
                                internal_error()
                            }
                        };
                        Ok::<_, Infallible>(response)
                    }
                });

                let service = ServiceBuilder::new()
                    .layer(CorsLayer::permissive())
                    .layer(RequestTimeoutLayer::new(request_timeout))
                    .service(handler);
                let service = TowerToHyperService::new(service);

                let io = TokioIo::new(stream);
                let mut conn_shutdown = shutdown.clone();

                tokio::spawn(async move {
                    let conn = http1::Builder::new()
                        .timer(TokioTimer::new())
                        .serve_connection(io, service)
                        .with_upgrades();
                    tokio::pin!(conn);

                    let mut draining = false;
                    loop {
                        tokio::select! {
                            result = conn.as_mut() => {
                                if let Err(e) = result {
                                    debug!("Connection from {} ended with error: {:?}", peer, e);
                                }
                                break;
                            }
                            _ = conn_shutdown.changed(), if !draining => {
                                draining = true;
                                conn.as_mut().graceful_shutdown();
                            }
                        }
                    }
                });
            }
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    info!("Stopped accepting connections");
                    break;
                }
            }
        }
    }

    Ok(())
}

/// Run the server until Ctrl-C, then shut everything down in order: stop
/// accepting, stop the keepalive, close every live viewer.
pub async fn run(config: AppConfig, db: AnyPool) -> Result<()> {
    let state = AppState::new(config, db);

    let addr = state.config.server.addr();
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let keepalive = spawn_keepalive(
        state.db.clone(),
        state.config.database.ping_interval(),
        shutdown_rx.clone(),
    );
    let server = tokio::spawn(serve(listener, state.clone(), shutdown_rx));

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for shutdown signal")?;
    info!("Shutdown signal received");

    // Receivers may already be gone if the server task failed.
    let _ = shutdown_tx.send(true);

    server.await.context("Server task panicked")??;
    if let Err(e) = keepalive.await {
        warn!("Keepalive task ended abnormally: {}", e);
    }

    state.broadcaster.shutdown().await;
    state.db.close().await;

    info!("Server stopped");
    Ok(())
}
