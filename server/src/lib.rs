pub mod app;
pub mod broadcast;
pub mod commands;
pub mod database;
pub mod handlers;
pub mod keepalive;
pub mod tower_middle;

use std::sync::Arc;

use shared::types::AppConfig;
use sqlx::AnyPool;

use crate::broadcast::Broadcaster;

/// Shared application state, cloned into every request.
#[derive(Clone, Debug)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub db: AnyPool,
    pub broadcaster: Arc<Broadcaster>,
}

impl AppState {
    /// Must be called inside a Tokio runtime; starts the broadcaster's
    /// delivery task.
    pub fn new(config: AppConfig, db: AnyPool) -> Self {
        let broadcaster = Broadcaster::start(config.broadcast.send_timeout());
        Self {
            config: Arc::new(config),
            db,
            broadcaster,
        }
    }
}
