use std::time::Duration;

use sqlx::AnyPool;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};
use tracing::{error, info};

use crate::database;

/// Ping the database every `interval` until `shutdown` flips to true.
///
/// Keeps hosted databases that suspend idle connections awake. A failed ping
/// is logged and retried on the next tick; it never stops the task.
pub fn spawn_keepalive(
    pool: AnyPool,
    interval: Duration,
    mut shutdown: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        info!("Database keepalive every {:?}", interval);

        let mut ticker = time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately; startup already pinged.
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    match database::ping(&pool).await {
                        Ok(()) => info!("Database ping successful"),
                        Err(e) => error!("Database ping failed: {}", e),
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        info!("Database keepalive stopped");
                        break;
                    }
                }
            }
        }
    })
}
