pub mod characters;
pub mod create;
pub mod url;

use sqlx::AnyPool;
use sqlx::any::AnyPoolOptions;
use tracing::info;

pub use url::{DatabaseUrlError, normalize_database_url};

/// Open a pool for a normalized database URL.
///
/// In-memory SQLite lives only as long as its connection, so such pools
/// never expire idle connections.
pub async fn connect(url: &str, max_connections: u32) -> sqlx::Result<AnyPool> {
    sqlx::any::install_default_drivers();

    let mut options = AnyPoolOptions::new().max_connections(max_connections);
    if url.contains(":memory:") {
        options = options.idle_timeout(None).max_lifetime(None);
    }

    let pool = options.connect(url).await?;
    info!(
        "Database pool ready ({} max connections)",
        max_connections
    );
    Ok(pool)
}

/// `SELECT 1` round-trip used at startup and by the keepalive task.
pub async fn ping(pool: &AnyPool) -> sqlx::Result<()> {
    sqlx::query("SELECT 1").execute(pool).await?;
    Ok(())
}

/// True when the error is a primary-key / unique constraint violation.
pub fn is_unique_violation(e: &sqlx::Error) -> bool {
    match e {
        sqlx::Error::Database(db) => {
            // SQLite reports text primary keys by message only on some builds.
            db.is_unique_violation() || db.message().contains("UNIQUE constraint failed")
        }
        _ => false,
    }
}
