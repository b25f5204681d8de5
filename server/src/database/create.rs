use sqlx::AnyPool;
use tracing::info;

/// Create the schema if it does not exist yet. Safe to run on every start.
///
/// Only portable DDL is used here: the same statements run against
/// PostgreSQL in production and SQLite in development and tests.
pub async fn create_tables(pool: &AnyPool) -> sqlx::Result<()> {
    // Characters: `name` is the identity. Profile choices are stored by their
    // display label and may be NULL for rows written before they existed.
    sqlx::query(
        "CREATE TABLE IF NOT EXISTS characters (
            name      TEXT NOT NULL PRIMARY KEY,
            faceclaim TEXT NOT NULL,
            image     TEXT NOT NULL,
            bio       TEXT NOT NULL,
            password  TEXT NOT NULL,
            gender    TEXT,
            sexuality TEXT,
            house     TEXT,
            year      TEXT
        )",
    )
    .execute(pool)
    .await?;

    // Autocomplete matches on a case-folded prefix.
    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_characters_name_lower ON characters (LOWER(name))",
    )
    .execute(pool)
    .await?;

    info!("Database schema ready");
    Ok(())
}
