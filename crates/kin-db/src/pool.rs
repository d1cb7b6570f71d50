use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum DbError {
    #[error("failed to connect to database: {0}")]
    Connect(#[from] sqlx::Error),
}

/// Opens a bounded connection pool and enables the `vector` extension,
/// matching the teacher's `beagle-db` convention of doing connection setup
/// and extension bootstrap in one place rather than leaving it to the
/// migration that happens to run first.
pub async fn connect_pool(database_url: &str, max_connections: u32) -> Result<PgPool, DbError> {
    let pool = PgPoolOptions::new()
        .max_connections(max_connections)
        .connect(database_url)
        .await?;

    sqlx::query("CREATE EXTENSION IF NOT EXISTS vector")
        .execute(&pool)
        .await?;

    info!(max_connections, "connected to database");
    Ok(pool)
}
