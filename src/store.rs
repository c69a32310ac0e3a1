//! Connection pool setup and database bootstrap.

use crate::config::DatabaseSettings;
use crate::error::AppError;
use sqlx::postgres::PgPoolOptions;
use sqlx::{ConnectOptions, PgPool};
use std::time::Duration;

/// Build the bounded pool shared by all requests. Connections are recycled after a minute idle.
pub async fn connect_pool(db: &DatabaseSettings) -> Result<PgPool, AppError> {
    let pool = PgPoolOptions::new()
        .max_connections(db.max_connections)
        .acquire_timeout(Duration::from_millis(db.acquire_timeout_ms))
        .idle_timeout(Duration::from_secs(60))
        .connect_with(db.connect_options())
        .await?;
    tracing::info!(host = %db.host, port = db.port, database = %db.name, "database pool ready");
    Ok(pool)
}

/// Pool that does not connect until first use.
pub fn connect_pool_lazy(db: &DatabaseSettings) -> PgPool {
    PgPoolOptions::new()
        .max_connections(db.max_connections)
        .acquire_timeout(Duration::from_millis(db.acquire_timeout_ms))
        .connect_lazy_with(db.connect_options())
}

/// Create the configured database if it does not exist, connecting through the `postgres`
/// maintenance database with the same credentials.
pub async fn ensure_database_exists(db: &DatabaseSettings) -> Result<(), AppError> {
    if db.name.is_empty() || db.name == "postgres" {
        return Ok(());
    }
    let mut conn = db.connect_options().database("postgres").connect().await?;
    let exists: (bool,) = sqlx::query_as("SELECT EXISTS(SELECT 1 FROM pg_database WHERE datname = $1)")
        .bind(&db.name)
        .fetch_one(&mut conn)
        .await?;
    if !exists.0 {
        sqlx::query(&format!("CREATE DATABASE {}", quote_ident(&db.name)))
            .execute(&mut conn)
            .await?;
        tracing::info!(database = %db.name, "created database");
    }
    Ok(())
}

fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}
