//! Schema migrations: embedded, ordered SQL steps applied once and recorded in `_migrations`.
//!
//! A run holds a PostgreSQL advisory lock so concurrent starts do not race; each step runs in
//! its own transaction together with its bookkeeping row.

use crate::error::AppError;
use chrono::{DateTime, Utc};
use sqlx::{Connection, PgConnection, PgPool};
use std::collections::HashMap;

const LOCK_KEY: i64 = 0x7072_6f64_7563_7473;
const BOOKKEEPING_DDL: &str = r#"
    CREATE TABLE IF NOT EXISTS "_migrations" (
        "id" TEXT PRIMARY KEY,
        "applied_at" TIMESTAMPTZ NOT NULL DEFAULT NOW()
    )
"#;

#[derive(Clone, Copy, Debug)]
pub struct Migration {
    pub id: &'static str,
    pub up: &'static str,
    pub down: &'static str,
}

/// Migrations shipped with the service, in application order.
pub const MIGRATIONS: &[Migration] = &[Migration {
    id: "0001_create_init",
    up: include_str!("../migrations/0001_create_init.up.sql"),
    down: include_str!("../migrations/0001_create_init.down.sql"),
}];

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MigrationStatus {
    pub id: &'static str,
    pub applied_at: Option<DateTime<Utc>>,
}

#[derive(Clone, Copy, Debug)]
pub struct Migrator {
    migrations: &'static [Migration],
}

impl Default for Migrator {
    fn default() -> Self {
        Migrator::new(MIGRATIONS)
    }
}

impl Migrator {
    pub fn new(migrations: &'static [Migration]) -> Self {
        Migrator { migrations }
    }

    /// Migrations restricted to `ids` (all when `None` or empty), kept in application order.
    /// Unknown ids are an error so a typo never silently does nothing.
    pub fn select(&self, ids: Option<&[String]>) -> Result<Vec<&'static Migration>, AppError> {
        let ids = match ids {
            Some(ids) if !ids.is_empty() => ids,
            _ => return Ok(self.migrations.iter().collect()),
        };
        if let Some(unknown) = ids.iter().find(|id| !self.migrations.iter().any(|m| m.id == id.as_str())) {
            return Err(AppError::Migration(format!("unknown migration '{}'", unknown)));
        }
        Ok(self
            .migrations
            .iter()
            .filter(|m| ids.iter().any(|id| id == m.id))
            .collect())
    }

    /// Apply pending migrations (optionally only `ids`). Returns the ids applied by this call.
    pub async fn apply(&self, pool: &PgPool, ids: Option<&[String]>) -> Result<Vec<&'static str>, AppError> {
        let selected = self.select(ids)?;
        let mut conn = pool.acquire().await?;
        lock(&mut conn).await?;
        let result = apply_locked(&mut conn, selected).await;
        unlock(&mut conn, result).await
    }

    /// Revert applied migrations (optionally only `ids`) in reverse order. Returns the ids reverted.
    pub async fn rollback(&self, pool: &PgPool, ids: Option<&[String]>) -> Result<Vec<&'static str>, AppError> {
        let selected = self.select(ids)?;
        let mut conn = pool.acquire().await?;
        lock(&mut conn).await?;
        let result = rollback_locked(&mut conn, selected).await;
        unlock(&mut conn, result).await
    }

    /// Every known migration with the time it was applied, if it was.
    pub async fn status(&self, pool: &PgPool) -> Result<Vec<MigrationStatus>, AppError> {
        let mut conn = pool.acquire().await?;
        let applied = applied_ids(&mut conn).await?;
        Ok(self
            .migrations
            .iter()
            .map(|m| MigrationStatus {
                id: m.id,
                applied_at: applied.get(m.id).copied(),
            })
            .collect())
    }
}

/// Apply every pending embedded migration.
pub async fn apply_migrations(pool: &PgPool) -> Result<Vec<&'static str>, AppError> {
    Migrator::default().apply(pool, None).await
}

async fn applied_ids(conn: &mut PgConnection) -> Result<HashMap<String, DateTime<Utc>>, AppError> {
    sqlx::query(BOOKKEEPING_DDL).execute(&mut *conn).await?;
    let rows: Vec<(String, DateTime<Utc>)> = sqlx::query_as(r#"SELECT "id", "applied_at" FROM "_migrations""#)
        .fetch_all(&mut *conn)
        .await?;
    Ok(rows.into_iter().collect())
}

async fn apply_locked(
    conn: &mut PgConnection,
    selected: Vec<&'static Migration>,
) -> Result<Vec<&'static str>, AppError> {
    let applied = applied_ids(&mut *conn).await?;
    let mut done = Vec::new();
    for m in selected.into_iter().filter(|m| !applied.contains_key(m.id)) {
        tracing::info!(migration = m.id, "applying migration");
        let mut tx = conn.begin().await?;
        sqlx::raw_sql(m.up)
            .execute(&mut *tx)
            .await
            .map_err(|e| AppError::Migration(format!("{} failed: {}", m.id, e)))?;
        sqlx::query(r#"INSERT INTO "_migrations" ("id") VALUES ($1)"#)
            .bind(m.id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        done.push(m.id);
    }
    Ok(done)
}

async fn rollback_locked(
    conn: &mut PgConnection,
    selected: Vec<&'static Migration>,
) -> Result<Vec<&'static str>, AppError> {
    let applied = applied_ids(&mut *conn).await?;
    let mut done = Vec::new();
    for m in selected.into_iter().rev().filter(|m| applied.contains_key(m.id)) {
        tracing::info!(migration = m.id, "rolling back migration");
        let mut tx = conn.begin().await?;
        sqlx::raw_sql(m.down)
            .execute(&mut *tx)
            .await
            .map_err(|e| AppError::Migration(format!("{} rollback failed: {}", m.id, e)))?;
        sqlx::query(r#"DELETE FROM "_migrations" WHERE "id" = $1"#)
            .bind(m.id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        done.push(m.id);
    }
    Ok(done)
}

async fn lock(conn: &mut PgConnection) -> Result<(), AppError> {
    sqlx::query("SELECT pg_advisory_lock($1)")
        .bind(LOCK_KEY)
        .execute(&mut *conn)
        .await?;
    Ok(())
}

/// Release the advisory lock whatever `result` holds; the run's own error wins over an unlock error.
async fn unlock<T>(conn: &mut PgConnection, result: Result<T, AppError>) -> Result<T, AppError> {
    let unlocked = sqlx::query("SELECT pg_advisory_unlock($1)")
        .bind(LOCK_KEY)
        .execute(&mut *conn)
        .await;
    let value = result?;
    unlocked?;
    Ok(value)
}
