use anyhow::Context;
use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::{Row, SqlitePool};
use tracing::{info, warn};

use crate::models::ScoutRecord;
use crate::normalize::RawRow;

const BACKUP_KEY: &str = "matches_backup";

#[derive(Debug, Clone, PartialEq)]
pub struct CacheInfo {
    pub record_count: i64,
    pub updated_at: DateTime<Utc>,
}

pub async fn connect(cache_url: &str) -> anyhow::Result<SqlitePool> {
    // A single connection keeps `sqlite::memory:` caches coherent.
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect(cache_url)
        .await
        .with_context(|| format!("failed to open scouting cache at {cache_url}"))?;
    Ok(pool)
}

pub async fn init_db(pool: &SqlitePool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

/// Returns the cached rows, or `None` when nothing is cached or the payload
/// cannot be decoded.
pub async fn read_cache(pool: &SqlitePool) -> anyhow::Result<Option<Vec<RawRow>>> {
    let row = sqlx::query("SELECT payload FROM scouting_cache WHERE cache_key = $1")
        .bind(BACKUP_KEY)
        .fetch_optional(pool)
        .await?;

    let Some(row) = row else {
        return Ok(None);
    };
    let payload: String = row.get("payload");

    match decode_payload(&payload) {
        Ok(rows) => {
            info!(records = rows.len(), "restored matches from local cache");
            Ok(Some(rows))
        }
        Err(err) => {
            warn!(error = %err, "local cache is corrupt, ignoring it");
            Ok(None)
        }
    }
}

fn decode_payload(payload: &str) -> anyhow::Result<Vec<RawRow>> {
    let value: Value = serde_json::from_str(payload)?;
    let Value::Array(items) = value else {
        anyhow::bail!("cache payload is not an array");
    };

    items
        .into_iter()
        .map(|item| match item {
            Value::Object(row) => Ok(row),
            other => Err(anyhow::anyhow!("cache entry is not an object: {other}")),
        })
        .collect()
}

pub async fn write_cache(pool: &SqlitePool, records: &[ScoutRecord]) -> anyhow::Result<()> {
    let payload = serde_json::to_string(records).context("failed to encode cache payload")?;

    sqlx::query(
        r#"
        INSERT INTO scouting_cache (cache_key, payload, record_count, updated_at)
        VALUES ($1, $2, $3, $4)
        ON CONFLICT (cache_key) DO UPDATE
        SET payload = EXCLUDED.payload,
            record_count = EXCLUDED.record_count,
            updated_at = EXCLUDED.updated_at
        "#,
    )
    .bind(BACKUP_KEY)
    .bind(payload)
    .bind(records.len() as i64)
    .bind(Utc::now())
    .execute(pool)
    .await?;

    Ok(())
}

/// Drops the cached snapshot. Returns whether anything was removed.
pub async fn clear_cache(pool: &SqlitePool) -> anyhow::Result<bool> {
    let result = sqlx::query("DELETE FROM scouting_cache WHERE cache_key = $1")
        .bind(BACKUP_KEY)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

pub async fn cache_info(pool: &SqlitePool) -> anyhow::Result<Option<CacheInfo>> {
    let row = sqlx::query(
        "SELECT record_count, updated_at FROM scouting_cache WHERE cache_key = $1",
    )
    .bind(BACKUP_KEY)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(|row| CacheInfo {
        record_count: row.get("record_count"),
        updated_at: row.get("updated_at"),
    }))
}

#[cfg(test)]
pub(crate) async fn memory_pool() -> SqlitePool {
    let pool = connect("sqlite::memory:").await.expect("in-memory sqlite");
    init_db(&pool).await.expect("migrations apply");
    pool
}
