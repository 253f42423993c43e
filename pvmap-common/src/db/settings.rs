//! Typed access to the settings table
//!
//! Deployment parameters live in the store itself so the ingest service and
//! the query service read one consistent configuration. Values are stored as
//! text; a value that fails to parse falls back to the caller's default.

use crate::Result;
use sqlx::SqlitePool;
use tracing::warn;

/// Read a raw setting value, `None` when the key is absent
pub async fn get_setting(pool: &SqlitePool, key: &str) -> Result<Option<String>> {
    let value = sqlx::query_scalar("SELECT value FROM settings WHERE key = ?")
        .bind(key)
        .fetch_optional(pool)
        .await?;
    Ok(value)
}

/// Insert or replace a setting value
pub async fn set_setting(pool: &SqlitePool, key: &str, value: &str) -> Result<()> {
    sqlx::query("INSERT OR REPLACE INTO settings (key, value) VALUES (?, ?)")
        .bind(key)
        .bind(value)
        .execute(pool)
        .await?;
    Ok(())
}

/// Read an integer setting with a fallback default
pub async fn get_i64(pool: &SqlitePool, key: &str, default: i64) -> Result<i64> {
    Ok(parse_or_default(get_setting(pool, key).await?, key, default))
}

/// Read a float setting with a fallback default
pub async fn get_f64(pool: &SqlitePool, key: &str, default: f64) -> Result<f64> {
    Ok(parse_or_default(get_setting(pool, key).await?, key, default))
}

/// Read a boolean setting stored as 0/1 with a fallback default
pub async fn get_bool(pool: &SqlitePool, key: &str, default: bool) -> Result<bool> {
    let stored = get_i64(pool, key, i64::from(default)).await?;
    Ok(stored != 0)
}

fn parse_or_default<T: std::str::FromStr>(value: Option<String>, key: &str, default: T) -> T {
    match value {
        Some(raw) => match raw.parse() {
            Ok(parsed) => parsed,
            Err(_) => {
                warn!("setting {key} holds unparseable value '{raw}', using default");
                default
            }
        },
        None => default,
    }
}
