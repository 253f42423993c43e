//! Database initialization
//!
//! Creates the store on first run and brings the schema up idempotently.
//! Every service opens the database through here except the query service,
//! which attaches read-only to a store this module created earlier.

use crate::Result;
use sqlx::{sqlite::SqlitePoolOptions, SqlitePool};
use std::path::Path;
use tracing::info;

/// Initialize database connection and create tables if needed
pub async fn init_database(db_path: &Path) -> Result<SqlitePool> {
    let newly_created = !db_path.exists();

    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    // mode=rwc creates the file when missing. The pool stays small: during a
    // pipeline run only the sink task writes, and everything else is
    // occasional setup reads.
    let db_url = format!("sqlite://{}?mode=rwc", db_path.display());
    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect(&db_url)
        .await?;

    if newly_created {
        info!("Initialized new database: {}", db_path.display());
    } else {
        info!("Opened existing database: {}", db_path.display());
    }

    sqlx::query("PRAGMA foreign_keys = ON").execute(&pool).await?;

    // WAL lets the query service read while a later ingest run writes
    sqlx::query("PRAGMA journal_mode = WAL").execute(&pool).await?;

    sqlx::query("PRAGMA busy_timeout = 5000").execute(&pool).await?;

    create_properties_table(&pool).await?;
    create_coord_index_table(&pool).await?;
    create_assessments_table(&pool).await?;
    create_land_parcels_table(&pool).await?;
    create_sales_table(&pool).await?;
    create_buildings_table(&pool).await?;
    create_settings_table(&pool).await?;

    init_default_settings(&pool).await?;

    Ok(pool)
}

async fn create_properties_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS properties (
            id INTEGER PRIMARY KEY,
            address TEXT NOT NULL,
            city TEXT,
            state TEXT,
            zip_code TEXT NOT NULL,
            folio TEXT,
            lat REAL,
            lon REAL,
            coord_index_id INTEGER REFERENCES coord_index(id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_properties_zip_code ON properties(zip_code)")
        .execute(pool)
        .await?;

    Ok(())
}

/// Bounding rectangles over stored coordinates. Bounds are exact 8-byte
/// REALs so closed-interval containment comparisons hold at the boundary;
/// the composite index serves the range queries without a full scan.
async fn create_coord_index_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS coord_index (
            id INTEGER PRIMARY KEY,
            min_lat REAL NOT NULL,
            max_lat REAL NOT NULL,
            min_lon REAL NOT NULL,
            max_lon REAL NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_coord_index_bounds
         ON coord_index(min_lat, max_lat, min_lon, max_lon)",
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_assessments_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS assessments (
            id INTEGER PRIMARY KEY,
            year INTEGER NOT NULL,
            land_value REAL NOT NULL,
            building_value REAL NOT NULL,
            extra_feature_value REAL NOT NULL,
            property_id INTEGER NOT NULL REFERENCES properties(id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_assessments_property ON assessments(property_id)",
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_land_parcels_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS land_parcels (
            id INTEGER PRIMARY KEY,
            year INTEGER NOT NULL,
            area REAL NOT NULL,
            area_unit TEXT NOT NULL,
            adjusted_unit_price REAL NOT NULL,
            property_id INTEGER NOT NULL REFERENCES properties(id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    // The query service filters on valuation year before joining back
    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_land_parcels_year ON land_parcels(year, property_id)",
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_sales_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS sales (
            id INTEGER PRIMARY KEY,
            price REAL NOT NULL,
            date TEXT NOT NULL,
            property_id INTEGER NOT NULL REFERENCES properties(id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_buildings_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS buildings (
            id INTEGER PRIMARY KEY,
            building_number INTEGER NOT NULL,
            year_constructed INTEGER NOT NULL,
            building_area REAL NOT NULL,
            property_id INTEGER NOT NULL REFERENCES properties(id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_settings_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS settings (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Seed deployment parameters on first run. Existing values are never
/// overwritten, so a deployment that switched to the coarse search radius
/// keeps it across upgrades.
async fn init_default_settings(pool: &SqlitePool) -> Result<()> {
    let defaults: &[(&str, &str)] = &[
        // Query box half-width in degrees: 0.008 is the fine search radius,
        // 0.5 the coarse one. Pick one per deployment; never mix.
        ("qs_half_width_deg", "0.008"),
        // Roll year whose land valuation the query service reports
        ("qs_valuation_year", "2020"),
        ("ig_worker_pool_size", "50"),
        // Queue capacity = multiplier x worker pool size
        ("ig_queue_multiplier", "2"),
        // Land lines with frontage units: 1 = drop (the stricter of the two
        // historical ingest behaviors), 0 = keep
        ("ig_drop_frontage_parcels", "1"),
    ];

    for (key, value) in defaults {
        sqlx::query("INSERT OR IGNORE INTO settings (key, value) VALUES (?, ?)")
            .bind(key)
            .bind(value)
            .execute(pool)
            .await?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn test_pool() -> (tempfile::TempDir, SqlitePool) {
        let dir = tempfile::tempdir().expect("create temp dir");
        let pool = init_database(&dir.path().join("pvmap.db"))
            .await
            .expect("init database");
        (dir, pool)
    }

    #[tokio::test]
    async fn creates_all_tables() {
        let (_dir, pool) = test_pool().await;

        let tables: Vec<String> = sqlx::query_scalar(
            "SELECT name FROM sqlite_master WHERE type = 'table' ORDER BY name",
        )
        .fetch_all(&pool)
        .await
        .unwrap();

        for expected in [
            "assessments",
            "buildings",
            "coord_index",
            "land_parcels",
            "properties",
            "sales",
            "settings",
        ] {
            assert!(tables.iter().any(|t| t == expected), "missing table {expected}");
        }
    }

    #[tokio::test]
    async fn seeds_default_settings_once() {
        let (_dir, pool) = test_pool().await;

        let half_width: String =
            sqlx::query_scalar("SELECT value FROM settings WHERE key = 'qs_half_width_deg'")
                .fetch_one(&pool)
                .await
                .unwrap();
        assert_eq!(half_width, "0.008");

        // A changed value survives re-initialization
        sqlx::query("UPDATE settings SET value = '0.5' WHERE key = 'qs_half_width_deg'")
            .execute(&pool)
            .await
            .unwrap();
        init_default_settings(&pool).await.unwrap();

        let half_width: String =
            sqlx::query_scalar("SELECT value FROM settings WHERE key = 'qs_half_width_deg'")
                .fetch_one(&pool)
                .await
                .unwrap();
        assert_eq!(half_width, "0.5");
    }
}
