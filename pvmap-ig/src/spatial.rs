//! Coordinate index builder
//!
//! Turns each stored coordinate into a near-point bounding rectangle in the
//! `coord_index` table, which the query service range-scans for bounding-box
//! containment. Index ids are allocated from one strictly increasing counter
//! seeded at the current maximum; they are deliberately independent of the
//! property's own primary key, so the property row carries the mapping.

use anyhow::Result;
use sqlx::SqlitePool;
use tracing::info;

/// Sub-meter pad applied to each coordinate so every entry is a proper
/// rectangle rather than a degenerate point.
pub const COORD_EPSILON: f64 = 1e-7;

/// Index every stored coordinate that is not indexed yet.
///
/// Runs as a bulk pass after ingest and is idempotent across runs: a
/// property keeps the entry it was first given, and ids are never reused.
/// Returns the number of entries added.
pub async fn build_coord_index(pool: &SqlitePool) -> Result<usize> {
    let mut tx = pool.begin().await?;

    let max_id: Option<i64> = sqlx::query_scalar("SELECT MAX(id) FROM coord_index")
        .fetch_one(&mut *tx)
        .await?;
    let mut next_id = max_id.unwrap_or(0) + 1;

    let pending = sqlx::query_as::<_, (i64, f64, f64)>(
        "SELECT id, lat, lon FROM properties
         WHERE coord_index_id IS NULL AND lat IS NOT NULL AND lon IS NOT NULL",
    )
    .fetch_all(&mut *tx)
    .await?;

    let added = pending.len();

    for (property_id, lat, lon) in pending {
        sqlx::query(
            "INSERT INTO coord_index (id, min_lat, max_lat, min_lon, max_lon)
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(next_id)
        .bind(lat)
        .bind(lat + COORD_EPSILON)
        .bind(lon)
        .bind(lon + COORD_EPSILON)
        .execute(&mut *tx)
        .await?;

        sqlx::query("UPDATE properties SET coord_index_id = ? WHERE id = ?")
            .bind(next_id)
            .bind(property_id)
            .execute(&mut *tx)
            .await?;

        next_id += 1;
    }

    tx.commit().await?;

    if added > 0 {
        info!("coordinate index grew by {added} entries");
    }

    Ok(added)
}
