//! Ingest-side database operations
//!
//! Everything here runs either before the pipeline starts (input sampling,
//! address loading) or inside the persistence sink. During a run the sink is
//! the only caller of `insert_rows`; that single-writer rule is what lets
//! fifty fetch workers share one store safely.

use anyhow::{Context, Result};
use pvmap_common::db::models::{InputRecord, NormalizedRows};
use sqlx::SqlitePool;
use std::path::Path;
use tracing::warn;

/// Select the stored addresses for one zip code as pipeline input
pub async fn sample_by_zip(pool: &SqlitePool, zip_code: &str) -> Result<Vec<InputRecord>> {
    let rows = sqlx::query_as::<_, (i64, String, Option<String>)>(
        "SELECT id, address, folio FROM properties WHERE zip_code = ?",
    )
    .bind(zip_code)
    .fetch_all(pool)
    .await?;

    Ok(rows
        .into_iter()
        .map(|(property_id, address, folio)| InputRecord {
            property_id,
            address,
            folio,
        })
        .collect())
}

/// Insert one property row, returning its id
pub async fn insert_property(
    pool: &SqlitePool,
    address: &str,
    city: Option<&str>,
    state: Option<&str>,
    zip_code: &str,
    lat: Option<f64>,
    lon: Option<f64>,
) -> Result<i64> {
    let result = sqlx::query(
        "INSERT INTO properties (address, city, state, zip_code, lat, lon)
         VALUES (?, ?, ?, ?, ?, ?)",
    )
    .bind(address)
    .bind(city)
    .bind(state)
    .bind(zip_code)
    .bind(lat)
    .bind(lon)
    .execute(pool)
    .await?;

    Ok(result.last_insert_rowid())
}

/// Load address records produced by the geographic extract.
///
/// Line format: `housenumber street, city, state, zipcode, lat, lon`.
/// Coordinates may be empty when the extract had none for a node. Malformed
/// lines are skipped with a warning rather than aborting the load.
pub async fn load_address_file(pool: &SqlitePool, path: &Path) -> Result<usize> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read address file {}", path.display()))?;

    let mut loaded = 0usize;
    for (line_number, line) in contents.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }

        let fields: Vec<&str> = line.split(", ").collect();
        if fields.len() < 6 {
            warn!("skipping malformed address line {}: '{line}'", line_number + 1);
            continue;
        }

        // The trailing five fields are fixed; the address itself may in
        // principle contain the separator
        let (address_fields, rest) = fields.split_at(fields.len() - 5);
        let address = address_fields.join(", ");
        let (city, state, zip_code) = (rest[0], rest[1], rest[2]);
        let lat = rest[3].trim().parse::<f64>().ok();
        let lon = rest[4].trim().parse::<f64>().ok();

        insert_property(pool, &address, Some(city), Some(state), zip_code, lat, lon).await?;
        loaded += 1;
    }

    Ok(loaded)
}

/// Commit all row families for one record as a single atomic unit.
///
/// Readers either see every family for a property or none of them.
pub async fn insert_rows(
    pool: &SqlitePool,
    property_id: i64,
    rows: &NormalizedRows,
) -> Result<()> {
    let mut tx = pool.begin().await?;

    for assessment in &rows.assessments {
        sqlx::query(
            "INSERT INTO assessments (year, land_value, building_value, extra_feature_value, property_id)
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(assessment.year)
        .bind(assessment.land_value)
        .bind(assessment.building_value)
        .bind(assessment.extra_feature_value)
        .bind(property_id)
        .execute(&mut *tx)
        .await?;
    }

    for parcel in &rows.land {
        sqlx::query(
            "INSERT INTO land_parcels (year, area, area_unit, adjusted_unit_price, property_id)
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(parcel.year)
        .bind(parcel.area)
        .bind(&parcel.area_unit)
        .bind(parcel.adjusted_unit_price)
        .bind(property_id)
        .execute(&mut *tx)
        .await?;
    }

    for sale in &rows.sales {
        sqlx::query("INSERT INTO sales (price, date, property_id) VALUES (?, ?, ?)")
            .bind(sale.price)
            .bind(&sale.date)
            .bind(property_id)
            .execute(&mut *tx)
            .await?;
    }

    for building in &rows.buildings {
        sqlx::query(
            "INSERT INTO buildings (building_number, year_constructed, building_area, property_id)
             VALUES (?, ?, ?, ?)",
        )
        .bind(building.building_number)
        .bind(building.year_constructed)
        .bind(building.building_area)
        .bind(property_id)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;
    Ok(())
}
