//! Land value bounding-box query
//!
//! One read endpoint: given a center point, derive the query box from the
//! deployment's fixed half-width, find every coordinate-index entry whose
//! rectangle lies fully inside the box, and join the matches back to their
//! properties' valuation-year land rows.

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::error;

use crate::AppState;

/// Containment is closed-interval on all four bounds: an entry sitting
/// exactly on the box edge is a match.
const RANGE_QUERY: &str = r#"
SELECT
    p.id,
    p.lat,
    p.lon,
    l.adjusted_unit_price,
    l.area_unit,
    l.area
FROM
    land_parcels l
INNER JOIN
    properties p
ON
    l.property_id = p.id
WHERE
    l.year = ? AND
    p.coord_index_id IN (
        SELECT id FROM coord_index
        WHERE min_lat >= ? AND max_lat <= ? AND
              min_lon >= ? AND max_lon <= ?
    )
"#;

/// Query parameters for GET /api/v1.
///
/// Coordinates stay strings here so a missing value and an unparseable one
/// each produce their own client error instead of a generic rejection.
#[derive(Debug, Deserialize)]
pub struct DataQuery {
    #[serde(default)]
    pub method: String,
    pub lat: Option<String>,
    pub lon: Option<String>,
}

/// One joined result row
#[derive(Debug, Serialize)]
pub struct LandValueEntry {
    pub id: i64,
    pub lat: f64,
    pub lon: f64,
    pub land_value: f64,
    pub land_unit: String,
    pub land_area: f64,
}

/// GET /api/v1?method=landValue&lat=..&lon=..
pub async fn data_request(
    State(state): State<AppState>,
    Query(query): Query<DataQuery>,
) -> Response {
    if query.method != "landValue" {
        return client_error("Unknown method");
    }

    let (Some(lat), Some(lon)) = (query.lat, query.lon) else {
        return client_error("Missing latitude or longitude");
    };
    let (Ok(lat), Ok(lon)) = (lat.parse::<f64>(), lon.parse::<f64>()) else {
        return client_error("Malformed latitude or longitude");
    };

    let half_width = state.half_width_deg;

    let rows = sqlx::query_as::<_, (i64, f64, f64, f64, String, f64)>(RANGE_QUERY)
        .bind(state.valuation_year)
        .bind(lat - half_width)
        .bind(lat + half_width)
        .bind(lon - half_width)
        .bind(lon + half_width)
        .fetch_all(&state.db)
        .await;

    let rows = match rows {
        Ok(rows) => rows,
        Err(e) => {
            error!("land value query failed: {e}");
            return internal_error();
        }
    };

    let entries: Vec<LandValueEntry> = rows
        .into_iter()
        .map(
            |(id, lat, lon, adjusted_unit_price, area_unit, area)| LandValueEntry {
                id,
                lat,
                lon,
                land_value: adjusted_unit_price,
                land_unit: area_unit,
                land_area: area,
            },
        )
        .collect();

    Json(entries).into_response()
}

fn client_error(message: &str) -> Response {
    (
        StatusCode::BAD_REQUEST,
        Json(json!({ "completed": false, "message": message })),
    )
        .into_response()
}

fn internal_error() -> Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({ "completed": false, "message": "Internal error" })),
    )
        .into_response()
}
