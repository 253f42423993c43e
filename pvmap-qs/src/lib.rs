//! pvmap-qs library - Land value query service
//!
//! Read-only service answering bounding-box queries over the coordinate
//! index built by pvmap-ig. It attaches to a store the ingest service has
//! already committed and never writes to it.

use axum::Router;
use sqlx::SqlitePool;
use tower_http::trace::TraceLayer;

pub mod api;
pub mod db;

/// Application state shared across HTTP handlers
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool (read-only)
    pub db: SqlitePool,
    /// Query box half-width in degrees, fixed per deployment
    pub half_width_deg: f64,
    /// Roll year whose land valuation is reported
    pub valuation_year: i64,
}

impl AppState {
    pub fn new(db: SqlitePool, half_width_deg: f64, valuation_year: i64) -> Self {
        Self {
            db,
            half_width_deg,
            valuation_year,
        }
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    use axum::routing::get;

    Router::new()
        .route("/api/v1", get(api::data_request))
        .merge(api::health_routes())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
