//! pvmap-qs (Query Service) - Read-only land value queries
//!
//! Serves bounding-box land value lookups over the store the ingest
//! service committed. Attaches read-only; never writes.

use anyhow::Result;
use clap::Parser;
use pvmap_common::{config, db::settings};
use pvmap_qs::{build_router, db, AppState};
use tracing::info;

#[derive(Parser)]
#[command(name = "pvmap-qs", about = "Land value query service for PVMAP")]
struct Cli {
    /// Root folder holding the database
    #[arg(long)]
    root_folder: Option<String>,

    /// Listen port
    #[arg(long, default_value_t = 5080)]
    port: u16,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    info!(
        "Starting PVMAP Query Service (pvmap-qs) v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );

    let cli = Cli::parse();

    let root_folder = config::resolve_root_folder(cli.root_folder.as_deref());
    let db_path = config::database_path(&root_folder);
    info!("Database path: {}", db_path.display());

    let pool = db::connect_readonly(&db_path).await?;
    info!("Connected to database (read-only)");

    // Deployment parameters live in the store so both services agree
    let half_width_deg = settings::get_f64(&pool, "qs_half_width_deg", 0.008).await?;
    let valuation_year = settings::get_i64(&pool, "qs_valuation_year", 2020).await?;
    info!("Query box half-width: {half_width_deg} deg, valuation year: {valuation_year}");

    let state = AppState::new(pool, half_width_deg, valuation_year);
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(("127.0.0.1", cli.port)).await?;
    info!("pvmap-qs listening on http://127.0.0.1:{}", cli.port);

    axum::serve(listener, app).await?;

    Ok(())
}
