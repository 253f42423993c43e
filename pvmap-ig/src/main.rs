//! pvmap-ig (Property Ingest) - Fetch, normalize, and store property records
//!
//! Subcommands:
//! - `load`   - import address records produced by the geographic extract
//! - `ingest` - run the fetch-transform-load pipeline for one zip code
//! - `index`  - rebuild the coordinate index over stored coordinates

use anyhow::Result;
use clap::{Parser, Subcommand};
use pvmap_common::{config, db::settings};
use pvmap_ig::normalize::RetentionPolicy;
use pvmap_ig::pipeline::{self, PipelineConfig, DEFAULT_QUEUE_MULTIPLIER, DEFAULT_WORKER_POOL_SIZE};
use pvmap_ig::source::AppraiserClient;
use pvmap_ig::{db, report, spatial};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "pvmap-ig", about = "Property financial ingest for PVMAP")]
struct Cli {
    /// Root folder holding the database and reports
    #[arg(long)]
    root_folder: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Import address records from a geographic extract file
    Load {
        /// Address file, one `housenumber street, city, state, zip, lat, lon` line per record
        path: PathBuf,
    },
    /// Fetch, normalize and store financial records for one zip code
    Ingest {
        zip_code: String,

        /// Concurrently in-flight records (default from settings)
        #[arg(long)]
        workers: Option<usize>,

        /// Ingestion queue capacity (default: multiplier x workers)
        #[arg(long)]
        queue_capacity: Option<usize>,

        /// Drop frontage-unit land lines (default from settings)
        #[arg(long)]
        drop_frontage_parcels: Option<bool>,

        /// Keep records not classified as residential
        #[arg(long)]
        include_non_residential: bool,

        /// Keep records without any land line
        #[arg(long)]
        include_landless: bool,
    },
    /// Rebuild the coordinate index over stored property coordinates
    Index,
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
        "Starting PVMAP Property Ingest (pvmap-ig) v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );

    let cli = Cli::parse();

    let root_folder = config::resolve_root_folder(cli.root_folder.as_deref());
    config::ensure_root_folder(&root_folder)?;

    let db_path = config::database_path(&root_folder);
    info!("Database path: {}", db_path.display());

    let pool = pvmap_common::db::init_database(&db_path).await?;

    match cli.command {
        Command::Load { path } => {
            let loaded = db::load_address_file(&pool, &path).await?;
            info!("loaded {loaded} address records from {}", path.display());
        }
        Command::Index => {
            let indexed = spatial::build_coord_index(&pool).await?;
            info!("coordinate index updated with {indexed} new entries");
        }
        Command::Ingest {
            zip_code,
            workers,
            queue_capacity,
            drop_frontage_parcels,
            include_non_residential,
            include_landless,
        } => {
            let inputs = db::sample_by_zip(&pool, &zip_code).await?;
            if inputs.is_empty() {
                warn!("no stored addresses for zip code {zip_code}; run `load` first");
                return Ok(());
            }

            let worker_pool_size = match workers {
                Some(count) => count,
                None => {
                    settings::get_i64(
                        &pool,
                        "ig_worker_pool_size",
                        DEFAULT_WORKER_POOL_SIZE as i64,
                    )
                    .await? as usize
                }
            };
            let queue_capacity = match queue_capacity {
                Some(capacity) => capacity,
                None => {
                    let multiplier = settings::get_i64(
                        &pool,
                        "ig_queue_multiplier",
                        DEFAULT_QUEUE_MULTIPLIER as i64,
                    )
                    .await? as usize;
                    worker_pool_size * multiplier.max(1)
                }
            };
            let drop_frontage = match drop_frontage_parcels {
                Some(flag) => flag,
                None => settings::get_bool(&pool, "ig_drop_frontage_parcels", true).await?,
            };

            let pipeline_config = PipelineConfig {
                worker_pool_size,
                queue_capacity,
                policy: RetentionPolicy {
                    require_residential: !include_non_residential,
                    require_land: !include_landless,
                    drop_frontage_parcels: drop_frontage,
                },
            };

            let source = Arc::new(AppraiserClient::new());
            let run_report =
                pipeline::run_pipeline(&pool, source, inputs, pipeline_config).await?;

            info!(
                "ingest complete for {zip_code}: {} attempted, {} succeeded, {} failed (ratio {:.3})",
                run_report.attempted,
                run_report.succeeded,
                run_report.failed(),
                run_report.failure_ratio()
            );

            if !run_report.failures.is_empty() {
                let report_path =
                    report::write_failure_report(&root_folder, &zip_code, &run_report)?;
                info!("failure details written to {}", report_path.display());
            }

            let indexed = spatial::build_coord_index(&pool).await?;
            info!("coordinate index updated with {indexed} new entries");
        }
    }

    Ok(())
}
