//! Fetch-transform-load pipeline
//!
//! Many fetch workers, one bounded queue, one persistence sink. Workers
//! suspend only on network calls and on enqueueing into a full queue; the
//! sink suspends only on an empty queue. The store's write handle belongs to
//! the sink alone for the lifetime of a run.
//!
//! Shutdown is signaled by channel closure: every worker owns a sender
//! clone, so once the pool has drained the receiver sees the queue end and
//! the sink exits after consuming whatever is still buffered. Nothing is
//! polled and nothing is dropped.

use crate::db::insert_rows;
use crate::error::IngestError;
use crate::normalize::{is_residential, normalize_payload, RetentionPolicy};
use crate::report::{FailureEntry, RunReport};
use crate::resolver::resolve_folio;
use crate::source::RecordSource;
use anyhow::{Context, Result};
use pvmap_common::db::models::{InputRecord, NormalizedRows};
use sqlx::SqlitePool;
use std::sync::Arc;
use tokio::sync::{mpsc, Semaphore};
use tokio::task::JoinSet;
use tracing::{error, info, warn};

/// Default number of concurrently in-flight records
pub const DEFAULT_WORKER_POOL_SIZE: usize = 50;

/// Default queue capacity as a multiple of the worker pool size
pub const DEFAULT_QUEUE_MULTIPLIER: usize = 2;

/// Pipeline run configuration
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Upper bound on concurrently in-flight records, independent of batch size
    pub worker_pool_size: usize,
    /// Ingestion queue capacity; the system's only backpressure mechanism
    pub queue_capacity: usize,
    pub policy: RetentionPolicy,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            worker_pool_size: DEFAULT_WORKER_POOL_SIZE,
            queue_capacity: DEFAULT_WORKER_POOL_SIZE * DEFAULT_QUEUE_MULTIPLIER,
            policy: RetentionPolicy::default(),
        }
    }
}

/// Handoff unit between fetch workers and the sink.
///
/// Every consumed input record produces exactly one item, success or not;
/// the sink's progress counter depends on it.
#[derive(Debug)]
pub enum QueueItem {
    /// Normalized rows ready to commit for one record
    Batch {
        property_id: i64,
        rows: NormalizedRows,
    },
    /// The record did not make it; carries the reason for the report
    Failure {
        property_id: i64,
        input: String,
        reason: IngestError,
    },
}

/// Run the full pipeline over a batch of input records.
///
/// Blocks until every submitted record has produced its queue item and the
/// sink has drained the queue. Per-record errors become report entries; an
/// error returned here means the run itself failed (store or sink fault)
/// and only rows committed before the fault remain valid.
pub async fn run_pipeline<S>(
    pool: &SqlitePool,
    source: Arc<S>,
    inputs: Vec<InputRecord>,
    config: PipelineConfig,
) -> Result<RunReport>
where
    S: RecordSource + 'static,
{
    let attempted = inputs.len();
    info!(
        "starting pipeline: {attempted} records, {} workers, queue capacity {}",
        config.worker_pool_size, config.queue_capacity
    );

    let (tx, rx) = mpsc::channel::<QueueItem>(config.queue_capacity.max(1));
    let sink = tokio::spawn(run_sink(pool.clone(), rx, attempted));

    let limiter = Arc::new(Semaphore::new(config.worker_pool_size.max(1)));
    let mut workers = JoinSet::new();

    for input in inputs {
        let limiter = limiter.clone();
        let source = source.clone();
        let tx = tx.clone();
        let policy = config.policy.clone();

        workers.spawn(async move {
            let _permit = limiter
                .acquire_owned()
                .await
                .expect("worker limiter closed");

            let item = process_record(source.as_ref(), &input, &policy).await;
            if tx.send(item).await.is_err() {
                // Only happens when the sink died; the run is failing anyway
                warn!(
                    "ingestion queue closed before record {} could be enqueued",
                    input.property_id
                );
            }
        });
    }

    // The spawned workers hold the remaining senders; dropping ours means
    // the channel closes exactly when the pool has drained
    drop(tx);

    while let Some(joined) = workers.join_next().await {
        if let Err(e) = joined {
            error!("fetch worker panicked: {e}");
        }
    }

    sink.await.context("persistence sink task crashed")?
}

/// Drive one record through resolve, fetch, filter, and normalize.
///
/// Total by construction: every failure at any stage is caught and folded
/// into the `Failure` variant, so one bad record can never take down the
/// records in flight beside it.
async fn process_record<S: RecordSource + ?Sized>(
    source: &S,
    input: &InputRecord,
    policy: &RetentionPolicy,
) -> QueueItem {
    match ingest_record(source, input, policy).await {
        Ok(rows) => QueueItem::Batch {
            property_id: input.property_id,
            rows,
        },
        Err(reason) => QueueItem::Failure {
            property_id: input.property_id,
            input: input.address.clone(),
            reason,
        },
    }
}

async fn ingest_record<S: RecordSource + ?Sized>(
    source: &S,
    input: &InputRecord,
    policy: &RetentionPolicy,
) -> Result<NormalizedRows, IngestError> {
    let folio = match &input.folio {
        Some(folio) => folio.clone(),
        None => resolve_folio(source, &input.address).await?,
    };

    let payload = source.fetch_by_folio(&folio).await?;

    if policy.require_residential && !is_residential(&payload) {
        return Err(IngestError::Filtered("not residential".to_string()));
    }

    let rows = normalize_payload(&payload, policy)?;

    if policy.require_land && rows.land.is_empty() {
        return Err(IngestError::Filtered("no land data".to_string()));
    }

    Ok(rows)
}

/// The persistence sink: sole writer to the store for the run.
///
/// Batches commit atomically per record; failures only advance the progress
/// counter and are collected for the end-of-run report. A store error here
/// is fatal to the run but leaves previously committed records intact.
async fn run_sink(
    pool: SqlitePool,
    mut rx: mpsc::Receiver<QueueItem>,
    attempted: usize,
) -> Result<RunReport> {
    let mut processed = 0usize;
    let mut succeeded = 0usize;
    let mut failures = Vec::new();

    while let Some(item) = rx.recv().await {
        match item {
            QueueItem::Batch { property_id, rows } => {
                insert_rows(&pool, property_id, &rows)
                    .await
                    .with_context(|| format!("failed to commit rows for property {property_id}"))?;
                succeeded += 1;
            }
            QueueItem::Failure {
                property_id,
                input,
                reason,
            } => {
                match &reason {
                    IngestError::Filtered(message) => {
                        info!("property {property_id} filtered out: {message}")
                    }
                    other => warn!(
                        "property {property_id} failed ({}): {other}",
                        other.kind()
                    ),
                }
                failures.push(FailureEntry {
                    input,
                    kind: reason.kind(),
                    reason: reason.to_string(),
                });
            }
        }

        processed += 1;
        info!("progress: {processed}/{attempted}");
    }

    Ok(RunReport {
        attempted,
        succeeded,
        failures,
    })
}
