//! Per-record error taxonomy for the ingest pipeline

use thiserror::Error;

/// Everything that can go wrong while ingesting one record.
///
/// All variants are recoverable at the per-record granularity: the worker
/// converts them into a `Failure` queue item and the run continues. Only
/// store or sink failures abort a run, and those are not represented here.
#[derive(Error, Debug, Clone)]
pub enum IngestError {
    /// Address could not be resolved to a folio (no or ambiguous candidates)
    #[error("resolution failed: {0}")]
    Resolution(String),

    /// Transport error, timeout, or a response with a false completion flag
    #[error("source unavailable: {0}")]
    SourceUnavailable(String),

    /// Payload could not be normalized (malformed date, unusable structure)
    #[error("normalization failed: {0}")]
    Normalization(String),

    /// Record intentionally excluded by retention policy
    #[error("filtered out: {0}")]
    Filtered(String),
}

impl IngestError {
    /// Stable short label for logs and the failure report
    pub fn kind(&self) -> &'static str {
        match self {
            IngestError::Resolution(_) => "resolution",
            IngestError::SourceUnavailable(_) => "source",
            IngestError::Normalization(_) => "normalization",
            IngestError::Filtered(_) => "filtered",
        }
    }
}
