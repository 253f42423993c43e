//! pvmap-ig library - Property financial ingest
//!
//! Fetches property records from the county appraiser's public service,
//! normalizes the nested payloads into flat row families, and persists them
//! through a single-writer sink fed by a bounded queue. After ingest the
//! coordinate index is (re)built over stored coordinates for the query
//! service's bounding-box lookups.

pub mod address;
pub mod db;
pub mod error;
pub mod normalize;
pub mod pipeline;
pub mod report;
pub mod resolver;
pub mod source;
pub mod spatial;

pub use error::IngestError;
