//! Identifier resolution: free-text address to folio
//!
//! The address search returns candidates whose site addresses may differ
//! from the input in suffix or direction spelling. House numbers survive
//! normalization on both sides, so the first candidate whose leading
//! house-number token matches the input's is taken as the match.

use crate::address::{leading_house_number, normalize_address};
use crate::error::IngestError;
use crate::source::RecordSource;

/// Resolve a free-text address to the source's canonical folio key
pub async fn resolve_folio<S: RecordSource + ?Sized>(
    source: &S,
    address: &str,
) -> Result<String, IngestError> {
    let given_number = leading_house_number(address).ok_or_else(|| {
        IngestError::Resolution(format!("address '{address}' has no leading house number"))
    })?;

    let normalized = normalize_address(address);
    let search = source.search_by_address(&normalized).await?;

    search
        .minimum_property_infos
        .iter()
        .find(|candidate| leading_house_number(&candidate.site_address) == Some(given_number))
        .map(|candidate| candidate.strap.clone())
        .ok_or_else(|| {
            IngestError::Resolution(format!(
                "no candidate matched house number {given_number} for '{address}'"
            ))
        })
}
