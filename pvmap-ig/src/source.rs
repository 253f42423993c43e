//! Record source protocol
//!
//! Typed schema of the county appraiser's public service responses plus the
//! reqwest client that speaks the protocol. The `RecordSource` trait is the
//! seam the pipeline drives, so tests can substitute a scripted source.
//!
//! Optionality is explicit in the schema: a payload without an `Assessment`
//! section deserializes to `None`, which is a different state from a section
//! whose list is empty.

use crate::error::IngestError;
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;

/// Appraiser public service proxy endpoint
const DEFAULT_BASE_URL: &str =
    "https://miamidade.gov/Apps/PA/PApublicServiceProxy/PaServicesProxy.ashx";

/// Transport-level request timeout; there is no per-record timeout beyond it
const REQUEST_TIMEOUT: Duration = Duration::from_secs(20);

/// Response to an address search: zero or more candidate records
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct AddressSearchResponse {
    pub completed: bool,
    #[serde(default)]
    pub minimum_property_infos: Vec<CandidateInfo>,
}

/// One candidate from an address search
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CandidateInfo {
    pub site_address: String,
    /// The folio key, dash-separated
    pub strap: String,
}

/// Full property record payload for one folio
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PropertyPayload {
    #[serde(default)]
    pub completed: bool,
    pub property_info: Option<PropertyInfo>,
    pub assessment: Option<AssessmentSection>,
    pub land: Option<LandSection>,
    pub building: Option<BuildingSection>,
    pub sales_infos: Option<Vec<SaleInfo>>,
}

/// General property classification data
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PropertyInfo {
    /// Department of Revenue land-use description, e.g. "0101 RESIDENTIAL - SINGLE FAMILY"
    #[serde(rename = "DORDescription")]
    pub dor_description: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct AssessmentSection {
    #[serde(default)]
    pub assessment_infos: Vec<AssessmentInfo>,
}

/// Assessed values for one roll year
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct AssessmentInfo {
    pub year: i64,
    pub land_value: f64,
    pub building_only_value: f64,
    pub extra_feature_value: f64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct LandSection {
    #[serde(default)]
    pub landlines: Vec<Landline>,
}

/// One land line: a lot's area and unit valuation for one roll year
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Landline {
    pub roll_year: i64,
    pub units: f64,
    pub unit_type: String,
    pub adjusted_unit_price: f64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct BuildingSection {
    #[serde(default)]
    pub building_infos: Vec<BuildingInfo>,
}

/// One structure on the property
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct BuildingInfo {
    pub building_no: i64,
    pub effective: i64,
    pub effective_area: f64,
}

/// One recorded sale
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct SaleInfo {
    pub date_of_sale: String,
    pub sale_price: f64,
}

/// The external record source the pipeline fetches from.
///
/// Implementations must already have applied the protocol's completion-flag
/// rule: a response that arrives here is a completed one.
#[async_trait]
pub trait RecordSource: Send + Sync {
    /// Search candidate records by normalized site address
    async fn search_by_address(
        &self,
        normalized_address: &str,
    ) -> Result<AddressSearchResponse, IngestError>;

    /// Fetch the full record payload for one folio
    async fn fetch_by_folio(&self, folio: &str) -> Result<PropertyPayload, IngestError>;
}

/// HTTP client for the appraiser's public service proxy
pub struct AppraiserClient {
    http: Client,
    base_url: String,
}

impl AppraiserClient {
    pub fn new() -> Self {
        Self::with_base_url(DEFAULT_BASE_URL)
    }

    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            http: Client::builder()
                .timeout(REQUEST_TIMEOUT)
                .build()
                .expect("Failed to create HTTP client"),
            base_url: base_url.into(),
        }
    }
}

impl Default for AppraiserClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RecordSource for AppraiserClient {
    async fn search_by_address(
        &self,
        normalized_address: &str,
    ) -> Result<AddressSearchResponse, IngestError> {
        let response = self
            .http
            .get(&self.base_url)
            .query(&[
                ("Operation", "GetAddress"),
                ("clientAppName", "PropertySearch"),
                ("myAddress", normalized_address),
                ("myUnit", ""),
                ("from", "0"),
                ("to", "1"),
                ("endPoint", ""),
            ])
            .send()
            .await
            .map_err(|e| IngestError::SourceUnavailable(format!("address search failed: {e}")))?;

        let search: AddressSearchResponse = response.json().await.map_err(|e| {
            IngestError::SourceUnavailable(format!("malformed address search response: {e}"))
        })?;

        if !search.completed {
            return Err(IngestError::SourceUnavailable(format!(
                "source reported incomplete address search for '{normalized_address}'"
            )));
        }

        Ok(search)
    }

    async fn fetch_by_folio(&self, folio: &str) -> Result<PropertyPayload, IngestError> {
        // The search endpoint hands folios out dash-separated; the folio
        // lookup wants them bare
        let folio_number = folio.replace('-', "");

        let response = self
            .http
            .get(&self.base_url)
            .query(&[
                ("Operation", "GetPropertySearchByFolio"),
                ("clientAppName", "PropertySearch"),
                ("folioNumber", folio_number.as_str()),
                ("endPoint", ""),
            ])
            .send()
            .await
            .map_err(|e| IngestError::SourceUnavailable(format!("folio fetch failed: {e}")))?;

        let payload: PropertyPayload = response.json().await.map_err(|e| {
            IngestError::SourceUnavailable(format!("malformed folio response: {e}"))
        })?;

        if !payload.completed {
            return Err(IngestError::SourceUnavailable(format!(
                "source reported incomplete payload for folio {folio}"
            )));
        }

        Ok(payload)
    }
}
