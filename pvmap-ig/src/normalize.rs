//! Record normalization: nested payload to flat row families
//!
//! Assessed values live in Assessment > AssessmentInfos[] per year; land
//! lines in Land > Landlines[] per year and lot; sales in SalesInfos[];
//! structures in Building > BuildingInfos[]. An absent section yields an
//! empty family; a present-but-empty section does too. The only hard
//! failure here is a sale date that does not parse, which poisons the whole
//! record rather than emit a partial sale list.

use crate::error::IngestError;
use crate::source::PropertyPayload;
use chrono::NaiveDate;
use pvmap_common::db::models::{
    AssessmentRow, BuildingRow, LandParcelRow, NormalizedRows, SaleRow,
};
use std::collections::HashSet;

/// Land lines below this area, measured in a foot-based unit, are
/// placeholder or degenerate entries and are dropped.
pub const MIN_FOOT_BASIS_AREA: f64 = 10.0;

/// Record retention policy for one ingest run.
///
/// The frontage flag exists because the two historical ingest behaviors
/// disagreed: one dropped frontage-unit land lines unconditionally, the
/// other kept them. The deployment picks via settings instead of the code
/// picking silently.
#[derive(Debug, Clone)]
pub struct RetentionPolicy {
    /// Keep only records classified as residential
    pub require_residential: bool,
    /// Keep only records that retain at least one land line
    pub require_land: bool,
    /// Drop land lines whose unit denotes a frontage measurement
    pub drop_frontage_parcels: bool,
}

impl Default for RetentionPolicy {
    fn default() -> Self {
        Self {
            require_residential: true,
            require_land: true,
            drop_frontage_parcels: true,
        }
    }
}

/// Whether the payload's classification marks the property residential
pub fn is_residential(payload: &PropertyPayload) -> bool {
    payload
        .property_info
        .as_ref()
        .and_then(|info| info.dor_description.as_deref())
        .map(|description| description.contains("RESIDENTIAL"))
        .unwrap_or(false)
}

/// Normalize one payload into all four row families
pub fn normalize_payload(
    payload: &PropertyPayload,
    policy: &RetentionPolicy,
) -> Result<NormalizedRows, IngestError> {
    Ok(NormalizedRows {
        assessments: assessment_rows(payload),
        land: land_rows(payload, policy),
        sales: sale_rows(payload)?,
        buildings: building_rows(payload),
    })
}

/// One assessment row per roll year
pub fn assessment_rows(payload: &PropertyPayload) -> Vec<AssessmentRow> {
    let Some(assessment) = &payload.assessment else {
        return Vec::new();
    };

    assessment
        .assessment_infos
        .iter()
        .map(|annual| AssessmentRow {
            year: annual.year,
            land_value: annual.land_value,
            building_value: annual.building_only_value,
            extra_feature_value: annual.extra_feature_value,
        })
        .collect()
}

/// One land row per surviving land line
pub fn land_rows(payload: &PropertyPayload, policy: &RetentionPolicy) -> Vec<LandParcelRow> {
    let Some(land) = &payload.land else {
        return Vec::new();
    };

    land.landlines
        .iter()
        .filter(|line| !(policy.drop_frontage_parcels && line.unit_type.contains("Front")))
        .filter(|line| !(line.unit_type.contains("Ft.") && line.units < MIN_FOOT_BASIS_AREA))
        .map(|line| LandParcelRow {
            year: line.roll_year,
            area: line.units,
            area_unit: line.unit_type.clone(),
            adjusted_unit_price: line.adjusted_unit_price,
        })
        .collect()
}

/// One sale row per sale event, dates reformatted to ISO.
///
/// A date that fails to parse fails the whole record; the alternative would
/// be a silently truncated sale history.
pub fn sale_rows(payload: &PropertyPayload) -> Result<Vec<SaleRow>, IngestError> {
    let Some(sales) = &payload.sales_infos else {
        return Ok(Vec::new());
    };

    sales
        .iter()
        .map(|sale| {
            let date = NaiveDate::parse_from_str(&sale.date_of_sale, "%m/%d/%Y")
                .map_err(|_| {
                    IngestError::Normalization(format!(
                        "unparseable sale date '{}'",
                        sale.date_of_sale
                    ))
                })?
                .format("%Y-%m-%d")
                .to_string();

            Ok(SaleRow {
                price: sale.sale_price,
                date,
            })
        })
        .collect()
}

/// One building row per distinct building number, first occurrence wins
pub fn building_rows(payload: &PropertyPayload) -> Vec<BuildingRow> {
    let Some(building) = &payload.building else {
        return Vec::new();
    };

    let mut seen_numbers = HashSet::new();

    building
        .building_infos
        .iter()
        .filter(|structure| seen_numbers.insert(structure.building_no))
        .map(|structure| BuildingRow {
            building_number: structure.building_no,
            year_constructed: structure.effective,
            building_area: structure.effective_area,
        })
        .collect()
}
