//! Row models for normalized property data
//!
//! One struct per row family. The owning property id is not a field of the
//! row itself; it is appended by the persistence sink at insert time so a
//! normalized set can be built without knowing where it will be stored.

/// One input record for a pipeline run: a stored address with its row id and,
/// when already known, the source system's folio key. Immutable once read.
#[derive(Debug, Clone)]
pub struct InputRecord {
    pub property_id: i64,
    pub address: String,
    pub folio: Option<String>,
}

/// One assessed-value row, one per roll year
#[derive(Debug, Clone, PartialEq)]
pub struct AssessmentRow {
    pub year: i64,
    pub land_value: f64,
    pub building_value: f64,
    pub extra_feature_value: f64,
}

/// One land line per roll year and parcel. Properties spanning multiple
/// joined lots keep one row per lot.
#[derive(Debug, Clone, PartialEq)]
pub struct LandParcelRow {
    pub year: i64,
    pub area: f64,
    pub area_unit: String,
    pub adjusted_unit_price: f64,
}

/// One recorded sale event
#[derive(Debug, Clone, PartialEq)]
pub struct SaleRow {
    pub price: f64,
    /// ISO `YYYY-MM-DD`, reformatted from the source's `MM/DD/YYYY`
    pub date: String,
}

/// One structure on the property, keyed by building number
#[derive(Debug, Clone, PartialEq)]
pub struct BuildingRow {
    pub building_number: i64,
    pub year_constructed: i64,
    pub building_area: f64,
}

/// All row families produced by normalizing one raw payload
#[derive(Debug, Clone, Default)]
pub struct NormalizedRows {
    pub assessments: Vec<AssessmentRow>,
    pub land: Vec<LandParcelRow>,
    pub sales: Vec<SaleRow>,
    pub buildings: Vec<BuildingRow>,
}

impl NormalizedRows {
    /// Total number of rows across all families
    pub fn row_count(&self) -> usize {
        self.assessments.len() + self.land.len() + self.sales.len() + self.buildings.len()
    }
}
