//! Integration tests for the fetch-transform-load pipeline
//!
//! A scripted record source stands in for the appraiser service; the store
//! is a real SQLite file in a temp directory, so these tests exercise the
//! worker pool, the bounded queue, the single-writer sink, and the committed
//! schema together.

use async_trait::async_trait;
use pvmap_common::db::models::InputRecord;
use pvmap_ig::error::IngestError;
use pvmap_ig::normalize::RetentionPolicy;
use pvmap_ig::pipeline::{run_pipeline, PipelineConfig};
use pvmap_ig::source::{
    AddressSearchResponse, AssessmentInfo, AssessmentSection, BuildingInfo, BuildingSection,
    CandidateInfo, LandSection, Landline, PropertyInfo, PropertyPayload, RecordSource, SaleInfo,
};
use sqlx::SqlitePool;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// Scripted stand-in for the appraiser service
#[derive(Default)]
struct MockSource {
    /// Payloads by folio
    payloads: HashMap<String, PropertyPayload>,
    /// Candidates returned for every address search
    candidates: Vec<CandidateInfo>,
    /// Folios whose fetch fails with a transport error
    unavailable_folios: HashSet<String>,
}

#[async_trait]
impl RecordSource for MockSource {
    async fn search_by_address(
        &self,
        _normalized_address: &str,
    ) -> Result<AddressSearchResponse, IngestError> {
        Ok(AddressSearchResponse {
            completed: true,
            minimum_property_infos: self.candidates.clone(),
        })
    }

    async fn fetch_by_folio(&self, folio: &str) -> Result<PropertyPayload, IngestError> {
        if self.unavailable_folios.contains(folio) {
            return Err(IngestError::SourceUnavailable(format!(
                "scripted outage for folio {folio}"
            )));
        }
        self.payloads
            .get(folio)
            .cloned()
            .ok_or_else(|| IngestError::SourceUnavailable(format!("unknown folio {folio}")))
    }
}

/// A complete residential payload with rows in every family
fn residential_payload() -> PropertyPayload {
    PropertyPayload {
        completed: true,
        property_info: Some(PropertyInfo {
            dor_description: Some("0101 RESIDENTIAL - SINGLE FAMILY".to_string()),
        }),
        assessment: Some(AssessmentSection {
            assessment_infos: vec![
                AssessmentInfo {
                    year: 2019,
                    land_value: 120_000.0,
                    building_only_value: 210_000.0,
                    extra_feature_value: 4_000.0,
                },
                AssessmentInfo {
                    year: 2020,
                    land_value: 125_000.0,
                    building_only_value: 215_000.0,
                    extra_feature_value: 4_100.0,
                },
            ],
        }),
        land: Some(LandSection {
            landlines: vec![Landline {
                roll_year: 2020,
                units: 7_500.0,
                unit_type: "Square Ft.".to_string(),
                adjusted_unit_price: 31.4,
            }],
        }),
        building: Some(BuildingSection {
            building_infos: vec![BuildingInfo {
                building_no: 1,
                effective: 1987,
                effective_area: 2_300.0,
            }],
        }),
        sales_infos: Some(vec![SaleInfo {
            date_of_sale: "07/04/2015".to_string(),
            sale_price: 350_000.0,
        }]),
    }
}

async fn setup_db() -> (tempfile::TempDir, SqlitePool) {
    let dir = tempfile::tempdir().expect("create temp dir");
    let pool = pvmap_common::db::init_database(&dir.path().join("pvmap.db"))
        .await
        .expect("init database");
    (dir, pool)
}

/// Insert a property row with a known folio, returning the input record
async fn seed_property(pool: &SqlitePool, n: usize, folio: Option<&str>) -> InputRecord {
    let address = format!("{n} TEST ST");
    let property_id =
        pvmap_ig::db::insert_property(pool, &address, None, None, "33132", None, None)
            .await
            .expect("insert property");
    if let Some(folio) = folio {
        sqlx::query("UPDATE properties SET folio = ? WHERE id = ?")
            .bind(folio)
            .bind(property_id)
            .execute(pool)
            .await
            .expect("set folio");
    }
    InputRecord {
        property_id,
        address,
        folio: folio.map(str::to_string),
    }
}

#[tokio::test]
async fn run_of_fifty_with_ten_resolution_failures() {
    let (_dir, pool) = setup_db().await;

    let mut source = MockSource::default();
    let mut inputs = Vec::new();

    // 40 records with known folios and payloads
    for n in 0..40 {
        let folio = format!("01-0000-000-{n:04}");
        source.payloads.insert(folio.clone(), residential_payload());
        inputs.push(seed_property(&pool, n, Some(&folio)).await);
    }
    // 10 records that must go through resolution against an empty candidate list
    for n in 40..50 {
        inputs.push(seed_property(&pool, n, None).await);
    }

    let report = run_pipeline(&pool, Arc::new(source), inputs, PipelineConfig::default())
        .await
        .expect("pipeline run");

    // Successes and failures sum to the batch size, exactly once each
    assert_eq!(report.attempted, 50);
    assert_eq!(report.succeeded, 40);
    assert_eq!(report.failed(), 10);
    assert!(report.failures.iter().all(|f| f.kind == "resolution"));

    // The store holds exactly 40 records' worth of rows
    let owners: i64 =
        sqlx::query_scalar("SELECT COUNT(DISTINCT property_id) FROM assessments")
            .fetch_one(&pool)
            .await
            .unwrap();
    assert_eq!(owners, 40);

    let assessment_rows: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM assessments")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(assessment_rows, 40 * 2);

    let sales_rows: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM sales")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(sales_rows, 40);
}

#[tokio::test]
async fn referential_completeness_of_committed_rows() {
    let (_dir, pool) = setup_db().await;

    let mut source = MockSource::default();
    let mut inputs = Vec::new();
    for n in 0..8 {
        let folio = format!("02-0000-000-{n:04}");
        source.payloads.insert(folio.clone(), residential_payload());
        inputs.push(seed_property(&pool, n, Some(&folio)).await);
    }

    run_pipeline(&pool, Arc::new(source), inputs, PipelineConfig::default())
        .await
        .expect("pipeline run");

    for table in ["assessments", "land_parcels", "sales", "buildings"] {
        let orphans: i64 = sqlx::query_scalar(&format!(
            "SELECT COUNT(*) FROM {table} t
             LEFT JOIN properties p ON t.property_id = p.id
             WHERE p.id IS NULL"
        ))
        .fetch_one(&pool)
        .await
        .unwrap();
        assert_eq!(orphans, 0, "orphaned rows in {table}");
    }
}

#[tokio::test]
async fn one_bad_record_does_not_abort_the_others() {
    let (_dir, pool) = setup_db().await;

    let mut source = MockSource::default();
    let mut inputs = Vec::new();

    // Two good records
    for n in 0..2 {
        let folio = format!("03-0000-000-{n:04}");
        source.payloads.insert(folio.clone(), residential_payload());
        inputs.push(seed_property(&pool, n, Some(&folio)).await);
    }

    // Scripted transport outage
    source.unavailable_folios.insert("03-9999-000-0001".to_string());
    inputs.push(seed_property(&pool, 90, Some("03-9999-000-0001")).await);

    // Non-residential classification
    let mut commercial = residential_payload();
    commercial.property_info = Some(PropertyInfo {
        dor_description: Some("1081 VACANT LAND - COMMERCIAL".to_string()),
    });
    source.payloads.insert("03-9999-000-0002".to_string(), commercial);
    inputs.push(seed_property(&pool, 91, Some("03-9999-000-0002")).await);

    // Malformed sale date
    let mut bad_date = residential_payload();
    bad_date.sales_infos = Some(vec![SaleInfo {
        date_of_sale: "99/99/9999".to_string(),
        sale_price: 1.0,
    }]);
    source.payloads.insert("03-9999-000-0003".to_string(), bad_date);
    inputs.push(seed_property(&pool, 92, Some("03-9999-000-0003")).await);

    let report = run_pipeline(&pool, Arc::new(source), inputs, PipelineConfig::default())
        .await
        .expect("pipeline run");

    assert_eq!(report.attempted, 5);
    assert_eq!(report.succeeded, 2);
    assert_eq!(report.failed(), 3);

    let kinds: HashSet<&str> = report.failures.iter().map(|f| f.kind).collect();
    assert_eq!(
        kinds,
        HashSet::from(["source", "filtered", "normalization"])
    );
}

#[tokio::test]
async fn landless_records_are_filtered_when_land_is_mandatory() {
    let (_dir, pool) = setup_db().await;

    let mut source = MockSource::default();
    let mut landless = residential_payload();
    landless.land = None;
    source.payloads.insert("04-0000-000-0000".to_string(), landless);
    let inputs = vec![seed_property(&pool, 0, Some("04-0000-000-0000")).await];

    let report = run_pipeline(
        &pool,
        Arc::new(source),
        inputs,
        PipelineConfig::default(),
    )
    .await
    .expect("pipeline run");

    assert_eq!(report.succeeded, 0);
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].kind, "filtered");

    // Nothing was committed for the filtered record
    let rows: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM assessments")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(rows, 0);
}

#[tokio::test]
async fn landless_records_survive_when_policy_allows() {
    let (_dir, pool) = setup_db().await;

    let mut source = MockSource::default();
    let mut landless = residential_payload();
    landless.land = None;
    source.payloads.insert("05-0000-000-0000".to_string(), landless);
    let inputs = vec![seed_property(&pool, 0, Some("05-0000-000-0000")).await];

    let config = PipelineConfig {
        policy: RetentionPolicy {
            require_land: false,
            ..RetentionPolicy::default()
        },
        ..PipelineConfig::default()
    };

    let report = run_pipeline(&pool, Arc::new(source), inputs, config)
        .await
        .expect("pipeline run");
    assert_eq!(report.succeeded, 1);
}

#[tokio::test]
async fn tight_queue_capacity_still_processes_every_record() {
    let (_dir, pool) = setup_db().await;

    let mut source = MockSource::default();
    let mut inputs = Vec::new();
    for n in 0..20 {
        let folio = format!("06-0000-000-{n:04}");
        source.payloads.insert(folio.clone(), residential_payload());
        inputs.push(seed_property(&pool, n, Some(&folio)).await);
    }

    // More workers than queue slots: producers must block on the full
    // queue rather than lose items
    let config = PipelineConfig {
        worker_pool_size: 8,
        queue_capacity: 2,
        ..PipelineConfig::default()
    };

    let report = run_pipeline(&pool, Arc::new(source), inputs, config)
        .await
        .expect("pipeline run");

    assert_eq!(report.attempted, 20);
    assert_eq!(report.succeeded, 20);

    let owners: i64 =
        sqlx::query_scalar("SELECT COUNT(DISTINCT property_id) FROM assessments")
            .fetch_one(&pool)
            .await
            .unwrap();
    assert_eq!(owners, 20);
}

#[tokio::test]
async fn resolution_path_feeds_the_fetch() {
    let (_dir, pool) = setup_db().await;

    let mut source = MockSource::default();
    source.candidates = vec![
        CandidateInfo {
            site_address: "7 TEST ST".to_string(),
            strap: "07-0000-000-0000".to_string(),
        },
        CandidateInfo {
            site_address: "8 TEST ST".to_string(),
            strap: "07-1111-111-1111".to_string(),
        },
    ];
    source
        .payloads
        .insert("07-0000-000-0000".to_string(), residential_payload());

    // No folio stored: the worker must resolve "7 TEST ST" first
    let inputs = vec![seed_property(&pool, 7, None).await];

    let report = run_pipeline(&pool, Arc::new(source), inputs, PipelineConfig::default())
        .await
        .expect("pipeline run");
    assert_eq!(report.succeeded, 1);
    assert_eq!(report.failed(), 0);
}
