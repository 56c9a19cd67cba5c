//! Integration tests for the preparation pipeline.
//!
//! These tests run the full pipeline over a small Ames-style fixture.

use homeval_processing::{
    DatasetAnalysis, FeatureSchema, PipelineConfig, PreparationPipeline, PreparedData,
    ProcessingError, RawRecord, SchemaAligner, io,
};
use polars::prelude::*;
use pretty_assertions::assert_eq;
use std::path::PathBuf;

// ============================================================================
// Helper Functions
// ============================================================================

fn fixtures_path() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures")
}

fn load_fixture(filename: &str) -> DataFrame {
    io::load_csv(&fixtures_path().join(filename)).expect("Failed to read fixture")
}

fn pipeline() -> PreparationPipeline {
    PreparationPipeline::builder()
        .config(PipelineConfig::default())
        .build()
        .unwrap()
}

fn prepared() -> (PreparationPipeline, PreparedData) {
    let pipeline = pipeline();
    let prepared = pipeline
        .fit_transform(load_fixture("ames_sample.csv"))
        .unwrap();
    (pipeline, prepared)
}

fn single(df: &DataFrame, column: &str) -> f64 {
    df.column(column)
        .unwrap()
        .as_materialized_series()
        .f64()
        .unwrap()
        .get(0)
        .unwrap()
}

// ============================================================================
// Training Preparation
// ============================================================================

#[test]
fn test_fixture_prepares_without_nulls() {
    let (_, prepared) = prepared();

    assert!(prepared.data.height() > 30);
    for column in prepared.data.get_columns() {
        assert_eq!(column.null_count(), 0, "nulls left in {}", column.name());
    }
    assert!(prepared.summary.imputed_cells > 0);
}

#[test]
fn test_outliers_removed_from_training_rows() {
    let (_, prepared) = prepared();

    assert!(prepared.summary.outliers_removed >= 1);
    let prices = prepared.data.column("SalePrice").unwrap().f64().unwrap();
    assert!(prices.into_iter().flatten().all(|p| p < 755_000.0));
}

#[test]
fn test_neighborhood_stats_cover_every_prepared_row() {
    let (_, prepared) = prepared();
    let neighborhoods = &prepared.reference.neighborhoods;

    let rows = prepared.data.height() as f64;
    assert_eq!(neighborhoods.global.size, rows);
    let grouped: f64 = neighborhoods.groups.values().map(|g| g.size).sum();
    assert_eq!(grouped, rows);
}

#[test]
fn test_schema_excludes_target_and_id() {
    let (_, prepared) = prepared();
    assert!(prepared.schema.position("SalePrice").is_none());
    assert!(prepared.schema.position("Id").is_none());
    assert!(prepared.schema.position("TotalSF").is_some());
    assert!(prepared.schema.position("Neighborhood_CollgCr").is_some());
}

#[test]
fn test_schema_regenerates_bit_for_bit_from_written_csv() {
    let (_, mut prepared) = prepared();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("processed.csv");

    io::write_csv(&mut prepared.data, &path).unwrap();
    let first = FeatureSchema::from_processed_csv(&path, "SalePrice", "Id").unwrap();
    let second = FeatureSchema::from_processed_csv(&path, "SalePrice", "Id").unwrap();

    assert_eq!(first, prepared.schema);
    assert_eq!(
        serde_json::to_string(&first).unwrap(),
        serde_json::to_string(&second).unwrap()
    );
}

#[test]
fn test_preparation_is_deterministic() {
    let a = pipeline().fit_transform(load_fixture("ames_sample.csv")).unwrap();
    let b = pipeline().fit_transform(load_fixture("ames_sample.csv")).unwrap();

    assert_eq!(a.schema, b.schema);
    assert_eq!(a.reference, b.reference);
    assert!(a.data.equals(&b.data));
}

// ============================================================================
// Inference Transform
// ============================================================================

#[test]
fn test_unlabeled_rows_match_schema_width() {
    let (pipeline, prepared) = prepared();
    let rows = load_fixture("ames_unlabeled.csv");

    let features = pipeline
        .transform(&rows, &prepared.reference, &prepared.schema)
        .unwrap();

    assert_eq!(features.height(), 4);
    assert_eq!(features.width(), prepared.schema.len());
    SchemaAligner::check(&features, &prepared.schema).unwrap();
}

#[test]
fn test_unseen_category_has_no_indicator_set() {
    let (pipeline, prepared) = prepared();
    let record = RawRecord::new()
        .with("OverallQual", 6)
        .with("GrLivArea", 1500.0)
        .with("YearBuilt", 1990)
        .with("YrSold", 2008)
        .with("Neighborhood", "Blueste")
        .with("KitchenQual", "Superb");

    let features = pipeline
        .transform(
            &record.to_dataframe().unwrap(),
            &prepared.reference,
            &prepared.schema,
        )
        .unwrap();

    for name in prepared.schema.columns() {
        if name.starts_with("Neighborhood_") {
            assert_eq!(single(&features, name), 0.0, "{name}");
        }
    }
    assert_eq!(single(&features, "KitchenQual"), 0.0);
}

#[test]
fn test_minimal_form_record_uses_training_defaults() {
    let (pipeline, prepared) = prepared();
    let record = RawRecord::new()
        .with("OverallQual", 7)
        .with("GrLivArea", 1710.0)
        .with("GarageCars", 2)
        .with("TotalBsmtSF", 856.0)
        .with("FullBath", 2)
        .with("YearBuilt", 2003)
        .with("Neighborhood", "CollgCr")
        .with("HouseStyle", "2Story");

    let features = pipeline
        .transform(
            &record.to_dataframe().unwrap(),
            &prepared.reference,
            &prepared.schema,
        )
        .unwrap();

    let yr_sold_median = prepared.reference.imputation.numeric["YrSold"];
    assert_eq!(single(&features, "HouseAge"), yr_sold_median - 2003.0);
    assert_eq!(single(&features, "TotalBathrooms"), 2.0);
    assert_eq!(single(&features, "Neighborhood_CollgCr"), 1.0);
    for name in prepared.schema.columns() {
        if name.starts_with("HouseStyle_") {
            let expected = if name == "HouseStyle_2Story" { 1.0 } else { 0.0 };
            assert_eq!(single(&features, name), expected, "{name}");
        }
    }
    assert_eq!(
        single(&features, "NeighborhoodMedianPrice"),
        prepared.reference.neighborhoods.lookup(Some("CollgCr")).median_price
    );
    for value in SchemaAligner::to_rows(&features, &prepared.schema).unwrap()[0].iter() {
        assert!(value.is_finite());
    }
}

#[test]
fn test_nan_field_takes_training_default() {
    let (pipeline, prepared) = prepared();
    let record = RawRecord::new()
        .with("OverallQual", 6)
        .with("GrLivArea", f64::NAN)
        .with("YearBuilt", 1990);

    let features = pipeline
        .transform(
            &record.to_dataframe().unwrap(),
            &prepared.reference,
            &prepared.schema,
        )
        .unwrap();

    let area = prepared.reference.imputation.numeric["GrLivArea"];
    assert_eq!(single(&features, "GrLivArea"), area);
    assert_eq!(single(&features, "Qual_SF_Interaction"), 6.0 * area);
}

#[test]
fn test_record_without_required_column_and_no_default_fails() {
    let (pipeline, mut prepared) = prepared();
    prepared.reference.imputation.numeric.remove("YrSold");

    let record = RawRecord::new()
        .with("OverallQual", 7)
        .with("GrLivArea", 1710.0)
        .with("YearBuilt", 2003);

    let err = pipeline
        .transform(
            &record.to_dataframe().unwrap(),
            &prepared.reference,
            &prepared.schema,
        )
        .unwrap_err();
    assert!(matches!(
        err,
        ProcessingError::FeatureComputation { ref column, .. } if column == "YrSold"
    ));
}

// ============================================================================
// Analysis
// ============================================================================

#[test]
fn test_analysis_of_fixture() {
    let df = load_fixture("ames_sample.csv");
    let analysis = DatasetAnalysis::analyze(&df, "SalePrice").unwrap();

    assert_eq!(analysis.rows, 48);
    let frontage = analysis
        .column_analyses
        .iter()
        .find(|c| c.name == "LotFrontage")
        .unwrap();
    assert!(frontage.null_count > 0);

    let strongest = analysis.strongest_correlations(5);
    assert!(strongest.iter().any(|c| c.name == "OverallQual" || c.name == "GrLivArea"));
    assert!(analysis.render_report().contains("SalePrice"));
}
