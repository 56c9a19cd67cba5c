//! End-to-end tests: prepare the fixture, train, persist, predict, evaluate.

use homeval_learning::{
    EvaluationReport, LearningError, ModelArtifact, PredictionContext, Predictor, Trainer,
    TrainingConfig, TrainingOutcome, evaluation,
};
use homeval_processing::{PreparationPipeline, PreparedData, RawRecord, io};
use polars::prelude::*;
use pretty_assertions::assert_eq;
use std::path::PathBuf;

// ============================================================================
// Helpers
// ============================================================================

fn fixture(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("../homeval-processing/tests/fixtures")
        .join(name)
}

fn prepared() -> PreparedData {
    let df = io::load_csv(&fixture("ames_sample.csv")).unwrap();
    PreparationPipeline::builder()
        .build()
        .unwrap()
        .fit_transform(df)
        .unwrap()
}

fn trained(prepared: &PreparedData) -> TrainingOutcome {
    let config = TrainingConfig::builder().n_estimators(25).build().unwrap();
    Trainer::new(config)
        .unwrap()
        .train(&prepared.data, &prepared.schema, &prepared.reference)
        .unwrap()
}

// ============================================================================
// Training and persistence
// ============================================================================

#[test]
fn test_training_on_fixture() {
    let prepared = prepared();
    let outcome = trained(&prepared);
    let metadata = outcome.artifact.metadata();

    // 46 rows remain after two price outliers are removed; ceil(46 * 0.2)
    // are held out.
    assert_eq!(metadata.validation_rows, 10);
    assert_eq!(metadata.training_rows, 36);
    assert_eq!(metadata.feature_count, prepared.schema.len());
    assert_eq!(metadata.top_features.len(), 10);
    assert!(outcome.validation.rmse > 0.0);
    assert!(outcome.validation.mape.is_finite());
    assert!(!outcome.validation_set.ids.contains(&24));
}

#[test]
fn test_training_is_deterministic() {
    let prepared = prepared();
    let a = trained(&prepared);
    let b = trained(&prepared);

    assert_eq!(a.artifact.forest(), b.artifact.forest());
    assert_eq!(a.validation_set, b.validation_set);
    assert_eq!(a.feature_importances, b.feature_importances);
}

#[test]
fn test_saved_model_predicts_like_the_trained_one() {
    let prepared = prepared();
    let outcome = trained(&prepared);
    let dir = tempfile::tempdir().unwrap();
    outcome.artifact.save(dir.path()).unwrap();

    let in_memory = PredictionContext::from_artifact(outcome.artifact.clone());
    let loaded = PredictionContext::load(dir.path()).unwrap();
    assert_eq!(loaded.artifact().schema(), &prepared.schema);

    let unlabeled = io::load_csv(&fixture("ames_unlabeled.csv")).unwrap();
    let expected = Predictor::new(&in_memory).predict_frame(&unlabeled).unwrap();
    let actual = Predictor::new(&loaded).predict_frame(&unlabeled).unwrap();

    assert_eq!(actual, expected);
    assert!(actual.failures.is_empty());
    let ids: Vec<Option<i64>> = actual.predictions.iter().map(|p| p.id).collect();
    assert_eq!(ids, vec![Some(1000), Some(1001), Some(1002), Some(1003)]);
    assert!(actual.predictions.iter().all(|p| p.price > 0.0));
}

#[test]
fn test_missing_model_directory() {
    let dir = tempfile::tempdir().unwrap();
    let err = PredictionContext::load(&dir.path().join("model")).unwrap_err();

    assert!(matches!(err, LearningError::ModelNotFound { .. }));
    assert!(err.to_string().contains("train the model first"));
    assert_eq!(err.error_code(), "MODEL_NOT_FOUND");
}

// ============================================================================
// Prediction
// ============================================================================

#[test]
fn test_form_record_estimate() {
    let prepared = prepared();
    let outcome = trained(&prepared);
    let rmse = outcome.validation.rmse;
    let context = PredictionContext::from_artifact(outcome.artifact);

    let estimate = Predictor::new(&context)
        .predict_record(
            &RawRecord::new()
                .with("OverallQual", 7)
                .with("GrLivArea", 1710.0)
                .with("GarageCars", 2)
                .with("TotalBsmtSF", 856.0)
                .with("FullBath", 2)
                .with("YearBuilt", 2003)
                .with("Neighborhood", "CollgCr")
                .with("HouseStyle", "2Story"),
        )
        .unwrap();

    assert!(estimate.price > 0.0);
    assert!((estimate.price_per_sqft - estimate.price / 1710.0).abs() < 1e-9);
    assert!((estimate.confidence_high - estimate.price - rmse).abs() < 1e-6);
    assert_eq!(estimate.confidence_low, (estimate.price - rmse).max(0.0));
}

#[test]
fn test_batch_collects_row_failures() {
    let prepared = prepared();
    let outcome = trained(&prepared);

    let mut reference = outcome.artifact.reference().clone();
    reference.imputation.numeric.remove("YrSold");
    let artifact = ModelArtifact::new(
        outcome.artifact.forest().clone(),
        outcome.artifact.schema().clone(),
        reference,
        outcome.artifact.metadata().clone(),
    )
    .unwrap();
    let context = PredictionContext::from_artifact(artifact);

    let df = df![
        "Id" => [1i64, 2, 3],
        "OverallQual" => [6i64, 7, 8],
        "GrLivArea" => [1200.0, 1710.0, 2200.0],
        "YearBuilt" => [1975i64, 2003, 2007],
        "YrSold" => [Some(2008i64), None, Some(2009)],
    ]
    .unwrap();
    let batch = Predictor::new(&context).predict_frame(&df).unwrap();

    let rows: Vec<usize> = batch.predictions.iter().map(|p| p.row).collect();
    assert_eq!(rows, vec![0, 2]);
    assert_eq!(batch.failures.len(), 1);
    assert_eq!(batch.failures[0].id, Some(2));
    assert!(batch.failures[0].message.contains("YrSold"));

    let out = batch.to_dataframe("Id", "SalePrice").unwrap();
    assert_eq!(out.height(), 3);
    assert_eq!(out.column("SalePrice").unwrap().null_count(), 1);
    let ids: Vec<Option<i64>> = out.column("Id").unwrap().i64().unwrap().into_iter().collect();
    assert_eq!(ids, vec![Some(1), Some(2), Some(3)]);
}

// ============================================================================
// Evaluation
// ============================================================================

#[test]
fn test_evaluation_of_validation_files() {
    let prepared = prepared();
    let outcome = trained(&prepared);
    let dir = tempfile::tempdir().unwrap();
    evaluation::write_validation_files(&outcome.validation_set, dir.path()).unwrap();

    let report = EvaluationReport::from_dir(dir.path()).unwrap();
    assert_eq!(report.records.len(), 10);
    assert_eq!(report.accuracy.total, 10);
    assert!((report.metrics.rmse - outcome.validation.rmse).abs() < 1e-6);
    assert!(report.worst.len() <= evaluation::WORST_COUNT);

    report.write(dir.path()).unwrap();
    let text = std::fs::read_to_string(dir.path().join(evaluation::REPORT_FILE)).unwrap();
    assert!(text.contains("MODEL EVALUATION REPORT"));
}
