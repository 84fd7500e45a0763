//! End-to-end tests: synthetic CSV → feature matrix → isolation forest

use loginsight::prelude::*;
use loginsight::anomaly::Label;
use ndarray::Array2;
use polars::prelude::*;

fn clustered_sessions_with_outlier() -> Array2<f64> {
    let mut data = Vec::new();
    for i in 0..20 {
        let jitter = (i % 4) as f64 * 0.25;
        data.push(5.0 + jitter);
        data.push(30.0 + jitter * 2.0);
        data.push(14.0 - (i % 3) as f64 * 0.4);
    }
    data.extend_from_slice(&[100.0, 200.0, 0.0]);
    Array2::from_shape_vec((21, 3), data).unwrap()
}

#[test]
fn test_injected_outlier_is_flagged() {
    let x = clustered_sessions_with_outlier();

    let mut forest = IsolationForest::new()
        .with_n_estimators(50)
        .with_contamination(0.05)
        .with_seed(42);
    forest.fit(&x).unwrap();

    let result = forest.detect(&x).unwrap();

    assert_eq!(result.labels[20], Label::Anomaly);
    let outlier_score = result.scores[20];
    for i in 0..20 {
        assert!(outlier_score > result.scores[i]);
    }
}

#[test]
fn test_csv_pipeline_end_to_end() {
    let dir = tempfile::tempdir().unwrap();
    let raw_path = dir.path().join("behavior.csv");
    let labeled_path = dir.path().join("labeled.csv");

    // Generate and persist a synthetic table
    let mut df = UserBehaviorGenerator::new()
        .with_n_normal(950)
        .with_n_anomalies(50)
        .with_seed(42)
        .generate()
        .unwrap();
    DataSaver::save_csv(&mut df, &raw_path).unwrap();

    // Reload and detect
    let loaded = DataLoader::new().load_csv(&raw_path).unwrap();
    assert_eq!(loaded.height(), 1000);

    let x = build_feature_matrix(&loaded, &REQUIRED_COLUMNS).unwrap();
    let mut forest = IsolationForest::new()
        .with_contamination(0.05)
        .with_seed(42);
    let labels = forest.fit_predict(&x).unwrap();

    // Threshold calibration pins the fit-set anomaly count to the quantile
    let n_anomalies = labels.iter().filter(|l| l.is_anomaly()).count() as i64;
    assert!(
        (n_anomalies - 50).abs() <= 1,
        "expected about 50 anomalies, got {n_anomalies}"
    );

    // Persist the labeled table and read it back
    let anomaly_col: Vec<i32> = labels.iter().map(|l| l.as_i32()).collect();
    let mut labeled = loaded.clone();
    labeled
        .with_column(Column::new("anomaly".into(), anomaly_col))
        .unwrap();
    DataSaver::save_csv(&mut labeled, &labeled_path).unwrap();

    let reloaded = DataLoader::new().load_csv(&labeled_path).unwrap();
    assert_eq!(reloaded.width(), 4);

    let flags = reloaded
        .column("anomaly")
        .unwrap()
        .as_materialized_series()
        .cast(&DataType::Int32)
        .unwrap();
    let n_flagged = flags
        .i32()
        .unwrap()
        .into_iter()
        .flatten()
        .filter(|&v| v == -1)
        .count() as i64;
    assert_eq!(n_flagged, n_anomalies);
}

#[test]
fn test_pipeline_is_deterministic() {
    let df = UserBehaviorGenerator::new()
        .with_n_normal(300)
        .with_n_anomalies(15)
        .with_seed(7)
        .generate()
        .unwrap();
    let x = build_feature_matrix(&df, &REQUIRED_COLUMNS).unwrap();

    let run = || {
        let mut forest = IsolationForest::new()
            .with_n_estimators(60)
            .with_contamination(0.05)
            .with_seed(1234);
        forest.fit_predict(&x).unwrap()
    };

    assert_eq!(run(), run());
}

#[test]
fn test_predict_on_unseen_data() {
    let df = UserBehaviorGenerator::new()
        .with_n_normal(400)
        .with_n_anomalies(20)
        .with_seed(5)
        .generate()
        .unwrap();
    let x = build_feature_matrix(&df, &REQUIRED_COLUMNS).unwrap();

    let mut forest = IsolationForest::new().with_seed(5);
    forest.fit(&x).unwrap();

    // A clearly normal and a clearly anomalous unseen session
    let unseen = ndarray::arr2(&[[5.0, 30.0, 14.0], [19.5, 119.0, 2.0]]);
    let scores = forest.score_samples(&unseen).unwrap();
    assert!(scores[1] > scores[0]);
}

#[test]
fn test_mismatched_schema_fails_loudly() {
    let df = df!(
        "login_frequency" => &[1.0, 2.0],
        "session_duration" => &[10.0, 20.0]
    )
    .unwrap();

    let err = build_feature_matrix(&df, &REQUIRED_COLUMNS).unwrap_err();
    assert!(err.to_string().contains("login_hour"));
}

#[test]
fn test_report_artifacts() {
    let x = clustered_sessions_with_outlier();
    let mut forest = IsolationForest::new().with_seed(42);
    forest.fit(&x).unwrap();
    let result = forest.detect(&x).unwrap();

    let summary = DetectionSummary::from_labels(&result.labels, result.threshold);
    assert_eq!(summary.n_samples, 21);
    assert_eq!(summary.n_anomalies, result.n_anomalies);

    let dir = tempfile::tempdir().unwrap();
    let plot = dir.path().join("behavior.svg");
    render_scatter(
        &plot,
        &x,
        &result.labels,
        0,
        1,
        "Login Frequency (per day)",
        "Session Duration (minutes)",
    )
    .unwrap();
    assert!(std::fs::read_to_string(&plot).unwrap().contains("<svg"));
}
