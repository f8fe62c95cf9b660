mod common;

use capplan::source::{MetricsSource, create_metrics_source};
use capplan::training::train_from_source;
use common::fixtures::{cpu_counter_jsonl, cpu_counter_samples};

#[tokio::test]
async fn test_jsonl_round_trip_through_factory() {
    let path = common::temp_file("samples.jsonl");
    tokio::fs::write(&path, cpu_counter_jsonl(8)).await.unwrap();

    let source = create_metrics_source(&format!("jsonl://{}", path.display()))
        .await
        .unwrap();
    let samples = source.fetch_samples(100.0, usize::MAX).await.unwrap();
    tokio::fs::remove_file(&path).await.unwrap();

    let expected = cpu_counter_samples(8);
    assert_eq!(samples.len(), expected.len());
    for (sample, expected) in samples.iter().zip(&expected) {
        assert_eq!(sample.value, expected.value);
        assert_eq!(sample.instance, expected.instance);
        assert_eq!(sample.cpu, expected.cpu);
        assert_eq!(sample.mode, expected.mode);
        assert_eq!(
            sample.timestamp.resolve().map(|t| t.to_rfc3339()),
            expected.timestamp.resolve().map(|t| t.to_rfc3339())
        );
    }
}

#[tokio::test]
async fn test_train_from_jsonl_file() {
    let path = common::temp_file("train.jsonl");
    tokio::fs::write(&path, cpu_counter_jsonl(24)).await.unwrap();

    let source = create_metrics_source(&format!("file://{}", path.display()))
        .await
        .unwrap();
    let outcome = train_from_source(source.as_ref(), &common::fast_training_config(), 5000)
        .await
        .unwrap();
    tokio::fs::remove_file(&path).await.unwrap();

    assert_eq!(outcome.report.n_train + outcome.report.n_test, 24 * 12);
    assert!(outcome.report.mae.is_finite());
}

#[tokio::test]
async fn test_missing_file_is_an_error() {
    let source = create_metrics_source("jsonl:///nonexistent/capplan/samples.jsonl")
        .await
        .unwrap();
    assert!(source.fetch_samples(0.0, 10).await.is_err());
}
