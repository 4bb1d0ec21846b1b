//! Integration test: k-fold splitting and metric aggregation

use pipelearn::dataset::{Dataset, FeatureValue, Record};
use pipelearn::metrics::ValidationMetrics;
use pipelearn::stages::{Model, ModelSpec, OrdinalParams};
use pipelearn::validation::{aggregate_folds, CrossValidationEngine, KFoldPlan};
use pipelearn::PipelineError;

use std::collections::BTreeMap;

fn record(x: f64, label: &str) -> Record {
    let mut features = BTreeMap::new();
    features.insert("x".to_string(), FeatureValue::Numeric(x));
    Record::labeled(features, label)
}

#[test]
fn test_folds_partition_every_record_exactly_once() {
    let splits = KFoldPlan::new(4).split(22).unwrap();
    assert_eq!(splits.len(), 4);

    let mut seen = vec![0usize; 22];
    for split in &splits {
        for &id in &split.validation_ids {
            seen[id] += 1;
        }
        for &id in &split.train_ids {
            assert!(!split.validation_ids.contains(&id));
        }
        assert_eq!(split.train_ids.len() + split.validation_ids.len(), 22);
    }
    assert!(seen.iter().all(|&count| count == 1));
}

#[test]
fn test_fold_sizes_differ_by_at_most_one() {
    let splits = KFoldPlan::new(3).split(10).unwrap();
    let mut sizes: Vec<usize> = splits.iter().map(|s| s.validation_ids.len()).collect();
    sizes.sort_unstable();
    assert_eq!(sizes, vec![3, 3, 4]);
}

#[test]
fn test_seeded_splits_are_reproducible() {
    let first = KFoldPlan::new(5).with_seed(42).split(50).unwrap();
    let second = KFoldPlan::new(5).with_seed(42).split(50).unwrap();
    for (a, b) in first.iter().zip(&second) {
        assert_eq!(a.validation_ids, b.validation_ids);
    }

    let other = KFoldPlan::new(5).with_seed(43).split(50).unwrap();
    assert!(first
        .iter()
        .zip(&other)
        .any(|(a, b)| a.validation_ids != b.validation_ids));
}

#[test]
fn test_k_below_two_is_rejected() {
    assert!(matches!(
        KFoldPlan::new(1).split(10),
        Err(PipelineError::InvalidParameter { .. })
    ));
}

#[test]
fn test_more_folds_than_records_is_rejected() {
    assert!(KFoldPlan::new(5).split(3).is_err());
}

#[test]
fn test_engine_single_class_accuracy_is_one() {
    let dataset =
        Dataset::from_records((0..10).map(|i| record(i as f64, "only")).collect());
    let average = CrossValidationEngine::run(&ModelSpec::Majority, &dataset, 5, None)
        .unwrap()
        .unwrap();
    assert_eq!(average.accuracy, Some(1.0));
    assert_eq!(average.n_samples, 10);
}

#[test]
fn test_engine_is_deterministic_under_a_seed() {
    let dataset = Dataset::from_records(
        (0..20)
            .map(|i| record(i as f64, if i % 3 == 0 { "a" } else { "b" }))
            .collect(),
    );
    let spec = ModelSpec::Ordinal(OrdinalParams::default());
    let first = CrossValidationEngine::run(&spec, &dataset, 4, Some(9)).unwrap();
    let second = CrossValidationEngine::run(&spec, &dataset, 4, Some(9)).unwrap();
    assert_eq!(first, second);
}

#[test]
fn test_base_aggregation_averages_shared_fields() {
    let folds = vec![
        ValidationMetrics {
            accuracy: Some(0.8),
            n_samples: 5,
            ..ValidationMetrics::default()
        },
        ValidationMetrics {
            accuracy: Some(0.6),
            n_samples: 5,
            ..ValidationMetrics::default()
        },
    ];
    let reference = ModelSpec::Majority.instantiate();
    let average = aggregate_folds(&reference, &folds).unwrap();
    assert!((average.accuracy.unwrap() - 0.7).abs() < 1e-12);
    assert_eq!(average.n_samples, 10);
    // Majority models do not define rules for the ordinal-only fields
    assert_eq!(average.sse, None);
    assert_eq!(average.count_r_square, None);
}

#[test]
fn test_ordinal_aggregation_extends_without_clobbering_base() {
    let folds = vec![
        ValidationMetrics {
            accuracy: Some(1.0),
            sse: Some(4.0),
            count_r_square: Some(0.5),
            n_samples: 5,
            ..ValidationMetrics::default()
        },
        ValidationMetrics {
            accuracy: Some(0.5),
            sse: Some(2.0),
            count_r_square: Some(0.7),
            n_samples: 5,
            ..ValidationMetrics::default()
        },
    ];
    let reference = ModelSpec::Ordinal(OrdinalParams::default()).instantiate();
    let average = aggregate_folds(&reference, &folds).unwrap();

    // Base fields keep their plain-mean combination
    assert!((average.accuracy.unwrap() - 0.75).abs() < 1e-12);
    // Family-specific fields are combined by the ordinal rule: sum over k
    assert!((average.sse.unwrap() - 3.0).abs() < 1e-12);
    assert!((average.count_r_square.unwrap() - 0.6).abs() < 1e-12);
}

#[test]
fn test_aggregating_no_folds_yields_none() {
    let reference = ModelSpec::Majority.instantiate();
    assert!(aggregate_folds(&reference, &[]).is_none());
}

#[test]
fn test_fold_models_are_discarded_after_aggregation() {
    // The engine returns only metrics; fitting through it must not leave
    // any state behind that a later fresh instantiation could observe
    let dataset =
        Dataset::from_records((0..12).map(|i| record(i as f64, "z")).collect());
    CrossValidationEngine::run(&ModelSpec::Majority, &dataset, 3, None).unwrap();

    let fresh = ModelSpec::Majority.instantiate();
    assert!(fresh.validation_metrics().is_none());
}
