//! Validation metrics and the cross-fold aggregation base rule
//!
//! [`ValidationMetrics`] is the value object every model family attaches to a
//! fitted model. Fields are optional so that one type serves families that
//! populate different subsets: classification fields (accuracy, precision,
//! recall, f1) are combined across folds by [`ValidationMetrics::average`];
//! family-specific fields (sse, count_r_square) are left to the model's own
//! additive aggregation extension.

use crate::dataset::Dataset;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Model evaluation metrics for one dataset or one fold
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ValidationMetrics {
    /// Fraction of records predicted correctly
    pub accuracy: Option<f64>,
    /// Macro-averaged precision
    pub precision: Option<f64>,
    /// Macro-averaged recall
    pub recall: Option<f64>,
    /// Macro-averaged F1 score
    pub f1_score: Option<f64>,
    /// Sum of squared rank errors (ordinal families)
    pub sse: Option<f64>,
    /// Count-based R-squared (ordinal families)
    pub count_r_square: Option<f64>,
    /// Number of records evaluated
    pub n_samples: usize,
}

impl ValidationMetrics {
    /// Create empty metrics
    pub fn new() -> Self {
        Self::default()
    }

    /// Combine per-fold metrics into one aggregate.
    ///
    /// Base rule: for each classification field, the aggregate is the
    /// arithmetic mean over the folds where the field is present; a field
    /// present in no fold stays `None`. An empty fold list yields `None`,
    /// never a zeroed-out value. Family-specific fields (`sse`,
    /// `count_r_square`) are not touched here; a model family fills them in
    /// through its aggregation extension, on top of this result.
    pub fn average(folds: &[ValidationMetrics]) -> Option<ValidationMetrics> {
        if folds.is_empty() {
            return None;
        }

        let mut avg = ValidationMetrics::new();
        avg.accuracy = mean_of(folds, |m| m.accuracy);
        avg.precision = mean_of(folds, |m| m.precision);
        avg.recall = mean_of(folds, |m| m.recall);
        avg.f1_score = mean_of(folds, |m| m.f1_score);
        avg.n_samples = folds.iter().map(|m| m.n_samples).sum();
        Some(avg)
    }

    /// Compute classification metrics by comparing each record's true label
    /// against its predicted label. Records missing either side are skipped.
    pub fn compute_classification(dataset: &Dataset) -> ValidationMetrics {
        let mut metrics = ValidationMetrics::new();

        let pairs: Vec<(&str, &str)> = dataset
            .records()
            .filter_map(|r| match (&r.label, &r.predicted) {
                (Some(t), Some(p)) => Some((t.as_str(), p.as_str())),
                _ => None,
            })
            .collect();

        metrics.n_samples = pairs.len();
        if pairs.is_empty() {
            return metrics;
        }

        let correct = pairs.iter().filter(|(t, p)| t == p).count();
        metrics.accuracy = Some(correct as f64 / pairs.len() as f64);

        // Per-class confusion counts for macro averaging
        let mut tp: BTreeMap<&str, usize> = BTreeMap::new();
        let mut fp: BTreeMap<&str, usize> = BTreeMap::new();
        let mut fn_: BTreeMap<&str, usize> = BTreeMap::new();
        for (t, p) in &pairs {
            if t == p {
                *tp.entry(t).or_insert(0) += 1;
            } else {
                *fp.entry(p).or_insert(0) += 1;
                *fn_.entry(t).or_insert(0) += 1;
            }
        }

        let mut classes: Vec<&str> = tp.keys().chain(fp.keys()).chain(fn_.keys()).copied().collect();
        classes.sort_unstable();
        classes.dedup();

        let mut precision_sum = 0.0;
        let mut recall_sum = 0.0;
        for class in &classes {
            let tp_c = *tp.get(class).unwrap_or(&0) as f64;
            let fp_c = *fp.get(class).unwrap_or(&0) as f64;
            let fn_c = *fn_.get(class).unwrap_or(&0) as f64;
            precision_sum += if tp_c + fp_c > 0.0 { tp_c / (tp_c + fp_c) } else { 0.0 };
            recall_sum += if tp_c + fn_c > 0.0 { tp_c / (tp_c + fn_c) } else { 0.0 };
        }

        let n_classes = classes.len() as f64;
        let precision = precision_sum / n_classes;
        let recall = recall_sum / n_classes;
        metrics.precision = Some(precision);
        metrics.recall = Some(recall);
        metrics.f1_score = Some(if precision + recall > 0.0 {
            2.0 * precision * recall / (precision + recall)
        } else {
            0.0
        });

        metrics
    }
}

fn mean_of<F>(folds: &[ValidationMetrics], field: F) -> Option<f64>
where
    F: Fn(&ValidationMetrics) -> Option<f64>,
{
    let values: Vec<f64> = folds.iter().filter_map(&field).collect();
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::{Dataset, FeatureValue, Record};
    use std::collections::BTreeMap;

    fn with_accuracy(accuracy: f64) -> ValidationMetrics {
        ValidationMetrics {
            accuracy: Some(accuracy),
            n_samples: 10,
            ..Default::default()
        }
    }

    #[test]
    fn test_average_is_arithmetic_mean() {
        let folds = vec![with_accuracy(0.8), with_accuracy(0.6), with_accuracy(1.0)];
        let avg = ValidationMetrics::average(&folds).unwrap();
        assert!((avg.accuracy.unwrap() - 0.8).abs() < 1e-12);
        assert_eq!(avg.n_samples, 30);
    }

    #[test]
    fn test_average_of_empty_list_is_none() {
        assert!(ValidationMetrics::average(&[]).is_none());
    }

    #[test]
    fn test_field_absent_everywhere_stays_none() {
        let folds = vec![with_accuracy(0.5), with_accuracy(0.7)];
        let avg = ValidationMetrics::average(&folds).unwrap();
        assert!(avg.precision.is_none());
        assert!(avg.sse.is_none());
    }

    #[test]
    fn test_field_absent_on_one_fold_excludes_that_fold() {
        let mut partial = with_accuracy(0.4);
        partial.precision = Some(0.9);
        let folds = vec![partial, with_accuracy(0.6)];
        let avg = ValidationMetrics::average(&folds).unwrap();
        assert!((avg.accuracy.unwrap() - 0.5).abs() < 1e-12);
        assert!((avg.precision.unwrap() - 0.9).abs() < 1e-12);
    }

    #[test]
    fn test_compute_classification_perfect() {
        let mut dataset = Dataset::new();
        for label in ["a", "b", "a"] {
            let mut features = BTreeMap::new();
            features.insert("x".to_string(), FeatureValue::Numeric(1.0));
            let mut record = Record::labeled(features, label);
            record.predicted = Some(label.to_string());
            dataset.add(record);
        }

        let metrics = ValidationMetrics::compute_classification(&dataset);
        assert_eq!(metrics.accuracy, Some(1.0));
        assert_eq!(metrics.precision, Some(1.0));
        assert_eq!(metrics.recall, Some(1.0));
        assert_eq!(metrics.f1_score, Some(1.0));
        assert_eq!(metrics.n_samples, 3);
    }
}
