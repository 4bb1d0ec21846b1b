//! Reference model implementations
//!
//! Two small model families exercise the orchestrator and the aggregation
//! protocol: [`MajorityClassifier`] is the most-frequent-label baseline, and
//! [`OrdinalClassifier`] predicts over an ordered label scale and carries the
//! rank-error fields (`sse`, `count_r_square`) whose cross-fold combination
//! extends the base aggregation rule.

use super::Model;
use crate::dataset::{Dataset, FeatureValue};
use crate::error::{PipelineError, Result};
use crate::metrics::ValidationMetrics;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

fn require_labeled(dataset: &Dataset, what: &str) -> Result<()> {
    if dataset.is_empty() {
        return Err(PipelineError::DataError(format!(
            "cannot fit {what} on an empty dataset"
        )));
    }
    if !dataset.is_fully_labeled() {
        return Err(PipelineError::DataError(format!(
            "cannot fit {what}: dataset contains unlabeled records"
        )));
    }
    Ok(())
}

/// Baseline classifier: predicts the most frequent training label for every
/// record, with the training label distribution as the probability map.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MajorityClassifier {
    label_counts: BTreeMap<String, usize>,
    n_trained: usize,
    validation_metrics: Option<ValidationMetrics>,
}

impl MajorityClassifier {
    pub fn new() -> Self {
        Self::default()
    }

    fn majority_label(&self) -> Result<&str> {
        // BTreeMap iteration order makes ties deterministic
        self.label_counts
            .iter()
            .max_by_key(|(_, &count)| count)
            .map(|(label, _)| label.as_str())
            .ok_or_else(|| PipelineError::NotTrained("majority classifier used before fit".to_string()))
    }
}

impl Model for MajorityClassifier {
    fn fit(&mut self, dataset: &Dataset) -> Result<()> {
        require_labeled(dataset, "majority classifier")?;

        self.label_counts.clear();
        for record in dataset.records() {
            if let Some(label) = &record.label {
                *self.label_counts.entry(label.clone()).or_insert(0) += 1;
            }
        }
        self.n_trained = dataset.len();
        Ok(())
    }

    fn predict(&self, dataset: &mut Dataset) -> Result<()> {
        let majority = self.majority_label()?.to_string();
        let probabilities: BTreeMap<String, f64> = self
            .label_counts
            .iter()
            .map(|(label, &count)| (label.clone(), count as f64 / self.n_trained as f64))
            .collect();

        for record in dataset.records_mut() {
            record.predicted = Some(majority.clone());
            record.predicted_probabilities = Some(probabilities.clone());
        }
        Ok(())
    }

    fn validate(&self, dataset: &mut Dataset) -> Result<ValidationMetrics> {
        self.predict(dataset)?;
        Ok(ValidationMetrics::compute_classification(dataset))
    }

    fn validation_metrics(&self) -> Option<&ValidationMetrics> {
        self.validation_metrics.as_ref()
    }

    fn set_validation_metrics(&mut self, metrics: ValidationMetrics) {
        self.validation_metrics = Some(metrics);
    }
}

/// Parameters for [`OrdinalClassifier`]
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OrdinalParams {
    /// Explicit label scale, lowest rank first. When unset, the sorted set
    /// of training labels is used.
    pub label_order: Option<Vec<String>>,
}

/// Nearest-centroid classifier over an ordered label scale.
///
/// Each label gets a centroid (per-feature mean of numeric values, absent
/// features counting as zero); prediction picks the closest centroid. On top
/// of the classification metrics, `validate` reports the sum of squared rank
/// errors and a count-based R-squared over the label scale, and
/// `extend_average` combines those across folds as the sum of per-fold value
/// over k (mean of ratios, field by field).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrdinalClassifier {
    params: OrdinalParams,
    label_order: Vec<String>,
    centroids: BTreeMap<String, BTreeMap<String, f64>>,
    validation_metrics: Option<ValidationMetrics>,
}

impl OrdinalClassifier {
    pub fn new(params: OrdinalParams) -> Self {
        Self {
            params,
            label_order: Vec::new(),
            centroids: BTreeMap::new(),
            validation_metrics: None,
        }
    }

    fn rank_of(&self, label: &str) -> Option<usize> {
        self.label_order.iter().position(|l| l == label)
    }

    fn distance_sq(centroid: &BTreeMap<String, f64>, record_features: &BTreeMap<String, FeatureValue>) -> f64 {
        let mut names: BTreeSet<&str> = centroid.keys().map(String::as_str).collect();
        for (name, value) in record_features {
            if value.is_numeric() {
                names.insert(name.as_str());
            }
        }

        names
            .into_iter()
            .map(|name| {
                let c = centroid.get(name).copied().unwrap_or(0.0);
                let r = record_features
                    .get(name)
                    .and_then(FeatureValue::as_numeric)
                    .unwrap_or(0.0);
                let d = c - r;
                d * d
            })
            .sum()
    }
}

impl Model for OrdinalClassifier {
    fn fit(&mut self, dataset: &Dataset) -> Result<()> {
        require_labeled(dataset, "ordinal classifier")?;

        self.label_order = match &self.params.label_order {
            Some(order) => order.clone(),
            None => dataset.labels().iter().cloned().collect(),
        };

        for label in dataset.labels() {
            if !self.label_order.contains(label) {
                return Err(PipelineError::DataError(format!(
                    "label {label:?} is not on the configured label scale"
                )));
            }
        }

        // Per-label mean of numeric features; features absent from a record
        // count as zero, which matches sparse token-count data.
        self.centroids.clear();
        let mut counts: BTreeMap<String, usize> = BTreeMap::new();
        for record in dataset.records() {
            let label = record.label.as_ref().cloned().unwrap_or_default();
            *counts.entry(label.clone()).or_insert(0) += 1;
            let centroid = self.centroids.entry(label).or_default();
            for (name, value) in &record.features {
                if let Some(v) = value.as_numeric() {
                    *centroid.entry(name.clone()).or_insert(0.0) += v;
                }
            }
        }
        for (label, centroid) in &mut self.centroids {
            let count = counts[label] as f64;
            for sum in centroid.values_mut() {
                *sum /= count;
            }
        }

        Ok(())
    }

    fn predict(&self, dataset: &mut Dataset) -> Result<()> {
        if self.centroids.is_empty() {
            return Err(PipelineError::NotTrained(
                "ordinal classifier used before fit".to_string(),
            ));
        }

        for record in dataset.records_mut() {
            let mut best: Option<(&str, f64)> = None;
            let mut weights: BTreeMap<String, f64> = BTreeMap::new();

            // label_order drives iteration so distance ties resolve to the
            // lower rank deterministically
            for label in &self.label_order {
                let Some(centroid) = self.centroids.get(label) else {
                    continue;
                };
                let d2 = Self::distance_sq(centroid, &record.features);
                weights.insert(label.clone(), 1.0 / (1.0 + d2));
                if best.map_or(true, |(_, best_d2)| d2 < best_d2) {
                    best = Some((label.as_str(), d2));
                }
            }

            let (label, _) = best.ok_or_else(|| {
                PipelineError::NotTrained("ordinal classifier has no centroids".to_string())
            })?;

            let total: f64 = weights.values().sum();
            for w in weights.values_mut() {
                *w /= total;
            }

            record.predicted = Some(label.to_string());
            record.predicted_probabilities = Some(weights);
        }
        Ok(())
    }

    fn validate(&self, dataset: &mut Dataset) -> Result<ValidationMetrics> {
        self.predict(dataset)?;
        let mut metrics = ValidationMetrics::compute_classification(dataset);

        // Rank errors over the ordered label scale
        let ranks: Vec<(f64, f64)> = dataset
            .records()
            .filter_map(|r| match (&r.label, &r.predicted) {
                (Some(t), Some(p)) => Some((self.rank_of(t)?, self.rank_of(p)?)),
                _ => None,
            })
            .map(|(t, p)| (t as f64, p as f64))
            .collect();

        if !ranks.is_empty() {
            let sse: f64 = ranks.iter().map(|(t, p)| (t - p) * (t - p)).sum();
            let mean_rank = ranks.iter().map(|(t, _)| t).sum::<f64>() / ranks.len() as f64;
            let sst: f64 = ranks.iter().map(|(t, _)| (t - mean_rank) * (t - mean_rank)).sum();

            metrics.sse = Some(sse);
            metrics.count_r_square = Some(if sst > 0.0 { 1.0 - sse / sst } else { 0.0 });
        }

        Ok(metrics)
    }

    fn extend_average(&self, avg: &mut ValidationMetrics, folds: &[ValidationMetrics]) {
        let k = folds.len() as f64;
        // Mean of ratios, field by field: sum across folds of per-fold value / k
        avg.sse = sum_over_k(folds, k, |m| m.sse);
        avg.count_r_square = sum_over_k(folds, k, |m| m.count_r_square);
    }

    fn validation_metrics(&self) -> Option<&ValidationMetrics> {
        self.validation_metrics.as_ref()
    }

    fn set_validation_metrics(&mut self, metrics: ValidationMetrics) {
        self.validation_metrics = Some(metrics);
    }
}

fn sum_over_k<F>(folds: &[ValidationMetrics], k: f64, field: F) -> Option<f64>
where
    F: Fn(&ValidationMetrics) -> Option<f64>,
{
    let values: Vec<f64> = folds.iter().filter_map(&field).collect();
    if values.is_empty() {
        None
    } else {
        Some(values.iter().map(|v| v / k).sum())
    }
}
