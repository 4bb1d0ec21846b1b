//! Reversible numeric normalization

use super::Transformer;
use crate::dataset::{Dataset, FeatureValue};
use crate::error::{PipelineError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Per-feature observed range
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
struct FeatureRange {
    min: f64,
    max: f64,
}

/// Scales every numeric feature value into [0, 1] using the per-feature
/// min/max observed at fit time. `denormalize` is the exact inverse.
/// Categorical and boolean values pass through untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MinMaxNormalizer {
    ranges: BTreeMap<String, FeatureRange>,
    is_fitted: bool,
}

impl MinMaxNormalizer {
    pub fn new() -> Self {
        Self::default()
    }

    fn fit(&mut self, dataset: &Dataset) -> Result<()> {
        if dataset.is_empty() {
            return Err(PipelineError::DataError(
                "cannot fit normalizer on an empty dataset".to_string(),
            ));
        }

        self.ranges.clear();
        for record in dataset.records() {
            for (name, value) in &record.features {
                if let FeatureValue::Numeric(v) = value {
                    let range = self
                        .ranges
                        .entry(name.clone())
                        .or_insert(FeatureRange { min: *v, max: *v });
                    if *v < range.min {
                        range.min = *v;
                    }
                    if *v > range.max {
                        range.max = *v;
                    }
                }
            }
        }

        self.is_fitted = true;
        Ok(())
    }

    fn apply<F>(&self, dataset: &mut Dataset, map: F) -> Result<()>
    where
        F: Fn(f64, FeatureRange) -> f64,
    {
        if !self.is_fitted {
            return Err(PipelineError::NotTrained(
                "normalizer used before fit".to_string(),
            ));
        }

        for record in dataset.records_mut() {
            for (name, value) in record.features.iter_mut() {
                if let FeatureValue::Numeric(v) = value {
                    if let Some(range) = self.ranges.get(name) {
                        *v = map(*v, *range);
                    }
                }
            }
        }
        Ok(())
    }
}

impl Transformer for MinMaxNormalizer {
    fn fit_transform(&mut self, dataset: &mut Dataset) -> Result<()> {
        self.fit(dataset)?;
        self.transform(dataset)
    }

    fn transform(&self, dataset: &mut Dataset) -> Result<()> {
        self.apply(dataset, |v, range| {
            let span = range.max - range.min;
            if span > 0.0 {
                (v - range.min) / span
            } else {
                0.0
            }
        })
    }

    fn denormalize(&self, dataset: &mut Dataset) -> Result<()> {
        self.apply(dataset, |v, range| {
            let span = range.max - range.min;
            if span > 0.0 {
                v * span + range.min
            } else {
                range.min
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::Record;

    fn dataset_with_values(values: &[f64]) -> Dataset {
        let records = values
            .iter()
            .map(|&v| {
                let mut features = BTreeMap::new();
                features.insert("x".to_string(), FeatureValue::Numeric(v));
                Record::new(features)
            })
            .collect();
        Dataset::from_records(records)
    }

    fn numeric(dataset: &Dataset, id: usize) -> f64 {
        dataset.get(id).unwrap().features["x"].as_numeric().unwrap()
    }

    #[test]
    fn test_fit_transform_scales_into_unit_range() {
        let mut dataset = dataset_with_values(&[10.0, 20.0, 30.0]);
        let mut normalizer = MinMaxNormalizer::new();
        normalizer.fit_transform(&mut dataset).unwrap();

        assert!((numeric(&dataset, 0) - 0.0).abs() < 1e-12);
        assert!((numeric(&dataset, 1) - 0.5).abs() < 1e-12);
        assert!((numeric(&dataset, 2) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_denormalize_is_exact_inverse() {
        let mut dataset = dataset_with_values(&[3.0, 7.0, 11.0]);
        let mut normalizer = MinMaxNormalizer::new();
        normalizer.fit_transform(&mut dataset).unwrap();
        normalizer.denormalize(&mut dataset).unwrap();

        assert!((numeric(&dataset, 0) - 3.0).abs() < 1e-9);
        assert!((numeric(&dataset, 1) - 7.0).abs() < 1e-9);
        assert!((numeric(&dataset, 2) - 11.0).abs() < 1e-9);
    }

    #[test]
    fn test_constant_feature_maps_to_zero() {
        let mut dataset = dataset_with_values(&[5.0, 5.0]);
        let mut normalizer = MinMaxNormalizer::new();
        normalizer.fit_transform(&mut dataset).unwrap();
        assert_eq!(numeric(&dataset, 0), 0.0);
    }

    #[test]
    fn test_transform_before_fit_fails() {
        let mut dataset = dataset_with_values(&[1.0]);
        let normalizer = MinMaxNormalizer::new();
        let result = normalizer.transform(&mut dataset);
        assert!(matches!(result, Err(PipelineError::NotTrained(_))));
    }
}
