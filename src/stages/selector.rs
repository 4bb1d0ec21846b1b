//! Occurrence-count feature selection

use super::Selector;
use crate::dataset::Dataset;
use crate::error::{PipelineError, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Parameters for [`FrequencySelector`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrequencyParams {
    /// Minimum number of records a feature must appear in to be retained
    pub min_count: usize,
    /// When true, numeric-valued features are not evaluated and are always
    /// retained. The orchestrator forces this off.
    pub ignore_numeric: bool,
}

impl Default for FrequencyParams {
    fn default() -> Self {
        Self {
            min_count: 1,
            ignore_numeric: true,
        }
    }
}

/// Retains features that occur in at least `min_count` records; `transform`
/// prunes everything else from the dataset.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FrequencySelector {
    params: FrequencyParams,
    retained: Option<BTreeSet<String>>,
}

impl FrequencySelector {
    pub fn new(params: FrequencyParams) -> Self {
        Self {
            params,
            retained: None,
        }
    }

    pub fn params(&self) -> &FrequencyParams {
        &self.params
    }

    /// Retained-feature set determined at fit time
    pub fn retained(&self) -> Option<&BTreeSet<String>> {
        self.retained.as_ref()
    }
}

impl Selector for FrequencySelector {
    fn fit(&mut self, dataset: &Dataset) -> Result<()> {
        if dataset.is_empty() {
            return Err(PipelineError::DataError(
                "cannot fit selector on an empty dataset".to_string(),
            ));
        }

        let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
        let mut always_kept: BTreeSet<String> = BTreeSet::new();

        for record in dataset.records() {
            for (name, value) in &record.features {
                if self.params.ignore_numeric && value.is_numeric() {
                    always_kept.insert(name.clone());
                } else {
                    *counts.entry(name.as_str()).or_insert(0) += 1;
                }
            }
        }

        let mut retained = always_kept;
        for (name, count) in counts {
            if count >= self.params.min_count {
                retained.insert(name.to_string());
            }
        }

        self.retained = Some(retained);
        Ok(())
    }

    fn transform(&self, dataset: &mut Dataset) -> Result<()> {
        let retained = self.retained.as_ref().ok_or_else(|| {
            PipelineError::NotTrained("selector used before fit".to_string())
        })?;
        dataset.retain_features(retained);
        Ok(())
    }
}
