//! Training configuration

use crate::error::{PipelineError, Result};
use crate::stages::{ModelSpec, SelectorSpec, TransformerSpec};
use serde::{Deserialize, Serialize};

/// Immutable-after-construction configuration for one fit: which stages to
/// instantiate, their parameters, and the cross-validation fold count.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingParameters {
    /// Optional data-transformation stage
    pub transformer: Option<TransformerSpec>,
    /// Optional feature-selection stage
    pub selector: Option<SelectorSpec>,
    /// Model stage (always required)
    pub model: ModelSpec,
    /// Fold count for cross-validation; must be >= 2 when CV runs
    pub k_folds: usize,
    /// Seed for fold shuffling; unset means sequential chunking
    pub seed: Option<u64>,
}

impl TrainingParameters {
    /// Create parameters for the given model with defaults: no transformer,
    /// no selector, 5 folds, no shuffling.
    pub fn new(model: ModelSpec) -> Self {
        Self {
            transformer: None,
            selector: None,
            model,
            k_folds: 5,
            seed: None,
        }
    }

    /// Configure the transformation stage
    pub fn with_transformer(mut self, spec: TransformerSpec) -> Self {
        self.transformer = Some(spec);
        self
    }

    /// Configure the feature-selection stage
    pub fn with_selector(mut self, spec: SelectorSpec) -> Self {
        self.selector = Some(spec);
        self
    }

    /// Set the cross-validation fold count
    pub fn with_k_folds(mut self, k_folds: usize) -> Self {
        self.k_folds = k_folds;
        self
    }

    /// Set the fold-shuffling seed
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Reject configurations that cannot drive a cross-validated fit
    pub fn validate(&self) -> Result<()> {
        if self.k_folds < 2 {
            return Err(PipelineError::InvalidParameter {
                name: "k_folds".to_string(),
                value: self.k_folds.to_string(),
                reason: "cross-validation needs at least 2 folds".to_string(),
            });
        }
        Ok(())
    }
}
