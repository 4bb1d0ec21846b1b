//! Pipeline stage capability contracts
//!
//! The orchestrator depends on three polymorphic capability sets:
//! [`Transformer`] (fit/transform/denormalize a dataset in place),
//! [`Selector`] (fit a retained-feature set, then prune a dataset) and
//! [`Model`] (fit, predict in place, validate, and self-report its own
//! cross-fold aggregation extension).
//!
//! Configuration carries a spec enum (tag + parameter payload); the spec's
//! `instantiate` is the factory that maps tag to a fresh, unfitted stage.
//! Fitted stages are wrapped in serializable enum-dispatch types
//! ([`TransformerStage`], [`SelectorStage`], [`ModelStage`]) so the
//! knowledge base can persist them and restore object identity on load.

mod model;
mod selector;
mod transformer;

pub use model::{MajorityClassifier, OrdinalClassifier, OrdinalParams};
pub use selector::{FrequencyParams, FrequencySelector};
pub use transformer::MinMaxNormalizer;

use crate::dataset::Dataset;
use crate::error::Result;
use crate::metrics::ValidationMetrics;
use serde::{Deserialize, Serialize};

/// Fit/transform/inverse-transform capability for reversible dataset encoding
pub trait Transformer {
    /// Fit internal state on the dataset, then apply it in place
    fn fit_transform(&mut self, dataset: &mut Dataset) -> Result<()>;

    /// Apply already-fitted state in place
    fn transform(&self, dataset: &mut Dataset) -> Result<()>;

    /// Reverse the reversible part of the encoding in place
    fn denormalize(&self, dataset: &mut Dataset) -> Result<()>;
}

/// Feature-retention capability: fit a retained set, then prune datasets
pub trait Selector {
    /// Determine the retained-feature set from the dataset
    fn fit(&mut self, dataset: &Dataset) -> Result<()>;

    /// Prune non-retained features from every record
    fn transform(&self, dataset: &mut Dataset) -> Result<()>;
}

/// Supervised model capability
pub trait Model {
    /// Fit the model on a fully labeled dataset
    fn fit(&mut self, dataset: &Dataset) -> Result<()>;

    /// Set the predicted label and probability map on every record
    fn predict(&self, dataset: &mut Dataset) -> Result<()>;

    /// Predict, then score predicted against true labels
    fn validate(&self, dataset: &mut Dataset) -> Result<ValidationMetrics>;

    /// Additively extend the base cross-fold aggregate with fields whose
    /// combination rule is family-specific. Called after
    /// [`ValidationMetrics::average`]; must not clobber base fields.
    fn extend_average(&self, _avg: &mut ValidationMetrics, _folds: &[ValidationMetrics]) {}

    /// Metrics attached to this fitted model, if any
    fn validation_metrics(&self) -> Option<&ValidationMetrics>;

    /// Attach metrics to this fitted model
    fn set_validation_metrics(&mut self, metrics: ValidationMetrics);
}

/// Transformer selection plus its stage-specific parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TransformerSpec {
    /// Reversible per-feature min/max scaling of numeric values
    MinMax,
}

impl TransformerSpec {
    /// Factory: fresh, unfitted transformer for this spec
    pub fn instantiate(&self) -> TransformerStage {
        match self {
            TransformerSpec::MinMax => TransformerStage::MinMax(MinMaxNormalizer::new()),
        }
    }
}

/// Selector selection plus its stage-specific parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SelectorSpec {
    /// Retain features by record-occurrence count
    Frequency(FrequencyParams),
}

impl SelectorSpec {
    /// Factory: fresh, unfitted selector for this spec.
    ///
    /// The orchestrator always evaluates every feature type for retention,
    /// so the selector's numeric-feature bias is forced off here regardless
    /// of what the caller configured.
    pub fn instantiate(&self) -> SelectorStage {
        match self {
            SelectorSpec::Frequency(params) => {
                let mut params = params.clone();
                params.ignore_numeric = false;
                SelectorStage::Frequency(FrequencySelector::new(params))
            }
        }
    }
}

/// Model selection plus its stage-specific parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ModelSpec {
    /// Baseline: always predicts the most frequent training label
    Majority,
    /// Nearest centroid over an ordered label scale
    Ordinal(OrdinalParams),
}

impl ModelSpec {
    /// Factory: fresh, unfitted model for this spec
    pub fn instantiate(&self) -> ModelStage {
        match self {
            ModelSpec::Majority => ModelStage::Majority(MajorityClassifier::new()),
            ModelSpec::Ordinal(params) => {
                ModelStage::Ordinal(OrdinalClassifier::new(params.clone()))
            }
        }
    }
}

/// Serializable wrapper around a fitted transformer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum TransformerStage {
    MinMax(MinMaxNormalizer),
}

impl Transformer for TransformerStage {
    fn fit_transform(&mut self, dataset: &mut Dataset) -> Result<()> {
        match self {
            TransformerStage::MinMax(t) => t.fit_transform(dataset),
        }
    }

    fn transform(&self, dataset: &mut Dataset) -> Result<()> {
        match self {
            TransformerStage::MinMax(t) => t.transform(dataset),
        }
    }

    fn denormalize(&self, dataset: &mut Dataset) -> Result<()> {
        match self {
            TransformerStage::MinMax(t) => t.denormalize(dataset),
        }
    }
}

/// Serializable wrapper around a fitted selector
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum SelectorStage {
    Frequency(FrequencySelector),
}

impl Selector for SelectorStage {
    fn fit(&mut self, dataset: &Dataset) -> Result<()> {
        match self {
            SelectorStage::Frequency(s) => s.fit(dataset),
        }
    }

    fn transform(&self, dataset: &mut Dataset) -> Result<()> {
        match self {
            SelectorStage::Frequency(s) => s.transform(dataset),
        }
    }
}

/// Serializable wrapper around a fitted model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ModelStage {
    Majority(MajorityClassifier),
    Ordinal(OrdinalClassifier),
}

impl Model for ModelStage {
    fn fit(&mut self, dataset: &Dataset) -> Result<()> {
        match self {
            ModelStage::Majority(m) => m.fit(dataset),
            ModelStage::Ordinal(m) => m.fit(dataset),
        }
    }

    fn predict(&self, dataset: &mut Dataset) -> Result<()> {
        match self {
            ModelStage::Majority(m) => m.predict(dataset),
            ModelStage::Ordinal(m) => m.predict(dataset),
        }
    }

    fn validate(&self, dataset: &mut Dataset) -> Result<ValidationMetrics> {
        match self {
            ModelStage::Majority(m) => m.validate(dataset),
            ModelStage::Ordinal(m) => m.validate(dataset),
        }
    }

    fn extend_average(&self, avg: &mut ValidationMetrics, folds: &[ValidationMetrics]) {
        match self {
            ModelStage::Majority(m) => m.extend_average(avg, folds),
            ModelStage::Ordinal(m) => m.extend_average(avg, folds),
        }
    }

    fn validation_metrics(&self) -> Option<&ValidationMetrics> {
        match self {
            ModelStage::Majority(m) => m.validation_metrics(),
            ModelStage::Ordinal(m) => m.validation_metrics(),
        }
    }

    fn set_validation_metrics(&mut self, metrics: ValidationMetrics) {
        match self {
            ModelStage::Majority(m) => m.set_validation_metrics(metrics),
            ModelStage::Ordinal(m) => m.set_validation_metrics(metrics),
        }
    }
}
