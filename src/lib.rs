//! Pipelearn - Supervised-learning pipeline orchestration
//!
//! This crate sequences the stages of a supervised-learning workflow behind
//! one entry point:
//! - feature transformation and feature selection, applied identically at
//!   training and inference time
//! - k-fold cross-validation for an unbiased performance estimate
//! - a final model fit on the full dataset
//! - a persisted knowledge base that is saved once per successful fit and
//!   reloaded lazily on first use
//!
//! # Modules
//!
//! - [`pipeline`] - The [`SupervisedPipeline`] orchestrator and its
//!   [`TrainingParameters`]
//! - [`dataset`] - Records, feature maps, and text-file ingestion
//! - [`stages`] - Transformer / selector / model traits and the bundled
//!   reference stages
//! - [`validation`] - K-fold splitting and the cross-validation engine
//! - [`metrics`] - Validation metrics and their fold-averaging rules
//! - [`knowledge`] - The persisted knowledge base and storage backends
//! - [`error`] - The crate error type

pub mod dataset;
pub mod error;
pub mod knowledge;
pub mod metrics;
pub mod pipeline;
pub mod stages;
pub mod validation;

pub use error::{PipelineError, Result};
pub use pipeline::{SupervisedPipeline, TrainingParameters};

/// Commonly used types
pub mod prelude {
    pub use crate::dataset::{Dataset, FeatureValue, Record, RecordExtractor, TokenCountExtractor};
    pub use crate::error::{PipelineError, Result};
    pub use crate::knowledge::{KnowledgeBase, StorageConfig};
    pub use crate::metrics::ValidationMetrics;
    pub use crate::pipeline::{SupervisedPipeline, TrainingParameters};
    pub use crate::stages::{ModelSpec, SelectorSpec, TransformerSpec};
}
