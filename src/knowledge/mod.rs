//! Persisted knowledge bases
//!
//! A [`KnowledgeBase`] binds one orchestrator instance to its training
//! parameters and to at most one fitted instance of each stage. It is
//! created when the orchestrator is constructed, populated either by a fit
//! or by a lazy load of previously persisted state, and saved exactly once
//! at the end of a successful fit.

mod storage;

pub use storage::{InMemoryStorage, LocalStorage, StorageBackend, StorageConfig};

use crate::pipeline::TrainingParameters;
use crate::stages::{ModelStage, SelectorStage, TransformerStage};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The persisted unit of state for one orchestrator
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KnowledgeBase {
    /// Configuration of the fit that produced (or will produce) this state
    pub parameters: TrainingParameters,
    /// Fitted transformer, when the configuration has one
    pub transformer: Option<TransformerStage>,
    /// Fitted selector, when the configuration has one
    pub selector: Option<SelectorStage>,
    /// Fitted model
    pub model: Option<ModelStage>,
    /// When the fit that produced this state completed
    pub trained_at: Option<DateTime<Utc>>,
}

impl KnowledgeBase {
    /// Fresh, untrained knowledge base for the given parameters
    pub fn new(parameters: TrainingParameters) -> Self {
        Self {
            parameters,
            transformer: None,
            selector: None,
            model: None,
            trained_at: None,
        }
    }

    /// True once a successful fit has populated the model
    pub fn is_trained(&self) -> bool {
        self.model.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stages::ModelSpec;

    #[test]
    fn test_fresh_knowledge_base_is_untrained() {
        let kb = KnowledgeBase::new(TrainingParameters::new(ModelSpec::Majority));
        assert!(!kb.is_trained());
        assert!(kb.trained_at.is_none());
    }

    #[test]
    fn test_serde_round_trip_preserves_parameters() {
        let kb = KnowledgeBase::new(TrainingParameters::new(ModelSpec::Majority).with_k_folds(3));
        let json = serde_json::to_string(&kb).unwrap();
        let restored: KnowledgeBase = serde_json::from_str(&json).unwrap();
        assert_eq!(restored.parameters.k_folds, 3);
        assert!(!restored.is_trained());
    }
}
