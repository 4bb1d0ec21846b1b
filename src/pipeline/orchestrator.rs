//! Training/prediction orchestrator
//!
//! [`SupervisedPipeline`] is the single entry point that sequences the
//! optional transformer, optional selector and model identically for
//! training and inference, and keeps the persisted knowledge base
//! consistent: one `save` at the end of a successful fit, one lazy `load`
//! behind a single guarded transition for every operation that needs prior
//! state.

use super::TrainingParameters;
use crate::dataset::{
    parse_from_text_files, parse_lines_from_file, Dataset, Record, RecordExtractor,
};
use crate::error::{PipelineError, Result};
use crate::knowledge::{KnowledgeBase, StorageBackend, StorageConfig};
use crate::metrics::ValidationMetrics;
use crate::stages::{Model, Selector, Transformer};
use crate::validation::CrossValidationEngine;
use chrono::Utc;
use parking_lot::{MappedMutexGuard, Mutex, MutexGuard};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

/// Knowledge-base residency for one orchestrator instance.
///
/// The only allowed transition is `Unloaded -> Loaded`, taken inside
/// [`SupervisedPipeline::ensure_loaded`] while holding the instance lock, so
/// concurrent `predict` calls cannot race the check-then-load sequence.
enum Residency {
    Unloaded,
    Loaded(KnowledgeBase),
}

/// Supervised-learning pipeline orchestrator
pub struct SupervisedPipeline {
    name: String,
    storage: Arc<dyn StorageBackend>,
    state: Mutex<Residency>,
}

impl SupervisedPipeline {
    /// Create an orchestrator bound to `name` on the configured backend.
    /// Prior persisted state under the same name is picked up lazily.
    pub fn new(name: impl Into<String>, config: &StorageConfig) -> Self {
        Self::with_storage(name, config.connect())
    }

    /// Create an orchestrator on an existing backend (lets several
    /// orchestrators share one in-memory store)
    pub fn with_storage(name: impl Into<String>, storage: Arc<dyn StorageBackend>) -> Self {
        Self {
            name: name.into(),
            storage,
            state: Mutex::new(Residency::Unloaded),
        }
    }

    /// Knowledge-base name this orchestrator is bound to
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Train the pipeline: transform, select, cross-validate, fit the model
    /// on the full dataset, attach the cross-validation estimate, then
    /// persist the knowledge base. Every stage must succeed before anything
    /// is persisted.
    pub fn fit(&self, mut dataset: Dataset, parameters: TrainingParameters) -> Result<()> {
        parameters.validate()?;
        if dataset.is_empty() {
            return Err(PipelineError::DataError(
                "cannot fit on an empty dataset".to_string(),
            ));
        }
        if !dataset.is_fully_labeled() {
            return Err(PipelineError::DataError(
                "training dataset contains unlabeled records".to_string(),
            ));
        }

        info!(
            pipeline = %self.name,
            n_records = dataset.len(),
            k_folds = parameters.k_folds,
            "fitting pipeline"
        );

        // A fresh fit overwrites any prior configuration
        let mut knowledge = KnowledgeBase::new(parameters);
        Self::fit_dataset_internal(&mut knowledge, &mut dataset)?;
        knowledge.trained_at = Some(Utc::now());

        self.storage.save(&self.name, &knowledge)?;
        *self.state.lock() = Residency::Loaded(knowledge);
        Ok(())
    }

    /// Legacy single-argument fit. Unsupported: use [`SupervisedPipeline::fit`].
    #[deprecated(note = "use fit(dataset, parameters)")]
    pub fn fit_dataset(&self, _dataset: Dataset) -> Result<()> {
        Err(PipelineError::DeprecatedCall(
            "fit_dataset(dataset) is not supported; use fit(dataset, parameters)".to_string(),
        ))
    }

    /// Train from labeled text files: one file per label, one record per
    /// non-empty line, features produced by `extractor`.
    pub fn fit_from_files(
        &self,
        sources: &BTreeMap<String, impl AsRef<Path>>,
        extractor: &dyn RecordExtractor,
        parameters: TrainingParameters,
    ) -> Result<()> {
        let dataset = parse_from_text_files(sources, extractor)?;
        self.fit(dataset, parameters)
    }

    /// Predict a label per record, in input order
    pub fn predict(&self, records: Vec<Record>) -> Result<Vec<String>> {
        let dataset = self.run_inference(records)?;
        dataset
            .records()
            .map(|r| {
                r.predicted.clone().ok_or_else(|| {
                    PipelineError::ValidationError(
                        "model left a record without a prediction".to_string(),
                    )
                })
            })
            .collect()
    }

    /// Predict a label-probability map per record, in input order
    pub fn predict_probabilities(&self, records: Vec<Record>) -> Result<Vec<BTreeMap<String, f64>>> {
        let dataset = self.run_inference(records)?;
        dataset
            .records()
            .map(|r| {
                r.predicted_probabilities.clone().ok_or_else(|| {
                    PipelineError::ValidationError(
                        "model left a record without predicted probabilities".to_string(),
                    )
                })
            })
            .collect()
    }

    /// Predict labels for one record per non-empty line of a text file
    pub fn predict_from_file(
        &self,
        path: impl AsRef<Path>,
        extractor: &dyn RecordExtractor,
    ) -> Result<Vec<String>> {
        let records = parse_lines_from_file(path, extractor)?;
        self.predict(records)
    }

    /// Re-evaluate the trained pipeline on new labeled data. Replays the
    /// same stage sequence as `predict`, then scores predicted against true
    /// labels. Distinct from the training-time cross-validation estimate.
    pub fn validate(&self, mut dataset: Dataset) -> Result<ValidationMetrics> {
        if !dataset.is_fully_labeled() {
            return Err(PipelineError::DataError(
                "validation dataset contains unlabeled records".to_string(),
            ));
        }

        let knowledge = self.ensure_loaded()?;
        Self::replay_transform_select(&knowledge, &mut dataset)?;

        let model = Self::resident_model(&knowledge)?;
        let metrics = model.validate(&mut dataset)?;

        if let Some(transformer) = &knowledge.transformer {
            transformer.denormalize(&mut dataset)?;
        }
        Ok(metrics)
    }

    /// The cross-validation estimate attached at fit time, forcing a
    /// knowledge-base load when the model is not resident
    pub fn validation_metrics(&self) -> Result<ValidationMetrics> {
        let knowledge = self.ensure_loaded()?;
        let model = Self::resident_model(&knowledge)?;
        model.validation_metrics().cloned().ok_or_else(|| {
            PipelineError::NotTrained(format!(
                "pipeline {:?} has no validation metrics",
                self.name
            ))
        })
    }

    /// The training parameters of the persisted fit
    pub fn training_parameters(&self) -> Result<TrainingParameters> {
        Ok(self.ensure_loaded()?.parameters.clone())
    }

    /// Delete the persisted knowledge base and forget the resident state.
    /// Ends the lifetime of the trained pipeline.
    pub fn delete(&self) -> Result<()> {
        let mut guard = self.state.lock();
        self.storage.delete(&self.name)?;
        *guard = Residency::Unloaded;
        Ok(())
    }

    /// Training-time stage sequence over one dataset, populating `knowledge`
    fn fit_dataset_internal(knowledge: &mut KnowledgeBase, dataset: &mut Dataset) -> Result<()> {
        let parameters = knowledge.parameters.clone();

        let mut transformer = parameters.transformer.as_ref().map(|spec| spec.instantiate());
        if let Some(transformer) = transformer.as_mut() {
            debug!("fitting transformer");
            transformer.fit_transform(dataset)?;
        }

        let mut selector = parameters.selector.as_ref().map(|spec| spec.instantiate());
        if let Some(selector) = selector.as_mut() {
            debug!("fitting selector");
            selector.fit(dataset)?;
            selector.transform(dataset)?;
        }

        // Cross-validation measures generalization; the final fit below uses
        // the whole dataset to maximize data usage. The reported metrics are
        // the cross-validation estimate, not an in-sample score.
        let average = CrossValidationEngine::run(
            &parameters.model,
            dataset,
            parameters.k_folds,
            parameters.seed,
        )?;

        let mut model = parameters.model.instantiate();
        model.fit(dataset)?;
        if let Some(average) = average {
            model.set_validation_metrics(average);
        }

        if let Some(transformer) = &transformer {
            transformer.denormalize(dataset)?;
        }

        knowledge.transformer = transformer;
        knowledge.selector = selector;
        knowledge.model = Some(model);
        Ok(())
    }

    /// Inference replay: fresh unlabeled dataset through the persisted
    /// transform -> select -> predict sequence, denormalized afterwards
    fn run_inference(&self, records: Vec<Record>) -> Result<Dataset> {
        let records = records
            .into_iter()
            .map(|mut record| {
                record.label = None;
                record.predicted = None;
                record.predicted_probabilities = None;
                record
            })
            .collect();
        let mut dataset = Dataset::from_records(records);

        let knowledge = self.ensure_loaded()?;
        Self::replay_transform_select(&knowledge, &mut dataset)?;

        let model = Self::resident_model(&knowledge)?;
        model.predict(&mut dataset)?;

        if let Some(transformer) = &knowledge.transformer {
            transformer.denormalize(&mut dataset)?;
        }
        Ok(dataset)
    }

    fn replay_transform_select(knowledge: &KnowledgeBase, dataset: &mut Dataset) -> Result<()> {
        if let Some(transformer) = &knowledge.transformer {
            transformer.transform(dataset)?;
        }
        if let Some(selector) = &knowledge.selector {
            selector.transform(dataset)?;
        }
        Ok(())
    }

    fn resident_model(knowledge: &KnowledgeBase) -> Result<&crate::stages::ModelStage> {
        knowledge.model.as_ref().ok_or_else(|| {
            PipelineError::NotTrained("knowledge base holds no fitted model".to_string())
        })
    }

    /// The single guarded residency transition. Loads the knowledge base
    /// from storage on first use; fails with `NotTrained` once the load
    /// confirms no persisted state exists. The lock is the single
    /// acquisition point that keeps concurrent callers from racing the
    /// check-then-load-then-cache sequence.
    fn ensure_loaded(&self) -> Result<MappedMutexGuard<'_, KnowledgeBase>> {
        let mut guard = self.state.lock();
        if matches!(*guard, Residency::Unloaded) {
            match self.storage.load(&self.name)? {
                Some(knowledge) => {
                    debug!(pipeline = %self.name, "loaded persisted knowledge base");
                    *guard = Residency::Loaded(knowledge);
                }
                None => {
                    return Err(PipelineError::NotTrained(format!(
                        "pipeline {:?} has never been fit and no persisted state exists",
                        self.name
                    )));
                }
            }
        }
        Ok(MutexGuard::map(guard, |state| match state {
            Residency::Loaded(knowledge) => knowledge,
            // ensure_loaded only returns with a resident knowledge base
            Residency::Unloaded => unreachable!(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::FeatureValue;
    use crate::stages::ModelSpec;

    fn labeled_record(x: f64, label: &str) -> Record {
        let mut features = BTreeMap::new();
        features.insert("x".to_string(), FeatureValue::Numeric(x));
        Record::labeled(features, label)
    }

    fn unlabeled_record(x: f64) -> Record {
        let mut features = BTreeMap::new();
        features.insert("x".to_string(), FeatureValue::Numeric(x));
        Record::new(features)
    }

    fn single_label_dataset(n: usize, label: &str) -> Dataset {
        Dataset::from_records((0..n).map(|i| labeled_record(i as f64, label)).collect())
    }

    #[test]
    fn test_predict_before_any_fit_is_not_trained() {
        let pipeline = SupervisedPipeline::new("untrained", &StorageConfig::InMemory);
        let result = pipeline.predict(vec![unlabeled_record(1.0)]);
        assert!(matches!(result, Err(PipelineError::NotTrained(_))));
    }

    #[test]
    fn test_deprecated_fit_always_fails() {
        let pipeline = SupervisedPipeline::new("legacy", &StorageConfig::InMemory);
        #[allow(deprecated)]
        let result = pipeline.fit_dataset(single_label_dataset(10, "a"));
        assert!(matches!(result, Err(PipelineError::DeprecatedCall(_))));
    }

    #[test]
    fn test_fit_rejects_k_folds_below_two() {
        let pipeline = SupervisedPipeline::new("bad-k", &StorageConfig::InMemory);
        let params = TrainingParameters::new(ModelSpec::Majority).with_k_folds(1);
        let result = pipeline.fit(single_label_dataset(10, "a"), params);
        assert!(matches!(result, Err(PipelineError::InvalidParameter { .. })));
    }

    #[test]
    fn test_failed_fit_persists_nothing() {
        let pipeline = SupervisedPipeline::new("no-partial", &StorageConfig::InMemory);
        // 3 records cannot fill 5 folds, so cross-validation fails mid-fit
        let result = pipeline.fit(
            single_label_dataset(3, "a"),
            TrainingParameters::new(ModelSpec::Majority),
        );
        assert!(result.is_err());
        assert!(matches!(
            pipeline.validation_metrics(),
            Err(PipelineError::NotTrained(_))
        ));
    }

    #[test]
    fn test_fit_then_predict_majority() {
        let pipeline = SupervisedPipeline::new("majority", &StorageConfig::InMemory);
        pipeline
            .fit(
                single_label_dataset(10, "A"),
                TrainingParameters::new(ModelSpec::Majority),
            )
            .unwrap();

        let predictions = pipeline.predict(vec![unlabeled_record(99.0)]).unwrap();
        assert_eq!(predictions, vec!["A".to_string()]);
    }
}
