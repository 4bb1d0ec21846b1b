//! K-fold cross-validation
//!
//! [`KFoldPlan`] partitions record ids into k nearly-equal disjoint groups;
//! [`CrossValidationEngine`] drives k independent train-on-k-1 /
//! validate-on-1 executions against fresh model instances and hands the
//! per-fold metrics to the aggregation protocol (base mean rule, then the
//! model family's additive extension).

use crate::dataset::Dataset;
use crate::error::{PipelineError, Result};
use crate::metrics::ValidationMetrics;
use crate::stages::{Model, ModelSpec, ModelStage};
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use tracing::debug;

/// One train/validation split of record ids
#[derive(Debug, Clone)]
pub struct FoldSplit {
    pub train_ids: Vec<usize>,
    pub validation_ids: Vec<usize>,
    pub fold_idx: usize,
}

/// Partition plan for k-fold cross-validation
#[derive(Debug, Clone)]
pub struct KFoldPlan {
    k: usize,
    seed: Option<u64>,
}

impl KFoldPlan {
    /// Create a plan with `k` folds and sequential chunking
    pub fn new(k: usize) -> Self {
        Self { k, seed: None }
    }

    /// Shuffle record ids with a seeded RNG before chunking
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Split `n_records` ids into k disjoint folds. Every id lands in
    /// exactly one validation group; each fold's training set is the
    /// complement of its validation group.
    pub fn split(&self, n_records: usize) -> Result<Vec<FoldSplit>> {
        if self.k < 2 {
            return Err(PipelineError::InvalidParameter {
                name: "k_folds".to_string(),
                value: self.k.to_string(),
                reason: "cross-validation needs at least 2 folds".to_string(),
            });
        }
        if n_records < self.k {
            return Err(PipelineError::ValidationError(format!(
                "n_records ({n_records}) must be >= k_folds ({})",
                self.k
            )));
        }

        let mut ids: Vec<usize> = (0..n_records).collect();
        if let Some(seed) = self.seed {
            let mut rng = ChaCha8Rng::seed_from_u64(seed);
            ids.shuffle(&mut rng);
        }

        let fold_sizes: Vec<usize> = (0..self.k)
            .map(|i| {
                let base = n_records / self.k;
                let remainder = n_records % self.k;
                if i < remainder {
                    base + 1
                } else {
                    base
                }
            })
            .collect();

        let mut splits = Vec::with_capacity(self.k);
        let mut current = 0;
        for fold_idx in 0..self.k {
            let fold_size = fold_sizes[fold_idx];
            let validation_ids: Vec<usize> = ids[current..current + fold_size].to_vec();
            let train_ids: Vec<usize> = ids[..current]
                .iter()
                .chain(ids[current + fold_size..].iter())
                .copied()
                .collect();

            splits.push(FoldSplit {
                train_ids,
                validation_ids,
                fold_idx,
            });
            current += fold_size;
        }

        Ok(splits)
    }
}

/// Combine per-fold metrics: the base mean rule first, then the model
/// family's additive extension. Empty input aggregates to `None`.
pub fn aggregate_folds(model: &ModelStage, folds: &[ValidationMetrics]) -> Option<ValidationMetrics> {
    let mut avg = ValidationMetrics::average(folds)?;
    model.extend_average(&mut avg, folds);
    Some(avg)
}

/// Drives k independent fold executions to a generalization estimate
pub struct CrossValidationEngine;

impl CrossValidationEngine {
    /// Run k-fold cross-validation of `spec` over `dataset`.
    ///
    /// Each fold fits a fresh model on its k-1 training groups and
    /// validates on its held-out group; fold-local models and datasets are
    /// discarded after their metrics are extracted. Folds run in parallel:
    /// they share no mutable state.
    pub fn run(
        spec: &ModelSpec,
        dataset: &Dataset,
        k: usize,
        seed: Option<u64>,
    ) -> Result<Option<ValidationMetrics>> {
        let mut plan = KFoldPlan::new(k);
        if let Some(seed) = seed {
            plan = plan.with_seed(seed);
        }
        let splits = plan.split(dataset.len())?;

        debug!(k, n_records = dataset.len(), "running k-fold cross-validation");

        let fold_metrics: Vec<ValidationMetrics> = splits
            .par_iter()
            .map(|split| {
                let train = dataset.subset(&split.train_ids);
                let mut validation = dataset.subset(&split.validation_ids);

                let mut model = spec.instantiate();
                model.fit(&train)?;
                let metrics = model.validate(&mut validation)?;
                debug!(
                    fold = split.fold_idx,
                    accuracy = ?metrics.accuracy,
                    "fold validated"
                );
                Ok(metrics)
            })
            .collect::<Result<Vec<_>>>()?;

        // A reference instance supplies the family's aggregation extension
        let reference = spec.instantiate();
        Ok(aggregate_folds(&reference, &fold_metrics))
    }
}

impl ModelSpec {
    /// Model-capability entry point: cross-validate this model family over
    /// the dataset, delegating to [`CrossValidationEngine`].
    pub fn k_fold_cross_validation(
        &self,
        dataset: &Dataset,
        k: usize,
        seed: Option<u64>,
    ) -> Result<Option<ValidationMetrics>> {
        CrossValidationEngine::run(self, dataset, k, seed)
    }
}
