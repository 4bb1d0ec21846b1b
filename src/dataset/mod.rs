//! Dataset and record data model
//!
//! Provides the in-memory data model consumed by every pipeline stage:
//! - [`FeatureValue`] - a single numeric, categorical or boolean value
//! - [`Record`] - one example: a feature map plus optional true/predicted labels
//! - [`Dataset`] - an ordered, uniquely-keyed collection of records with
//!   dataset-level feature/label metadata
//! - [`RecordExtractor`] - turns a raw text line into a feature map for the
//!   file-ingestion entry points

use crate::error::{PipelineError, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

/// A single feature value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FeatureValue {
    Numeric(f64),
    Categorical(String),
    Boolean(bool),
}

impl FeatureValue {
    /// Numeric view of the value, if it has one
    pub fn as_numeric(&self) -> Option<f64> {
        match self {
            FeatureValue::Numeric(v) => Some(*v),
            FeatureValue::Boolean(b) => Some(if *b { 1.0 } else { 0.0 }),
            FeatureValue::Categorical(_) => None,
        }
    }

    /// True for values that carry a numeric payload
    pub fn is_numeric(&self) -> bool {
        !matches!(self, FeatureValue::Categorical(_))
    }
}

/// One example: a feature map plus optional true label, predicted label and
/// predicted-probability map.
///
/// Records are mutated in place as they pass through stages; the predicted
/// fields are set only by a model's `predict`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Record {
    pub features: BTreeMap<String, FeatureValue>,
    pub label: Option<String>,
    pub predicted: Option<String>,
    pub predicted_probabilities: Option<BTreeMap<String, f64>>,
}

impl Record {
    /// Create an unlabeled record from a feature map
    pub fn new(features: BTreeMap<String, FeatureValue>) -> Self {
        Self {
            features,
            label: None,
            predicted: None,
            predicted_probabilities: None,
        }
    }

    /// Create a labeled record from a feature map
    pub fn labeled(features: BTreeMap<String, FeatureValue>, label: impl Into<String>) -> Self {
        Self {
            features,
            label: Some(label.into()),
            predicted: None,
            predicted_probabilities: None,
        }
    }
}

/// An ordered collection of records with stable ids (insertion index) and
/// dataset-level metadata: the set of known feature names and label values.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Dataset {
    records: Vec<Record>,
    feature_names: BTreeSet<String>,
    labels: BTreeSet<String>,
}

impl Dataset {
    /// Create an empty dataset
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a dataset from a list of records
    pub fn from_records(records: Vec<Record>) -> Self {
        let mut dataset = Self::new();
        for record in records {
            dataset.add(record);
        }
        dataset
    }

    /// Append a record, keeping the metadata sets in sync. Returns its id.
    pub fn add(&mut self, record: Record) -> usize {
        for name in record.features.keys() {
            self.feature_names.insert(name.clone());
        }
        if let Some(label) = &record.label {
            self.labels.insert(label.clone());
        }
        self.records.push(record);
        self.records.len() - 1
    }

    /// Number of records
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// True when the dataset holds no records
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Record by id
    pub fn get(&self, id: usize) -> Option<&Record> {
        self.records.get(id)
    }

    /// Iterate records in insertion order
    pub fn records(&self) -> impl Iterator<Item = &Record> {
        self.records.iter()
    }

    /// Iterate records mutably in insertion order
    pub fn records_mut(&mut self) -> impl Iterator<Item = &mut Record> {
        self.records.iter_mut()
    }

    /// Known feature names across all records
    pub fn feature_names(&self) -> &BTreeSet<String> {
        &self.feature_names
    }

    /// Known true-label values across all records
    pub fn labels(&self) -> &BTreeSet<String> {
        &self.labels
    }

    /// True when every record carries a true label
    pub fn is_fully_labeled(&self) -> bool {
        self.records.iter().all(|r| r.label.is_some())
    }

    /// Drop every feature not in `retained` from all records and from the
    /// feature-name metadata.
    pub fn retain_features(&mut self, retained: &BTreeSet<String>) {
        for record in &mut self.records {
            record.features.retain(|name, _| retained.contains(name));
        }
        self.feature_names.retain(|name| retained.contains(name));
    }

    /// Build a sub-dataset from record ids, preserving the given order
    pub fn subset(&self, ids: &[usize]) -> Dataset {
        let mut dataset = Dataset::new();
        for &id in ids {
            if let Some(record) = self.records.get(id) {
                dataset.add(record.clone());
            }
        }
        dataset
    }
}

/// Lowercase a raw line and collapse runs of non-alphanumeric characters
/// into single spaces.
pub fn clean_text(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut last_was_space = true;
    for ch in raw.chars() {
        if ch.is_alphanumeric() {
            out.extend(ch.to_lowercase());
            last_was_space = false;
        } else if !last_was_space {
            out.push(' ');
            last_was_space = true;
        }
    }
    while out.ends_with(' ') {
        out.pop();
    }
    out
}

/// Turns one raw text line into a feature map
pub trait RecordExtractor {
    fn extract(&self, line: &str) -> BTreeMap<String, FeatureValue>;
}

/// Default extractor: cleans the line and counts whitespace-separated tokens
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenCountExtractor {
    /// Tokens shorter than this are dropped
    pub min_token_len: usize,
}

impl Default for TokenCountExtractor {
    fn default() -> Self {
        Self { min_token_len: 1 }
    }
}

impl RecordExtractor for TokenCountExtractor {
    fn extract(&self, line: &str) -> BTreeMap<String, FeatureValue> {
        let cleaned = clean_text(line);
        let mut counts: BTreeMap<String, f64> = BTreeMap::new();
        for token in cleaned.split_whitespace() {
            if token.chars().count() >= self.min_token_len {
                *counts.entry(token.to_string()).or_insert(0.0) += 1.0;
            }
        }
        counts
            .into_iter()
            .map(|(token, count)| (token, FeatureValue::Numeric(count)))
            .collect()
    }
}

/// Parse labeled text files into a dataset: one file per label, one record
/// per non-empty line.
pub fn parse_from_text_files(
    sources: &BTreeMap<String, impl AsRef<Path>>,
    extractor: &dyn RecordExtractor,
) -> Result<Dataset> {
    let mut dataset = Dataset::new();
    for (label, path) in sources {
        let file = File::open(path.as_ref())?;
        for line in BufReader::new(file).lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            dataset.add(Record::labeled(extractor.extract(&line), label.clone()));
        }
    }
    if dataset.is_empty() {
        return Err(PipelineError::DataError(
            "no records parsed from the given sources".to_string(),
        ));
    }
    Ok(dataset)
}

/// Read one record per non-empty line from an unlabeled text file
pub fn parse_lines_from_file(
    path: impl AsRef<Path>,
    extractor: &dyn RecordExtractor,
) -> Result<Vec<Record>> {
    let file = File::open(path.as_ref())?;
    let mut records = Vec::new();
    for line in BufReader::new(file).lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        records.push(Record::new(extractor.extract(&line)));
    }
    Ok(records)
}
