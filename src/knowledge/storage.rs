//! Storage backends for knowledge bases
//!
//! A knowledge base is persisted as one JSON document per name. The backend
//! choice (in-memory vs. disk-backed) is external configuration carried by
//! [`StorageConfig`]; the core only issues whole-document `save`/`load`/
//! `delete` operations.

use super::KnowledgeBase;
use crate::error::{PipelineError, Result};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

/// Whole-document persistence for knowledge bases
pub trait StorageBackend: Send + Sync {
    /// Persist a knowledge base under `name`, overwriting any prior state
    fn save(&self, name: &str, knowledge: &KnowledgeBase) -> Result<()>;

    /// Load the knowledge base stored under `name`, if any
    fn load(&self, name: &str) -> Result<Option<KnowledgeBase>>;

    /// True when a knowledge base is stored under `name`
    fn exists(&self, name: &str) -> bool;

    /// Remove the knowledge base stored under `name`
    fn delete(&self, name: &str) -> Result<()>;
}

/// Backend configuration: the opaque database-configuration object handed to
/// an orchestrator at construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum StorageConfig {
    /// Process-local storage, lost on drop
    InMemory,
    /// One JSON file per knowledge-base name under `base_dir`
    LocalDisk { base_dir: PathBuf },
}

impl StorageConfig {
    /// Construct the configured backend
    pub fn connect(&self) -> Arc<dyn StorageBackend> {
        match self {
            StorageConfig::InMemory => Arc::new(InMemoryStorage::new()),
            StorageConfig::LocalDisk { base_dir } => Arc::new(LocalStorage::new(base_dir.clone())),
        }
    }
}

/// Process-local backend backed by a locked map
#[derive(Default)]
pub struct InMemoryStorage {
    entries: RwLock<HashMap<String, KnowledgeBase>>,
}

impl InMemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl StorageBackend for InMemoryStorage {
    fn save(&self, name: &str, knowledge: &KnowledgeBase) -> Result<()> {
        self.entries
            .write()
            .insert(name.to_string(), knowledge.clone());
        Ok(())
    }

    fn load(&self, name: &str) -> Result<Option<KnowledgeBase>> {
        Ok(self.entries.read().get(name).cloned())
    }

    fn exists(&self, name: &str) -> bool {
        self.entries.read().contains_key(name)
    }

    fn delete(&self, name: &str) -> Result<()> {
        self.entries.write().remove(name);
        Ok(())
    }
}

/// Disk-backed backend: one JSON file per knowledge-base name
pub struct LocalStorage {
    base_dir: PathBuf,
}

impl LocalStorage {
    pub fn new(base_dir: PathBuf) -> Self {
        Self { base_dir }
    }

    fn path_for(&self, name: &str) -> PathBuf {
        self.base_dir.join(format!("{name}.json"))
    }
}

impl StorageBackend for LocalStorage {
    fn save(&self, name: &str, knowledge: &KnowledgeBase) -> Result<()> {
        fs::create_dir_all(&self.base_dir)?;
        let json = serde_json::to_string_pretty(knowledge)?;
        fs::write(self.path_for(name), json)?;
        Ok(())
    }

    fn load(&self, name: &str) -> Result<Option<KnowledgeBase>> {
        let path = self.path_for(name);
        if !path.exists() {
            return Ok(None);
        }
        let json = fs::read_to_string(&path)?;
        let knowledge = serde_json::from_str(&json).map_err(|e| {
            PipelineError::SerializationError(format!(
                "corrupt knowledge base at {}: {e}",
                path.display()
            ))
        })?;
        Ok(Some(knowledge))
    }

    fn exists(&self, name: &str) -> bool {
        self.path_for(name).exists()
    }

    fn delete(&self, name: &str) -> Result<()> {
        let path = self.path_for(name);
        if path.exists() {
            fs::remove_file(path)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::TrainingParameters;
    use crate::stages::ModelSpec;

    fn sample_knowledge() -> KnowledgeBase {
        KnowledgeBase::new(TrainingParameters::new(ModelSpec::Majority))
    }

    #[test]
    fn test_in_memory_round_trip() {
        let storage = InMemoryStorage::new();
        assert!(!storage.exists("kb"));

        storage.save("kb", &sample_knowledge()).unwrap();
        assert!(storage.exists("kb"));

        let loaded = storage.load("kb").unwrap().unwrap();
        assert_eq!(loaded.parameters.k_folds, 5);

        storage.delete("kb").unwrap();
        assert!(!storage.exists("kb"));
        assert!(storage.load("kb").unwrap().is_none());
    }

    #[test]
    fn test_local_storage_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalStorage::new(dir.path().to_path_buf());

        storage.save("kb", &sample_knowledge()).unwrap();
        assert!(storage.exists("kb"));

        let loaded = storage.load("kb").unwrap().unwrap();
        assert_eq!(loaded.parameters.model, ModelSpec::Majority);

        storage.delete("kb").unwrap();
        assert!(!storage.exists("kb"));
    }

    #[test]
    fn test_load_missing_is_none_not_error() {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalStorage::new(dir.path().to_path_buf());
        assert!(storage.load("absent").unwrap().is_none());
    }
}
