//! The model registry: a JSON array of downloaded model artifacts.
//!
//! The registry lives at `<model_dir>/model.json`. Entries are appended when
//! a model is first downloaded and read back on every load so artifacts are
//! never fetched twice.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::PipelineError;

/// One downloaded model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegistryEntry {
    pub name: String,
    pub model_path: PathBuf,
    pub tags_path: PathBuf,
}

/// Reader and appender for the registry file.
#[derive(Debug, Clone)]
pub struct ModelRegistry {
    path: PathBuf,
}

impl ModelRegistry {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// All entries; a missing file is an empty registry.
    pub fn entries(&self) -> Result<Vec<RegistryEntry>, PipelineError> {
        if !self.path.exists() {
            return Ok(vec![]);
        }
        let content = std::fs::read_to_string(&self.path).map_err(|e| self.err(e))?;
        serde_json::from_str(&content).map_err(|e| self.err(e))
    }

    /// The entry for a model whose artifacts are still on disk.
    ///
    /// A registry that cannot be parsed is treated as empty so the caller
    /// falls back to downloading.
    pub fn find(&self, name: &str) -> Option<RegistryEntry> {
        let entries = match self.entries() {
            Ok(entries) => entries,
            Err(e) => {
                tracing::warn!("{}", e);
                return None;
            }
        };
        entries
            .into_iter()
            .rev()
            .find(|e| e.name == name && e.model_path.exists() && e.tags_path.exists())
    }

    /// Append an entry, creating the model directory if needed.
    ///
    /// A corrupt registry is replaced by a one-entry array.
    pub fn append(&self, entry: RegistryEntry) -> Result<(), PipelineError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| self.err(e))?;
        }

        let mut entries = match self.entries() {
            Ok(entries) => entries,
            Err(e) => {
                tracing::warn!("Resetting model registry: {}", e);
                vec![]
            }
        };
        entries.push(entry);

        let json = serde_json::to_string_pretty(&entries).map_err(|e| self.err(e))?;
        std::fs::write(&self.path, json).map_err(|e| self.err(e))
    }

    fn err(&self, e: impl std::fmt::Display) -> PipelineError {
        PipelineError::Registry {
            path: self.path.clone(),
            message: e.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(dir: &Path, name: &str) -> RegistryEntry {
        let model_path = dir.join(format!("{name}.onnx"));
        let tags_path = dir.join(format!("{name}.csv"));
        std::fs::write(&model_path, b"onnx").unwrap();
        std::fs::write(&tags_path, b"csv").unwrap();
        RegistryEntry {
            name: name.to_string(),
            model_path,
            tags_path,
        }
    }

    #[test]
    fn test_missing_registry_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let registry = ModelRegistry::new(dir.path().join("model.json"));
        assert!(registry.entries().unwrap().is_empty());
        assert!(registry.find("wd14").is_none());
    }

    #[test]
    fn test_append_then_find() {
        let dir = tempfile::tempdir().unwrap();
        let registry = ModelRegistry::new(dir.path().join("models").join("model.json"));
        registry.append(entry(dir.path(), "wd14")).unwrap();
        registry.append(entry(dir.path(), "convnext")).unwrap();

        assert_eq!(registry.entries().unwrap().len(), 2);
        assert_eq!(registry.find("convnext").unwrap().name, "convnext");
    }

    #[test]
    fn test_find_skips_entries_with_missing_files() {
        let dir = tempfile::tempdir().unwrap();
        let registry = ModelRegistry::new(dir.path().join("model.json"));
        let e = entry(dir.path(), "wd14");
        std::fs::remove_file(&e.model_path).unwrap();
        registry.append(e).unwrap();
        assert!(registry.find("wd14").is_none());
    }

    #[test]
    fn test_corrupt_registry_is_reset_on_append() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.json");
        std::fs::write(&path, "{not json").unwrap();
        let registry = ModelRegistry::new(&path);

        assert!(registry.entries().is_err());
        registry.append(entry(dir.path(), "wd14")).unwrap();
        assert_eq!(registry.entries().unwrap().len(), 1);
    }
}
