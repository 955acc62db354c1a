//! Query/result cache keyed by image content and model.
//!
//! Two images with identical pixels share a key regardless of where they
//! live on disk, so a batch containing duplicates evaluates each distinct
//! image once per model.

use std::collections::HashMap;
use std::path::PathBuf;

use crate::types::ModelOutput;

/// Identifies one evaluation: this pixel content, run through this model.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct QueryKey {
    pub content_hash: String,
    pub model: String,
}

impl QueryKey {
    pub fn new(content_hash: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            content_hash: content_hash.into(),
            model: model.into(),
        }
    }
}

impl std::fmt::Display for QueryKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let short = self.content_hash.get(..12).unwrap_or(&self.content_hash);
        write!(f, "{}@{}", short, self.model)
    }
}

/// What the cache remembers about one evaluated key.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryRecord {
    /// Position in evaluation order, stable for the life of the cache
    pub ordinal: usize,

    /// Tags file written for this key, if any
    pub tags_file: Option<PathBuf>,

    /// Unfiltered model output, replayed through the current filters
    pub output: ModelOutput,
}

/// Evaluated keys for the current tagging run.
#[derive(Debug, Default)]
pub struct QueryCache {
    records: HashMap<QueryKey, QueryRecord>,
}

impl QueryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ordinal of a previously evaluated key.
    pub fn lookup(&self, key: &QueryKey) -> Option<usize> {
        self.records.get(key).map(|r| r.ordinal)
    }

    pub fn get(&self, key: &QueryKey) -> Option<&QueryRecord> {
        self.records.get(key)
    }

    pub fn contains(&self, key: &QueryKey) -> bool {
        self.records.contains_key(key)
    }

    /// Remember a fresh evaluation and return its ordinal.
    ///
    /// A key that is already present keeps its first output and ordinal.
    pub fn record(&mut self, key: QueryKey, output: ModelOutput) -> usize {
        let next = self.records.len();
        self.records
            .entry(key)
            .or_insert(QueryRecord {
                ordinal: next,
                tags_file: None,
                output,
            })
            .ordinal
    }

    /// Note the tags file written for a key.
    pub fn set_tags_file(&mut self, key: &QueryKey, path: PathBuf) {
        if let Some(record) = self.records.get_mut(key) {
            record.tags_file = Some(path);
        }
    }

    pub fn clear(&mut self) {
        self.records.clear();
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn output(tag: &str, confidence: f32) -> ModelOutput {
        ModelOutput::new(
            Default::default(),
            [(tag.to_string(), confidence)].into_iter().collect(),
        )
    }

    #[test]
    fn test_record_then_lookup() {
        let mut cache = QueryCache::new();
        let key = QueryKey::new("abc", "wd14");
        assert_eq!(cache.lookup(&key), None);

        assert_eq!(cache.record(key.clone(), output("smile", 0.4)), 0);
        assert_eq!(cache.lookup(&key), Some(0));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_record_existing_key_keeps_first_output() {
        let mut cache = QueryCache::new();
        let key = QueryKey::new("abc", "wd14");
        cache.record(key.clone(), output("smile", 0.4));
        cache.record(QueryKey::new("def", "wd14"), output("solo", 0.9));

        assert_eq!(cache.record(key.clone(), output("smile", 0.9)), 0);
        assert_eq!(cache.get(&key).unwrap().output.tags["smile"], 0.4);
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn test_struct_key_has_no_concatenation_collisions() {
        let mut cache = QueryCache::new();
        cache.record(QueryKey::new("ab", "c"), output("x", 0.5));
        assert!(!cache.contains(&QueryKey::new("a", "bc")));
    }

    #[test]
    fn test_same_content_different_model_is_a_new_key() {
        let mut cache = QueryCache::new();
        cache.record(QueryKey::new("abc", "wd14"), output("x", 0.5));
        assert_eq!(cache.lookup(&QueryKey::new("abc", "deepdanbooru")), None);
    }

    #[test]
    fn test_tags_file_and_clear() {
        let mut cache = QueryCache::new();
        let key = QueryKey::new("abc", "wd14");
        cache.record(key.clone(), output("x", 0.5));
        cache.set_tags_file(&key, PathBuf::from("/out/a.txt"));
        assert_eq!(
            cache.get(&key).unwrap().tags_file,
            Some(PathBuf::from("/out/a.txt"))
        );

        cache.clear();
        assert!(cache.is_empty());
        assert_eq!(cache.lookup(&key), None);
    }
}
