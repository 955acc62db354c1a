//! Core data types produced by the tagging engine.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::HashMap;
use std::path::PathBuf;

/// Label → confidence mapping as reported by a model.
pub type Confidences = HashMap<String, f32>;

/// Raw output of one model for one image.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelOutput {
    /// Rating label → confidence (general, sensitive, questionable, explicit)
    pub ratings: Confidences,

    /// Tag name → confidence
    pub tags: Confidences,
}

impl ModelOutput {
    pub fn new(ratings: Confidences, tags: Confidences) -> Self {
        Self { ratings, tags }
    }

    /// Fold another model's output for the same image into this one.
    ///
    /// Tags keep the maximum confidence seen; ratings are last writer wins.
    pub fn merge(&mut self, other: &ModelOutput) {
        for (name, &confidence) in &other.tags {
            self.tags
                .entry(name.clone())
                .and_modify(|c| *c = c.max(confidence))
                .or_insert(confidence);
        }
        for (label, &confidence) in &other.ratings {
            self.ratings.insert(label.clone(), confidence);
        }
    }
}

/// A tag (or rating) with its confidence score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tag {
    /// The tag label (e.g., "1girl", "outdoors", "general")
    pub name: String,

    /// Confidence score from 0.0 to 1.0
    pub confidence: f32,
}

impl Tag {
    /// Create a new tag with the given name and confidence.
    pub fn new(name: impl Into<String>, confidence: f32) -> Self {
        Self {
            name: name.into(),
            confidence,
        }
    }
}

/// Sort a confidence map into tags, highest confidence first.
///
/// Ties are broken by name so output is deterministic.
pub fn sorted_tags(map: &Confidences) -> Vec<Tag> {
    let mut tags: Vec<Tag> = map
        .iter()
        .map(|(name, &confidence)| Tag::new(name.clone(), confidence))
        .collect();
    tags.sort_by(|a, b| {
        b.confidence
            .partial_cmp(&a.confidence)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.name.cmp(&b.name))
    });
    tags
}

/// How many output rows a tag survived filtering in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagCount {
    pub name: String,
    pub count: usize,
}

/// Final tags of one image after filtering.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaggedImage {
    /// Source path (absent for in-memory images)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,

    /// Sidecar tags file (absent when no output location is configured)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_path: Option<PathBuf>,

    /// Content hash of the decoded pixels (absent for streamed rows)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_hash: Option<String>,

    /// Ratings, highest first
    pub ratings: Vec<Tag>,

    /// Filtered tags, highest first
    pub tags: Vec<Tag>,

    /// Whether this row was replayed from the query cache
    pub cached: bool,
}

impl TaggedImage {
    /// Tag names joined the way sidecar files store them.
    pub fn tag_line(&self) -> String {
        self.tags
            .iter()
            .map(|t| t.name.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// Counters for one orchestrator invocation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryStats {
    /// Model evaluations actually performed
    pub evaluated: usize,

    /// Rows served from the query cache
    pub cached: usize,

    /// Images skipped because they could not be read
    pub skipped: usize,

    /// Sidecar files written
    pub written: usize,
}

/// Paths touched by a large-batch dry run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DryRunReport {
    /// Paths handed to the batch reader, in input order
    pub scheduled: Vec<PathBuf>,

    /// Paths that were read and decoded successfully
    pub read: Vec<PathBuf>,
}

/// The finalized result of one interactive or batch invocation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryOutput {
    /// One row per output image, in input order
    pub images: Vec<TaggedImage>,

    /// Aggregate ratings across the window, highest first
    pub ratings: Vec<Tag>,

    /// Aggregate tags (max confidence across the window), highest first
    pub tags: Vec<Tag>,

    /// Tag frequency across the window, most frequent first
    pub counts: Vec<TagCount>,

    /// Invocation counters
    pub stats: QueryStats,

    /// Present when the invocation was a large-batch dry run
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dry_run: Option<DryRunReport>,
}

impl QueryOutput {
    /// Aggregate tag names joined by `", "`.
    pub fn tag_line(&self) -> String {
        self.tags
            .iter()
            .map(|t| t.name.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// Count for a tag, zero when it never survived filtering.
    pub fn count_of(&self, name: &str) -> usize {
        self.counts
            .iter()
            .find(|c| c.name == name)
            .map(|c| c.count)
            .unwrap_or(0)
    }
}
