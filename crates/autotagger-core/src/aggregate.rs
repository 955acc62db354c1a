//! Aggregate state for the current output window.
//!
//! Every output row remembers where its raw model outputs live rather than
//! its filtered tags. Finalizing replays each row through the current filter
//! chain, so rows carried over in cumulative mode always reflect the filters
//! as they are now, and a row served from the cache is byte-for-byte the
//! same as the evaluation it replays.

use std::collections::{HashMap, HashSet};
use std::path::PathBuf;

use crate::cache::{QueryCache, QueryKey};
use crate::filter::{FilterSettings, FilterSpec};
use crate::types::{
    sorted_tags, Confidences, DryRunReport, ModelOutput, QueryOutput, QueryStats, TagCount,
    TaggedImage,
};

/// Where a row's unfiltered output comes from.
#[derive(Debug, Clone, PartialEq)]
pub enum RowSource {
    /// One cache entry per model that evaluated the image
    Cached(Vec<QueryKey>),
    /// Output delivered by a streamed pass, which bypasses the cache
    Streamed(ModelOutput),
}

/// One output row of the window.
#[derive(Debug, Clone, PartialEq)]
pub struct AggregateRow {
    pub path: Option<PathBuf>,
    pub output_path: Option<PathBuf>,
    pub content_hash: Option<String>,
    pub source: RowSource,
}

impl AggregateRow {
    /// A row backed by cache entries.
    pub fn cached(
        path: Option<PathBuf>,
        output_path: Option<PathBuf>,
        content_hash: String,
        keys: Vec<QueryKey>,
    ) -> Self {
        Self {
            path,
            output_path,
            content_hash: Some(content_hash),
            source: RowSource::Cached(keys),
        }
    }

    /// A row carrying a streamed output directly.
    pub fn streamed(path: PathBuf, output_path: Option<PathBuf>, output: ModelOutput) -> Self {
        Self {
            path: Some(path),
            output_path,
            content_hash: None,
            source: RowSource::Streamed(output),
        }
    }

    /// Merged raw output across every model that evaluated this row.
    ///
    /// Returns `None` when none of the row's keys are cached any more.
    pub fn raw_output(&self, cache: &QueryCache) -> Option<ModelOutput> {
        match &self.source {
            RowSource::Streamed(output) => Some(output.clone()),
            RowSource::Cached(keys) => {
                let mut merged: Option<ModelOutput> = None;
                for record in keys.iter().filter_map(|k| cache.get(k)) {
                    match merged.as_mut() {
                        Some(m) => m.merge(&record.output),
                        None => merged = Some(record.output.clone()),
                    }
                }
                merged
            }
        }
    }

    /// Run the merged output through the filter chain.
    pub fn filtered(
        &self,
        cache: &QueryCache,
        filters: &FilterSpec,
        settings: &FilterSettings,
    ) -> Option<ModelOutput> {
        self.raw_output(cache)
            .map(|raw| filters.apply(settings, &raw))
    }

    fn keys(&self) -> &[QueryKey] {
        match &self.source {
            RowSource::Cached(keys) => keys,
            RowSource::Streamed(_) => &[],
        }
    }

    fn identity(&self) -> RowId {
        match &self.path {
            Some(path) => RowId::Path(path.clone()),
            None => RowId::Content(self.content_hash.clone()),
        }
    }
}

/// An image instance: its file when it has one, its content otherwise.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum RowId {
    Path(PathBuf),
    Content(Option<String>),
}

/// Window-level tags, ratings, counts and the rows they came from.
#[derive(Debug, Default)]
pub struct AggregateState {
    rows: Vec<AggregateRow>,
    index: HashMap<RowId, usize>,
    tags: Confidences,
    ratings: Confidences,
    counts: HashMap<String, usize>,
}

impl AggregateState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a new invocation.
    ///
    /// Tags, ratings and counts are always rebuilt from the rows at
    /// finalize time. Rows survive only in cumulative mode.
    pub fn begin(&mut self, cumulative: bool) {
        self.tags.clear();
        self.ratings.clear();
        self.counts.clear();
        if !cumulative {
            self.rows.clear();
            self.index.clear();
        }
    }

    /// Insert a row, or fold it into the row for the same image instance.
    ///
    /// An image instance is its path, or its content hash for an in-memory
    /// image. Resubmitting the same file adds no row, whether it came from a
    /// streamed pass or the per-image loop, while a byte-identical copy
    /// elsewhere does. A file whose content changed replaces its old output.
    pub fn push(&mut self, row: AggregateRow) -> usize {
        let identity = row.identity();
        match self.index.get(&identity).copied() {
            Some(i) => {
                let existing = &mut self.rows[i];
                if row.output_path.is_some() {
                    existing.output_path = row.output_path;
                }
                let same_content = row.content_hash.is_none()
                    || existing.content_hash.is_none()
                    || existing.content_hash == row.content_hash;
                if row.content_hash.is_some() {
                    existing.content_hash = row.content_hash;
                }
                match (&mut existing.source, row.source) {
                    (RowSource::Cached(keys), RowSource::Cached(new_keys)) if same_content => {
                        for key in new_keys {
                            if !keys.contains(&key) {
                                keys.push(key);
                            }
                        }
                    }
                    (source, new_source) => *source = new_source,
                }
                i
            }
            None => {
                self.index.insert(identity, self.rows.len());
                self.rows.push(row);
                self.rows.len() - 1
            }
        }
    }

    pub fn rows(&self) -> &[AggregateRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Aggregate tag confidences from the last finalize.
    pub fn tags(&self) -> &Confidences {
        &self.tags
    }

    /// Aggregate ratings from the last finalize.
    pub fn ratings(&self) -> &Confidences {
        &self.ratings
    }

    pub fn clear(&mut self) {
        self.rows.clear();
        self.index.clear();
        self.tags.clear();
        self.ratings.clear();
        self.counts.clear();
    }

    /// Fold one filtered row into the window totals.
    ///
    /// Tags keep their maximum confidence, ratings are last writer wins and
    /// every surviving tag is counted once for the row.
    fn accumulate(&mut self, filtered: &ModelOutput) {
        for (name, &confidence) in &filtered.tags {
            self.tags
                .entry(name.clone())
                .and_modify(|c| *c = c.max(confidence))
                .or_insert(confidence);
            *self.counts.entry(name.clone()).or_insert(0) += 1;
        }
        for (label, &confidence) in &filtered.ratings {
            self.ratings.insert(label.clone(), confidence);
        }
    }

    /// Replay every row through the filters and build the invocation output.
    ///
    /// `fresh` holds the keys evaluated during this invocation. A row is
    /// marked as cached unless it is the first row to use one of them.
    pub fn finalize(
        &mut self,
        cache: &QueryCache,
        filters: &FilterSpec,
        settings: &FilterSettings,
        fresh: &HashSet<QueryKey>,
        mut stats: QueryStats,
        dry_run: Option<DryRunReport>,
    ) -> QueryOutput {
        self.tags.clear();
        self.ratings.clear();
        self.counts.clear();

        let mut images = Vec::with_capacity(self.rows.len());
        let mut filtered_rows = Vec::with_capacity(self.rows.len());
        let mut claimed: HashSet<&QueryKey> = HashSet::new();
        for row in &self.rows {
            let Some(filtered) = row.filtered(cache, filters, settings) else {
                continue;
            };
            // The first row to use a fresh key owns that evaluation; later
            // rows with the same key were replayed.
            let mut cached = !row.keys().is_empty();
            for key in row.keys() {
                if fresh.contains(key) && claimed.insert(key) {
                    cached = false;
                }
            }
            images.push(TaggedImage {
                path: row.path.clone(),
                output_path: row.output_path.clone(),
                content_hash: row.content_hash.clone(),
                ratings: sorted_tags(&filtered.ratings),
                tags: sorted_tags(&filtered.tags),
                cached,
            });
            filtered_rows.push(filtered);
        }
        for filtered in &filtered_rows {
            self.accumulate(filtered);
        }

        stats.cached = images.iter().filter(|i| i.cached).count();

        let mut counts: Vec<TagCount> = self
            .counts
            .iter()
            .map(|(name, &count)| TagCount {
                name: name.clone(),
                count,
            })
            .collect();
        counts.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.name.cmp(&b.name)));

        QueryOutput {
            images,
            ratings: sorted_tags(&self.ratings),
            tags: sorted_tags(&self.tags),
            counts,
            stats,
            dry_run,
        }
    }
}
