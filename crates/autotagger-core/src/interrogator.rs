//! The orchestrator: drives adapters over a [`TaggingSession`].
//!
//! Every invocation walks the same states: resolve the image set, then per
//! image hash, check the cache, evaluate on a miss, and write the tags file;
//! finally the aggregate window is replayed through the current filters.
//! A single streaming-capable model additionally alternates between a dry
//! run and a live run of the large-batch mode.

use image::DynamicImage;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use crate::adapter::{ModelAdapter, StreamSink};
use crate::aggregate::{AggregateRow, AggregateState};
use crate::cache::{QueryCache, QueryKey};
use crate::config::{Config, PipelineConfig};
use crate::error::{PipelineError, RunError, StreamError};
use crate::filter::{FilterSettings, FilterSpec};
use crate::pipeline::sidecar::{self, READ_LOG, SCHEDULED_LOG};
use crate::pipeline::{Hasher, ImageDecoder, ImageRecord};
use crate::session::{Flag, TaggingSession};
use crate::types::{sorted_tags, DryRunReport, ModelOutput, QueryOutput, QueryStats};

/// Large-batch mode of an interrogator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    /// The next large batch only reads and validates its inputs
    DryRun,
    /// The next large batch runs the model
    Live,
    /// Large batches go through the per-image loop
    Disabled,
}

impl RunMode {
    fn toggled(self) -> Self {
        match self {
            RunMode::DryRun => RunMode::Live,
            RunMode::Live => RunMode::DryRun,
            RunMode::Disabled => RunMode::Disabled,
        }
    }
}

impl std::fmt::Display for RunMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RunMode::DryRun => write!(f, "dry run"),
            RunMode::Live => write!(f, "live"),
            RunMode::Disabled => write!(f, "disabled"),
        }
    }
}

/// Runs one or more models over a session's images.
pub struct Interrogator {
    adapters: Vec<Box<dyn ModelAdapter>>,
    mode: RunMode,
    decoder: ImageDecoder,
    pipeline: PipelineConfig,
}

impl Interrogator {
    /// Interrogator for a single model.
    pub fn new(adapter: Box<dyn ModelAdapter>, config: &Config) -> Self {
        Self::ensemble(vec![adapter], config)
    }

    /// Interrogator merging several models per image.
    ///
    /// Large-batch streaming is only available with exactly one model
    /// that exposes the capability.
    pub fn ensemble(mut adapters: Vec<Box<dyn ModelAdapter>>, config: &Config) -> Self {
        let streams = adapters.len() == 1 && adapters.iter_mut().all(|a| a.streaming().is_some());
        let mode = if streams {
            RunMode::DryRun
        } else {
            RunMode::Disabled
        };
        Self {
            adapters,
            mode,
            decoder: ImageDecoder::new(config.limits.clone()),
            pipeline: config.pipeline.clone(),
        }
    }

    pub fn mode(&self) -> RunMode {
        self.mode
    }

    pub fn model_names(&self) -> Vec<&str> {
        self.adapters.iter().map(|a| a.name()).collect()
    }

    /// Unload every model. Each entry reports whether memory was freed.
    pub fn unload(&mut self) -> Vec<(String, bool)> {
        self.adapters
            .iter_mut()
            .map(|adapter| {
                let released = adapter.unload();
                tracing::debug!("Unload {}: released={}", adapter.name(), released);
                (adapter.name().to_string(), released)
            })
            .collect()
    }

    /// Tag one in-memory image.
    ///
    /// Outside cumulative mode each query starts from an empty cache and
    /// window.
    pub fn interrogate_image(
        &mut self,
        session: &mut TaggingSession,
        image: &DynamicImage,
    ) -> Result<QueryOutput, RunError> {
        let result = self.run_single(session, image);
        self.settle(session, result)
    }

    /// Tag every image resolved from the session's input glob.
    pub fn batch_interrogate(
        &mut self,
        session: &mut TaggingSession,
    ) -> Result<QueryOutput, RunError> {
        let result = self.run_batch(session);
        self.settle(session, result)
    }

    fn settle(
        &mut self,
        session: &mut TaggingSession,
        result: Result<QueryOutput, RunError>,
    ) -> Result<QueryOutput, RunError> {
        if session.flag(Flag::UnloadAfter) {
            self.unload();
        }
        match &result {
            Ok(output) => session.set_last_output(output.clone()),
            Err(e) => {
                tracing::warn!("Run failed: {}", e);
                session.clear_last_output();
            }
        }
        result
    }

    fn run_single(
        &mut self,
        session: &mut TaggingSession,
        image: &DynamicImage,
    ) -> Result<QueryOutput, RunError> {
        if self.adapters.is_empty() {
            return Err(RunError::NoModels);
        }
        let cumulative = session.flag(Flag::Cumulative);
        let parts = session.parts_mut();
        if !cumulative {
            parts.cache.clear();
        }
        parts.aggregate.begin(cumulative);

        let mut stats = QueryStats::default();
        let mut fresh = HashSet::new();
        let hash = Hasher::pixel_hash(image);
        let keys = self.evaluate_all(&hash, image, parts.cache, &mut fresh, &mut stats)?;
        parts
            .aggregate
            .push(AggregateRow::cached(None, None, hash, keys));

        Ok(parts.aggregate.finalize(
            parts.cache,
            parts.filters,
            parts.settings,
            &fresh,
            stats,
            None,
        ))
    }

    fn run_batch(&mut self, session: &mut TaggingSession) -> Result<QueryOutput, RunError> {
        if self.adapters.is_empty() {
            return Err(RunError::NoModels);
        }
        if session.images().is_empty() {
            return Err(RunError::NoInput);
        }
        if session.flag(Flag::LargeQuery) && self.mode != RunMode::Disabled {
            return self.run_streamed(session);
        }

        let cumulative = session.flag(Flag::Cumulative);
        let parts = session.parts_mut();
        parts.aggregate.begin(cumulative);
        let store_images = parts.resolver.store_images();

        let mut stats = QueryStats::default();
        let mut fresh = HashSet::new();
        tracing::info!("Tagging {} images", parts.images.len());

        for record in parts.images.iter_mut() {
            let keys = match self.replay_keys(record.content_hash.as_deref(), parts.cache) {
                Some(keys) => {
                    tracing::trace!("Replaying {:?} without decoding", record.path);
                    keys
                }
                None => {
                    let image = match self.image_for(record) {
                        Ok(image) => image,
                        Err(e) => {
                            tracing::warn!("Skipping {:?}: {}", record.path, e);
                            stats.skipped += 1;
                            continue;
                        }
                    };
                    let hash = Hasher::pixel_hash(&image);
                    tracing::debug!("{:?} -> {}", record.path, &hash[..12]);
                    record.content_hash = Some(hash.clone());
                    let keys =
                        self.evaluate_all(&hash, &image, parts.cache, &mut fresh, &mut stats)?;
                    if store_images {
                        record.image = Some(image);
                    }
                    keys
                }
            };

            let Some(hash) = record.content_hash.clone() else {
                continue;
            };
            let row = AggregateRow::cached(
                Some(record.path.clone()),
                record.output_path.clone(),
                hash,
                keys.clone(),
            );
            if let Some(output_path) = record.output_path.clone() {
                let written = write_row(
                    record,
                    &output_path,
                    row.filtered(parts.cache, parts.filters, parts.settings),
                );
                if written {
                    stats.written += 1;
                    for key in &keys {
                        parts.cache.set_tags_file(key, output_path.clone());
                    }
                }
            }
            parts.aggregate.push(row);
        }

        tracing::info!(
            "Evaluated {} images, skipped {}, wrote {} tags files",
            stats.evaluated,
            stats.skipped,
            stats.written
        );
        Ok(parts.aggregate.finalize(
            parts.cache,
            parts.filters,
            parts.settings,
            &fresh,
            stats,
            None,
        ))
    }

    /// One alternation step of the large-batch mode.
    fn run_streamed(&mut self, session: &mut TaggingSession) -> Result<QueryOutput, RunError> {
        let dry_run = self.mode == RunMode::DryRun;
        let cumulative = session.flag(Flag::Cumulative);
        let parts = session.parts_mut();
        parts.aggregate.begin(cumulative);

        let paths: Vec<PathBuf> = parts.images.iter().map(|r| r.path.clone()).collect();
        let mut targets = HashMap::with_capacity(parts.images.len());
        for record in parts.images.iter_mut() {
            if !dry_run {
                if let Some(dir) = record.take_output_dir() {
                    if let Err(e) = sidecar::ensure_dir(&dir) {
                        tracing::warn!("{}", e);
                    }
                }
            }
            targets.insert(record.path.clone(), record.output_path.clone());
        }

        let names = self.model_names().join(",");
        tracing::info!("Streaming {} images through {} ({})", paths.len(), names, self.mode);
        let mut sink = RunSink {
            targets,
            filters: parts.filters,
            settings: parts.settings,
            aggregate: &mut *parts.aggregate,
            report: DryRunReport::default(),
            stats: QueryStats::default(),
        };

        let result = match self.adapters.first_mut().and_then(|a| a.streaming()) {
            Some(streaming) => streaming.evaluate_stream(&paths, dry_run, &mut sink),
            None => Err(StreamError::Model(PipelineError::Inference {
                model: names,
                message: "model does not support large batches".to_string(),
            })),
        };

        let RunSink { report, stats, .. } = sink;
        if dry_run {
            self.write_dry_run_logs(&report)?;
        }
        result?;

        self.mode = self.mode.toggled();
        tracing::info!(
            "Stream finished: {} scheduled, {} read, {} evaluated; next run is {}",
            report.scheduled.len(),
            report.read.len(),
            stats.evaluated,
            self.mode
        );
        Ok(parts.aggregate.finalize(
            parts.cache,
            parts.filters,
            parts.settings,
            &HashSet::new(),
            stats,
            dry_run.then_some(report),
        ))
    }

    fn write_dry_run_logs(&self, report: &DryRunReport) -> Result<(), StreamError> {
        let Some(dir) = &self.pipeline.dry_run_log_dir else {
            return Ok(());
        };
        let dir = PathBuf::from(shellexpand::tilde(&dir.to_string_lossy()).into_owned());
        for (name, entries) in [(SCHEDULED_LOG, &report.scheduled), (READ_LOG, &report.read)] {
            let path = dir.join(name);
            sidecar::write_path_log(&path, entries)
                .map_err(|source| StreamError::Log { path, source })?;
        }
        Ok(())
    }

    /// Keys for an already hashed image whose every model result is cached.
    fn replay_keys(&self, hash: Option<&str>, cache: &QueryCache) -> Option<Vec<QueryKey>> {
        let hash = hash?;
        let keys: Vec<QueryKey> = self
            .adapters
            .iter()
            .map(|a| QueryKey::new(hash, a.name()))
            .collect();
        keys.iter().all(|k| cache.contains(k)).then_some(keys)
    }

    fn image_for(&self, record: &mut ImageRecord) -> Result<DynamicImage, PipelineError> {
        match record.image.take() {
            Some(image) => Ok(image),
            None => self.decoder.decode(&record.path),
        }
    }

    /// Evaluate every model that has no cached result for this content.
    fn evaluate_all(
        &mut self,
        hash: &str,
        image: &DynamicImage,
        cache: &mut QueryCache,
        fresh: &mut HashSet<QueryKey>,
        stats: &mut QueryStats,
    ) -> Result<Vec<QueryKey>, RunError> {
        let mut keys = Vec::with_capacity(self.adapters.len());
        for adapter in self.adapters.iter_mut() {
            let key = QueryKey::new(hash, adapter.name());
            match cache.lookup(&key) {
                Some(ordinal) => tracing::trace!("Cache hit {} (#{})", key, ordinal),
                None => {
                    let output = adapter.evaluate(image).map_err(RunError::Model)?;
                    stats.evaluated += 1;
                    cache.record(key.clone(), output);
                    fresh.insert(key.clone());
                }
            }
            keys.push(key);
        }
        Ok(keys)
    }
}

/// Write one row's tags file, creating its directory on first use.
fn write_row(record: &mut ImageRecord, output_path: &Path, filtered: Option<ModelOutput>) -> bool {
    let Some(filtered) = filtered else {
        return false;
    };
    if let Some(dir) = record.take_output_dir() {
        if let Err(e) = sidecar::ensure_dir(&dir) {
            tracing::warn!("{}", e);
        }
    }
    match sidecar::write_tags_file(output_path, &sorted_tags(&filtered.tags)) {
        Ok(()) => true,
        Err(e) => {
            tracing::warn!("{}", e);
            false
        }
    }
}

/// Collects a streamed pass into the session.
struct RunSink<'a> {
    targets: HashMap<PathBuf, Option<PathBuf>>,
    filters: &'a FilterSpec,
    settings: &'a FilterSettings,
    aggregate: &'a mut AggregateState,
    report: DryRunReport,
    stats: QueryStats,
}

impl StreamSink for RunSink<'_> {
    fn scheduled(&mut self, path: &Path) {
        self.report.scheduled.push(path.to_path_buf());
    }

    fn read(&mut self, path: &Path) {
        self.report.read.push(path.to_path_buf());
    }

    fn skipped(&mut self, _path: &Path, _error: &PipelineError) {
        self.stats.skipped += 1;
    }

    fn accept(&mut self, path: &Path, output: ModelOutput) {
        self.stats.evaluated += 1;
        let output_path = self.targets.get(path).cloned().flatten();
        if let Some(target) = &output_path {
            let filtered = self.filters.apply(self.settings, &output);
            match sidecar::write_tags_file(target, &sorted_tags(&filtered.tags)) {
                Ok(()) => self.stats.written += 1,
                Err(e) => tracing::warn!("{}", e),
            }
        }
        self.aggregate
            .push(AggregateRow::streamed(path.to_path_buf(), output_path, output));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::mock::MockAdapter;
    use crate::session::Field;
    use std::sync::atomic::Ordering;

    fn save(dir: &Path, name: &str, shade: u8) -> PathBuf {
        let path = dir.join(name);
        image::RgbImage::from_pixel(8, 8, image::Rgb([shade, shade, shade]))
            .save(&path)
            .unwrap();
        path
    }

    fn session_for(config: &Config, input: &Path) -> TaggingSession {
        let mut session = TaggingSession::from_config(config);
        session.set(Field::Threshold, "0.5");
        let update = session.set(Field::InputGlob, input.to_str().unwrap());
        assert!(update.error().is_none(), "{:?}", update);
        session
    }

    fn mock() -> MockAdapter {
        MockAdapter::new("wd14", &[("smile", 0.9), ("solo", 0.3)])
    }

    #[test]
    fn test_repeated_submissions_evaluate_once() {
        let adapter = mock();
        let calls = adapter.calls.clone();
        let config = Config::default();
        let mut interrogator = Interrogator::new(Box::new(adapter), &config);
        let mut session = TaggingSession::from_config(&config);
        session.toggle(Flag::Cumulative);

        let image = DynamicImage::new_rgb8(8, 8);
        for _ in 0..3 {
            let out = interrogator.interrogate_image(&mut session, &image).unwrap();
            assert_eq!(out.images.len(), 1);
            assert_eq!(out.count_of("smile"), 1);
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(session.last_output().unwrap().images[0].cached);
    }

    #[test]
    fn test_non_cumulative_query_starts_fresh() {
        let adapter = mock();
        let calls = adapter.calls.clone();
        let config = Config::default();
        let mut interrogator = Interrogator::new(Box::new(adapter), &config);
        let mut session = TaggingSession::from_config(&config);

        let image = DynamicImage::new_rgb8(8, 8);
        interrogator.interrogate_image(&mut session, &image).unwrap();
        interrogator.interrogate_image(&mut session, &image).unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_batch_with_duplicate_images() {
        let dir = tempfile::tempdir().unwrap();
        save(dir.path(), "1.png", 10);
        save(dir.path(), "2.png", 200);
        save(dir.path(), "3.png", 10);

        let adapter = mock();
        let calls = adapter.calls.clone();
        let config = Config::default();
        let mut interrogator = Interrogator::new(Box::new(adapter), &config);
        let mut session = session_for(&config, dir.path());

        let out = interrogator.batch_interrogate(&mut session).unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(out.images.len(), 3);
        assert_eq!(out.images[2].tags, out.images[0].tags);
        assert_eq!(out.images[0].tags.len(), 1);
        assert_eq!(out.count_of("smile"), 3);
        assert_eq!(out.count_of("solo"), 0);
        assert_eq!(out.stats.evaluated, 2);
        assert_eq!(out.stats.cached, 1);
        assert!(out.images[2].cached);
    }

    #[test]
    fn test_ensemble_merges_by_max() {
        let dir = tempfile::tempdir().unwrap();
        save(dir.path(), "a.png", 10);

        let config = Config::default();
        let weak = MockAdapter::new("weak", &[("smile", 0.3)]);
        let strong = MockAdapter::new("strong", &[("smile", 0.8)]);
        let mut interrogator =
            Interrogator::ensemble(vec![Box::new(weak), Box::new(strong)], &config);
        assert_eq!(interrogator.mode(), RunMode::Disabled);
        let mut session = session_for(&config, dir.path());

        let out = interrogator.batch_interrogate(&mut session).unwrap();
        assert_eq!(out.images[0].tags.len(), 1);
        assert_eq!(out.images[0].tags[0].confidence, 0.8);
        assert_eq!(session.cache().len(), 2);
    }

    #[test]
    fn test_config_noop_keeps_cached_results() {
        let dir = tempfile::tempdir().unwrap();
        save(dir.path(), "a.png", 10);
        save(dir.path(), "b.png", 20);

        let adapter = mock();
        let calls = adapter.calls.clone();
        let config = Config::default();
        let mut interrogator = Interrogator::new(Box::new(adapter), &config);
        let mut session = session_for(&config, dir.path());
        interrogator.batch_interrogate(&mut session).unwrap();

        let current = session.value(Field::Threshold).to_string();
        assert!(session.set(Field::Threshold, &current).error().is_none());
        assert_eq!(session.cache().len(), 2);

        let out = interrogator.batch_interrogate(&mut session).unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(out.stats.cached, 2);
    }

    #[test]
    fn test_filter_change_replays_without_evaluating() {
        let dir = tempfile::tempdir().unwrap();
        save(dir.path(), "a.png", 10);

        let adapter = mock();
        let calls = adapter.calls.clone();
        let config = Config::default();
        let mut interrogator = Interrogator::new(Box::new(adapter), &config);
        let mut session = session_for(&config, dir.path());
        interrogator.batch_interrogate(&mut session).unwrap();

        session.set(Field::Threshold, "0.2");
        let out = interrogator.batch_interrogate(&mut session).unwrap();
        assert_eq!(out.images[0].tags.len(), 2);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_decode_failure_skips_image() {
        let dir = tempfile::tempdir().unwrap();
        save(dir.path(), "a.png", 10);
        std::fs::write(dir.path().join("b.png"), b"not an image").unwrap();
        save(dir.path(), "c.png", 30);

        let config = Config::default();
        let mut interrogator = Interrogator::new(Box::new(mock()), &config);
        let mut session = session_for(&config, dir.path());

        let out = interrogator.batch_interrogate(&mut session).unwrap();
        assert_eq!(out.images.len(), 2);
        assert_eq!(out.stats.skipped, 1);
    }

    #[test]
    fn test_batch_writes_tags_files() {
        let dir = tempfile::tempdir().unwrap();
        let out_dir = tempfile::tempdir().unwrap();
        let target = out_dir.path().join("tags");
        save(dir.path(), "a.png", 10);

        let config = Config::default();
        let mut interrogator = Interrogator::new(Box::new(mock()), &config);
        let mut session = session_for(&config, dir.path());
        session.set(Field::OutputDir, target.to_str().unwrap());

        let out = interrogator.batch_interrogate(&mut session).unwrap();
        assert_eq!(out.stats.written, 1);
        let written = std::fs::read_to_string(target.join("a.txt")).unwrap();
        assert_eq!(written, "smile");
        let key = QueryKey::new(out.images[0].content_hash.clone().unwrap(), "wd14");
        assert_eq!(
            session.cache().get(&key).unwrap().tags_file,
            Some(target.join("a.txt"))
        );
    }

    #[test]
    fn test_model_failure_is_fatal_and_clears_output() {
        let dir = tempfile::tempdir().unwrap();
        save(dir.path(), "a.png", 10);

        let config = Config::default();
        let mut session = session_for(&config, dir.path());
        Interrogator::new(Box::new(mock()), &config)
            .batch_interrogate(&mut session)
            .unwrap();
        assert!(session.last_output().is_some());

        let mut broken = MockAdapter::new("broken", &[]);
        broken.fail_load = true;
        let err = Interrogator::new(Box::new(broken), &config)
            .batch_interrogate(&mut session)
            .unwrap_err();
        assert!(matches!(err, RunError::Model(PipelineError::ModelLoad { .. })));
        assert!(session.last_output().is_none());
    }

    #[test]
    fn test_empty_input_is_a_run_error() {
        let config = Config::default();
        let mut interrogator = Interrogator::new(Box::new(mock()), &config);
        let mut session = TaggingSession::from_config(&config);
        assert!(matches!(
            interrogator.batch_interrogate(&mut session),
            Err(RunError::NoInput)
        ));
    }

    #[test]
    fn test_mode_follows_streaming_capability() {
        let config = Config::default();
        assert_eq!(
            Interrogator::new(Box::new(mock()), &config).mode(),
            RunMode::Disabled
        );
        assert_eq!(
            Interrogator::new(Box::new(mock().with_streaming()), &config).mode(),
            RunMode::DryRun
        );
    }

    #[test]
    fn test_dry_run_precheck_aborts_before_live_pass() {
        let dir = tempfile::tempdir().unwrap();
        for (i, name) in ["a.png", "b.png", "d.png", "e.png"].iter().enumerate() {
            save(dir.path(), name, i as u8 * 40);
        }
        std::fs::write(dir.path().join("c.png"), b"truncated").unwrap();

        let adapter = mock().with_streaming();
        let stream_calls = adapter.stream_calls.clone();
        let config = Config::default();
        let mut interrogator = Interrogator::new(Box::new(adapter), &config);
        let mut session = session_for(&config, dir.path());
        assert_eq!(session.images().len(), 5);
        session.toggle(Flag::LargeQuery);

        let err = interrogator.batch_interrogate(&mut session).unwrap_err();
        assert!(matches!(err, RunError::Stream(StreamError::Precheck(_))));
        assert_eq!(stream_calls.load(Ordering::SeqCst), 0);
        assert_eq!(interrogator.mode(), RunMode::DryRun);
        assert!(session.last_output().is_none());
    }

    #[test]
    fn test_streaming_alternates_dry_and_live() {
        let dir = tempfile::tempdir().unwrap();
        let out_dir = tempfile::tempdir().unwrap();
        for (i, name) in ["a.png", "b.png", "c.png"].iter().enumerate() {
            save(dir.path(), name, i as u8 * 40);
        }

        let adapter = mock().with_streaming();
        let stream_calls = adapter.stream_calls.clone();
        let mut config = Config::default();
        config.pipeline.dry_run_log_dir = Some(out_dir.path().join("logs"));
        let mut interrogator = Interrogator::new(Box::new(adapter), &config);
        let mut session = session_for(&config, dir.path());
        session.set(Field::OutputDir, out_dir.path().to_str().unwrap());
        session.toggle(Flag::LargeQuery);

        let dry = interrogator.batch_interrogate(&mut session).unwrap();
        let report = dry.dry_run.clone().unwrap();
        assert_eq!(report.scheduled.len(), 3);
        assert_eq!(report.read.len(), 3);
        assert!(dry.images.is_empty());
        assert_eq!(stream_calls.load(Ordering::SeqCst), 0);
        assert_eq!(interrogator.mode(), RunMode::Live);
        let log = std::fs::read_to_string(out_dir.path().join("logs").join(READ_LOG)).unwrap();
        assert_eq!(log.lines().count(), 3);

        let live = interrogator.batch_interrogate(&mut session).unwrap();
        assert!(live.dry_run.is_none());
        assert_eq!(live.images.len(), 3);
        assert_eq!(live.stats.evaluated, 3);
        assert_eq!(live.stats.written, 3);
        assert_eq!(stream_calls.load(Ordering::SeqCst), 3);
        assert_eq!(
            std::fs::read_to_string(out_dir.path().join("b.txt")).unwrap(),
            "smile"
        );
        assert!(session.cache().is_empty());
        assert_eq!(interrogator.mode(), RunMode::DryRun);
    }

    #[test]
    fn test_cumulative_stream_then_batch_counts_each_file_once() {
        let dir = tempfile::tempdir().unwrap();
        save(dir.path(), "a.png", 10);
        save(dir.path(), "b.png", 200);

        let config = Config::default();
        let mut interrogator = Interrogator::new(Box::new(mock().with_streaming()), &config);
        let mut session = session_for(&config, dir.path());
        session.toggle(Flag::Cumulative);
        session.toggle(Flag::LargeQuery);

        interrogator.batch_interrogate(&mut session).unwrap();
        let live = interrogator.batch_interrogate(&mut session).unwrap();
        assert_eq!(live.images.len(), 2);
        assert_eq!(live.count_of("smile"), 2);

        session.toggle(Flag::LargeQuery);
        let out = interrogator.batch_interrogate(&mut session).unwrap();
        assert_eq!(out.images.len(), 2);
        assert_eq!(out.count_of("smile"), 2);
        assert!(out.images.iter().all(|i| i.content_hash.is_some()));
    }

    #[test]
    fn test_stored_images_replay_without_files() {
        let dir = tempfile::tempdir().unwrap();
        let a = save(dir.path(), "a.png", 10);

        let adapter = mock();
        let calls = adapter.calls.clone();
        let mut config = Config::default();
        config.processing.store_images = true;
        let mut interrogator = Interrogator::new(Box::new(adapter), &config);
        let mut session = session_for(&config, dir.path());

        interrogator.batch_interrogate(&mut session).unwrap();
        assert!(session.images()[0].image.is_some());
        std::fs::remove_file(&a).unwrap();

        let out = interrogator.batch_interrogate(&mut session).unwrap();
        assert_eq!(out.stats.skipped, 0);
        assert_eq!(out.images.len(), 1);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_unload_after_run() {
        let config = Config::default();
        let image = DynamicImage::new_rgb8(8, 8);

        let mut interrogator = Interrogator::new(Box::new(mock()), &config);
        let mut session = TaggingSession::from_config(&config);
        interrogator.interrogate_image(&mut session, &image).unwrap();
        assert_eq!(interrogator.unload(), vec![("wd14".to_string(), true)]);

        session.toggle(Flag::UnloadAfter);
        interrogator.interrogate_image(&mut session, &image).unwrap();
        assert_eq!(interrogator.unload(), vec![("wd14".to_string(), false)]);
    }
}
