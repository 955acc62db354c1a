//! Model adapters: a uniform contract over concrete tagger backends.
//!
//! The engine only sees [`ModelAdapter`]. Adapters that can stream a large
//! batch say so by returning a [`StreamingAdapter`] from
//! [`ModelAdapter::streaming`]; the orchestrator checks that capability and
//! never the concrete type.

pub mod deepdanbooru;
pub mod labels;
pub(crate) mod onnx;
pub mod preprocess;
pub mod waifu;

pub use deepdanbooru::DeepDanbooruAdapter;
pub use labels::{Label, LabelSet};
pub use waifu::WaifuDiffusionAdapter;

use image::DynamicImage;
use std::path::{Path, PathBuf};

use crate::config::{Config, ModelFamily, ModelSpec, PipelineConfig};
use crate::error::{PipelineError, StreamError};
use crate::pipeline::{stream_batches, ImageDecoder};
use crate::types::ModelOutput;

/// A tagger backend.
pub trait ModelAdapter: Send {
    /// Model identity; part of every cache key.
    fn name(&self) -> &str;

    /// Load artifacts. Fails on missing or corrupt files.
    fn load(&mut self) -> Result<(), PipelineError>;

    fn is_loaded(&self) -> bool;

    /// Evaluate one decoded image, loading the model first if needed.
    fn evaluate(&mut self, image: &DynamicImage) -> Result<ModelOutput, PipelineError>;

    /// Release the model. Returns `true` only if resources were actually freed;
    /// a backend that keeps its session resident returns `false`.
    fn unload(&mut self) -> bool;

    /// The large-batch capability, if this adapter has it.
    fn streaming(&mut self) -> Option<&mut dyn StreamingAdapter> {
        None
    }
}

/// Receives the side effects of a streamed pass.
pub trait StreamSink {
    /// A path was handed to the batch reader.
    fn scheduled(&mut self, path: &Path);

    /// A path was read and decoded.
    fn read(&mut self, path: &Path);

    /// A path could not be read during the live pass.
    fn skipped(&mut self, path: &Path, error: &PipelineError);

    /// Raw model output for one path of the live pass.
    fn accept(&mut self, path: &Path, output: ModelOutput);
}

/// Large-batch capability.
pub trait StreamingAdapter {
    /// Stream `paths` through the model in bounded batches.
    ///
    /// A dry run reads and decodes every path without invoking the model and
    /// fails on the first unreadable one. A live run skips unreadable paths
    /// and reports each prediction to `sink`.
    fn evaluate_stream(
        &mut self,
        paths: &[PathBuf],
        dry_run: bool,
        sink: &mut dyn StreamSink,
    ) -> Result<(), StreamError>;
}

/// Build the adapter for a configured model.
pub fn from_spec(spec: &ModelSpec, config: &Config) -> Box<dyn ModelAdapter> {
    match spec.family {
        ModelFamily::WaifuDiffusion => Box::new(WaifuDiffusionAdapter::new(spec.clone(), config)),
        ModelFamily::DeepDanbooru => Box::new(DeepDanbooruAdapter::new(spec.clone(), config)),
    }
}

/// Shared streaming driver.
///
/// `prepare` turns a decoded image into model input on the producer thread;
/// `predict` runs one batch of prepared inputs on the calling thread. In a
/// dry run neither is called.
pub fn run_stream<T, P, F>(
    pipeline: &PipelineConfig,
    decoder: &ImageDecoder,
    paths: &[PathBuf],
    dry_run: bool,
    sink: &mut dyn StreamSink,
    prepare: P,
    mut predict: F,
) -> Result<(), StreamError>
where
    T: Send,
    P: Fn(&DynamicImage) -> T + Sync,
    F: FnMut(Vec<T>) -> Result<Vec<ModelOutput>, PipelineError>,
{
    for path in paths {
        sink.scheduled(path);
    }

    stream_batches(
        pipeline,
        paths,
        |path| {
            let image = decoder.decode(path)?;
            Ok((!dry_run).then(|| prepare(&image)))
        },
        |batch| {
            let mut ready_paths = Vec::with_capacity(batch.items.len());
            let mut ready = Vec::with_capacity(batch.items.len());
            for (path, item) in batch.items {
                match item {
                    Ok(prepared) => {
                        sink.read(&path);
                        if let Some(input) = prepared {
                            ready_paths.push(path);
                            ready.push(input);
                        }
                    }
                    Err(e) if dry_run => return Err(StreamError::Precheck(e)),
                    Err(e) => {
                        tracing::warn!("Skipping {:?}: {}", path, e);
                        sink.skipped(&path, &e);
                    }
                }
            }
            if ready.is_empty() {
                return Ok(());
            }

            tracing::debug!("Predicting batch {} ({} images)", batch.index, ready.len());
            let outputs = predict(ready).map_err(StreamError::Model)?;
            for (path, output) in ready_paths.iter().zip(outputs) {
                sink.accept(path, output);
            }
            Ok(())
        },
    )
}


#[cfg(test)]
mod tests {
    use super::mock::MockAdapter;
    use super::*;
    use std::sync::atomic::Ordering;

    #[derive(Default)]
    struct RecordingSink {
        scheduled: Vec<PathBuf>,
        read: Vec<PathBuf>,
        skipped: Vec<PathBuf>,
        accepted: Vec<PathBuf>,
    }

    impl StreamSink for RecordingSink {
        fn scheduled(&mut self, path: &Path) {
            self.scheduled.push(path.to_path_buf());
        }
        fn read(&mut self, path: &Path) {
            self.read.push(path.to_path_buf());
        }
        fn skipped(&mut self, path: &Path, _error: &PipelineError) {
            self.skipped.push(path.to_path_buf());
        }
        fn accept(&mut self, path: &Path, _output: ModelOutput) {
            self.accepted.push(path.to_path_buf());
        }
    }

    fn images(dir: &Path, n: usize) -> Vec<PathBuf> {
        (0..n)
            .map(|i| {
                let path = dir.join(format!("{i}.png"));
                image::RgbImage::from_pixel(4, 4, image::Rgb([i as u8 * 10, 0, 0]))
                    .save(&path)
                    .unwrap();
                path
            })
            .collect()
    }

    #[test]
    fn test_capability_is_opt_in() {
        let mut plain = MockAdapter::new("plain", &[]);
        assert!(plain.streaming().is_none());
        let mut streaming = MockAdapter::new("streaming", &[]).with_streaming();
        assert!(streaming.streaming().is_some());
    }

    #[test]
    fn test_dry_run_reads_without_predicting() {
        let dir = tempfile::tempdir().unwrap();
        let paths = images(dir.path(), 3);
        let mut adapter = MockAdapter::new("m", &[("smile", 0.9)]).with_streaming();
        let mut sink = RecordingSink::default();

        adapter.evaluate_stream(&paths, true, &mut sink).unwrap();
        assert_eq!(sink.scheduled, paths);
        assert_eq!(sink.read, paths);
        assert!(sink.accepted.is_empty());
        assert_eq!(adapter.stream_calls.load(Ordering::SeqCst), 0);
        assert!(!adapter.is_loaded());
    }

    #[test]
    fn test_dry_run_fails_on_unreadable_path() {
        let dir = tempfile::tempdir().unwrap();
        let mut paths = images(dir.path(), 2);
        paths.insert(1, dir.path().join("missing.png"));
        let mut adapter = MockAdapter::new("m", &[]).with_streaming();

        let err = adapter
            .evaluate_stream(&paths, true, &mut RecordingSink::default())
            .unwrap_err();
        assert!(matches!(err, StreamError::Precheck(PipelineError::FileNotFound(_))));
    }

    #[test]
    fn test_live_run_skips_unreadable_and_accepts_rest() {
        let dir = tempfile::tempdir().unwrap();
        let mut paths = images(dir.path(), 3);
        paths.insert(1, dir.path().join("missing.png"));
        let mut adapter = MockAdapter::new("m", &[("smile", 0.9)]).with_streaming();
        let mut sink = RecordingSink::default();

        adapter.evaluate_stream(&paths, false, &mut sink).unwrap();
        assert_eq!(sink.skipped.len(), 1);
        assert_eq!(sink.accepted.len(), 3);
        assert_eq!(adapter.stream_calls.load(Ordering::SeqCst), 3);
    }
}
