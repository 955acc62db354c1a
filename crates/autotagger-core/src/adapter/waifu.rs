//! Waifu-diffusion style ONNX taggers.

use image::DynamicImage;
use std::path::{Path, PathBuf};

use crate::config::{Config, ModelSpec, PipelineConfig};
use crate::error::{PipelineError, StreamError};
use crate::pipeline::ImageDecoder;
use crate::registry::ModelRegistry;
use crate::types::ModelOutput;

use super::labels::LabelSet;
use super::onnx::TaggerSession;
use super::preprocess::waifu_tensor;
use super::{run_stream, ModelAdapter, StreamSink, StreamingAdapter};

struct Loaded {
    session: TaggerSession,
    labels: LabelSet,
}

/// Tagger backed by `model.onnx` plus a `selected_tags.csv` label file.
///
/// Artifacts are found through the model registry first, then under
/// `<model_dir>/<name>/`.
pub struct WaifuDiffusionAdapter {
    spec: ModelSpec,
    model_dir: PathBuf,
    registry: ModelRegistry,
    pipeline: PipelineConfig,
    decoder: ImageDecoder,
    loaded: Option<Loaded>,
}

impl WaifuDiffusionAdapter {
    pub fn new(spec: ModelSpec, config: &Config) -> Self {
        Self {
            spec,
            model_dir: config.model_dir(),
            registry: ModelRegistry::new(config.registry_path()),
            pipeline: config.pipeline.clone(),
            decoder: ImageDecoder::new(config.limits.clone()),
            loaded: None,
        }
    }

    /// Where this model's artifacts are expected when not in the registry.
    pub fn default_paths(spec: &ModelSpec, model_dir: &Path) -> (PathBuf, PathBuf) {
        let dir = model_dir.join(&spec.name);
        (dir.join(&spec.model_file), dir.join(&spec.tags_file))
    }

    fn artifact_paths(&self) -> Result<(PathBuf, PathBuf), PipelineError> {
        if let Some(entry) = self.registry.find(&self.spec.name) {
            return Ok((entry.model_path, entry.tags_path));
        }
        let (model_path, tags_path) = Self::default_paths(&self.spec, &self.model_dir);
        for path in [&model_path, &tags_path] {
            if !path.exists() {
                return Err(PipelineError::ModelLoad {
                    model: self.spec.name.clone(),
                    message: format!(
                        "{} not found. Run `autotagger models download {}` first.",
                        path.display(),
                        self.spec.name
                    ),
                });
            }
        }
        Ok((model_path, tags_path))
    }

    fn loaded(&mut self) -> Result<&mut Loaded, PipelineError> {
        self.load()?;
        self.loaded.as_mut().ok_or_else(|| PipelineError::ModelLoad {
            model: self.spec.name.clone(),
            message: "model is not loaded".to_string(),
        })
    }
}

impl ModelAdapter for WaifuDiffusionAdapter {
    fn name(&self) -> &str {
        &self.spec.name
    }

    fn load(&mut self) -> Result<(), PipelineError> {
        if self.loaded.is_some() {
            return Ok(());
        }
        let (model_path, tags_path) = self.artifact_paths()?;
        tracing::info!("Loading {} from {:?}", self.spec.name, model_path);

        let labels = LabelSet::from_csv(&tags_path)?;
        let session = TaggerSession::load(&self.spec.name, &model_path)?;
        tracing::info!("Loaded {} ({} labels)", self.spec.name, labels.len());

        self.loaded = Some(Loaded { session, labels });
        Ok(())
    }

    fn is_loaded(&self) -> bool {
        self.loaded.is_some()
    }

    fn evaluate(&mut self, image: &DynamicImage) -> Result<ModelOutput, PipelineError> {
        let size = self.spec.input_size;
        let name = self.spec.name.clone();
        let loaded = self.loaded()?;

        let tensor = waifu_tensor(image, size);
        let scores = loaded.session.predict(&[tensor])?;
        let row = scores.first().ok_or_else(|| PipelineError::Inference {
            model: name.clone(),
            message: "model returned no scores".to_string(),
        })?;
        loaded.labels.decode(&name, row)
    }

    fn unload(&mut self) -> bool {
        let unloaded = self.loaded.take().is_some();
        if unloaded {
            tracing::info!("Unloaded {}", self.spec.name);
        }
        unloaded
    }

    fn streaming(&mut self) -> Option<&mut dyn StreamingAdapter> {
        Some(self)
    }
}

impl StreamingAdapter for WaifuDiffusionAdapter {
    /// The live pass reports general-category tags only.
    fn evaluate_stream(
        &mut self,
        paths: &[PathBuf],
        dry_run: bool,
        sink: &mut dyn StreamSink,
    ) -> Result<(), StreamError> {
        if !dry_run {
            self.load().map_err(StreamError::Model)?;
        }

        let size = self.spec.input_size;
        let name = self.spec.name.as_str();
        let mut loaded = self.loaded.as_mut();

        run_stream(
            &self.pipeline,
            &self.decoder,
            paths,
            dry_run,
            sink,
            |image| waifu_tensor(image, size),
            |tensors| {
                let Some(model) = loaded.as_mut() else {
                    return Err(PipelineError::ModelLoad {
                        model: name.to_string(),
                        message: "model is not loaded".to_string(),
                    });
                };
                model
                    .session
                    .predict(&tensors)?
                    .iter()
                    .map(|scores| model.labels.decode_general(name, scores))
                    .collect()
            },
        )
    }
}
