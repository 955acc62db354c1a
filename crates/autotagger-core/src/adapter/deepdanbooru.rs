//! DeepDanbooru projects exported to ONNX.
//!
//! A project directory holds the exported graph, `tags.txt` and a
//! `project.json` describing the input size.

use image::DynamicImage;
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::config::{Config, ModelSpec};
use crate::error::PipelineError;
use crate::types::ModelOutput;

use super::labels::LabelSet;
use super::onnx::TaggerSession;
use super::preprocess::danbooru_tensor;
use super::ModelAdapter;

const PROJECT_FILE: &str = "project.json";

#[derive(Debug, Deserialize)]
struct ProjectFile {
    image_width: Option<u32>,
    image_height: Option<u32>,
}

struct Loaded {
    session: TaggerSession,
    labels: LabelSet,
    input_size: u32,
}

/// Tagger for a DeepDanbooru project.
///
/// Once loaded, the session stays resident for the life of the process:
/// [`unload`](ModelAdapter::unload) always reports `false`.
pub struct DeepDanbooruAdapter {
    spec: ModelSpec,
    project_path: PathBuf,
    loaded: Option<Loaded>,
}

impl DeepDanbooruAdapter {
    pub fn new(spec: ModelSpec, config: &Config) -> Self {
        let project_path = spec
            .project_path
            .as_ref()
            .map(|p| PathBuf::from(shellexpand::tilde(&p.to_string_lossy()).into_owned()))
            .unwrap_or_else(|| config.model_dir().join(&spec.name));
        Self {
            spec,
            project_path,
            loaded: None,
        }
    }

    /// Input edge from `project.json`, falling back to the configured size.
    fn input_size(&self) -> u32 {
        let path = self.project_path.join(PROJECT_FILE);
        let Ok(content) = std::fs::read_to_string(&path) else {
            return self.spec.input_size;
        };
        match serde_json::from_str::<ProjectFile>(&content) {
            Ok(project) => {
                if let (Some(w), Some(h)) = (project.image_width, project.image_height) {
                    if w != h {
                        tracing::warn!(
                            "{}: non-square input {}x{}, using {}",
                            self.spec.name,
                            w,
                            h,
                            w.max(h)
                        );
                    }
                }
                project
                    .image_width
                    .max(project.image_height)
                    .unwrap_or(self.spec.input_size)
            }
            Err(e) => {
                tracing::warn!("Ignoring {:?}: {}", path, e);
                self.spec.input_size
            }
        }
    }

    fn require(&self, path: &Path) -> Result<(), PipelineError> {
        if path.exists() {
            Ok(())
        } else {
            Err(PipelineError::ModelLoad {
                model: self.spec.name.clone(),
                message: format!("{} not found in project", path.display()),
            })
        }
    }
}

impl ModelAdapter for DeepDanbooruAdapter {
    fn name(&self) -> &str {
        &self.spec.name
    }

    fn load(&mut self) -> Result<(), PipelineError> {
        if self.loaded.is_some() {
            return Ok(());
        }
        let model_path = self.project_path.join(&self.spec.model_file);
        let tags_path = self.project_path.join(&self.spec.tags_file);
        self.require(&model_path)?;
        self.require(&tags_path)?;

        tracing::info!("Loading {} from {:?}", self.spec.name, self.project_path);
        let labels = LabelSet::from_tags_txt(&tags_path)?;
        let session = TaggerSession::load(&self.spec.name, &model_path)?;
        let input_size = self.input_size();
        tracing::info!(
            "Loaded {} ({} labels, {}px input)",
            self.spec.name,
            labels.len(),
            input_size
        );

        self.loaded = Some(Loaded {
            session,
            labels,
            input_size,
        });
        Ok(())
    }

    fn is_loaded(&self) -> bool {
        self.loaded.is_some()
    }

    fn evaluate(&mut self, image: &DynamicImage) -> Result<ModelOutput, PipelineError> {
        self.load()?;
        let name = self.spec.name.as_str();
        let Some(loaded) = self.loaded.as_mut() else {
            return Err(PipelineError::ModelLoad {
                model: name.to_string(),
                message: "model is not loaded".to_string(),
            });
        };

        let tensor = danbooru_tensor(image, loaded.input_size);
        let scores = loaded.session.predict(&[tensor])?;
        match scores.first() {
            Some(row) => loaded.labels.decode(name, row),
            None => Err(PipelineError::Inference {
                model: name.to_string(),
                message: "model returned no scores".to_string(),
            }),
        }
    }

    fn unload(&mut self) -> bool {
        if self.loaded.is_some() {
            tracing::warn!(
                "{} stays resident; DeepDanbooru sessions are not released",
                self.spec.name
            );
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn adapter(project: &Path) -> DeepDanbooruAdapter {
        let spec = ModelSpec::deepdanbooru("dd", project);
        DeepDanbooruAdapter::new(spec, &Config::default())
    }

    #[test]
    fn test_input_size_from_project_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join(PROJECT_FILE),
            r#"{"image_width": 299, "image_height": 299, "database_path": null}"#,
        )
        .unwrap();
        assert_eq!(adapter(dir.path()).input_size(), 299);
    }

    #[test]
    fn test_input_size_falls_back_to_configured_size() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(adapter(dir.path()).input_size(), 512);

        std::fs::write(dir.path().join(PROJECT_FILE), "not json").unwrap();
        assert_eq!(adapter(dir.path()).input_size(), 512);
    }

    #[test]
    fn test_missing_project_files_fail_to_load() {
        let dir = tempfile::tempdir().unwrap();
        let mut adapter = adapter(dir.path());
        let err = adapter.load().unwrap_err();
        assert!(err.to_string().contains("model.onnx"));
    }

    #[test]
    fn test_unload_never_releases() {
        let dir = tempfile::tempdir().unwrap();
        let mut adapter = adapter(dir.path());
        assert!(!adapter.unload());
    }

    #[test]
    fn test_has_no_streaming_capability() {
        let dir = tempfile::tempdir().unwrap();
        let mut adapter = adapter(dir.path());
        assert!(adapter.streaming().is_none());
    }
}
