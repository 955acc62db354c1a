//! Configuration validation with range checks.

use std::collections::HashSet;

use crate::config::ModelFamily;
use crate::error::ConfigError;

use super::Config;

impl Config {
    /// Validate configuration values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let positive = [
            ("pipeline.batch_size", self.pipeline.batch_size),
            ("pipeline.queue_depth", self.pipeline.queue_depth),
            ("limits.max_file_size_mb", self.limits.max_file_size_mb as usize),
            ("limits.max_image_dimension", self.limits.max_image_dimension as usize),
        ];
        for (key, value) in positive {
            if value == 0 {
                return Err(invalid(format!("{key} must be > 0")));
            }
        }
        if !(0.0..=1.0).contains(&self.filter.threshold) {
            return Err(invalid("filter.threshold must be between 0.0 and 1.0"));
        }
        if self.output.sidecar_extension.trim().is_empty() {
            return Err(invalid("output.sidecar_extension must not be empty"));
        }

        let mut names = HashSet::new();
        for model in &self.models {
            if !names.insert(model.name.as_str()) {
                return Err(invalid(format!("models: duplicate model name {:?}", model.name)));
            }
            if model.input_size == 0 {
                return Err(invalid(format!("models.{}.input_size must be > 0", model.name)));
            }
            if model.family == ModelFamily::DeepDanbooru && model.project_path.is_none() {
                return Err(invalid(format!(
                    "models.{}: deepdanbooru models need a project_path",
                    model.name
                )));
            }
        }
        Ok(())
    }
}

fn invalid(message: impl Into<String>) -> ConfigError {
    ConfigError::ValidationError(message.into())
}
