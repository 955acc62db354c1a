//! Sub-configuration structs with their defaults.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// General settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Directory where downloaded models and the registry are stored
    pub model_dir: PathBuf,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            model_dir: PathBuf::from("~/.autotagger/models"),
        }
    }
}

/// Input discovery settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessingConfig {
    /// Supported input formats
    pub supported_formats: Vec<String>,

    /// Keep decoded images on their records so a repeated run skips decoding
    pub store_images: bool,
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            supported_formats: ["jpg", "jpeg", "png", "webp", "gif", "bmp", "tiff"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            store_images: false,
        }
    }
}

/// Large-batch streaming settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Images per streamed batch
    pub batch_size: usize,

    /// Preprocessed batches allowed in flight ahead of the predictor
    pub queue_depth: usize,

    /// Where the dry run writes its scheduled/read logs (disabled when unset)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dry_run_log_dir: Option<PathBuf>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            batch_size: 64,
            queue_depth: 2,
            dry_run_log_dir: None,
        }
    }
}

/// Resource limits to protect against problematic inputs.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    /// Maximum file size in megabytes
    pub max_file_size_mb: u64,

    /// Maximum image dimension (width or height)
    pub max_image_dimension: u32,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_file_size_mb: 100,
            max_image_dimension: 16384,
        }
    }
}

/// Initial values of the session flags.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Keep results across interactive queries
    pub cumulative: bool,

    /// Use the streamed large-batch mode when the model supports it
    pub large_query: bool,

    /// Unload models after each run
    pub unload_after: bool,
}

/// Report and sidecar settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Default report format ("json" or "jsonl")
    pub format: String,

    /// Pretty-print JSON output
    pub pretty: bool,

    /// Extension of the per-image tags file
    pub sidecar_extension: String,

    /// Write tags files next to inputs when no output directory is given
    pub sidecar_beside_input: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            format: "json".to_string(),
            pretty: false,
            sidecar_extension: "txt".to_string(),
            sidecar_beside_input: false,
        }
    }
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: error, warn, info, debug, trace
    pub level: String,

    /// Log format: "pretty" or "json"
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

/// Model family, selecting which adapter runs a model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ModelFamily {
    /// ONNX taggers with a `selected_tags.csv` label file
    WaifuDiffusion,
    /// DeepDanbooru projects exported to ONNX
    DeepDanbooru,
}

impl std::fmt::Display for ModelFamily {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ModelFamily::WaifuDiffusion => write!(f, "waifu-diffusion"),
            ModelFamily::DeepDanbooru => write!(f, "deepdanbooru"),
        }
    }
}

/// One tagger model the CLI can run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelSpec {
    /// Unique model name; part of every cache key
    pub name: String,

    /// Adapter family
    pub family: ModelFamily,

    /// Hub repository to download from (waifu-diffusion only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repo_id: Option<String>,

    /// Model file name inside the repository or project
    #[serde(default = "default_model_file")]
    pub model_file: String,

    /// Label file name inside the repository or project
    #[serde(default = "default_tags_file")]
    pub tags_file: String,

    /// Square input edge in pixels
    #[serde(default = "default_input_size")]
    pub input_size: u32,

    /// Local project directory (deepdanbooru only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_path: Option<PathBuf>,
}

fn default_model_file() -> String {
    "model.onnx".to_string()
}

fn default_tags_file() -> String {
    "selected_tags.csv".to_string()
}

fn default_input_size() -> u32 {
    448
}

impl ModelSpec {
    /// A waifu-diffusion tagger hosted on the hub.
    pub fn waifu_diffusion(name: &str, repo_id: &str) -> Self {
        Self {
            name: name.to_string(),
            family: ModelFamily::WaifuDiffusion,
            repo_id: Some(repo_id.to_string()),
            model_file: default_model_file(),
            tags_file: default_tags_file(),
            input_size: default_input_size(),
            project_path: None,
        }
    }

    /// A local DeepDanbooru project exported to ONNX.
    pub fn deepdanbooru(name: &str, project_path: impl Into<PathBuf>) -> Self {
        Self {
            name: name.to_string(),
            family: ModelFamily::DeepDanbooru,
            repo_id: None,
            model_file: default_model_file(),
            tags_file: "tags.txt".to_string(),
            input_size: 512,
            project_path: Some(project_path.into()),
        }
    }

    /// Models shipped in the default configuration.
    pub fn defaults() -> Vec<Self> {
        vec![
            Self::waifu_diffusion("wd14-vit-v2", "SmilingWolf/wd-v1-4-vit-tagger-v2"),
            Self::waifu_diffusion("wd14-convnext-v2", "SmilingWolf/wd-v1-4-convnext-tagger-v2"),
            Self::waifu_diffusion("wd14-swinv2-v2", "SmilingWolf/wd-v1-4-swinv2-tagger-v2"),
        ]
    }
}
