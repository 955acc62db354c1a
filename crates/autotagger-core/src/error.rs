//! Error types for the tagging pipeline.
//!
//! Errors follow the four families the engine distinguishes: input errors
//! (per image or per field), configuration errors, model errors (fatal to a
//! run) and stream errors raised by the large-batch precheck. Resource-release
//! failures are not errors; see [`crate::adapter::ModelAdapter::unload`].

use std::path::PathBuf;
use thiserror::Error;

/// Top-level error type for autotagger operations.
#[derive(Error, Debug)]
pub enum TaggerError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Pipeline processing errors
    #[error("Pipeline error: {0}")]
    Pipeline(#[from] PipelineError),

    /// Run-level orchestration errors
    #[error("Run error: {0}")]
    Run(#[from] RunError),

    /// General I/O errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Configuration file errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to read the config file from disk
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    /// Failed to parse TOML configuration
    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),

    /// Configuration values are invalid
    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

/// Pipeline errors, organized by stage.
#[derive(Error, Debug)]
pub enum PipelineError {
    /// Image decoding failed
    #[error("Decode error for {path}: {message}")]
    Decode { path: PathBuf, message: String },

    /// File exceeds size limit
    #[error("File too large: {path} ({size_mb}MB > {max_mb}MB)")]
    FileTooLarge {
        path: PathBuf,
        size_mb: u64,
        max_mb: u64,
    },

    /// Image dimensions exceed limit
    #[error("Image too large: {path} ({width}x{height} > {max_dim})")]
    ImageTooLarge {
        path: PathBuf,
        width: u32,
        height: u32,
        max_dim: u32,
    },

    /// Unsupported image format
    #[error("Unsupported format for {path}: {format}")]
    UnsupportedFormat { path: PathBuf, format: String },

    /// File not found
    #[error("File not found: {0}")]
    FileNotFound(PathBuf),

    /// Model artifacts are missing or could not be loaded
    #[error("Failed to load model {model}: {message}")]
    ModelLoad { model: String, message: String },

    /// The backend failed while evaluating an image
    #[error("Inference failed for model {model}: {message}")]
    Inference { model: String, message: String },

    /// The model registry file could not be read or written
    #[error("Model registry error at {path}: {message}")]
    Registry { path: PathBuf, message: String },

    /// Writing a sidecar tag file failed
    #[error("Failed to write tags file {path}: {message}")]
    Sidecar { path: PathBuf, message: String },
}

impl PipelineError {
    /// Whether this error only concerns the image being read.
    ///
    /// Input errors skip the image and let the run continue; everything
    /// else (model load, inference) aborts the run.
    pub fn is_input_error(&self) -> bool {
        matches!(
            self,
            Self::Decode { .. }
                | Self::FileTooLarge { .. }
                | Self::ImageTooLarge { .. }
                | Self::UnsupportedFormat { .. }
                | Self::FileNotFound(_)
        )
    }
}

/// A rejected update of one configuration field.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FieldError {
    #[error("'{value}' is not a number")]
    NotANumber { value: String },

    #[error("threshold {value} must be between 0.0 and 1.0")]
    ThresholdOutOfRange { value: f32 },

    #[error("token {token:?} contains a control character")]
    ControlCharacter { token: String },

    #[error("search token {token:?} is listed more than once")]
    DuplicateSearchToken { token: String },

    #[error("replace has {replace} tokens but search only has {search}")]
    ReplaceLongerThanSearch { search: usize, replace: usize },

    #[error("invalid glob pattern {pattern:?}: {message}")]
    InvalidGlob { pattern: String, message: String },

    #[error("no supported images matched {spec:?}")]
    NoImages { spec: String },

    #[error("{path} exists and is not a directory")]
    NotADirectory { path: PathBuf },
}

/// Errors raised while streaming a large batch through a model.
#[derive(Error, Debug)]
pub enum StreamError {
    /// The dry-run precheck could not read an image.
    #[error("Dry run failed: {0}")]
    Precheck(PipelineError),

    /// The model failed during the streamed pass.
    #[error("Streamed pass failed: {0}")]
    Model(PipelineError),

    /// Writing a dry-run log failed.
    #[error("Failed to write dry run log {path}: {source}")]
    Log {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The batch producer stopped before delivering every batch.
    #[error("Batch producer stopped unexpectedly")]
    ProducerStopped,
}

/// Run-level failure of one orchestrator invocation.
///
/// A run error replaces the session's previous output entirely.
#[derive(Error, Debug)]
pub enum RunError {
    #[error("no images to tag; set an input glob first")]
    NoInput,

    #[error("no models configured for this run")]
    NoModels,

    #[error("{0}")]
    Model(PipelineError),

    #[error("{0}")]
    Stream(#[from] StreamError),
}

/// Convenience type alias for autotagger results.
pub type Result<T> = std::result::Result<T, TaggerError>;

/// Convenience type alias for pipeline-specific results.
pub type PipelineResult<T> = std::result::Result<T, PipelineError>;
