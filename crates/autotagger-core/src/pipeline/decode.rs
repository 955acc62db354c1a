//! Image decoding with format detection and size limits.

use image::{DynamicImage, GenericImageView, ImageFormat};
use std::io::Cursor;
use std::path::Path;

use crate::config::LimitsConfig;
use crate::error::PipelineError;

/// Image decoder with configurable limits.
#[derive(Debug, Clone)]
pub struct ImageDecoder {
    limits: LimitsConfig,
}

impl Default for ImageDecoder {
    fn default() -> Self {
        Self::new(LimitsConfig::default())
    }
}

impl ImageDecoder {
    /// Create a new decoder with the given limits.
    pub fn new(limits: LimitsConfig) -> Self {
        Self { limits }
    }

    /// Read and decode an image file.
    pub fn decode(&self, path: &Path) -> Result<DynamicImage, PipelineError> {
        let meta = std::fs::metadata(path)
            .map_err(|_| PipelineError::FileNotFound(path.to_path_buf()))?;

        let size_mb = meta.len() / (1024 * 1024);
        if size_mb > self.limits.max_file_size_mb {
            return Err(PipelineError::FileTooLarge {
                path: path.to_path_buf(),
                size_mb,
                max_mb: self.limits.max_file_size_mb,
            });
        }

        let bytes = std::fs::read(path).map_err(|e| PipelineError::Decode {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        self.decode_bytes(bytes, path)
    }

    /// Decode an in-memory buffer; `path` is only used for format fallback and errors.
    pub fn decode_bytes(&self, bytes: Vec<u8>, path: &Path) -> Result<DynamicImage, PipelineError> {
        let reader = image::ImageReader::new(Cursor::new(bytes))
            .with_guessed_format()
            .map_err(|e| PipelineError::Decode {
                path: path.to_path_buf(),
                message: format!("Cannot detect image format: {}", e),
            })?;

        let reader = match reader.format() {
            Some(_) => reader,
            None => {
                let format =
                    ImageFormat::from_path(path).map_err(|_| PipelineError::UnsupportedFormat {
                        path: path.to_path_buf(),
                        format: path
                            .extension()
                            .and_then(|e| e.to_str())
                            .unwrap_or("unknown")
                            .to_string(),
                    })?;
                let mut reader = reader;
                reader.set_format(format);
                reader
            }
        };

        let image = reader.decode().map_err(|e| PipelineError::Decode {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;

        let (width, height) = image.dimensions();
        if width > self.limits.max_image_dimension || height > self.limits.max_image_dimension {
            return Err(PipelineError::ImageTooLarge {
                path: path.to_path_buf(),
                width,
                height,
                max_dim: self.limits.max_image_dimension,
            });
        }
        Ok(image)
    }
}
