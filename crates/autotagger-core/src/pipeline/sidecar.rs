//! Sidecar tag files and the dry-run path logs.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use crate::error::PipelineError;
use crate::types::Tag;

/// File names of the dry-run logs inside `pipeline.dry_run_log_dir`.
pub const SCHEDULED_LOG: &str = "dry_run_scheduled.txt";
pub const READ_LOG: &str = "dry_run_read.txt";

/// Join tag names the way sidecar files store them.
pub fn tag_line(tags: &[Tag]) -> String {
    tags.iter()
        .map(|t| t.name.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Write one image's tags file, replacing any previous one.
pub fn write_tags_file(path: &Path, tags: &[Tag]) -> Result<(), PipelineError> {
    fs::write(path, tag_line(tags)).map_err(|e| PipelineError::Sidecar {
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}

/// Create an output directory, including parents.
pub fn ensure_dir(dir: &Path) -> Result<(), PipelineError> {
    fs::create_dir_all(dir).map_err(|e| PipelineError::Sidecar {
        path: dir.to_path_buf(),
        message: e.to_string(),
    })
}

/// Write a path list, one absolute path per line, truncating the file.
pub fn write_path_log(path: &Path, entries: &[PathBuf]) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut file = io::BufWriter::new(fs::File::create(path)?);
    for entry in entries {
        writeln!(file, "{}", entry.display())?;
    }
    file.flush()
}
