//! Input resolution: path and glob specs to an ordered list of image records.

use image::DynamicImage;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::config::{Config, OutputConfig, ProcessingConfig};
use crate::error::FieldError;
use crate::filter::split_tokens;

/// One input image for the duration of a run.
#[derive(Debug, Clone)]
pub struct ImageRecord {
    /// Absolute input path
    pub path: PathBuf,

    /// Where the tags file goes (None disables writing)
    pub output_path: Option<PathBuf>,

    /// Output directory still to be created before the first write
    pub output_dir: Option<PathBuf>,

    /// Content hash, filled on first read
    pub content_hash: Option<String>,

    /// Decoded image, kept only when `processing.store_images` is set
    pub image: Option<DynamicImage>,
}

impl ImageRecord {
    /// Take the pending output directory so it is created only once.
    pub fn take_output_dir(&mut self) -> Option<PathBuf> {
        self.output_dir.take()
    }
}

/// Expands user path specs and decides where tags files go.
#[derive(Debug, Clone)]
pub struct IoResolver {
    processing: ProcessingConfig,
    output: OutputConfig,
}

impl IoResolver {
    pub fn new(processing: ProcessingConfig, output: OutputConfig) -> Self {
        Self { processing, output }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.processing.clone(), config.output.clone())
    }

    /// Whether decoded images should be memoized on records.
    pub fn store_images(&self) -> bool {
        self.processing.store_images
    }

    /// Expand a comma-separated list of files, directories and glob patterns.
    ///
    /// Directories are walked recursively. Results are absolute, filtered by
    /// supported extension and deduplicated, keeping first-seen order; each
    /// directory or glob contributes its matches sorted by path.
    pub fn resolve(&self, spec: &str) -> Result<Vec<PathBuf>, FieldError> {
        let mut seen = HashSet::new();
        let mut paths = Vec::new();

        for token in split_tokens(spec) {
            let expanded = shellexpand::tilde(&token).into_owned();
            let candidate = Path::new(&expanded);

            let found = if candidate.is_dir() {
                self.walk(candidate)
            } else if candidate.is_file() {
                vec![candidate.to_path_buf()]
            } else {
                self.glob(&expanded)?
            };

            for path in found {
                if !self.is_supported(&path) {
                    continue;
                }
                let absolute = absolute(&path);
                if seen.insert(absolute.clone()) {
                    paths.push(absolute);
                }
            }
        }

        if paths.is_empty() && !spec.trim().is_empty() {
            return Err(FieldError::NoImages {
                spec: spec.to_string(),
            });
        }
        Ok(paths)
    }

    fn walk(&self, dir: &Path) -> Vec<PathBuf> {
        let mut files: Vec<PathBuf> = WalkDir::new(dir)
            .follow_links(true)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .map(|e| e.into_path())
            .collect();
        files.sort();
        files
    }

    fn glob(&self, pattern: &str) -> Result<Vec<PathBuf>, FieldError> {
        let entries = glob::glob(pattern).map_err(|e| FieldError::InvalidGlob {
            pattern: pattern.to_string(),
            message: e.to_string(),
        })?;

        let mut files = Vec::new();
        for entry in entries.filter_map(|e| e.ok()) {
            if entry.is_dir() {
                files.extend(self.walk(&entry));
            } else if entry.is_file() {
                files.push(entry);
            }
        }
        files.sort();
        Ok(files)
    }

    /// Parse an output directory field. An empty value disables it.
    pub fn parse_output_dir(&self, raw: &str) -> Result<Option<PathBuf>, FieldError> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Ok(None);
        }
        let dir = PathBuf::from(shellexpand::tilde(raw).into_owned());
        if dir.exists() && !dir.is_dir() {
            return Err(FieldError::NotADirectory { path: dir });
        }
        Ok(Some(absolute(&dir)))
    }

    /// Tags file location for an input.
    ///
    /// With an output directory the file is `<dir>/<stem>.<ext>`; otherwise
    /// it sits beside the input when `output.sidecar_beside_input` is set.
    pub fn output_path(&self, input: &Path, output_dir: Option<&Path>) -> Option<PathBuf> {
        let ext = self.output.sidecar_extension.trim_start_matches('.');
        match output_dir {
            Some(dir) => {
                let stem = input.file_stem()?;
                let mut name = stem.to_os_string();
                name.push(".");
                name.push(ext);
                Some(dir.join(name))
            }
            None if self.output.sidecar_beside_input => Some(input.with_extension(ext)),
            None => None,
        }
    }

    /// Build fresh records for resolved paths.
    pub fn records(&self, paths: Vec<PathBuf>, output_dir: Option<&Path>) -> Vec<ImageRecord> {
        paths
            .into_iter()
            .map(|path| ImageRecord {
                output_path: self.output_path(&path, output_dir),
                output_dir: output_dir.map(Path::to_path_buf),
                path,
                content_hash: None,
                image: None,
            })
            .collect()
    }

    /// Point existing records at a new output directory, keeping what was
    /// already read from them.
    pub fn retarget(&self, records: &mut [ImageRecord], output_dir: Option<&Path>) {
        for record in records {
            record.output_path = self.output_path(&record.path, output_dir);
            record.output_dir = output_dir.map(Path::to_path_buf);
        }
    }

    /// Check if a file has a supported extension.
    fn is_supported(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| {
                let ext_lower = ext.to_lowercase();
                self.processing
                    .supported_formats
                    .iter()
                    .any(|fmt| fmt.to_lowercase() == ext_lower)
            })
            .unwrap_or(false)
    }
}

fn absolute(path: &Path) -> PathBuf {
    std::fs::canonicalize(path)
        .or_else(|_| std::path::absolute(path))
        .unwrap_or_else(|_| path.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolver() -> IoResolver {
        IoResolver::new(ProcessingConfig::default(), OutputConfig::default())
    }

    fn touch(dir: &Path, name: &str) -> PathBuf {
        let path = dir.join(name);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(&path, b"x").unwrap();
        path
    }

    #[test]
    fn test_is_supported() {
        let resolver = resolver();
        assert!(resolver.is_supported(Path::new("test.jpg")));
        assert!(resolver.is_supported(Path::new("test.JPG")));
        assert!(resolver.is_supported(Path::new("test.webp")));
        assert!(!resolver.is_supported(Path::new("test.txt")));
        assert!(!resolver.is_supported(Path::new("noext")));
    }

    #[test]
    fn test_resolve_directory_recursively_sorted() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "b.png");
        touch(dir.path(), "a.jpg");
        touch(dir.path(), "sub/c.webp");
        touch(dir.path(), "notes.txt");

        let paths = resolver().resolve(dir.path().to_str().unwrap()).unwrap();
        let names: Vec<_> = paths
            .iter()
            .map(|p| p.file_name().unwrap().to_str().unwrap().to_string())
            .collect();
        assert_eq!(names, vec!["a.jpg", "b.png", "c.webp"]);
        assert!(paths.iter().all(|p| p.is_absolute()));
    }

    #[test]
    fn test_resolve_glob_and_dedup_keeps_first_order() {
        let dir = tempfile::tempdir().unwrap();
        let b = touch(dir.path(), "b.png");
        touch(dir.path(), "a.png");

        let spec = format!(
            "{}, {}/*.png",
            b.display(),
            dir.path().display()
        );
        let paths = resolver().resolve(&spec).unwrap();
        assert_eq!(paths.len(), 2);
        assert_eq!(paths[0].file_name().unwrap(), "b.png");
        assert_eq!(paths[1].file_name().unwrap(), "a.png");
    }

    #[test]
    fn test_resolve_reports_no_images() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "notes.txt");
        let err = resolver()
            .resolve(&format!("{}/*.png", dir.path().display()))
            .unwrap_err();
        assert!(matches!(err, FieldError::NoImages { .. }));
    }

    #[test]
    fn test_resolve_invalid_glob() {
        let err = resolver().resolve("/tmp/[unclosed").unwrap_err();
        assert!(matches!(err, FieldError::InvalidGlob { .. }));
    }

    #[test]
    fn test_empty_spec_resolves_to_nothing() {
        assert!(resolver().resolve("  ").unwrap().is_empty());
    }

    #[test]
    fn test_output_paths() {
        let resolver = resolver();
        let input = Path::new("/in/cat.photo.png");
        assert_eq!(
            resolver.output_path(input, Some(Path::new("/out"))),
            Some(PathBuf::from("/out/cat.photo.txt"))
        );
        assert_eq!(resolver.output_path(input, None), None);

        let beside = IoResolver::new(
            ProcessingConfig::default(),
            OutputConfig {
                sidecar_beside_input: true,
                ..OutputConfig::default()
            },
        );
        assert_eq!(
            beside.output_path(input, None),
            Some(PathBuf::from("/in/cat.photo.txt"))
        );
    }

    #[test]
    fn test_parse_output_dir_rejects_files() {
        let dir = tempfile::tempdir().unwrap();
        let file = touch(dir.path(), "a.png");
        let resolver = resolver();
        assert!(matches!(
            resolver.parse_output_dir(file.to_str().unwrap()),
            Err(FieldError::NotADirectory { .. })
        ));
        assert_eq!(resolver.parse_output_dir("").unwrap(), None);
        assert!(resolver
            .parse_output_dir(dir.path().join("new").to_str().unwrap())
            .unwrap()
            .is_some());
    }

    #[test]
    fn test_records_carry_pending_output_dir() {
        let resolver = resolver();
        let mut records =
            resolver.records(vec![PathBuf::from("/in/a.png")], Some(Path::new("/out")));
        assert_eq!(records[0].output_path, Some(PathBuf::from("/out/a.txt")));
        assert_eq!(records[0].take_output_dir(), Some(PathBuf::from("/out")));
        assert_eq!(records[0].take_output_dir(), None);

        resolver.retarget(&mut records, None);
        assert_eq!(records[0].output_path, None);
    }
}
