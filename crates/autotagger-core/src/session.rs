//! The tagging session: every piece of mutable state for one tagging run.
//!
//! A [`TaggingSession`] owns the filter fields, the resolved input records,
//! the query cache and the aggregate window. It is injected into the
//! [`Interrogator`](crate::interrogator::Interrogator) for each call, and
//! only one caller writes to it at a time.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::aggregate::AggregateState;
use crate::cache::QueryCache;
use crate::config::{Config, SessionConfig};
use crate::error::FieldError;
use crate::filter::{FilterSettings, FilterSpec};
use crate::pipeline::{ImageRecord, IoResolver};
use crate::types::QueryOutput;

/// A user-settable text field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    Threshold,
    Add,
    Keep,
    Exclude,
    Search,
    Replace,
    InputGlob,
    OutputDir,
}

impl Field {
    pub const ALL: [Field; 8] = [
        Field::Threshold,
        Field::Add,
        Field::Keep,
        Field::Exclude,
        Field::Search,
        Field::Replace,
        Field::InputGlob,
        Field::OutputDir,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Field::Threshold => "threshold",
            Field::Add => "add",
            Field::Keep => "keep",
            Field::Exclude => "exclude",
            Field::Search => "search",
            Field::Replace => "replace",
            Field::InputGlob => "input_glob",
            Field::OutputDir => "output_dir",
        }
    }

    /// Error slot; search and replace are validated as a pair and share one.
    pub fn error_slot(self) -> &'static str {
        match self {
            Field::Search | Field::Replace => "search_replace",
            other => other.name(),
        }
    }
}

impl std::str::FromStr for Field {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Field::ALL
            .into_iter()
            .find(|f| f.name() == s)
            .ok_or_else(|| format!("unknown field '{}'", s))
    }
}

/// A boolean session option.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flag {
    Cumulative,
    LargeQuery,
    UnloadAfter,
}

/// Outcome of [`TaggingSession::set`].
#[derive(Debug, Clone, PartialEq)]
pub enum Update {
    /// The value equals the stored one; nothing was touched
    Unchanged(String),
    /// The value was validated and stored
    Applied(String),
    /// The value was rejected; `current` is still in effect
    Rejected { current: String, error: FieldError },
}

impl Update {
    /// The value in effect after the update.
    pub fn value(&self) -> &str {
        match self {
            Update::Unchanged(v) | Update::Applied(v) => v,
            Update::Rejected { current, .. } => current,
        }
    }

    pub fn error(&self) -> Option<&FieldError> {
        match self {
            Update::Rejected { error, .. } => Some(error),
            _ => None,
        }
    }
}

/// State for one tagging run.
pub struct TaggingSession {
    settings: FilterSettings,
    filters: FilterSpec,
    resolver: IoResolver,
    raw: HashMap<Field, String>,
    errors: HashMap<&'static str, FieldError>,
    flags: SessionConfig,
    output_dir: Option<PathBuf>,
    images: Vec<ImageRecord>,
    cache: QueryCache,
    aggregate: AggregateState,
    last_output: Option<QueryOutput>,
}

impl TaggingSession {
    pub fn new(settings: FilterSettings, resolver: IoResolver, flags: SessionConfig) -> Self {
        let filters = FilterSpec::from_settings(&settings);
        let mut raw: HashMap<Field, String> =
            Field::ALL.into_iter().map(|f| (f, String::new())).collect();
        raw.insert(Field::Threshold, filters.threshold.to_string());

        Self {
            settings,
            filters,
            resolver,
            raw,
            errors: HashMap::new(),
            flags,
            output_dir: None,
            images: Vec::new(),
            cache: QueryCache::new(),
            aggregate: AggregateState::new(),
            last_output: None,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            config.filter.clone(),
            IoResolver::from_config(config),
            config.session.clone(),
        )
    }

    /// Single update entry point for every text field.
    ///
    /// Setting the stored value again is a no-op. A valid value replaces only
    /// its own field and clears that field's error; a new input glob also
    /// drops the cache and the aggregate window. An invalid value leaves the
    /// session untouched apart from recording the field's error.
    pub fn set(&mut self, field: Field, value: &str) -> Update {
        let current = self.value(field).to_string();
        if value == current {
            return Update::Unchanged(current);
        }

        match self.apply(field, value) {
            Ok(()) => {
                self.raw.insert(field, value.to_string());
                self.errors.remove(field.error_slot());
                tracing::debug!("Set {} = {:?}", field.name(), value);
                Update::Applied(value.to_string())
            }
            Err(error) => {
                tracing::debug!("Rejected {} = {:?}: {}", field.name(), value, error);
                self.errors.insert(field.error_slot(), error.clone());
                Update::Rejected { current, error }
            }
        }
    }

    fn apply(&mut self, field: Field, value: &str) -> Result<(), FieldError> {
        match field {
            Field::Threshold => self.filters.set_threshold(value),
            Field::Add => self.filters.set_add(value),
            Field::Keep => self.filters.set_keep(value),
            Field::Exclude => self.filters.set_exclude(value),
            Field::Search => self.filters.set_search(value),
            Field::Replace => self.filters.set_replace(value),
            Field::InputGlob => {
                let paths = self.resolver.resolve(value)?;
                tracing::info!("Resolved {} images from {:?}", paths.len(), value);
                self.images = self.resolver.records(paths, self.output_dir.as_deref());
                self.cache.clear();
                self.aggregate.clear();
                Ok(())
            }
            Field::OutputDir => {
                let dir = self.resolver.parse_output_dir(value)?;
                self.resolver.retarget(&mut self.images, dir.as_deref());
                self.output_dir = dir;
                Ok(())
            }
        }
    }

    /// Flip a boolean option and return its new value.
    pub fn toggle(&mut self, flag: Flag) -> bool {
        let slot = match flag {
            Flag::Cumulative => &mut self.flags.cumulative,
            Flag::LargeQuery => &mut self.flags.large_query,
            Flag::UnloadAfter => &mut self.flags.unload_after,
        };
        *slot = !*slot;
        *slot
    }

    pub fn flag(&self, flag: Flag) -> bool {
        match flag {
            Flag::Cumulative => self.flags.cumulative,
            Flag::LargeQuery => self.flags.large_query,
            Flag::UnloadAfter => self.flags.unload_after,
        }
    }

    /// Raw text currently stored for a field.
    pub fn value(&self, field: Field) -> &str {
        self.raw.get(&field).map(String::as_str).unwrap_or("")
    }

    /// Most recent error for a field, kept until the field is set successfully.
    pub fn error(&self, field: Field) -> Option<&FieldError> {
        self.errors.get(field.error_slot())
    }

    pub fn settings(&self) -> &FilterSettings {
        &self.settings
    }

    pub fn filters(&self) -> &FilterSpec {
        &self.filters
    }

    pub fn output_dir(&self) -> Option<&Path> {
        self.output_dir.as_deref()
    }

    pub fn images(&self) -> &[ImageRecord] {
        &self.images
    }

    pub fn cache(&self) -> &QueryCache {
        &self.cache
    }

    pub fn aggregate(&self) -> &AggregateState {
        &self.aggregate
    }

    pub(crate) fn resolver(&self) -> &IoResolver {
        &self.resolver
    }

    /// The output of the last successful invocation.
    pub fn last_output(&self) -> Option<&QueryOutput> {
        self.last_output.as_ref()
    }

    pub(crate) fn set_last_output(&mut self, output: QueryOutput) {
        self.last_output = Some(output);
    }

    pub(crate) fn clear_last_output(&mut self) {
        self.last_output = None;
    }

    /// Split borrows for the orchestrator.
    pub(crate) fn parts_mut(&mut self) -> SessionParts<'_> {
        SessionParts {
            settings: &self.settings,
            filters: &self.filters,
            resolver: &self.resolver,
            images: &mut self.images,
            cache: &mut self.cache,
            aggregate: &mut self.aggregate,
        }
    }
}

/// Disjoint borrows of a session's fields.
pub(crate) struct SessionParts<'a> {
    pub settings: &'a FilterSettings,
    pub filters: &'a FilterSpec,
    pub resolver: &'a IoResolver,
    pub images: &'a mut Vec<ImageRecord>,
    pub cache: &'a mut QueryCache,
    pub aggregate: &'a mut AggregateState,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::QueryKey;
    use crate::config::{OutputConfig, ProcessingConfig};
    use crate::types::ModelOutput;

    fn session() -> TaggingSession {
        TaggingSession::new(
            FilterSettings::default(),
            IoResolver::new(ProcessingConfig::default(), OutputConfig::default()),
            SessionConfig::default(),
        )
    }

    fn image_dir() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        for name in ["a.png", "b.png"] {
            image::RgbImage::new(2, 2).save(dir.path().join(name)).unwrap();
        }
        dir
    }

    #[test]
    fn test_threshold_starts_at_settings_default() {
        let session = session();
        assert_eq!(session.filters().threshold, 0.35);
        assert_eq!(session.value(Field::Threshold), "0.35");
    }

    #[test]
    fn test_setting_current_value_is_noop() {
        let mut session = session();
        session.cache.record(QueryKey::new("h", "m"), ModelOutput::default());

        let current = session.value(Field::Threshold).to_string();
        let update = session.set(Field::Threshold, &current);
        assert_eq!(update, Update::Unchanged(current));
        assert!(update.error().is_none());
        assert_eq!(session.cache().len(), 1);
    }

    #[test]
    fn test_rejected_update_keeps_old_value_and_other_fields() {
        let mut session = session();
        session.set(Field::Keep, "smile");
        session.set(Field::Threshold, "0.5");

        let update = session.set(Field::Threshold, "lots");
        assert!(matches!(update, Update::Rejected { ref current, .. } if current == "0.5"));
        assert_eq!(session.filters().threshold, 0.5);
        assert_eq!(session.filters().keep, vec!["smile"]);
        assert!(session.error(Field::Threshold).is_some());
        assert!(session.error(Field::Keep).is_none());
    }

    #[test]
    fn test_error_cleared_by_next_successful_set() {
        let mut session = session();
        session.set(Field::Threshold, "2");
        assert!(session.error(Field::Threshold).is_some());
        session.set(Field::Threshold, "0.6");
        assert!(session.error(Field::Threshold).is_none());
    }

    #[test]
    fn test_search_and_replace_share_error_slot() {
        let mut session = session();
        session.set(Field::Search, "a");
        let update = session.set(Field::Replace, "x,y");
        assert!(matches!(
            update.error(),
            Some(FieldError::ReplaceLongerThanSearch { .. })
        ));
        assert!(session.error(Field::Search).is_some());

        session.set(Field::Search, "a,b");
        assert!(session.error(Field::Replace).is_none());
    }

    #[test]
    fn test_input_glob_resolves_and_clears_cache() {
        let dir = image_dir();
        let mut session = session();
        session.cache.record(QueryKey::new("h", "m"), ModelOutput::default());

        let update = session.set(Field::InputGlob, dir.path().to_str().unwrap());
        assert!(matches!(update, Update::Applied(_)));
        assert_eq!(session.images().len(), 2);
        assert!(session.cache().is_empty());
        assert!(session.aggregate().is_empty());
    }

    #[test]
    fn test_bad_input_glob_keeps_images_and_cache() {
        let dir = image_dir();
        let mut session = session();
        session.set(Field::InputGlob, dir.path().to_str().unwrap());
        session.cache.record(QueryKey::new("h", "m"), ModelOutput::default());

        let update = session.set(Field::InputGlob, "/definitely/missing/*.png");
        assert!(matches!(update.error(), Some(FieldError::NoImages { .. })));
        assert_eq!(session.images().len(), 2);
        assert_eq!(session.cache().len(), 1);
    }

    #[test]
    fn test_output_dir_retargets_records() {
        let dir = image_dir();
        let out = tempfile::tempdir().unwrap();
        let mut session = session();
        session.set(Field::InputGlob, dir.path().to_str().unwrap());
        assert!(session.images()[0].output_path.is_none());

        session.set(Field::OutputDir, out.path().to_str().unwrap());
        let output_path = session.images()[0].output_path.clone().unwrap();
        assert_eq!(output_path.extension().unwrap(), "txt");
        assert!(session.output_dir().is_some());
    }

    #[test]
    fn test_toggle_flags() {
        let mut session = session();
        assert!(!session.flag(Flag::Cumulative));
        assert!(session.toggle(Flag::Cumulative));
        assert!(session.flag(Flag::Cumulative));
        assert!(!session.toggle(Flag::Cumulative));
    }

    #[test]
    fn test_field_from_str() {
        assert_eq!("input_glob".parse::<Field>().unwrap(), Field::InputGlob);
        assert!("bogus".parse::<Field>().is_err());
    }
}
