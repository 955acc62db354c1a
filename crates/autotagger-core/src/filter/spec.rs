//! The ordered filter chain applied to every model output.

use std::collections::{HashMap, HashSet};

use crate::error::FieldError;
use crate::types::{Confidences, ModelOutput};

use super::tokens::parse_list;
use super::FilterSettings;

/// Confidence given to tags injected through the add list.
pub const ADD_CONFIDENCE: f32 = 1.0;

/// User-editable filter fields.
///
/// Each setter parses into a fresh value and only assigns it on success, so
/// a rejected update never disturbs any field.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterSpec {
    pub threshold: f32,
    pub keep: Vec<String>,
    pub exclude: Vec<String>,
    pub add: Vec<String>,
    pub search: Vec<String>,
    pub replace: Vec<String>,
}

impl Default for FilterSpec {
    fn default() -> Self {
        Self::from_settings(&FilterSettings::default())
    }
}

impl FilterSpec {
    /// An empty chain using the configured default threshold.
    pub fn from_settings(settings: &FilterSettings) -> Self {
        Self {
            threshold: settings.threshold,
            keep: vec![],
            exclude: vec![],
            add: vec![],
            search: vec![],
            replace: vec![],
        }
    }

    pub fn set_threshold(&mut self, raw: &str) -> Result<(), FieldError> {
        let value: f32 = raw.trim().parse().map_err(|_| FieldError::NotANumber {
            value: raw.to_string(),
        })?;
        if !(0.0..=1.0).contains(&value) {
            return Err(FieldError::ThresholdOutOfRange { value });
        }
        self.threshold = value;
        Ok(())
    }

    pub fn set_keep(&mut self, raw: &str) -> Result<(), FieldError> {
        self.keep = parse_list(raw)?;
        Ok(())
    }

    pub fn set_exclude(&mut self, raw: &str) -> Result<(), FieldError> {
        self.exclude = parse_list(raw)?;
        Ok(())
    }

    pub fn set_add(&mut self, raw: &str) -> Result<(), FieldError> {
        self.add = parse_list(raw)?;
        Ok(())
    }

    /// Replace the search list; validated against the current replace list.
    pub fn set_search(&mut self, raw: &str) -> Result<(), FieldError> {
        let search = parse_list(raw)?;
        validate_pairs(&search, &self.replace)?;
        self.search = search;
        Ok(())
    }

    /// Replace the replace list; validated against the current search list.
    pub fn set_replace(&mut self, raw: &str) -> Result<(), FieldError> {
        let replace = parse_list(raw)?;
        validate_pairs(&self.search, &replace)?;
        self.replace = replace;
        Ok(())
    }

    /// Search token → replacement, positional. A missing replacement is `""`.
    fn replacements(&self) -> HashMap<&str, &str> {
        self.search
            .iter()
            .enumerate()
            .map(|(i, s)| {
                let r = self.replace.get(i).map(String::as_str).unwrap_or("");
                (s.as_str(), r)
            })
            .collect()
    }

    /// Run the chain over one (possibly merged) model output.
    ///
    /// Stage order is fixed: threshold cut (keep and add tokens bypass it),
    /// exclude, search/replace, add union. Ratings pass through untouched.
    pub fn apply(&self, settings: &FilterSettings, output: &ModelOutput) -> ModelOutput {
        let keep: HashSet<&str> = self
            .keep
            .iter()
            .chain(settings.keep_tokens.iter())
            .map(String::as_str)
            .collect();
        let add: HashSet<&str> = self.add.iter().map(String::as_str).collect();
        let exclude: HashSet<&str> = self.exclude.iter().map(String::as_str).collect();
        let replacements = self.replacements();

        let mut tags = Confidences::with_capacity(output.tags.len().min(256));
        for (raw_name, &confidence) in &output.tags {
            let name = settings.display_name(raw_name);
            let name = name.as_ref();

            // NaN never passes the cut
            let above = confidence >= self.threshold;
            if !above && !keep.contains(name) && !add.contains(name) {
                continue;
            }
            if exclude.contains(name) {
                continue;
            }
            let name = match replacements.get(name) {
                Some(renamed) if renamed.is_empty() => continue,
                Some(renamed) => *renamed,
                None => name,
            };
            tags.entry(name.to_string())
                .and_modify(|c| *c = c.max(confidence))
                .or_insert(confidence);
        }

        for name in &self.add {
            tags.entry(name.clone()).or_insert(ADD_CONFIDENCE);
        }

        ModelOutput {
            ratings: output.ratings.clone(),
            tags,
        }
    }
}

fn validate_pairs(search: &[String], replace: &[String]) -> Result<(), FieldError> {
    if replace.len() > search.len() {
        return Err(FieldError::ReplaceLongerThanSearch {
            search: search.len(),
            replace: replace.len(),
        });
    }
    let mut seen = HashSet::new();
    if let Some(dup) = search.iter().find(|s| !seen.insert(s.as_str())) {
        return Err(FieldError::DuplicateSearchToken { token: dup.clone() });
    }
    Ok(())
}
