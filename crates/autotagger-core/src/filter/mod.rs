//! Tag filtering: process-wide filter settings and the per-session filter chain.
//!
//! [`FilterSettings`] is loaded once from the config file and never changes
//! during a run. [`FilterSpec`] holds the user-editable fields and applies
//! the ordered chain: threshold cut, exclude, search/replace, add.

pub mod spec;
pub mod tokens;

pub use spec::{FilterSpec, ADD_CONFIDENCE};
pub use tokens::{parse_list, split_tokens};

use serde::{Deserialize, Serialize};
use std::borrow::Cow;

/// Tags that read as emoticons and keep their underscores.
const DEFAULT_KAOMOJIS: &[&str] = &[
    "0_0", "(o)_(o)", "+_+", "+_-", "._.", "<o>_<o>", "<|>_<|>", "=_=", ">_<", "3_3", "6_6",
    ">_o", "@_@", "^_^", "o_o", "u_u", "x_x", "|_|", "||_||",
];

/// Immutable filter defaults shared by every session.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterSettings {
    /// Default confidence threshold for a new session
    pub threshold: f32,

    /// Tags that always survive the threshold cut
    pub keep_tokens: Vec<String>,

    /// Replace underscores in tag names with spaces
    pub replace_underscores: bool,

    /// Tag names exempt from underscore replacement
    pub kaomojis: Vec<String>,
}

impl Default for FilterSettings {
    fn default() -> Self {
        Self {
            threshold: 0.35,
            keep_tokens: vec![],
            replace_underscores: false,
            kaomojis: DEFAULT_KAOMOJIS.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl FilterSettings {
    /// The name a model tag is filtered and reported under.
    pub fn display_name<'a>(&self, raw: &'a str) -> Cow<'a, str> {
        if self.replace_underscores
            && raw.contains('_')
            && !self.kaomojis.iter().any(|k| k == raw)
        {
            Cow::Owned(raw.replace('_', " "))
        } else {
            Cow::Borrowed(raw)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_name_untouched_by_default() {
        let settings = FilterSettings::default();
        assert_eq!(settings.display_name("long_hair"), "long_hair");
    }

    #[test]
    fn test_display_name_replaces_underscores_except_kaomojis() {
        let settings = FilterSettings {
            replace_underscores: true,
            ..FilterSettings::default()
        };
        assert_eq!(settings.display_name("long_hair"), "long hair");
        assert_eq!(settings.display_name("^_^"), "^_^");
        assert!(matches!(settings.display_name("solo"), Cow::Borrowed(_)));
    }
}
