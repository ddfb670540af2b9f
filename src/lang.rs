//! Spoken-language classification for outbound utterances
//!
//! When the session preference is `auto`, the language tag attached to a
//! message is chosen by script detection: any character in the Arabic/Persian
//! Unicode blocks selects the Persian tag, everything else falls back to the
//! default. A fixed preference short-circuits detection entirely.

use serde::{Deserialize, Serialize};

/// Tag used when detection finds no Persian script
pub const DEFAULT_TAG: &str = "en-US";

/// Tag selected when Persian script is present
pub const PERSIAN_TAG: &str = "fa-IR";

/// Session-level language preference
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum LangPreference {
    /// Classify each utterance by its script
    Auto,
    /// Always use this tag, regardless of content
    Fixed(String),
}

impl Default for LangPreference {
    fn default() -> Self {
        LangPreference::Auto
    }
}

impl From<String> for LangPreference {
    fn from(value: String) -> Self {
        if value.eq_ignore_ascii_case("auto") {
            LangPreference::Auto
        } else {
            LangPreference::Fixed(value)
        }
    }
}

impl From<LangPreference> for String {
    fn from(value: LangPreference) -> Self {
        match value {
            LangPreference::Auto => "auto".to_string(),
            LangPreference::Fixed(tag) => tag,
        }
    }
}

impl std::fmt::Display for LangPreference {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LangPreference::Auto => write!(f, "auto"),
            LangPreference::Fixed(tag) => write!(f, "{}", tag),
        }
    }
}

/// Resolve the language tag for `text` under `preference`
///
/// Deterministic and total: empty or script-free input yields the default.
pub fn classify(text: &str, preference: &LangPreference) -> String {
    match preference {
        LangPreference::Fixed(tag) => tag.clone(),
        LangPreference::Auto => {
            if contains_persian(text) {
                PERSIAN_TAG.to_string()
            } else {
                DEFAULT_TAG.to_string()
            }
        }
    }
}

/// The primary subtag of a BCP-47-like tag, e.g. `fa` from `fa-IR`
pub fn primary_subtag(lang: &str) -> &str {
    lang.split('-').next().unwrap_or(lang)
}

/// True if any character falls in the Arabic/Persian Unicode blocks
/// (U+0600-06FF, U+0750-077F, U+08A0-08FF)
fn contains_persian(text: &str) -> bool {
    text.chars().any(|c| {
        matches!(c,
            '\u{0600}'..='\u{06FF}' | '\u{0750}'..='\u{077F}' | '\u{08A0}'..='\u{08FF}')
    })
}
