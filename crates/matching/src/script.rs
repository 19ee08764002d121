//! Script detection and text normalization
//!
//! Text is canonicalized before any comparison:
//! - Whitespace is trimmed and collapsed
//! - Case is folded
//! - Latin-script text loses its diacritics (`José` -> `jose`)
//! - Ethiopic-script text has homophone glyph families folded onto one
//!   representative, using a per-language table
//!
//! Normalized text is only ever used for comparison.

use serde::{Deserialize, Serialize};
use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

/// Unicode blocks flagged as Ethiopic script
const ETHIOPIC_RANGES: &[(char, char)] = &[
    ('\u{1200}', '\u{139F}'), // Ethiopic, Ethiopic Supplement
    ('\u{2D80}', '\u{2DDF}'), // Ethiopic Extended
    ('\u{AB00}', '\u{AB2F}'), // Ethiopic Extended-A
];

/// Number of vowel orders in a syllable series
const SERIES_ORDERS: u32 = 7;

/// Amharic homophones: ሐ, ኀ -> ሀ; ሠ -> ሰ; ዐ -> አ; ፀ -> ጸ
const AMHARIC_FOLDS: &[(u32, u32)] = &[
    (0x1210, 0x1200),
    (0x1280, 0x1200),
    (0x1220, 0x1230),
    (0x12D0, 0x12A0),
    (0x1340, 0x1338),
];

/// Tigrinya keeps ሀ/ሐ/ኀ and አ/ዐ apart
const TIGRINYA_FOLDS: &[(u32, u32)] = &[(0x1220, 0x1230), (0x1340, 0x1338)];

/// Script family of a piece of text
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Script {
    Latin,
    Ethiopic,
}

/// Languages with dedicated normalization rules
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Language {
    #[default]
    #[serde(rename = "en")]
    English,
    #[serde(rename = "am")]
    Amharic,
    #[serde(rename = "ti")]
    Tigrinya,
    #[serde(rename = "om")]
    Oromo,
}

impl Language {
    /// Script the language is written in
    pub fn script(self) -> Script {
        match self {
            Language::English | Language::Oromo => Script::Latin,
            Language::Amharic | Language::Tigrinya => Script::Ethiopic,
        }
    }

    fn fold_table(self) -> &'static [(u32, u32)] {
        match self {
            Language::Amharic => AMHARIC_FOLDS,
            Language::Tigrinya => TIGRINYA_FOLDS,
            Language::English | Language::Oromo => &[],
        }
    }
}

/// Language settings used during normalization
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LanguageConfig {
    /// Language assumed for text when detection is off or inconclusive
    pub default_language: Language,
    /// Flag Ethiopic text regardless of the default language
    pub enable_script_detection: bool,
}

impl Default for LanguageConfig {
    fn default() -> Self {
        Self {
            default_language: Language::English,
            enable_script_detection: true,
        }
    }
}

impl LanguageConfig {
    pub fn new(default_language: Language) -> Self {
        Self {
            default_language,
            ..Default::default()
        }
    }

    pub fn with_script_detection(mut self, enabled: bool) -> Self {
        self.enable_script_detection = enabled;
        self
    }
}

/// Whether a character belongs to one of the Ethiopic blocks
pub fn is_ethiopic(c: char) -> bool {
    ETHIOPIC_RANGES
        .iter()
        .any(|&(start, end)| (start..=end).contains(&c))
}

/// Detect the script family of a piece of text
pub fn detect_script(text: &str) -> Script {
    if text.chars().any(is_ethiopic) {
        Script::Ethiopic
    } else {
        Script::Latin
    }
}

fn fold_glyph(c: char, table: &[(u32, u32)]) -> char {
    let code = c as u32;
    for &(from, to) in table {
        if (from..from + SERIES_ORDERS).contains(&code) {
            return char::from_u32(to + (code - from)).unwrap_or(c);
        }
    }
    c
}

/// Text normalizer driven by a [`LanguageConfig`]
#[derive(Debug, Clone, Copy, Default)]
pub struct ScriptNormalizer {
    config: LanguageConfig,
}

impl ScriptNormalizer {
    pub fn new(config: LanguageConfig) -> Self {
        Self { config }
    }

    /// Language whose rules apply to `text`
    pub fn effective_language(&self, text: &str) -> Language {
        let default = self.config.default_language;
        if !self.config.enable_script_detection {
            return default;
        }

        match (detect_script(text), default.script()) {
            (Script::Ethiopic, Script::Latin) => Language::Amharic,
            (Script::Latin, Script::Ethiopic) => Language::English,
            _ => default,
        }
    }

    /// Canonicalize text for comparison
    pub fn normalize(&self, text: &str) -> String {
        let collapsed = text.split_whitespace().collect::<Vec<_>>().join(" ");
        if collapsed.is_empty() {
            return collapsed;
        }

        let language = self.effective_language(&collapsed);
        match language.script() {
            Script::Latin => collapsed
                .nfkd()
                .filter(|c| !is_combining_mark(*c))
                .collect::<String>()
                .to_lowercase(),
            Script::Ethiopic => {
                let table = language.fold_table();
                collapsed
                    .nfc()
                    .map(|c| fold_glyph(c, table))
                    .collect::<String>()
                    .to_lowercase()
            }
        }
    }
}
