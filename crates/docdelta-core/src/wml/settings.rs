use super::document::WmlDocument;
use crate::error::{CompareError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// Knobs for one comparison. Deserializable from partial JSON; missing
/// fields take their defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WmlComparerSettings {
    /// Characters that end a word. Whitespace always does.
    pub word_separators: Vec<char>,

    /// Written as `w:author`. Unset means the revised document's
    /// `cp:lastModifiedBy`, then `dc:creator`, then "docdelta".
    pub author_for_revisions: Option<String>,

    /// Written as `w:date` (ISO 8601). Unset means the revised document's
    /// `dcterms:modified`, then the current time.
    pub date_time_for_revisions: Option<String>,

    /// Minimum share of matched units (0.0-1.0] a word-level match must
    /// cover before it is accepted. Below it the whole span is replaced.
    pub detail_threshold: f64,

    /// Fold case before hashing text.
    pub case_insensitive: bool,

    /// U+00A0 hashes like a plain space.
    pub conflate_breaking_and_nonbreaking_spaces: bool,

    /// Emit `w:rPrChange`/`w:pPrChange` for equal content whose properties differ.
    pub track_formatting_changes: bool,

    /// Locale for case folding, e.g. "tr-TR". Only read when `case_insensitive`.
    pub culture_info: Option<String>,

    /// Lowest id handed to a note that has to be renumbered.
    pub starting_id_for_footnotes_endnotes: i32,

    /// Whether deleted/inserted spans with identical content are reported
    /// as moves.
    pub detect_moves: bool,

    /// Minimum number of words a span needs before it can be a move.
    pub move_min_words: usize,

    /// When set, atom lists, unit trees and the edit script of every
    /// comparison are written to this directory.
    pub debug_output_dir: Option<PathBuf>,
}

impl Default for WmlComparerSettings {
    fn default() -> Self {
        Self {
            word_separators: vec![
                ' ', '-', ')', '(', ';', ',',
                // Currency symbols: "$100" vs "$200" keeps "$" equal
                '$', '€', '£', '¥', '¢', '₹', '₽', '₩', '₪', '฿',
                '（', // U+FF08 FULLWIDTH LEFT PARENTHESIS
                '）', // U+FF09 FULLWIDTH RIGHT PARENTHESIS
                '，', // U+FF0C FULLWIDTH COMMA
                '、', // U+3001 IDEOGRAPHIC COMMA
                '、',
                '，',
                '；', // U+FF1B FULLWIDTH SEMICOLON
                '。', // U+3002 IDEOGRAPHIC FULL STOP
                '：', // U+FF1A FULLWIDTH COLON
                '的', // U+7684 Chinese possessive particle
            ],
            author_for_revisions: None,
            date_time_for_revisions: None,
            detail_threshold: 0.15,
            case_insensitive: false,
            conflate_breaking_and_nonbreaking_spaces: true,
            track_formatting_changes: true,
            culture_info: None,
            starting_id_for_footnotes_endnotes: 1,
            detect_moves: true,
            move_min_words: 3,
            debug_output_dir: None,
        }
    }
}

impl WmlComparerSettings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_author(mut self, author: impl Into<String>) -> Self {
        self.author_for_revisions = Some(author.into());
        self
    }

    pub fn with_case_insensitive(mut self, case_insensitive: bool) -> Self {
        self.case_insensitive = case_insensitive;
        self
    }

    pub fn with_track_formatting(mut self, track: bool) -> Self {
        self.track_formatting_changes = track;
        self
    }

    pub fn with_culture_info(mut self, culture: impl Into<String>) -> Self {
        self.culture_info = Some(culture.into());
        self
    }

    /// Any string is accepted; it is written verbatim.
    pub fn with_date_time(mut self, date_time: impl Into<String>) -> Self {
        self.date_time_for_revisions = Some(date_time.into());
        self
    }

    pub fn with_detail_threshold(mut self, threshold: f64) -> Self {
        self.detail_threshold = threshold;
        self
    }

    pub fn with_move_detection(mut self, detect: bool) -> Self {
        self.detect_moves = detect;
        self
    }

    pub fn with_move_min_words(mut self, words: usize) -> Self {
        self.move_min_words = words;
        self
    }

    pub fn with_debug_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.debug_output_dir = Some(dir.into());
        self
    }

    pub fn is_word_separator(&self, c: char) -> bool {
        self.word_separators.contains(&c) || c.is_whitespace()
    }

    /// Rejects settings the comparer cannot honour.
    pub fn validate(&self) -> Result<()> {
        if !(self.detail_threshold > 0.0 && self.detail_threshold <= 1.0) {
            return Err(CompareError::InvalidSettings {
                message: format!(
                    "detail_threshold must be in (0, 1], got {}",
                    self.detail_threshold
                ),
            });
        }
        if self.starting_id_for_footnotes_endnotes < 1 {
            return Err(CompareError::InvalidSettings {
                message: format!(
                    "starting_id_for_footnotes_endnotes must be positive, got {}",
                    self.starting_id_for_footnotes_endnotes
                ),
            });
        }
        Ok(())
    }
}

/// Options that only apply to consolidation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WmlComparerConsolidateSettings {
    /// Abort on the first reviewer whose document cannot be compared instead
    /// of reporting it and continuing with the others.
    pub fail_fast: bool,
    /// Wrap each block changed by a single reviewer in a one-cell table
    /// shaded with the reviewer's colour and captioned with their name.
    pub consolidate_with_table: bool,
}

impl Default for WmlComparerConsolidateSettings {
    fn default() -> Self {
        Self {
            fail_fast: false,
            consolidate_with_table: true,
        }
    }
}

/// An RGB colour associated with a reviewer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Rgb(pub u8, pub u8, pub u8);

impl Rgb {
    /// `RRGGBB`, the form WordprocessingML colour attributes take.
    pub fn hex(&self) -> String {
        format!("{:02X}{:02X}{:02X}", self.0, self.1, self.2)
    }
}

impl fmt::Display for Rgb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.hex())
    }
}

impl FromStr for Rgb {
    type Err = CompareError;

    /// Parses `#RRGGBB` or `RRGGBB`.
    fn from_str(s: &str) -> Result<Self> {
        let hex = s.trim().trim_start_matches('#');
        let invalid = || CompareError::InvalidSettings {
            message: format!("invalid colour '{}', expected #RRGGBB", s),
        };
        if hex.len() != 6 || !hex.is_ascii() {
            return Err(invalid());
        }
        let channel = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).map_err(|_| invalid());
        Ok(Rgb(channel(0)?, channel(2)?, channel(4)?))
    }
}

impl Serialize for Rgb {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Rgb {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// A revised document handed to the consolidator.
#[derive(Debug, Clone)]
pub struct WmlRevisedDocumentInfo {
    pub revised_document: WmlDocument,

    /// Name of the revisor, written verbatim as the revision author.
    pub revisor: String,

    /// Colour associated with this revisor in the consolidation report.
    pub color: Rgb,
}

impl WmlRevisedDocumentInfo {
    pub fn new(revised_document: WmlDocument, revisor: impl Into<String>, color: Rgb) -> Self {
        Self {
            revised_document,
            revisor: revisor.into(),
            color,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let settings = WmlComparerSettings::default();

        assert!(!settings.case_insensitive);
        assert!(settings.conflate_breaking_and_nonbreaking_spaces);
        assert!(settings.track_formatting_changes);
        assert!(settings.detect_moves);

        assert!((settings.detail_threshold - 0.15).abs() < f64::EPSILON);
        assert_eq!(settings.starting_id_for_footnotes_endnotes, 1);
        assert_eq!(settings.move_min_words, 3);

        assert!(settings.author_for_revisions.is_none());
        assert!(settings.culture_info.is_none());
        assert!(settings.debug_output_dir.is_none());

        assert!(settings.word_separators.contains(&' '));
        assert!(settings.word_separators.contains(&'-'));
        assert!(settings.word_separators.contains(&'（'));
        assert!(settings.word_separators.contains(&'的'));
        assert!(settings.word_separators.contains(&'$'));
        assert!(settings.word_separators.contains(&'€'));
        assert_eq!(settings.word_separators.len(), 26);
    }

    #[test]
    fn builders_set_fields() {
        let settings = WmlComparerSettings::new()
            .with_author("Ann")
            .with_case_insensitive(true)
            .with_track_formatting(false)
            .with_culture_info("tr-TR")
            .with_date_time("2024-03-01T09:30:00Z")
            .with_move_min_words(5);

        assert_eq!(settings.author_for_revisions, Some("Ann".to_string()));
        assert!(settings.case_insensitive);
        assert!(!settings.track_formatting_changes);
        assert_eq!(settings.culture_info, Some("tr-TR".to_string()));
        assert_eq!(
            settings.date_time_for_revisions,
            Some("2024-03-01T09:30:00Z".to_string())
        );
        assert_eq!(settings.move_min_words, 5);
    }

    #[test]
    fn separators_include_whitespace() {
        let settings = WmlComparerSettings::default();

        assert!(settings.is_word_separator(' '));
        assert!(settings.is_word_separator('\u{00A0}'));
        assert!(settings.is_word_separator('-'));
        assert!(settings.is_word_separator('（'));
        assert!(!settings.is_word_separator('a'));
        assert!(!settings.is_word_separator('Z'));
    }

    #[test]
    fn validate_rejects_threshold_out_of_range() {
        assert!(WmlComparerSettings::default().validate().is_ok());
        assert!(WmlComparerSettings::default().with_detail_threshold(1.0).validate().is_ok());

        for bad in [0.0, -0.5, 1.01, f64::NAN] {
            let err = WmlComparerSettings::default()
                .with_detail_threshold(bad)
                .validate()
                .unwrap_err();
            assert!(matches!(err, CompareError::InvalidSettings { .. }));
        }
    }

    #[test]
    fn partial_json_fills_in_defaults() {
        let settings: WmlComparerSettings =
            serde_json::from_str(r#"{"case_insensitive": true, "move_min_words": 4}"#).unwrap();
        assert!(settings.case_insensitive);
        assert_eq!(settings.move_min_words, 4);
        assert_eq!(settings.word_separators.len(), 26);
    }

    #[test]
    fn rgb_parses_and_prints_hex() {
        let c: Rgb = "#1e90FF".parse().unwrap();
        assert_eq!(c, Rgb(0x1E, 0x90, 0xFF));
        assert_eq!(c.to_string(), "#1E90FF");
        assert_eq!(c.hex(), "1E90FF");
        assert_eq!("00ff00".parse::<Rgb>().unwrap(), Rgb(0, 255, 0));
        assert!("#12345".parse::<Rgb>().is_err());
        assert!("zzzzzz".parse::<Rgb>().is_err());

        let json = serde_json::to_string(&c).unwrap();
        assert_eq!(json, "\"#1E90FF\"");
        assert_eq!(serde_json::from_str::<Rgb>(&json).unwrap(), c);
    }

    #[test]
    fn consolidate_settings_defaults() {
        let settings = WmlComparerConsolidateSettings::default();
        assert!(!settings.fail_fast);
        assert!(settings.consolidate_with_table);

        let settings: WmlComparerConsolidateSettings = serde_json::from_str(r#"{"fail_fast": true}"#).unwrap();
        assert!(settings.fail_fast);
        assert!(settings.consolidate_with_table);
    }
}
