//! Translation settings.
//!
//! A [`TranslationConfig`] is built once at start-up, usually from a TOML
//! file, and then shared read-only by every page worker. Every field has
//! a default, so an empty file (or no file at all) is a valid config.
//!
//! ```toml
//! language = "English"
//! batch_size = 20
//! line_break = "br"
//!
//! [codes]
//! scroll_text = true
//! plugin_command = true
//!
//! [speakers]
//! "ミナ" = "Mina"
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::history::MAX_HISTORY;

/// How translated dialogue marks line breaks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LineBreak {
    /// A raw `\n`
    #[default]
    Newline,
    /// A literal `<br>` marker, for games using a message plugin that expects it
    Br,
}

impl LineBreak {
    pub fn as_str(self) -> &'static str {
        match self {
            LineBreak::Newline => "\n",
            LineBreak::Br => "<br>",
        }
    }
}

/// Per-command enable switches.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CodeFlags {
    /// 401 message text
    pub show_text: bool,
    /// 405 scrolling text
    pub scroll_text: bool,
    /// 102 choices
    pub choices: bool,
    /// 122 control variables
    pub variables: bool,
    /// 101 message name box
    pub name_box: bool,
    /// 355 / 655 script
    pub script: bool,
    /// 356 plugin command
    pub plugin_command: bool,
    /// 357 plugin command (MZ)
    pub picture_text: bool,
    /// 657 plugin command argument (MZ)
    pub picture_text_mz: bool,
    /// 320 change actor name
    pub change_name: bool,
    /// 111 conditional branch script
    pub conditional_script: bool,
    /// 108 comment
    pub comment: bool,
    /// 408 comment continuation
    pub comment_more: bool,
}

impl Default for CodeFlags {
    fn default() -> Self {
        Self {
            show_text: true,
            scroll_text: false,
            choices: true,
            variables: false,
            name_box: false,
            script: false,
            plugin_command: false,
            picture_text: false,
            picture_text_mz: false,
            change_name: false,
            conditional_script: false,
            comment: false,
            comment_more: false,
        }
    }
}

/// Game variables whose string values are translated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VariableRules {
    /// Targets of 122 assignments that carry display text
    pub assign_ids: Vec<i64>,
    /// The `$gameVariables` id whose string literal 111 scripts compare against
    pub script_id: String,
}

impl Default for VariableRules {
    fn default() -> Self {
        Self {
            assign_ids: vec![327],
            script_id: "1045".to_string(),
        }
    }
}

/// Cost per 1K tokens, in dollars.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Pricing {
    pub input_per_1k: f64,
    pub output_per_1k: f64,
}

impl Default for Pricing {
    fn default() -> Self {
        Self {
            input_per_1k: 0.002,
            output_per_1k: 0.002,
        }
    }
}

impl Pricing {
    pub fn cost(&self, input_tokens: u64, output_tokens: u64) -> f64 {
        input_tokens as f64 * 0.001 * self.input_per_1k
            + output_tokens as f64 * 0.001 * self.output_per_1k
    }
}

/// Immutable settings shared by the extractor, the batch translator and the runner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TranslationConfig {
    /// Target language name, as written into prompts
    pub language: String,
    /// Items per translation unit
    pub batch_size: usize,
    /// Lines of history kept per page
    pub max_history: usize,
    /// Wrap width for dialogue
    pub width: usize,
    /// Wrap width for descriptions in database lists
    pub list_width: usize,
    /// Wrap width for note tags
    pub note_width: usize,
    /// Pages processed concurrently
    pub threads: usize,
    pub line_break: LineBreak,
    /// Join manually wrapped source lines before translating
    pub fix_text_wrap: bool,
    /// Skip strings that contain no source-script characters
    pub ignore_translated_text: bool,
    /// Recognize `【Name】` speaker prefixes
    pub bracket_names: bool,
    /// Count tokens locally instead of calling the model
    pub estimate: bool,
    pub codes: CodeFlags,
    pub variables: VariableRules,
    /// Recurring names translated without a model call
    pub speakers: IndexMap<String, String>,
    /// Character block sent with every request
    pub characters: String,
    /// Forced term translations listed in the short prompt
    pub glossary: IndexMap<String, String>,
    /// Full prompt template, used for database text instead of the short prompt
    pub prompt_file: Option<PathBuf>,
    pub pricing: Pricing,
}

impl Default for TranslationConfig {
    fn default() -> Self {
        let speakers = [
            ("セレナ", "Serena"),
            ("レナ", "Rena"),
            ("フィルス", "Phils"),
            ("レイン", "Meryl"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

        Self {
            language: "English".to_string(),
            batch_size: 10,
            max_history: MAX_HISTORY,
            width: 60,
            list_width: 100,
            note_width: 75,
            threads: 4,
            line_break: LineBreak::default(),
            fix_text_wrap: true,
            ignore_translated_text: true,
            bracket_names: false,
            estimate: false,
            codes: CodeFlags::default(),
            variables: VariableRules::default(),
            speakers,
            characters: "Game Characters:\nセレナ (Serena) - Female\nレナ (Rena) - Female\n"
                .to_string(),
            glossary: IndexMap::new(),
            prompt_file: None,
            pricing: Pricing::default(),
        }
    }
}

impl TranslationConfig {
    /// Parse and validate a TOML document.
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a TOML file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let source = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&source)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let non_zero = [
            ("batch_size", self.batch_size),
            ("max_history", self.max_history),
            ("threads", self.threads),
            ("width", self.width),
            ("list_width", self.list_width),
            ("note_width", self.note_width),
        ];
        for (field, value) in non_zero {
            if value == 0 {
                return Err(ConfigError::Invalid {
                    field,
                    reason: "must be greater than zero".to_string(),
                });
            }
        }
        if self.language.trim().is_empty() {
            return Err(ConfigError::Invalid {
                field: "language",
                reason: "must not be empty".to_string(),
            });
        }
        Ok(())
    }

    /// Look up a recurring speaker name.
    pub fn known_speaker(&self, name: &str) -> Option<&str> {
        self.speakers.get(name).map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_document_gives_defaults() {
        let config = TranslationConfig::from_toml_str("").unwrap();
        assert_eq!(config, TranslationConfig::default());
        assert_eq!(config.batch_size, 10);
        assert!(config.codes.show_text);
        assert!(!config.codes.plugin_command);
        assert_eq!(config.known_speaker("レナ"), Some("Rena"));
    }

    #[test]
    fn test_partial_document_overrides() {
        let config = TranslationConfig::from_toml_str(
            r#"
            language = "German"
            batch_size = 40
            line_break = "br"

            [codes]
            plugin_command = true

            [speakers]
            "ミナ" = "Mina"

            [pricing]
            input_per_1k = 0.01
            output_per_1k = 0.03
            "#,
        )
        .unwrap();
        assert_eq!(config.language, "German");
        assert_eq!(config.batch_size, 40);
        assert_eq!(config.line_break, LineBreak::Br);
        assert!(config.codes.plugin_command);
        assert!(config.codes.show_text);
        assert_eq!(config.known_speaker("ミナ"), Some("Mina"));
        assert_eq!(config.known_speaker("レナ"), None);
        assert!((config.pricing.cost(1000, 1000) - 0.04).abs() < 1e-9);
    }

    #[test]
    fn test_validation_rejects_zero() {
        let err = TranslationConfig::from_toml_str("batch_size = 0").unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Invalid {
                field: "batch_size",
                ..
            }
        ));
    }

    #[test]
    fn test_bad_toml() {
        assert!(matches!(
            TranslationConfig::from_toml_str("batch_size = \"ten\""),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rpgtl.toml");
        fs::write(&path, "threads = 2\n").unwrap();
        assert_eq!(TranslationConfig::load(&path).unwrap().threads, 2);

        let missing = dir.path().join("missing.toml");
        assert!(matches!(
            TranslationConfig::load(&missing),
            Err(ConfigError::Read { .. })
        ));
    }
}
