use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::compile::CompilerOptions;
use crate::error::{Result, StyleError};
use crate::scope::StyleContext;
use crate::words::WordVocabulary;

/// Site-level engine configuration, usually loaded from JSON at startup:
///
/// ```json
/// {
///   "words": { "words": ["Red", "Sky Blue"], "seed": "my-site" },
///   "compiler": { "sassPath": "/usr/local/bin/sass", "timeoutMs": 5000 }
/// }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineConfig {
    #[serde(default)]
    pub words: Option<WordsConfig>,
    #[serde(default)]
    pub compiler: CompilerOptions,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WordsConfig {
    /// Raw words; normalized when the vocabulary is built.
    pub words: Vec<String>,
    #[serde(default)]
    pub seed: String,
}

impl EngineConfig {
    pub fn from_json_str(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| StyleError::config(None, e.to_string()))
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let data = fs::read_to_string(path)
            .map_err(|e| StyleError::config(Some(path.to_path_buf()), e.to_string()))?;
        serde_json::from_str(&data)
            .map_err(|e| StyleError::config(Some(path.to_path_buf()), e.to_string()))
    }

    /// Carrier configuration for this site. Words are enabled only when a
    /// `words` section is present.
    pub fn build_context(&self) -> StyleContext {
        match &self.words {
            Some(words) => StyleContext::with_words(words.vocabulary()),
            None => StyleContext::new(),
        }
    }
}

impl WordsConfig {
    /// One word per line, as in a plain word-list file.
    pub fn from_lines(text: &str, seed: impl Into<String>) -> Self {
        Self {
            words: text.lines().map(str::to_string).collect(),
            seed: seed.into(),
        }
    }

    pub fn load_lines(path: impl AsRef<Path>, seed: impl Into<String>) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)
            .map_err(|e| StyleError::config(Some(path.to_path_buf()), e.to_string()))?;
        Ok(Self::from_lines(&text, seed))
    }

    pub fn vocabulary(&self) -> WordVocabulary {
        WordVocabulary::new(&self.words, self.seed.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_config_uses_hashes() {
        let config = EngineConfig::from_json_str("{}").unwrap();
        assert_eq!(config, EngineConfig::default());
        assert!(config.build_context().words().is_none());
    }

    #[test]
    fn test_words_section_enables_assigner() {
        let config = EngineConfig::from_json_str(
            r#"{"words": {"words": ["Red", "red", "Sky Blue"], "seed": "x"}, "compiler": {"timeoutMs": 100}}"#,
        )
        .unwrap();
        assert_eq!(config.compiler.timeout_ms, 100);

        let ctx = config.build_context();
        let words = ctx.words().unwrap();
        assert_eq!(words.vocabulary_size(), 2);
    }

    #[test]
    fn test_invalid_json_is_config_error() {
        let err = EngineConfig::from_json_str("{words").unwrap_err();
        assert!(matches!(err, StyleError::Config { path: None, .. }));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("styles.json");
        fs::write(&path, r#"{"compiler": {"sassPath": "/opt/sass"}}"#).unwrap();

        let config = EngineConfig::load(&path).unwrap();
        assert_eq!(
            config.compiler.sass_path.as_deref(),
            Some(Path::new("/opt/sass"))
        );
        assert_eq!(config.compiler.timeout_ms, 10_000);

        let err = EngineConfig::load(dir.path().join("missing.json")).unwrap_err();
        assert!(matches!(err, StyleError::Config { path: Some(_), .. }));
    }

    #[test]
    fn test_words_from_lines() {
        let words = WordsConfig::from_lines("Apple\n\nBanana Split\n  \n", "s");
        assert_eq!(words.vocabulary().words(), &["apple", "banana-split"]);
    }
}
