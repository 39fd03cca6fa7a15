use serde::Serialize;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

// ═══════════════════════════════════════════════════════════════════════════════
// STYLE ERROR
// ═══════════════════════════════════════════════════════════════════════════════

/// Every failure the engine reports.
///
/// Registration failures (`NoActiveScope`, `VocabularyExhausted`) are meant to
/// degrade to unstyled markup; the ambient helpers in [`crate::scope`] log them
/// and return an empty class. Compiler failures propagate to the caller.
#[derive(Debug, Error, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum StyleError {
    #[error("no active render scope")]
    NoActiveScope,

    #[error("word vocabulary exhausted: all {vocabulary} words are assigned")]
    VocabularyExhausted { vocabulary: usize },

    #[error("failed to start scss compiler: {message}")]
    Init { message: String },

    #[error(transparent)]
    Compile(#[from] CompileError),

    #[error("invalid config {}: {message}", path.as_ref().map(|p| p.display().to_string()).unwrap_or_else(|| "<inline>".to_string()))]
    Config {
        path: Option<PathBuf>,
        message: String,
    },
}

impl StyleError {
    pub fn init(message: impl Into<String>) -> Self {
        Self::Init {
            message: message.into(),
        }
    }

    pub fn config(path: Option<PathBuf>, message: impl Into<String>) -> Self {
        Self::Config {
            path,
            message: message.into(),
        }
    }

    /// Returns the name of the unresolved import if this is an `ImportNotFound`.
    pub fn missing_import(&self) -> Option<&str> {
        match self {
            Self::Compile(CompileError::ImportNotFound { name }) => Some(name),
            _ => None,
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// COMPILE ERROR
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Error, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", rename_all = "camelCase")]
pub enum CompileError {
    #[error("scss compiler not initialized")]
    NotInitialized,

    /// Syntax or evaluation failure reported by Sass, message included verbatim.
    #[error("scss compile failed: {message}")]
    Sass { message: String },

    #[error("scss import not found: {name}")]
    ImportNotFound { name: String },

    #[error("scss compile timed out after {}ms", after.as_millis())]
    Timeout {
        #[serde(serialize_with = "serialize_millis")]
        after: Duration,
    },
}

fn serialize_millis<S: serde::Serializer>(
    d: &Duration,
    s: S,
) -> std::result::Result<S::Ok, S::Error> {
    s.serialize_u64(d.as_millis() as u64)
}

pub type Result<T> = std::result::Result<T, StyleError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_import_not_found_names_the_import() {
        let err = StyleError::from(CompileError::ImportNotFound {
            name: "theme".into(),
        });
        assert_eq!(err.to_string(), "scss import not found: theme");
        assert_eq!(err.missing_import(), Some("theme"));
    }

    #[test]
    fn test_errors_serialize_with_kind_tag() {
        let err = StyleError::VocabularyExhausted { vocabulary: 2 };
        let json = serde_json::to_value(&err).unwrap();
        assert_eq!(json["kind"], "vocabularyExhausted");
        assert_eq!(json["vocabulary"], 2);

        let err = StyleError::from(CompileError::Timeout {
            after: Duration::from_millis(1500),
        });
        assert_eq!(err.to_string(), "scss compile timed out after 1500ms");
    }

    #[test]
    fn test_config_error_without_path() {
        let err = StyleError::config(None, "expected value");
        assert_eq!(err.to_string(), "invalid config <inline>: expected value");
    }
}
