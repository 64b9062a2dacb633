pub mod builtin;
pub mod estimator;
pub mod identity;
pub mod library;

use serde::{Deserialize, Serialize};

pub use library::{ImportOutcome, LibraryError, SnippetLibrary};

const FALLBACK_PREFIX: &str = "fallback:";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SnippetSource {
    Builtin,
    User,
    Corpus,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Snippet {
    pub id: String,
    pub language: String,
    pub code: String,
    pub difficulty: u8,
    #[serde(default)]
    pub topics: Vec<String>,
    pub source: SnippetSource,
}

impl Snippet {
    /// Placeholder handed out when a language has nothing to practice.
    pub fn fallback(language: &str) -> Self {
        Self {
            id: format!("{FALLBACK_PREFIX}{language}"),
            language: language.to_string(),
            code: format!("// no {language} snippets available yet"),
            difficulty: 1,
            topics: Vec::new(),
            source: SnippetSource::Builtin,
        }
    }

    pub fn is_fallback(&self) -> bool {
        self.id.starts_with(FALLBACK_PREFIX)
    }

    pub fn char_count(&self) -> usize {
        self.code.chars().count()
    }
}

/// Where the selector gets its candidates from. Backing storage is up to
/// the implementor; the selector only ever asks per language.
pub trait SnippetRepository {
    fn candidates(&self, language: &str) -> &[Snippet];
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fallback_is_marked() {
        let snippet = Snippet::fallback("zig");
        assert!(snippet.is_fallback());
        assert_eq!(snippet.language, "zig");
        assert_eq!(snippet.difficulty, 1);
    }

    #[test]
    fn test_source_serializes_lowercase() {
        let json = serde_json::to_string(&SnippetSource::Corpus).unwrap();
        assert_eq!(json, "\"corpus\"");
    }
}
