use std::collections::HashMap;

use thiserror::Error;
use tracing::debug;

use crate::content::builtin::BUILTIN_SNIPPETS;
use crate::content::estimator::estimate_difficulty;
use crate::content::identity::{content_id, normalize};
use crate::content::{Snippet, SnippetRepository, SnippetSource};
use crate::engine::difficulty::{MAX_TIER, MIN_TIER};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum LibraryError {
    #[error("snippet code is empty")]
    EmptyCode,
    #[error("snippet language is empty")]
    EmptyLanguage,
    #[error("difficulty {0} is outside 1..=7")]
    InvalidDifficulty(u8),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ImportOutcome {
    Added(String),
    /// Already present under this id; nothing changed.
    Duplicate(String),
}

impl ImportOutcome {
    pub fn id(&self) -> &str {
        match self {
            ImportOutcome::Added(id) | ImportOutcome::Duplicate(id) => id,
        }
    }
}

/// In-memory snippet store keyed by content id. Builtin, user and corpus
/// snippets share one id space, so the same code is only ever stored once.
#[derive(Debug, Default)]
pub struct SnippetLibrary {
    by_language: HashMap<String, Vec<Snippet>>,
    /// content id -> (language, position in `by_language`)
    index: HashMap<String, (String, usize)>,
    /// legacy id -> content id
    legacy: HashMap<String, String>,
}

impl SnippetLibrary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_builtin() -> Self {
        let mut library = Self::new();
        for builtin in BUILTIN_SNIPPETS {
            let topics = builtin.topics.iter().map(|t| t.to_string()).collect();
            match library.add_with_difficulty(
                builtin.language,
                builtin.code,
                None,
                topics,
                SnippetSource::Builtin,
            ) {
                Ok(outcome) => {
                    library
                        .legacy
                        .insert(builtin.legacy_id.to_string(), outcome.id().to_string());
                }
                Err(err) => debug!(legacy_id = builtin.legacy_id, %err, "skipping builtin snippet"),
            }
        }
        library
    }

    /// Adds code with an estimated difficulty.
    pub fn add(
        &mut self,
        language: &str,
        code: &str,
        source: SnippetSource,
    ) -> Result<ImportOutcome, LibraryError> {
        self.add_with_difficulty(language, code, None, Vec::new(), source)
    }

    pub fn add_with_difficulty(
        &mut self,
        language: &str,
        code: &str,
        difficulty: Option<u8>,
        topics: Vec<String>,
        source: SnippetSource,
    ) -> Result<ImportOutcome, LibraryError> {
        let language = language_key(language);
        if language.is_empty() {
            return Err(LibraryError::EmptyLanguage);
        }
        let code = normalize(code);
        if code.trim().is_empty() {
            return Err(LibraryError::EmptyCode);
        }
        if let Some(d) = difficulty.filter(|d| !(MIN_TIER..=MAX_TIER).contains(d)) {
            return Err(LibraryError::InvalidDifficulty(d));
        }

        let id = content_id(&language, &code);
        if self.index.contains_key(&id) {
            debug!(%id, %language, "duplicate snippet");
            return Ok(ImportOutcome::Duplicate(id));
        }

        let difficulty = difficulty.unwrap_or_else(|| estimate_difficulty(&code));
        self.insert(Snippet {
            id: id.clone(),
            language,
            code,
            difficulty,
            topics,
            source,
        });
        Ok(ImportOutcome::Added(id))
    }

    /// Re-adds persisted snippets. Ids are recomputed from content so an
    /// edited or stale file cannot put two ids on the same code.
    pub fn restore(&mut self, snippets: Vec<Snippet>) -> usize {
        let mut restored = 0;
        for s in snippets {
            let difficulty = (MIN_TIER..=MAX_TIER)
                .contains(&s.difficulty)
                .then_some(s.difficulty);
            match self.add_with_difficulty(&s.language, &s.code, difficulty, s.topics, s.source) {
                Ok(ImportOutcome::Added(_)) => restored += 1,
                Ok(ImportOutcome::Duplicate(_)) => {}
                Err(err) => debug!(id = %s.id, %err, "dropping stored snippet"),
            }
        }
        restored
    }

    /// Looks up by content id, falling back to legacy ids.
    pub fn get(&self, id: &str) -> Option<&Snippet> {
        let id = self.legacy.get(id).map(String::as_str).unwrap_or(id);
        let (language, pos) = self.index.get(id)?;
        self.by_language.get(language)?.get(*pos)
    }

    pub fn legacy_id(&self, content_id: &str) -> Option<&str> {
        self.legacy
            .iter()
            .find(|(_, cid)| cid.as_str() == content_id)
            .map(|(legacy, _)| legacy.as_str())
    }

    /// Everything that did not ship with the binary, for persisting.
    pub fn user_snippets(&self) -> Vec<Snippet> {
        let mut out: Vec<Snippet> = self
            .by_language
            .values()
            .flatten()
            .filter(|s| s.source != SnippetSource::Builtin)
            .cloned()
            .collect();
        out.sort_by(|a, b| a.language.cmp(&b.language).then_with(|| a.id.cmp(&b.id)));
        out
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    pub fn languages(&self) -> Vec<&str> {
        let mut langs: Vec<&str> = self.by_language.keys().map(String::as_str).collect();
        langs.sort_unstable();
        langs
    }

    fn insert(&mut self, snippet: Snippet) {
        let bucket = self.by_language.entry(snippet.language.clone()).or_default();
        self.index
            .insert(snippet.id.clone(), (snippet.language.clone(), bucket.len()));
        bucket.push(snippet);
    }
}

/// Buckets are keyed case-insensitively, ignoring surrounding whitespace.
fn language_key(language: &str) -> String {
    language.trim().to_ascii_lowercase()
}

impl SnippetRepository for SnippetLibrary {
    fn candidates(&self, language: &str) -> &[Snippet] {
        self.by_language
            .get(&language_key(language))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
}
