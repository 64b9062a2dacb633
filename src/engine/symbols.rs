use serde::{Deserialize, Serialize};

// --- Symbol Group ---

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum SymbolGroup {
    Bracket,
    Operator,
    Whitespace,
    Punctuation,
    Alnum,
    Other,
}

impl SymbolGroup {
    pub fn classify(ch: char) -> Self {
        match ch {
            '(' | ')' | '[' | ']' | '{' | '}' => SymbolGroup::Bracket,
            '+' | '-' | '*' | '/' | '%' | '=' | '<' | '>' | '!' | '&' | '|' | '^' | '~' | '?' => {
                SymbolGroup::Operator
            }
            '.' | ',' | ';' | ':' | '\'' | '"' | '`' | '@' | '#' | '$' | '\\' | '_' => {
                SymbolGroup::Punctuation
            }
            c if c.is_whitespace() => SymbolGroup::Whitespace,
            c if c.is_alphanumeric() => SymbolGroup::Alnum,
            _ => SymbolGroup::Other,
        }
    }

    pub fn to_key(self) -> &'static str {
        match self {
            SymbolGroup::Bracket => "bracket",
            SymbolGroup::Operator => "operator",
            SymbolGroup::Whitespace => "whitespace",
            SymbolGroup::Punctuation => "punctuation",
            SymbolGroup::Alnum => "alnum",
            SymbolGroup::Other => "other",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        match key {
            "bracket" => Some(SymbolGroup::Bracket),
            "operator" => Some(SymbolGroup::Operator),
            "whitespace" => Some(SymbolGroup::Whitespace),
            "punctuation" => Some(SymbolGroup::Punctuation),
            "alnum" => Some(SymbolGroup::Alnum),
            "other" => Some(SymbolGroup::Other),
            _ => None,
        }
    }

    pub fn all() -> &'static [SymbolGroup] {
        &[
            SymbolGroup::Bracket,
            SymbolGroup::Operator,
            SymbolGroup::Whitespace,
            SymbolGroup::Punctuation,
            SymbolGroup::Alnum,
            SymbolGroup::Other,
        ]
    }
}

/// Characters that carry code-typing signal: anything that is neither a
/// letter/digit nor whitespace.
pub fn is_special(ch: char) -> bool {
    !ch.is_alphanumeric() && !ch.is_whitespace()
}
