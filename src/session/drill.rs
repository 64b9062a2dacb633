use std::collections::HashSet;
use std::time::Instant;

use crate::content::Snippet;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CharStatus {
    Correct,
    Incorrect(char),
}

/// One typed character measured against the snippet.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Keystroke {
    pub expected: char,
    pub actual: char,
    pub correct: bool,
}

/// Typing progress through one snippet.
pub struct DrillState {
    pub snippet: Snippet,
    pub target: Vec<char>,
    pub input: Vec<CharStatus>,
    pub cursor: usize,
    pub started_at: Option<Instant>,
    pub finished_at: Option<Instant>,
    /// Positions that were ever mistyped, even if fixed later.
    pub typo_flags: HashSet<usize>,
}

impl DrillState {
    pub fn new(snippet: Snippet) -> Self {
        Self {
            target: snippet.code.chars().collect(),
            snippet,
            input: Vec::new(),
            cursor: 0,
            started_at: None,
            finished_at: None,
            typo_flags: HashSet::new(),
        }
    }

    pub fn is_complete(&self) -> bool {
        self.cursor >= self.target.len()
    }

    pub fn expected(&self) -> Option<char> {
        self.target.get(self.cursor).copied()
    }

    /// Advances the cursor by one typed character. None once the snippet is
    /// complete. The clock starts on the first key.
    pub fn type_char(&mut self, ch: char) -> Option<Keystroke> {
        let expected = self.expected()?;
        let now = Instant::now();
        self.started_at.get_or_insert(now);

        let correct = ch == expected;
        if correct {
            self.input.push(CharStatus::Correct);
        } else {
            self.input.push(CharStatus::Incorrect(ch));
            self.typo_flags.insert(self.cursor);
        }
        self.cursor += 1;
        if self.is_complete() {
            self.finished_at = Some(now);
        }

        Some(Keystroke {
            expected,
            actual: ch,
            correct,
        })
    }

    /// Steps back one position. Typo flags stay set.
    pub fn backspace(&mut self) {
        if self.cursor == 0 {
            return;
        }
        self.cursor -= 1;
        self.input.pop();
        self.finished_at = None;
    }

    /// Time from the first key to completion, or to now while still typing.
    pub fn elapsed_secs(&self) -> f64 {
        match (self.started_at, self.finished_at) {
            (Some(start), Some(end)) => end.duration_since(start).as_secs_f64(),
            (Some(start), None) => start.elapsed().as_secs_f64(),
            _ => 0.0,
        }
    }

    pub fn correct_count(&self) -> usize {
        self.input
            .iter()
            .filter(|s| matches!(s, CharStatus::Correct))
            .count()
    }

    /// Standard five-characters-per-word speed over `elapsed_secs`.
    pub fn wpm_over(&self, elapsed_secs: f64) -> f64 {
        if !elapsed_secs.is_finite() || elapsed_secs < 0.1 {
            return 0.0;
        }
        (self.correct_count() as f64 / 5.0) / (elapsed_secs / 60.0)
    }

    pub fn wpm(&self) -> f64 {
        self.wpm_over(self.elapsed_secs())
    }

    pub fn typo_count(&self) -> usize {
        self.typo_flags.len()
    }

    pub fn accuracy(&self) -> f64 {
        if self.cursor == 0 {
            return 100.0;
        }
        let typos_before_cursor = self
            .typo_flags
            .iter()
            .filter(|&&pos| pos < self.cursor)
            .count();
        let clean = (self.cursor - typos_before_cursor) as f64;
        (clean / self.cursor as f64 * 100.0).clamp(0.0, 100.0)
    }

    pub fn progress(&self) -> f64 {
        if self.target.is_empty() {
            return 0.0;
        }
        self.cursor as f64 / self.target.len() as f64
    }
}
