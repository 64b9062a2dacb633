use std::cmp::Ordering;
use std::collections::{HashMap, VecDeque};

use serde::{Deserialize, Serialize};

use crate::engine::symbols::SymbolGroup;

pub const DEFAULT_WINDOW: usize = 20;
pub const RECENT_CAPACITY: usize = DEFAULT_WINDOW * 2;

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct MistakeRecord {
    pub hits: u32,
    pub misses: u32,
    #[serde(default)]
    pub confused_with: HashMap<char, u32>,
    #[serde(default)]
    pub recent_attempts: VecDeque<bool>,
}

impl MistakeRecord {
    pub fn attempts(&self) -> u32 {
        self.hits + self.misses
    }

    pub fn error_rate(&self) -> f64 {
        error_rate_raw(self.hits, self.misses)
    }

    /// Error rate over the newest `window` entries of the rolling buffer.
    pub fn recent_error_rate(&self, window: usize) -> f64 {
        let take = window.min(self.recent_attempts.len());
        if take == 0 {
            return 0.0;
        }
        let misses = self
            .recent_attempts
            .iter()
            .rev()
            .take(take)
            .filter(|&&correct| !correct)
            .count();
        misses as f64 / take as f64
    }

    fn push_recent(&mut self, correct: bool) {
        self.recent_attempts.push_back(correct);
        while self.recent_attempts.len() > RECENT_CAPACITY {
            self.recent_attempts.pop_front();
        }
    }
}

fn error_rate_raw(hits: u32, misses: u32) -> f64 {
    let total = hits as u64 + misses as u64;
    if total == 0 {
        0.0
    } else {
        misses as f64 / total as f64
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct SymbolWeakness {
    pub character: char,
    pub error_rate: f64,
    pub attempts: u32,
    pub misses: u32,
}

#[derive(Clone, Debug, PartialEq)]
pub struct GroupWeakness {
    pub group: SymbolGroup,
    pub hits: u32,
    pub misses: u32,
    pub error_rate: f64,
}

impl GroupWeakness {
    pub fn attempts(&self) -> u32 {
        self.hits + self.misses
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct MistakeHeatmap {
    pub records: HashMap<char, MistakeRecord>,
}

impl MistakeHeatmap {
    pub fn record_hit(&mut self, ch: char) {
        let record = self.records.entry(ch).or_default();
        record.hits = record.hits.saturating_add(1);
        record.push_recent(true);
    }

    pub fn record_miss(&mut self, ch: char, confused_with: Option<char>) {
        let record = self.records.entry(ch).or_default();
        record.misses = record.misses.saturating_add(1);
        if let Some(other) = confused_with {
            if other != ch {
                *record.confused_with.entry(other).or_insert(0) += 1;
            }
        }
        record.push_recent(false);
    }

    pub fn error_rate(&self, ch: char) -> f64 {
        self.records.get(&ch).map(|r| r.error_rate()).unwrap_or(0.0)
    }

    pub fn recent_error_rate(&self, ch: char, window: usize) -> f64 {
        self.records
            .get(&ch)
            .map(|r| r.recent_error_rate(window))
            .unwrap_or(0.0)
    }

    pub fn attempts(&self, ch: char) -> u32 {
        self.records.get(&ch).map(|r| r.attempts()).unwrap_or(0)
    }

    pub fn total_attempts(&self) -> u64 {
        self.records.values().map(|r| r.attempts() as u64).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.total_attempts() == 0
    }

    /// Most frequent wrong key typed in place of `ch`.
    pub fn top_confusion(&self, ch: char) -> Option<(char, u32)> {
        self.records.get(&ch).and_then(|r| {
            r.confused_with
                .iter()
                .max_by(|a, b| a.1.cmp(b.1).then_with(|| b.0.cmp(a.0)))
                .map(|(&c, &n)| (c, n))
        })
    }

    /// Symbols with at least `min_attempts`, worst first.
    ///
    /// Ties on error rate fall back to raw miss count, then to the character
    /// itself so the ordering is stable across runs.
    pub fn weakest(&self, count: usize, min_attempts: u32) -> Vec<SymbolWeakness> {
        let mut weak: Vec<SymbolWeakness> = self
            .records
            .iter()
            .filter(|(_, r)| r.attempts() >= min_attempts)
            .map(|(&ch, r)| SymbolWeakness {
                character: ch,
                error_rate: r.error_rate(),
                attempts: r.attempts(),
                misses: r.misses,
            })
            .collect();

        weak.sort_by(|a, b| {
            b.error_rate
                .partial_cmp(&a.error_rate)
                .unwrap_or(Ordering::Equal)
                .then_with(|| b.misses.cmp(&a.misses))
                .then_with(|| a.character.cmp(&b.character))
        });
        weak.truncate(count);
        weak
    }

    pub fn weakest_groups(&self, min_attempts: u32) -> Vec<GroupWeakness> {
        let mut totals: HashMap<SymbolGroup, (u32, u32)> = HashMap::new();
        for (&ch, record) in &self.records {
            let entry = totals.entry(SymbolGroup::classify(ch)).or_insert((0, 0));
            entry.0 = entry.0.saturating_add(record.hits);
            entry.1 = entry.1.saturating_add(record.misses);
        }

        let mut groups: Vec<GroupWeakness> = totals
            .into_iter()
            .map(|(group, (hits, misses))| GroupWeakness {
                group,
                hits,
                misses,
                error_rate: error_rate_raw(hits, misses),
            })
            .filter(|g| g.attempts() >= min_attempts)
            .collect();

        groups.sort_by(|a, b| {
            b.error_rate
                .partial_cmp(&a.error_rate)
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.group.cmp(&b.group))
        });
        groups
    }

    /// Trim every rolling buffer to capacity. Safe to call repeatedly.
    pub fn prune(&mut self) {
        for record in self.records.values_mut() {
            while record.recent_attempts.len() > RECENT_CAPACITY {
                record.recent_attempts.pop_front();
            }
        }
    }
}
