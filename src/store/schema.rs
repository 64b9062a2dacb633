use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::content::Snippet;
use crate::engine::heatmap::MistakeHeatmap;
use crate::engine::planner::SessionPlan;
use crate::engine::trend::{LanguageTrend, WeaknessSnapshot};

const SCHEMA_VERSION: u32 = 1;
pub const DEFAULT_RATING: i32 = 1000;
const MAX_SESSION_TIMESTAMPS: usize = 1000;

fn schema_version() -> u32 {
    SCHEMA_VERSION
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ProfileData {
    #[serde(default = "schema_version")]
    pub schema_version: u32,
    #[serde(default)]
    pub ratings: BTreeMap<String, i32>,
    #[serde(default)]
    pub heatmap: MistakeHeatmap,
    /// Hand-maintained weak characters from before the heatmap existed.
    #[serde(default)]
    pub weak_chars: BTreeSet<char>,
}

impl Default for ProfileData {
    fn default() -> Self {
        Self {
            schema_version: SCHEMA_VERSION,
            ratings: BTreeMap::new(),
            heatmap: MistakeHeatmap::default(),
            weak_chars: BTreeSet::new(),
        }
    }
}

impl ProfileData {
    /// Check if loaded data has a stale schema version and needs reset.
    pub fn needs_reset(&self) -> bool {
        self.schema_version != SCHEMA_VERSION
    }

    pub fn rating(&self, language: &str) -> i32 {
        self.ratings.get(language).copied().unwrap_or(DEFAULT_RATING)
    }

    pub fn set_rating(&mut self, language: &str, rating: i32) {
        self.ratings.insert(language.to_string(), rating);
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LongitudinalData {
    #[serde(default = "schema_version")]
    pub schema_version: u32,
    #[serde(default)]
    pub trends_by_language: BTreeMap<String, LanguageTrend>,
    #[serde(default)]
    pub session_timestamps: Vec<DateTime<Utc>>,
    #[serde(default)]
    pub weakness_snapshots: Vec<WeaknessSnapshot>,
}

impl Default for LongitudinalData {
    fn default() -> Self {
        Self {
            schema_version: SCHEMA_VERSION,
            trends_by_language: BTreeMap::new(),
            session_timestamps: Vec::new(),
            weakness_snapshots: Vec::new(),
        }
    }
}

impl LongitudinalData {
    pub fn needs_reset(&self) -> bool {
        self.schema_version != SCHEMA_VERSION
    }

    pub fn trend(&self, language: &str) -> Option<&LanguageTrend> {
        self.trends_by_language.get(language)
    }

    pub fn session_count(&self, language: &str) -> u32 {
        self.trend(language).map(|t| t.total_sessions).unwrap_or(0)
    }

    /// Append a finished session to the language's rolling series.
    /// Invalid samples are dropped and leave everything untouched.
    pub fn record_session(
        &mut self,
        language: &str,
        wpm: f64,
        accuracy: f64,
        at: DateTime<Utc>,
    ) -> bool {
        let trend = self
            .trends_by_language
            .entry(language.to_string())
            .or_default();
        if !trend.record(wpm, accuracy, at) {
            return false;
        }
        self.session_timestamps.push(at);
        if self.session_timestamps.len() > MAX_SESSION_TIMESTAMPS {
            let excess = self.session_timestamps.len() - MAX_SESSION_TIMESTAMPS;
            self.session_timestamps.drain(..excess);
        }
        true
    }

    /// Snapshots are taken every `interval` sessions per language.
    pub fn snapshot_due(&self, language: &str, interval: u32) -> bool {
        let sessions = self.session_count(language);
        interval > 0 && sessions > 0 && sessions % interval == 0
    }

    pub fn push_snapshot(&mut self, snapshot: WeaknessSnapshot) {
        self.weakness_snapshots.push(snapshot);
    }

    pub fn sanitize(&mut self) {
        for trend in self.trends_by_language.values_mut() {
            trend.sanitize();
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SessionRecord {
    pub snippet_id: String,
    pub language: String,
    pub wpm: f64,
    pub accuracy: f64,
    pub difficulty: u8,
    pub plan: SessionPlan,
    pub rating_after: i32,
    pub completed_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SessionHistoryData {
    #[serde(default = "schema_version")]
    pub schema_version: u32,
    #[serde(default)]
    pub sessions: Vec<SessionRecord>,
}

impl Default for SessionHistoryData {
    fn default() -> Self {
        Self {
            schema_version: SCHEMA_VERSION,
            sessions: Vec::new(),
        }
    }
}

impl SessionHistoryData {
    pub fn needs_reset(&self) -> bool {
        self.schema_version != SCHEMA_VERSION
    }

    /// Actual tiers of the last `count` sessions in `language`, oldest first.
    pub fn recent_tiers(&self, language: &str, count: usize) -> Vec<u8> {
        let mut tiers: Vec<u8> = self
            .sessions
            .iter()
            .rev()
            .filter(|s| s.language == language)
            .take(count)
            .map(|s| s.plan.actual_difficulty)
            .collect();
        tiers.reverse();
        tiers
    }

    /// Snippet ids of the most recent sessions, oldest first.
    pub fn recent_snippet_ids(&self, count: usize) -> Vec<&str> {
        let start = self.sessions.len().saturating_sub(count);
        self.sessions[start..]
            .iter()
            .map(|s| s.snippet_id.as_str())
            .collect()
    }
}

/// User-authored and imported snippets. Built-in content is never written
/// out; it is rebuilt from the binary on every start.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LibraryData {
    #[serde(default = "schema_version")]
    pub schema_version: u32,
    #[serde(default)]
    pub snippets: Vec<Snippet>,
}

impl Default for LibraryData {
    fn default() -> Self {
        Self {
            schema_version: SCHEMA_VERSION,
            snippets: Vec::new(),
        }
    }
}

impl LibraryData {
    pub fn needs_reset(&self) -> bool {
        self.schema_version != SCHEMA_VERSION
    }
}
