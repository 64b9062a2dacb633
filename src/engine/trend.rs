use std::cmp::Ordering;
use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::engine::heatmap::MistakeHeatmap;
use crate::store::schema::LongitudinalData;

pub const MAX_SERIES_LEN: usize = 30;
const SNAPSHOT_TOP: usize = 10;
const SNAPSHOT_MIN_ATTEMPTS: u32 = 5;

// ---------------------------------------------------------------------------
// Tunables
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TrendConfig {
    #[serde(default = "default_min_sessions")]
    pub min_sessions: u32,
    #[serde(default = "default_direction_threshold")]
    pub direction_threshold: f64,
    #[serde(default = "default_plateau_band")]
    pub plateau_band: f64,
    #[serde(default = "default_plateau_min_length")]
    pub plateau_min_length: usize,
}

fn default_min_sessions() -> u32 {
    5
}
fn default_direction_threshold() -> f64 {
    0.03
}
fn default_plateau_band() -> f64 {
    0.05
}
fn default_plateau_min_length() -> usize {
    5
}

impl Default for TrendConfig {
    fn default() -> Self {
        Self {
            min_sessions: default_min_sessions(),
            direction_threshold: default_direction_threshold(),
            plateau_band: default_plateau_band(),
            plateau_min_length: default_plateau_min_length(),
        }
    }
}

// ---------------------------------------------------------------------------
// Rolling per-language series
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct LanguageTrend {
    /// Newest first.
    #[serde(default)]
    pub recent_wpm: Vec<f64>,
    /// Newest first.
    #[serde(default)]
    pub recent_accuracy: Vec<f64>,
    #[serde(default)]
    pub total_sessions: u32,
    #[serde(default)]
    pub first_session_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub last_session_at: Option<DateTime<Utc>>,
}

impl LanguageTrend {
    /// Append a finished session. Returns false (and stores nothing) when
    /// either value is non-finite or out of range.
    pub fn record(&mut self, wpm: f64, accuracy: f64, at: DateTime<Utc>) -> bool {
        if !is_valid_sample(wpm, accuracy) {
            return false;
        }
        self.recent_wpm.insert(0, wpm);
        self.recent_wpm.truncate(MAX_SERIES_LEN);
        self.recent_accuracy.insert(0, accuracy);
        self.recent_accuracy.truncate(MAX_SERIES_LEN);
        self.total_sessions = self.total_sessions.saturating_add(1);
        if self.first_session_at.is_none() {
            self.first_session_at = Some(at);
        }
        self.last_session_at = Some(at);
        true
    }

    /// Drop anything a hand-edited or older file may have smuggled in.
    /// Samples go as (wpm, accuracy) pairs so the two series stay aligned;
    /// an unpaired tail is dropped too.
    pub fn sanitize(&mut self) {
        let (wpm, accuracy): (Vec<f64>, Vec<f64>) = self
            .recent_wpm
            .iter()
            .zip(&self.recent_accuracy)
            .filter(|&(&w, &a)| is_valid_sample(w, a))
            .take(MAX_SERIES_LEN)
            .map(|(&w, &a)| (w, a))
            .unzip();
        self.recent_wpm = wpm;
        self.recent_accuracy = accuracy;
    }
}

fn is_valid_sample(wpm: f64, accuracy: f64) -> bool {
    wpm.is_finite() && wpm >= 0.0 && accuracy.is_finite() && (0.0..=100.0).contains(&accuracy)
}

// ---------------------------------------------------------------------------
// Weakness snapshots
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SnapshotEntry {
    pub character: char,
    pub error_rate: f64,
    pub total_attempts: u32,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WeaknessSnapshot {
    pub language: String,
    pub captured_at: DateTime<Utc>,
    pub top_weaknesses: Vec<SnapshotEntry>,
}

impl WeaknessSnapshot {
    pub fn capture(language: &str, heatmap: &MistakeHeatmap, at: DateTime<Utc>) -> Self {
        let top_weaknesses = heatmap
            .weakest(SNAPSHOT_TOP, SNAPSHOT_MIN_ATTEMPTS)
            .into_iter()
            .map(|w| SnapshotEntry {
                character: w.character,
                error_rate: w.error_rate,
                total_attempts: w.attempts,
            })
            .collect();
        Self {
            language: language.to_string(),
            captured_at: at,
            top_weaknesses,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SnapshotComparison {
    pub character: char,
    pub old_error_rate: f64,
    /// None when the character dropped out of the newer snapshot.
    pub new_error_rate: Option<f64>,
    pub improvement: f64,
}

// ---------------------------------------------------------------------------
// Summary types
// ---------------------------------------------------------------------------

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    Improving,
    Stable,
    Declining,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Momentum {
    StrongPositive,
    Positive,
    Neutral,
    Negative,
    StrongNegative,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LanguageTrendSummary {
    pub language: String,
    pub session_count: u32,
    pub wpm_direction: Option<Direction>,
    pub accuracy_direction: Option<Direction>,
    pub wpm_velocity: f64,
    pub accuracy_velocity: f64,
    pub wpm_plateau_length: usize,
    pub accuracy_plateau_length: usize,
    pub momentum: Momentum,
    /// Mean of the newest few sessions.
    pub recent_wpm: f64,
    pub recent_accuracy: f64,
    pub is_plateau: bool,
}

// ---------------------------------------------------------------------------
// Analyzer
// ---------------------------------------------------------------------------

const DIRECTION_WINDOW: usize = 5;
const VELOCITY_WINDOW: usize = 10;
const VELOCITY_MIN_POINTS: usize = 4;
const PLATEAU_WINDOW: usize = 10;

#[derive(Clone, Debug, Default)]
pub struct TrendAnalyzer {
    config: TrendConfig,
}

impl TrendAnalyzer {
    pub fn new(config: TrendConfig) -> Self {
        Self { config }
    }

    pub fn analyze(&self, language: &str, trend: &LanguageTrend) -> Option<LanguageTrendSummary> {
        if trend.total_sessions < self.config.min_sessions {
            return None;
        }

        let wpm_direction = self.compute_direction(&trend.recent_wpm);
        let accuracy_direction = self.compute_direction(&trend.recent_accuracy);
        let wpm_plateau_length = self.compute_plateau_length(&trend.recent_wpm);

        Some(LanguageTrendSummary {
            language: language.to_string(),
            session_count: trend.total_sessions,
            wpm_direction,
            accuracy_direction,
            wpm_velocity: compute_velocity(&trend.recent_wpm),
            accuracy_velocity: compute_velocity(&trend.recent_accuracy),
            wpm_plateau_length,
            accuracy_plateau_length: self.compute_plateau_length(&trend.recent_accuracy),
            momentum: combine_momentum(wpm_direction, accuracy_direction),
            recent_wpm: head_mean(&trend.recent_wpm, DIRECTION_WINDOW),
            recent_accuracy: head_mean(&trend.recent_accuracy, DIRECTION_WINDOW),
            is_plateau: wpm_plateau_length >= self.config.plateau_min_length,
        })
    }

    /// Newest five vs the five before them. None below ten points.
    pub fn compute_direction(&self, series: &[f64]) -> Option<Direction> {
        if series.len() < DIRECTION_WINDOW * 2 {
            return None;
        }
        let recent = mean(&series[..DIRECTION_WINDOW]);
        let older = mean(&series[DIRECTION_WINDOW..DIRECTION_WINDOW * 2]);
        let band = older.abs() * self.config.direction_threshold;
        let delta = recent - older;

        if delta > band {
            Some(Direction::Improving)
        } else if delta < -band {
            Some(Direction::Declining)
        } else {
            Some(Direction::Stable)
        }
    }

    /// Consecutive newest points inside the band around the mean of the
    /// newest ten.
    pub fn compute_plateau_length(&self, series: &[f64]) -> usize {
        if series.is_empty() {
            return 0;
        }
        let center = head_mean(series, PLATEAU_WINDOW);
        let band = center.abs() * self.config.plateau_band;
        series
            .iter()
            .take_while(|v| (*v - center).abs() <= band)
            .count()
    }

    /// Compare the two most recent snapshots for `language`.
    pub fn compare_recent_snapshots(
        &self,
        data: &LongitudinalData,
        language: &str,
    ) -> Vec<SnapshotComparison> {
        let mut snapshots: Vec<(usize, &WeaknessSnapshot)> = data
            .weakness_snapshots
            .iter()
            .enumerate()
            .filter(|(_, s)| s.language == language)
            .collect();
        if snapshots.len() < 2 {
            return Vec::new();
        }
        // Newest first; insertion order breaks timestamp ties.
        snapshots.sort_by(|a, b| b.1.captured_at.cmp(&a.1.captured_at).then(b.0.cmp(&a.0)));
        let newer = snapshots[0].1;
        let older = snapshots[1].1;

        let mut seen = HashSet::new();
        let mut comparisons: Vec<SnapshotComparison> = older
            .top_weaknesses
            .iter()
            .filter(|entry| seen.insert(entry.character))
            .map(|entry| {
                let current = newer
                    .top_weaknesses
                    .iter()
                    .find(|e| e.character == entry.character)
                    .map(|e| e.error_rate);
                let improvement = match current {
                    Some(rate) => entry.error_rate - rate,
                    None => 1.0,
                };
                SnapshotComparison {
                    character: entry.character,
                    old_error_rate: entry.error_rate,
                    new_error_rate: current,
                    improvement,
                }
            })
            .collect();

        comparisons.sort_by(|a, b| {
            b.improvement
                .abs()
                .partial_cmp(&a.improvement.abs())
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.character.cmp(&b.character))
        });
        comparisons
    }
}

/// Least-squares slope over the newest ten points, with x increasing
/// toward the newest session. Zero when there is too little data.
pub fn compute_velocity(series: &[f64]) -> f64 {
    let n = series.len().min(VELOCITY_WINDOW);
    if n < VELOCITY_MIN_POINTS {
        return 0.0;
    }
    let ys = &series[..n];
    let xs: Vec<f64> = (0..n).map(|i| (n - 1 - i) as f64).collect();

    let x_mean = xs.iter().sum::<f64>() / n as f64;
    let y_mean = ys.iter().sum::<f64>() / n as f64;

    let mut ss_xy = 0.0;
    let mut ss_xx = 0.0;
    for i in 0..n {
        let dx = xs[i] - x_mean;
        ss_xy += dx * (ys[i] - y_mean);
        ss_xx += dx * dx;
    }

    if ss_xx < 1e-10 {
        return 0.0;
    }
    let slope = ss_xy / ss_xx;
    if slope.is_finite() { slope } else { 0.0 }
}

pub fn combine_momentum(wpm: Option<Direction>, accuracy: Option<Direction>) -> Momentum {
    use Direction::*;
    match (wpm, accuracy) {
        (Some(Improving), Some(Improving)) => Momentum::StrongPositive,
        (Some(Declining), Some(Declining)) => Momentum::StrongNegative,
        (Some(Improving), _) | (_, Some(Improving)) => {
            // One up, the other down cancels out.
            if wpm == Some(Declining) || accuracy == Some(Declining) {
                Momentum::Neutral
            } else {
                Momentum::Positive
            }
        }
        (Some(Declining), _) | (_, Some(Declining)) => Momentum::Negative,
        _ => Momentum::Neutral,
    }
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

fn head_mean(values: &[f64], count: usize) -> f64 {
    mean(&values[..values.len().min(count)])
}
