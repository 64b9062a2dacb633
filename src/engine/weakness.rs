use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::engine::heatmap::MistakeHeatmap;
use crate::engine::trend::{SnapshotComparison, TrendAnalyzer};
use crate::store::schema::LongitudinalData;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WeaknessConfig {
    #[serde(default = "default_top_count")]
    pub top_count: usize,
    #[serde(default = "default_min_attempts")]
    pub min_attempts: u32,
    #[serde(default = "default_absolute_threshold")]
    pub absolute_threshold: f64,
    #[serde(default = "default_relative_threshold")]
    pub relative_threshold: f64,
    #[serde(default = "default_resolved_threshold")]
    pub resolved_threshold: f64,
}

fn default_top_count() -> usize {
    10
}
fn default_min_attempts() -> u32 {
    5
}
fn default_absolute_threshold() -> f64 {
    0.03
}
fn default_relative_threshold() -> f64 {
    0.10
}
fn default_resolved_threshold() -> f64 {
    0.1
}

impl Default for WeaknessConfig {
    fn default() -> Self {
        Self {
            top_count: default_top_count(),
            min_attempts: default_min_attempts(),
            absolute_threshold: default_absolute_threshold(),
            relative_threshold: default_relative_threshold(),
            resolved_threshold: default_resolved_threshold(),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Trajectory {
    Improving,
    Steady,
    Worsening,
    New,
}

impl Trajectory {
    /// Higher means more urgent.
    fn urgency(self) -> u8 {
        match self {
            Trajectory::Worsening => 3,
            Trajectory::New => 2,
            Trajectory::Steady => 1,
            Trajectory::Improving => 0,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WeaknessItem {
    pub character: char,
    pub error_rate: f64,
    pub attempts: u32,
    pub trajectory: Trajectory,
    pub previous_error_rate: Option<f64>,
    pub improvement: Option<f64>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct WeaknessReport {
    pub language: String,
    pub items: Vec<WeaknessItem>,
    pub resolved: Vec<char>,
    pub improving_count: usize,
    pub steady_count: usize,
    pub worsening_count: usize,
    pub new_count: usize,
    /// Mean improvement across every character the two newest snapshots
    /// share. None without history.
    pub mean_improvement: Option<f64>,
}

impl WeaknessReport {
    pub fn has_history(&self) -> bool {
        self.mean_improvement.is_some()
    }
}

#[derive(Clone, Debug, Default)]
pub struct WeaknessTracker {
    config: WeaknessConfig,
    analyzer: TrendAnalyzer,
}

impl WeaknessTracker {
    pub fn new(config: WeaknessConfig, analyzer: TrendAnalyzer) -> Self {
        Self { config, analyzer }
    }

    pub fn report(
        &self,
        language: &str,
        heatmap: &MistakeHeatmap,
        longitudinal: &LongitudinalData,
    ) -> WeaknessReport {
        let current = heatmap.weakest(self.config.top_count, self.config.min_attempts);
        let comparisons = self.analyzer.compare_recent_snapshots(longitudinal, language);

        let items: Vec<WeaknessItem> = current
            .iter()
            .map(|weak| {
                let matched = comparisons.iter().find(|c| c.character == weak.character);
                match matched {
                    Some(cmp) => WeaknessItem {
                        character: weak.character,
                        error_rate: weak.error_rate,
                        attempts: weak.attempts,
                        trajectory: self.classify(cmp.improvement, cmp.old_error_rate),
                        previous_error_rate: Some(cmp.old_error_rate),
                        improvement: Some(cmp.improvement),
                    },
                    None => WeaknessItem {
                        character: weak.character,
                        error_rate: weak.error_rate,
                        attempts: weak.attempts,
                        trajectory: Trajectory::New,
                        previous_error_rate: None,
                        improvement: None,
                    },
                }
            })
            .collect();

        let resolved = self.resolved_weaknesses(&comparisons, &items);

        let count = |t: Trajectory| items.iter().filter(|i| i.trajectory == t).count();
        let mean_improvement = if comparisons.is_empty() {
            None
        } else {
            Some(comparisons.iter().map(|c| c.improvement).sum::<f64>() / comparisons.len() as f64)
        };

        WeaknessReport {
            language: language.to_string(),
            improving_count: count(Trajectory::Improving),
            steady_count: count(Trajectory::Steady),
            worsening_count: count(Trajectory::Worsening),
            new_count: count(Trajectory::New),
            items,
            resolved,
            mean_improvement,
        }
    }

    pub fn classify(&self, improvement: f64, old_rate: f64) -> Trajectory {
        let threshold = self
            .config
            .absolute_threshold
            .max(old_rate * self.config.relative_threshold);
        if improvement > threshold {
            Trajectory::Improving
        } else if improvement < -threshold {
            Trajectory::Worsening
        } else {
            Trajectory::Steady
        }
    }

    fn resolved_weaknesses(
        &self,
        comparisons: &[SnapshotComparison],
        current: &[WeaknessItem],
    ) -> Vec<char> {
        comparisons
            .iter()
            .filter(|c| c.improvement > self.config.resolved_threshold)
            .filter(|c| !current.iter().any(|i| i.character == c.character))
            .map(|c| c.character)
            .collect()
    }
}

/// The weakness most worth fixing next: worst trajectory first, then the
/// highest current error rate.
pub fn priority_weakness(report: &WeaknessReport) -> Option<&WeaknessItem> {
    report.items.iter().max_by(|a, b| {
        a.trajectory
            .urgency()
            .cmp(&b.trajectory.urgency())
            .then_with(|| a.error_rate.partial_cmp(&b.error_rate).unwrap_or(Ordering::Equal))
            .then_with(|| b.character.cmp(&a.character))
    })
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone, Utc};

    use super::*;
    use crate::engine::trend::{SnapshotEntry, WeaknessSnapshot};

    fn heatmap_with(rates: &[(char, u32, u32)]) -> MistakeHeatmap {
        let mut heatmap = MistakeHeatmap::default();
        for &(ch, hits, misses) in rates {
            for _ in 0..hits {
                heatmap.record_hit(ch);
            }
            for _ in 0..misses {
                heatmap.record_miss(ch, None);
            }
        }
        heatmap
    }

    fn push_snapshot(data: &mut LongitudinalData, day: i64, entries: &[(char, f64)]) {
        data.push_snapshot(WeaknessSnapshot {
            language: "rust".to_string(),
            captured_at: Utc.with_ymd_and_hms(2026, 2, 1, 0, 0, 0).unwrap() + Duration::days(day),
            top_weaknesses: entries
                .iter()
                .map(|&(character, error_rate)| SnapshotEntry {
                    character,
                    error_rate,
                    total_attempts: 30,
                })
                .collect(),
        });
    }

    #[test]
    fn test_classify_thresholds() {
        let tracker = WeaknessTracker::default();
        // Low old rate: absolute floor of 0.03 applies
        assert_eq!(tracker.classify(0.04, 0.1), Trajectory::Improving);
        assert_eq!(tracker.classify(0.02, 0.1), Trajectory::Steady);
        assert_eq!(tracker.classify(-0.04, 0.1), Trajectory::Worsening);
        // High old rate: 10% relative threshold dominates (0.06)
        assert_eq!(tracker.classify(0.05, 0.6), Trajectory::Steady);
        assert_eq!(tracker.classify(0.07, 0.6), Trajectory::Improving);
        assert_eq!(tracker.classify(-0.07, 0.6), Trajectory::Worsening);
    }

    #[test]
    fn test_report_without_history_marks_everything_new() {
        let tracker = WeaknessTracker::default();
        let heatmap = heatmap_with(&[('{', 5, 5), (';', 8, 2), ('x', 1, 1)]);
        let report = tracker.report("rust", &heatmap, &LongitudinalData::default());
        assert_eq!(report.items.len(), 2);
        assert!(report.items.iter().all(|i| i.trajectory == Trajectory::New));
        assert_eq!(report.new_count, 2);
        assert!(report.resolved.is_empty());
        assert!(!report.has_history());
    }

    #[test]
    fn test_report_classifies_against_snapshots() {
        let tracker = WeaknessTracker::default();
        let mut data = LongitudinalData::default();
        push_snapshot(&mut data, 0, &[('{', 0.5), (';', 0.1), ('&', 0.4), ('(', 0.3)]);
        push_snapshot(&mut data, 7, &[('{', 0.3), (';', 0.3), ('(', 0.29)]);

        // Current heatmap: '{' 30%, ';' 30%, '(' 30%, '|' 40% (never seen before)
        let heatmap = heatmap_with(&[('{', 7, 3), (';', 7, 3), ('(', 7, 3), ('|', 6, 4)]);
        let report = tracker.report("rust", &heatmap, &data);

        let find = |c: char| report.items.iter().find(|i| i.character == c).unwrap();
        assert_eq!(find('{').trajectory, Trajectory::Improving);
        assert_eq!(find(';').trajectory, Trajectory::Worsening);
        assert_eq!(find('(').trajectory, Trajectory::Steady);
        assert_eq!(find('|').trajectory, Trajectory::New);
        // '&' dropped out of the newest snapshot and is not weak any more
        assert_eq!(report.resolved, vec!['&']);
        assert_eq!(report.worsening_count, 1);
        assert!(report.has_history());
    }

    #[test]
    fn test_priority_prefers_worsening_then_rate() {
        let item = |c: char, rate: f64, t: Trajectory| WeaknessItem {
            character: c,
            error_rate: rate,
            attempts: 20,
            trajectory: t,
            previous_error_rate: None,
            improvement: None,
        };
        let report = WeaknessReport {
            items: vec![
                item('a', 0.9, Trajectory::Improving),
                item('b', 0.2, Trajectory::Worsening),
                item('c', 0.3, Trajectory::Worsening),
                item('d', 0.8, Trajectory::New),
            ],
            ..Default::default()
        };
        assert_eq!(priority_weakness(&report).unwrap().character, 'c');

        let report = WeaknessReport {
            items: vec![item('a', 0.9, Trajectory::Improving), item('d', 0.1, Trajectory::Steady)],
            ..Default::default()
        };
        assert_eq!(priority_weakness(&report).unwrap().character, 'd');
        assert!(priority_weakness(&WeaknessReport::default()).is_none());
    }
}
