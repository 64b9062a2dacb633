use serde::{Deserialize, Serialize};

use crate::engine::trend::{Momentum, TrendAnalyzer};
use crate::store::schema::{LongitudinalData, ProfileData};

pub const MIN_TIER: u8 = 1;
pub const MAX_TIER: u8 = 7;

const FULL_CONFIDENCE_SESSIONS: f64 = 30.0;
const STRUGGLING_ACCURACY: f64 = 80.0;
const CRUISING_ACCURACY: f64 = 95.0;
const CRUISING_WPM: f64 = 50.0;

/// Upper rating bound (exclusive) for tiers 1..=6; anything above is tier 7.
const TIER_BOUNDS: [i32; 6] = [900, 1050, 1200, 1350, 1500, 1650];

const K_FACTOR: f64 = 32.0;
const PROVISIONAL_SESSIONS: u32 = 30;
const MAX_RATING: i32 = 3000;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum DifficultyReason {
    Static,
    TrendUp,
    Plateau,
    TrendDown,
}

impl DifficultyReason {
    pub fn as_str(self) -> &'static str {
        match self {
            DifficultyReason::Static => "static",
            DifficultyReason::TrendUp => "trend up",
            DifficultyReason::Plateau => "plateau",
            DifficultyReason::TrendDown => "trend down",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DifficultyProfile {
    pub target: u8,
    pub min: u8,
    pub max: u8,
    pub confidence: f64,
    pub reason: DifficultyReason,
}

impl DifficultyProfile {
    /// Builds a profile centred on `target` with `width` tiers either side,
    /// everything clamped into 1..=7.
    pub fn banded(target: u8, width: u8, confidence: f64, reason: DifficultyReason) -> Self {
        let target = clamp_tier(target as i32);
        Self {
            target,
            min: clamp_tier(target as i32 - width as i32),
            max: clamp_tier(target as i32 + width as i32),
            confidence: if confidence.is_finite() {
                confidence.clamp(0.0, 1.0)
            } else {
                0.0
            },
            reason,
        }
    }

    /// A profile with no room either side, used to force a tier.
    pub fn pinned(tier: u8) -> Self {
        Self::banded(tier, 0, 1.0, DifficultyReason::Static)
    }

    pub fn contains(&self, tier: u8) -> bool {
        (self.min..=self.max).contains(&tier)
    }
}

pub fn clamp_tier(value: i32) -> u8 {
    value.clamp(MIN_TIER as i32, MAX_TIER as i32) as u8
}

pub fn rating_to_tier(rating: i32) -> u8 {
    TIER_BOUNDS
        .iter()
        .position(|&bound| rating < bound)
        .map(|idx| idx as u8 + 1)
        .unwrap_or(MAX_TIER)
}

fn tier_rating(tier: u8) -> f64 {
    825.0 + 150.0 * (clamp_tier(tier as i32) - 1) as f64
}

fn session_confidence(sessions: u32) -> f64 {
    (sessions as f64 / FULL_CONFIDENCE_SESSIONS).min(1.0)
}

#[derive(Clone, Debug, Default)]
pub struct DifficultyEngine {
    analyzer: TrendAnalyzer,
}

impl DifficultyEngine {
    pub fn new(analyzer: TrendAnalyzer) -> Self {
        Self { analyzer }
    }

    pub fn compute_difficulty(
        &self,
        language: &str,
        profile: &ProfileData,
        longitudinal: &LongitudinalData,
    ) -> DifficultyProfile {
        let base = rating_to_tier(profile.rating(language));
        let sessions = longitudinal.session_count(language);

        let summary = longitudinal
            .trend(language)
            .and_then(|trend| self.analyzer.analyze(language, trend));
        let Some(summary) = summary else {
            return DifficultyProfile::banded(
                base,
                1,
                session_confidence(sessions),
                DifficultyReason::Static,
            );
        };

        let adjustment = match summary.momentum {
            Momentum::StrongPositive => 1,
            Momentum::StrongNegative => -1,
            _ => 0,
        };
        let mut adjusted = clamp_tier(base as i32 + adjustment);
        let mut width: u8 = if sessions >= FULL_CONFIDENCE_SESSIONS as u32 { 0 } else { 1 };

        if summary.recent_accuracy < STRUGGLING_ACCURACY {
            adjusted = adjusted.min(base);
            width = width.max(1);
        } else if summary.recent_accuracy > CRUISING_ACCURACY && summary.recent_wpm > CRUISING_WPM {
            adjusted = adjusted.max(base);
        }

        let reason = match adjusted.cmp(&base) {
            std::cmp::Ordering::Greater => DifficultyReason::TrendUp,
            std::cmp::Ordering::Less => DifficultyReason::TrendDown,
            std::cmp::Ordering::Equal => DifficultyReason::Plateau,
        };

        DifficultyProfile::banded(adjusted, width, session_confidence(sessions), reason)
    }
}

/// Session performance folded into [0, 1]: accuracy above 80% carries most
/// of the weight, speed up to 60 WPM the rest.
pub fn performance_score(wpm: f64, accuracy: f64) -> f64 {
    let accuracy_part =
        ((accuracy - STRUGGLING_ACCURACY) / (100.0 - STRUGGLING_ACCURACY)).clamp(0.0, 1.0);
    let speed_part = (wpm / 60.0).clamp(0.0, 1.0);
    0.7 * accuracy_part + 0.3 * speed_part
}

/// Elo-style update of a language rating after typing a snippet of `tier`.
pub fn update_rating(rating: i32, tier: u8, wpm: f64, accuracy: f64, sessions_before: u32) -> i32 {
    if !wpm.is_finite() || !accuracy.is_finite() {
        return rating;
    }
    let expected = 1.0 / (1.0 + 10.0_f64.powf((tier_rating(tier) - rating as f64) / 400.0));
    let k = if sessions_before < PROVISIONAL_SESSIONS {
        K_FACTOR * 2.0
    } else {
        K_FACTOR
    };
    let delta = k * (performance_score(wpm, accuracy) - expected);
    (rating as f64 + delta).round().clamp(0.0, MAX_RATING as f64) as i32
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone, Utc};

    use super::*;

    fn longitudinal(language: &str, wpm: &[f64], accuracy: &[f64]) -> LongitudinalData {
        let mut data = LongitudinalData::default();
        let start = Utc.with_ymd_and_hms(2026, 4, 1, 9, 0, 0).unwrap();
        // Series are given newest first; record oldest first.
        for (i, (w, a)) in wpm.iter().zip(accuracy).rev().enumerate() {
            data.record_session(language, *w, *a, start + Duration::hours(i as i64));
        }
        data
    }

    fn profile_with_rating(rating: i32) -> ProfileData {
        let mut profile = ProfileData::default();
        profile.set_rating("rust", rating);
        profile
    }

    #[test]
    fn test_rating_to_tier_is_monotonic_step() {
        assert_eq!(rating_to_tier(0), 1);
        assert_eq!(rating_to_tier(899), 1);
        assert_eq!(rating_to_tier(900), 2);
        assert_eq!(rating_to_tier(1000), 2);
        assert_eq!(rating_to_tier(1200), 4);
        assert_eq!(rating_to_tier(1649), 6);
        assert_eq!(rating_to_tier(5000), 7);
        let mut prev = 1;
        for rating in (0..2000).step_by(10) {
            let tier = rating_to_tier(rating);
            assert!(tier >= prev);
            prev = tier;
        }
    }

    #[test]
    fn test_no_history_is_static_with_band() {
        let engine = DifficultyEngine::default();
        let profile = profile_with_rating(1250);
        let dp = engine.compute_difficulty("rust", &profile, &LongitudinalData::default());
        assert_eq!(dp.reason, DifficultyReason::Static);
        assert_eq!(dp.target, 4);
        assert_eq!((dp.min, dp.max), (3, 5));
        assert_eq!(dp.confidence, 0.0);
    }

    #[test]
    fn test_few_sessions_is_static_low_confidence() {
        let engine = DifficultyEngine::default();
        let data = longitudinal("rust", &[40.0; 4], &[95.0; 4]);
        let dp = engine.compute_difficulty("rust", &profile_with_rating(800), &data);
        assert_eq!(dp.reason, DifficultyReason::Static);
        assert_eq!((dp.min, dp.target, dp.max), (1, 1, 2));
        assert!(dp.confidence < 0.2);
    }

    #[test]
    fn test_strong_positive_pushes_up() {
        let engine = DifficultyEngine::default();
        let mut wpm = vec![45.0; 5];
        wpm.extend([35.0; 5]);
        let mut acc = vec![94.0; 5];
        acc.extend([88.0; 5]);
        let data = longitudinal("rust", &wpm, &acc);
        let dp = engine.compute_difficulty("rust", &profile_with_rating(1100), &data);
        assert_eq!(dp.target, 4);
        assert_eq!(dp.reason, DifficultyReason::TrendUp);
        assert_eq!((dp.min, dp.max), (3, 5));
        assert!((dp.confidence - 10.0 / 30.0).abs() < 1e-9);
    }

    #[test]
    fn test_strong_negative_pulls_down() {
        let engine = DifficultyEngine::default();
        let mut wpm = vec![30.0; 5];
        wpm.extend([40.0; 5]);
        let mut acc = vec![85.0; 5];
        acc.extend([93.0; 5]);
        let data = longitudinal("rust", &wpm, &acc);
        let dp = engine.compute_difficulty("rust", &profile_with_rating(1100), &data);
        assert_eq!(dp.target, 2);
        assert_eq!(dp.reason, DifficultyReason::TrendDown);
    }

    #[test]
    fn test_struggling_caps_at_base() {
        let engine = DifficultyEngine::default();
        // Rising on both metrics, but accuracy is still under 80
        let mut wpm = vec![45.0; 5];
        wpm.extend([30.0; 25]);
        let mut acc = vec![78.0; 5];
        acc.extend([60.0; 25]);
        let data = longitudinal("rust", &wpm, &acc);
        let dp = engine.compute_difficulty("rust", &profile_with_rating(1100), &data);
        assert_eq!(dp.target, 3);
        // 30 sessions would collapse the band; struggling keeps it open
        assert_eq!((dp.min, dp.max), (2, 4));
        assert_eq!(dp.reason, DifficultyReason::Plateau);
    }

    #[test]
    fn test_cruising_is_floored_at_base() {
        let engine = DifficultyEngine::default();
        // Both metrics dipping but the user is still fast and accurate
        let mut wpm = vec![70.0; 5];
        wpm.extend([80.0; 5]);
        let mut acc = vec![96.0; 5];
        acc.extend([99.5; 5]);
        let data = longitudinal("rust", &wpm, &acc);
        let dp = engine.compute_difficulty("rust", &profile_with_rating(1400), &data);
        assert_eq!(dp.target, 5);
        assert_eq!(dp.reason, DifficultyReason::Plateau);
    }

    #[test]
    fn test_mature_history_narrows_band() {
        let engine = DifficultyEngine::default();
        let data = longitudinal("rust", &[40.0; 30], &[92.0; 30]);
        let dp = engine.compute_difficulty("rust", &profile_with_rating(1100), &data);
        assert_eq!((dp.min, dp.target, dp.max), (3, 3, 3));
        assert_eq!(dp.confidence, 1.0);
    }

    #[test]
    fn test_profile_invariants_hold() {
        for tier in 0..10u8 {
            for width in 0..3u8 {
                let dp = DifficultyProfile::banded(tier, width, 2.0, DifficultyReason::Static);
                assert!(MIN_TIER <= dp.min && dp.min <= dp.target);
                assert!(dp.target <= dp.max && dp.max <= MAX_TIER);
                assert!((0.0..=1.0).contains(&dp.confidence));
            }
        }
        assert!(DifficultyProfile::pinned(4).contains(4));
        assert!(!DifficultyProfile::pinned(4).contains(5));
    }

    #[test]
    fn test_rating_update_direction() {
        let up = update_rating(1000, 2, 60.0, 99.0, 5);
        assert!(up > 1000);
        let down = update_rating(1000, 2, 10.0, 70.0, 5);
        assert!(down < 1000);
        // Provisional K doubles the swing
        let settled = update_rating(1000, 2, 60.0, 99.0, 50);
        assert!(up - 1000 > settled - 1000);
        assert_eq!(update_rating(1000, 2, f64::NAN, 90.0, 0), 1000);
    }

    #[test]
    fn test_performance_score_bounds() {
        assert_eq!(performance_score(0.0, 50.0), 0.0);
        assert!((performance_score(200.0, 100.0) - 1.0).abs() < 1e-12);
    }
}
