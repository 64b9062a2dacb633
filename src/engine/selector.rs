use std::cmp::Ordering;
use std::collections::{BTreeSet, HashSet, VecDeque};

use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::content::{Snippet, SnippetRepository};
use crate::engine::bias::{SignalPolicy, compute_category_bias};
use crate::engine::difficulty::{DifficultyProfile, DifficultyReason, rating_to_tier};
use crate::engine::heatmap::MistakeHeatmap;
use crate::engine::symbols::is_special;
use crate::engine::weakness::{Trajectory, WeaknessReport, priority_weakness};
use crate::store::schema::ProfileData;

const BASE_SCORE: f64 = 100.0;
const DISTANCE_PENALTY: f64 = 20.0;
const SPECIAL_WEIGHT: f64 = 40.0;
const MEANINGFUL_ERROR_RATE: f64 = 0.05;
const LEGACY_WEAK_BONUS: f64 = 10.0;
const PRIORITY_BONUS: f64 = 5.0;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SelectorConfig {
    /// How many recent picks are kept out of the pool.
    #[serde(default = "default_recent_capacity")]
    pub recent_capacity: usize,
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    /// Upper bound (exclusive) of the uniform noise added to each score.
    #[serde(default = "default_jitter")]
    pub jitter: f64,
    #[serde(default = "default_beginner_tier")]
    pub beginner_tier: u8,
    #[serde(default = "default_length_threshold")]
    pub length_threshold: usize,
    #[serde(default = "default_length_penalty")]
    pub length_penalty: f64,
}

fn default_recent_capacity() -> usize {
    10
}
fn default_top_k() -> usize {
    5
}
fn default_jitter() -> f64 {
    5.0
}
fn default_beginner_tier() -> u8 {
    2
}
fn default_length_threshold() -> usize {
    200
}
fn default_length_penalty() -> f64 {
    10.0
}

impl Default for SelectorConfig {
    fn default() -> Self {
        Self {
            recent_capacity: default_recent_capacity(),
            top_k: default_top_k(),
            jitter: default_jitter(),
            beginner_tier: default_beginner_tier(),
            length_threshold: default_length_threshold(),
            length_penalty: default_length_penalty(),
        }
    }
}

struct Scored<'a> {
    snippet: &'a Snippet,
    score: f64,
}

/// Everything about the user that goes into scoring, resolved once per
/// selection.
struct ScoreContext<'a> {
    target: u8,
    heatmap: &'a MistakeHeatmap,
    legacy_weak: &'a BTreeSet<char>,
    priority: Option<char>,
    beginner: bool,
    policy: &'a SignalPolicy,
}

#[derive(Clone, Debug, Default)]
pub struct SmartSelector {
    config: SelectorConfig,
    recent: VecDeque<String>,
}

impl SmartSelector {
    pub fn new(config: SelectorConfig) -> Self {
        Self {
            recent: VecDeque::with_capacity(config.recent_capacity),
            config,
        }
    }

    pub fn recent_ids(&self) -> impl Iterator<Item = &str> {
        self.recent.iter().map(String::as_str)
    }

    /// Seeds the exclusion ring, e.g. from persisted history (oldest first).
    pub fn remember(&mut self, id: &str) {
        if self.config.recent_capacity == 0 {
            return;
        }
        self.recent.retain(|r| r != id);
        self.recent.push_back(id.to_string());
        while self.recent.len() > self.config.recent_capacity {
            self.recent.pop_front();
        }
    }

    /// Scores the candidates inside the difficulty band and picks among the
    /// best. When no candidate sits in the band, only the tiers nearest to it
    /// compete. Recent picks are skipped within that set.
    #[allow(clippy::too_many_arguments)]
    pub fn select_adaptive<P, R>(
        &mut self,
        repo: &P,
        language: &str,
        profile: &ProfileData,
        difficulty: &DifficultyProfile,
        report: Option<&WeaknessReport>,
        policy: &SignalPolicy,
        rng: &mut R,
    ) -> Snippet
    where
        P: SnippetRepository + ?Sized,
        R: Rng + ?Sized,
    {
        let candidates: Vec<&Snippet> = repo.candidates(language).iter().collect();
        if candidates.is_empty() {
            debug!(language, "no candidates, using fallback snippet");
            return Snippet::fallback(language);
        }
        let pool = self.pool(nearest_to_band(candidates, difficulty));

        let priority = report
            .and_then(priority_weakness)
            .filter(|w| matches!(w.trajectory, Trajectory::Worsening | Trajectory::New))
            .map(|w| w.character);
        let ctx = ScoreContext {
            target: difficulty.target,
            heatmap: &profile.heatmap,
            legacy_weak: &profile.weak_chars,
            priority,
            beginner: rating_to_tier(profile.rating(language)) <= self.config.beginner_tier,
            policy,
        };

        let mut scored: Vec<Scored> = pool
            .into_iter()
            .map(|snippet| {
                let jitter = if self.config.jitter > 0.0 {
                    rng.gen_range(0.0..self.config.jitter)
                } else {
                    0.0
                };
                Scored {
                    snippet,
                    score: self.score(snippet, &ctx) + jitter,
                }
            })
            .collect();

        let chosen = self.pick_top(&mut scored, rng).clone();
        debug!(
            language,
            id = %chosen.id,
            difficulty = chosen.difficulty,
            target = difficulty.target,
            "selected snippet"
        );
        self.remember(&chosen.id);
        chosen
    }

    /// Picks the snippet covering the most of `weak_chars`. Without any
    /// overlap this is an ordinary adaptive pick at the user's base tier.
    pub fn select_for_weak_chars<P, R>(
        &mut self,
        repo: &P,
        language: &str,
        profile: &ProfileData,
        weak_chars: &BTreeSet<char>,
        rng: &mut R,
    ) -> Snippet
    where
        P: SnippetRepository + ?Sized,
        R: Rng + ?Sized,
    {
        let pool = self.pool(repo.candidates(language).iter().collect());
        let mut scored: Vec<Scored> = pool
            .into_iter()
            .map(|snippet| {
                let present: HashSet<char> = snippet.code.chars().collect();
                let overlap = weak_chars.iter().filter(|c| present.contains(c)).count();
                Scored {
                    snippet,
                    score: overlap as f64,
                }
            })
            .filter(|s| s.score > 0.0)
            .collect();

        if scored.is_empty() {
            debug!(language, "no snippet covers weak chars, falling back to adaptive");
            let fallback = DifficultyProfile::banded(
                rating_to_tier(profile.rating(language)),
                1,
                0.0,
                DifficultyReason::Static,
            );
            return self.select_adaptive(
                repo,
                language,
                profile,
                &fallback,
                None,
                &SignalPolicy::default(),
                rng,
            );
        }

        let chosen = self.pick_top(&mut scored, rng).clone();
        self.remember(&chosen.id);
        chosen
    }

    /// Drops recently seen snippets unless that would empty the pool.
    fn pool<'a>(&self, candidates: Vec<&'a Snippet>) -> Vec<&'a Snippet> {
        let fresh: Vec<&Snippet> = candidates
            .iter()
            .copied()
            .filter(|s| !self.recent.iter().any(|r| *r == s.id))
            .collect();
        if fresh.is_empty() {
            candidates
        } else {
            fresh
        }
    }

    fn score(&self, snippet: &Snippet, ctx: &ScoreContext) -> f64 {
        let distance = (snippet.difficulty as i32 - ctx.target as i32).abs() as f64;
        let mut score = BASE_SCORE - DISTANCE_PENALTY * distance;

        score += weakness_bonus(snippet, ctx.heatmap, ctx.legacy_weak);
        if let Some(ch) = ctx.priority {
            if snippet.code.contains(ch) {
                score += PRIORITY_BONUS;
            }
        }
        score += compute_category_bias(snippet, ctx.heatmap, ctx.policy);
        if ctx.beginner && snippet.char_count() > self.config.length_threshold {
            score -= self.config.length_penalty;
        }
        score
    }

    /// Ranks descending and picks uniformly among the best `top_k`.
    fn pick_top<'a, R: Rng + ?Sized>(
        &self,
        scored: &mut [Scored<'a>],
        rng: &mut R,
    ) -> &'a Snippet {
        scored.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.snippet.id.cmp(&b.snippet.id))
        });
        let k = self.config.top_k.clamp(1, scored.len());
        scored[rng.gen_range(0..k)].snippet
    }
}

/// Tiers between `tier` and the band, zero inside it.
fn band_gap(tier: u8, band: &DifficultyProfile) -> u8 {
    if tier < band.min {
        band.min - tier
    } else {
        tier.saturating_sub(band.max)
    }
}

fn nearest_to_band<'a>(pool: Vec<&'a Snippet>, band: &DifficultyProfile) -> Vec<&'a Snippet> {
    let nearest = pool
        .iter()
        .map(|s| band_gap(s.difficulty, band))
        .min()
        .unwrap_or(0);
    pool.into_iter()
        .filter(|s| band_gap(s.difficulty, band) == nearest)
        .collect()
}

fn weakness_bonus(
    snippet: &Snippet,
    heatmap: &MistakeHeatmap,
    legacy_weak: &BTreeSet<char>,
) -> f64 {
    let mut unique: Vec<char> = snippet.code.chars().collect();
    unique.sort_unstable();
    unique.dedup();

    if heatmap.is_empty() {
        let overlap = unique.iter().filter(|c| legacy_weak.contains(c)).count();
        return overlap as f64 * LEGACY_WEAK_BONUS;
    }

    unique
        .into_iter()
        .filter(|&c| is_special(c))
        .map(|c| heatmap.error_rate(c))
        .filter(|&rate| rate > MEANINGFUL_ERROR_RATE)
        .map(|rate| rate * SPECIAL_WEIGHT)
        .sum()
}
