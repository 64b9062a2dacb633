use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::content::{Snippet, SnippetRepository};
use crate::engine::bias::SignalPolicy;
use crate::engine::difficulty::{
    DifficultyProfile, DifficultyReason, MAX_TIER, MIN_TIER, clamp_tier, rating_to_tier,
};
use crate::engine::selector::SmartSelector;
use crate::engine::weakness::WeaknessReport;
use crate::store::schema::ProfileData;

const TARGET_SHARE: f64 = 0.50;
const REVIEW_SHARE: f64 = 0.30;

const YOYO_WINDOW: usize = 6;
const YOYO_MIN_REVERSALS: usize = 3;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MixCategory {
    Target,
    Review,
    Stretch,
}

impl MixCategory {
    pub fn label(self) -> &'static str {
        match self {
            MixCategory::Target => "target",
            MixCategory::Review => "review",
            MixCategory::Stretch => "stretch",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SessionPlan {
    pub category: MixCategory,
    pub target_difficulty: u8,
    pub actual_difficulty: u8,
    pub comfort_zone: Option<u8>,
    pub reason: String,
}

/// Everything the planner needs besides the selector, the pool and the rng.
#[derive(Clone, Copy, Debug)]
pub struct PlanInputs<'a> {
    pub language: &'a str,
    pub profile: &'a ProfileData,
    pub difficulty: Option<&'a DifficultyProfile>,
    pub report: Option<&'a WeaknessReport>,
    pub manual_lock: Option<u8>,
    pub is_yoyoing: bool,
    pub policy: &'a SignalPolicy,
}

/// One uniform draw: Target 50%, Review 30%, Stretch 20%.
pub fn draw_category<R: Rng + ?Sized>(rng: &mut R) -> MixCategory {
    let roll: f64 = rng.gen_range(0.0..1.0);
    if roll < TARGET_SHARE {
        MixCategory::Target
    } else if roll < TARGET_SHARE + REVIEW_SHARE {
        MixCategory::Review
    } else {
        MixCategory::Stretch
    }
}

pub fn category_to_difficulty(category: MixCategory, comfort_zone: u8) -> u8 {
    let comfort = clamp_tier(comfort_zone as i32);
    match category {
        MixCategory::Target => comfort,
        MixCategory::Review => comfort.saturating_sub(1).max(MIN_TIER),
        MixCategory::Stretch => (comfort + 1).min(MAX_TIER),
    }
}

/// The tier the engine considers sustainable. Only trend-backed profiles
/// establish one; a Static profile is just the rating talking.
pub fn comfort_zone(difficulty: Option<&DifficultyProfile>) -> Option<u8> {
    difficulty
        .filter(|d| d.reason != DifficultyReason::Static)
        .map(|d| d.target)
}

/// True when the recent tiers keep bouncing: within the newest six, the
/// direction of change flips at least three times.
pub fn detect_yoyo(recent_tiers: &[u8]) -> bool {
    let start = recent_tiers.len().saturating_sub(YOYO_WINDOW);
    let window = &recent_tiers[start..];
    let steps: Vec<i32> = window
        .windows(2)
        .map(|w| (w[1] as i32 - w[0] as i32).signum())
        .filter(|&s| s != 0)
        .collect();
    let reversals = steps.windows(2).filter(|w| w[0] != w[1]).count();
    reversals >= YOYO_MIN_REVERSALS
}

pub fn plan_next<P, R>(
    selector: &mut SmartSelector,
    repo: &P,
    inputs: PlanInputs,
    rng: &mut R,
) -> (Snippet, SessionPlan)
where
    P: SnippetRepository + ?Sized,
    R: Rng + ?Sized,
{
    let comfort = comfort_zone(inputs.difficulty);

    let (category, requested, mut reason) = if let Some(locked) = inputs.manual_lock {
        let tier = clamp_tier(locked as i32);
        (MixCategory::Target, tier, format!("manual lock at D{tier}"))
    } else if let (true, Some(cz)) = (inputs.is_yoyoing, comfort) {
        (MixCategory::Target, cz, format!("stabilizing at comfort zone D{cz}"))
    } else if let Some(cz) = comfort {
        let category = draw_category(rng);
        let tier = category_to_difficulty(category, cz);
        (category, tier, format!("{} around comfort zone D{cz}", category.label()))
    } else {
        let tier = inputs
            .difficulty
            .map(|d| d.target)
            .unwrap_or_else(|| rating_to_tier(inputs.profile.rating(inputs.language)));
        (MixCategory::Target, tier, "building baseline".to_string())
    };

    // Without an established comfort zone the profile's own band is used as is.
    let pinned;
    let selection_profile = match (comfort, inputs.manual_lock, inputs.difficulty) {
        (None, None, Some(profile)) => profile,
        _ => {
            pinned = DifficultyProfile::pinned(requested);
            &pinned
        }
    };

    let snippet = selector.select_adaptive(
        repo,
        inputs.language,
        inputs.profile,
        selection_profile,
        inputs.report,
        inputs.policy,
        rng,
    );

    if snippet.difficulty != requested {
        reason.push_str(&format!(" (nearest to D{requested})"));
    }
    debug!(
        language = inputs.language,
        category = category.label(),
        requested,
        actual = snippet.difficulty,
        "planned session"
    );

    let plan = SessionPlan {
        category,
        target_difficulty: requested,
        actual_difficulty: snippet.difficulty,
        comfort_zone: comfort,
        reason,
    };
    (snippet, plan)
}
