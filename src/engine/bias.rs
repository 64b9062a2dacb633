use serde::{Deserialize, Serialize};

use crate::content::Snippet;
use crate::engine::heatmap::MistakeHeatmap;
use crate::engine::symbols::SymbolGroup;

pub const MAX_BIAS: f64 = 15.0;
const MIN_GROUP_ATTEMPTS: u32 = 10;
const MIN_GROUP_ERROR_RATE: f64 = 0.10;
const MIN_WEAK_GROUPS: usize = 2;
const GROUP_WEIGHT: f64 = 10.0;

/// Host-controlled switches for optional selection signals.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignalPolicy {
    #[serde(default)]
    pub weakness_bias: bool,
}

impl SignalPolicy {
    pub fn with_weakness_bias(enabled: bool) -> Self {
        Self {
            weakness_bias: enabled,
        }
    }
}

/// Small score bonus for snippets that exercise the user's weak symbol
/// groups. Each weak group counts once, at its first occurrence in the code.
pub fn compute_category_bias(
    snippet: &Snippet,
    heatmap: &MistakeHeatmap,
    policy: &SignalPolicy,
) -> f64 {
    if !policy.weakness_bias {
        return 0.0;
    }

    let weak: Vec<(SymbolGroup, f64)> = heatmap
        .weakest_groups(MIN_GROUP_ATTEMPTS)
        .into_iter()
        .filter(|g| g.error_rate >= MIN_GROUP_ERROR_RATE)
        .map(|g| (g.group, g.error_rate))
        .collect();
    if weak.len() < MIN_WEAK_GROUPS {
        return 0.0;
    }

    let mut seen: Vec<SymbolGroup> = Vec::with_capacity(weak.len());
    let mut bias = 0.0;
    for ch in snippet.code.chars() {
        let group = SymbolGroup::classify(ch);
        if seen.contains(&group) {
            continue;
        }
        if let Some(&(_, rate)) = weak.iter().find(|(g, _)| *g == group) {
            seen.push(group);
            bias += rate * GROUP_WEIGHT;
            if seen.len() == weak.len() {
                break;
            }
        }
    }
    bias.clamp(0.0, MAX_BIAS)
}
