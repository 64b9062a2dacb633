use crate::engine::symbols::is_special;

pub const MAX_RAW_SCORE: u8 = 9;

/// Raw complexity score in 0..=9 from length, line count, symbol density
/// and bracket nesting.
pub fn raw_score(code: &str) -> u8 {
    let chars = code.chars().count();
    let lines = code.lines().count();
    let non_ws = code.chars().filter(|c| !c.is_whitespace()).count();
    let specials = code.chars().filter(|&c| is_special(c)).count();
    let density = if non_ws == 0 {
        0.0
    } else {
        specials as f64 / non_ws as f64
    };
    let depth = max_nesting(code);

    let mut score = 0u8;
    score += [80, 200, 400].iter().filter(|&&n| chars > n).count() as u8;
    score += [4, 12].iter().filter(|&&n| lines > n).count() as u8;
    score += [0.15, 0.25].iter().filter(|&&d| density > d).count() as u8;
    score += [2, 4].iter().filter(|&&d| depth >= d).count() as u8;
    score.min(MAX_RAW_SCORE)
}

pub fn score_to_tier(score: u8) -> u8 {
    match score {
        0..=1 => 1,
        2 => 2,
        3..=4 => 3,
        5 => 4,
        6..=7 => 5,
        8 => 6,
        _ => 7,
    }
}

pub fn estimate_difficulty(code: &str) -> u8 {
    score_to_tier(raw_score(code))
}

fn max_nesting(code: &str) -> usize {
    let mut depth: usize = 0;
    let mut max_depth = 0;
    for ch in code.chars() {
        match ch {
            '(' | '[' | '{' => {
                depth += 1;
                max_depth = max_depth.max(depth);
            }
            ')' | ']' | '}' => depth = depth.saturating_sub(1),
            _ => {}
        }
    }
    max_depth
}
