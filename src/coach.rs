use anyhow::Result;
use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::Config;
use crate::content::{Snippet, SnippetLibrary, SnippetRepository};
use crate::engine::bias::SignalPolicy;
use crate::engine::difficulty::{DifficultyEngine, DifficultyProfile, update_rating};
use crate::engine::planner::{PlanInputs, SessionPlan, detect_yoyo, plan_next};
use crate::engine::selector::SmartSelector;
use crate::engine::trend::{LanguageTrendSummary, TrendAnalyzer, WeaknessSnapshot};
use crate::engine::weakness::{WeaknessReport, WeaknessTracker};
use crate::session::drill::DrillState;
use crate::store::JsonStore;
use crate::store::schema::{
    LibraryData, LongitudinalData, ProfileData, SessionHistoryData, SessionRecord,
};

const MAX_HISTORY: usize = 500;
const YOYO_LOOKBACK: usize = 6;

/// Live progress after a keystroke.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ProgressSnapshot {
    pub cursor: usize,
    pub total: usize,
    pub progress: f64,
    pub accuracy: f64,
    pub typo_count: usize,
    /// Whether the last key matched. None after a backspace.
    pub last_correct: Option<bool>,
    pub complete: bool,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SessionOutcome {
    pub record: SessionRecord,
    pub rating_before: i32,
    /// False when wpm/accuracy were unusable and the trend was left alone.
    pub recorded: bool,
    pub snapshot_taken: bool,
    pub next_difficulty: DifficultyProfile,
    pub trend: Option<LanguageTrendSummary>,
}

struct ActiveSession {
    drill: DrillState,
    plan: SessionPlan,
}

/// Owns one user's state and drives the plan -> type -> complete loop.
/// Hosts that share it across threads wrap it in their own lock.
pub struct Coach<P: SnippetRepository = SnippetLibrary> {
    config: Config,
    repo: P,
    profile: ProfileData,
    longitudinal: LongitudinalData,
    history: SessionHistoryData,
    selector: SmartSelector,
    difficulty_engine: DifficultyEngine,
    tracker: WeaknessTracker,
    analyzer: TrendAnalyzer,
    active: Option<ActiveSession>,
}

impl<P: SnippetRepository> Coach<P> {
    /// Takes `config` as given after validating it and canonicalizing the
    /// language name.
    pub fn new(
        mut config: Config,
        repo: P,
        profile: ProfileData,
        longitudinal: LongitudinalData,
        history: SessionHistoryData,
    ) -> Self {
        config.validate();
        config.language = Config::canonical_language(&config.language);
        let analyzer = TrendAnalyzer::new(config.trend.clone());
        let mut selector = SmartSelector::new(config.selector.clone());
        for id in history.recent_snippet_ids(config.selector.recent_capacity) {
            selector.remember(id);
        }
        Self {
            difficulty_engine: DifficultyEngine::new(analyzer.clone()),
            tracker: WeaknessTracker::new(config.weakness.clone(), analyzer.clone()),
            analyzer,
            selector,
            config,
            repo,
            profile,
            longitudinal,
            history,
            active: None,
        }
    }

    pub fn language(&self) -> &str {
        &self.config.language
    }

    pub fn set_language(&mut self, language: &str) {
        self.config.language = Config::canonical_language(language);
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn repo(&self) -> &P {
        &self.repo
    }

    pub fn profile(&self) -> &ProfileData {
        &self.profile
    }

    pub fn longitudinal(&self) -> &LongitudinalData {
        &self.longitudinal
    }

    pub fn history(&self) -> &SessionHistoryData {
        &self.history
    }

    pub fn active_drill(&self) -> Option<&DrillState> {
        self.active.as_ref().map(|a| &a.drill)
    }

    pub fn policy(&self) -> SignalPolicy {
        SignalPolicy::with_weakness_bias(self.config.weakness_bias_enabled)
    }

    pub fn difficulty(&self) -> DifficultyProfile {
        self.difficulty_engine
            .compute_difficulty(&self.config.language, &self.profile, &self.longitudinal)
    }

    pub fn weakness_report(&self) -> WeaknessReport {
        self.tracker
            .report(&self.config.language, &self.profile.heatmap, &self.longitudinal)
    }

    pub fn trend_summary(&self) -> Option<LanguageTrendSummary> {
        let language = &self.config.language;
        self.longitudinal
            .trend(language)
            .and_then(|t| self.analyzer.analyze(language, t))
    }

    pub fn is_yoyoing(&self) -> bool {
        detect_yoyo(&self.history.recent_tiers(&self.config.language, YOYO_LOOKBACK))
    }

    /// Plans the next session and makes it the active drill. Any unfinished
    /// drill is discarded.
    pub fn next_session<R: Rng + ?Sized>(&mut self, rng: &mut R) -> (Snippet, SessionPlan) {
        let difficulty = self.difficulty();
        let report = self.weakness_report();
        let policy = self.policy();
        let inputs = PlanInputs {
            language: &self.config.language,
            profile: &self.profile,
            difficulty: Some(&difficulty),
            report: Some(&report),
            manual_lock: self.config.manual_difficulty,
            is_yoyoing: self.is_yoyoing(),
            policy: &policy,
        };
        let (snippet, plan) = plan_next(&mut self.selector, &self.repo, inputs, rng);
        info!(
            language = %self.config.language,
            id = %snippet.id,
            category = plan.category.label(),
            tier = plan.actual_difficulty,
            "next session: {}",
            plan.reason
        );

        if self.active.is_some() {
            debug!("discarding unfinished drill");
        }
        self.active = Some(ActiveSession {
            drill: DrillState::new(snippet.clone()),
            plan: plan.clone(),
        });
        (snippet, plan)
    }

    /// Feeds one typed character. Every keystroke lands in the heatmap
    /// against the character that was expected, except on the fallback
    /// placeholder.
    pub fn on_keystroke(&mut self, ch: char) -> Option<ProgressSnapshot> {
        let active = self.active.as_mut()?;
        let key = active.drill.type_char(ch)?;
        if !active.drill.snippet.is_fallback() {
            if key.correct {
                self.profile.heatmap.record_hit(key.expected);
            } else {
                self.profile
                    .heatmap
                    .record_miss(key.expected, Some(key.actual));
            }
        }
        Some(progress_of(&active.drill, Some(key.correct)))
    }

    pub fn on_backspace(&mut self) -> Option<ProgressSnapshot> {
        let active = self.active.as_mut()?;
        active.drill.backspace();
        Some(progress_of(&active.drill, None))
    }

    /// Closes the active drill: trend, rating, snapshots and history are all
    /// updated here. `elapsed_secs` defaults to the drill's own clock.
    ///
    /// None when there is no drill, nothing was typed, or the drill was the
    /// fallback placeholder.
    pub fn on_session_complete(
        &mut self,
        elapsed_secs: Option<f64>,
        now: DateTime<Utc>,
    ) -> Option<SessionOutcome> {
        let active = self.active.take()?;
        let drill = active.drill;
        if drill.cursor == 0 {
            debug!(id = %drill.snippet.id, "empty drill, not recorded");
            return None;
        }
        if drill.snippet.is_fallback() {
            debug!(id = %drill.snippet.id, "fallback drill, not recorded");
            return None;
        }

        let language = drill.snippet.language.clone();
        let wpm = drill.wpm_over(elapsed_secs.unwrap_or_else(|| drill.elapsed_secs()));
        let accuracy = drill.accuracy();
        let sessions_before = self.longitudinal.session_count(&language);
        let rating_before = self.profile.rating(&language);

        let recorded = self
            .longitudinal
            .record_session(&language, wpm, accuracy, now);
        let rating_after = if recorded {
            update_rating(
                rating_before,
                drill.snippet.difficulty,
                wpm,
                accuracy,
                sessions_before,
            )
        } else {
            rating_before
        };
        self.profile.set_rating(&language, rating_after);
        self.profile.heatmap.prune();

        let snapshot_taken =
            recorded && self.longitudinal.snapshot_due(&language, self.config.snapshot_interval);
        if snapshot_taken {
            let snapshot = WeaknessSnapshot::capture(&language, &self.profile.heatmap, now);
            debug!(
                %language,
                weaknesses = snapshot.top_weaknesses.len(),
                "captured weakness snapshot"
            );
            self.longitudinal.push_snapshot(snapshot);
        }

        let record = SessionRecord {
            snippet_id: drill.snippet.id.clone(),
            language: language.clone(),
            wpm,
            accuracy,
            difficulty: drill.snippet.difficulty,
            plan: active.plan,
            rating_after,
            completed_at: now,
        };
        self.history.sessions.push(record.clone());
        if self.history.sessions.len() > MAX_HISTORY {
            let excess = self.history.sessions.len() - MAX_HISTORY;
            self.history.sessions.drain(..excess);
        }

        info!(
            %language,
            wpm,
            accuracy,
            rating_before,
            rating_after,
            "session complete"
        );

        Some(SessionOutcome {
            record,
            rating_before,
            recorded,
            snapshot_taken,
            next_difficulty: self.difficulty(),
            trend: self.trend_summary(),
        })
    }

    /// Persists profile, longitudinal data and history.
    pub fn save(&self, store: &JsonStore) -> Result<()> {
        store.save_profile(&self.profile)?;
        store.save_longitudinal(&self.longitudinal)?;
        store.save_history(&self.history)?;
        Ok(())
    }
}

impl Coach<SnippetLibrary> {
    /// Builtin snippets plus whatever the user added, with all state loaded
    /// from `store`.
    pub fn from_store(config: Config, store: &JsonStore) -> Self {
        let mut library = SnippetLibrary::with_builtin();
        let restored = library.restore(store.load_library().snippets);
        debug!(restored, total = library.len(), "library loaded");
        Self::new(
            config,
            library,
            store.load_profile(),
            store.load_longitudinal(),
            store.load_history(),
        )
    }

    pub fn library_mut(&mut self) -> &mut SnippetLibrary {
        &mut self.repo
    }

    pub fn save_all(&self, store: &JsonStore) -> Result<()> {
        self.save(store)?;
        store.save_library(&LibraryData {
            snippets: self.repo.user_snippets(),
            ..LibraryData::default()
        })
    }
}

fn progress_of(drill: &DrillState, last_correct: Option<bool>) -> ProgressSnapshot {
    ProgressSnapshot {
        cursor: drill.cursor,
        total: drill.target.len(),
        progress: drill.progress(),
        accuracy: drill.accuracy(),
        typo_count: drill.typo_count(),
        last_correct,
        complete: drill.is_complete(),
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone};
    use rand::SeedableRng;
    use rand::rngs::SmallRng;

    use super::*;
    use crate::content::SnippetSource;
    use crate::store::schema::DEFAULT_RATING;

    fn coach() -> Coach {
        Coach::new(
            Config::default(),
            SnippetLibrary::with_builtin(),
            ProfileData::default(),
            LongitudinalData::default(),
            SessionHistoryData::default(),
        )
    }

    fn type_all(coach: &mut Coach, code: &str) {
        for ch in code.chars() {
            coach.on_keystroke(ch);
        }
    }

    fn at(minute: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 5, 1, 8, 0, 0).unwrap() + Duration::minutes(minute)
    }

    #[test]
    fn test_keystrokes_without_session_are_ignored() {
        let mut coach = coach();
        assert!(coach.on_keystroke('a').is_none());
        assert!(coach.on_session_complete(Some(10.0), at(0)).is_none());
        assert!(coach.profile().heatmap.is_empty());
    }

    #[test]
    fn test_keystrokes_feed_heatmap() {
        let mut coach = coach();
        let mut rng = SmallRng::seed_from_u64(1);
        let (snippet, _) = coach.next_session(&mut rng);
        let first = snippet.code.chars().next().unwrap();
        let wrong = if first == '#' { '@' } else { '#' };

        let progress = coach.on_keystroke(wrong).unwrap();
        assert_eq!(progress.last_correct, Some(false));
        assert_eq!(progress.typo_count, 1);
        coach.on_backspace();
        let progress = coach.on_keystroke(first).unwrap();
        assert_eq!(progress.last_correct, Some(true));
        assert_eq!(progress.cursor, 1);

        assert_eq!(coach.profile().heatmap.error_rate(first), 0.5);
        assert_eq!(coach.profile().heatmap.top_confusion(first), Some((wrong, 1)));
    }

    #[test]
    fn test_session_complete_records_everything() {
        let mut coach = coach();
        let mut rng = SmallRng::seed_from_u64(2);
        let (snippet, plan) = coach.next_session(&mut rng);
        type_all(&mut coach, &snippet.code);
        let drill = coach.active_drill().unwrap();
        assert!(drill.is_complete());

        let outcome = coach.on_session_complete(Some(20.0), at(1)).unwrap();
        assert!(outcome.recorded);
        assert_eq!(outcome.rating_before, DEFAULT_RATING);
        assert_eq!(outcome.record.accuracy, 100.0);
        assert_eq!(outcome.record.plan, plan);
        assert_eq!(outcome.record.snippet_id, snippet.id);
        assert!(!outcome.snapshot_taken);
        assert!(outcome.trend.is_none());
        assert_eq!(coach.history().sessions.len(), 1);
        assert_eq!(coach.longitudinal().session_count("rust"), 1);
        assert!(coach.active_drill().is_none());
    }

    #[test]
    fn test_snapshot_every_interval() {
        let mut coach = coach();
        let mut rng = SmallRng::seed_from_u64(3);
        let mut taken = Vec::new();
        for i in 0..10 {
            let (snippet, _) = coach.next_session(&mut rng);
            type_all(&mut coach, &snippet.code);
            let outcome = coach.on_session_complete(Some(15.0), at(i)).unwrap();
            taken.push(outcome.snapshot_taken);
        }
        let expected: Vec<bool> = (1..=10).map(|n| n % 5 == 0).collect();
        assert_eq!(taken, expected);
        assert_eq!(coach.longitudinal().weakness_snapshots.len(), 2);
    }

    #[test]
    fn test_untyped_drill_not_recorded() {
        let mut coach = coach();
        let mut rng = SmallRng::seed_from_u64(4);
        coach.next_session(&mut rng);
        assert!(coach.on_session_complete(Some(5.0), at(0)).is_none());
        assert!(coach.history().sessions.is_empty());
    }

    #[test]
    fn test_manual_lock_from_config() {
        let mut library = SnippetLibrary::new();
        for tier in 1..=7u8 {
            let code = format!("let t = {tier};");
            library
                .add_with_difficulty("rust", &code, Some(tier), vec![], SnippetSource::User)
                .unwrap();
        }
        let config = Config {
            manual_difficulty: Some(6),
            ..Config::default()
        };
        let mut coach = Coach::new(
            config,
            library,
            ProfileData::default(),
            LongitudinalData::default(),
            SessionHistoryData::default(),
        );
        let mut rng = SmallRng::seed_from_u64(5);
        for i in 0..20 {
            let (snippet, plan) = coach.next_session(&mut rng);
            assert_eq!(plan.target_difficulty, 6);
            assert_eq!(snippet.difficulty, 6);
            type_all(&mut coach, &snippet.code);
            coach.on_session_complete(Some(10.0), at(i)).unwrap();
        }
    }

    #[test]
    fn test_empty_language_gets_fallback() {
        let mut coach = coach();
        coach.set_language("cobol");
        let mut rng = SmallRng::seed_from_u64(6);
        let (snippet, _) = coach.next_session(&mut rng);
        assert!(snippet.is_fallback());
    }

    #[test]
    fn test_fallback_drill_records_nothing() {
        let mut coach = coach();
        coach.set_language("cobol");
        let mut rng = SmallRng::seed_from_u64(7);
        let (snippet, _) = coach.next_session(&mut rng);
        assert!(snippet.is_fallback());

        // Progress is still reported while typing the placeholder
        let progress = coach.on_keystroke('#').unwrap();
        assert_eq!(progress.cursor, 1);
        coach.on_backspace();
        type_all(&mut coach, &snippet.code);
        assert!(coach.active_drill().unwrap().is_complete());

        assert!(coach.on_session_complete(Some(20.0), at(0)).is_none());
        assert!(coach.profile().heatmap.is_empty());
        assert_eq!(coach.profile().rating("cobol"), DEFAULT_RATING);
        assert_eq!(coach.longitudinal().session_count("cobol"), 0);
        assert!(coach.history().sessions.is_empty());
        assert!(coach.active_drill().is_none());
    }

    #[test]
    fn test_language_names_are_canonicalized() {
        let mut coach = coach();
        coach.set_language(" Rust ");
        assert_eq!(coach.language(), "rust");
        let mut rng = SmallRng::seed_from_u64(8);
        let (snippet, _) = coach.next_session(&mut rng);
        assert!(!snippet.is_fallback());
        assert_eq!(snippet.language, "rust");

        coach.set_language("PY");
        let (snippet, _) = coach.next_session(&mut rng);
        assert_eq!(snippet.language, "python");
    }

    #[test]
    fn test_new_validates_config() {
        let mut config = Config::default();
        config.language = "Golang".to_string();
        config.manual_difficulty = Some(0);
        config.selector.top_k = 0;
        config.selector.jitter = f64::INFINITY;
        let mut coach = Coach::new(
            config,
            SnippetLibrary::with_builtin(),
            ProfileData::default(),
            LongitudinalData::default(),
            SessionHistoryData::default(),
        );
        assert_eq!(coach.language(), "go");
        assert_eq!(coach.config().manual_difficulty, None);
        assert_eq!(coach.config().selector.top_k, 1);
        assert_eq!(coach.config().selector.jitter, 0.0);

        // Would panic inside gen_range with an infinite jitter bound
        let mut rng = SmallRng::seed_from_u64(9);
        let (snippet, _) = coach.next_session(&mut rng);
        assert!(!snippet.is_fallback());
    }

    #[test]
    fn test_elapsed_defaults_to_drill_clock() {
        let mut coach = coach();
        let mut rng = SmallRng::seed_from_u64(10);
        let (snippet, _) = coach.next_session(&mut rng);
        type_all(&mut coach, &snippet.code);
        let drill_wpm = coach.active_drill().unwrap().wpm();
        let outcome = coach.on_session_complete(None, at(0)).unwrap();
        assert!(outcome.record.wpm.is_finite());
        // The drill has finished, so its clock is frozen
        assert_eq!(outcome.record.wpm, drill_wpm);
    }
}
