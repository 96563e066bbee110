//! Badge and milestone definitions plus the post-commit evaluator.
//!
//! Definitions are static reference data compiled into the crate. Unlocks
//! are recorded at most once per `(user, key)`; evaluation runs strictly
//! after a ledger commit and is best-effort, so a storage hiccup here can
//! never fail the quiz submission that triggered it.

use crate::model::{TopicStatus, UserBadge, UserId, UserMilestone};
use crate::store::{ProgressStore, StoreError, UserState};
use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, warn};

// ============================================================================
// Definitions
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BadgeTier {
    Bronze,
    Silver,
    Gold,
    Platinum,
}

/// The account statistic a requirement is measured against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StatKind {
    Level,
    TotalXp,
    QuizzesCompleted,
    TopicsMastered,
    TopicsCompleted,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct BadgeDefinition {
    pub key: &'static str,
    pub name: &'static str,
    pub description: &'static str,
    pub tier: BadgeTier,
    pub stat: StatKind,
    pub threshold: u32,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct MilestoneDefinition {
    pub key: &'static str,
    pub name: &'static str,
    pub stat: StatKind,
    pub threshold: u32,
}

/// The full badge catalog. Keys are stable identifiers; renaming a badge
/// must not change its key.
pub const BADGES: [BadgeDefinition; 21] = [
    // Level badges
    BadgeDefinition { key: "level_2", name: "Getting Started", description: "Reach level 2", tier: BadgeTier::Bronze, stat: StatKind::Level, threshold: 2 },
    BadgeDefinition { key: "level_5", name: "Dedicated Learner", description: "Reach level 5", tier: BadgeTier::Silver, stat: StatKind::Level, threshold: 5 },
    BadgeDefinition { key: "level_10", name: "Knowledge Seeker", description: "Reach level 10", tier: BadgeTier::Gold, stat: StatKind::Level, threshold: 10 },
    BadgeDefinition { key: "level_20", name: "Enlightened", description: "Reach level 20", tier: BadgeTier::Platinum, stat: StatKind::Level, threshold: 20 },
    // XP badges
    BadgeDefinition { key: "xp_500", name: "First Steps", description: "Earn 500 total XP", tier: BadgeTier::Bronze, stat: StatKind::TotalXp, threshold: 500 },
    BadgeDefinition { key: "xp_2500", name: "XP Collector", description: "Earn 2,500 total XP", tier: BadgeTier::Silver, stat: StatKind::TotalXp, threshold: 2500 },
    BadgeDefinition { key: "xp_10000", name: "XP Hoarder", description: "Earn 10,000 total XP", tier: BadgeTier::Gold, stat: StatKind::TotalXp, threshold: 10_000 },
    BadgeDefinition { key: "xp_25000", name: "XP Legend", description: "Earn 25,000 total XP", tier: BadgeTier::Platinum, stat: StatKind::TotalXp, threshold: 25_000 },
    // Quiz-count badges
    BadgeDefinition { key: "quiz_1", name: "Quiz Rookie", description: "Complete your first quiz", tier: BadgeTier::Bronze, stat: StatKind::QuizzesCompleted, threshold: 1 },
    BadgeDefinition { key: "quiz_10", name: "Quiz Regular", description: "Complete 10 quizzes", tier: BadgeTier::Bronze, stat: StatKind::QuizzesCompleted, threshold: 10 },
    BadgeDefinition { key: "quiz_25", name: "Quiz Enthusiast", description: "Complete 25 quizzes", tier: BadgeTier::Silver, stat: StatKind::QuizzesCompleted, threshold: 25 },
    BadgeDefinition { key: "quiz_50", name: "Quiz Veteran", description: "Complete 50 quizzes", tier: BadgeTier::Gold, stat: StatKind::QuizzesCompleted, threshold: 50 },
    BadgeDefinition { key: "quiz_100", name: "Quiz Centurion", description: "Complete 100 quizzes", tier: BadgeTier::Platinum, stat: StatKind::QuizzesCompleted, threshold: 100 },
    // Topic completion badges
    BadgeDefinition { key: "topics_completed_1", name: "Topic Starter", description: "Complete a topic", tier: BadgeTier::Bronze, stat: StatKind::TopicsCompleted, threshold: 1 },
    BadgeDefinition { key: "topics_completed_5", name: "Topic Explorer", description: "Complete 5 topics", tier: BadgeTier::Silver, stat: StatKind::TopicsCompleted, threshold: 5 },
    BadgeDefinition { key: "topics_completed_15", name: "Topic Conqueror", description: "Complete 15 topics", tier: BadgeTier::Gold, stat: StatKind::TopicsCompleted, threshold: 15 },
    BadgeDefinition { key: "topics_completed_30", name: "Polymath", description: "Complete 30 topics", tier: BadgeTier::Platinum, stat: StatKind::TopicsCompleted, threshold: 30 },
    // Mastery badges
    BadgeDefinition { key: "topics_mastered_1", name: "First Mastery", description: "Master a topic", tier: BadgeTier::Bronze, stat: StatKind::TopicsMastered, threshold: 1 },
    BadgeDefinition { key: "topics_mastered_3", name: "Triple Mastery", description: "Master 3 topics", tier: BadgeTier::Silver, stat: StatKind::TopicsMastered, threshold: 3 },
    BadgeDefinition { key: "topics_mastered_10", name: "Master of Many", description: "Master 10 topics", tier: BadgeTier::Gold, stat: StatKind::TopicsMastered, threshold: 10 },
    BadgeDefinition { key: "topics_mastered_20", name: "Grandmaster", description: "Master 20 topics", tier: BadgeTier::Platinum, stat: StatKind::TopicsMastered, threshold: 20 },
];

pub const MILESTONES: [MilestoneDefinition; 6] = [
    MilestoneDefinition { key: "milestone_xp_1000", name: "1,000 XP earned", stat: StatKind::TotalXp, threshold: 1000 },
    MilestoneDefinition { key: "milestone_xp_5000", name: "5,000 XP earned", stat: StatKind::TotalXp, threshold: 5000 },
    MilestoneDefinition { key: "milestone_quiz_5", name: "5 quizzes completed", stat: StatKind::QuizzesCompleted, threshold: 5 },
    MilestoneDefinition { key: "milestone_quiz_20", name: "20 quizzes completed", stat: StatKind::QuizzesCompleted, threshold: 20 },
    MilestoneDefinition { key: "milestone_topic_3", name: "3 topics completed", stat: StatKind::TopicsCompleted, threshold: 3 },
    MilestoneDefinition { key: "milestone_topic_10", name: "10 topics completed", stat: StatKind::TopicsCompleted, threshold: 10 },
];

// ============================================================================
// User statistics
// ============================================================================

/// Snapshot of the statistics requirements are checked against.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct UserStats {
    pub total_xp: u32,
    pub level: u32,
    pub quizzes_completed: u32,
    pub topics_mastered: u32,
    pub topics_completed: u32,
}

impl UserStats {
    /// Stats for a user the store has never seen.
    pub fn empty() -> Self {
        Self {
            total_xp: 0,
            level: 1,
            quizzes_completed: 0,
            topics_mastered: 0,
            topics_completed: 0,
        }
    }

    /// Derive stats from stored state. `topics_completed` counts topics at
    /// completed *or* mastered, matching how the thresholds were tuned.
    pub fn from_state(state: &UserState) -> Self {
        let mastered = state
            .topics
            .values()
            .filter(|t| t.status == TopicStatus::Mastered)
            .count() as u32;
        let completed = state
            .topics
            .values()
            .filter(|t| t.status >= TopicStatus::Completed)
            .count() as u32;
        Self {
            total_xp: state.account.total_xp,
            level: state.account.level,
            quizzes_completed: state.attempts.len() as u32,
            topics_mastered: mastered,
            topics_completed: completed,
        }
    }

    pub fn value(&self, stat: StatKind) -> u32 {
        match stat {
            StatKind::Level => self.level,
            StatKind::TotalXp => self.total_xp,
            StatKind::QuizzesCompleted => self.quizzes_completed,
            StatKind::TopicsMastered => self.topics_mastered,
            StatKind::TopicsCompleted => self.topics_completed,
        }
    }
}

// ============================================================================
// Evaluation
// ============================================================================

/// A badge or milestone unlocked by the most recent evaluation.
#[derive(Debug, Clone, Serialize)]
pub struct Unlock {
    pub key: String,
    pub name: String,
    /// Present for badges, absent for milestones.
    pub tier: Option<BadgeTier>,
}

/// Progress toward one still-locked badge.
#[derive(Debug, Clone, Serialize)]
pub struct BadgeProgress {
    pub key: &'static str,
    pub name: &'static str,
    pub tier: BadgeTier,
    pub current: u32,
    pub required: u32,
    pub percent: f64,
}

pub struct AchievementEvaluator<S> {
    store: Arc<S>,
}

impl<S: ProgressStore> AchievementEvaluator<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Check every definition against `stats` and record unlocks for those
    /// newly satisfied. Returns only what this call unlocked; re-running
    /// with the same stats returns nothing.
    pub fn evaluate(&self, user_id: &UserId, stats: &UserStats) -> Result<Vec<Unlock>, StoreError> {
        let stats = *stats;
        let unlocked = self.store.with_user(user_id, &mut |state| {
            let now = Utc::now();
            let mut newly = Vec::new();

            for def in &BADGES {
                if state.badges.contains_key(def.key) {
                    continue;
                }
                if stats.value(def.stat) >= def.threshold {
                    state.badges.insert(
                        def.key.to_string(),
                        UserBadge {
                            user_id: user_id.clone(),
                            badge_key: def.key.to_string(),
                            unlocked_at: now,
                        },
                    );
                    newly.push(Unlock {
                        key: def.key.to_string(),
                        name: def.name.to_string(),
                        tier: Some(def.tier),
                    });
                }
            }

            for def in &MILESTONES {
                if state.milestones.contains_key(def.key) {
                    continue;
                }
                if stats.value(def.stat) >= def.threshold {
                    state.milestones.insert(
                        def.key.to_string(),
                        UserMilestone {
                            user_id: user_id.clone(),
                            milestone_key: def.key.to_string(),
                            unlocked_at: now,
                        },
                    );
                    newly.push(Unlock {
                        key: def.key.to_string(),
                        name: def.name.to_string(),
                        tier: None,
                    });
                }
            }

            Ok(newly)
        })?;

        if !unlocked.is_empty() {
            info!(user = %user_id, count = unlocked.len(), "achievements unlocked");
        }
        Ok(unlocked)
    }

    /// Evaluate without letting storage failures escape. The triggering
    /// commit has already succeeded; a failure here only delays unlocks
    /// until the next evaluation.
    pub fn evaluate_best_effort(&self, user_id: &UserId, stats: &UserStats) -> Vec<Unlock> {
        match self.evaluate(user_id, stats) {
            Ok(unlocked) => unlocked,
            Err(e) => {
                warn!(user = %user_id, error = %e, "achievement evaluation failed; skipping");
                Vec::new()
            }
        }
    }

}

/// Progress report for every badge the user has not unlocked yet.
pub fn progress_toward(stats: &UserStats, unlocked_keys: &[&str]) -> Vec<BadgeProgress> {
    BADGES
        .iter()
        .filter(|def| !unlocked_keys.contains(&def.key))
        .map(|def| {
            let current = stats.value(def.stat).min(def.threshold);
            BadgeProgress {
                key: def.key,
                name: def.name,
                tier: def.tier,
                current,
                required: def.threshold,
                percent: f64::from(current) / f64::from(def.threshold) * 100.0,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn stats(total_xp: u32, level: u32, quizzes: u32) -> UserStats {
        UserStats {
            total_xp,
            level,
            quizzes_completed: quizzes,
            topics_mastered: 0,
            topics_completed: 0,
        }
    }

    #[test]
    fn test_catalog_keys_unique() {
        let mut keys: Vec<&str> = BADGES.iter().map(|b| b.key).collect();
        keys.extend(MILESTONES.iter().map(|m| m.key));
        let before = keys.len();
        keys.sort_unstable();
        keys.dedup();
        assert_eq!(keys.len(), before);
    }

    #[test]
    fn test_first_quiz_unlocks_rookie() {
        let store = Arc::new(MemoryStore::new());
        let evaluator = AchievementEvaluator::new(store);
        let user = UserId::from("u1");

        let unlocked = evaluator.evaluate(&user, &stats(135, 1, 1)).unwrap();
        let keys: Vec<&str> = unlocked.iter().map(|u| u.key.as_str()).collect();
        assert_eq!(keys, vec!["quiz_1"]);
        assert_eq!(unlocked[0].tier, Some(BadgeTier::Bronze));
    }

    #[test]
    fn test_double_evaluate_unlocks_once() {
        let store = Arc::new(MemoryStore::new());
        let evaluator = AchievementEvaluator::new(store);
        let user = UserId::from("u1");
        let s = stats(600, 2, 5);

        let first = evaluator.evaluate(&user, &s).unwrap();
        assert!(!first.is_empty());
        let second = evaluator.evaluate(&user, &s).unwrap();
        assert!(second.is_empty());
    }

    #[test]
    fn test_multiple_thresholds_in_one_pass() {
        let store = Arc::new(MemoryStore::new());
        let evaluator = AchievementEvaluator::new(store);
        let user = UserId::from("u1");

        let unlocked = evaluator.evaluate(&user, &stats(1200, 3, 6)).unwrap();
        let keys: Vec<&str> = unlocked.iter().map(|u| u.key.as_str()).collect();
        assert!(keys.contains(&"level_2"));
        assert!(keys.contains(&"xp_500"));
        assert!(keys.contains(&"quiz_1"));
        assert!(keys.contains(&"milestone_xp_1000"));
        assert!(keys.contains(&"milestone_quiz_5"));
    }

    #[test]
    fn test_progress_report_excludes_unlocked() {
        let s = stats(250, 1, 1);
        let progress = progress_toward(&s, &["quiz_1"]);
        assert!(progress.iter().all(|p| p.key != "quiz_1"));

        let xp_500 = progress.iter().find(|p| p.key == "xp_500").unwrap();
        assert_eq!(xp_500.current, 250);
        assert_eq!(xp_500.required, 500);
        assert_eq!(xp_500.percent, 50.0);
    }

    #[test]
    fn test_stats_from_state_counts_statuses() {
        use crate::ledger::ProgressLedger;
        use crate::model::Difficulty;

        let store = Arc::new(MemoryStore::new());
        let ledger = ProgressLedger::new(store.clone());
        let user = UserId::from("u1");

        // Second attempt can reach mastered; first always lands in_progress.
        ledger
            .commit_attempt(&user, "Rust", Difficulty::Medium, 9, 10)
            .unwrap();
        ledger
            .commit_attempt(&user, "Rust", Difficulty::Medium, 10, 10)
            .unwrap();
        ledger
            .commit_attempt(&user, "SQL", Difficulty::Medium, 7, 10)
            .unwrap();
        ledger
            .commit_attempt(&user, "SQL", Difficulty::Medium, 8, 10)
            .unwrap();

        let state = store.snapshot(&user).unwrap().unwrap();
        let s = UserStats::from_state(&state);
        assert_eq!(s.quizzes_completed, 4);
        assert_eq!(s.topics_mastered, 1);
        // Completed counts mastered topics too.
        assert_eq!(s.topics_completed, 2);
    }
}
