//! XP and level accounting.
//!
//! The pure functions here define the reward rules; [`ProgressLedger`]
//! applies them inside a single per-user store transaction so that the
//! attempt row, account totals, topic progress, and XP event land together
//! or not at all.

use crate::model::{
    Difficulty, QuizAttempt, TopicProgress, TopicStatus, UserId, XpEvent, XpReason,
};
use crate::store::{ProgressStore, StoreError};
use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

/// Flat XP for completing any quiz.
pub const BASE_QUIZ_XP: u32 = 100;

/// Fixed XP for re-reading a topic's notes.
pub const REVIEW_XP: u32 = 10;

/// XP required per level. `level = total_xp / 500 + 1`.
pub const XP_PER_LEVEL: u32 = 500;

// ============================================================================
// Pure reward math
// ============================================================================

/// Score as a percentage in [0, 100]. `total` must be nonzero (enforced by
/// validation before any ledger call).
pub fn score_percent(correct: u32, total: u32) -> f64 {
    f64::from(correct) / f64::from(total) * 100.0
}

/// Performance bonus on top of the base award.
pub fn score_tier_bonus(score: f64) -> u32 {
    if score >= 100.0 {
        50
    } else if score >= 90.0 {
        30
    } else if score >= 80.0 {
        15
    } else {
        0
    }
}

/// Total XP awarded for one quiz: base + difficulty bonus + score tier bonus.
pub fn xp_for_quiz(difficulty: Difficulty, score: f64) -> u32 {
    BASE_QUIZ_XP + difficulty.xp_bonus() + score_tier_bonus(score)
}

/// Level implied by a lifetime XP total.
pub fn level_for_xp(total_xp: u32) -> u32 {
    total_xp / XP_PER_LEVEL + 1
}

/// Short feedback line for a submission, tiered by score.
pub fn feedback_for_score(score: f64) -> &'static str {
    if score >= 95.0 {
        "Outstanding! You've mastered this material."
    } else if score >= 90.0 {
        "Excellent work! You have a strong grasp of this topic."
    } else if score >= 80.0 {
        "Great job! You're doing really well."
    } else if score >= 70.0 {
        "Good effort! A little more practice will make this stick."
    } else if score >= 50.0 {
        "Keep practicing! Review the material and try again."
    } else {
        "Don't give up! Revisit the notes and take it one question at a time."
    }
}

// ============================================================================
// Commit outcomes
// ============================================================================

/// Result of committing one quiz attempt.
#[derive(Debug, Clone, Serialize)]
pub struct CommitOutcome {
    pub quiz_id: Uuid,
    pub score: f64,
    pub xp_gained: u32,
    pub total_xp: u32,
    pub level: u32,
    pub leveled_up: bool,
    pub topic_status: TopicStatus,
}

/// Result of committing a topic review.
#[derive(Debug, Clone, Serialize)]
pub struct ReviewOutcome {
    pub xp_gained: u32,
    pub total_xp: u32,
    pub level: u32,
    pub leveled_up: bool,
}

// ============================================================================
// Ledger
// ============================================================================

/// Applies reward rules atomically through a [`ProgressStore`].
pub struct ProgressLedger<S> {
    store: Arc<S>,
}

impl<S: ProgressStore> ProgressLedger<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Commit one graded quiz attempt.
    ///
    /// Inputs must already be validated (`total` in 1..=50, `correct <=
    /// total`, topic normalized). Inside one transaction this appends the
    /// attempt row, updates account totals and level, creates or updates the
    /// topic's progress, and appends the XP event. Topic status only ever
    /// moves forward.
    pub fn commit_attempt(
        &self,
        user_id: &UserId,
        topic: &str,
        difficulty: Difficulty,
        correct: u32,
        total: u32,
    ) -> Result<CommitOutcome, StoreError> {
        let score = score_percent(correct, total);
        let xp_gained = xp_for_quiz(difficulty, score);
        let now = Utc::now();

        let outcome = self.store.with_user(user_id, &mut |state| {
            let previous_xp = state.account.total_xp;
            let previous_level = state.account.level;
            let new_xp = previous_xp + xp_gained;
            let new_level = level_for_xp(new_xp);

            let quiz_id = Uuid::new_v4();
            state.attempts.push(QuizAttempt {
                id: quiz_id,
                user_id: user_id.clone(),
                topic: topic.to_string(),
                difficulty,
                correct,
                total,
                score,
                xp_gained,
                created_at: now,
            });

            state.account.total_xp = new_xp;
            state.account.level = new_level;

            let topic_status = match state.topics.get_mut(topic) {
                Some(progress) => {
                    progress.attempts += 1;
                    progress.last_score = score;
                    progress.best_score = progress.best_score.max(score);
                    progress.status = progress.status.max(TopicStatus::from_score(score));
                    progress.last_attempted_at = now;
                    progress.status
                }
                None => {
                    state.topics.insert(
                        topic.to_string(),
                        TopicProgress {
                            user_id: user_id.clone(),
                            topic: topic.to_string(),
                            status: TopicStatus::InProgress,
                            last_score: score,
                            best_score: score,
                            attempts: 1,
                            last_attempted_at: now,
                        },
                    );
                    TopicStatus::InProgress
                }
            };

            state.xp_events.push(XpEvent {
                id: Uuid::new_v4(),
                user_id: user_id.clone(),
                delta: xp_gained,
                reason: XpReason::QuizCompletion,
                topic: Some(topic.to_string()),
                previous_xp,
                new_xp,
                previous_level,
                new_level,
                created_at: now,
            });

            Ok(CommitOutcome {
                quiz_id,
                score,
                xp_gained,
                total_xp: new_xp,
                level: new_level,
                leveled_up: new_level > previous_level,
                topic_status,
            })
        })?;

        info!(
            user = %user_id,
            topic,
            score = outcome.score,
            xp_gained = outcome.xp_gained,
            level = outcome.level,
            "quiz attempt committed"
        );
        Ok(outcome)
    }

    /// Commit a topic review: fixed +10 XP, `last_attempted_at` refresh if
    /// the topic exists, no attempt row, no counter bumps.
    pub fn commit_review(&self, user_id: &UserId, topic: &str) -> Result<ReviewOutcome, StoreError> {
        let now = Utc::now();

        let outcome = self.store.with_user(user_id, &mut |state| {
            let previous_xp = state.account.total_xp;
            let previous_level = state.account.level;
            let new_xp = previous_xp + REVIEW_XP;
            let new_level = level_for_xp(new_xp);

            state.account.total_xp = new_xp;
            state.account.level = new_level;

            if let Some(progress) = state.topics.get_mut(topic) {
                progress.last_attempted_at = now;
            }

            state.xp_events.push(XpEvent {
                id: Uuid::new_v4(),
                user_id: user_id.clone(),
                delta: REVIEW_XP,
                reason: XpReason::TopicReview,
                topic: Some(topic.to_string()),
                previous_xp,
                new_xp,
                previous_level,
                new_level,
                created_at: now,
            });

            Ok(ReviewOutcome {
                xp_gained: REVIEW_XP,
                total_xp: new_xp,
                level: new_level,
                leveled_up: new_level > previous_level,
            })
        })?;

        info!(user = %user_id, topic, "topic review committed");
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn ledger() -> (Arc<MemoryStore>, ProgressLedger<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        (store.clone(), ProgressLedger::new(store))
    }

    #[test]
    fn test_xp_vector_easy_perfect() {
        // 100 base + 10 easy + 50 perfect-score bonus
        assert_eq!(xp_for_quiz(Difficulty::Easy, 100.0), 160);
    }

    #[test]
    fn test_xp_vector_medium_85() {
        // 100 + 20 + 15
        assert_eq!(xp_for_quiz(Difficulty::Medium, 85.0), 135);
    }

    #[test]
    fn test_xp_vector_expert_92() {
        // 100 + 50 + 30
        assert_eq!(xp_for_quiz(Difficulty::Expert, 92.0), 180);
    }

    #[test]
    fn test_xp_vector_easy_60() {
        // 100 + 10 + 0
        assert_eq!(xp_for_quiz(Difficulty::Easy, 60.0), 110);
    }

    #[test]
    fn test_tier_bonus_boundaries() {
        assert_eq!(score_tier_bonus(100.0), 50);
        assert_eq!(score_tier_bonus(99.9), 30);
        assert_eq!(score_tier_bonus(90.0), 30);
        assert_eq!(score_tier_bonus(89.9), 15);
        assert_eq!(score_tier_bonus(80.0), 15);
        assert_eq!(score_tier_bonus(79.9), 0);
    }

    #[test]
    fn test_level_formula() {
        assert_eq!(level_for_xp(0), 1);
        assert_eq!(level_for_xp(499), 1);
        assert_eq!(level_for_xp(500), 2);
        assert_eq!(level_for_xp(1499), 3);
        assert_eq!(level_for_xp(2500), 6);
    }

    #[test]
    fn test_commit_creates_everything() {
        let (store, ledger) = ledger();
        let user = UserId::from("u1");

        let outcome = ledger
            .commit_attempt(&user, "Rust", Difficulty::Medium, 17, 20)
            .unwrap();

        assert_eq!(outcome.score, 85.0);
        assert_eq!(outcome.xp_gained, 135);
        assert_eq!(outcome.total_xp, 135);
        assert_eq!(outcome.level, 1);
        assert!(!outcome.leveled_up);
        assert_eq!(outcome.topic_status, TopicStatus::InProgress);

        let state = store.snapshot(&user).unwrap().unwrap();
        assert_eq!(state.attempts.len(), 1);
        assert_eq!(state.xp_events.len(), 1);
        assert_eq!(state.topics["Rust"].attempts, 1);
        assert_eq!(state.topics["Rust"].best_score, 85.0);
    }

    #[test]
    fn test_accumulation_and_ledger_invariant() {
        let (store, ledger) = ledger();
        let user = UserId::from("u1");

        let mut expected_total = 0u32;
        for _ in 0..5 {
            let outcome = ledger
                .commit_attempt(&user, "Algorithms", Difficulty::Hard, 9, 10)
                .unwrap();
            expected_total += outcome.xp_gained;
        }

        let state = store.snapshot(&user).unwrap().unwrap();
        assert_eq!(state.account.total_xp, expected_total);
        assert_eq!(state.topics["Algorithms"].attempts, 5);
        let ledger_sum: u32 = state.xp_events.iter().map(|e| e.delta).sum();
        assert_eq!(ledger_sum, state.account.total_xp);
        assert_eq!(state.account.level, level_for_xp(state.account.total_xp));
    }

    #[test]
    fn test_level_up_flag() {
        let (_, ledger) = ledger();
        let user = UserId::from("u1");

        // 180 XP per perfect expert quiz; third commit crosses 500.
        let first = ledger
            .commit_attempt(&user, "Math", Difficulty::Expert, 10, 10)
            .unwrap();
        assert!(!first.leveled_up);
        let second = ledger
            .commit_attempt(&user, "Math", Difficulty::Expert, 10, 10)
            .unwrap();
        assert!(!second.leveled_up);
        let third = ledger
            .commit_attempt(&user, "Math", Difficulty::Expert, 10, 10)
            .unwrap();
        assert!(third.leveled_up);
        assert_eq!(third.level, 2);
    }

    #[test]
    fn test_status_never_reverts() {
        let (store, ledger) = ledger();
        let user = UserId::from("u1");

        ledger
            .commit_attempt(&user, "SQL", Difficulty::Medium, 10, 10)
            .unwrap();
        let mastered = ledger
            .commit_attempt(&user, "SQL", Difficulty::Medium, 19, 20)
            .unwrap();
        assert_eq!(mastered.topic_status, TopicStatus::Mastered);

        let after_bad_day = ledger
            .commit_attempt(&user, "SQL", Difficulty::Medium, 4, 10)
            .unwrap();
        assert_eq!(after_bad_day.topic_status, TopicStatus::Mastered);

        let state = store.snapshot(&user).unwrap().unwrap();
        assert_eq!(state.topics["SQL"].last_score, 40.0);
        assert_eq!(state.topics["SQL"].best_score, 95.0);
    }

    #[test]
    fn test_first_attempt_starts_in_progress() {
        let (_, ledger) = ledger();
        let outcome = ledger
            .commit_attempt(&UserId::from("u1"), "New Topic", Difficulty::Easy, 10, 10)
            .unwrap();
        assert_eq!(outcome.topic_status, TopicStatus::InProgress);
    }

    #[test]
    fn test_review_fixed_reward() {
        let (store, ledger) = ledger();
        let user = UserId::from("u1");

        ledger
            .commit_attempt(&user, "Rust", Difficulty::Easy, 5, 10)
            .unwrap();
        let before = store.snapshot(&user).unwrap().unwrap();

        let outcome = ledger.commit_review(&user, "Rust").unwrap();
        assert_eq!(outcome.xp_gained, REVIEW_XP);
        assert_eq!(outcome.total_xp, before.account.total_xp + REVIEW_XP);

        let after = store.snapshot(&user).unwrap().unwrap();
        // No attempt row, no attempt counter bump, timestamp refreshed.
        assert_eq!(after.attempts.len(), before.attempts.len());
        assert_eq!(after.topics["Rust"].attempts, before.topics["Rust"].attempts);
        assert!(after.topics["Rust"].last_attempted_at >= before.topics["Rust"].last_attempted_at);
        assert_eq!(after.xp_events.len(), before.xp_events.len() + 1);
        assert_eq!(
            after.xp_events.last().unwrap().reason,
            XpReason::TopicReview
        );
    }

    #[test]
    fn test_feedback_tiers() {
        assert!(feedback_for_score(100.0).starts_with("Outstanding"));
        assert!(feedback_for_score(92.0).starts_with("Excellent"));
        assert!(feedback_for_score(85.0).starts_with("Great"));
        assert!(feedback_for_score(72.0).starts_with("Good effort"));
        assert!(feedback_for_score(55.0).starts_with("Keep practicing"));
        assert!(feedback_for_score(20.0).starts_with("Don't give up"));
    }
}
