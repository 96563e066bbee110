//! Core data model for the progression engine.
//!
//! These types are the durable vocabulary of the system: accounts, per-topic
//! progress, immutable quiz attempts, and the append-only XP event ledger.
//! Everything here is serde-serializable so the routing layer can hand the
//! structs straight back as JSON.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

// ============================================================================
// Identifiers
// ============================================================================

/// Opaque user identifier, assigned by the (external) auth layer.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserId(String);

impl UserId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for UserId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

// ============================================================================
// Difficulty
// ============================================================================

/// Quiz difficulty tiers, ordered easiest to hardest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
    Expert,
}

impl Difficulty {
    pub fn name(&self) -> &'static str {
        match self {
            Difficulty::Easy => "easy",
            Difficulty::Medium => "medium",
            Difficulty::Hard => "hard",
            Difficulty::Expert => "expert",
        }
    }

    /// Parse a user-supplied difficulty string (case-insensitive).
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "easy" => Some(Difficulty::Easy),
            "medium" => Some(Difficulty::Medium),
            "hard" => Some(Difficulty::Hard),
            "expert" => Some(Difficulty::Expert),
            _ => None,
        }
    }

    /// One tier harder, clamped at expert.
    pub fn step_up(&self) -> Self {
        match self {
            Difficulty::Easy => Difficulty::Medium,
            Difficulty::Medium => Difficulty::Hard,
            Difficulty::Hard => Difficulty::Expert,
            Difficulty::Expert => Difficulty::Expert,
        }
    }

    /// One tier easier, clamped at easy.
    pub fn step_down(&self) -> Self {
        match self {
            Difficulty::Easy => Difficulty::Easy,
            Difficulty::Medium => Difficulty::Easy,
            Difficulty::Hard => Difficulty::Medium,
            Difficulty::Expert => Difficulty::Hard,
        }
    }

    /// Flat XP bonus awarded for completing a quiz at this tier.
    pub fn xp_bonus(&self) -> u32 {
        match self {
            Difficulty::Easy => 10,
            Difficulty::Medium => 20,
            Difficulty::Hard => 30,
            Difficulty::Expert => 50,
        }
    }

    /// Reward multiplier used when estimating XP for recommendations.
    pub fn xp_multiplier(&self) -> f64 {
        match self {
            Difficulty::Easy => 0.8,
            Difficulty::Medium => 1.0,
            Difficulty::Hard => 1.3,
            Difficulty::Expert => 1.5,
        }
    }
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

// ============================================================================
// Topic status
// ============================================================================

/// Lifecycle of a topic for one user. Ordered so that upgrades are a `max`;
/// a topic's status never moves backward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TopicStatus {
    NotStarted,
    InProgress,
    Completed,
    Mastered,
}

impl TopicStatus {
    /// Status implied by a single quiz score.
    pub fn from_score(score: f64) -> Self {
        if score >= 90.0 {
            TopicStatus::Mastered
        } else if score >= 70.0 {
            TopicStatus::Completed
        } else {
            TopicStatus::InProgress
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            TopicStatus::NotStarted => "not_started",
            TopicStatus::InProgress => "in_progress",
            TopicStatus::Completed => "completed",
            TopicStatus::Mastered => "mastered",
        }
    }
}

impl fmt::Display for TopicStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

// ============================================================================
// Durable records
// ============================================================================

/// A user's account totals. `level` is always derived from `total_xp`;
/// the ledger recomputes it on every commit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserAccount {
    pub user_id: UserId,
    pub username: String,
    pub total_xp: u32,
    pub level: u32,
}

impl UserAccount {
    /// Fresh account at level 1 with zero XP, with a username derived
    /// from the id until the profile layer sets a real one.
    pub fn new(user_id: UserId) -> Self {
        let short: String = user_id.as_str().chars().take(8).collect();
        Self {
            user_id,
            username: format!("user_{short}"),
            total_xp: 0,
            level: 1,
        }
    }
}

/// Per-(user, topic) progress row. Created on the first attempt at a topic
/// and never deleted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopicProgress {
    pub user_id: UserId,
    pub topic: String,
    pub status: TopicStatus,
    pub last_score: f64,
    pub best_score: f64,
    pub attempts: u32,
    pub last_attempted_at: DateTime<Utc>,
}

/// One completed quiz. Immutable once written.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuizAttempt {
    pub id: Uuid,
    pub user_id: UserId,
    pub topic: String,
    pub difficulty: Difficulty,
    pub correct: u32,
    pub total: u32,
    pub score: f64,
    pub xp_gained: u32,
    pub created_at: DateTime<Utc>,
}

/// Why an XP event was recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum XpReason {
    QuizCompletion,
    TopicReview,
}

/// One entry in the append-only XP ledger. The sum of `delta` over a user's
/// events always equals their `total_xp`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct XpEvent {
    pub id: Uuid,
    pub user_id: UserId,
    pub delta: u32,
    pub reason: XpReason,
    pub topic: Option<String>,
    pub previous_xp: u32,
    pub new_xp: u32,
    pub previous_level: u32,
    pub new_level: u32,
    pub created_at: DateTime<Utc>,
}

/// Record of a badge unlock. At most one per `(user_id, badge_key)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserBadge {
    pub user_id: UserId,
    pub badge_key: String,
    pub unlocked_at: DateTime<Utc>,
}

/// Record of a milestone unlock. At most one per `(user_id, milestone_key)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserMilestone {
    pub user_id: UserId,
    pub milestone_key: String,
    pub unlocked_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_difficulty_parse() {
        assert_eq!(Difficulty::parse("easy"), Some(Difficulty::Easy));
        assert_eq!(Difficulty::parse(" Hard "), Some(Difficulty::Hard));
        assert_eq!(Difficulty::parse("EXPERT"), Some(Difficulty::Expert));
        assert_eq!(Difficulty::parse("impossible"), None);
    }

    #[test]
    fn test_difficulty_steps_clamp() {
        assert_eq!(Difficulty::Expert.step_up(), Difficulty::Expert);
        assert_eq!(Difficulty::Easy.step_down(), Difficulty::Easy);
        assert_eq!(Difficulty::Medium.step_up(), Difficulty::Hard);
        assert_eq!(Difficulty::Hard.step_down(), Difficulty::Medium);
    }

    #[test]
    fn test_difficulty_serde_lowercase() {
        assert_eq!(
            serde_json::to_string(&Difficulty::Expert).unwrap(),
            "\"expert\""
        );
        let parsed: Difficulty = serde_json::from_str("\"medium\"").unwrap();
        assert_eq!(parsed, Difficulty::Medium);
    }

    #[test]
    fn test_status_from_score_boundaries() {
        assert_eq!(TopicStatus::from_score(90.0), TopicStatus::Mastered);
        assert_eq!(TopicStatus::from_score(89.9), TopicStatus::Completed);
        assert_eq!(TopicStatus::from_score(70.0), TopicStatus::Completed);
        assert_eq!(TopicStatus::from_score(69.9), TopicStatus::InProgress);
        assert_eq!(TopicStatus::from_score(0.0), TopicStatus::InProgress);
    }

    #[test]
    fn test_status_ordering_is_monotonic() {
        assert!(TopicStatus::Mastered > TopicStatus::Completed);
        assert!(TopicStatus::Completed > TopicStatus::InProgress);
        assert!(TopicStatus::InProgress > TopicStatus::NotStarted);
    }

    #[test]
    fn test_new_account_defaults() {
        let account = UserAccount::new(UserId::from("abcdef123456"));
        assert_eq!(account.username, "user_abcdef12");
        assert_eq!(account.total_xp, 0);
        assert_eq!(account.level, 1);
    }
}
