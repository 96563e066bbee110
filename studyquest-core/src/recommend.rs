//! Topic recommendation ranking.
//!
//! Pure classification and ordering over per-topic history: weak areas
//! first, then stale topics due for review, then unexplored topics from the
//! catalog. The ranker never performs I/O; the engine hands it a snapshot.

use crate::model::Difficulty;
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Score below which a topic counts as a weak area.
pub const WEAK_AREA_THRESHOLD: f64 = 70.0;

/// Days without an attempt after which a topic is due for review.
pub const STALE_AFTER_DAYS: i64 = 7;

/// Base XP estimate before the difficulty multiplier.
const BASE_XP_ESTIMATE: f64 = 150.0;

/// Topics suggested to users with no history at all.
pub const DEFAULT_TOPICS: [&str; 10] = [
    "Python Programming",
    "JavaScript Fundamentals",
    "Data Structures",
    "Algorithms",
    "Web Development",
    "Machine Learning",
    "Database Design",
    "System Design",
    "API Development",
    "Cloud Computing",
];

/// One topic's history as seen by the ranker.
#[derive(Debug, Clone)]
pub struct TopicHistory {
    pub topic: String,
    /// Best score achieved on the topic, if any. Classification uses the
    /// best rather than the latest score so one bad retry cannot demote a
    /// strong topic to a weak area. Entries with out-of-range or
    /// non-finite scores are ignored entirely.
    pub score: Option<f64>,
    pub attempts: u32,
    pub last_attempted_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RecommendationCategory {
    WeakArea,
    Review,
    NewLearning,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    High,
    Medium,
    Low,
}

/// A single ranked suggestion.
#[derive(Debug, Clone, Serialize)]
pub struct Recommendation {
    pub topic: String,
    pub category: RecommendationCategory,
    pub priority: Priority,
    pub reason: String,
    pub current_score: Option<f64>,
    pub recommended_difficulty: Difficulty,
    pub estimated_xp_gain: u32,
}

/// Account-wide aggregates reported alongside recommendations.
#[derive(Debug, Clone, Serialize)]
pub struct OverallStats {
    pub total_attempts: u32,
    pub avg_score: f64,
    pub topics_studied: usize,
}

pub struct RecommendationRanker;

impl RecommendationRanker {
    /// Rank up to `max_results` suggestions, filling strictly by category
    /// priority: every weak area before any review, every review before any
    /// new topic.
    pub fn rank(
        histories: &[TopicHistory],
        catalog: &[String],
        max_results: usize,
        now: DateTime<Utc>,
    ) -> Vec<Recommendation> {
        let valid: Vec<&TopicHistory> = histories
            .iter()
            .filter(|h| match h.score {
                Some(s) => s.is_finite() && (0.0..=100.0).contains(&s),
                None => true,
            })
            .collect();

        if valid.iter().all(|h| h.attempts == 0) && valid.iter().all(|h| h.score.is_none()) {
            return Self::starter_recommendations(max_results);
        }

        let mut out = Vec::with_capacity(max_results);

        // Weak areas, largest gap to 70 first.
        let mut weak: Vec<&&TopicHistory> = valid
            .iter()
            .filter(|h| matches!(h.score, Some(s) if s < WEAK_AREA_THRESHOLD))
            .collect();
        weak.sort_by(|a, b| {
            a.score
                .partial_cmp(&b.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        for h in weak {
            if out.len() >= max_results {
                return out;
            }
            let score = h.score.unwrap_or(0.0);
            out.push(Recommendation {
                topic: h.topic.clone(),
                category: RecommendationCategory::WeakArea,
                priority: Priority::High,
                reason: format!(
                    "Improve performance (current: {score:.0}%, goal: {WEAK_AREA_THRESHOLD:.0}%+)"
                ),
                current_score: h.score,
                recommended_difficulty: Self::recommended_difficulty(h.score),
                estimated_xp_gain: Self::estimate_xp(h.score, true),
            });
        }

        // Stale topics, oldest first. Weak topics were already taken above.
        let mut stale: Vec<(&&TopicHistory, i64)> = valid
            .iter()
            .filter(|h| !matches!(h.score, Some(s) if s < WEAK_AREA_THRESHOLD))
            .filter_map(|h| {
                let last = h.last_attempted_at?;
                let days = (now - last).num_days();
                (days >= STALE_AFTER_DAYS).then_some((h, days))
            })
            .collect();
        stale.sort_by(|a, b| b.1.cmp(&a.1));
        for (h, days) in stale {
            if out.len() >= max_results {
                return out;
            }
            out.push(Recommendation {
                topic: h.topic.clone(),
                category: RecommendationCategory::Review,
                priority: Priority::Medium,
                reason: format!("Review needed (last attempt: {days} days ago)"),
                current_score: h.score,
                recommended_difficulty: Self::recommended_difficulty(h.score),
                estimated_xp_gain: Self::estimate_xp(h.score, false),
            });
        }

        // New topics from the catalog, in catalog order.
        for topic in catalog {
            if out.len() >= max_results {
                return out;
            }
            if histories.iter().any(|h| &h.topic == topic) {
                continue;
            }
            out.push(Self::new_topic(topic.clone()));
        }

        out
    }

    /// Aggregates across every topic with at least one attempt.
    pub fn overall_stats(histories: &[TopicHistory]) -> OverallStats {
        let studied: Vec<&TopicHistory> = histories.iter().filter(|h| h.attempts > 0).collect();
        let total_attempts: u32 = studied.iter().map(|h| h.attempts).sum();
        let scores: Vec<f64> = studied.iter().filter_map(|h| h.score).collect();
        let avg_score = if scores.is_empty() {
            0.0
        } else {
            scores.iter().sum::<f64>() / scores.len() as f64
        };
        OverallStats {
            total_attempts,
            avg_score,
            topics_studied: studied.len(),
        }
    }

    fn starter_recommendations(max_results: usize) -> Vec<Recommendation> {
        DEFAULT_TOPICS
            .iter()
            .take(max_results)
            .map(|t| Self::new_topic((*t).to_string()))
            .collect()
    }

    fn new_topic(topic: String) -> Recommendation {
        Recommendation {
            topic,
            category: RecommendationCategory::NewLearning,
            priority: Priority::Low,
            reason: "Expand your knowledge base with a new topic".to_string(),
            current_score: None,
            recommended_difficulty: Difficulty::Medium,
            estimated_xp_gain: Self::estimate_xp(None, false),
        }
    }

    /// Difficulty to suggest given the current score: struggling users get
    /// an easier tier, strong ones a harder one.
    fn recommended_difficulty(score: Option<f64>) -> Difficulty {
        match score {
            None => Difficulty::Medium,
            Some(s) if s < 50.0 => Difficulty::Easy,
            Some(s) if s < 85.0 => Difficulty::Medium,
            Some(_) => Difficulty::Hard,
        }
    }

    /// Rough XP a user could earn: base scaled by the suggested difficulty,
    /// plus an improvement bonus proportional to the gap for weak areas.
    fn estimate_xp(score: Option<f64>, weak_area: bool) -> u32 {
        let difficulty = Self::recommended_difficulty(score);
        let mut estimate = (BASE_XP_ESTIMATE * difficulty.xp_multiplier()) as u32;
        if weak_area {
            if let Some(s) = score {
                estimate += ((WEAK_AREA_THRESHOLD - s).max(0.0) * 0.5) as u32;
            }
        }
        estimate
    }
}
