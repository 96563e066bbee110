//! The engine facade.
//!
//! One struct wires validation, the ledger, the advisor, the ranker, the
//! achievement evaluator, and (optionally) a content generator into the
//! per-request operations the routing layer calls. All storage failures are
//! logged here with operation context and surfaced as a generic
//! [`EngineError::Storage`].

use crate::achievements::{
    progress_toward, AchievementEvaluator, BadgeProgress, Unlock, UserStats,
};
use crate::adaptive::{DifficultyAdvice, DifficultyAdvisor, PerformanceSummary};
use crate::generate::{ContentGenerator, GenerateError, GeneratedQuiz, LlmGenerator, Narrative};
use crate::ledger::{feedback_for_score, ProgressLedger};
use crate::model::{Difficulty, QuizAttempt, TopicStatus, UserId, XpEvent};
use crate::recommend::{
    OverallStats, Recommendation, RecommendationRanker, TopicHistory, DEFAULT_TOPICS,
};
use crate::store::{ProgressStore, StoreError};
use crate::validation::{self, ValidationError};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tracing::{error, warn};
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// The whole commit was aborted; nothing was written. The underlying
    /// detail is logged, not shown to users.
    #[error("Progress update failed. Please try again.")]
    Storage(#[source] StoreError),

    #[error(transparent)]
    Generation(#[from] GenerateError),
}

// ============================================================================
// Configuration
// ============================================================================

#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub max_recommendations: usize,
    pub default_topics: Vec<String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_recommendations: 5,
            default_topics: DEFAULT_TOPICS.iter().map(|t| (*t).to_string()).collect(),
        }
    }
}

impl EngineConfig {
    pub fn with_max_recommendations(mut self, max: usize) -> Self {
        self.max_recommendations = max;
        self
    }

    pub fn with_default_topics(mut self, topics: Vec<String>) -> Self {
        self.default_topics = topics;
        self
    }
}

// ============================================================================
// Request / response types
// ============================================================================

/// A graded quiz handed in by the routing layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuizSubmission {
    pub user_id: UserId,
    pub topic: String,
    pub difficulty: Difficulty,
    pub correct: u32,
    pub total: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct SubmissionResult {
    pub quiz_id: Uuid,
    pub topic: String,
    pub score: f64,
    pub xp_gained: u32,
    pub total_xp: u32,
    pub new_level: u32,
    pub leveled_up: bool,
    pub topic_status: TopicStatus,
    pub feedback: String,
    pub newly_unlocked: Vec<Unlock>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReviewResult {
    pub topic: String,
    pub xp_gained: u32,
    pub total_xp: u32,
    pub level: u32,
    pub leveled_up: bool,
    pub newly_unlocked: Vec<Unlock>,
}

/// A request for a freshly generated quiz.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuizRequest {
    pub user_id: UserId,
    /// Scopes the difficulty decision to this topic's history when present;
    /// account-wide history is used otherwise.
    pub topic: Option<String>,
    pub notes: String,
    pub num_questions: Option<usize>,
    pub preference: Option<Difficulty>,
}

/// How the difficulty was chosen, returned alongside the quiz.
#[derive(Debug, Clone, Serialize)]
pub struct AdaptiveMetadata {
    pub recommended_difficulty: Difficulty,
    pub reasoning: String,
    pub adjusted_from: Option<Difficulty>,
    pub user_performance: PerformanceSummary,
}

#[derive(Debug, Clone, Serialize)]
pub struct QuizResponse {
    pub topic: Option<String>,
    pub quiz: GeneratedQuiz,
    pub adaptive_metadata: AdaptiveMetadata,
}

#[derive(Debug, Clone, Serialize)]
pub struct RecommendationReport {
    pub recommendations: Vec<Recommendation>,
    pub overall_stats: OverallStats,
    pub narrative: Option<Narrative>,
}

// ============================================================================
// Engine
// ============================================================================

pub struct Engine<S, G = LlmGenerator> {
    store: Arc<S>,
    ledger: ProgressLedger<S>,
    evaluator: AchievementEvaluator<S>,
    generator: Option<G>,
    config: EngineConfig,
}

impl<S: ProgressStore> Engine<S> {
    /// Engine without a content generator: progression, recommendations,
    /// and achievements work; quiz generation reports
    /// [`GenerateError::Disabled`].
    pub fn new(store: Arc<S>, config: EngineConfig) -> Self {
        Self {
            ledger: ProgressLedger::new(store.clone()),
            evaluator: AchievementEvaluator::new(store.clone()),
            store,
            generator: None,
            config,
        }
    }
}

impl<S: ProgressStore, G: ContentGenerator> Engine<S, G> {
    pub fn with_generator(store: Arc<S>, config: EngineConfig, generator: G) -> Self {
        Self {
            ledger: ProgressLedger::new(store.clone()),
            evaluator: AchievementEvaluator::new(store.clone()),
            store,
            generator: Some(generator),
            config,
        }
    }

    // ------------------------------------------------------------------
    // Writes
    // ------------------------------------------------------------------

    /// Commit a graded quiz: validate, award XP atomically, then evaluate
    /// achievements best-effort.
    pub fn submit_quiz(&self, submission: QuizSubmission) -> Result<SubmissionResult, EngineError> {
        let topic = validation::validate_topic(&submission.topic)?;
        validation::validate_quiz_counts(submission.correct, submission.total)?;

        let outcome = self
            .ledger
            .commit_attempt(
                &submission.user_id,
                &topic,
                submission.difficulty,
                submission.correct,
                submission.total,
            )
            .map_err(|e| self.storage_failure("submit_quiz", &submission.user_id, e))?;

        let newly_unlocked = match self.stats_snapshot(&submission.user_id) {
            Ok(stats) => self
                .evaluator
                .evaluate_best_effort(&submission.user_id, &stats),
            Err(e) => {
                warn!(user = %submission.user_id, error = %e, "skipping achievement evaluation");
                Vec::new()
            }
        };

        Ok(SubmissionResult {
            quiz_id: outcome.quiz_id,
            topic,
            score: outcome.score,
            xp_gained: outcome.xp_gained,
            total_xp: outcome.total_xp,
            new_level: outcome.level,
            leveled_up: outcome.leveled_up,
            topic_status: outcome.topic_status,
            feedback: feedback_for_score(outcome.score).to_string(),
            newly_unlocked,
        })
    }

    /// Award the fixed review reward for re-reading a topic's notes.
    pub fn review_topic(&self, user_id: &UserId, topic: &str) -> Result<ReviewResult, EngineError> {
        let topic = validation::validate_topic(topic)?;
        let outcome = self
            .ledger
            .commit_review(user_id, &topic)
            .map_err(|e| self.storage_failure("review_topic", user_id, e))?;

        let newly_unlocked = match self.stats_snapshot(user_id) {
            Ok(stats) => self.evaluator.evaluate_best_effort(user_id, &stats),
            Err(e) => {
                warn!(user = %user_id, error = %e, "skipping achievement evaluation");
                Vec::new()
            }
        };

        Ok(ReviewResult {
            topic,
            xp_gained: outcome.xp_gained,
            total_xp: outcome.total_xp,
            level: outcome.level,
            leveled_up: outcome.leveled_up,
            newly_unlocked,
        })
    }

    // ------------------------------------------------------------------
    // Generation
    // ------------------------------------------------------------------

    /// Generate a quiz at the adaptively chosen difficulty, returning the
    /// decision metadata alongside the questions.
    pub async fn request_quiz(&self, request: QuizRequest) -> Result<QuizResponse, EngineError> {
        let topic = match &request.topic {
            Some(t) => Some(validation::validate_topic(t)?),
            None => None,
        };
        validation::validate_notes(&request.notes)?;
        if let Some(n) = request.num_questions {
            validation::validate_question_count(n)?;
        }

        let summary = self.performance_summary(&request.user_id, topic.as_deref())?;
        let advice = DifficultyAdvisor::next_difficulty(&summary, request.preference);
        let num_questions = request
            .num_questions
            .unwrap_or_else(|| DifficultyAdvisor::question_count(&summary));

        let generator = self.generator()?;
        let quiz = generator
            .generate_quiz(&request.notes, advice.difficulty, num_questions)
            .await?;

        let DifficultyAdvice {
            difficulty,
            reasoning,
            adjusted_from,
        } = advice;
        Ok(QuizResponse {
            topic,
            quiz,
            adaptive_metadata: AdaptiveMetadata {
                recommended_difficulty: difficulty,
                reasoning,
                adjusted_from,
                user_performance: summary,
            },
        })
    }

    /// Rank topic recommendations, optionally with a generated narrative.
    /// Narrative failures degrade to `None`; they never fail the report.
    pub async fn recommendations(
        &self,
        user_id: &UserId,
        max_results: Option<usize>,
        include_narrative: bool,
    ) -> Result<RecommendationReport, EngineError> {
        let histories = self.topic_histories(user_id)?;
        let overall_stats = RecommendationRanker::overall_stats(&histories);
        let recommendations = RecommendationRanker::rank(
            &histories,
            &self.config.default_topics,
            max_results.unwrap_or(self.config.max_recommendations),
            Utc::now(),
        );

        let narrative = if include_narrative {
            match &self.generator {
                Some(generator) => match generator.narrate(&overall_stats, &recommendations).await
                {
                    Ok(narrative) => Some(narrative),
                    Err(e) => {
                        warn!(user = %user_id, error = %e, "narrative generation failed");
                        None
                    }
                },
                None => None,
            }
        } else {
            None
        };

        Ok(RecommendationReport {
            recommendations,
            overall_stats,
            narrative,
        })
    }

    // ------------------------------------------------------------------
    // Reads
    // ------------------------------------------------------------------

    /// Account statistics; zeros (level 1) for unknown users.
    pub fn user_stats(&self, user_id: &UserId) -> Result<UserStats, EngineError> {
        self.stats_snapshot(user_id)
            .map_err(|e| self.storage_failure("user_stats", user_id, e))
    }

    /// Progress toward every still-locked badge.
    pub fn badge_progress(&self, user_id: &UserId) -> Result<Vec<BadgeProgress>, EngineError> {
        let snapshot = self
            .store
            .snapshot(user_id)
            .map_err(|e| self.storage_failure("badge_progress", user_id, e))?;
        Ok(match snapshot {
            Some(state) => {
                let stats = UserStats::from_state(&state);
                let unlocked: Vec<&str> = state.badges.keys().map(String::as_str).collect();
                progress_toward(&stats, &unlocked)
            }
            None => progress_toward(&UserStats::empty(), &[]),
        })
    }

    /// Most recent attempts first, optionally scoped to one topic.
    pub fn quiz_history(
        &self,
        user_id: &UserId,
        topic: Option<&str>,
        limit: usize,
    ) -> Result<Vec<QuizAttempt>, EngineError> {
        let snapshot = self
            .store
            .snapshot(user_id)
            .map_err(|e| self.storage_failure("quiz_history", user_id, e))?;
        Ok(snapshot
            .map(|state| {
                state
                    .attempts
                    .iter()
                    .rev()
                    .filter(|a| topic.map_or(true, |t| a.topic == t))
                    .take(limit)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    /// Most recent XP events first.
    pub fn xp_history(&self, user_id: &UserId, limit: usize) -> Result<Vec<XpEvent>, EngineError> {
        let snapshot = self
            .store
            .snapshot(user_id)
            .map_err(|e| self.storage_failure("xp_history", user_id, e))?;
        Ok(snapshot
            .map(|state| state.xp_events.iter().rev().take(limit).cloned().collect())
            .unwrap_or_default())
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    fn generator(&self) -> Result<&G, EngineError> {
        self.generator
            .as_ref()
            .ok_or(EngineError::Generation(GenerateError::Disabled))
    }

    fn stats_snapshot(&self, user_id: &UserId) -> Result<UserStats, StoreError> {
        Ok(self
            .store
            .snapshot(user_id)?
            .map(|state| UserStats::from_state(&state))
            .unwrap_or_else(UserStats::empty))
    }

    fn performance_summary(
        &self,
        user_id: &UserId,
        topic: Option<&str>,
    ) -> Result<PerformanceSummary, EngineError> {
        let snapshot = self
            .store
            .snapshot(user_id)
            .map_err(|e| self.storage_failure("performance_summary", user_id, e))?;
        Ok(match snapshot {
            Some(state) => {
                let attempts: Vec<_> = state
                    .attempts
                    .iter()
                    .filter(|a| topic.map_or(true, |t| a.topic == t))
                    .cloned()
                    .collect();
                PerformanceSummary::from_attempts(&attempts)
            }
            None => PerformanceSummary::empty(),
        })
    }

    fn topic_histories(&self, user_id: &UserId) -> Result<Vec<TopicHistory>, EngineError> {
        let snapshot = self
            .store
            .snapshot(user_id)
            .map_err(|e| self.storage_failure("recommendations", user_id, e))?;
        Ok(snapshot
            .map(|state| {
                state
                    .topics
                    .values()
                    .map(|t| TopicHistory {
                        topic: t.topic.clone(),
                        score: Some(t.best_score),
                        attempts: t.attempts,
                        last_attempted_at: Some(t.last_attempted_at),
                    })
                    .collect()
            })
            .unwrap_or_default())
    }

    fn storage_failure(&self, operation: &str, user_id: &UserId, e: StoreError) -> EngineError {
        error!(user = %user_id, operation, error = %e, "storage failure");
        EngineError::Storage(e)
    }
}
