//! Next-difficulty advice from recent performance.
//!
//! The advisor is pure: it looks only at the [`PerformanceSummary`] it is
//! handed (the engine decides whether that summary is topic-scoped or
//! account-wide) and never writes anything.

use crate::model::{Difficulty, QuizAttempt};
use serde::Serialize;

/// Average score at or above which difficulty steps up.
pub const INCREASE_THRESHOLD: f64 = 80.0;

/// Average score below which difficulty steps down.
pub const DECREASE_THRESHOLD: f64 = 50.0;

/// Attempts needed before the advice is considered calibrated.
const CALIBRATION_ATTEMPTS: u32 = 3;

/// Aggregate view of the attempts the advisor should consider.
#[derive(Debug, Clone, Serialize)]
pub struct PerformanceSummary {
    pub avg_score: f64,
    pub total_attempts: u32,
    pub last_difficulty: Option<Difficulty>,
}

impl PerformanceSummary {
    /// Empty history. Advice for a brand-new user.
    pub fn empty() -> Self {
        Self {
            avg_score: 0.0,
            total_attempts: 0,
            last_difficulty: None,
        }
    }

    /// Summarize a slice of attempts, ordered oldest to newest.
    pub fn from_attempts(attempts: &[QuizAttempt]) -> Self {
        if attempts.is_empty() {
            return Self::empty();
        }
        let avg = attempts.iter().map(|a| a.score).sum::<f64>() / attempts.len() as f64;
        Self {
            avg_score: avg,
            total_attempts: attempts.len() as u32,
            last_difficulty: attempts.last().map(|a| a.difficulty),
        }
    }

    pub fn has_history(&self) -> bool {
        self.total_attempts > 0
    }
}

/// The advisor's decision, with the reasoning shown to the user.
#[derive(Debug, Clone, Serialize)]
pub struct DifficultyAdvice {
    pub difficulty: Difficulty,
    pub reasoning: String,
    /// Set only when the advice differs from the user's previous tier.
    pub adjusted_from: Option<Difficulty>,
}

pub struct DifficultyAdvisor;

impl DifficultyAdvisor {
    /// Decide the next quiz difficulty.
    ///
    /// An explicit user override wins unconditionally. With no history the
    /// advice is medium. Otherwise the previous tier moves one step up when
    /// the average is at or above [`INCREASE_THRESHOLD`], one step down when
    /// below [`DECREASE_THRESHOLD`], and holds in between, clamped to the
    /// easy..=expert range.
    pub fn next_difficulty(
        summary: &PerformanceSummary,
        user_override: Option<Difficulty>,
    ) -> DifficultyAdvice {
        if let Some(chosen) = user_override {
            return DifficultyAdvice {
                difficulty: chosen,
                reasoning: format!("Using your requested {chosen} difficulty."),
                adjusted_from: None,
            };
        }

        if !summary.has_history() {
            return DifficultyAdvice {
                difficulty: Difficulty::Medium,
                reasoning: "Welcome! Starting at medium difficulty. We'll adjust based on your performance.".to_string(),
                adjusted_from: None,
            };
        }

        let current = summary.last_difficulty.unwrap_or(Difficulty::Medium);
        let avg = summary.avg_score;

        let next = if avg >= INCREASE_THRESHOLD {
            current.step_up()
        } else if avg < DECREASE_THRESHOLD {
            current.step_down()
        } else {
            current
        };

        let mut reasoning = if next > current {
            format!(
                "Your average score of {avg:.1}% shows strong mastery. Ready to challenge yourself at {next} level."
            )
        } else if next < current {
            format!(
                "Your average score of {avg:.1}% suggests you need more practice. Trying {next} level will help build confidence."
            )
        } else {
            format!(
                "Your average score of {avg:.1}% is in the optimal range. Continue at {next} level to solidify understanding."
            )
        };

        if summary.total_attempts < CALIBRATION_ATTEMPTS {
            reasoning.push_str(" Complete more quizzes for better difficulty calibration.");
        }

        DifficultyAdvice {
            difficulty: next,
            reasoning,
            adjusted_from: (next != current).then_some(current),
        }
    }

    /// How many questions the next quiz should have: strong performers get
    /// longer quizzes.
    pub fn question_count(summary: &PerformanceSummary) -> usize {
        if !summary.has_history() {
            return 5;
        }
        if summary.avg_score >= 90.0 {
            7
        } else if summary.avg_score >= 70.0 {
            5
        } else {
            4
        }
    }
}
