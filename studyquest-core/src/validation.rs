//! Input validation applied before any state is written.
//!
//! Every rejection carries a specific, user-facing message; validation
//! failures never leave partial state behind because they run strictly
//! before the ledger opens a transaction. The routing layer normalizes
//! raw request strings through these helpers:
//!
//! ```
//! use studyquest_core::model::Difficulty;
//! use studyquest_core::validation::{parse_difficulty, validate_topic};
//!
//! let topic = validate_topic("  Rust Basics ")?;
//! assert_eq!(topic, "Rust Basics");
//! assert_eq!(parse_difficulty("Hard")?, Difficulty::Hard);
//! assert!(parse_difficulty("nightmare").is_err());
//! # Ok::<(), studyquest_core::validation::ValidationError>(())
//! ```

use crate::model::Difficulty;
use thiserror::Error;

/// Longest accepted topic name.
pub const MAX_TOPIC_LENGTH: usize = 200;

/// Largest accepted quiz size on submission.
pub const MAX_QUIZ_TOTAL: u32 = 50;

/// Bounds for generated-quiz question counts.
pub const MIN_QUESTIONS: usize = 1;
pub const MAX_QUESTIONS: usize = 20;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Topic cannot be empty")]
    EmptyTopic,

    #[error("Topic cannot exceed {MAX_TOPIC_LENGTH} characters")]
    TopicTooLong,

    #[error("Topic must contain at least one letter or number")]
    TopicNotAlphanumeric,

    #[error("Total questions must be between 1 and {MAX_QUIZ_TOTAL}")]
    InvalidTotal,

    #[error("Correct answers cannot exceed total questions")]
    CorrectExceedsTotal,

    #[error("Number of questions must be between {MIN_QUESTIONS} and {MAX_QUESTIONS}")]
    InvalidQuestionCount,

    #[error("Difficulty must be one of: easy, medium, hard, expert")]
    InvalidDifficulty,

    #[error("Notes cannot be empty")]
    EmptyNotes,
}

/// Validate and normalize a topic name. Returns the trimmed topic.
pub fn validate_topic(topic: &str) -> Result<String, ValidationError> {
    let trimmed = topic.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::EmptyTopic);
    }
    if trimmed.chars().count() > MAX_TOPIC_LENGTH {
        return Err(ValidationError::TopicTooLong);
    }
    if !trimmed.chars().any(|c| c.is_alphanumeric()) {
        return Err(ValidationError::TopicNotAlphanumeric);
    }
    Ok(trimmed.to_string())
}

/// Validate submitted answer counts: `total` in 1..=50 and `correct <= total`.
pub fn validate_quiz_counts(correct: u32, total: u32) -> Result<(), ValidationError> {
    if total == 0 || total > MAX_QUIZ_TOTAL {
        return Err(ValidationError::InvalidTotal);
    }
    if correct > total {
        return Err(ValidationError::CorrectExceedsTotal);
    }
    Ok(())
}

/// Validate a requested generated-quiz question count.
pub fn validate_question_count(count: usize) -> Result<usize, ValidationError> {
    if !(MIN_QUESTIONS..=MAX_QUESTIONS).contains(&count) {
        return Err(ValidationError::InvalidQuestionCount);
    }
    Ok(count)
}

/// Parse a user-supplied difficulty preference.
pub fn parse_difficulty(s: &str) -> Result<Difficulty, ValidationError> {
    Difficulty::parse(s).ok_or(ValidationError::InvalidDifficulty)
}

/// Validate source notes for quiz generation.
pub fn validate_notes(notes: &str) -> Result<&str, ValidationError> {
    if notes.trim().is_empty() {
        return Err(ValidationError::EmptyNotes);
    }
    Ok(notes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_topic_trimmed() {
        assert_eq!(validate_topic("  Rust Basics  ").unwrap(), "Rust Basics");
    }

    #[test]
    fn test_topic_empty_rejected() {
        assert_eq!(validate_topic(""), Err(ValidationError::EmptyTopic));
        assert_eq!(validate_topic("   "), Err(ValidationError::EmptyTopic));
    }

    #[test]
    fn test_topic_length_limit() {
        let long = "a".repeat(MAX_TOPIC_LENGTH);
        assert!(validate_topic(&long).is_ok());
        let too_long = "a".repeat(MAX_TOPIC_LENGTH + 1);
        assert_eq!(validate_topic(&too_long), Err(ValidationError::TopicTooLong));
    }

    #[test]
    fn test_topic_needs_alphanumeric() {
        assert_eq!(
            validate_topic("???!!!"),
            Err(ValidationError::TopicNotAlphanumeric)
        );
        assert!(validate_topic("C++").is_ok());
    }

    #[test]
    fn test_quiz_counts() {
        assert!(validate_quiz_counts(0, 1).is_ok());
        assert!(validate_quiz_counts(50, 50).is_ok());
        assert_eq!(validate_quiz_counts(1, 0), Err(ValidationError::InvalidTotal));
        assert_eq!(
            validate_quiz_counts(0, 51),
            Err(ValidationError::InvalidTotal)
        );
        assert_eq!(
            validate_quiz_counts(6, 5),
            Err(ValidationError::CorrectExceedsTotal)
        );
    }

    #[test]
    fn test_question_count_bounds() {
        assert_eq!(validate_question_count(1).unwrap(), 1);
        assert_eq!(validate_question_count(20).unwrap(), 20);
        assert_eq!(
            validate_question_count(0),
            Err(ValidationError::InvalidQuestionCount)
        );
        assert_eq!(
            validate_question_count(21),
            Err(ValidationError::InvalidQuestionCount)
        );
    }

    #[test]
    fn test_parse_difficulty() {
        assert_eq!(parse_difficulty("hard").unwrap(), Difficulty::Hard);
        assert_eq!(
            parse_difficulty("nightmare"),
            Err(ValidationError::InvalidDifficulty)
        );
    }
}
