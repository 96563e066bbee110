//! Quiz-question and recommendation-narrative generation.
//!
//! Everything network-facing lives here: the prompt construction, the
//! model fallback chain, strict validation of what the model returns, and
//! the response caches. Generation failures surface as [`GenerateError`]
//! and never touch the ledger.

use crate::cache::{CacheConfig, ResponseCache};
use crate::model::Difficulty;
use crate::recommend::{OverallStats, Recommendation};
use openrouter::{Message, OpenRouter, Request};
use serde::{Deserialize, Serialize};
use std::future::Future;
use thiserror::Error;
use tracing::{debug, warn};

/// Primary model for generation; free-tier, JSON-mode capable.
pub const DEFAULT_MODEL: &str = "google/gemini-2.0-flash-exp:free";

/// Tried in order when the primary model fails.
pub const FALLBACK_MODELS: [&str; 3] = [
    "meta-llama/llama-3.2-3b-instruct:free",
    "meta-llama/llama-3.2-1b-instruct:free",
    "qwen/qwen-2.5-7b-instruct:free",
];

const MAX_COMPLETION_TOKENS: usize = 2500;

#[derive(Debug, Error)]
pub enum GenerateError {
    #[error("Content generation is not configured")]
    Disabled,

    #[error("All generation models failed: {0}")]
    Exhausted(String),

    #[error("Generated content was invalid: {0}")]
    InvalidContent(String),

    #[error(transparent)]
    Client(#[from] openrouter::Error),
}

// ============================================================================
// Generated content
// ============================================================================

/// One multiple-choice question. `options` always holds exactly four
/// lettered entries and `answer` is one of A-D.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Question {
    pub question: String,
    pub options: Vec<String>,
    pub answer: String,
    #[serde(default)]
    pub explanation: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneratedQuiz {
    pub difficulty: Difficulty,
    pub questions: Vec<Question>,
    pub model: String,
    pub cognitive_level: String,
    /// True when this response came from the cache.
    pub cached: bool,
}

/// Optional narrative attached to a recommendation report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Narrative {
    pub motivational_message: String,
    pub learning_insight: String,
    pub priority_advice: String,
}

// ============================================================================
// Difficulty context
// ============================================================================

/// How each tier shapes the prompt and sampling.
pub struct DifficultyContext {
    pub cognitive_level: &'static str,
    pub question_style: &'static str,
    pub temperature: f32,
}

pub fn difficulty_context(difficulty: Difficulty) -> DifficultyContext {
    match difficulty {
        Difficulty::Easy => DifficultyContext {
            cognitive_level: "recall and basic understanding",
            question_style: "direct questions about definitions and fundamental facts",
            temperature: 0.6,
        },
        Difficulty::Medium => DifficultyContext {
            cognitive_level: "application and comprehension",
            question_style: "questions applying concepts to straightforward scenarios",
            temperature: 0.7,
        },
        Difficulty::Hard => DifficultyContext {
            cognitive_level: "analysis and synthesis",
            question_style: "multi-step questions combining several concepts",
            temperature: 0.8,
        },
        Difficulty::Expert => DifficultyContext {
            cognitive_level: "evaluation and expert judgment",
            question_style: "edge cases, trade-offs, and subtle distinctions",
            temperature: 0.85,
        },
    }
}

// ============================================================================
// Generator seam
// ============================================================================

/// What the engine needs from a content generator. The real implementation
/// is [`LlmGenerator`]; tests use a scripted mock.
pub trait ContentGenerator: Send + Sync {
    fn generate_quiz(
        &self,
        notes: &str,
        difficulty: Difficulty,
        num_questions: usize,
    ) -> impl Future<Output = Result<GeneratedQuiz, GenerateError>> + Send;

    fn narrate(
        &self,
        stats: &OverallStats,
        recommendations: &[Recommendation],
    ) -> impl Future<Output = Result<Narrative, GenerateError>> + Send;
}

// ============================================================================
// Real implementation
// ============================================================================

#[derive(Debug, Clone)]
pub struct GeneratorConfig {
    pub primary_model: String,
    pub fallback_models: Vec<String>,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            primary_model: DEFAULT_MODEL.to_string(),
            fallback_models: FALLBACK_MODELS.iter().map(|m| (*m).to_string()).collect(),
        }
    }
}

impl GeneratorConfig {
    pub fn with_primary_model(mut self, model: impl Into<String>) -> Self {
        self.primary_model = model.into();
        self
    }

    pub fn with_fallback_models(mut self, models: Vec<String>) -> Self {
        self.fallback_models = models;
        self
    }

    fn model_chain(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.primary_model.as_str())
            .chain(self.fallback_models.iter().map(String::as_str))
    }
}

/// OpenRouter-backed generator with per-kind response caches.
pub struct LlmGenerator {
    client: OpenRouter,
    config: GeneratorConfig,
    quiz_cache: ResponseCache<GeneratedQuiz>,
    narrative_cache: ResponseCache<Narrative>,
}

impl LlmGenerator {
    pub fn new(client: OpenRouter, config: GeneratorConfig) -> Self {
        Self {
            client,
            config,
            quiz_cache: ResponseCache::new(CacheConfig::quiz()),
            narrative_cache: ResponseCache::new(CacheConfig::narrative()),
        }
    }

    /// Build a generator from `OPENROUTER_API_KEY`.
    pub fn from_env() -> Result<Self, GenerateError> {
        let config = GeneratorConfig::default();
        let client = OpenRouter::from_env(config.primary_model.clone())?;
        Ok(Self::new(client, config))
    }

    fn quiz_fingerprint(&self, notes: &str, difficulty: Difficulty, num_questions: usize) -> String {
        ResponseCache::<GeneratedQuiz>::fingerprint(
            notes,
            &self.config.primary_model,
            &[
                ("difficulty", difficulty.name().to_string()),
                ("num_questions", num_questions.to_string()),
            ],
        )
    }

    fn build_quiz_prompt(notes: &str, difficulty: Difficulty, num_questions: usize) -> String {
        let context = difficulty_context(difficulty);
        format!(
            "Create a {num_questions}-question multiple-choice quiz at {difficulty} difficulty \
             from the study notes below.\n\
             Target cognitive level: {}.\n\
             Question style: {}.\n\n\
             Respond with JSON only, in this shape:\n\
             {{\"questions\": [{{\"question\": \"...\", \
             \"options\": [\"A) ...\", \"B) ...\", \"C) ...\", \"D) ...\"], \
             \"answer\": \"A\", \"explanation\": \"...\"}}]}}\n\n\
             Each question must have exactly 4 options and exactly one correct answer.\n\n\
             Study notes:\n{notes}",
            context.cognitive_level, context.question_style
        )
    }

    fn build_narrative_prompt(stats: &OverallStats, recommendations: &[Recommendation]) -> String {
        let topics: Vec<String> = recommendations
            .iter()
            .map(|r| format!("- {} ({})", r.topic, r.reason))
            .collect();
        format!(
            "A learner has taken {} quizzes with an average score of {:.1}% across {} topics.\n\
             Their next recommended topics are:\n{}\n\n\
             Respond with JSON only:\n\
             {{\"motivational_message\": \"...\", \"learning_insight\": \"...\", \
             \"priority_advice\": \"...\"}}\n\
             Keep each field to one or two sentences.",
            stats.total_attempts,
            stats.avg_score,
            stats.topics_studied,
            topics.join("\n")
        )
    }

    async fn complete_with_fallback(
        &self,
        system: &str,
        prompt: &str,
        temperature: f32,
    ) -> Result<(String, String), GenerateError> {
        let mut last_error = String::new();
        for model in self.config.model_chain() {
            let request = Request::new(vec![Message::system(system), Message::user(prompt)])
                .with_model(model)
                .with_max_tokens(MAX_COMPLETION_TOKENS)
                .with_temperature(temperature)
                .with_json_response();

            match self.client.complete(request).await {
                Ok(response) => {
                    let text = response.text().to_string();
                    if text.trim().is_empty() {
                        warn!(model, "model returned empty content; trying next");
                        last_error = format!("{model}: empty content");
                        continue;
                    }
                    return Ok((text, model.to_string()));
                }
                Err(e) => {
                    warn!(model, error = %e, "model failed; trying next");
                    last_error = format!("{model}: {e}");
                }
            }
        }
        Err(GenerateError::Exhausted(last_error))
    }
}

impl ContentGenerator for LlmGenerator {
    async fn generate_quiz(
        &self,
        notes: &str,
        difficulty: Difficulty,
        num_questions: usize,
    ) -> Result<GeneratedQuiz, GenerateError> {
        let fingerprint = self.quiz_fingerprint(notes, difficulty, num_questions);
        if let Some(mut hit) = self.quiz_cache.get(&fingerprint) {
            hit.cached = true;
            return Ok(hit);
        }

        let context = difficulty_context(difficulty);
        let prompt = Self::build_quiz_prompt(notes, difficulty, num_questions);
        let (text, model) = self
            .complete_with_fallback(
                "You are a quiz writer. You respond with valid JSON and nothing else.",
                &prompt,
                context.temperature,
            )
            .await?;

        let questions = parse_questions(&text, num_questions)?;
        debug!(model, count = questions.len(), "quiz generated");

        let quiz = GeneratedQuiz {
            difficulty,
            questions,
            model,
            cognitive_level: context.cognitive_level.to_string(),
            cached: false,
        };
        self.quiz_cache.put(fingerprint, quiz.clone());
        Ok(quiz)
    }

    async fn narrate(
        &self,
        stats: &OverallStats,
        recommendations: &[Recommendation],
    ) -> Result<Narrative, GenerateError> {
        let prompt = Self::build_narrative_prompt(stats, recommendations);
        let fingerprint =
            ResponseCache::<Narrative>::fingerprint(&prompt, &self.config.primary_model, &[]);
        if let Some(hit) = self.narrative_cache.get(&fingerprint) {
            return Ok(hit);
        }

        let (text, _model) = self
            .complete_with_fallback(
                "You are an encouraging study coach. You respond with valid JSON and nothing else.",
                &prompt,
                0.7,
            )
            .await?;

        let narrative: Narrative = serde_json::from_str(extract_json(&text))
            .map_err(|e| GenerateError::InvalidContent(format!("narrative: {e}")))?;
        self.narrative_cache.put(fingerprint, narrative.clone());
        Ok(narrative)
    }
}

// ============================================================================
// Response parsing
// ============================================================================

/// Strip markdown code fences and any chatter around the first JSON value.
pub fn extract_json(text: &str) -> &str {
    let trimmed = text.trim();
    let without_fence = if let Some(start) = trimmed.find("```") {
        let after = &trimmed[start + 3..];
        let after = after.strip_prefix("json").unwrap_or(after);
        match after.find("```") {
            Some(end) => &after[..end],
            None => after,
        }
    } else {
        trimmed
    };

    let without_fence = without_fence.trim();
    let start = without_fence.find(['{', '[']);
    let end = without_fence.rfind(['}', ']']);
    match (start, end) {
        (Some(s), Some(e)) if e >= s => &without_fence[s..=e],
        _ => without_fence,
    }
}

#[derive(Deserialize)]
struct RawQuestion {
    question: String,
    #[serde(default)]
    options: Vec<String>,
    #[serde(default)]
    answer: String,
    #[serde(default)]
    explanation: String,
}

/// Parse and validate model output into exactly `expected` questions.
///
/// Accepts either `{"questions": [...]}` or a bare array. Questions with a
/// wrong option count or an unrecognizable answer letter are dropped, as are
/// duplicates; too few surviving questions is an error (which triggers the
/// caller's model fallback).
fn parse_questions(text: &str, expected: usize) -> Result<Vec<Question>, GenerateError> {
    let json = extract_json(text);
    let value: serde_json::Value = serde_json::from_str(json)
        .map_err(|e| GenerateError::InvalidContent(format!("not valid JSON: {e}")))?;

    let raw_list = match value {
        serde_json::Value::Array(items) => items,
        serde_json::Value::Object(mut map) => match map.remove("questions") {
            Some(serde_json::Value::Array(items)) => items,
            _ => {
                return Err(GenerateError::InvalidContent(
                    "missing questions array".to_string(),
                ))
            }
        },
        _ => {
            return Err(GenerateError::InvalidContent(
                "expected an object or array".to_string(),
            ))
        }
    };

    let mut seen = std::collections::HashSet::new();
    let mut questions = Vec::new();
    for item in raw_list {
        let Ok(raw) = serde_json::from_value::<RawQuestion>(item) else {
            continue;
        };
        if raw.options.len() != 4 {
            continue;
        }
        let Some(answer) = answer_letter(&raw.answer) else {
            continue;
        };
        let text = raw.question.trim().to_string();
        if text.is_empty() || !seen.insert(text.to_lowercase()) {
            continue;
        }
        let options = raw
            .options
            .iter()
            .enumerate()
            .map(|(i, opt)| normalize_option(i, opt))
            .collect();
        questions.push(Question {
            question: text,
            options,
            answer: answer.to_string(),
            explanation: raw.explanation.trim().to_string(),
        });
    }

    if questions.len() < expected {
        return Err(GenerateError::InvalidContent(format!(
            "needed {expected} valid questions, got {}",
            questions.len()
        )));
    }
    questions.truncate(expected);
    Ok(questions)
}

/// Pull the answer letter out of strings like "A", "a)", or "Answer: C".
fn answer_letter(answer: &str) -> Option<char> {
    let trimmed = answer.trim();
    let lower = trimmed.to_ascii_lowercase();
    let tail = match lower.strip_prefix("answer") {
        Some(rest) => trimmed[trimmed.len() - rest.len()..].trim_start_matches([':', '-', ' ']),
        None => trimmed,
    };
    let first = tail.chars().next()?.to_ascii_uppercase();
    ('A'..='D').contains(&first).then_some(first)
}

/// Ensure options carry an "A) " style letter prefix.
fn normalize_option(index: usize, option: &str) -> String {
    let letter = (b'A' + index as u8) as char;
    let trimmed = option.trim();
    let has_prefix = trimmed
        .chars()
        .next()
        .is_some_and(|c| c.to_ascii_uppercase() == letter)
        && trimmed[1..].trim_start().starts_with([')', '.', ':']);
    if has_prefix {
        trimmed.to_string()
    } else {
        format!("{letter}) {trimmed}")
    }
}
