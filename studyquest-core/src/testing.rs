//! Test doubles used by unit and integration tests.
//!
//! [`MockGenerator`] scripts generation without touching the network;
//! [`FailingStore`] injects storage failures to exercise error paths.

use crate::generate::{ContentGenerator, GenerateError, GeneratedQuiz, Narrative, Question};
use crate::model::{Difficulty, UserId};
use crate::recommend::{OverallStats, Recommendation};
use crate::store::{ProgressStore, StoreError, UserState};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

/// Scripted [`ContentGenerator`]. Queued responses are returned in order;
/// once the queue is empty a deterministic sample is synthesized.
#[derive(Default)]
pub struct MockGenerator {
    quizzes: Mutex<VecDeque<GeneratedQuiz>>,
    narratives: Mutex<VecDeque<Narrative>>,
    failing: AtomicBool,
    quiz_calls: AtomicUsize,
}

impl MockGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn queue_quiz(&self, quiz: GeneratedQuiz) {
        if let Ok(mut quizzes) = self.quizzes.lock() {
            quizzes.push_back(quiz);
        }
    }

    pub fn queue_narrative(&self, narrative: Narrative) {
        if let Ok(mut narratives) = self.narratives.lock() {
            narratives.push_back(narrative);
        }
    }

    /// Make every subsequent call fail, as if all models were down.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn quiz_calls(&self) -> usize {
        self.quiz_calls.load(Ordering::SeqCst)
    }

    /// A valid quiz with `num_questions` placeholder questions.
    pub fn sample_quiz(difficulty: Difficulty, num_questions: usize) -> GeneratedQuiz {
        let questions = (0..num_questions)
            .map(|i| Question {
                question: format!("Sample question {}?", i + 1),
                options: vec![
                    "A) first".to_string(),
                    "B) second".to_string(),
                    "C) third".to_string(),
                    "D) fourth".to_string(),
                ],
                answer: "A".to_string(),
                explanation: "The first option is correct.".to_string(),
            })
            .collect();
        GeneratedQuiz {
            difficulty,
            questions,
            model: "mock/model".to_string(),
            cognitive_level: "sample".to_string(),
            cached: false,
        }
    }

    pub fn sample_narrative() -> Narrative {
        Narrative {
            motivational_message: "You're making steady progress.".to_string(),
            learning_insight: "Your scores improve with repetition.".to_string(),
            priority_advice: "Start with your weakest topic.".to_string(),
        }
    }
}

impl ContentGenerator for MockGenerator {
    async fn generate_quiz(
        &self,
        _notes: &str,
        difficulty: Difficulty,
        num_questions: usize,
    ) -> Result<GeneratedQuiz, GenerateError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(GenerateError::Exhausted("mock failure".to_string()));
        }
        self.quiz_calls.fetch_add(1, Ordering::SeqCst);
        let scripted = self.quizzes.lock().ok().and_then(|mut q| q.pop_front());
        Ok(scripted.unwrap_or_else(|| Self::sample_quiz(difficulty, num_questions)))
    }

    async fn narrate(
        &self,
        _stats: &OverallStats,
        _recommendations: &[Recommendation],
    ) -> Result<Narrative, GenerateError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(GenerateError::Exhausted("mock failure".to_string()));
        }
        let scripted = self.narratives.lock().ok().and_then(|mut n| n.pop_front());
        Ok(scripted.unwrap_or_else(Self::sample_narrative))
    }
}

/// A store where every operation fails.
pub struct FailingStore;

impl ProgressStore for FailingStore {
    fn with_user<R>(
        &self,
        _user_id: &UserId,
        _f: &mut dyn FnMut(&mut UserState) -> Result<R, StoreError>,
    ) -> Result<R, StoreError> {
        Err(StoreError::Unavailable("injected failure".to_string()))
    }

    fn snapshot(&self, _user_id: &UserId) -> Result<Option<UserState>, StoreError> {
        Err(StoreError::Unavailable("injected failure".to_string()))
    }
}
