//! StudyQuest's adaptive progression and recommendation engine.
//!
//! The engine turns graded quiz results into XP, levels, per-topic mastery,
//! and achievements; chooses the next quiz difficulty from recent
//! performance; and ranks what a learner should study next. Generation of
//! quiz content and recommendation narratives is delegated to an LLM behind
//! the [`openrouter`] client crate, with caching and model fallback.
//!
//! The usual entry point is [`engine::Engine`], which wires everything
//! together over a [`store::ProgressStore`] implementation:
//!
//! ```no_run
//! use std::sync::Arc;
//! use studyquest_core::engine::{Engine, EngineConfig, QuizSubmission};
//! use studyquest_core::model::{Difficulty, UserId};
//! use studyquest_core::store::MemoryStore;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let engine = Engine::new(Arc::new(MemoryStore::new()), EngineConfig::default());
//! let result = engine.submit_quiz(QuizSubmission {
//!     user_id: UserId::from("learner-1"),
//!     topic: "Rust".to_string(),
//!     difficulty: Difficulty::Medium,
//!     correct: 17,
//!     total: 20,
//! })?;
//! println!("earned {} XP, now level {}", result.xp_gained, result.new_level);
//! # Ok(())
//! # }
//! ```

pub mod achievements;
pub mod adaptive;
pub mod cache;
pub mod engine;
pub mod generate;
pub mod ledger;
pub mod model;
pub mod recommend;
pub mod store;
pub mod testing;
pub mod validation;

pub use engine::{Engine, EngineConfig, EngineError};
pub use model::{Difficulty, TopicStatus, UserId};
pub use store::{MemoryStore, ProgressStore};
