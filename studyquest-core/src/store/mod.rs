//! Storage seam for user progress.
//!
//! The engine never touches storage directly; everything goes through
//! [`ProgressStore`], which provides serialized per-user transactions. The
//! in-memory reference implementation lives in [`memory`]; a relational
//! adapter can implement the same trait without touching the engine.

use crate::model::{QuizAttempt, UserAccount, UserBadge, UserId, UserMilestone, TopicProgress, XpEvent};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

mod memory;

pub use memory::MemoryStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Storage unavailable: {0}")]
    Unavailable(String),

    #[error("Storage constraint violated: {0}")]
    Constraint(String),
}

/// Everything the engine persists for one user. This is the logical row
/// layout: account totals, per-topic progress keyed by topic name, the
/// append-only attempt and XP histories, and achievement unlock rows keyed
/// by definition key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserState {
    pub account: UserAccount,
    pub topics: HashMap<String, TopicProgress>,
    pub attempts: Vec<QuizAttempt>,
    pub xp_events: Vec<XpEvent>,
    pub badges: HashMap<String, UserBadge>,
    pub milestones: HashMap<String, UserMilestone>,
}

impl UserState {
    /// Fresh state for a user seen for the first time.
    pub fn new(user_id: UserId) -> Self {
        Self {
            account: UserAccount::new(user_id),
            topics: HashMap::new(),
            attempts: Vec::new(),
            xp_events: Vec::new(),
            badges: HashMap::new(),
            milestones: HashMap::new(),
        }
    }
}

/// Per-user transactional access to progress state.
///
/// `with_user` runs `f` with exclusive access to one user's state, creating
/// the state on first use. Mutations become visible to other callers only if
/// `f` returns `Ok`; on `Err` every change made inside the closure is
/// discarded. Readers never observe a partially applied commit.
pub trait ProgressStore: Send + Sync {
    fn with_user<R>(
        &self,
        user_id: &UserId,
        f: &mut dyn FnMut(&mut UserState) -> Result<R, StoreError>,
    ) -> Result<R, StoreError>;

    /// Read-only snapshot of one user's state, if any exists.
    fn snapshot(&self, user_id: &UserId) -> Result<Option<UserState>, StoreError>;
}
