//! In-memory [`ProgressStore`] used by tests and as the reference
//! implementation of the transactional contract.

use super::{ProgressStore, StoreError, UserState};
use crate::model::UserId;
use std::collections::HashMap;
use std::sync::Mutex;

/// Mutex-guarded map of user states. Transactions are copy-on-write: the
/// closure runs against a working copy, and the copy replaces the stored
/// state only when the closure succeeds.
#[derive(Default)]
pub struct MemoryStore {
    users: Mutex<HashMap<UserId, UserState>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ProgressStore for MemoryStore {
    fn with_user<R>(
        &self,
        user_id: &UserId,
        f: &mut dyn FnMut(&mut UserState) -> Result<R, StoreError>,
    ) -> Result<R, StoreError> {
        let mut users = self
            .users
            .lock()
            .map_err(|_| StoreError::Unavailable("store lock poisoned".to_string()))?;

        let mut working = users
            .get(user_id)
            .cloned()
            .unwrap_or_else(|| UserState::new(user_id.clone()));

        let result = f(&mut working)?;
        users.insert(user_id.clone(), working);
        Ok(result)
    }

    fn snapshot(&self, user_id: &UserId) -> Result<Option<UserState>, StoreError> {
        let users = self
            .users
            .lock()
            .map_err(|_| StoreError::Unavailable("store lock poisoned".to_string()))?;
        Ok(users.get(user_id).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_creates_state_on_first_use() {
        let store = MemoryStore::new();
        let user = UserId::from("new-user");

        let level = store
            .with_user(&user, &mut |state| Ok(state.account.level))
            .unwrap();

        assert_eq!(level, 1);
        assert!(store.snapshot(&user).unwrap().is_some());
    }

    #[test]
    fn test_mutations_visible_after_ok() {
        let store = MemoryStore::new();
        let user = UserId::from("u1");

        store
            .with_user(&user, &mut |state| {
                state.account.total_xp = 250;
                Ok(())
            })
            .unwrap();

        let state = store.snapshot(&user).unwrap().unwrap();
        assert_eq!(state.account.total_xp, 250);
    }

    #[test]
    fn test_failed_transaction_discards_all_changes() {
        let store = MemoryStore::new();
        let user = UserId::from("u1");

        store
            .with_user(&user, &mut |state| {
                state.account.total_xp = 100;
                Ok(())
            })
            .unwrap();

        let result: Result<(), _> = store.with_user(&user, &mut |state| {
            state.account.total_xp = 9999;
            state.attempts.clear();
            Err(StoreError::Unavailable("mid-commit failure".to_string()))
        });

        assert!(result.is_err());
        let state = store.snapshot(&user).unwrap().unwrap();
        assert_eq!(state.account.total_xp, 100);
    }

    #[test]
    fn test_snapshot_missing_user() {
        let store = MemoryStore::new();
        assert!(store.snapshot(&UserId::from("nobody")).unwrap().is_none());
    }
}
