use std::{
    collections::{BTreeMap, HashMap},
    sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard},
};

use chrono::{DateTime, Utc};

use crate::{
    error::StoreError,
    models::{Poll, PollId, User, UserId},
    store::{PollStore, Store, UserStore},
    utils::normalize_email,
};

/// Process-local store. Each commit takes one write lock, so poll and user
/// land together.
#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

#[derive(Default)]
struct Inner {
    polls: BTreeMap<PollId, Poll>,
    users: HashMap<UserId, User>,
    last_poll_id: u64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_users(users: impl IntoIterator<Item = User>) -> Self {
        let store = Self::new();
        {
            let mut inner = store.write();
            for user in users {
                inner.users.insert(user.id, user);
            }
        }

        store
    }

    fn read(&self) -> RwLockReadGuard<'_, Inner> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Inner> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn commit(&self, poll: &Poll, user: &User) {
        let mut inner = self.write();
        inner.polls.insert(poll.id, poll.clone());
        inner.users.insert(user.id, user.clone());
    }
}

impl UserStore for MemoryStore {
    async fn find_user(&self, user_id: UserId) -> Result<Option<User>, StoreError> {
        Ok(self.read().users.get(&user_id).cloned())
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let key = normalize_email(email);

        Ok(self
            .read()
            .users
            .values()
            .find(|user| normalize_email(&user.email) == key)
            .cloned())
    }

    async fn save_user(&self, user: &User) -> Result<(), StoreError> {
        self.write().users.insert(user.id, user.clone());

        Ok(())
    }
}

impl PollStore for MemoryStore {
    async fn next_poll_id(&self) -> Result<PollId, StoreError> {
        let mut inner = self.write();
        inner.last_poll_id += 1;

        Ok(PollId(inner.last_poll_id))
    }

    async fn find_poll(&self, poll_id: PollId) -> Result<Option<Poll>, StoreError> {
        Ok(self.read().polls.get(&poll_id).cloned())
    }

    async fn save_poll(&self, poll: &Poll) -> Result<(), StoreError> {
        self.write().polls.insert(poll.id, poll.clone());

        Ok(())
    }

    async fn delete_poll(&self, poll_id: PollId) -> Result<bool, StoreError> {
        Ok(self.write().polls.remove(&poll_id).is_some())
    }

    async fn polls_ending_after(&self, now: DateTime<Utc>) -> Result<Vec<Poll>, StoreError> {
        Ok(self
            .read()
            .polls
            .values()
            .filter(|poll| poll.closes_at > now)
            .cloned()
            .collect())
    }

    async fn all_polls(&self) -> Result<Vec<Poll>, StoreError> {
        Ok(self.read().polls.values().cloned().collect())
    }
}

impl Store for MemoryStore {
    async fn commit_wager(&self, poll: &Poll, user: &User) -> Result<(), StoreError> {
        self.commit(poll, user);

        Ok(())
    }

    async fn commit_payout(&self, poll: &Poll, user: &User) -> Result<(), StoreError> {
        self.commit(poll, user);

        Ok(())
    }
}
