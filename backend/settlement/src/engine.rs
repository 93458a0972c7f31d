use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::{
    clock::{Clock, SystemClock},
    error::SettlementError,
    locks::KeyedLocks,
    models::{PollId, User, UserId},
    store::Store,
};

/// Entry point of the settlement core. Operations are split by concern:
/// [`crate::ledger`] for wagers, [`crate::resolution`] for payouts,
/// [`crate::polls`] for administration and reads.
///
/// Every mutation of a poll runs under that poll's lock, and every balance
/// change additionally under the user's lock, always in poll → user order.
pub struct PollEngine<S> {
    pub(crate) store: S,
    pub(crate) clock: Arc<dyn Clock>,
    pub(crate) poll_locks: KeyedLocks<PollId>,
    pub(crate) user_locks: KeyedLocks<UserId>,
}

impl<S: Store> PollEngine<S> {
    pub fn new(store: S) -> Self {
        Self::with_clock(store, Arc::new(SystemClock))
    }

    pub fn with_clock(store: S, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            clock,
            poll_locks: KeyedLocks::default(),
            user_locks: KeyedLocks::default(),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    pub async fn user(&self, user_id: UserId) -> Result<Option<User>, SettlementError> {
        Ok(self.store.find_user(user_id).await?)
    }

    pub async fn user_by_email(&self, email: &str) -> Result<Option<User>, SettlementError> {
        Ok(self.store.find_user_by_email(email).await?)
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use std::sync::Arc;

    use chrono::{DateTime, Duration, TimeZone, Utc};

    use super::PollEngine;
    use crate::{
        clock::ManualClock,
        memory::MemoryStore,
        models::{Poll, PollDraft, Role, User, UserId},
        store::UserStore,
    };

    pub fn start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap()
    }

    pub fn member(id: u64, points: u64) -> User {
        User {
            id: UserId(id),
            name: format!("member {id}"),
            email: format!("member{id}@campus.edu"),
            role: Role::Member,
            points,
        }
    }

    pub fn admin(id: u64) -> User {
        User {
            id: UserId(id),
            name: format!("admin {id}"),
            email: format!("admin{id}@campus.edu"),
            role: Role::Admin,
            points: 0,
        }
    }

    pub fn engine(users: Vec<User>) -> (PollEngine<MemoryStore>, ManualClock) {
        let clock = ManualClock::new(start());
        let engine = PollEngine::with_clock(MemoryStore::with_users(users), Arc::new(clock.clone()));

        (engine, clock)
    }

    /// Open for one day from [`start`].
    pub fn draft(title: &str, options: &[&str]) -> PollDraft {
        PollDraft {
            title: title.to_string(),
            description: None,
            opens_at: None,
            closes_at: Some(start() + Duration::days(1)),
            options: options.iter().map(|text| text.to_string()).collect(),
        }
    }

    pub async fn rain_poll(engine: &PollEngine<MemoryStore>) -> Poll {
        engine
            .create_poll(UserId(1), draft("Will it rain", &["A", "B"]))
            .await
            .unwrap()
    }

    pub async fn points(engine: &PollEngine<MemoryStore>, id: u64) -> u64 {
        engine
            .store()
            .find_user(UserId(id))
            .await
            .unwrap()
            .unwrap()
            .points
    }
}
