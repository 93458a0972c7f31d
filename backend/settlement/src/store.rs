//! # Storage
//!
//! Seams between the engine and whatever persists polls and users.
//!
//! ## Contract
//!
//! - Every read returns the currently persisted value, nothing is cached
//! - `save_*` overwrites the whole document
//! - `commit_wager`/`commit_payout` write the poll and the user together or not at all
//!
//! Implementations: [`crate::memory::MemoryStore`] here, `RedisStore` in the server crate.
use std::future::Future;

use chrono::{DateTime, Utc};

use crate::{
    error::StoreError,
    models::{Poll, PollId, User, UserId},
};

pub trait UserStore: Send + Sync {
    fn find_user(
        &self,
        user_id: UserId,
    ) -> impl Future<Output = Result<Option<User>, StoreError>> + Send;

    fn find_user_by_email(
        &self,
        email: &str,
    ) -> impl Future<Output = Result<Option<User>, StoreError>> + Send;

    fn save_user(&self, user: &User) -> impl Future<Output = Result<(), StoreError>> + Send;
}

pub trait PollStore: Send + Sync {
    fn next_poll_id(&self) -> impl Future<Output = Result<PollId, StoreError>> + Send;

    fn find_poll(
        &self,
        poll_id: PollId,
    ) -> impl Future<Output = Result<Option<Poll>, StoreError>> + Send;

    fn save_poll(&self, poll: &Poll) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Returns whether a poll was removed.
    fn delete_poll(&self, poll_id: PollId)
    -> impl Future<Output = Result<bool, StoreError>> + Send;

    fn polls_ending_after(
        &self,
        now: DateTime<Utc>,
    ) -> impl Future<Output = Result<Vec<Poll>, StoreError>> + Send;

    fn all_polls(&self) -> impl Future<Output = Result<Vec<Poll>, StoreError>> + Send;
}

pub trait Store: UserStore + PollStore {
    /// Persists a poll carrying a new wager along with the debited voter.
    fn commit_wager(
        &self,
        poll: &Poll,
        user: &User,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Persists a credited winner along with the poll marking them paid.
    fn commit_payout(
        &self,
        poll: &Poll,
        user: &User,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;
}
