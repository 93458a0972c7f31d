//! # Redis
//!
//! RAM database.
//!
//! Holds every poll and user document. The engine re-reads from here on each operation,
//! nothing is cached in the process.
//!
//! ## Layout
//!
//! - `polls`: hash, poll id to poll JSON (options, pools and wagers included)
//! - `users`: hash, user id to user JSON (balance included)
//! - `user_emails`: hash, normalized email to user id, the old entry is dropped when a user's
//! email changes
//! - `poll_id_counter`: plain integer, `INCR` hands out poll ids
//!
//! ## Atomicity
//!
//! - A wager or payout touches one poll and one user
//! - Both documents are written in a single `MULTI`/`EXEC` pipeline
//! - Read-modify-write races are prevented by the engine's poll/user locks, so a single
//! backend instance is assumed to be the only writer
use std::{path::Path, time::Duration};

use anyhow::Context;
use chrono::{DateTime, Utc};
use redis::{
    AsyncCommands, Client, RedisError,
    aio::{ConnectionManager, ConnectionManagerConfig},
};
use serde::{Serialize, de::DeserializeOwned};
use settlement::{
    Poll, PollId, PollStore, Store, StoreError, User, UserId, UserStore, utils::normalize_email,
};
use tracing::info;

const POLLS_KEY: &str = "polls";
const USERS_KEY: &str = "users";
const USER_EMAILS_KEY: &str = "user_emails";
const POLL_ID_KEY: &str = "poll_id_counter";

pub async fn init_redis(redis_url: &str) -> Result<ConnectionManager, RedisError> {
    let config = ConnectionManagerConfig::new()
        .set_number_of_retries(1)
        .set_connection_timeout(Duration::from_millis(100));

    let client = Client::open(redis_url)?;
    client.get_connection_manager_with_config(config).await
}

#[derive(Clone)]
pub struct RedisStore {
    connection: ConnectionManager,
}

impl RedisStore {
    pub fn new(connection: ConnectionManager) -> Self {
        Self { connection }
    }

    fn connection(&self) -> ConnectionManager {
        self.connection.clone()
    }

    async fn write_pair(&self, poll: &Poll, user: &User) -> Result<(), StoreError> {
        let poll_json = encode(poll)?;
        let user_json = encode(user)?;

        redis::pipe()
            .atomic()
            .hset(POLLS_KEY, poll.id.0, poll_json)
            .ignore()
            .hset(USERS_KEY, user.id.0, user_json)
            .ignore()
            .query_async::<()>(&mut self.connection())
            .await
            .map_err(StoreError::backend)
    }
}

fn encode<T: Serialize>(value: &T) -> Result<String, StoreError> {
    serde_json::to_string(value).map_err(StoreError::backend)
}

fn decode<T: DeserializeOwned>(key: String, json: &str) -> Result<T, StoreError> {
    serde_json::from_str(json).map_err(|e| StoreError::Corrupt {
        key,
        reason: e.to_string(),
    })
}

/// Lookup key the user was indexed under before this save, when it differs
/// from the new one.
fn stale_email_key(previous: Option<&User>, user: &User) -> Option<String> {
    previous
        .map(|previous| normalize_email(&previous.email))
        .filter(|key| *key != normalize_email(&user.email))
}

impl UserStore for RedisStore {
    async fn find_user(&self, user_id: UserId) -> Result<Option<User>, StoreError> {
        let json: Option<String> = self
            .connection()
            .hget(USERS_KEY, user_id.0)
            .await
            .map_err(StoreError::backend)?;

        json.map(|json| decode(format!("{USERS_KEY}:{user_id}"), &json))
            .transpose()
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let user_id: Option<u64> = self
            .connection()
            .hget(USER_EMAILS_KEY, normalize_email(email))
            .await
            .map_err(StoreError::backend)?;

        match user_id {
            Some(user_id) => self.find_user(UserId(user_id)).await,
            None => Ok(None),
        }
    }

    async fn save_user(&self, user: &User) -> Result<(), StoreError> {
        let user_json = encode(user)?;
        let previous = self.find_user(user.id).await?;

        let mut pipe = redis::pipe();
        pipe.atomic();

        if let Some(stale) = stale_email_key(previous.as_ref(), user) {
            let owner: Option<u64> = self
                .connection()
                .hget(USER_EMAILS_KEY, &stale)
                .await
                .map_err(StoreError::backend)?;

            if owner == Some(user.id.0) {
                pipe.hdel(USER_EMAILS_KEY, stale).ignore();
            }
        }

        pipe.hset(USERS_KEY, user.id.0, user_json)
            .ignore()
            .hset(USER_EMAILS_KEY, normalize_email(&user.email), user.id.0)
            .ignore()
            .query_async::<()>(&mut self.connection())
            .await
            .map_err(StoreError::backend)
    }
}

impl PollStore for RedisStore {
    async fn next_poll_id(&self) -> Result<PollId, StoreError> {
        let id: u64 = self
            .connection()
            .incr(POLL_ID_KEY, 1)
            .await
            .map_err(StoreError::backend)?;

        Ok(PollId(id))
    }

    async fn find_poll(&self, poll_id: PollId) -> Result<Option<Poll>, StoreError> {
        let json: Option<String> = self
            .connection()
            .hget(POLLS_KEY, poll_id.0)
            .await
            .map_err(StoreError::backend)?;

        json.map(|json| decode(format!("{POLLS_KEY}:{poll_id}"), &json))
            .transpose()
    }

    async fn save_poll(&self, poll: &Poll) -> Result<(), StoreError> {
        let poll_json = encode(poll)?;

        self.connection()
            .hset::<_, _, _, ()>(POLLS_KEY, poll.id.0, poll_json)
            .await
            .map_err(StoreError::backend)
    }

    async fn delete_poll(&self, poll_id: PollId) -> Result<bool, StoreError> {
        let removed: u64 = self
            .connection()
            .hdel(POLLS_KEY, poll_id.0)
            .await
            .map_err(StoreError::backend)?;

        Ok(removed > 0)
    }

    async fn polls_ending_after(&self, now: DateTime<Utc>) -> Result<Vec<Poll>, StoreError> {
        Ok(self
            .all_polls()
            .await?
            .into_iter()
            .filter(|poll| poll.closes_at > now)
            .collect())
    }

    async fn all_polls(&self) -> Result<Vec<Poll>, StoreError> {
        let documents: Vec<String> = self
            .connection()
            .hvals(POLLS_KEY)
            .await
            .map_err(StoreError::backend)?;

        let mut polls = documents
            .iter()
            .map(|json| decode::<Poll>(POLLS_KEY.to_string(), json))
            .collect::<Result<Vec<_>, _>>()?;
        polls.sort_by_key(|poll| poll.id);

        Ok(polls)
    }
}

impl Store for RedisStore {
    async fn commit_wager(&self, poll: &Poll, user: &User) -> Result<(), StoreError> {
        self.write_pair(poll, user).await
    }

    async fn commit_payout(&self, poll: &Poll, user: &User) -> Result<(), StoreError> {
        self.write_pair(poll, user).await
    }
}

/// Creates the users listed in a JSON seed file. Users that already exist keep
/// their current balance, only name, email and role are refreshed.
pub async fn seed_users(store: &RedisStore, path: &Path) -> anyhow::Result<usize> {
    let raw = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read seed file {}", path.display()))?;
    let users: Vec<User> = serde_json::from_str(&raw)
        .with_context(|| format!("Failed to parse seed file {}", path.display()))?;

    for mut user in users.iter().cloned() {
        if let Some(existing) = store.find_user(user.id).await? {
            user.points = existing.points;
        }
        store.save_user(&user).await?;
    }

    info!("Seeded {} users from {}", users.len(), path.display());

    Ok(users.len())
}
