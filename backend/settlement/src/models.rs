use std::{
    collections::{BTreeMap, BTreeSet},
    fmt,
};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::SettlementError;

pub type Points = u64;

macro_rules! id_type {
    ($name:ident) => {
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(pub u64);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

id_type!(PollId);
id_type!(OptionId);
id_type!(UserId);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    Admin,
    Member,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: UserId,
    pub name: String,
    pub email: String,
    pub role: Role,
    pub points: Points,
}

impl User {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

/// One choice of a poll. The keys of `wagers` are the voter set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PollOption {
    pub id: OptionId,
    pub text: String,
    pub pool: Points,
    #[serde(default)]
    pub wagers: BTreeMap<UserId, Points>,
}

impl PollOption {
    pub fn new(id: OptionId, text: String) -> Self {
        Self {
            id,
            text,
            pool: 0,
            wagers: BTreeMap::new(),
        }
    }

    pub fn voters(&self) -> impl Iterator<Item = UserId> + '_ {
        self.wagers.keys().copied()
    }

    pub fn has_voter(&self, user_id: UserId) -> bool {
        self.wagers.contains_key(&user_id)
    }

    /// Adds `amount` to the pool and records the voter. Recording a voter that
    /// is already present leaves the option untouched and returns `false`.
    pub fn record_wager(&mut self, user_id: UserId, amount: Points) -> Result<bool, SettlementError> {
        if self.has_voter(user_id) {
            return Ok(false);
        }

        self.pool = self
            .pool
            .checked_add(amount)
            .ok_or(SettlementError::PointsOverflow)?;
        self.wagers.insert(user_id, amount);

        Ok(true)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Poll {
    pub id: PollId,
    pub title: String,
    pub description: String,
    pub opens_at: DateTime<Utc>,
    pub closes_at: DateTime<Utc>,
    pub options: Vec<PollOption>,
    pub creator_id: UserId,
    pub winning_option_id: Option<OptionId>,
    pub resolved: bool,
    /// Winners already credited by an unfinished resolution.
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub paid: BTreeSet<UserId>,
}

impl Poll {
    /// Still open at exactly `closes_at`.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.closes_at
    }

    /// A resolution picked a winner but has not finished paying out.
    pub fn is_settling(&self) -> bool {
        !self.resolved && self.winning_option_id.is_some()
    }

    pub fn option(&self, option_id: OptionId) -> Option<&PollOption> {
        self.options.iter().find(|option| option.id == option_id)
    }

    pub fn option_mut(&mut self, option_id: OptionId) -> Option<&mut PollOption> {
        self.options.iter_mut().find(|option| option.id == option_id)
    }

    pub fn wager_of(&self, user_id: UserId) -> Option<(OptionId, Points)> {
        self.options.iter().find_map(|option| {
            option
                .wagers
                .get(&user_id)
                .map(|&amount| (option.id, amount))
        })
    }

    /// Sum of every option's pool. The ledger refuses wagers that would push
    /// this past [`Points::MAX`], so an error here means a corrupt document.
    pub fn total_pool(&self) -> Result<Points, SettlementError> {
        self.options
            .iter()
            .try_fold(0 as Points, |total, option| total.checked_add(option.pool))
            .ok_or(SettlementError::PointsOverflow)
    }
}

/// Creation request. Missing times default to now and a week later.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PollDraft {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub opens_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub closes_at: Option<DateTime<Utc>>,
    pub options: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PollUpdate {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub closes_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Receipt {
    pub poll_id: PollId,
    pub option_id: OptionId,
    pub amount: Points,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Payout {
    pub user_id: UserId,
    pub stake: Points,
    pub amount: Points,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Resolution {
    pub poll_id: PollId,
    pub winning_option_id: OptionId,
    pub winner_pool: Points,
    pub loser_pool: Points,
    pub payouts: Vec<Payout>,
    pub message: String,
}
