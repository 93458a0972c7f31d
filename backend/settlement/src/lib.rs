//! # Settlement
//!
//! Point wagering on time-boxed polls, storage and transport agnostic.
//!
//!
//!
//! ## Flow
//!
//! - Admin creates a poll with at least two options, open until its closing time
//! - Users wager points on exactly one option, points leave their balance right away
//! - Each option keeps a **pool**: the sum of everything wagered on it
//! - After closing, an admin picks the winning option
//! - Winners get their stake back plus a share of the losing pools proportional to their stake
//! - Losers get nothing
//!
//!
//!
//! ## Components
//!
//! - [`ledger`]: one wager per user per poll, balance checks, debit
//! - [`pools`]: pool invariants and percentage results
//! - [`resolution`]: payout math and crediting winners
//! - [`polls`]: create/update/delete and read accessors
//!
//! All of them are methods on [`PollEngine`], generic over a [`Store`].
//!
//!
//!
//! ## Example
//!
//! Poll "Will it rain" with options A and B.
//! - U (100 points) wagers 30 on A: A.pool = 30, U = 70
//! - V (50 points) wagers 20 on B: B.pool = 20, V = 30
//! - Poll closes, A wins: winner pool 30, loser pool 20
//! - U gets 30 + 30/30 * 20 = 50, ends with 120
//! - V stays at 30
//!
//!
//!
//! ## Notes
//!
//! Authorization is **not** checked here. Whoever calls [`PollEngine::create_poll`],
//! [`PollEngine::resolve_poll`] or [`PollEngine::delete_poll`] has already decided the
//! caller may do so.
pub mod clock;
pub mod engine;
pub mod error;
pub mod ledger;
pub mod locks;
pub mod memory;
pub mod models;
pub mod polls;
pub mod pools;
pub mod resolution;
pub mod store;
pub mod utils;

pub use engine::PollEngine;
pub use error::{ErrorKind, SettlementError, StoreError};
pub use memory::MemoryStore;
pub use models::{
    OptionId, Payout, Points, Poll, PollDraft, PollId, PollOption, PollUpdate, Receipt,
    Resolution, Role, User, UserId,
};
pub use store::{PollStore, Store, UserStore};
