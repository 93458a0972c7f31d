//! # Pool Accountant
//!
//! Pools are not stored separately, they live on each option and only the
//! ledger grows them. For every option:
//!
//! - `pool == sum(wagers)`
//! - the voter set is exactly the set of users holding a wager on it
//!
//! Results are shares of the total **wagered amount**, not of voter counts.
use std::collections::BTreeMap;

use crate::{
    engine::PollEngine,
    error::SettlementError,
    models::{OptionId, Points, Poll, PollId, UserId},
    store::Store,
};

/// Option text to percentage of all points wagered on the poll. Empty when
/// nothing has been wagered yet.
pub fn percentages(poll: &Poll) -> Result<BTreeMap<String, f64>, SettlementError> {
    let total = poll.total_pool()?;
    if total == 0 {
        return Ok(BTreeMap::new());
    }

    Ok(poll
        .options
        .iter()
        .map(|option| {
            (
                option.text.clone(),
                option.pool as f64 * 100.0 / total as f64,
            )
        })
        .collect())
}

/// `(winner_pool, loser_pool)` for the given winning option.
pub fn split_pools(
    poll: &Poll,
    winning_option_id: OptionId,
) -> Result<(Points, Points), SettlementError> {
    poll.options
        .iter()
        .try_fold((0 as Points, 0 as Points), |(winner, loser), option| {
            if option.id == winning_option_id {
                Some((winner.checked_add(option.pool)?, loser))
            } else {
                Some((winner, loser.checked_add(option.pool)?))
            }
        })
        .ok_or(SettlementError::PointsOverflow)
}

pub fn voted_options(poll: &Poll, user_id: UserId) -> Vec<OptionId> {
    poll.options
        .iter()
        .filter(|option| option.has_voter(user_id))
        .map(|option| option.id)
        .collect()
}

pub fn check_invariants(poll: &Poll) -> bool {
    poll.options
        .iter()
        .all(|option| option.pool == option.wagers.values().sum::<Points>())
        && poll
            .options
            .iter()
            .flat_map(|option| option.voters())
            .all(|user_id| voted_options(poll, user_id).len() == 1)
}

impl<S: Store> PollEngine<S> {
    /// Empty for unknown polls as well as polls without wagers.
    pub async fn results(&self, poll_id: PollId) -> Result<BTreeMap<String, f64>, SettlementError> {
        match self.store.find_poll(poll_id).await? {
            Some(poll) => percentages(&poll),
            None => Ok(BTreeMap::new()),
        }
    }
}
