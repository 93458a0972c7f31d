//! # Resolution Calculator
//!
//! Pari-mutuel payout once a closed poll gets its winning option.
//!
//! ## Payout
//!
//! - `winner_pool`: pool of the winning option
//! - `loser_pool`: every other pool combined
//! - `loser_pool == 0`: each winner gets exactly their stake back
//! - otherwise each winner gets `round(stake + stake / winner_pool * loser_pool)`
//!
//! Rounding is half-up and done in integers, so the result never depends on
//! float precision. Independent rounding may leave up to half a point per
//! winner unaccounted for (or overpaid); that is accepted.
//!
//! Losers get nothing, their stakes stay spent.
//!
//! ## Retries
//!
//! Every pending credit is checked to fit the winner's balance before
//! anything is written. The winning option is persisted next, then each credit is committed
//! together with a paid marker for that winner. A failed resolution can be
//! retried with the same option and only unpaid winners are credited. The
//! poll is marked resolved last.
use std::collections::BTreeMap;

use tracing::{info, warn};

use crate::{
    engine::PollEngine,
    error::SettlementError,
    models::{OptionId, Payout, Points, PollId, Resolution, UserId},
    pools::split_pools,
    store::Store,
};

pub const BETS_RETURNED: &str = "Poll resolved - no losers, bets returned";
pub const WINNERS_REWARDED: &str = "Poll resolved successfully. Winners rewarded!";

/// Stake plus the proportional cut of `loser_pool`, rounded half-up.
pub fn payout(
    stake: Points,
    winner_pool: Points,
    loser_pool: Points,
) -> Result<Points, SettlementError> {
    if loser_pool == 0 || winner_pool == 0 {
        return Ok(stake);
    }

    let scaled = u128::from(stake) * u128::from(loser_pool);
    let winner_pool = u128::from(winner_pool);
    let mut share = scaled / winner_pool;
    // remainder < winner_pool <= u64::MAX, doubling cannot overflow
    if 2 * (scaled % winner_pool) >= winner_pool {
        share += 1;
    }

    Points::try_from(u128::from(stake) + share).map_err(|_| SettlementError::PointsOverflow)
}

/// Payouts for every wager on the winning option, in user id order.
pub fn payouts(
    winning_wagers: &BTreeMap<UserId, Points>,
    winner_pool: Points,
    loser_pool: Points,
) -> Result<Vec<Payout>, SettlementError> {
    winning_wagers
        .iter()
        .map(|(&user_id, &stake)| {
            Ok(Payout {
                user_id,
                stake,
                amount: payout(stake, winner_pool, loser_pool)?,
            })
        })
        .collect()
}

impl<S: Store> PollEngine<S> {
    pub async fn resolve_poll(
        &self,
        poll_id: PollId,
        winning_option_id: OptionId,
    ) -> Result<Resolution, SettlementError> {
        let _poll_guard = self.poll_locks.lock(poll_id).await;

        let mut poll = self
            .store
            .find_poll(poll_id)
            .await?
            .ok_or(SettlementError::PollNotFound)?;

        if !poll.is_expired(self.now()) {
            return Err(SettlementError::PollStillActive);
        }

        let winning_wagers = poll
            .option(winning_option_id)
            .ok_or(SettlementError::InvalidOption)?
            .wagers
            .clone();

        if poll.resolved {
            return Err(SettlementError::AlreadyResolved);
        }

        let resuming = match poll.winning_option_id {
            Some(current) if current != winning_option_id => {
                return Err(SettlementError::ResolutionInProgress(current));
            }
            Some(_) => true,
            None => false,
        };

        let (winner_pool, loser_pool) = split_pools(&poll, winning_option_id)?;
        let payouts = payouts(&winning_wagers, winner_pool, loser_pool)?;

        for payout in payouts.iter().filter(|payout| !poll.paid.contains(&payout.user_id)) {
            if let Some(user) = self.store.find_user(payout.user_id).await? {
                if user.points.checked_add(payout.amount).is_none() {
                    warn!(
                        "Crediting {} to user {} would overflow, poll {poll_id} left unresolved",
                        payout.amount, payout.user_id
                    );
                    return Err(SettlementError::PointsOverflow);
                }
            }
        }

        if resuming {
            info!("Resuming resolution of poll {poll_id}");
        } else {
            poll.winning_option_id = Some(winning_option_id);
            self.store.save_poll(&poll).await?;
        }

        info!(
            "Resolving poll {poll_id} with option {winning_option_id}: winner pool {winner_pool}, loser pool {loser_pool}"
        );

        for payout in &payouts {
            if poll.paid.contains(&payout.user_id) {
                continue;
            }

            let _user_guard = self.user_locks.lock(payout.user_id).await;
            poll.paid.insert(payout.user_id);

            let Some(mut user) = self.store.find_user(payout.user_id).await? else {
                warn!(
                    "Winner {} of poll {poll_id} not found, skipping payout of {}",
                    payout.user_id, payout.amount
                );
                self.store.save_poll(&poll).await?;
                continue;
            };

            user.points = user
                .points
                .checked_add(payout.amount)
                .ok_or(SettlementError::PointsOverflow)?;
            self.store.commit_payout(&poll, &user).await?;

            info!(
                "User {} staked {} on poll {poll_id}, awarded {}",
                payout.user_id, payout.stake, payout.amount
            );
        }

        poll.resolved = true;
        poll.paid.clear();
        self.store.save_poll(&poll).await?;
        info!("Poll {poll_id} marked as resolved");

        let message = if loser_pool == 0 {
            BETS_RETURNED
        } else {
            WINNERS_REWARDED
        };

        Ok(Resolution {
            poll_id,
            winning_option_id,
            winner_pool,
            loser_pool,
            payouts,
            message: message.to_string(),
        })
    }
}
