//! # Vote Ledger
//!
//! Records a user's single wager on a poll and debits their balance.
//!
//! ## Checks
//!
//! In this order, first failure wins:
//! 1. poll exists
//! 2. poll still open (closing time inclusive)
//! 3. amount is positive
//! 4. user exists and holds at least `amount` points
//! 5. option belongs to the poll
//! 6. user has no wager anywhere on this poll
//! 7. the poll's total pool stays within [`Points::MAX`]
//!
//! Nothing is written unless every check passes. The poll (with its updated
//! pool) and the debited user are then committed together.
use tracing::debug;

use crate::{
    engine::PollEngine,
    error::SettlementError,
    models::{OptionId, Points, PollId, Receipt, UserId},
    store::Store,
};

pub const VOTE_REGISTERED: &str = "Vote successfully registered";

impl<S: Store> PollEngine<S> {
    pub async fn place_wager(
        &self,
        poll_id: PollId,
        user_id: UserId,
        option_id: OptionId,
        amount: i64,
    ) -> Result<Receipt, SettlementError> {
        let _poll_guard = self.poll_locks.lock(poll_id).await;

        let mut poll = self
            .store
            .find_poll(poll_id)
            .await?
            .ok_or(SettlementError::PollNotFound)?;

        if poll.is_expired(self.now()) {
            return Err(SettlementError::PollClosed);
        }

        let amount = Points::try_from(amount)
            .ok()
            .filter(|&amount| amount > 0)
            .ok_or(SettlementError::InvalidAmount)?;

        let _user_guard = self.user_locks.lock(user_id).await;

        let mut user = self
            .store
            .find_user(user_id)
            .await?
            .ok_or(SettlementError::UserNotFound)?;

        if user.points < amount {
            return Err(SettlementError::InsufficientFunds);
        }

        if poll.option(option_id).is_none() {
            return Err(SettlementError::OptionNotFound);
        }

        if poll.wager_of(user_id).is_some() {
            return Err(SettlementError::DuplicateVote);
        }

        poll.total_pool()?
            .checked_add(amount)
            .ok_or(SettlementError::PointsOverflow)?;

        let option = poll
            .option_mut(option_id)
            .ok_or(SettlementError::OptionNotFound)?;
        option.record_wager(user_id, amount)?;
        user.points -= amount;

        self.store.commit_wager(&poll, &user).await?;

        debug!(
            "User {user_id} wagered {amount} on option {option_id} of poll {poll_id}, {} left",
            user.points
        );

        Ok(Receipt {
            poll_id,
            option_id,
            amount,
            message: VOTE_REGISTERED.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::Duration;

    use super::*;
    use crate::{
        engine::fixtures::{admin, engine, member, points, rain_poll},
        pools::check_invariants,
    };

    #[tokio::test]
    async fn test_wager_moves_points_into_pool() {
        let (engine, _) = engine(vec![admin(1), member(2, 100)]);
        let poll = rain_poll(&engine).await;

        let receipt = engine
            .place_wager(poll.id, UserId(2), OptionId(1), 30)
            .await
            .unwrap();

        assert_eq!(receipt.message, VOTE_REGISTERED);
        assert_eq!(receipt.amount, 30);
        assert_eq!(points(&engine, 2).await, 70);

        let poll = engine.poll(poll.id).await.unwrap().unwrap();
        let option = poll.option(OptionId(1)).unwrap();
        assert_eq!(option.pool, 30);
        assert!(option.has_voter(UserId(2)));
        assert_eq!(poll.option(OptionId(2)).unwrap().pool, 0);
        assert!(check_invariants(&poll));
    }

    #[tokio::test]
    async fn test_second_wager_rejected() {
        let (engine, _) = engine(vec![admin(1), member(2, 100)]);
        let poll = rain_poll(&engine).await;

        engine
            .place_wager(poll.id, UserId(2), OptionId(1), 10)
            .await
            .unwrap();

        for option_id in [OptionId(1), OptionId(2)] {
            let result = engine.place_wager(poll.id, UserId(2), option_id, 10).await;
            assert!(matches!(result, Err(SettlementError::DuplicateVote)));
        }

        assert_eq!(points(&engine, 2).await, 90);
        let poll = engine.poll(poll.id).await.unwrap().unwrap();
        assert_eq!(poll.total_pool().unwrap(), 10);
    }

    #[tokio::test]
    async fn test_poll_not_found() {
        let (engine, _) = engine(vec![member(2, 100)]);

        let result = engine
            .place_wager(PollId(99), UserId(2), OptionId(1), 10)
            .await;

        assert!(matches!(result, Err(SettlementError::PollNotFound)));
    }

    #[tokio::test]
    async fn test_closed_poll_checked_before_amount() {
        let (engine, clock) = engine(vec![admin(1), member(2, 100)]);
        let poll = rain_poll(&engine).await;

        clock.set(poll.closes_at);
        engine
            .place_wager(poll.id, UserId(2), OptionId(1), 5)
            .await
            .unwrap();

        clock.advance(Duration::seconds(1));
        let result = engine.place_wager(poll.id, UserId(3), OptionId(9), -5).await;

        assert!(matches!(result, Err(SettlementError::PollClosed)));
    }

    #[tokio::test]
    async fn test_non_positive_amounts() {
        let (engine, _) = engine(vec![admin(1), member(2, 100)]);
        let poll = rain_poll(&engine).await;

        for amount in [0, -1, i64::MIN] {
            let result = engine
                .place_wager(poll.id, UserId(2), OptionId(1), amount)
                .await;
            assert!(matches!(result, Err(SettlementError::InvalidAmount)));
        }

        assert_eq!(points(&engine, 2).await, 100);
    }

    #[tokio::test]
    async fn test_funds_checked_before_option() {
        let (engine, _) = engine(vec![admin(1), member(2, 20)]);
        let poll = rain_poll(&engine).await;

        let result = engine.place_wager(poll.id, UserId(2), OptionId(9), 21).await;
        assert!(matches!(result, Err(SettlementError::InsufficientFunds)));

        let result = engine.place_wager(poll.id, UserId(2), OptionId(9), 20).await;
        assert!(matches!(result, Err(SettlementError::OptionNotFound)));

        let result = engine.place_wager(poll.id, UserId(5), OptionId(1), 1).await;
        assert!(matches!(result, Err(SettlementError::UserNotFound)));

        assert_eq!(points(&engine, 2).await, 20);
    }

    #[tokio::test]
    async fn test_whole_balance_can_be_wagered() {
        let (engine, _) = engine(vec![admin(1), member(2, 20)]);
        let poll = rain_poll(&engine).await;

        engine
            .place_wager(poll.id, UserId(2), OptionId(2), 20)
            .await
            .unwrap();

        assert_eq!(points(&engine, 2).await, 0);
    }

    #[tokio::test]
    async fn test_concurrent_duplicate_wagers() {
        let (engine, _) = engine(vec![admin(1), member(2, 100)]);
        let engine = Arc::new(engine);
        let poll_id = rain_poll(&engine).await.id;

        let attempts: Vec<_> = (0..8)
            .map(|attempt| {
                let engine = engine.clone();
                let option_id = OptionId(attempt % 2 + 1);
                tokio::spawn(async move {
                    engine.place_wager(poll_id, UserId(2), option_id, 10).await
                })
            })
            .collect();

        let mut successes = 0;
        for attempt in attempts {
            match attempt.await.unwrap() {
                Ok(_) => successes += 1,
                Err(error) => assert!(matches!(error, SettlementError::DuplicateVote)),
            }
        }

        assert_eq!(successes, 1);
        assert_eq!(points(&engine, 2).await, 90);
        let poll = engine.poll(poll_id).await.unwrap().unwrap();
        assert_eq!(poll.total_pool().unwrap(), 10);
        assert!(check_invariants(&poll));
    }

    #[tokio::test]
    async fn test_total_pool_overflow_rejected() {
        let (engine, _) = engine(vec![
            admin(1),
            member(2, u64::MAX),
            member(3, u64::MAX),
            member(4, 2),
        ]);
        let poll = rain_poll(&engine).await;

        engine
            .place_wager(poll.id, UserId(2), OptionId(1), i64::MAX)
            .await
            .unwrap();
        engine
            .place_wager(poll.id, UserId(3), OptionId(2), i64::MAX)
            .await
            .unwrap();

        let result = engine.place_wager(poll.id, UserId(4), OptionId(2), 2).await;

        assert!(matches!(result, Err(SettlementError::PointsOverflow)));
        assert_eq!(points(&engine, 4).await, 2);
        let poll = engine.poll(poll.id).await.unwrap().unwrap();
        assert_eq!(poll.total_pool().unwrap(), u64::MAX - 1);
        assert!(!poll.option(OptionId(2)).unwrap().has_voter(UserId(4)));
        assert_eq!(engine.results(poll.id).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_balance_shared_across_polls() {
        let (engine, _) = engine(vec![admin(1), member(2, 50)]);
        let engine = Arc::new(engine);
        let first = rain_poll(&engine).await;
        let second = rain_poll(&engine).await;

        let tasks: Vec<_> = [first.id, second.id]
            .into_iter()
            .map(|poll_id| {
                let engine = engine.clone();
                tokio::spawn(async move {
                    engine.place_wager(poll_id, UserId(2), OptionId(1), 30).await
                })
            })
            .collect();

        let mut outcomes = Vec::new();
        for task in tasks {
            outcomes.push(task.await.unwrap());
        }

        assert_eq!(outcomes.iter().filter(|outcome| outcome.is_ok()).count(), 1);
        assert!(
            outcomes
                .iter()
                .any(|outcome| matches!(outcome, Err(SettlementError::InsufficientFunds)))
        );
        assert_eq!(points(&engine, 2).await, 20);
    }
}
