//! # Poll Administration
//!
//! Creation, edits, deletion and the read accessors.
//!
//! ## Rules
//!
//! - Title and option texts are normalized before validation
//! - At least two options, none empty, no duplicates (results are keyed by text)
//! - Opening time defaults to now, closing time to a week after opening
//! - Only title, description and closing time may change, and only while open
//! - Who may create, edit or delete is decided by the caller
use std::collections::HashSet;

use chrono::Duration;
use tracing::info;

use crate::{
    engine::PollEngine,
    error::SettlementError,
    models::{OptionId, Poll, PollDraft, PollId, PollOption, PollUpdate, UserId},
    store::Store,
    utils::{normalize, normalize_paragraphs},
};

pub const DEFAULT_POLL_DAYS: i64 = 7;
pub const MIN_OPTIONS: usize = 2;

impl<S: Store> PollEngine<S> {
    pub async fn create_poll(
        &self,
        creator_id: UserId,
        draft: PollDraft,
    ) -> Result<Poll, SettlementError> {
        let title = valid_title(&draft.title)?;
        let options = valid_options(&draft.options)?;

        let opens_at = draft.opens_at.unwrap_or_else(|| self.now());
        let closes_at = draft
            .closes_at
            .unwrap_or(opens_at + Duration::days(DEFAULT_POLL_DAYS));
        if closes_at <= opens_at {
            return Err(SettlementError::invalid(
                "Closing time must be after opening time",
            ));
        }

        let id = self.store.next_poll_id().await?;
        let poll = Poll {
            id,
            title,
            description: draft
                .description
                .as_deref()
                .map(normalize_paragraphs)
                .unwrap_or_default(),
            opens_at,
            closes_at,
            options: options
                .into_iter()
                .zip(1..)
                .map(|(text, option_id)| PollOption::new(OptionId(option_id), text))
                .collect(),
            creator_id,
            winning_option_id: None,
            resolved: false,
            paid: Default::default(),
        };

        self.store.save_poll(&poll).await?;
        info!("Poll {} created by user {creator_id}: {}", poll.id, poll.title);

        Ok(poll)
    }

    pub async fn update_poll(
        &self,
        poll_id: PollId,
        update: PollUpdate,
    ) -> Result<Poll, SettlementError> {
        let _poll_guard = self.poll_locks.lock(poll_id).await;

        let mut poll = self
            .store
            .find_poll(poll_id)
            .await?
            .ok_or(SettlementError::PollNotFound)?;

        if poll.is_expired(self.now()) {
            return Err(SettlementError::PollClosed);
        }

        if let Some(title) = update.title {
            poll.title = valid_title(&title)?;
        }

        if let Some(description) = update.description {
            poll.description = normalize_paragraphs(&description);
        }

        if let Some(closes_at) = update.closes_at {
            if closes_at <= poll.opens_at {
                return Err(SettlementError::invalid(
                    "Closing time must be after opening time",
                ));
            }
            poll.closes_at = closes_at;
        }

        self.store.save_poll(&poll).await?;
        info!("Poll {poll_id} updated");

        Ok(poll)
    }

    pub async fn delete_poll(&self, poll_id: PollId) -> Result<(), SettlementError> {
        let _poll_guard = self.poll_locks.lock(poll_id).await;

        if !self.store.delete_poll(poll_id).await? {
            return Err(SettlementError::PollNotFound);
        }

        info!("Poll {poll_id} deleted");
        Ok(())
    }

    pub async fn poll(&self, poll_id: PollId) -> Result<Option<Poll>, SettlementError> {
        Ok(self.store.find_poll(poll_id).await?)
    }

    /// Polls whose closing time is still in the future.
    pub async fn active_polls(&self) -> Result<Vec<Poll>, SettlementError> {
        Ok(self.store.polls_ending_after(self.now()).await?)
    }

    pub async fn all_polls(&self) -> Result<Vec<Poll>, SettlementError> {
        Ok(self.store.all_polls().await?)
    }
}

fn valid_title(raw: &str) -> Result<String, SettlementError> {
    let title = normalize(raw);
    if title.is_empty() {
        return Err(SettlementError::invalid("Question cannot be empty"));
    }

    Ok(title)
}

fn valid_options(raw: &[String]) -> Result<Vec<String>, SettlementError> {
    let options: Vec<String> = raw.iter().map(|text| normalize(text)).collect();

    if options.len() < MIN_OPTIONS {
        return Err(SettlementError::invalid(format!(
            "A poll needs at least {MIN_OPTIONS} options"
        )));
    }

    if options.iter().any(String::is_empty) {
        return Err(SettlementError::invalid("Option text cannot be empty"));
    }

    let mut seen = HashSet::new();
    if let Some(duplicate) = options.iter().find(|text| !seen.insert(text.to_lowercase())) {
        return Err(SettlementError::invalid(format!(
            "Duplicate option: {duplicate}"
        )));
    }

    Ok(options)
}
