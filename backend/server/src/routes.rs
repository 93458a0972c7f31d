use std::{collections::BTreeMap, sync::Arc};

use axum::{
    Json,
    extract::{Path, State, rejection::JsonRejection},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use settlement::{
    OptionId, Points, Poll, PollDraft, PollId, PollOption, PollUpdate, Receipt, Resolution,
    SettlementError, User, UserId, pools::voted_options,
};
use tracing::info;

use crate::{
    error::{AppError, Confirmed, Outcome},
    state::State as AppState,
    utils::{caller, optional_caller, require_admin, require_creator, require_creator_or_admin},
};

#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct OptionView {
    pub id: OptionId,
    pub text: String,
    pub total_bets: Points,
    pub voter_count: usize,
}

impl From<&PollOption> for OptionView {
    fn from(option: &PollOption) -> Self {
        Self {
            id: option.id,
            text: option.text.clone(),
            total_bets: option.pool,
            voter_count: option.wagers.len(),
        }
    }
}

/// A poll as the frontend sees it. Individual wagers are never exposed.
#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct PollView {
    pub id: PollId,
    pub title: String,
    pub description: String,
    pub opens_at: DateTime<Utc>,
    pub closes_at: DateTime<Utc>,
    pub creator_id: UserId,
    pub options: Vec<OptionView>,
    pub total_bets: Points,
    pub winning_option_id: Option<OptionId>,
    pub resolved: bool,
    pub expired: bool,
    pub user_voted_option_ids: Vec<OptionId>,
}

impl PollView {
    pub fn new(
        poll: &Poll,
        now: DateTime<Utc>,
        viewer: Option<&User>,
    ) -> Result<Self, SettlementError> {
        Ok(Self {
            id: poll.id,
            title: poll.title.clone(),
            description: poll.description.clone(),
            opens_at: poll.opens_at,
            closes_at: poll.closes_at,
            creator_id: poll.creator_id,
            options: poll.options.iter().map(OptionView::from).collect(),
            total_bets: poll.total_pool()?,
            winning_option_id: poll.winning_option_id,
            resolved: poll.resolved,
            expired: poll.is_expired(now),
            user_voted_option_ids: viewer
                .map(|user| voted_options(poll, user.id))
                .unwrap_or_default(),
        })
    }
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct VoteRequest {
    pub option_id: OptionId,
    pub bet_amount: i64,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct ResolveRequest {
    pub winning_option_id: OptionId,
}

async fn existing_poll(state: &AppState, poll_id: PollId) -> Result<Poll, AppError> {
    state
        .engine
        .poll(poll_id)
        .await?
        .ok_or(AppError::Settlement(SettlementError::PollNotFound))
}

fn views(
    state: &AppState,
    polls: &[Poll],
    viewer: Option<&User>,
) -> Result<Vec<PollView>, AppError> {
    let now = state.engine.now();

    Ok(polls
        .iter()
        .map(|poll| PollView::new(poll, now, viewer))
        .collect::<Result<Vec<_>, SettlementError>>()?)
}

pub async fn list_polls_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<Vec<PollView>>, AppError> {
    let viewer = optional_caller(&state, &headers).await?;
    let polls = state.engine.all_polls().await?;

    Ok(Json(views(&state, &polls, viewer.as_ref())?))
}

pub async fn active_polls_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<Vec<PollView>>, AppError> {
    let viewer = optional_caller(&state, &headers).await?;
    let polls = state.engine.active_polls().await?;

    Ok(Json(views(&state, &polls, viewer.as_ref())?))
}

pub async fn poll_handler(
    State(state): State<Arc<AppState>>,
    Path(poll_id): Path<u64>,
    headers: HeaderMap,
) -> Result<Json<PollView>, AppError> {
    let viewer = optional_caller(&state, &headers).await?;
    let poll = existing_poll(&state, PollId(poll_id)).await?;

    Ok(Json(PollView::new(
        &poll,
        state.engine.now(),
        viewer.as_ref(),
    )?))
}

pub async fn results_handler(
    State(state): State<Arc<AppState>>,
    Path(poll_id): Path<u64>,
) -> Result<Json<BTreeMap<String, f64>>, AppError> {
    let poll_id = PollId(poll_id);
    existing_poll(&state, poll_id).await?;

    Ok(Json(state.engine.results(poll_id).await?))
}

pub async fn create_poll_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    payload: Result<Json<PollDraft>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let user = caller(&state, &headers).await?;
    require_admin(&user)?;
    let Json(draft) = payload?;

    let poll = state.engine.create_poll(user.id, draft).await?;

    Ok((
        StatusCode::CREATED,
        Json(PollView::new(&poll, state.engine.now(), Some(&user))?),
    ))
}

pub async fn update_poll_handler(
    State(state): State<Arc<AppState>>,
    Path(poll_id): Path<u64>,
    headers: HeaderMap,
    payload: Result<Json<PollUpdate>, JsonRejection>,
) -> Result<Json<PollView>, AppError> {
    let user = caller(&state, &headers).await?;
    let poll = existing_poll(&state, PollId(poll_id)).await?;
    require_creator(&user, &poll)?;
    let Json(update) = payload?;

    let poll = state.engine.update_poll(poll.id, update).await?;

    Ok(Json(PollView::new(
        &poll,
        state.engine.now(),
        Some(&user),
    )?))
}

pub async fn delete_poll_handler(
    State(state): State<Arc<AppState>>,
    Path(poll_id): Path<u64>,
    headers: HeaderMap,
) -> Result<Json<Outcome>, AppError> {
    let user = caller(&state, &headers).await?;
    let poll = existing_poll(&state, PollId(poll_id)).await?;
    require_creator_or_admin(&user, &poll)?;

    state.engine.delete_poll(poll.id).await?;
    info!("User {} deleted poll {}", user.id, poll.id);

    Ok(Json(Outcome::ok("Poll deleted")))
}

pub async fn vote_handler(
    State(state): State<Arc<AppState>>,
    Path(poll_id): Path<u64>,
    headers: HeaderMap,
    payload: Result<Json<VoteRequest>, JsonRejection>,
) -> Result<Json<Confirmed<Receipt>>, AppError> {
    let user = caller(&state, &headers).await?;
    let Json(vote) = payload?;

    #[cfg(feature = "verbose")]
    info!("Vote from user {} on poll {poll_id}: {vote:?}", user.id);

    let receipt = state
        .engine
        .place_wager(PollId(poll_id), user.id, vote.option_id, vote.bet_amount)
        .await?;

    Ok(Json(Confirmed::new(receipt)))
}

pub async fn resolve_handler(
    State(state): State<Arc<AppState>>,
    Path(poll_id): Path<u64>,
    headers: HeaderMap,
    payload: Result<Json<ResolveRequest>, JsonRejection>,
) -> Result<Json<Confirmed<Resolution>>, AppError> {
    let user = caller(&state, &headers).await?;
    require_admin(&user)?;
    let Json(request) = payload?;

    let resolution = state
        .engine
        .resolve_poll(PollId(poll_id), request.winning_option_id)
        .await?;

    Ok(Json(Confirmed::new(resolution)))
}

pub async fn me_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<User>, AppError> {
    Ok(Json(caller(&state, &headers).await?))
}

#[cfg(test)]
mod tests {
    use chrono::Duration;
    use settlement::Role;

    use super::*;

    fn voter(id: u64) -> User {
        User {
            id: UserId(id),
            name: format!("voter {id}"),
            email: format!("voter{id}@campus.edu"),
            role: Role::Member,
            points: 50,
        }
    }

    fn wagered_poll() -> Poll {
        let opens_at = Utc::now();
        let mut options = vec![
            PollOption::new(OptionId(1), "A".to_string()),
            PollOption::new(OptionId(2), "B".to_string()),
        ];
        options[0].record_wager(UserId(2), 30).unwrap();
        options[1].record_wager(UserId(3), 20).unwrap();
        options[1].record_wager(UserId(4), 5).unwrap();

        Poll {
            id: PollId(7),
            title: "Will it rain".to_string(),
            description: String::new(),
            opens_at,
            closes_at: opens_at + Duration::days(1),
            options,
            creator_id: UserId(1),
            winning_option_id: None,
            resolved: false,
            paid: Default::default(),
        }
    }

    #[test]
    fn test_view_totals() {
        let poll = wagered_poll();

        let view = PollView::new(&poll, poll.opens_at, None).unwrap();

        assert_eq!(view.total_bets, 55);
        assert_eq!(view.options[0].total_bets, 30);
        assert_eq!(view.options[1].voter_count, 2);
        assert!(!view.expired);
        assert!(view.user_voted_option_ids.is_empty());
    }

    #[test]
    fn test_view_marks_viewer_vote() {
        let poll = wagered_poll();

        let view =
            PollView::new(&poll, poll.closes_at + Duration::seconds(1), Some(&voter(3))).unwrap();

        assert!(view.expired);
        assert_eq!(view.user_voted_option_ids, vec![OptionId(2)]);
    }

    #[test]
    fn test_view_hides_wagers() {
        let poll = wagered_poll();

        let json =
            serde_json::to_value(PollView::new(&poll, poll.opens_at, None).unwrap()).unwrap();

        assert_eq!(json["options"][1]["totalBets"], 25);
        assert_eq!(json["options"][1]["voterCount"], 2);
        assert!(json["options"][1].get("wagers").is_none());
        assert_eq!(json["userVotedOptionIds"], serde_json::json!([]));
    }

    #[test]
    fn test_view_of_overflowing_poll_fails() {
        let mut poll = wagered_poll();
        poll.options[0].pool = u64::MAX;

        let result = PollView::new(&poll, poll.opens_at, None);

        assert!(matches!(result, Err(SettlementError::PointsOverflow)));
    }

    #[test]
    fn test_vote_body_reports_success() {
        let receipt = Receipt {
            poll_id: PollId(1),
            option_id: OptionId(1),
            amount: 30,
            message: "Vote successfully registered".to_string(),
        };

        let json = serde_json::to_value(Confirmed::new(receipt)).unwrap();

        assert_eq!(json["success"], true);
        assert_eq!(json["message"], "Vote successfully registered");
        assert_eq!(json["amount"], 30);
        assert_eq!(json["optionId"], 1);
    }

    #[test]
    fn test_resolve_body_reports_success() {
        let resolution = Resolution {
            poll_id: PollId(1),
            winning_option_id: OptionId(1),
            winner_pool: 30,
            loser_pool: 20,
            payouts: vec![],
            message: "Poll resolved successfully. Winners rewarded!".to_string(),
        };

        let json = serde_json::to_value(Confirmed::new(resolution)).unwrap();

        assert_eq!(json["success"], true);
        assert_eq!(json["message"], "Poll resolved successfully. Winners rewarded!");
        assert_eq!(json["winningOptionId"], 1);
        assert_eq!(json["loserPool"], 20);
    }

    #[test]
    fn test_vote_request_camel_case() {
        let vote: VoteRequest =
            serde_json::from_str(r#"{"optionId": 2, "betAmount": -5}"#).unwrap();

        assert_eq!(vote.option_id, OptionId(2));
        assert_eq!(vote.bet_amount, -5);
    }
}
