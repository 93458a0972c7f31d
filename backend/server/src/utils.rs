use axum::http::HeaderMap;
use settlement::{Poll, User};

use crate::{error::AppError, state::State};

/// Set by the reverse proxy after it has authenticated the request.
pub const USER_EMAIL_HEADER: &str = "x-user-email";

pub fn caller_email(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(USER_EMAIL_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|email| !email.is_empty())
}

pub async fn optional_caller(state: &State, headers: &HeaderMap) -> Result<Option<User>, AppError> {
    match caller_email(headers) {
        Some(email) => Ok(state.engine.user_by_email(email).await?),
        None => Ok(None),
    }
}

pub async fn caller(state: &State, headers: &HeaderMap) -> Result<User, AppError> {
    optional_caller(state, headers)
        .await?
        .ok_or(AppError::Unauthorized)
}

pub fn require_admin(user: &User) -> Result<(), AppError> {
    if !user.is_admin() {
        return Err(AppError::Forbidden("Only admins can do this"));
    }

    Ok(())
}

pub fn require_creator(user: &User, poll: &Poll) -> Result<(), AppError> {
    if poll.creator_id != user.id {
        return Err(AppError::Forbidden("Only the poll creator can do this"));
    }

    Ok(())
}

pub fn require_creator_or_admin(user: &User, poll: &Poll) -> Result<(), AppError> {
    if poll.creator_id != user.id && !user.is_admin() {
        return Err(AppError::Forbidden(
            "Only the poll creator or an admin can do this",
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use axum::http::HeaderValue;
    use chrono::{Duration, Utc};
    use settlement::{OptionId, PollId, PollOption, Role, UserId};

    use super::*;

    fn user(id: u64, role: Role) -> User {
        User {
            id: UserId(id),
            name: format!("user {id}"),
            email: format!("user{id}@campus.edu"),
            role,
            points: 100,
        }
    }

    fn poll_by(creator: u64) -> Poll {
        let opens_at = Utc::now();

        Poll {
            id: PollId(1),
            title: "Will it rain".to_string(),
            description: String::new(),
            opens_at,
            closes_at: opens_at + Duration::days(1),
            options: vec![
                PollOption::new(OptionId(1), "A".to_string()),
                PollOption::new(OptionId(2), "B".to_string()),
            ],
            creator_id: UserId(creator),
            winning_option_id: None,
            resolved: false,
            paid: Default::default(),
        }
    }

    #[test]
    fn test_caller_email() {
        let mut headers = HeaderMap::new();
        assert_eq!(caller_email(&headers), None);

        headers.insert(USER_EMAIL_HEADER, HeaderValue::from_static("   "));
        assert_eq!(caller_email(&headers), None);

        headers.insert(
            USER_EMAIL_HEADER,
            HeaderValue::from_static(" user2@campus.edu "),
        );
        assert_eq!(caller_email(&headers), Some("user2@campus.edu"));
    }

    #[test]
    fn test_require_admin() {
        assert!(require_admin(&user(1, Role::Admin)).is_ok());
        assert!(matches!(
            require_admin(&user(2, Role::Member)),
            Err(AppError::Forbidden(_))
        ));
    }

    #[test]
    fn test_creator_guards() {
        let poll = poll_by(1);
        let creator = user(1, Role::Admin);
        let other_admin = user(2, Role::Admin);
        let member = user(3, Role::Member);

        assert!(require_creator(&creator, &poll).is_ok());
        assert!(require_creator(&other_admin, &poll).is_err());

        assert!(require_creator_or_admin(&creator, &poll).is_ok());
        assert!(require_creator_or_admin(&other_admin, &poll).is_ok());
        assert!(matches!(
            require_creator_or_admin(&member, &poll),
            Err(AppError::Forbidden(_))
        ));
    }
}
