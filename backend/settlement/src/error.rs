use std::error::Error as StdError;

use thiserror::Error;

use crate::models::OptionId;

type BoxError = Box<dyn StdError + Send + Sync>;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Storage backend error: {0}")]
    Backend(#[from] BoxError),

    #[error("Corrupt record {key}: {reason}")]
    Corrupt { key: String, reason: String },
}

impl StoreError {
    pub fn backend<E: Into<BoxError>>(error: E) -> Self {
        Self::Backend(error.into())
    }
}

/// Business-rule violations are returned as values, never panics. Only
/// [`SettlementError::Store`] represents an unexpected failure.
#[derive(Error, Debug)]
pub enum SettlementError {
    #[error("Poll not found")]
    PollNotFound,

    #[error("Poll is closed")]
    PollClosed,

    #[error("Invalid bet amount")]
    InvalidAmount,

    #[error("User not found")]
    UserNotFound,

    #[error("Not enough points")]
    InsufficientFunds,

    #[error("Option not found")]
    OptionNotFound,

    #[error("You already voted on this poll")]
    DuplicateVote,

    #[error("Poll is still active")]
    PollStillActive,

    #[error("Invalid winning option")]
    InvalidOption,

    #[error("Poll already resolved")]
    AlreadyResolved,

    #[error("Poll is already being resolved with option {0}")]
    ResolutionInProgress(OptionId),

    #[error("{0}")]
    InvalidInput(String),

    #[error("Point balance overflow")]
    PointsOverflow,

    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    InvalidInput,
    Conflict,
    InsufficientFunds,
    Internal,
}

impl SettlementError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::PollNotFound | Self::UserNotFound | Self::OptionNotFound => ErrorKind::NotFound,
            Self::InvalidAmount | Self::InvalidOption | Self::InvalidInput(_) => {
                ErrorKind::InvalidInput
            }
            Self::PollClosed
            | Self::DuplicateVote
            | Self::PollStillActive
            | Self::AlreadyResolved
            | Self::ResolutionInProgress(_) => ErrorKind::Conflict,
            Self::InsufficientFunds => ErrorKind::InsufficientFunds,
            Self::PointsOverflow | Self::Store(_) => ErrorKind::Internal,
        }
    }

    pub(crate) fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidInput(message.into())
    }
}
