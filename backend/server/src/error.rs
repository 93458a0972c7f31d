use axum::{
    Json,
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use settlement::{ErrorKind, SettlementError};
use thiserror::Error;
use tracing::{error, warn};

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Missing or unknown user")]
    Unauthorized,

    #[error("{0}")]
    Forbidden(&'static str),

    #[error("Malformed payload")]
    MalformedPayload,

    #[error(transparent)]
    Settlement(#[from] SettlementError),
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        warn!("Rejected payload: {rejection}");

        AppError::MalformedPayload
    }
}

/// Body of every message-only response, successful or not.
#[derive(Serialize, Debug)]
pub struct Outcome {
    pub success: bool,
    pub message: String,
}

impl Outcome {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
        }
    }
}

/// Successful body for results that carry their own `message`, flattened
/// next to `success` so clients read both responses the same way.
#[derive(Serialize, Debug)]
pub struct Confirmed<T> {
    pub success: bool,
    #[serde(flatten)]
    pub body: T,
}

impl<T> Confirmed<T> {
    pub fn new(body: T) -> Self {
        Self {
            success: true,
            body,
        }
    }
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Unauthorized => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::MalformedPayload => StatusCode::BAD_REQUEST,
            AppError::Settlement(e) => match e.kind() {
                ErrorKind::NotFound => StatusCode::NOT_FOUND,
                ErrorKind::InvalidInput | ErrorKind::Conflict | ErrorKind::InsufficientFunds => {
                    StatusCode::BAD_REQUEST
                }
                ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        let message = if status == StatusCode::INTERNAL_SERVER_ERROR {
            error!("{self}");
            "Internal server error".to_string()
        } else {
            self.to_string()
        };

        (status, Json(Outcome::failed(message))).into_response()
    }
}
