use actix_web::http::StatusCode;
use actix_web::{error, HttpResponse};
use derive_more::{Display, Error};
use serde::Serialize;

/// Every failure the order/bill/booking core can report to a caller.
///
/// The message of each variant is shown to staff as-is, so it should say
/// *why* an action was refused.
#[derive(Debug, Display, Error, PartialEq, Eq)]
pub(crate) enum CoreError {
    #[display("invalid request: {message}")]
    Validation { message: String },
    #[display("{entity} {id} not found")]
    NotFound { entity: &'static str, id: String },
    #[display("invalid transition: {message}")]
    InvalidTransition { message: String },
    #[display("conflict: {message}")]
    Conflict { message: String },
    #[display("forbidden: {message}")]
    Forbidden { message: String },
    #[display("store failure: {message}")]
    Persistence { message: String },
    #[display("server is busy")]
    ServerIsBusy,
    #[display("timeout occurred")]
    Timeout,
}

impl CoreError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation { message: message.into() }
    }

    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        Self::NotFound { entity, id: id.to_string() }
    }

    pub fn invalid_transition(message: impl Into<String>) -> Self {
        Self::InvalidTransition { message: message.into() }
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict { message: message.into() }
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::Forbidden { message: message.into() }
    }

    pub fn persistence(message: impl ToString) -> Self {
        Self::Persistence { message: message.to_string() }
    }

    /// stable code clients can switch on
    pub fn result_code(&self) -> &'static str {
        match self {
            CoreError::Validation { .. } => "E_VALIDATION",
            CoreError::NotFound { .. } => "E_NOT_FOUND",
            CoreError::InvalidTransition { .. } => "E_INVALID_TRANSITION",
            CoreError::Conflict { .. } => "E_CONFLICT",
            CoreError::Forbidden { .. } => "E_FORBIDDEN",
            CoreError::Persistence { .. } => "E_PERSISTENCE",
            CoreError::ServerIsBusy => "E_BUSY",
            CoreError::Timeout => "E_TIMEOUT",
        }
    }
}

impl From<tokio_postgres::Error> for CoreError {
    fn from(e: tokio_postgres::Error) -> Self {
        CoreError::persistence(e)
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct ErrorResponse {
    pub result_code: &'static str,
    pub message: String,
}

impl error::ResponseError for CoreError {
    fn status_code(&self) -> StatusCode {
        match *self {
            CoreError::Validation { .. } => StatusCode::BAD_REQUEST,
            CoreError::NotFound { .. } => StatusCode::NOT_FOUND,
            CoreError::InvalidTransition { .. } | CoreError::Conflict { .. } => StatusCode::CONFLICT,
            CoreError::Forbidden { .. } => StatusCode::FORBIDDEN,
            CoreError::Persistence { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            CoreError::ServerIsBusy => StatusCode::SERVICE_UNAVAILABLE,
            CoreError::Timeout => StatusCode::GATEWAY_TIMEOUT,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(ErrorResponse {
            result_code: self.result_code(),
            message: self.to_string(),
        })
    }
}
