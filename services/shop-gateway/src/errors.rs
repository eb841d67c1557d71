use actix_web::{error::ResponseError, http::StatusCode, HttpResponse};
use coin_ledger::Error as LedgerError;
use serde_json::json;
use thiserror::Error;
use tracing::error;

pub type Result<T> = std::result::Result<T, GatewayError>;

#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("invalid request body")]
    InvalidRequest(String),

    #[error("invalid username")]
    InvalidUsername,

    #[error("invalid credentials")]
    InvalidCredentials,

    #[error("unauthorized")]
    Unauthorized,

    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl From<serde_json::Error> for GatewayError {
    fn from(err: serde_json::Error) -> Self {
        GatewayError::Internal(format!("JSON serialization error: {}", err))
    }
}

impl From<validator::ValidationErrors> for GatewayError {
    fn from(err: validator::ValidationErrors) -> Self {
        GatewayError::InvalidRequest(err.to_string())
    }
}

impl ResponseError for GatewayError {
    fn error_response(&self) -> HttpResponse {
        let status_code = self.status_code();
        if status_code == StatusCode::INTERNAL_SERVER_ERROR {
            error!("Request failed: {}", self);
        }

        HttpResponse::build(status_code).json(json!({
            "error": self.public_message()
        }))
    }

    fn status_code(&self) -> StatusCode {
        match self {
            GatewayError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            GatewayError::InvalidUsername => StatusCode::BAD_REQUEST,
            GatewayError::InvalidCredentials => StatusCode::UNAUTHORIZED,
            GatewayError::Unauthorized => StatusCode::UNAUTHORIZED,
            GatewayError::Ledger(err) => match err {
                LedgerError::InsufficientFunds { .. } => StatusCode::BAD_REQUEST,
                LedgerError::NotFound(_) => StatusCode::BAD_REQUEST,
                LedgerError::InvalidAmount(_) => StatusCode::BAD_REQUEST,
                LedgerError::UserExists(_) => StatusCode::CONFLICT,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            },
            GatewayError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl GatewayError {
    /// Message sent to the client; internal detail stays in the logs
    pub fn public_message(&self) -> String {
        match self {
            GatewayError::Ledger(err) => match err {
                LedgerError::InsufficientFunds { .. } => "not enough coins".to_string(),
                LedgerError::NotFound(_) => "not found".to_string(),
                LedgerError::InvalidAmount(_) => "invalid amount".to_string(),
                LedgerError::UserExists(_) => "user already exists".to_string(),
                _ => "internal server error".to_string(),
            },
            GatewayError::Internal(_) => "internal server error".to_string(),
            other => other.to_string(),
        }
    }
}
