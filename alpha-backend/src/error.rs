//! HTTP error mapping.

use alpha_chain::ChainError;
use alpha_common::CommonError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::{
    exchange::ExchangeError, profiles::ProfileError, session::SessionError, token::TokenError,
};

pub const CODE_INVALID_INPUT: &str = "INVALID_INPUT";
pub const CODE_SALT_REQUIRED: &str = "SALT_REQUIRED";
pub const CODE_SESSION_NOT_FOUND: &str = "SESSION_NOT_FOUND";
pub const CODE_PROOF_INVALID: &str = "PROOF_INVALID";
pub const CODE_UNAUTHORIZED: &str = "UNAUTHORIZED";
pub const CODE_USER_NOT_FOUND: &str = "USER_NOT_FOUND";
pub const CODE_WALLET_TAKEN: &str = "WALLET_ALREADY_REGISTERED";
pub const CODE_CHAIN_NOT_CONFIGURED: &str = "CHAIN_NOT_CONFIGURED";
pub const CODE_CHAIN_ERROR: &str = "CHAIN_ERROR";
pub const CODE_EXCHANGE_ERROR: &str = "EXCHANGE_ERROR";
pub const CODE_INTERNAL: &str = "INTERNAL_SERVER_ERROR";

#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    code: &'static str,
    message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            code,
            message: message.into(),
        }
    }

    pub fn bad_request(code: &'static str, message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, code, message)
    }

    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::bad_request(CODE_INVALID_INPUT, message)
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, CODE_UNAUTHORIZED, message)
    }

    pub fn proof_invalid() -> Self {
        Self::new(
            StatusCode::UNAUTHORIZED,
            CODE_PROOF_INVALID,
            "Invalid zk-email proof",
        )
    }

    pub fn internal(err: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, CODE_INTERNAL, err)
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn code(&self) -> &'static str {
        self.code
    }
}

/// Error body: `{ "error": ..., "error_code": ... }`.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub error_code: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorResponse {
            error: self.message,
            error_code: self.code.to_string(),
        };
        (self.status, Json(body)).into_response()
    }
}

impl From<CommonError> for ApiError {
    fn from(err: CommonError) -> Self {
        match err {
            CommonError::SaltRequired => Self::bad_request(CODE_SALT_REQUIRED, err.to_string()),
            CommonError::InvalidInput(message) => Self::invalid_input(message),
            other => Self::invalid_input(other.to_string()),
        }
    }
}

impl From<SessionError> for ApiError {
    fn from(err: SessionError) -> Self {
        match err {
            SessionError::NotFound => Self::new(
                StatusCode::NOT_FOUND,
                CODE_SESSION_NOT_FOUND,
                "Session not found or expired",
            ),
            SessionError::Salt(inner) => inner.into(),
        }
    }
}

impl From<ChainError> for ApiError {
    fn from(err: ChainError) -> Self {
        if err.is_configuration() {
            Self::new(
                StatusCode::SERVICE_UNAVAILABLE,
                CODE_CHAIN_NOT_CONFIGURED,
                err.to_string(),
            )
        } else {
            Self::new(StatusCode::BAD_GATEWAY, CODE_CHAIN_ERROR, err.to_string())
        }
    }
}

impl From<ProfileError> for ApiError {
    fn from(err: ProfileError) -> Self {
        match err {
            ProfileError::NotFound(_) => {
                Self::new(StatusCode::NOT_FOUND, CODE_USER_NOT_FOUND, err.to_string())
            }
            ProfileError::WalletTaken(_) => {
                Self::new(StatusCode::CONFLICT, CODE_WALLET_TAKEN, err.to_string())
            }
            ProfileError::Storage(_) => Self::internal(err.to_string()),
        }
    }
}

impl From<TokenError> for ApiError {
    fn from(err: TokenError) -> Self {
        match err {
            TokenError::Signing(_) => Self::internal(err.to_string()),
            _ => Self::unauthorized(err.to_string()),
        }
    }
}

impl From<ExchangeError> for ApiError {
    fn from(err: ExchangeError) -> Self {
        Self::new(StatusCode::BAD_GATEWAY, CODE_EXCHANGE_ERROR, err.to_string())
    }
}
