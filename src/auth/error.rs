//! Authentication and authorization failures
//!
//! Every variant is a terminal response for the current request only.

use crate::auth::Role;
use crate::error::ErrorResponse;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    #[error("Access denied. No token provided.")]
    MissingCredential,

    #[error("Invalid token.")]
    MalformedCredential,

    #[error("Invalid token.")]
    BadSignature,

    #[error("Access denied. Token expired.")]
    Expired,

    #[error("Forbidden. You do not have permission to perform this action.")]
    InsufficientRole { role: Role },
}

impl AuthError {
    /// 401 asks the client to authenticate again; 400 and 403 do not.
    pub fn status(&self) -> StatusCode {
        match self {
            AuthError::MissingCredential | AuthError::Expired => StatusCode::UNAUTHORIZED,
            AuthError::MalformedCredential | AuthError::BadSignature => StatusCode::BAD_REQUEST,
            AuthError::InsufficientRole { .. } => StatusCode::FORBIDDEN,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            AuthError::MissingCredential => "MISSING_CREDENTIAL",
            AuthError::MalformedCredential => "MALFORMED_CREDENTIAL",
            AuthError::BadSignature => "BAD_SIGNATURE",
            AuthError::Expired => "TOKEN_EXPIRED",
            AuthError::InsufficientRole { .. } => "FORBIDDEN",
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let body = Json(ErrorResponse {
            success: false,
            message: self.to_string(),
            error: None,
            code: Some(self.code().to_string()),
        });

        (self.status(), body).into_response()
    }
}
