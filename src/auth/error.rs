//! Authentication Errors

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use thiserror::Error;

use crate::ws::protocol::ErrorBody;

/// Errors surfaced while validating a client-supplied bearer token.
#[derive(Debug, Error)]
pub enum AuthError {
    /// The token header named an algorithm other than HMAC-SHA256.
    #[error("unsupported signing algorithm")]
    UnsupportedAlgorithm,

    /// The key fetcher could not resolve a key for the given hint.
    #[error("key fetch failed: {0}")]
    KeyFetch(String),

    /// Signature verification failed.
    #[error("invalid token signature")]
    InvalidSignature,

    /// The token's `exp` claim is in the past.
    #[error("token expired")]
    Expired,

    /// The token could not be parsed, or is missing a required claim.
    #[error("malformed token")]
    MalformedToken,
}

impl IntoResponse for &AuthError {
    fn into_response(self) -> Response {
        let status = match self {
            AuthError::UnsupportedAlgorithm
            | AuthError::InvalidSignature
            | AuthError::Expired
            | AuthError::MalformedToken => StatusCode::UNAUTHORIZED,
            AuthError::KeyFetch(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(ErrorBody::from(self))).into_response()
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        (&self).into_response()
    }
}
