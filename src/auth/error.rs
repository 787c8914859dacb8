// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Authentication errors.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

/// Authentication error type.
///
/// The reason a challenge failed verification is never exposed; callers only
/// learn which header was missing or that verification failed.
#[derive(Debug)]
pub enum AuthError {
    /// A required authentication header is absent
    MissingHeader(&'static str),
    /// A header is present but not valid visible ASCII
    InvalidHeader(&'static str),
    /// Challenge or signature did not verify
    VerificationFailed,
    /// Request was abandoned while verifying
    Cancelled,
}

#[derive(Serialize)]
struct AuthErrorBody {
    error: String,
    error_code: String,
}

impl AuthError {
    /// Get the error code for this error.
    pub fn error_code(&self) -> &'static str {
        match self {
            AuthError::MissingHeader(_) => "missing_auth_header",
            AuthError::InvalidHeader(_) => "invalid_auth_header",
            AuthError::VerificationFailed => "authentication_failed",
            AuthError::Cancelled => "operation_cancelled",
        }
    }

    /// Get the HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            AuthError::MissingHeader(_)
            | AuthError::InvalidHeader(_)
            | AuthError::VerificationFailed => StatusCode::UNAUTHORIZED,
            AuthError::Cancelled => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

impl std::fmt::Display for AuthError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AuthError::MissingHeader(name) => write!(f, "The {name} header is required"),
            AuthError::InvalidHeader(name) => write!(f, "The {name} header is malformed"),
            AuthError::VerificationFailed => {
                write!(f, "The challenge or signature provided could not be verified")
            }
            AuthError::Cancelled => write!(f, "Authentication was cancelled"),
        }
    }
}

impl std::error::Error for AuthError {}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = Json(AuthErrorBody {
            error: self.to_string(),
            error_code: self.error_code().to_string(),
        });
        (status, body).into_response()
    }
}
