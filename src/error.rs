// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Error taxonomy of the mint core and its HTTP mapping.
//!
//! Core operations return [`MintError`]. Only the controller layer turns it
//! into an [`ApiError`] with a status and a machine-readable code.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::amount::AmountError;
use crate::storage::StorageError;

/// Failures surfaced by the ledger, challenge and registration components.
#[derive(Debug, thiserror::Error)]
pub enum MintError {
    /// Caller input is malformed. `code` is stable and machine-readable.
    #[error("{message}")]
    ValidationFailed { code: &'static str, message: String },

    /// A uniqueness constraint rejected a concurrent or repeated creation.
    #[error("unique constraint violation in {operation}: {detail}")]
    UniqueConstraintViolation {
        operation: &'static str,
        detail: String,
    },

    /// Challenge expired, signature invalid or issuer untrusted.
    #[error("authentication failed")]
    AuthenticationFailed,

    #[error(
        "the facts verifier {verifier} is not trusted on this network, trusted verifiers: [{}]",
        .trusted.join(", ")
    )]
    UntrustedVerifier {
        verifier: String,
        trusted: Vec<String>,
    },

    #[error("the {fact} {value} could not be checked for {address} with the facts verifier {verifier}")]
    FactVerificationFailed {
        address: String,
        fact: String,
        value: String,
        verifier: String,
    },

    /// Arithmetic on amounts failed (underflow, overflow, bad encoding).
    #[error(transparent)]
    Amount(#[from] AmountError),

    #[error("balance {token} of {owner} not found")]
    BalanceNotFound { owner: String, token: String },

    #[error("{operation} was cancelled before completion")]
    Cancelled { operation: &'static str },

    /// Opaque engine failure. Effects must be assumed not applied.
    #[error("storage failure in {operation} ({key}): {source}")]
    Storage {
        operation: &'static str,
        key: String,
        #[source]
        source: StorageError,
    },

    /// Signing backend or other unexpected internal failure.
    #[error("internal error: {0}")]
    Internal(String),
}

pub type MintResult<T> = Result<T, MintError>;

impl MintError {
    pub fn validation(code: &'static str, message: impl Into<String>) -> Self {
        Self::ValidationFailed {
            code,
            message: message.into(),
        }
    }

    /// Wrap a storage error with the operation and the key it touched.
    ///
    /// Unique violations are lifted into their own variant so callers never
    /// inspect engine errors.
    pub fn storage(operation: &'static str, key: impl Into<String>, source: StorageError) -> Self {
        let key = key.into();
        if source.is_unique_violation() {
            Self::UniqueConstraintViolation {
                operation,
                detail: format!("{key}: {source}"),
            }
        } else {
            Self::Storage {
                operation,
                key,
                source,
            }
        }
    }

    pub fn is_unique_violation(&self) -> bool {
        matches!(self, Self::UniqueConstraintViolation { .. })
    }

    pub fn is_underflow(&self) -> bool {
        matches!(self, Self::Amount(AmountError::Underflow { .. }))
    }

    /// Machine-readable code used in API responses.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::ValidationFailed { code, .. } => *code,
            Self::UniqueConstraintViolation { .. } => "unique_constraint_violation",
            Self::AuthenticationFailed => "authentication_failed",
            Self::UntrustedVerifier { .. } => "email_verifier_unknown",
            Self::FactVerificationFailed { .. } => "email_verification_failed",
            Self::Amount(AmountError::Underflow { .. }) => "amount_underflow",
            Self::Amount(AmountError::Overflow { .. }) => "amount_overflow",
            Self::Amount(_) => "amount_invalid",
            Self::BalanceNotFound { .. } => "balance_not_found",
            Self::Cancelled { .. } => "operation_cancelled",
            Self::Storage { .. } | Self::Internal(_) => "internal_error",
        }
    }
}

#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub code: &'static str,
    pub message: String,
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
    error_code: &'static str,
}

impl ApiError {
    pub fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            code,
            message: message.into(),
        }
    }

    pub fn not_found(code: &'static str, message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, code, message)
    }

    pub fn bad_request(code: &'static str, message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, code, message)
    }

    pub fn forbidden(code: &'static str, message: impl Into<String>) -> Self {
        Self::new(StatusCode::FORBIDDEN, code, message)
    }

    pub fn service_unavailable(code: &'static str, message: impl Into<String>) -> Self {
        Self::new(StatusCode::SERVICE_UNAVAILABLE, code, message)
    }

    pub fn internal() -> Self {
        Self::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            "internal_error",
            "An internal error occurred.",
        )
    }
}

impl From<MintError> for ApiError {
    fn from(err: MintError) -> Self {
        let code = err.error_code();
        match &err {
            MintError::ValidationFailed { .. }
            | MintError::UntrustedVerifier { .. }
            | MintError::FactVerificationFailed { .. } => {
                Self::new(StatusCode::BAD_REQUEST, code, err.to_string())
            }
            MintError::AuthenticationFailed => Self::new(
                StatusCode::UNAUTHORIZED,
                code,
                "The challenge or signature provided could not be verified.",
            ),
            MintError::UniqueConstraintViolation { .. } => {
                Self::new(StatusCode::CONFLICT, code, "The resource already exists.")
            }
            MintError::BalanceNotFound { .. } => Self::new(StatusCode::NOT_FOUND, code, err.to_string()),
            MintError::Amount(_) => {
                Self::new(StatusCode::UNPROCESSABLE_ENTITY, code, err.to_string())
            }
            MintError::Cancelled { .. } => {
                Self::new(StatusCode::SERVICE_UNAVAILABLE, code, err.to_string())
            }
            MintError::Storage { .. } | MintError::Internal(_) => {
                tracing::error!(error = %err, "Request failed with internal error");
                Self::internal()
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(ErrorBody {
            error: self.message,
            error_code: self.code,
        });
        (self.status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::amount::Amount;
    use axum::body::to_bytes;

    #[test]
    fn storage_wrapper_lifts_unique_violations() {
        let err = MintError::storage(
            "create_canonical_balance",
            "asset=USD holder=h1",
            StorageError::UniqueViolation("balances(asset, holder, propagation)".into()),
        );
        assert!(err.is_unique_violation());

        let err = MintError::storage("save", "token=t", StorageError::Poisoned);
        assert!(matches!(err, MintError::Storage { operation: "save", .. }));
        assert_eq!(err.error_code(), "internal_error");
    }

    #[test]
    fn status_mapping_follows_taxonomy() {
        let cases: Vec<(MintError, StatusCode, &str)> = vec![
            (
                MintError::validation("username_invalid", "bad"),
                StatusCode::BAD_REQUEST,
                "username_invalid",
            ),
            (
                MintError::AuthenticationFailed,
                StatusCode::UNAUTHORIZED,
                "authentication_failed",
            ),
            (
                MintError::UntrustedVerifier {
                    verifier: "v".into(),
                    trusted: vec![],
                },
                StatusCode::BAD_REQUEST,
                "email_verifier_unknown",
            ),
            (
                MintError::Amount(AmountError::Underflow {
                    lhs: Amount::ZERO,
                    rhs: Amount::from(1),
                }),
                StatusCode::UNPROCESSABLE_ENTITY,
                "amount_underflow",
            ),
            (
                MintError::Internal("signer".into()),
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal_error",
            ),
        ];

        for (err, status, code) in cases {
            let api: ApiError = err.into();
            assert_eq!(api.status, status);
            assert_eq!(api.code, code);
        }
    }

    #[test]
    fn untrusted_verifier_message_lists_trusted_verifiers() {
        let api: ApiError = MintError::UntrustedVerifier {
            verifier: "02aa".into(),
            trusted: vec!["02bb".into(), "03cc".into()],
        }
        .into();
        assert_eq!(api.status, StatusCode::BAD_REQUEST);
        assert_eq!(
            api.message,
            "the facts verifier 02aa is not trusted on this network, trusted verifiers: [02bb, 03cc]"
        );
    }

    #[tokio::test]
    async fn into_response_returns_json_body() {
        let response = ApiError::bad_request("count_invalid", "bad count").into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let body_bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = String::from_utf8(body_bytes.to_vec()).unwrap();
        assert_eq!(body, r#"{"error":"bad count","error_code":"count_invalid"}"#);
    }

    #[test]
    fn internal_errors_hide_details() {
        let api: ApiError = MintError::Internal("hsm offline at 10.0.0.3".into()).into();
        assert!(!api.message.contains("10.0.0.3"));
    }
}
