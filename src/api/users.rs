// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! User registration endpoints.

use axum::{extract::State, http::StatusCode, Json};
use serde::Deserialize;
use utoipa::ToSchema;

use crate::{
    auth::Auth,
    error::{ApiError, MintError},
    registration::{Registrar, UserParams},
    state::AppState,
    storage::{
        repository::users::{EMAIL_CONSTRAINT, USERNAME_CONSTRAINT},
        User, UserRepository,
    },
};

/// Request body for POST /v1/users
#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateUserRequest {
    pub username: String,
    pub email: String,
    /// Standard base64 of the client-side encrypted seed
    pub encrypted_seed: String,
    /// Address of the verifier that attested the email
    pub verifier: String,
}

fn registration_error(err: MintError) -> ApiError {
    match err {
        MintError::UniqueConstraintViolation { ref detail, .. } => {
            let (code, message) = match detail.as_str() {
                USERNAME_CONSTRAINT => ("username_taken", "The username is already taken."),
                EMAIL_CONSTRAINT => ("email_taken", "The email is already registered."),
                _ => ("user_exists", "The account is already registered."),
            };
            ApiError::new(StatusCode::CONFLICT, code, message)
        }
        other => other.into(),
    }
}

/// Register the authenticated account as a user.
///
/// The email must have been attested by one of the network's trusted
/// verifiers beforehand.
#[utoipa::path(
    post,
    path = "/v1/users",
    tag = "Users",
    request_body = CreateUserRequest,
    responses(
        (status = 201, description = "User registered", body = User),
        (status = 400, description = "Validation or verification failed"),
        (status = 401, description = "Unauthorized"),
        (status = 409, description = "Username, email or address already registered"),
    )
)]
pub async fn create_user(
    State(state): State<AppState>,
    Auth(caller): Auth,
    Json(request): Json<CreateUserRequest>,
) -> Result<(StatusCode, Json<User>), ApiError> {
    let ctx = state.context(caller.network);
    let params = UserParams::new(
        caller.network,
        caller.address,
        request.username,
        request.encrypted_seed,
        &request.email,
        request.verifier,
    );
    let facts = state.fact_checker(caller.network);
    let registrar = Registrar::new(
        state.config.network(caller.network),
        state.accounts.as_ref(),
        &facts,
        UserRepository::new(state.backend.as_ref()),
    );

    let user = registrar.register(&ctx, params).map_err(registration_error)?;
    Ok((StatusCode::CREATED, Json(user)))
}

/// Get the authenticated caller's registered user.
#[utoipa::path(
    get,
    path = "/v1/users/me",
    tag = "Users",
    responses(
        (status = 200, description = "User information", body = User),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Caller is not registered"),
    )
)]
pub async fn get_current_user(
    State(state): State<AppState>,
    Auth(caller): Auth,
) -> Result<Json<User>, ApiError> {
    let ctx = state.context(caller.network);
    UserRepository::new(state.backend.as_ref())
        .load_user_by_address(&ctx, &caller.address)?
        .map(Json)
        .ok_or_else(|| ApiError::not_found("user_not_found", "No user is registered for this address."))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{
        router,
        test_support::{send, signed_request},
    };
    use crate::auth::Keypair;
    use crate::config::{MintConfig, NetworkConfig};
    use crate::network::Network;
    use crate::registration::{attestation_message, Attestation, EMAIL_FACT};
    use axum::http::Method;
    use serde_json::json;

    const SEED: &str = "c2VjcmV0IHNlZWQgYnl0ZXMgZW5jcnlwdGVkIGNsaWVudC1zaWRl";

    struct Fixture {
        state: AppState,
        account: Keypair,
        verifier: Keypair,
    }

    fn fixture() -> Fixture {
        let account = Keypair::generate();
        let verifier = Keypair::generate();
        let test = NetworkConfig::new(Network::Test, Keypair::generate())
            .with_email_verifier(verifier.address())
            .with_known_account(account.address());
        let live = NetworkConfig::new(Network::Live, Keypair::generate());
        let (state, _queue) = AppState::for_config(MintConfig::new(test, live));
        Fixture {
            state,
            account,
            verifier,
        }
    }

    fn attest(fixture: &Fixture, email: &str) {
        let message =
            attestation_message(Network::Test, fixture.account.address(), EMAIL_FACT, email);
        let attestation = Attestation {
            address: fixture.account.address().to_string(),
            fact: EMAIL_FACT.to_string(),
            value: email.to_string(),
            verifier: fixture.verifier.address().to_string(),
            signature: fixture.verifier.sign(message.as_bytes()).unwrap(),
        };
        fixture
            .state
            .fact_checker(Network::Test)
            .record(&fixture.state.context(Network::Test), &attestation)
            .unwrap();
    }

    fn registration(fixture: &Fixture, username: &str, email: &str) -> serde_json::Value {
        json!({
            "username": username,
            "email": email,
            "encrypted_seed": SEED,
            "verifier": fixture.verifier.address(),
        })
    }

    #[tokio::test]
    async fn registers_and_reads_back_user() {
        let fixture = fixture();
        attest(&fixture, "alice@example.com");
        let app = router(fixture.state.clone());

        let request = signed_request(
            &fixture.state,
            Network::Test,
            &fixture.account,
            Method::POST,
            "/v1/users",
            Some(registration(&fixture, "alice", "Alice@Example.com")),
        );
        let (status, body) = send(app.clone(), request).await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
        assert_eq!(body["username"], "alice");
        assert_eq!(body["email"], "alice@example.com");
        assert_eq!(body["address"], fixture.account.address());

        let request = signed_request(
            &fixture.state,
            Network::Test,
            &fixture.account,
            Method::GET,
            "/v1/users/me",
            None,
        );
        let (status, body) = send(app, request).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["username"], "alice");
    }

    #[tokio::test]
    async fn duplicate_registration_conflicts() {
        let fixture = fixture();
        attest(&fixture, "alice@example.com");
        let app = router(fixture.state.clone());

        for expected in [StatusCode::CREATED, StatusCode::CONFLICT] {
            let request = signed_request(
                &fixture.state,
                Network::Test,
                &fixture.account,
                Method::POST,
                "/v1/users",
                Some(registration(&fixture, "alice", "alice@example.com")),
            );
            let (status, body) = send(app.clone(), request).await;
            assert_eq!(status, expected, "{body}");
            if status == StatusCode::CONFLICT {
                assert_eq!(body["error_code"], "user_exists");
            }
        }
    }

    #[tokio::test]
    async fn untrusted_verifier_writes_nothing() {
        let fixture = fixture();
        attest(&fixture, "alice@example.com");
        let app = router(fixture.state.clone());
        let mut body = registration(&fixture, "alice", "alice@example.com");
        body["verifier"] = json!(Keypair::generate().address());

        let request = signed_request(
            &fixture.state,
            Network::Test,
            &fixture.account,
            Method::POST,
            "/v1/users",
            Some(body),
        );
        let (status, body) = send(app.clone(), request).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error_code"], "email_verifier_unknown");

        let request = signed_request(
            &fixture.state,
            Network::Test,
            &fixture.account,
            Method::GET,
            "/v1/users/me",
            None,
        );
        let (status, _) = send(app, request).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn unauthenticated_registration_is_rejected() {
        let fixture = fixture();
        let app = router(fixture.state.clone());
        let request = axum::http::Request::post("/v1/users")
            .header("content-type", "application/json")
            .body(axum::body::Body::from(
                registration(&fixture, "alice", "alice@example.com").to_string(),
            ))
            .unwrap();

        let (status, body) = send(app, request).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error_code"], "missing_auth_header");
    }

    #[test]
    fn conflict_codes_name_the_constraint() {
        let err = |detail: &str| MintError::UniqueConstraintViolation {
            operation: "create_user",
            detail: detail.to_string(),
        };
        assert_eq!(registration_error(err(USERNAME_CONSTRAINT)).code, "username_taken");
        assert_eq!(registration_error(err(EMAIL_CONSTRAINT)).code, "email_taken");
        assert_eq!(registration_error(err("users(address)")).code, "user_exists");
        assert_eq!(
            registration_error(MintError::AuthenticationFailed).status,
            StatusCode::UNAUTHORIZED
        );
    }
}
