// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Verifier attestation intake.

use axum::{extract::State, http::StatusCode, Json};

use crate::{auth::Livemode, error::ApiError, registration::Attestation, state::AppState};

/// Record a verifier's signed attestation about an address.
///
/// Only verifiers allowlisted for email facts on the selected network are
/// accepted. A verifier's newer attestation replaces its earlier one; other
/// verifiers' attestations are left untouched.
#[utoipa::path(
    post,
    path = "/v1/attestations",
    tag = "Users",
    request_body = Attestation,
    responses(
        (status = 204, description = "Attestation recorded"),
        (status = 400, description = "Verifier not trusted or signature does not verify"),
    )
)]
pub async fn submit_attestation(
    State(state): State<AppState>,
    Livemode(network): Livemode,
    Json(attestation): Json<Attestation>,
) -> Result<StatusCode, ApiError> {
    let ctx = state.context(network);
    state.fact_checker(network).record(&ctx, &attestation)?;
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{router, test_support::send};
    use crate::auth::{Keypair, LIVEMODE_HEADER};
    use crate::config::{MintConfig, NetworkConfig};
    use crate::network::Network;
    use crate::registration::{attestation_message, FactChecker, FactError, EMAIL_FACT};
    use axum::{body::Body, http::Request};
    use serde_json::json;

    fn post(body: serde_json::Value, livemode: bool) -> Request<Body> {
        Request::post("/v1/attestations")
            .header("content-type", "application/json")
            .header(LIVEMODE_HEADER, livemode.to_string())
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn attestation(network: Network, signer: &Keypair, email: &str) -> serde_json::Value {
        let message = attestation_message(network, "acct", EMAIL_FACT, email);
        json!({
            "address": "acct",
            "fact": EMAIL_FACT,
            "value": email,
            "verifier": signer.address(),
            "signature": signer.sign(message.as_bytes()).unwrap(),
        })
    }

    /// State trusting `verifier` on both networks.
    fn state_trusting(verifier: &Keypair) -> AppState {
        let config = MintConfig::new(
            NetworkConfig::new(Network::Test, Keypair::generate())
                .with_email_verifier(verifier.address()),
            NetworkConfig::new(Network::Live, Keypair::generate())
                .with_email_verifier(verifier.address()),
        );
        AppState::for_config(config).0
    }

    fn check(state: &AppState, network: Network, email: &str, verifier: &Keypair) -> Result<(), FactError> {
        state.fact_checker(network).check_fact(
            &state.context(network),
            "acct",
            EMAIL_FACT,
            email,
            verifier.address(),
        )
    }

    #[tokio::test]
    async fn signed_attestation_is_recorded_for_its_network() {
        let verifier = Keypair::generate();
        let state = state_trusting(&verifier);

        let body = attestation(Network::Live, &verifier, "a@example.com");
        let (status, _) = send(router(state.clone()), post(body, true)).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        assert!(check(&state, Network::Live, "a@example.com", &verifier).is_ok());
        assert!(matches!(
            check(&state, Network::Test, "a@example.com", &verifier),
            Err(FactError::Missing)
        ));
    }

    #[tokio::test]
    async fn signature_for_other_network_is_rejected() {
        let verifier = Keypair::generate();
        let state = state_trusting(&verifier);

        let body = attestation(Network::Test, &verifier, "a@example.com");
        let (status, body) = send(router(state), post(body, true)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error_code"], "attestation_invalid");
    }

    #[tokio::test]
    async fn untrusted_verifier_is_refused_and_stores_nothing() {
        let verifier = Keypair::generate();
        let rogue = Keypair::generate();
        let state = state_trusting(&verifier);
        let app = router(state.clone());

        let body = attestation(Network::Test, &verifier, "a@example.com");
        let (status, _) = send(app.clone(), post(body, false)).await;
        assert_eq!(status, StatusCode::NO_CONTENT);

        let body = attestation(Network::Test, &rogue, "junk@example.com");
        let (status, body) = send(app, post(body, false)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error_code"], "email_verifier_unknown");
        assert!(body["error"]
            .as_str()
            .unwrap()
            .contains(verifier.address()));

        assert!(check(&state, Network::Test, "a@example.com", &verifier).is_ok());
        assert!(matches!(
            check(&state, Network::Test, "junk@example.com", &rogue),
            Err(FactError::Missing)
        ));
    }
}
