// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Challenge issuance.

use axum::{
    extract::{Query, State},
    Json,
};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::{
    auth::{mint_challenge, Livemode},
    error::ApiError,
    state::AppState,
};

const DEFAULT_CHALLENGE_COUNT: usize = 10;
const MAX_CHALLENGE_COUNT: usize = 100;

#[derive(Debug, Deserialize, IntoParams)]
pub struct ChallengeQuery {
    /// Number of challenges to mint, below 100
    #[param(default = "10")]
    pub count: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct IssuedChallenge {
    /// Signed challenge string to sign and echo back
    pub value: String,
    /// Creation time in milliseconds since the Unix epoch
    pub created: i64,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ChallengesResponse {
    pub challenges: Vec<IssuedChallenge>,
}

fn parse_count(count: Option<&str>) -> Result<usize, ApiError> {
    let Some(count) = count else {
        return Ok(DEFAULT_CHALLENGE_COUNT);
    };
    count
        .trim()
        .parse::<usize>()
        .ok()
        .filter(|n| *n < MAX_CHALLENGE_COUNT)
        .ok_or_else(|| {
            ApiError::bad_request(
                "count_invalid",
                format!("count must be an integer below {MAX_CHALLENGE_COUNT}"),
            )
        })
}

/// Mint fresh challenges signed by this mint's key for the selected network.
#[utoipa::path(
    get,
    path = "/v1/challenges",
    tag = "Auth",
    params(ChallengeQuery),
    responses(
        (status = 200, description = "Challenges minted", body = ChallengesResponse),
        (status = 400, description = "Invalid count or livemode header"),
    )
)]
pub async fn create_challenges(
    State(state): State<AppState>,
    Livemode(network): Livemode,
    Query(query): Query<ChallengeQuery>,
) -> Result<Json<ChallengesResponse>, ApiError> {
    let count = parse_count(query.count.as_deref())?;
    let ctx = state.context(network);
    let keypair = &state.config.network(network).keypair;

    let challenges = (0..count)
        .map(|_| {
            mint_challenge(&ctx, keypair).map(|(value, created)| IssuedChallenge {
                value,
                created: created.timestamp_millis(),
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Json(ChallengesResponse { challenges }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{router, test_support::send};
    use crate::auth::{ChallengeVerifier, Keypair, LIVEMODE_HEADER};
    use axum::{body::Body, http::Request, http::StatusCode};

    #[test]
    fn count_parsing() {
        assert_eq!(parse_count(None).unwrap(), 10);
        assert_eq!(parse_count(Some("0")).unwrap(), 0);
        assert_eq!(parse_count(Some("99")).unwrap(), 99);
        for bad in ["100", "-1", "ten", ""] {
            let err = parse_count(Some(bad)).unwrap_err();
            assert_eq!(err.code, "count_invalid", "{bad}");
        }
    }

    #[tokio::test]
    async fn minted_challenges_verify_on_selected_network() {
        let state = AppState::for_tests();
        let app = router(state.clone());
        let request = Request::get("/v1/challenges?count=3")
            .header(LIVEMODE_HEADER, "true")
            .body(Body::empty())
            .unwrap();

        let (status, body) = send(app, request).await;
        assert_eq!(status, StatusCode::OK);
        let response: ChallengesResponse = serde_json::from_value(body).unwrap();
        assert_eq!(response.challenges.len(), 3);

        let caller = Keypair::generate();
        let live = ChallengeVerifier::new(
            &state.config.network(crate::network::Network::Live).trusted_mints,
            state.config.challenge_validity,
        );
        let test = ChallengeVerifier::new(
            &state.config.network(crate::network::Network::Test).trusted_mints,
            state.config.challenge_validity,
        );
        for challenge in &response.challenges {
            assert!(challenge.created > 0);
            let signature = caller.sign(challenge.value.as_bytes()).unwrap();
            let ctx = state.context(crate::network::Network::Live);
            assert_eq!(
                live.verify(&ctx, &challenge.value, &signature, caller.address()).unwrap(),
                caller.address()
            );
            assert!(test.verify(&ctx, &challenge.value, &signature, caller.address()).is_err());
        }
    }

    #[tokio::test]
    async fn rejects_invalid_count() {
        let app = router(AppState::for_tests());
        let request = Request::get("/v1/challenges?count=100").body(Body::empty()).unwrap();

        let (status, body) = send(app, request).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error_code"], "count_invalid");
    }
}
