// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Axum extractors for the network selector and the authenticated caller.
//!
//! ```rust,ignore
//! async fn my_handler(Livemode(network): Livemode, Auth(caller): Auth) -> impl IntoResponse {
//!     // caller.address was proven by a signed challenge on `network`
//! }
//! ```

use axum::{
    extract::FromRequestParts,
    http::{request::Parts, HeaderMap},
};

use super::challenge::ChallengeVerifier;
use super::AuthError;
use crate::error::{ApiError, MintError};
use crate::network::Network;
use crate::state::AppState;

/// `true` selects the live network; absent or `false` selects test.
pub const LIVEMODE_HEADER: &str = "x-mint-livemode";
/// Challenge previously minted by a trusted mint.
pub const CHALLENGE_HEADER: &str = "x-mint-challenge";
/// Caller's base64url signature over the challenge.
pub const SIGNATURE_HEADER: &str = "x-mint-signature";
/// Caller's hex compressed public key.
pub const PUBLIC_KEY_HEADER: &str = "x-mint-public-key";

/// Read the network a request targets.
fn network_from_headers(headers: &HeaderMap) -> Result<Network, ()> {
    let Some(value) = headers.get(LIVEMODE_HEADER) else {
        return Ok(Network::default());
    };
    let value = value.to_str().map_err(|_| ())?.trim();
    if value.eq_ignore_ascii_case("true") {
        Ok(Network::Live)
    } else if value.eq_ignore_ascii_case("false") {
        Ok(Network::Test)
    } else {
        Err(())
    }
}

fn required_header<'a>(headers: &'a HeaderMap, name: &'static str) -> Result<&'a str, AuthError> {
    headers
        .get(name)
        .ok_or(AuthError::MissingHeader(name))?
        .to_str()
        .map_err(|_| AuthError::InvalidHeader(name))
}

/// Network selected by the `X-Mint-Livemode` header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Livemode(pub Network);

impl<S: Send + Sync> FromRequestParts<S> for Livemode {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        network_from_headers(&parts.headers).map(Livemode).map_err(|_| {
            ApiError::bad_request(
                "livemode_invalid",
                "The X-Mint-Livemode header must be true or false.",
            )
        })
    }
}

/// A caller that proved control of `address` on `network`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatedCaller {
    pub address: String,
    pub network: Network,
}

/// Extractor for authenticated callers.
///
/// Verifies the challenge headers against the trusted mints of the network
/// the request selects.
pub struct Auth(pub AuthenticatedCaller);

impl FromRequestParts<AppState> for Auth {
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let network = network_from_headers(&parts.headers)
            .map_err(|_| AuthError::InvalidHeader(LIVEMODE_HEADER))?;
        let challenge = required_header(&parts.headers, CHALLENGE_HEADER)?;
        let signature = required_header(&parts.headers, SIGNATURE_HEADER)?;
        let public_key = required_header(&parts.headers, PUBLIC_KEY_HEADER)?;

        let ctx = state.context(network);
        let verifier = ChallengeVerifier::new(
            &state.config.network(network).trusted_mints,
            state.config.challenge_validity,
        );
        let address = verifier
            .verify(&ctx, challenge, signature, public_key)
            .map_err(|e| match e {
                MintError::Cancelled { .. } => AuthError::Cancelled,
                _ => AuthError::VerificationFailed,
            })?;

        Ok(Auth(AuthenticatedCaller { address, network }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::challenge::mint_challenge;
    use crate::auth::keys::Keypair;
    use crate::context::OpContext;
    use axum::http::Request;

    fn parts(headers: &[(&str, &str)]) -> Parts {
        let mut builder = Request::builder().uri("/test");
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        builder.body(()).unwrap().into_parts().0
    }

    fn signed_headers(state: &AppState, network: Network, caller: &Keypair) -> (String, String) {
        let ctx = OpContext::new(network);
        let (challenge, _) = mint_challenge(&ctx, &state.config.network(network).keypair).unwrap();
        let signature = caller.sign(challenge.as_bytes()).unwrap();
        (challenge, signature)
    }

    #[test]
    fn livemode_header_selects_network() {
        assert_eq!(network_from_headers(&HeaderMap::new()), Ok(Network::Test));
        let p = parts(&[(LIVEMODE_HEADER, "TRUE")]);
        assert_eq!(network_from_headers(&p.headers), Ok(Network::Live));
        let p = parts(&[(LIVEMODE_HEADER, "false")]);
        assert_eq!(network_from_headers(&p.headers), Ok(Network::Test));
        let p = parts(&[(LIVEMODE_HEADER, "yes")]);
        assert!(network_from_headers(&p.headers).is_err());
    }

    #[tokio::test]
    async fn auth_extractor_requires_headers() {
        let state = AppState::for_tests();
        let mut p = parts(&[]);
        let result = Auth::from_request_parts(&mut p, &state).await;
        assert!(matches!(result, Err(AuthError::MissingHeader(CHALLENGE_HEADER))));
    }

    #[tokio::test]
    async fn auth_extractor_resolves_caller() {
        let state = AppState::for_tests();
        let caller = Keypair::generate();
        let (challenge, signature) = signed_headers(&state, Network::Live, &caller);
        let mut p = parts(&[
            (LIVEMODE_HEADER, "true"),
            (CHALLENGE_HEADER, &challenge),
            (SIGNATURE_HEADER, &signature),
            (PUBLIC_KEY_HEADER, caller.address()),
        ]);

        let Auth(authenticated) = Auth::from_request_parts(&mut p, &state).await.unwrap();
        assert_eq!(authenticated.address, caller.address());
        assert_eq!(authenticated.network, Network::Live);
    }

    #[tokio::test]
    async fn challenge_from_other_network_is_rejected() {
        let state = AppState::for_tests();
        let caller = Keypair::generate();
        let (challenge, signature) = signed_headers(&state, Network::Test, &caller);
        let mut p = parts(&[
            (LIVEMODE_HEADER, "true"),
            (CHALLENGE_HEADER, &challenge),
            (SIGNATURE_HEADER, &signature),
            (PUBLIC_KEY_HEADER, caller.address()),
        ]);

        let result = Auth::from_request_parts(&mut p, &state).await;
        assert!(matches!(result, Err(AuthError::VerificationFailed)));
    }
}
