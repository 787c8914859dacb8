// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Authentication Module
//!
//! Keypair challenge-response authentication for the mint API.
//!
//! ## Auth Flow
//!
//! 1. Client calls `GET /v1/challenges` and receives challenges signed by the
//!    mint's key for the selected network
//! 2. Client signs one challenge with its own secp256k1 key
//! 3. Client sends `X-Mint-Challenge`, `X-Mint-Signature` and
//!    `X-Mint-Public-Key` with the authenticated request
//! 4. Any mint trusting the issuer verifies the challenge signature, its
//!    freshness and the client signature, and resolves the client's address
//!
//! ## Security
//!
//! - No server-side challenge state; freshness comes from the signed timestamp
//! - Trust anchors are per network; a test challenge never authenticates live
//! - Clock skew tolerance is 60 seconds

pub mod challenge;
pub mod error;
pub mod extractor;
pub mod keys;

pub use challenge::{mint_challenge, ChallengeVerifier};
pub use error::AuthError;
pub use extractor::{
    Auth, AuthenticatedCaller, Livemode, CHALLENGE_HEADER, LIVEMODE_HEADER, PUBLIC_KEY_HEADER,
    SIGNATURE_HEADER,
};
pub use keys::Keypair;
