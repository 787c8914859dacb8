// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Stateless challenge-response authentication.
//!
//! The mint is the challenger: it vouches for freshness by signing its own
//! address, a creation time and a random nonce. The caller is the prover: it
//! signs the whole challenge string with the key it claims to control.
//!
//! ```text
//! {mint_address}:{created_unix_ms}:{nonce_hex}:{mint_signature}
//! ```
//!
//! Nothing is stored server side. Any mint instance holding a trusted key can
//! verify any challenge until its validity window closes, including across
//! restarts.

use std::time::Duration;

use chrono::{DateTime, Utc};
use rand_core::{OsRng, RngCore};

use super::keys::{self, Keypair};
use crate::context::OpContext;
use crate::error::{MintError, MintResult};

/// Default validity window of a minted challenge.
pub const DEFAULT_CHALLENGE_VALIDITY: Duration = Duration::from_secs(300);

/// Tolerated clock drift for challenges minted by another mint (60 seconds).
const CLOCK_SKEW_LEEWAY_MS: i64 = 60_000;

const NONCE_BYTES: usize = 16;

/// Why a challenge was rejected. Logged, never returned to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AuthFailure {
    Malformed,
    UntrustedIssuer,
    InvalidMintSignature,
    Expired,
    NotYetValid,
    InvalidCallerKey,
    InvalidCallerSignature,
}

/// Parsed view over a challenge string.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Challenge<'a> {
    payload: &'a str,
    issuer: &'a str,
    created_ms: i64,
    mint_signature: &'a str,
}

impl<'a> Challenge<'a> {
    fn parse(value: &'a str) -> Result<Self, AuthFailure> {
        let (payload, mint_signature) = value.rsplit_once(':').ok_or(AuthFailure::Malformed)?;
        let mut fields = payload.split(':');
        let (Some(issuer), Some(created), Some(nonce), None) =
            (fields.next(), fields.next(), fields.next(), fields.next())
        else {
            return Err(AuthFailure::Malformed);
        };

        if created.is_empty() || !created.bytes().all(|b| b.is_ascii_digit()) {
            return Err(AuthFailure::Malformed);
        }
        let created_ms = created.parse().map_err(|_| AuthFailure::Malformed)?;

        if nonce.len() != NONCE_BYTES * 2
            || !nonce.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'))
        {
            return Err(AuthFailure::Malformed);
        }

        Ok(Self {
            payload,
            issuer,
            created_ms,
            mint_signature,
        })
    }
}

/// Mint a challenge signed by `keypair`.
///
/// Returns the challenge value and its creation time (millisecond precision).
/// Fails only when the signing backend fails.
pub fn mint_challenge(
    ctx: &OpContext,
    keypair: &Keypair,
) -> MintResult<(String, DateTime<Utc>)> {
    ctx.check("mint_challenge")?;
    mint_challenge_at(keypair, Utc::now())
}

pub fn mint_challenge_at(
    keypair: &Keypair,
    created: DateTime<Utc>,
) -> MintResult<(String, DateTime<Utc>)> {
    let created_ms = created.timestamp_millis();
    let created = DateTime::from_timestamp_millis(created_ms)
        .ok_or_else(|| MintError::Internal("challenge timestamp out of range".to_string()))?;

    let mut nonce = [0u8; NONCE_BYTES];
    OsRng.fill_bytes(&mut nonce);

    let payload = format!("{}:{}:{}", keypair.address(), created_ms, hex::encode(nonce));
    let signature = keypair
        .sign(payload.as_bytes())
        .map_err(|e| MintError::Internal(format!("challenge signing failed: {e}")))?;

    Ok((format!("{payload}:{signature}"), created))
}

/// Verifies challenges against a network's trusted mint keys.
#[derive(Debug, Clone)]
pub struct ChallengeVerifier<'a> {
    trusted_mints: &'a [String],
    validity: Duration,
}

impl<'a> ChallengeVerifier<'a> {
    pub fn new(trusted_mints: &'a [String], validity: Duration) -> Self {
        Self {
            trusted_mints,
            validity,
        }
    }

    /// Resolve the caller's address, or fail with
    /// [`MintError::AuthenticationFailed`].
    pub fn verify(
        &self,
        ctx: &OpContext,
        challenge: &str,
        caller_signature: &str,
        caller_public_key: &str,
    ) -> MintResult<String> {
        ctx.check("verify_challenge")?;
        self.verify_at(challenge, caller_signature, caller_public_key, Utc::now())
    }

    pub fn verify_at(
        &self,
        challenge: &str,
        caller_signature: &str,
        caller_public_key: &str,
        now: DateTime<Utc>,
    ) -> MintResult<String> {
        self.check(challenge, caller_signature, caller_public_key, now)
            .map_err(|reason| {
                tracing::debug!(?reason, "Challenge verification failed");
                MintError::AuthenticationFailed
            })
    }

    fn check(
        &self,
        value: &str,
        caller_signature: &str,
        caller_public_key: &str,
        now: DateTime<Utc>,
    ) -> Result<String, AuthFailure> {
        let challenge = Challenge::parse(value)?;

        if !self.trusted_mints.iter().any(|m| m == challenge.issuer) {
            return Err(AuthFailure::UntrustedIssuer);
        }
        keys::verify(
            challenge.issuer,
            challenge.payload.as_bytes(),
            challenge.mint_signature,
        )
        .map_err(|_| AuthFailure::InvalidMintSignature)?;

        let now_ms = now.timestamp_millis();
        let validity_ms = i64::try_from(self.validity.as_millis()).unwrap_or(i64::MAX);
        if challenge.created_ms > now_ms.saturating_add(CLOCK_SKEW_LEEWAY_MS) {
            return Err(AuthFailure::NotYetValid);
        }
        if now_ms > challenge.created_ms.saturating_add(validity_ms) {
            return Err(AuthFailure::Expired);
        }

        let caller =
            keys::canonical_address(caller_public_key).map_err(|_| AuthFailure::InvalidCallerKey)?;
        keys::verify(&caller, value.as_bytes(), caller_signature)
            .map_err(|_| AuthFailure::InvalidCallerSignature)?;

        Ok(caller)
    }
}
