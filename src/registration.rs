// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! User registration gate.
//!
//! A registration runs a fixed sequence of checks and stops at the first
//! failure, each with its own error code:
//!
//! 1. `username_invalid`
//! 2. `email_invalid`
//! 3. `encrypted_seed_invalid`
//! 4. `address_invalid`: the account does not exist on the network
//! 5. `email_verifier_unknown`: the verifier is not allowlisted
//! 6. `email_verification_failed`: the verifier never attested the email
//!
//! Nothing is persisted unless every check passes.

use std::collections::HashSet;

use base64ct::{Base64, Encoding};
use chrono::{SubsecRound, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use utoipa::ToSchema;

use crate::auth::keys;
use crate::config::{MintConfig, NetworkConfig};
use crate::context::OpContext;
use crate::error::{MintError, MintResult};
use crate::network::Network;
use crate::storage::{Fact, FactRepository, User, UserRepository};

/// Maximum length of an email address.
pub const MAX_EMAIL_LENGTH: usize = 256;

/// Maximum length of the encoded encrypted seed.
pub const MAX_ENCRYPTED_SEED_LENGTH: usize = 256;

/// Fact name under which verifiers attest email ownership.
pub const EMAIL_FACT: &str = "email";

static USERNAME_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-z0-9]{1,256}$").unwrap_or_else(|_| unreachable!()));

static EMAIL_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[a-z0-9_.+\-]+@[a-z0-9-]+\.[a-z0-9\-.]+$").unwrap_or_else(|_| unreachable!())
});

/// Parameters of a registration request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserParams {
    pub network: Network,
    pub address: String,
    pub username: String,
    pub encrypted_seed: String,
    /// Always lowercase
    pub email: String,
    pub verifier: String,
}

impl UserParams {
    pub fn new(
        network: Network,
        address: impl Into<String>,
        username: impl Into<String>,
        encrypted_seed: impl Into<String>,
        email: &str,
        verifier: impl Into<String>,
    ) -> Self {
        Self {
            network,
            address: address.into(),
            username: username.into(),
            encrypted_seed: encrypted_seed.into(),
            email: email.to_lowercase(),
            verifier: verifier.into(),
        }
    }
}

pub fn validate_username(username: &str) -> MintResult<()> {
    if USERNAME_REGEX.is_match(username) {
        Ok(())
    } else {
        Err(MintError::validation(
            "username_invalid",
            "username must be 1-256 lowercase letters or digits",
        ))
    }
}

pub fn validate_email(email: &str) -> MintResult<()> {
    if email.len() <= MAX_EMAIL_LENGTH && EMAIL_REGEX.is_match(email) {
        Ok(())
    } else {
        Err(MintError::validation("email_invalid", "email is not a valid address"))
    }
}

pub fn validate_encrypted_seed(seed: &str) -> MintResult<()> {
    // An empty seed is the empty base64 string
    let valid = seed.is_empty()
        || (seed.len() <= MAX_ENCRYPTED_SEED_LENGTH && Base64::decode_vec(seed).is_ok());
    if valid {
        Ok(())
    } else {
        Err(MintError::validation(
            "encrypted_seed_invalid",
            format!("encrypted seed must be standard base64 of at most {MAX_ENCRYPTED_SEED_LENGTH} characters"),
        ))
    }
}

// =============================================================================
// Account directory
// =============================================================================

/// Answers whether an account exists on a network.
pub trait AccountDirectory: Send + Sync {
    fn account_exists(&self, network: Network, address: &str) -> bool;
}

/// Account directory backed by a static allowlist.
#[derive(Debug, Default, Clone)]
pub struct KnownAccounts {
    test: HashSet<String>,
    live: HashSet<String>,
}

impl KnownAccounts {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(config: &MintConfig) -> Self {
        let mut accounts = Self::new();
        for network in Network::ALL {
            for address in &config.network(network).known_accounts {
                accounts = accounts.with_account(network, address.clone());
            }
        }
        accounts
    }

    pub fn with_account(mut self, network: Network, address: impl Into<String>) -> Self {
        match network {
            Network::Test => self.test.insert(address.into()),
            Network::Live => self.live.insert(address.into()),
        };
        self
    }
}

impl AccountDirectory for KnownAccounts {
    fn account_exists(&self, network: Network, address: &str) -> bool {
        match network {
            Network::Test => self.test.contains(address),
            Network::Live => self.live.contains(address),
        }
    }
}

// =============================================================================
// Fact checking
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum FactError {
    #[error("no attestation recorded")]
    Missing,

    #[error("attested value differs")]
    Mismatch,

    #[error("fact store unavailable: {0}")]
    Unavailable(#[source] MintError),
}

/// Confirms that a verifier attested `fact = value` for an address on the
/// context's network.
pub trait FactChecker: Send + Sync {
    fn check_fact(
        &self,
        ctx: &OpContext,
        address: &str,
        fact: &str,
        value: &str,
        verifier: &str,
    ) -> Result<(), FactError>;
}

/// A verifier's signed statement about an address.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, ToSchema)]
pub struct Attestation {
    pub address: String,
    pub fact: String,
    pub value: String,
    /// Verifier address (hex compressed secp256k1 key)
    pub verifier: String,
    /// base64url signature over `{network}:{address}:{fact}:{value}`
    pub signature: String,
}

/// Message a verifier signs for an attestation.
pub fn attestation_message(network: Network, address: &str, fact: &str, value: &str) -> String {
    format!("{network}:{address}:{fact}:{value}")
}

fn invalid_attestation() -> MintError {
    MintError::validation(
        "attestation_invalid",
        "The attestation signature could not be verified.",
    )
}

/// Fact checker over attestations persisted by this mint.
///
/// Only verifiers allowlisted on the network may record attestations.
/// Signatures are checked when an attestation is recorded; lookups only
/// compare the stored value.
pub struct AttestationFactChecker<'a> {
    config: &'a NetworkConfig,
    facts: FactRepository<'a>,
}

impl<'a> AttestationFactChecker<'a> {
    pub fn new(config: &'a NetworkConfig, facts: FactRepository<'a>) -> Self {
        Self { config, facts }
    }

    /// Verify and persist an attestation on the context's network.
    ///
    /// Fails with `UntrustedVerifier` for verifiers outside the allowlist and
    /// `attestation_invalid` when the signature does not verify. A newer
    /// attestation replaces the same verifier's earlier one.
    pub fn record(&self, ctx: &OpContext, attestation: &Attestation) -> MintResult<Fact> {
        ctx.check("record_attestation")?;
        let network = ctx.network();
        if self.config.network != network {
            return Err(MintError::Internal(format!(
                "attestation for {} recorded on {network}",
                self.config.network
            )));
        }

        let verifier =
            keys::canonical_address(&attestation.verifier).map_err(|_| invalid_attestation())?;
        if !self.config.email_verifiers.contains(&verifier) {
            return Err(MintError::UntrustedVerifier {
                verifier,
                trusted: self.config.email_verifiers.clone(),
            });
        }
        let message = attestation_message(
            network,
            &attestation.address,
            &attestation.fact,
            &attestation.value,
        );
        keys::verify(&verifier, message.as_bytes(), &attestation.signature)
            .map_err(|_| invalid_attestation())?;

        let fact = Fact {
            address: attestation.address.clone(),
            fact: attestation.fact.clone(),
            value: attestation.value.clone(),
            verifier,
            created: Utc::now().trunc_subsecs(6),
        };
        self.facts.record_fact(ctx, &fact)?;
        tracing::debug!(
            %network,
            address = %fact.address,
            fact = %fact.fact,
            verifier = %fact.verifier,
            "Recorded attestation"
        );
        Ok(fact)
    }
}

impl FactChecker for AttestationFactChecker<'_> {
    fn check_fact(
        &self,
        ctx: &OpContext,
        address: &str,
        fact: &str,
        value: &str,
        verifier: &str,
    ) -> Result<(), FactError> {
        let stored = self
            .facts
            .load_fact(ctx, address, fact, verifier)
            .map_err(FactError::Unavailable)?
            .ok_or(FactError::Missing)?;
        if stored.value == value {
            Ok(())
        } else {
            Err(FactError::Mismatch)
        }
    }
}

// =============================================================================
// Registrar
// =============================================================================

/// Runs the registration gate and persists accepted users.
pub struct Registrar<'a> {
    config: &'a NetworkConfig,
    accounts: &'a dyn AccountDirectory,
    facts: &'a dyn FactChecker,
    users: UserRepository<'a>,
}

impl<'a> Registrar<'a> {
    pub fn new(
        config: &'a NetworkConfig,
        accounts: &'a dyn AccountDirectory,
        facts: &'a dyn FactChecker,
        users: UserRepository<'a>,
    ) -> Self {
        Self {
            config,
            accounts,
            facts,
            users,
        }
    }

    /// Run every check in order; stop at the first failure.
    pub fn validate(&self, ctx: &OpContext, params: &UserParams) -> MintResult<()> {
        ctx.check("validate_user")?;
        if params.network != ctx.network() || self.config.network != ctx.network() {
            return Err(MintError::Internal(format!(
                "registration for {} ran on {}",
                params.network,
                ctx.network()
            )));
        }

        validate_username(&params.username)?;
        validate_email(&params.email)?;
        validate_encrypted_seed(&params.encrypted_seed)?;

        if !self.accounts.account_exists(params.network, &params.address) {
            return Err(MintError::validation(
                "address_invalid",
                format!("account {} does not exist on the {} network", params.address, params.network),
            ));
        }

        if !self.config.email_verifiers.contains(&params.verifier) {
            return Err(MintError::UntrustedVerifier {
                verifier: params.verifier.clone(),
                trusted: self.config.email_verifiers.clone(),
            });
        }

        self.facts
            .check_fact(
                ctx,
                &params.address,
                EMAIL_FACT,
                &params.email,
                &params.verifier,
            )
            .map_err(|reason| match reason {
                FactError::Unavailable(err) => err,
                reason => {
                    tracing::debug!(%reason, address = %params.address, "Email fact check failed");
                    MintError::FactVerificationFailed {
                        address: params.address.clone(),
                        fact: EMAIL_FACT.to_string(),
                        value: params.email.clone(),
                        verifier: params.verifier.clone(),
                    }
                }
            })
    }

    /// Validate and persist a new user.
    pub fn register(&self, ctx: &OpContext, params: UserParams) -> MintResult<User> {
        self.validate(ctx, &params)?;

        let user = User {
            address: params.address,
            username: params.username,
            email: params.email,
            encrypted_seed: params.encrypted_seed,
            verifier: params.verifier,
            created: Utc::now().trunc_subsecs(6),
        };
        self.users.create_user(ctx, &user)?;
        Ok(user)
    }
}
