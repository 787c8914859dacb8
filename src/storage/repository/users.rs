// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! User registry.
//!
//! Users are keyed by address. Username and email are unique per network as
//! well; the engine enforces all three inside the insert transaction.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use utoipa::ToSchema;

use crate::context::OpContext;
use crate::error::{MintError, MintResult};
use crate::storage::backend::{BalanceBackend, StorageError, StorageResult};
use crate::storage::rows::UserRow;

/// Unique index names reported by the engines.
pub const USERNAME_CONSTRAINT: &str = "users(username)";
pub const EMAIL_CONSTRAINT: &str = "users(email)";

/// A registered user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct User {
    /// Address of the user's account on the network
    pub address: String,
    pub username: String,
    /// Lowercased, verified email
    pub email: String,
    /// Client-side encrypted seed, opaque to the mint
    pub encrypted_seed: String,
    /// Address of the verifier that attested the email
    pub verifier: String,
    pub created: DateTime<Utc>,
}

pub fn user_to_row(user: &User) -> UserRow {
    UserRow {
        address: user.address.clone(),
        username: user.username.clone(),
        email: user.email.clone(),
        encrypted_seed: user.encrypted_seed.clone(),
        verifier: user.verifier.clone(),
        created: user.created.to_rfc3339_opts(SecondsFormat::AutoSi, true),
    }
}

pub fn user_from_row(row: UserRow) -> StorageResult<User> {
    let created = DateTime::parse_from_rfc3339(&row.created)
        .map_err(|e| StorageError::Corrupt(format!("user {} created: {e}", row.address)))?
        .with_timezone(&Utc);
    Ok(User {
        address: row.address,
        username: row.username,
        email: row.email,
        encrypted_seed: row.encrypted_seed,
        verifier: row.verifier,
        created,
    })
}

/// Repository for users on the network each context selects.
pub struct UserRepository<'a> {
    backend: &'a dyn BalanceBackend,
}

impl<'a> UserRepository<'a> {
    pub fn new(backend: &'a dyn BalanceBackend) -> Self {
        Self { backend }
    }

    /// Persist a new user.
    ///
    /// A taken address, username or email yields `UniqueConstraintViolation`
    /// whose detail names the constraint.
    pub fn create_user(&self, ctx: &OpContext, user: &User) -> MintResult<()> {
        const OP: &str = "create_user";
        ctx.check(OP)?;

        let key = format!("address={}", user.address);
        let mut txn = self
            .backend
            .begin_write(ctx.network())
            .map_err(|e| MintError::storage(OP, &key, e))?;
        txn.insert_user(&user_to_row(user)).map_err(|e| match e {
            StorageError::UniqueViolation(constraint) => MintError::UniqueConstraintViolation {
                operation: OP,
                detail: constraint,
            },
            other => MintError::storage(OP, &key, other),
        })?;
        ctx.check(OP)?;
        txn.commit().map_err(|e| MintError::storage(OP, &key, e))?;

        tracing::info!(
            network = %ctx.network(),
            address = %user.address,
            username = %user.username,
            "Registered user"
        );
        Ok(())
    }

    pub fn load_user_by_address(&self, ctx: &OpContext, address: &str) -> MintResult<Option<User>> {
        const OP: &str = "load_user_by_address";
        ctx.check(OP)?;
        let key = format!("address={address}");
        self.backend
            .user_by_address(ctx.network(), address)
            .map_err(|e| MintError::storage(OP, &key, e))?
            .map(user_from_row)
            .transpose()
            .map_err(|e| MintError::storage(OP, &key, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::Network;
    use crate::storage::MemoryBackend;
    use chrono::SubsecRound;

    fn user(address: &str, username: &str, email: &str) -> User {
        User {
            address: address.to_string(),
            username: username.to_string(),
            email: email.to_string(),
            encrypted_seed: "c2VlZA==".to_string(),
            verifier: "verifier".to_string(),
            created: Utc::now().trunc_subsecs(6),
        }
    }

    #[test]
    fn create_and_load() {
        let backend = MemoryBackend::new();
        let repo = UserRepository::new(&backend);
        let ctx = OpContext::new(Network::Test);
        let alice = user("addr1", "alice", "alice@example.com");
        repo.create_user(&ctx, &alice).unwrap();

        assert_eq!(repo.load_user_by_address(&ctx, "addr1").unwrap(), Some(alice));
        assert!(repo
            .load_user_by_address(&OpContext::new(Network::Live), "addr1")
            .unwrap()
            .is_none());
    }

    #[test]
    fn duplicate_username_names_constraint() {
        let backend = MemoryBackend::new();
        let repo = UserRepository::new(&backend);
        let ctx = OpContext::new(Network::Test);
        repo.create_user(&ctx, &user("addr1", "alice", "a@example.com"))
            .unwrap();

        let err = repo
            .create_user(&ctx, &user("addr2", "alice", "b@example.com"))
            .unwrap_err();
        match err {
            MintError::UniqueConstraintViolation { detail, .. } => {
                assert_eq!(detail, USERNAME_CONSTRAINT)
            }
            other => panic!("unexpected error: {other:?}"),
        }

        let err = repo
            .create_user(&ctx, &user("addr3", "bob", "a@example.com"))
            .unwrap_err();
        assert!(err.is_unique_violation());
    }
}
