// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Storage adapter capability.
//!
//! Repositories talk to an engine only through [`BalanceBackend`] and
//! [`WriteTxn`]. Engines enforce the uniqueness constraints themselves, inside
//! the write transaction, and report a lost race as
//! [`StorageError::UniqueViolation`].
//!
//! A [`WriteTxn`] that is dropped without [`WriteTxn::commit`] is rolled back.

use super::rows::{BalanceRow, FactRow, UserRow};
use crate::network::Network;

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("redb error: {0}")]
    Redb(#[from] redb::Error),

    #[error("redb database error: {0}")]
    RedbDatabase(#[from] redb::DatabaseError),

    #[error("redb transaction error: {0}")]
    RedbTransaction(#[from] redb::TransactionError),

    #[error("redb table error: {0}")]
    RedbTable(#[from] redb::TableError),

    #[error("redb storage error: {0}")]
    RedbStorage(#[from] redb::StorageError),

    #[error("redb commit error: {0}")]
    RedbCommit(#[from] redb::CommitError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    /// A unique index already holds the key.
    #[error("unique constraint {0} violated")]
    UniqueViolation(String),

    /// A writer panicked while holding the in-memory tables.
    #[error("storage lock poisoned")]
    Poisoned,

    /// Index and primary table disagree.
    #[error("corrupt storage: {0}")]
    Corrupt(String),
}

impl StorageError {
    /// The one engine-agnostic signal repositories use to detect lost races.
    pub fn is_unique_violation(&self) -> bool {
        matches!(self, StorageError::UniqueViolation(_))
    }
}

pub type StorageResult<T> = Result<T, StorageError>;

/// An open write transaction scoped to one network.
pub trait WriteTxn {
    /// Insert a new balance. Fails with `UniqueViolation` when the token or
    /// the `(asset, holder, propagation)` key is taken.
    fn insert_balance(&mut self, row: &BalanceRow) -> StorageResult<()>;

    fn balance_by_token(&mut self, token: &str) -> StorageResult<Option<BalanceRow>>;

    fn balance_by_asset_holder(
        &mut self,
        asset: &str,
        holder: &str,
        propagation: &str,
    ) -> StorageResult<Option<BalanceRow>>;

    /// Overwrite `value` of the row keyed by `(owner, token)`.
    /// Returns `false` when no such row exists.
    fn update_balance_value(&mut self, owner: &str, token: &str, value: &str)
        -> StorageResult<bool>;

    /// Remove a balance and its index entries. Returns `false` when absent.
    fn remove_balance(&mut self, token: &str) -> StorageResult<bool>;

    /// Insert a new user. Address, username and email are each unique.
    fn insert_user(&mut self, row: &UserRow) -> StorageResult<()>;

    /// Insert or replace the fact keyed by `(address, fact, verifier)`.
    fn put_fact(&mut self, row: &FactRow) -> StorageResult<()>;

    fn commit(self: Box<Self>) -> StorageResult<()>;
}

/// A storage engine holding both networks' tables.
pub trait BalanceBackend: Send + Sync {
    fn begin_write(&self, network: Network) -> StorageResult<Box<dyn WriteTxn + '_>>;

    fn balance_by_asset_holder(
        &self,
        network: Network,
        asset: &str,
        holder: &str,
        propagation: &str,
    ) -> StorageResult<Option<BalanceRow>>;

    /// All balances of a holder, read from a single snapshot.
    fn balances_by_holder(&self, network: Network, holder: &str) -> StorageResult<Vec<BalanceRow>>;

    fn user_by_address(&self, network: Network, address: &str) -> StorageResult<Option<UserRow>>;

    fn fact(
        &self,
        network: Network,
        address: &str,
        fact: &str,
        verifier: &str,
    ) -> StorageResult<Option<FactRow>>;

    /// Cheap check used by the readiness endpoint.
    fn health_check(&self) -> StorageResult<()>;
}
