// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Embedded mint database backed by redb (pure Rust, ACID).
//!
//! ## Table Layout
//!
//! Every table exists once per network (`test_*` and `live_*`):
//!
//! - `balances`: token → serialized [`BalanceRow`]
//! - `balance_keys`: composite key (asset|holder|propagation) → token
//! - `holder_index`: composite key (holder|token) → token
//! - `users`: address → serialized [`UserRow`]
//! - `usernames`: username → address
//! - `emails`: email → address
//! - `facts`: composite key (address|fact|verifier) → serialized [`FactRow`]
//!
//! redb serializes writers, so the existence checks and inserts performed
//! inside one write transaction are atomic with respect to other writers.

use std::path::Path;

use redb::{Database, ReadableDatabase, ReadableTable, TableDefinition, WriteTransaction};

use super::backend::{BalanceBackend, StorageError, StorageResult, WriteTxn};
use super::rows::{BalanceRow, FactRow, UserRow};
use crate::network::Network;

// =============================================================================
// Table Definitions
// =============================================================================

type StrTable = TableDefinition<'static, &'static str, &'static str>;
type BlobTable = TableDefinition<'static, &'static str, &'static [u8]>;
type IndexTable = TableDefinition<'static, &'static [u8], &'static str>;
type KeyedBlobTable = TableDefinition<'static, &'static [u8], &'static [u8]>;

struct NetworkTables {
    balances: BlobTable,
    balance_keys: IndexTable,
    holder_index: IndexTable,
    users: BlobTable,
    usernames: StrTable,
    emails: StrTable,
    facts: KeyedBlobTable,
}

const TEST_TABLES: NetworkTables = NetworkTables {
    balances: TableDefinition::new("test_balances"),
    balance_keys: TableDefinition::new("test_balance_keys"),
    holder_index: TableDefinition::new("test_holder_index"),
    users: TableDefinition::new("test_users"),
    usernames: TableDefinition::new("test_usernames"),
    emails: TableDefinition::new("test_emails"),
    facts: TableDefinition::new("test_facts"),
};

const LIVE_TABLES: NetworkTables = NetworkTables {
    balances: TableDefinition::new("live_balances"),
    balance_keys: TableDefinition::new("live_balance_keys"),
    holder_index: TableDefinition::new("live_holder_index"),
    users: TableDefinition::new("live_users"),
    usernames: TableDefinition::new("live_usernames"),
    emails: TableDefinition::new("live_emails"),
    facts: TableDefinition::new("live_facts"),
};

fn tables(network: Network) -> &'static NetworkTables {
    match network {
        Network::Test => &TEST_TABLES,
        Network::Live => &LIVE_TABLES,
    }
}

// =============================================================================
// Index Key Helpers
// =============================================================================

/// Append a length-prefixed field so no field value can forge a boundary.
fn push_field(key: &mut Vec<u8>, field: &str) {
    key.extend_from_slice(&(field.len() as u32).to_be_bytes());
    key.extend_from_slice(field.as_bytes());
}

fn balance_key(asset: &str, holder: &str, propagation: &str) -> Vec<u8> {
    let mut key = Vec::with_capacity(12 + asset.len() + holder.len() + propagation.len());
    push_field(&mut key, asset);
    push_field(&mut key, holder);
    push_field(&mut key, propagation);
    key
}

fn fact_key(address: &str, fact: &str, verifier: &str) -> Vec<u8> {
    let mut key = Vec::with_capacity(12 + address.len() + fact.len() + verifier.len());
    push_field(&mut key, address);
    push_field(&mut key, fact);
    push_field(&mut key, verifier);
    key
}

fn holder_prefix(holder: &str) -> Vec<u8> {
    let mut prefix = Vec::with_capacity(4 + holder.len());
    push_field(&mut prefix, holder);
    prefix
}

fn holder_key(holder: &str, token: &str) -> Vec<u8> {
    let mut key = holder_prefix(holder);
    key.extend_from_slice(token.as_bytes());
    key
}

/// Upper bound for a prefix scan; 0xFF never occurs in UTF-8 text.
fn holder_prefix_end(holder: &str) -> Vec<u8> {
    let mut end = holder_prefix(holder);
    end.push(0xFF);
    end
}

fn decode<T: serde::de::DeserializeOwned>(bytes: &[u8]) -> StorageResult<T> {
    Ok(serde_json::from_slice(bytes)?)
}

// =============================================================================
// MintDatabase
// =============================================================================

/// Embedded ACID database holding both networks' ledgers and registries.
pub struct MintDatabase {
    db: Database,
}

impl MintDatabase {
    /// Open (or create) the database at the given path.
    pub fn open(path: &Path) -> StorageResult<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let db = Database::create(path)?;

        // Pre-create all tables so later read transactions don't fail
        let write_txn = db.begin_write()?;
        for network in Network::ALL {
            let t = tables(network);
            let _ = write_txn.open_table(t.balances)?;
            let _ = write_txn.open_table(t.balance_keys)?;
            let _ = write_txn.open_table(t.holder_index)?;
            let _ = write_txn.open_table(t.users)?;
            let _ = write_txn.open_table(t.usernames)?;
            let _ = write_txn.open_table(t.emails)?;
            let _ = write_txn.open_table(t.facts)?;
        }
        write_txn.commit()?;

        tracing::info!(path = %path.display(), "Mint database opened");
        Ok(Self { db })
    }
}

impl BalanceBackend for MintDatabase {
    fn begin_write(&self, network: Network) -> StorageResult<Box<dyn WriteTxn + '_>> {
        Ok(Box::new(RedbWriteTxn {
            txn: self.db.begin_write()?,
            tables: tables(network),
        }))
    }

    fn balance_by_asset_holder(
        &self,
        network: Network,
        asset: &str,
        holder: &str,
        propagation: &str,
    ) -> StorageResult<Option<BalanceRow>> {
        let t = tables(network);
        let read_txn = self.db.begin_read()?;
        let keys = read_txn.open_table(t.balance_keys)?;
        let key = balance_key(asset, holder, propagation);
        let Some(token) = keys.get(key.as_slice())? else {
            return Ok(None);
        };

        let balances = read_txn.open_table(t.balances)?;
        match balances.get(token.value())? {
            Some(row) => Ok(Some(decode(row.value())?)),
            None => Err(StorageError::Corrupt(format!(
                "balance key points at missing token {}",
                token.value()
            ))),
        }
    }

    fn balances_by_holder(&self, network: Network, holder: &str) -> StorageResult<Vec<BalanceRow>> {
        let t = tables(network);
        let read_txn = self.db.begin_read()?;
        let index = read_txn.open_table(t.holder_index)?;
        let balances = read_txn.open_table(t.balances)?;

        let start = holder_prefix(holder);
        let end = holder_prefix_end(holder);
        let mut rows = Vec::new();
        for entry in index.range(start.as_slice()..end.as_slice())? {
            let (_, token) = entry?;
            if let Some(row) = balances.get(token.value())? {
                rows.push(decode(row.value())?);
            }
        }
        Ok(rows)
    }

    fn user_by_address(&self, network: Network, address: &str) -> StorageResult<Option<UserRow>> {
        let read_txn = self.db.begin_read()?;
        let users = read_txn.open_table(tables(network).users)?;
        match users.get(address)? {
            Some(row) => Ok(Some(decode(row.value())?)),
            None => Ok(None),
        }
    }

    fn fact(
        &self,
        network: Network,
        address: &str,
        fact: &str,
        verifier: &str,
    ) -> StorageResult<Option<FactRow>> {
        let read_txn = self.db.begin_read()?;
        let facts = read_txn.open_table(tables(network).facts)?;
        match facts.get(fact_key(address, fact, verifier).as_slice())? {
            Some(row) => Ok(Some(decode(row.value())?)),
            None => Ok(None),
        }
    }

    fn health_check(&self) -> StorageResult<()> {
        let read_txn = self.db.begin_read()?;
        let _ = read_txn.open_table(TEST_TABLES.balances)?;
        Ok(())
    }
}

struct RedbWriteTxn {
    txn: WriteTransaction,
    tables: &'static NetworkTables,
}

impl RedbWriteTxn {
    fn read_balance(&self, token: &str) -> StorageResult<Option<BalanceRow>> {
        let balances = self.txn.open_table(self.tables.balances)?;
        let row = match balances.get(token)? {
            Some(row) => Some(decode(row.value())?),
            None => None,
        };
        Ok(row)
    }
}

impl WriteTxn for RedbWriteTxn {
    fn insert_balance(&mut self, row: &BalanceRow) -> StorageResult<()> {
        let json = serde_json::to_vec(row)?;
        let key = balance_key(&row.asset, &row.holder, &row.propagation);

        let mut balances = self.txn.open_table(self.tables.balances)?;
        let mut keys = self.txn.open_table(self.tables.balance_keys)?;
        let mut index = self.txn.open_table(self.tables.holder_index)?;

        if keys.get(key.as_slice())?.is_some() {
            return Err(StorageError::UniqueViolation(
                "balances(asset, holder, propagation)".to_string(),
            ));
        }
        if balances.get(row.token.as_str())?.is_some() {
            return Err(StorageError::UniqueViolation("balances(token)".to_string()));
        }

        balances.insert(row.token.as_str(), json.as_slice())?;
        keys.insert(key.as_slice(), row.token.as_str())?;
        index.insert(holder_key(&row.holder, &row.token).as_slice(), row.token.as_str())?;
        Ok(())
    }

    fn balance_by_token(&mut self, token: &str) -> StorageResult<Option<BalanceRow>> {
        self.read_balance(token)
    }

    fn balance_by_asset_holder(
        &mut self,
        asset: &str,
        holder: &str,
        propagation: &str,
    ) -> StorageResult<Option<BalanceRow>> {
        let token = {
            let keys = self.txn.open_table(self.tables.balance_keys)?;
            let key = balance_key(asset, holder, propagation);
            let found = keys.get(key.as_slice())?.map(|t| t.value().to_string());
            found
        };
        match token {
            Some(token) => self.read_balance(&token),
            None => Ok(None),
        }
    }

    fn update_balance_value(
        &mut self,
        owner: &str,
        token: &str,
        value: &str,
    ) -> StorageResult<bool> {
        let mut balances = self.txn.open_table(self.tables.balances)?;

        // Read existing value and deserialize before mutating
        let existing: Option<BalanceRow> = match balances.get(token)? {
            Some(bytes) => Some(decode(bytes.value())?),
            None => None,
        };
        let Some(mut row) = existing.filter(|row| row.owner == owner) else {
            return Ok(false);
        };

        row.value = value.to_string();
        let json = serde_json::to_vec(&row)?;
        balances.insert(token, json.as_slice())?;
        Ok(true)
    }

    fn remove_balance(&mut self, token: &str) -> StorageResult<bool> {
        let mut balances = self.txn.open_table(self.tables.balances)?;
        let removed: Option<BalanceRow> = match balances.remove(token)? {
            Some(bytes) => Some(decode(bytes.value())?),
            None => None,
        };
        let Some(row) = removed else {
            return Ok(false);
        };

        let mut keys = self.txn.open_table(self.tables.balance_keys)?;
        keys.remove(balance_key(&row.asset, &row.holder, &row.propagation).as_slice())?;
        let mut index = self.txn.open_table(self.tables.holder_index)?;
        index.remove(holder_key(&row.holder, &row.token).as_slice())?;
        Ok(true)
    }

    fn insert_user(&mut self, row: &UserRow) -> StorageResult<()> {
        let json = serde_json::to_vec(row)?;

        let mut users = self.txn.open_table(self.tables.users)?;
        let mut usernames = self.txn.open_table(self.tables.usernames)?;
        let mut emails = self.txn.open_table(self.tables.emails)?;

        if users.get(row.address.as_str())?.is_some() {
            return Err(StorageError::UniqueViolation("users(address)".to_string()));
        }
        if usernames.get(row.username.as_str())?.is_some() {
            return Err(StorageError::UniqueViolation("users(username)".to_string()));
        }
        if emails.get(row.email.as_str())?.is_some() {
            return Err(StorageError::UniqueViolation("users(email)".to_string()));
        }

        users.insert(row.address.as_str(), json.as_slice())?;
        usernames.insert(row.username.as_str(), row.address.as_str())?;
        emails.insert(row.email.as_str(), row.address.as_str())?;
        Ok(())
    }

    fn put_fact(&mut self, row: &FactRow) -> StorageResult<()> {
        let json = serde_json::to_vec(row)?;
        let key = fact_key(&row.address, &row.fact, &row.verifier);
        let mut facts = self.txn.open_table(self.tables.facts)?;
        facts.insert(key.as_slice(), json.as_slice())?;
        Ok(())
    }

    fn commit(self: Box<Self>) -> StorageResult<()> {
        self.txn.commit()?;
        Ok(())
    }
}

// =============================================================================
// Tests
// =============================================================================
