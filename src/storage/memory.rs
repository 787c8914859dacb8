// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! In-memory storage engine.
//!
//! Used by tests and by nodes started without a data directory. A write
//! transaction holds the network's lock for its whole lifetime and mutates the
//! tables in place, recording an undo entry per change. Commit discards the
//! log; dropping an uncommitted transaction replays it in reverse.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard};

use super::backend::{BalanceBackend, StorageError, StorageResult, WriteTxn};
use super::rows::{BalanceRow, FactRow, UserRow};
use crate::network::Network;

type BalanceKey = (String, String, String);
type FactKey = (String, String, String);

#[derive(Debug, Default)]
struct Tables {
    /// token → row, ordered so scans are deterministic
    balances: BTreeMap<String, BalanceRow>,
    balance_keys: HashMap<BalanceKey, String>,
    users: HashMap<String, UserRow>,
    usernames: HashMap<String, String>,
    emails: HashMap<String, String>,
    facts: HashMap<FactKey, FactRow>,
}

fn balance_key(row: &BalanceRow) -> BalanceKey {
    (row.asset.clone(), row.holder.clone(), row.propagation.clone())
}

fn fact_key(address: &str, fact: &str, verifier: &str) -> FactKey {
    (address.to_string(), fact.to_string(), verifier.to_string())
}

impl Tables {
    fn token_for(&self, asset: &str, holder: &str, propagation: &str) -> Option<&String> {
        self.balance_keys
            .get(&(asset.to_string(), holder.to_string(), propagation.to_string()))
    }

    fn put_balance(&mut self, row: BalanceRow) {
        self.balance_keys.insert(balance_key(&row), row.token.clone());
        self.balances.insert(row.token.clone(), row);
    }

    fn take_balance(&mut self, token: &str) -> Option<BalanceRow> {
        let row = self.balances.remove(token)?;
        self.balance_keys.remove(&balance_key(&row));
        Some(row)
    }

    fn revert(&mut self, entry: Undo) {
        match entry {
            Undo::BalanceInserted(token) => {
                self.take_balance(&token);
            }
            Undo::BalanceValue { token, previous } => {
                if let Some(row) = self.balances.get_mut(&token) {
                    row.value = previous;
                }
            }
            Undo::BalanceRemoved(row) => self.put_balance(row),
            Undo::UserInserted(row) => {
                self.users.remove(&row.address);
                self.usernames.remove(&row.username);
                self.emails.remove(&row.email);
            }
            Undo::FactPut { key, previous } => {
                match previous {
                    Some(row) => self.facts.insert(key, row),
                    None => self.facts.remove(&key),
                };
            }
        }
    }
}

/// Inverse of one change applied by a write transaction.
#[derive(Debug)]
enum Undo {
    BalanceInserted(String),
    BalanceValue { token: String, previous: String },
    BalanceRemoved(BalanceRow),
    UserInserted(UserRow),
    FactPut { key: FactKey, previous: Option<FactRow> },
}

#[derive(Debug, Default)]
pub struct MemoryBackend {
    test: Mutex<Tables>,
    live: Mutex<Tables>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self, network: Network) -> StorageResult<MutexGuard<'_, Tables>> {
        let tables = match network {
            Network::Test => &self.test,
            Network::Live => &self.live,
        };
        tables.lock().map_err(|_| StorageError::Poisoned)
    }
}

impl BalanceBackend for MemoryBackend {
    fn begin_write(&self, network: Network) -> StorageResult<Box<dyn WriteTxn + '_>> {
        Ok(Box::new(MemoryWriteTxn {
            tables: self.lock(network)?,
            undo: Vec::new(),
        }))
    }

    fn balance_by_asset_holder(
        &self,
        network: Network,
        asset: &str,
        holder: &str,
        propagation: &str,
    ) -> StorageResult<Option<BalanceRow>> {
        let tables = self.lock(network)?;
        Ok(tables
            .token_for(asset, holder, propagation)
            .and_then(|token| tables.balances.get(token))
            .cloned())
    }

    fn balances_by_holder(&self, network: Network, holder: &str) -> StorageResult<Vec<BalanceRow>> {
        let tables = self.lock(network)?;
        Ok(tables
            .balances
            .values()
            .filter(|row| row.holder == holder)
            .cloned()
            .collect())
    }

    fn user_by_address(&self, network: Network, address: &str) -> StorageResult<Option<UserRow>> {
        Ok(self.lock(network)?.users.get(address).cloned())
    }

    fn fact(
        &self,
        network: Network,
        address: &str,
        fact: &str,
        verifier: &str,
    ) -> StorageResult<Option<FactRow>> {
        Ok(self
            .lock(network)?
            .facts
            .get(&fact_key(address, fact, verifier))
            .cloned())
    }

    fn health_check(&self) -> StorageResult<()> {
        for network in Network::ALL {
            self.lock(network)?;
        }
        Ok(())
    }
}

struct MemoryWriteTxn<'a> {
    tables: MutexGuard<'a, Tables>,
    /// Changes applied so far, oldest first
    undo: Vec<Undo>,
}

impl Drop for MemoryWriteTxn<'_> {
    fn drop(&mut self) {
        while let Some(entry) = self.undo.pop() {
            self.tables.revert(entry);
        }
    }
}

impl WriteTxn for MemoryWriteTxn<'_> {
    fn insert_balance(&mut self, row: &BalanceRow) -> StorageResult<()> {
        if self.tables.balance_keys.contains_key(&balance_key(row)) {
            return Err(StorageError::UniqueViolation(
                "balances(asset, holder, propagation)".to_string(),
            ));
        }
        if self.tables.balances.contains_key(&row.token) {
            return Err(StorageError::UniqueViolation("balances(token)".to_string()));
        }
        self.tables.put_balance(row.clone());
        self.undo.push(Undo::BalanceInserted(row.token.clone()));
        Ok(())
    }

    fn balance_by_token(&mut self, token: &str) -> StorageResult<Option<BalanceRow>> {
        Ok(self.tables.balances.get(token).cloned())
    }

    fn balance_by_asset_holder(
        &mut self,
        asset: &str,
        holder: &str,
        propagation: &str,
    ) -> StorageResult<Option<BalanceRow>> {
        Ok(self
            .tables
            .token_for(asset, holder, propagation)
            .and_then(|token| self.tables.balances.get(token))
            .cloned())
    }

    fn update_balance_value(
        &mut self,
        owner: &str,
        token: &str,
        value: &str,
    ) -> StorageResult<bool> {
        match self.tables.balances.get_mut(token) {
            Some(row) if row.owner == owner => {
                let previous = std::mem::replace(&mut row.value, value.to_string());
                self.undo.push(Undo::BalanceValue {
                    token: token.to_string(),
                    previous,
                });
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    fn remove_balance(&mut self, token: &str) -> StorageResult<bool> {
        let Some(row) = self.tables.take_balance(token) else {
            return Ok(false);
        };
        self.undo.push(Undo::BalanceRemoved(row));
        Ok(true)
    }

    fn insert_user(&mut self, row: &UserRow) -> StorageResult<()> {
        if self.tables.users.contains_key(&row.address) {
            return Err(StorageError::UniqueViolation("users(address)".to_string()));
        }
        if self.tables.usernames.contains_key(&row.username) {
            return Err(StorageError::UniqueViolation("users(username)".to_string()));
        }
        if self.tables.emails.contains_key(&row.email) {
            return Err(StorageError::UniqueViolation("users(email)".to_string()));
        }
        let tables = &mut *self.tables;
        tables
            .usernames
            .insert(row.username.clone(), row.address.clone());
        tables.emails.insert(row.email.clone(), row.address.clone());
        tables.users.insert(row.address.clone(), row.clone());
        self.undo.push(Undo::UserInserted(row.clone()));
        Ok(())
    }

    fn put_fact(&mut self, row: &FactRow) -> StorageResult<()> {
        let key = fact_key(&row.address, &row.fact, &row.verifier);
        let previous = self.tables.facts.insert(key.clone(), row.clone());
        self.undo.push(Undo::FactPut { key, previous });
        Ok(())
    }

    fn commit(mut self: Box<Self>) -> StorageResult<()> {
        self.undo.clear();
        Ok(())
    }
}
