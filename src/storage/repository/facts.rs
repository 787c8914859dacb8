// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Attested facts.
//!
//! A fact is keyed by `(address, fact, verifier)`: each verifier holds its
//! own statement about an address, and a newer statement from the same
//! verifier replaces the older one.

use chrono::{DateTime, SecondsFormat, Utc};

use crate::context::OpContext;
use crate::error::{MintError, MintResult};
use crate::storage::backend::{BalanceBackend, StorageError, StorageResult};
use crate::storage::rows::FactRow;

/// A verifier's accepted statement `fact = value` about an address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fact {
    pub address: String,
    pub fact: String,
    pub value: String,
    /// Canonical verifier address
    pub verifier: String,
    pub created: DateTime<Utc>,
}

fn fact_to_row(fact: &Fact) -> FactRow {
    FactRow {
        address: fact.address.clone(),
        fact: fact.fact.clone(),
        verifier: fact.verifier.clone(),
        value: fact.value.clone(),
        created: fact.created.to_rfc3339_opts(SecondsFormat::AutoSi, true),
    }
}

fn fact_from_row(row: FactRow) -> StorageResult<Fact> {
    let created = DateTime::parse_from_rfc3339(&row.created)
        .map_err(|e| StorageError::Corrupt(format!("fact {} created: {e}", row.address)))?
        .with_timezone(&Utc);
    Ok(Fact {
        address: row.address,
        fact: row.fact,
        value: row.value,
        verifier: row.verifier,
        created,
    })
}

/// Repository for facts on the network each context selects.
pub struct FactRepository<'a> {
    backend: &'a dyn BalanceBackend,
}

impl<'a> FactRepository<'a> {
    pub fn new(backend: &'a dyn BalanceBackend) -> Self {
        Self { backend }
    }

    /// Insert or replace the verifier's statement about the address.
    pub fn record_fact(&self, ctx: &OpContext, fact: &Fact) -> MintResult<()> {
        const OP: &str = "record_fact";
        ctx.check(OP)?;

        let key = format!(
            "address={} fact={} verifier={}",
            fact.address, fact.fact, fact.verifier
        );
        let mut txn = self
            .backend
            .begin_write(ctx.network())
            .map_err(|e| MintError::storage(OP, &key, e))?;
        txn.put_fact(&fact_to_row(fact))
            .map_err(|e| MintError::storage(OP, &key, e))?;
        ctx.check(OP)?;
        txn.commit().map_err(|e| MintError::storage(OP, &key, e))
    }

    pub fn load_fact(
        &self,
        ctx: &OpContext,
        address: &str,
        fact: &str,
        verifier: &str,
    ) -> MintResult<Option<Fact>> {
        const OP: &str = "load_fact";
        ctx.check(OP)?;
        let key = format!("address={address} fact={fact} verifier={verifier}");
        self.backend
            .fact(ctx.network(), address, fact, verifier)
            .map_err(|e| MintError::storage(OP, &key, e))?
            .map(fact_from_row)
            .transpose()
            .map_err(|e| MintError::storage(OP, &key, e))
    }
}
