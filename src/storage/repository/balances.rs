// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Balance repository.
//!
//! A balance is identified by an opaque token and keyed by
//! `(asset, holder, propagation)`. The *canonical* balance of a pair lives
//! only on the mint that owns it; other mints keep an advisory *propagated*
//! copy that is refreshed from the owner and never written back.
//!
//! Assets are named `{issuer}:{code}`, where `issuer` is the address of the
//! owning mint. Both creation and propagation refuse an asset whose issuer is
//! not the balance owner, so two mints can never hold canonical balances of
//! the same asset and one issuer's copy never displaces another's.
//!
//! Value changes go through [`BalanceStore::update_value`], which reads,
//! transforms and writes inside a single write transaction so concurrent
//! writers cannot interleave between the read and the write.

use chrono::{DateTime, SecondsFormat, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::amount::{Amount, AmountError};
use crate::context::OpContext;
use crate::error::{MintError, MintResult};
use crate::storage::backend::{BalanceBackend, StorageError, StorageResult};
use crate::storage::rows::{BalanceRow, PROPAGATION_CANONICAL, PROPAGATION_PROPAGATED};

/// Attempts made by load-or-create before giving up on a contended key.
const LOAD_OR_CREATE_ATTEMPTS: usize = 3;

/// Separates the issuing mint's address from the asset code.
pub const ASSET_SEPARATOR: char = ':';

/// Asset identifier `{issuer}:{code}`.
pub fn qualified_asset(issuer: &str, code: &str) -> String {
    format!("{issuer}{ASSET_SEPARATOR}{code}")
}

/// Issuing mint of an asset identifier, if it is well formed.
pub fn asset_issuer(asset: &str) -> Option<&str> {
    let (issuer, code) = asset.split_once(ASSET_SEPARATOR)?;
    let well_formed = !issuer.is_empty() && !code.is_empty() && !code.contains(ASSET_SEPARATOR);
    well_formed.then_some(issuer)
}

/// Fail with `asset_invalid` unless `asset` is issued by `owner`.
pub fn check_asset_issuer(asset: &str, owner: &str) -> MintResult<()> {
    if asset_issuer(asset) == Some(owner) {
        Ok(())
    } else {
        Err(MintError::validation(
            "asset_invalid",
            format!("asset {asset} is not of the form {owner}{ASSET_SEPARATOR}<code>"),
        ))
    }
}

/// Whether a balance is authoritative on this mint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Propagation {
    /// Authoritative copy, resides on the owning mint
    Canonical,
    /// Advisory copy held by another mint
    Propagated,
}

impl Propagation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Propagation::Canonical => PROPAGATION_CANONICAL,
            Propagation::Propagated => PROPAGATION_PROPAGATED,
        }
    }

    fn parse(value: &str) -> Option<Self> {
        match value {
            PROPAGATION_CANONICAL => Some(Propagation::Canonical),
            PROPAGATION_PROPAGATED => Some(Propagation::Propagated),
            _ => None,
        }
    }
}

/// A holder's balance of an asset.
///
/// Only `value` changes after creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Balance {
    /// Address of the mint that owns the canonical balance
    owner: String,
    /// Opaque identifier, unique per network
    token: String,
    created: DateTime<Utc>,
    propagation: Propagation,
    asset: String,
    holder: String,
    #[schema(value_type = String, example = "150")]
    value: Amount,
}

impl Balance {
    pub fn owner(&self) -> &str {
        &self.owner
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn created(&self) -> DateTime<Utc> {
        self.created
    }

    pub fn propagation(&self) -> Propagation {
        self.propagation
    }

    pub fn asset(&self) -> &str {
        &self.asset
    }

    pub fn holder(&self) -> &str {
        &self.holder
    }

    pub fn value(&self) -> Amount {
        self.value
    }

    pub fn set_value(&mut self, value: Amount) {
        self.value = value;
    }

    pub fn is_canonical(&self) -> bool {
        self.propagation == Propagation::Canonical
    }
}

fn new_token() -> String {
    format!("balance_{}", Uuid::new_v4().simple())
}

pub fn balance_to_row(balance: &Balance) -> BalanceRow {
    BalanceRow {
        owner: balance.owner.clone(),
        token: balance.token.clone(),
        created: balance.created.to_rfc3339_opts(SecondsFormat::AutoSi, true),
        propagation: balance.propagation.as_str().to_string(),
        asset: balance.asset.clone(),
        holder: balance.holder.clone(),
        value: balance.value.to_string(),
    }
}

pub fn balance_from_row(row: BalanceRow) -> StorageResult<Balance> {
    let created = DateTime::parse_from_rfc3339(&row.created)
        .map_err(|e| StorageError::Corrupt(format!("balance {} created: {e}", row.token)))?
        .with_timezone(&Utc);
    let propagation = Propagation::parse(&row.propagation).ok_or_else(|| {
        StorageError::Corrupt(format!(
            "balance {} propagation {:?}",
            row.token, row.propagation
        ))
    })?;
    let value = row
        .value
        .parse()
        .map_err(|e| StorageError::Corrupt(format!("balance {} value: {e}", row.token)))?;

    Ok(Balance {
        owner: row.owner,
        token: row.token,
        created,
        propagation,
        asset: row.asset,
        holder: row.holder,
        value,
    })
}

fn pair_key(asset: &str, holder: &str) -> String {
    format!("asset={asset} holder={holder}")
}

fn token_key(owner: &str, token: &str) -> String {
    format!("owner={owner} token={token}")
}

/// Repository for balances of one mint on one network.
pub struct BalanceStore<'a> {
    backend: &'a dyn BalanceBackend,
    local_mint: &'a str,
}

impl<'a> BalanceStore<'a> {
    /// `local_mint` is this mint's address on the network the operations'
    /// contexts select.
    pub fn new(backend: &'a dyn BalanceBackend, local_mint: &'a str) -> Self {
        Self {
            backend,
            local_mint,
        }
    }

    /// Insert a new canonical balance owned by this mint.
    ///
    /// Fails with `UniqueConstraintViolation` when a canonical balance of the
    /// pair already exists, including when another writer won a race.
    pub fn create_canonical_balance(
        &self,
        ctx: &OpContext,
        owner: &str,
        asset: &str,
        holder: &str,
        value: Amount,
    ) -> MintResult<Balance> {
        const OP: &str = "create_canonical_balance";
        ctx.check(OP)?;

        if owner != self.local_mint {
            return Err(MintError::validation(
                "balance_owner_invalid",
                format!("canonical balances can only be owned by {}", self.local_mint),
            ));
        }
        check_asset_issuer(asset, owner)?;

        let balance = Balance {
            owner: owner.to_string(),
            token: new_token(),
            created: Utc::now().trunc_subsecs(6),
            propagation: Propagation::Canonical,
            asset: asset.to_string(),
            holder: holder.to_string(),
            value,
        };

        let key = pair_key(asset, holder);
        let mut txn = self
            .backend
            .begin_write(ctx.network())
            .map_err(|e| MintError::storage(OP, &key, e))?;
        txn.insert_balance(&balance_to_row(&balance))
            .map_err(|e| MintError::storage(OP, &key, e))?;
        ctx.check(OP)?;
        txn.commit().map_err(|e| MintError::storage(OP, &key, e))?;

        tracing::debug!(
            network = %ctx.network(),
            token = %balance.token,
            asset,
            holder,
            "Created canonical balance"
        );
        Ok(balance)
    }

    pub fn load_canonical_balance_by_asset_holder(
        &self,
        ctx: &OpContext,
        asset: &str,
        holder: &str,
    ) -> MintResult<Option<Balance>> {
        self.load_by_asset_holder(
            ctx,
            "load_canonical_balance_by_asset_holder",
            asset,
            holder,
            Propagation::Canonical,
        )
    }

    pub fn load_propagated_balance_by_asset_holder(
        &self,
        ctx: &OpContext,
        asset: &str,
        holder: &str,
    ) -> MintResult<Option<Balance>> {
        self.load_by_asset_holder(
            ctx,
            "load_propagated_balance_by_asset_holder",
            asset,
            holder,
            Propagation::Propagated,
        )
    }

    fn load_by_asset_holder(
        &self,
        ctx: &OpContext,
        op: &'static str,
        asset: &str,
        holder: &str,
        propagation: Propagation,
    ) -> MintResult<Option<Balance>> {
        ctx.check(op)?;
        let row = self
            .backend
            .balance_by_asset_holder(ctx.network(), asset, holder, propagation.as_str())
            .map_err(|e| MintError::storage(op, pair_key(asset, holder), e))?;
        row.map(balance_from_row)
            .transpose()
            .map_err(|e| MintError::storage(op, pair_key(asset, holder), e))
    }

    /// Load the canonical balance of a pair, creating it with a zero value
    /// when absent.
    ///
    /// Losing a creation race to another writer is resolved by reloading, so
    /// concurrent callers all observe the same token. The retry is bounded;
    /// a key that keeps flapping surfaces as `UniqueConstraintViolation`.
    pub fn load_or_create_canonical_balance_by_asset_holder(
        &self,
        ctx: &OpContext,
        owner: &str,
        asset: &str,
        holder: &str,
    ) -> MintResult<Balance> {
        const OP: &str = "load_or_create_canonical_balance_by_asset_holder";

        for attempt in 1..=LOAD_OR_CREATE_ATTEMPTS {
            if let Some(balance) = self.load_canonical_balance_by_asset_holder(ctx, asset, holder)? {
                return Ok(balance);
            }
            match self.create_canonical_balance(ctx, owner, asset, holder, Amount::ZERO) {
                Ok(balance) => return Ok(balance),
                Err(e) if e.is_unique_violation() => {
                    tracing::debug!(attempt, asset, holder, "Lost balance creation race, reloading");
                }
                Err(e) => return Err(e),
            }
        }

        Err(MintError::UniqueConstraintViolation {
            operation: OP,
            detail: format!(
                "{} still contended after {LOAD_OR_CREATE_ATTEMPTS} attempts",
                pair_key(asset, holder)
            ),
        })
    }

    /// Persist `balance.value`, keyed by `(owner, token)`.
    ///
    /// No other field is written and no business rule is re-checked.
    pub fn save(&self, ctx: &OpContext, balance: &Balance) -> MintResult<()> {
        const OP: &str = "save";
        ctx.check(OP)?;

        let key = token_key(&balance.owner, &balance.token);
        let mut txn = self
            .backend
            .begin_write(ctx.network())
            .map_err(|e| MintError::storage(OP, &key, e))?;
        let updated = txn
            .update_balance_value(&balance.owner, &balance.token, &balance.value.to_string())
            .map_err(|e| MintError::storage(OP, &key, e))?;
        if !updated {
            return Err(MintError::BalanceNotFound {
                owner: balance.owner.clone(),
                token: balance.token.clone(),
            });
        }
        ctx.check(OP)?;
        txn.commit().map_err(|e| MintError::storage(OP, &key, e))
    }

    /// Read-modify-write of a balance value inside one write transaction.
    ///
    /// `f` receives the stored value, not `balance.value`. On success the
    /// new value is committed and mirrored into `balance`; if `f` fails the
    /// transaction is rolled back and nothing changes.
    pub fn update_value<F>(&self, ctx: &OpContext, balance: &mut Balance, f: F) -> MintResult<()>
    where
        F: FnOnce(Amount) -> Result<Amount, AmountError>,
    {
        const OP: &str = "update_value";
        ctx.check(OP)?;

        let key = token_key(&balance.owner, &balance.token);
        let mut txn = self
            .backend
            .begin_write(ctx.network())
            .map_err(|e| MintError::storage(OP, &key, e))?;

        let row = txn
            .balance_by_token(&balance.token)
            .map_err(|e| MintError::storage(OP, &key, e))?
            .filter(|row| row.owner == balance.owner)
            .ok_or_else(|| MintError::BalanceNotFound {
                owner: balance.owner.clone(),
                token: balance.token.clone(),
            })?;
        let current = balance_from_row(row)
            .map_err(|e| MintError::storage(OP, &key, e))?
            .value;

        let next = f(current)?;
        txn.update_balance_value(&balance.owner, &balance.token, &next.to_string())
            .map_err(|e| MintError::storage(OP, &key, e))?;
        ctx.check(OP)?;
        txn.commit().map_err(|e| MintError::storage(OP, &key, e))?;

        balance.value = next;
        Ok(())
    }

    /// Store or refresh the local advisory copy of another mint's canonical
    /// balance.
    pub fn store_propagated_balance(
        &self,
        ctx: &OpContext,
        snapshot: &Balance,
    ) -> MintResult<Balance> {
        const OP: &str = "store_propagated_balance";
        ctx.check(OP)?;

        if !snapshot.is_canonical() {
            return Err(MintError::validation(
                "balance_propagation_invalid",
                "only canonical balances can be propagated",
            ));
        }
        if snapshot.owner == self.local_mint {
            return Err(MintError::validation(
                "balance_owner_invalid",
                "balances owned by this mint are never propagated to it",
            ));
        }
        check_asset_issuer(&snapshot.asset, &snapshot.owner)?;

        let copy = Balance {
            propagation: Propagation::Propagated,
            ..snapshot.clone()
        };
        let key = pair_key(&copy.asset, &copy.holder);
        let storage_err = |e| MintError::storage(OP, &key, e);

        let mut txn = self
            .backend
            .begin_write(ctx.network())
            .map_err(storage_err)?;
        let existing = txn
            .balance_by_asset_holder(&copy.asset, &copy.holder, PROPAGATION_PROPAGATED)
            .map_err(storage_err)?;
        match existing {
            Some(row) if row.token == copy.token && row.owner == copy.owner => {
                txn.update_balance_value(&copy.owner, &copy.token, &copy.value.to_string())
                    .map_err(storage_err)?;
            }
            Some(row) => {
                txn.remove_balance(&row.token).map_err(storage_err)?;
                txn.insert_balance(&balance_to_row(&copy))
                    .map_err(storage_err)?;
            }
            None => {
                txn.insert_balance(&balance_to_row(&copy))
                    .map_err(storage_err)?;
            }
        }
        ctx.check(OP)?;
        txn.commit().map_err(storage_err)?;

        tracing::debug!(
            network = %ctx.network(),
            owner = %copy.owner,
            token = %copy.token,
            value = %copy.value,
            "Stored propagated balance"
        );
        Ok(copy)
    }

    /// All balances of a holder, canonical and propagated, from one snapshot.
    pub fn list_balances_by_holder(
        &self,
        ctx: &OpContext,
        holder: &str,
    ) -> MintResult<Vec<Balance>> {
        const OP: &str = "list_balances_by_holder";
        ctx.check(OP)?;
        let key = format!("holder={holder}");
        self.backend
            .balances_by_holder(ctx.network(), holder)
            .map_err(|e| MintError::storage(OP, &key, e))?
            .into_iter()
            .map(|row| balance_from_row(row).map_err(|e| MintError::storage(OP, &key, e)))
            .collect()
    }
}
