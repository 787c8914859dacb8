// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Repository layer providing typed access to a storage engine.
//!
//! Each repository owns the mapping between its entity and the persisted row.

pub mod balances;
pub mod facts;
pub mod users;

pub use balances::{
    asset_issuer, check_asset_issuer, qualified_asset, Balance, BalanceStore, Propagation,
};
pub use facts::{Fact, FactRepository};
pub use users::{User, UserRepository};
