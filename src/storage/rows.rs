// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Persisted row layouts.
//!
//! Rows are the only shapes engines see. Every field is a string so the
//! layout stays stable regardless of how the domain types evolve; the
//! repositories own the mapping in both directions.

use serde::{Deserialize, Serialize};

pub const PROPAGATION_CANONICAL: &str = "canonical";
pub const PROPAGATION_PROPAGATED: &str = "propagated";

/// One row of the `balances` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalanceRow {
    pub owner: String,
    pub token: String,
    /// RFC 3339 creation timestamp
    pub created: String,
    /// `"canonical"` or `"propagated"`
    pub propagation: String,
    pub asset: String,
    pub holder: String,
    /// Canonical amount text
    pub value: String,
}

/// One row of the `users` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRow {
    pub address: String,
    pub username: String,
    pub email: String,
    pub encrypted_seed: String,
    pub verifier: String,
    pub created: String,
}

/// One row of the `facts` table, keyed by `(address, fact, verifier)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FactRow {
    pub address: String,
    pub fact: String,
    pub verifier: String,
    pub value: String,
    pub created: String,
}
