// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Storage Module
//!
//! Persistence for balances, registered users and attested facts.
//!
//! ## Layers
//!
//! ```text
//! repository::{BalanceStore, UserRepository, FactRepository}
//!        │                            domain entities, invariants
//! backend::{BalanceBackend, WriteTxn} engine-agnostic capability
//!        │
//! mint_db::MintDatabase | memory::MemoryBackend
//! ```
//!
//! Both engines keep a separate set of tables per network and enforce the
//! uniqueness constraints inside their write transactions.

pub mod backend;
pub mod memory;
pub mod mint_db;
pub mod repository;
pub mod rows;

pub use backend::{BalanceBackend, StorageError, StorageResult, WriteTxn};
pub use memory::MemoryBackend;
pub use mint_db::MintDatabase;
pub use repository::{
    asset_issuer, check_asset_issuer, qualified_asset, Balance, BalanceStore, Fact,
    FactRepository, Propagation, User, UserRepository,
};
