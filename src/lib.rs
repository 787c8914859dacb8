// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Federated Mint - Canonical Balance Ledger and Challenge Authentication
//!
//! A mint is authoritative for the balances of the assets it issues and keeps
//! advisory, propagated copies of balances issued by other mints. Callers
//! authenticate with secp256k1 keypairs against challenges signed by any
//! trusted mint. Test and live networks are fully separate.
//!
//! ## Modules
//!
//! - `api` - HTTP API handlers (Axum)
//! - `auth` - Challenge minting/verification and request extractors
//! - `storage` - Balance and user repositories over redb or memory
//! - `propagation` - Canonical → propagated balance refresh
//! - `registration` - User registration gate

pub mod amount;
pub mod api;
pub mod auth;
pub mod config;
pub mod context;
pub mod error;
pub mod logging;
pub mod network;
pub mod propagation;
pub mod registration;
pub mod state;
pub mod storage;
