// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Balance lookup endpoints.
//!
//! `GET /v1/balances/canonical` is what peer mints call to refresh their
//! propagated copies; it only ever answers with balances this mint owns.

use axum::{
    extract::{Query, State},
    Json,
};
use serde::Deserialize;
use utoipa::IntoParams;

use crate::{
    auth::Livemode,
    error::ApiError,
    network::Network,
    state::AppState,
    storage::{Balance, BalanceStore},
};

#[derive(Debug, Deserialize, IntoParams)]
pub struct BalanceQuery {
    /// Asset identifier `{issuer}:{code}`
    pub asset: String,
    /// Holder address
    pub holder: String,
}

fn balance_not_found(query: &BalanceQuery) -> ApiError {
    ApiError::not_found(
        "balance_not_found",
        format!("No balance of {} for {}.", query.asset, query.holder),
    )
}

fn store(state: &AppState, network: Network) -> BalanceStore<'_> {
    BalanceStore::new(state.backend.as_ref(), state.config.network(network).address())
}

/// Get the canonical balance of a holder, owned by this mint.
#[utoipa::path(
    get,
    path = "/v1/balances/canonical",
    tag = "Balances",
    params(BalanceQuery),
    responses(
        (status = 200, description = "Canonical balance", body = Balance),
        (status = 404, description = "No canonical balance for the pair"),
    )
)]
pub async fn get_canonical_balance(
    State(state): State<AppState>,
    Livemode(network): Livemode,
    Query(query): Query<BalanceQuery>,
) -> Result<Json<Balance>, ApiError> {
    let ctx = state.context(network);
    store(&state, network)
        .load_canonical_balance_by_asset_holder(&ctx, &query.asset, &query.holder)?
        .map(Json)
        .ok_or_else(|| balance_not_found(&query))
}

/// Get the best local view of a holder's balance.
///
/// The canonical balance when this mint owns it, otherwise the propagated
/// copy, which may lag behind its owner.
#[utoipa::path(
    get,
    path = "/v1/balances",
    tag = "Balances",
    params(BalanceQuery),
    responses(
        (status = 200, description = "Canonical or propagated balance", body = Balance),
        (status = 404, description = "No balance known for the pair"),
    )
)]
pub async fn get_balance(
    State(state): State<AppState>,
    Livemode(network): Livemode,
    Query(query): Query<BalanceQuery>,
) -> Result<Json<Balance>, ApiError> {
    let ctx = state.context(network);
    let store = store(&state, network);

    if let Some(balance) =
        store.load_canonical_balance_by_asset_holder(&ctx, &query.asset, &query.holder)?
    {
        return Ok(Json(balance));
    }
    store
        .load_propagated_balance_by_asset_holder(&ctx, &query.asset, &query.holder)?
        .map(Json)
        .ok_or_else(|| balance_not_found(&query))
}
