// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Propagation notifications from owning mints.

use axum::{extract::State, http::StatusCode, Json};
use serde::Deserialize;
use utoipa::ToSchema;

use crate::{
    auth::Auth,
    error::ApiError,
    propagation::{PropagationError, PropagationRequest},
    state::AppState,
    storage::check_asset_issuer,
};

/// Request body for POST /v1/propagations
#[derive(Debug, Deserialize, ToSchema)]
pub struct PropagationNotice {
    /// Address of the mint owning the canonical balance
    pub owner: String,
    /// Asset identifier `{owner}:{code}`
    pub asset: String,
    pub holder: String,
}

/// Ask this mint to refresh its propagated copy of a balance.
///
/// Only the owning mint may ask; the refresh itself pulls the canonical
/// balance from the owner and runs in the background.
#[utoipa::path(
    post,
    path = "/v1/propagations",
    tag = "Balances",
    request_body = PropagationNotice,
    responses(
        (status = 202, description = "Refresh queued"),
        (status = 400, description = "Balance is owned by this mint or asset not issued by the owner"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Caller is not the owning mint"),
        (status = 503, description = "Propagation queue full or stopped"),
    )
)]
pub async fn notify_propagation(
    State(state): State<AppState>,
    Auth(caller): Auth,
    Json(notice): Json<PropagationNotice>,
) -> Result<StatusCode, ApiError> {
    if caller.address != notice.owner {
        return Err(ApiError::forbidden(
            "propagation_owner_mismatch",
            "Only the owning mint may request propagation of its balances.",
        ));
    }
    if notice.owner == state.config.network(caller.network).address() {
        return Err(ApiError::bad_request(
            "balance_owner_invalid",
            "Balances owned by this mint are canonical here.",
        ));
    }
    check_asset_issuer(&notice.asset, &notice.owner)?;

    state
        .propagation
        .notify(PropagationRequest {
            network: caller.network,
            owner: notice.owner,
            asset: notice.asset,
            holder: notice.holder,
        })?;

    Ok(StatusCode::ACCEPTED)
}

impl From<PropagationError> for ApiError {
    fn from(err: PropagationError) -> Self {
        let code = match err {
            PropagationError::QueueFull => "propagation_queue_full",
            PropagationError::Closed => "propagation_unavailable",
        };
        ApiError::service_unavailable(code, err.to_string())
    }
}
