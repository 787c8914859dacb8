// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::{catch_panic::CatchPanicLayer, cors::CorsLayer, trace::TraceLayer};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::{
    network::Network,
    registration::Attestation,
    state::AppState,
    storage::{Balance, Propagation, User},
};

pub mod attestations;
pub mod balances;
pub mod challenges;
pub mod health;
pub mod propagations;
pub mod users;

pub fn router(state: AppState) -> Router {
    let v1_routes = Router::new()
        .route("/challenges", get(challenges::create_challenges))
        .route("/users", post(users::create_user))
        .route("/users/me", get(users::get_current_user))
        .route("/attestations", post(attestations::submit_attestation))
        .route("/balances", get(balances::get_balance))
        .route("/balances/canonical", get(balances::get_canonical_balance))
        .route("/propagations", post(propagations::notify_propagation))
        .with_state(state.clone());

    let health_routes = Router::new()
        .route("/health", get(health::health))
        .route("/health/live", get(health::liveness))
        .route("/health/ready", get(health::readiness))
        .with_state(state);

    Router::new()
        .nest("/v1", v1_routes)
        .merge(health_routes)
        .merge(SwaggerUi::new("/docs").url("/api-doc/openapi.json", ApiDoc::openapi()))
        .layer(CatchPanicLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

#[derive(OpenApi)]
#[openapi(
    paths(
        challenges::create_challenges,
        users::create_user,
        users::get_current_user,
        attestations::submit_attestation,
        balances::get_balance,
        balances::get_canonical_balance,
        propagations::notify_propagation,
        health::health,
        health::liveness,
        health::readiness
    ),
    components(
        schemas(
            Network,
            Balance,
            Propagation,
            User,
            Attestation,
            challenges::ChallengesResponse,
            challenges::IssuedChallenge,
            users::CreateUserRequest,
            propagations::PropagationNotice,
            health::ReadyResponse,
            health::HealthChecks,
            health::HealthResponse
        )
    ),
    tags(
        (name = "Auth", description = "Challenge issuance"),
        (name = "Users", description = "Registration and verifier attestations"),
        (name = "Balances", description = "Canonical and propagated balances"),
        (name = "Health", description = "Liveness and readiness checks")
    )
)]
struct ApiDoc;
