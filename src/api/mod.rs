// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{
    routing::{get, post},
    Router,
};
use tower::ServiceBuilder;
use tower_http::{
    cors::CorsLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};
use utoipa::{
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};
use utoipa_swagger_ui::SwaggerUi;

use crate::{
    models::{
        AuthResponse, ChainType, ChallengeResponse, SiweChallengeRequest, SiweVerifyRequest,
        SolanaChallengeRequest, SolanaVerifyRequest, UserResponse,
    },
    state::AppState,
};

pub mod auth;
pub mod health;

pub fn router(state: AppState) -> Router {
    let auth_routes = Router::new()
        .route("/siwe/challenge", post(auth::siwe_challenge))
        .route("/siwe/verify", post(auth::siwe_verify))
        .route("/solana/challenge", post(auth::solana_challenge))
        .route("/solana/verify", post(auth::solana_verify))
        .route("/me", get(auth::me));

    Router::new()
        .nest("/auth", auth_routes)
        .route("/health", get(health::health))
        .route("/health/live", get(health::liveness))
        .route("/health/ready", get(health::readiness))
        .with_state(state)
        .merge(SwaggerUi::new("/docs").url("/api-doc/openapi.json", ApiDoc::openapi()))
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
                .layer(TraceLayer::new_for_http())
                .layer(PropagateRequestIdLayer::x_request_id())
                .layer(CorsLayer::permissive()),
        )
}

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        auth::siwe_challenge,
        auth::siwe_verify,
        auth::solana_challenge,
        auth::solana_verify,
        auth::me,
        health::health,
        health::liveness,
        health::readiness
    ),
    components(
        schemas(
            ChainType,
            SiweChallengeRequest,
            SolanaChallengeRequest,
            ChallengeResponse,
            SiweVerifyRequest,
            SolanaVerifyRequest,
            AuthResponse,
            UserResponse,
            health::ReadyResponse,
            health::HealthChecks,
            health::HealthResponse
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Auth", description = "Wallet sign-in by challenge-response"),
        (name = "Health", description = "Liveness and readiness probes")
    )
)]
struct ApiDoc;
