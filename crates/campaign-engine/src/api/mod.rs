/*
 * Copyright (c) 2025 Dylan Storey
 * Licensed under the Elastic License 2.0.
 * See LICENSE file in the project root for full license text.
 */

//! HTTP API surface: route wiring, middleware layering, and CORS.
//!
//! Request flow for every guarded route is CSRF -> auth -> per-key rate
//! limit -> handler. Webhook intake, health/metrics, and the OpenAPI/Swagger
//! endpoints sit outside that stack entirely: providers and scrapers don't
//! carry API keys, and webhook intake authenticates itself via per-provider
//! signature verification instead.

pub mod dlq;
pub mod enrollments;
pub mod health;
pub mod instances;
pub mod middleware;
pub mod openapi;
pub mod templates;
pub mod webhooks;

use crate::AppState;
use axum::http::Method;
use axum::middleware::{from_fn, from_fn_with_state};
use axum::Router;
use campaign_utils::config::Cors;
use campaign_utils::telemetry::prelude::*;
use tower_http::cors::CorsLayer;

/// Builds the full application router over the given shared state.
pub fn build_router(state: AppState) -> Router {
    let cors = build_cors_layer(&state.config.cors);

    let guarded = Router::new()
        .merge(templates::routes())
        .merge(instances::routes())
        .merge(enrollments::routes())
        .merge(dlq::routes())
        .layer(from_fn_with_state(state.clone(), middleware::rate_limit_middleware))
        .layer(from_fn_with_state(state.clone(), middleware::auth_middleware))
        .layer(from_fn(middleware::csrf_middleware));

    Router::new()
        .merge(guarded)
        .merge(webhooks::routes())
        .merge(health::routes())
        .merge(openapi::routes())
        .layer(cors)
        .with_state(state)
}

/// Builds a CORS layer from configuration.
///
/// If "*" is in the allowed_origins list, allows all origins. Methods and
/// headers are left unrestricted since only an explicit origin allowlist
/// (or none at all) is configurable for this surface.
fn build_cors_layer(config: &Cors) -> CorsLayer {
    let mut cors = CorsLayer::new().allow_methods([
        Method::GET,
        Method::POST,
        Method::PATCH,
        Method::DELETE,
        Method::OPTIONS,
    ]);

    if config.allowed_origins.iter().any(|o| o == "*") {
        info!("CORS: allowing all origins (not recommended for production)");
        cors = cors.allow_origin(tower_http::cors::Any);
    } else {
        let origins: Vec<_> = config
            .allowed_origins
            .iter()
            .filter_map(|o| o.parse().ok())
            .collect();
        info!("CORS: allowing origins: {:?}", config.allowed_origins);
        cors = cors.allow_origin(origins);
    }

    cors.allow_headers(tower_http::cors::Any)
}
