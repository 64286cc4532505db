/*
 * Copyright (c) 2025 Dylan Storey
 * Licensed under the Elastic License 2.0.
 * See LICENSE file in the project root for full license text.
 */

//! Liveness and metrics endpoints. Both sit outside the auth/CSRF/rate-limit
//! guard stack — operators and scrapers don't carry API keys.

use crate::metrics::encode_metrics;
use crate::AppState;
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;

/// Creates and returns the router for health and metrics endpoints.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .route("/metrics", get(metrics))
}

#[derive(Serialize, utoipa::ToSchema)]
pub struct HealthResponse {
    status: &'static str,
}

/// Confirms the process is up and holds a working database connection.
#[utoipa::path(
    get,
    path = "/health",
    tag = "health",
    responses(
        (status = 200, description = "Service is healthy", body = HealthResponse),
        (status = 503, description = "Database connection unavailable"),
    ),
)]
async fn health(axum::extract::State(state): axum::extract::State<AppState>) -> impl IntoResponse {
    match state.dal.pool.get() {
        Ok(_) => (StatusCode::OK, Json(HealthResponse { status: "healthy" })).into_response(),
        Err(_) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(HealthResponse { status: "unavailable" }),
        )
            .into_response(),
    }
}

/// Prometheus scrape target.
async fn metrics() -> impl IntoResponse {
    ([(header::CONTENT_TYPE, "text/plain; version=0.0.4")], encode_metrics())
}
