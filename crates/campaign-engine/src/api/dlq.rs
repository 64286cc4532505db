/*
 * Copyright (c) 2025 Dylan Storey
 * Licensed under the Elastic License 2.0.
 * See LICENSE file in the project root for full license text.
 */

//! Dead-letter queue inspection and replay endpoints.

use crate::dal::dead_letter_events::DeadLetterFilter;
use crate::error::{EngineError, Envelope};
use crate::orphan_correlation;
use crate::AppState;
use axum::extract::{Path, Query, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use campaign_models::models::dead_letter_events::{DeadLetterEvent, DeadLetterStats};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Debug, Deserialize, utoipa::IntoParams)]
pub struct ListDlqParams {
    pub status: Option<String>,
    pub event_type: Option<String>,
    pub channel: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ReplayResult {
    pub replayed: bool,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/admin/dlq", get(list_dlq))
        .route("/api/admin/dlq/stats", get(dlq_stats))
        .route("/api/admin/dlq/:id/replay", post(replay_one))
        .route("/api/admin/dlq/:id/ignore", post(ignore_one))
}

/// Lists dead-letter entries, optionally filtered by status/event type/channel.
#[utoipa::path(
    get,
    path = "/api/admin/dlq",
    tag = "dlq",
    params(ListDlqParams),
    responses((status = 200, description = "List of dead-letter entries", body = Vec<DeadLetterEvent>)),
    security(("api_key" = []))
)]
async fn list_dlq(
    State(state): State<AppState>,
    Query(params): Query<ListDlqParams>,
) -> Result<Json<Envelope<Vec<DeadLetterEvent>>>, EngineError> {
    let filter = DeadLetterFilter {
        status: params.status,
        event_type: params.event_type,
        channel: params.channel,
    };
    Ok(Json(Envelope::new(state.dal.dead_letter_events().list(&filter)?)))
}

/// Aggregate counts per dead-letter status.
#[utoipa::path(
    get,
    path = "/api/admin/dlq/stats",
    tag = "dlq",
    responses((status = 200, description = "Dead-letter queue counts by status", body = DeadLetterStats)),
    security(("api_key" = []))
)]
async fn dlq_stats(State(state): State<AppState>) -> Result<Json<Envelope<DeadLetterStats>>, EngineError> {
    Ok(Json(Envelope::new(state.dal.dead_letter_events().stats()?)))
}

/// Replays a single entry through the same correlation/normalize/record
/// recipe the background sweep uses, on demand. A miss is not an error —
/// it just means the correlation still doesn't resolve — so the entry's
/// attempt count is bumped and `replayed: false` is returned.
#[utoipa::path(
    post,
    path = "/api/admin/dlq/{id}/replay",
    tag = "dlq",
    params(("id" = Uuid, Path, description = "Dead-letter entry ID")),
    responses(
        (status = 200, description = "Replay attempted", body = ReplayResult),
        (status = 404, description = "Entry not found"),
    ),
    security(("api_key" = []))
)]
async fn replay_one(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Envelope<ReplayResult>>, EngineError> {
    let entry = state
        .dal
        .dead_letter_events()
        .get(id)?
        .ok_or_else(|| EngineError::NotFound(format!("dead-letter entry {id}")))?;

    state.dal.dead_letter_events().mark_replaying(id)?;

    match orphan_correlation::attempt_replay(&state.dal, &entry) {
        Ok(true) => Ok(Json(Envelope::new(ReplayResult { replayed: true }))),
        Ok(false) => {
            state.dal.dead_letter_events().mark_failed_again(id, entry.attempts + 1)?;
            Ok(Json(Envelope::new(ReplayResult { replayed: false })))
        }
        Err(error) => {
            state.dal.dead_letter_events().mark_failed_again(id, entry.attempts + 1)?;
            Err(error)
        }
    }
}

/// Marks an entry `ignored`, removing it from future replay sweeps without
/// deleting it.
#[utoipa::path(
    post,
    path = "/api/admin/dlq/{id}/ignore",
    tag = "dlq",
    params(("id" = Uuid, Path, description = "Dead-letter entry ID")),
    responses(
        (status = 200, description = "Entry ignored", body = DeadLetterEvent),
        (status = 404, description = "Entry not found"),
    ),
    security(("api_key" = []))
)]
async fn ignore_one(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Envelope<DeadLetterEvent>>, EngineError> {
    state
        .dal
        .dead_letter_events()
        .get(id)?
        .ok_or_else(|| EngineError::NotFound(format!("dead-letter entry {id}")))?;
    Ok(Json(Envelope::new(state.dal.dead_letter_events().ignore(id)?)))
}
