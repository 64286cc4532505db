/*
 * Copyright (c) 2025 Dylan Storey
 * Licensed under the Elastic License 2.0.
 * See LICENSE file in the project root for full license text.
 */

//! API endpoints for campaign instance lifecycle management.

use crate::error::{EngineError, Envelope};
use crate::AppState;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use campaign_models::models::instances::{
    CampaignInstance, NewCampaignInstance, UpdateCampaignInstance, INSTANCE_STATUS_ACTIVE,
    INSTANCE_STATUS_COMPLETED, INSTANCE_STATUS_PAUSED,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Debug, Deserialize, Serialize, ToSchema)]
pub struct CreateInstanceRequest {
    pub template_id: Uuid,
    #[serde(default = "default_provider_config")]
    pub provider_config: serde_json::Value,
}

fn default_provider_config() -> serde_json::Value {
    serde_json::json!({})
}

/// Delivery/open/click/reply rates alongside the raw instance row, so
/// callers don't have to recompute the percentages client-side.
#[derive(Debug, Serialize, ToSchema)]
pub struct InstanceMetrics {
    pub instance: CampaignInstance,
    pub delivery_rate: String,
    pub open_rate: String,
    pub click_rate: String,
    pub reply_rate: String,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/campaigns/instances", get(list_instances).post(create_instance))
        .route("/api/campaigns/instances/:id", get(get_instance))
        .route("/api/campaigns/instances/:id/metrics", get(get_instance_metrics))
        .route("/api/campaigns/instances/:id/start", post(start_instance))
        .route("/api/campaigns/instances/:id/pause", post(pause_instance))
        .route("/api/campaigns/instances/:id/complete", post(complete_instance))
}

#[utoipa::path(
    get,
    path = "/api/campaigns/instances",
    tag = "instances",
    responses((status = 200, description = "List of instances", body = Vec<CampaignInstance>)),
    security(("api_key" = []))
)]
async fn list_instances(State(state): State<AppState>) -> Result<Json<Envelope<Vec<CampaignInstance>>>, EngineError> {
    Ok(Json(Envelope::new(state.dal.instances().list()?)))
}

#[utoipa::path(
    post,
    path = "/api/campaigns/instances",
    tag = "instances",
    request_body = CreateInstanceRequest,
    responses(
        (status = 201, description = "Instance created", body = CampaignInstance),
        (status = 422, description = "Nil template ID"),
    ),
    security(("api_key" = []))
)]
async fn create_instance(
    State(state): State<AppState>,
    Json(request): Json<CreateInstanceRequest>,
) -> Result<(StatusCode, Json<Envelope<CampaignInstance>>), EngineError> {
    let new_instance = NewCampaignInstance::new(request.template_id, request.provider_config)
        .map_err(EngineError::Validation)?;
    let instance = state.dal.instances().create(&new_instance)?;
    Ok((StatusCode::CREATED, Json(Envelope::new(instance))))
}

#[utoipa::path(
    get,
    path = "/api/campaigns/instances/{id}",
    tag = "instances",
    params(("id" = Uuid, Path, description = "Instance ID")),
    responses(
        (status = 200, description = "Instance found", body = CampaignInstance),
        (status = 404, description = "Instance not found"),
    ),
    security(("api_key" = []))
)]
async fn get_instance(State(state): State<AppState>, Path(id): Path<Uuid>) -> Result<Json<Envelope<CampaignInstance>>, EngineError> {
    let instance = state
        .dal
        .instances()
        .get(id)?
        .ok_or_else(|| EngineError::NotFound(format!("campaign instance {id}")))?;
    Ok(Json(Envelope::new(instance)))
}

#[utoipa::path(
    get,
    path = "/api/campaigns/instances/{id}/metrics",
    tag = "instances",
    params(("id" = Uuid, Path, description = "Instance ID")),
    responses(
        (status = 200, description = "Instance with derived delivery metrics", body = InstanceMetrics),
        (status = 404, description = "Instance not found"),
    ),
    security(("api_key" = []))
)]
async fn get_instance_metrics(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Envelope<InstanceMetrics>>, EngineError> {
    let instance = state
        .dal
        .instances()
        .get(id)?
        .ok_or_else(|| EngineError::NotFound(format!("campaign instance {id}")))?;

    Ok(Json(Envelope::new(InstanceMetrics {
        delivery_rate: instance.delivery_rate(),
        open_rate: instance.open_rate(),
        click_rate: instance.click_rate(),
        reply_rate: instance.reply_rate(),
        instance,
    })))
}

#[utoipa::path(
    post,
    path = "/api/campaigns/instances/{id}/start",
    tag = "instances",
    params(("id" = Uuid, Path, description = "Instance ID")),
    responses(
        (status = 200, description = "Instance started", body = CampaignInstance),
        (status = 404, description = "Instance not found"),
        (status = 422, description = "Invalid transition from current status"),
    ),
    security(("api_key" = []))
)]
async fn start_instance(State(state): State<AppState>, Path(id): Path<Uuid>) -> Result<Json<Envelope<CampaignInstance>>, EngineError> {
    let changeset = UpdateCampaignInstance {
        status: Some(INSTANCE_STATUS_ACTIVE.to_string()),
        started_at: Some(Some(Utc::now())),
        ..Default::default()
    };
    let instance = state.dal.instances().transition(id, INSTANCE_STATUS_ACTIVE, &changeset)?;
    Ok(Json(Envelope::new(instance)))
}

#[utoipa::path(
    post,
    path = "/api/campaigns/instances/{id}/pause",
    tag = "instances",
    params(("id" = Uuid, Path, description = "Instance ID")),
    responses(
        (status = 200, description = "Instance paused", body = CampaignInstance),
        (status = 404, description = "Instance not found"),
        (status = 422, description = "Invalid transition from current status"),
    ),
    security(("api_key" = []))
)]
async fn pause_instance(State(state): State<AppState>, Path(id): Path<Uuid>) -> Result<Json<Envelope<CampaignInstance>>, EngineError> {
    let changeset = UpdateCampaignInstance {
        status: Some(INSTANCE_STATUS_PAUSED.to_string()),
        paused_at: Some(Some(Utc::now())),
        ..Default::default()
    };
    let instance = state.dal.instances().transition(id, INSTANCE_STATUS_PAUSED, &changeset)?;
    Ok(Json(Envelope::new(instance)))
}

#[utoipa::path(
    post,
    path = "/api/campaigns/instances/{id}/complete",
    tag = "instances",
    params(("id" = Uuid, Path, description = "Instance ID")),
    responses(
        (status = 200, description = "Instance completed", body = CampaignInstance),
        (status = 404, description = "Instance not found"),
        (status = 422, description = "Invalid transition from current status"),
    ),
    security(("api_key" = []))
)]
async fn complete_instance(State(state): State<AppState>, Path(id): Path<Uuid>) -> Result<Json<Envelope<CampaignInstance>>, EngineError> {
    let changeset = UpdateCampaignInstance {
        status: Some(INSTANCE_STATUS_COMPLETED.to_string()),
        completed_at: Some(Some(Utc::now())),
        ..Default::default()
    };
    let instance = state
        .dal
        .instances()
        .transition(id, INSTANCE_STATUS_COMPLETED, &changeset)?;
    Ok(Json(Envelope::new(instance)))
}
