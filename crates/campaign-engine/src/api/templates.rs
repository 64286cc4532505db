/*
 * Copyright (c) 2025 Dylan Storey
 * Licensed under the Elastic License 2.0.
 * See LICENSE file in the project root for full license text.
 */

//! API endpoints for campaign template management.

use crate::error::{EngineError, Envelope};
use crate::AppState;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use campaign_models::models::templates::{
    CampaignTemplate, NewCampaignTemplate, SequenceStep, UpdateCampaignTemplate,
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

/// Request body for creating a new template.
#[derive(Debug, Deserialize, Serialize, ToSchema)]
pub struct CreateTemplateRequest {
    pub name: String,
    pub description: Option<String>,
    pub template_type: String,
    pub path_type: String,
    pub steps: Vec<SequenceStep>,
}

/// Request body for activating or deactivating a template.
#[derive(Debug, Deserialize, Serialize, ToSchema)]
pub struct SetActiveRequest {
    pub is_active: bool,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/campaigns/templates", get(list_templates).post(create_template))
        .route("/api/campaigns/templates/:id", get(get_template).patch(set_active))
}

/// Lists all campaign templates, most recently created first.
#[utoipa::path(
    get,
    path = "/api/campaigns/templates",
    tag = "templates",
    responses((status = 200, description = "List of templates", body = Vec<CampaignTemplate>)),
    security(("api_key" = []))
)]
async fn list_templates(State(state): State<AppState>) -> Result<Json<Envelope<Vec<CampaignTemplate>>>, EngineError> {
    Ok(Json(Envelope::new(state.dal.templates().list()?)))
}

/// Creates a new campaign template.
#[utoipa::path(
    post,
    path = "/api/campaigns/templates",
    tag = "templates",
    request_body = CreateTemplateRequest,
    responses(
        (status = 201, description = "Template created", body = CampaignTemplate),
        (status = 422, description = "Invalid sequence of steps"),
    ),
    security(("api_key" = []))
)]
async fn create_template(
    State(state): State<AppState>,
    Json(request): Json<CreateTemplateRequest>,
) -> Result<(StatusCode, Json<Envelope<CampaignTemplate>>), EngineError> {
    let new_template = NewCampaignTemplate::new(
        request.name,
        request.description,
        request.template_type,
        request.path_type,
        request.steps,
    )
    .map_err(EngineError::Validation)?;

    let template = state.dal.templates().create(&new_template)?;
    Ok((StatusCode::CREATED, Json(Envelope::new(template))))
}

/// Gets a template by ID.
#[utoipa::path(
    get,
    path = "/api/campaigns/templates/{id}",
    tag = "templates",
    params(("id" = Uuid, Path, description = "Template ID")),
    responses(
        (status = 200, description = "Template found", body = CampaignTemplate),
        (status = 404, description = "Template not found"),
    ),
    security(("api_key" = []))
)]
async fn get_template(State(state): State<AppState>, Path(id): Path<Uuid>) -> Result<Json<Envelope<CampaignTemplate>>, EngineError> {
    let template = state
        .dal
        .templates()
        .get(id)?
        .ok_or_else(|| EngineError::NotFound(format!("template {id}")))?;
    Ok(Json(Envelope::new(template)))
}

/// Activates or deactivates a template. Templates are otherwise immutable
/// once created, so this is the only mutation this endpoint exposes.
#[utoipa::path(
    patch,
    path = "/api/campaigns/templates/{id}",
    tag = "templates",
    params(("id" = Uuid, Path, description = "Template ID")),
    request_body = SetActiveRequest,
    responses(
        (status = 200, description = "Template updated", body = CampaignTemplate),
        (status = 404, description = "Template not found"),
    ),
    security(("api_key" = []))
)]
async fn set_active(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<SetActiveRequest>,
) -> Result<Json<Envelope<CampaignTemplate>>, EngineError> {
    state
        .dal
        .templates()
        .get(id)?
        .ok_or_else(|| EngineError::NotFound(format!("template {id}")))?;

    let changeset = UpdateCampaignTemplate {
        is_active: Some(request.is_active),
    };
    let template = state.dal.templates().update(id, &changeset)?;
    Ok(Json(Envelope::new(template)))
}
