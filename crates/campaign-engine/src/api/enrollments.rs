/*
 * Copyright (c) 2025 Dylan Storey
 * Licensed under the Elastic License 2.0.
 * See LICENSE file in the project root for full license text.
 */

//! API endpoints for enrolling contacts into a campaign instance and
//! inspecting their progress.

use crate::error::{EngineError, Envelope};
use crate::AppState;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use campaign_models::models::enrollments::{CampaignEnrollment, NewCampaignEnrollment};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

#[derive(Debug, Deserialize, Serialize, ToSchema)]
pub struct CreateEnrollmentRequest {
    pub instance_id: Uuid,
    pub contact_id: Uuid,
    #[serde(default = "default_metadata")]
    pub metadata: serde_json::Value,
}

fn default_metadata() -> serde_json::Value {
    serde_json::json!({})
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct ListEnrollmentsParams {
    pub instance_id: Uuid,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route(
            "/api/campaigns/enrollments",
            get(list_enrollments).post(create_enrollment),
        )
        .route("/api/campaigns/enrollments/:id", get(get_enrollment))
}

/// Lists every enrollment under an instance, most recently enrolled first.
#[utoipa::path(
    get,
    path = "/api/campaigns/enrollments",
    tag = "enrollments",
    params(ListEnrollmentsParams),
    responses((status = 200, description = "List of enrollments", body = Vec<CampaignEnrollment>)),
    security(("api_key" = []))
)]
async fn list_enrollments(
    State(state): State<AppState>,
    Query(params): Query<ListEnrollmentsParams>,
) -> Result<Json<Envelope<Vec<CampaignEnrollment>>>, EngineError> {
    Ok(Json(Envelope::new(
        state.dal.enrollments().list_for_instance(params.instance_id)?,
    )))
}

/// Enrolls one contact into an instance, due immediately. A contact already
/// enrolled in this instance is rejected with a conflict rather than
/// silently creating a second concurrent journey for the same pair.
#[utoipa::path(
    post,
    path = "/api/campaigns/enrollments",
    tag = "enrollments",
    request_body = CreateEnrollmentRequest,
    responses(
        (status = 201, description = "Enrollment created", body = CampaignEnrollment),
        (status = 409, description = "Contact already enrolled in this instance"),
        (status = 422, description = "Nil instance or contact ID"),
    ),
    security(("api_key" = []))
)]
async fn create_enrollment(
    State(state): State<AppState>,
    Json(request): Json<CreateEnrollmentRequest>,
) -> Result<(StatusCode, Json<Envelope<CampaignEnrollment>>), EngineError> {
    let new_enrollment =
        NewCampaignEnrollment::new(request.instance_id, request.contact_id, request.metadata)
            .map_err(EngineError::Validation)?;

    let enrollment = state.dal.enrollments().create(&new_enrollment).map_err(|e| {
        if e.is_unique_violation() {
            EngineError::Conflict(format!(
                "contact {} is already enrolled in instance {}",
                request.contact_id, request.instance_id
            ))
        } else {
            e
        }
    })?;

    Ok((StatusCode::CREATED, Json(Envelope::new(enrollment))))
}

#[utoipa::path(
    get,
    path = "/api/campaigns/enrollments/{id}",
    tag = "enrollments",
    params(("id" = Uuid, Path, description = "Enrollment ID")),
    responses(
        (status = 200, description = "Enrollment found", body = CampaignEnrollment),
        (status = 404, description = "Enrollment not found"),
    ),
    security(("api_key" = []))
)]
async fn get_enrollment(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Envelope<CampaignEnrollment>>, EngineError> {
    let enrollment = state
        .dal
        .enrollments()
        .get(id)?
        .ok_or_else(|| EngineError::NotFound(format!("enrollment {id}")))?;
    Ok(Json(Envelope::new(enrollment)))
}
