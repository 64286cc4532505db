/*
 * Copyright (c) 2025 Dylan Storey
 * Licensed under the Elastic License 2.0.
 * See LICENSE file in the project root for full license text.
 */

use crate::api::dlq::ReplayResult;
use crate::api::enrollments::CreateEnrollmentRequest;
use crate::api::health::HealthResponse;
use crate::api::instances::{CreateInstanceRequest, InstanceMetrics};
use crate::api::templates::{CreateTemplateRequest, SetActiveRequest};
use crate::api::{dlq, enrollments, health, instances, templates};
use crate::AppState;
use axum::{response::Json, routing::get, Router};
use campaign_models::models::dead_letter_events::{DeadLetterEvent, DeadLetterStats};
use campaign_models::models::enrollments::CampaignEnrollment;
use campaign_models::models::instances::CampaignInstance;
use campaign_models::models::templates::{CampaignTemplate, SequenceStep};
use utoipa::{
    openapi::security::{ApiKey, ApiKeyValue, SecurityScheme},
    OpenApi,
};
use utoipa_swagger_ui::SwaggerUi;

#[derive(OpenApi)]
#[openapi(
    paths(
        health::health,
        templates::list_templates,
        templates::create_template,
        templates::get_template,
        templates::set_active,
        instances::list_instances,
        instances::create_instance,
        instances::get_instance,
        instances::get_instance_metrics,
        instances::start_instance,
        instances::pause_instance,
        instances::complete_instance,
        enrollments::list_enrollments,
        enrollments::create_enrollment,
        enrollments::get_enrollment,
        dlq::list_dlq,
        dlq::dlq_stats,
        dlq::replay_one,
        dlq::ignore_one,
    ),
    components(
        schemas(
            HealthResponse,
            CampaignTemplate,
            SequenceStep,
            CreateTemplateRequest,
            SetActiveRequest,
            CampaignInstance,
            CreateInstanceRequest,
            InstanceMetrics,
            CampaignEnrollment,
            CreateEnrollmentRequest,
            DeadLetterEvent,
            DeadLetterStats,
            ReplayResult,
        )
    ),
    tags(
        (name = "health", description = "Liveness and metrics"),
        (name = "templates", description = "Campaign template management API"),
        (name = "instances", description = "Campaign instance lifecycle API"),
        (name = "enrollments", description = "Contact enrollment API"),
        (name = "dlq", description = "Dead-letter queue inspection and replay API"),
    ),
    modifiers(&SecurityAddon)
)]
pub struct ApiDoc;

struct SecurityAddon;

impl utoipa::Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "api_key",
                SecurityScheme::ApiKey(ApiKey::Header(ApiKeyValue::new("Authorization"))),
            );
        }
    }
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/docs/openapi.json", get(serve_openapi))
        .merge(SwaggerUi::new("/swagger-ui"))
}

async fn serve_openapi() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}
