/*
 * Copyright (c) 2025 Dylan Storey
 * Licensed under the Elastic License 2.0.
 * See LICENSE file in the project root for full license text.
 */

//! Inbound webhook intake.
//!
//! One endpoint fronts all four providers. Unlike the scheduler's
//! `ProviderRegistry`, which is keyed by channel (one provider per outbound
//! channel), intake must be keyed by the header scheme a provider's webhook
//! actually carries, since Postmark and Lemlist both report `channel() ==
//! "email"` but sign their payloads under different header names.

use crate::error::{EngineError, Envelope};
use crate::normalizer::{normalize, ResolvedEnrollment};
use crate::orphan_correlation;
use crate::providers::email::PostmarkProvider;
use crate::providers::lemlist::LemlistProvider;
use crate::providers::linkedin::PhantombusterProvider;
use crate::providers::video::HeygenProvider;
use crate::providers::Provider;
use crate::resilience::TokenBucket;
use crate::AppState;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::routing::post;
use axum::{Json, Router};
use std::collections::HashMap;
use std::sync::Arc;

/// Header names this service recognizes, checked in a fixed order against
/// the incoming request. Order doesn't matter for correctness — a request
/// carries exactly one of these headers — but is kept stable for log
/// readability.
const HEADER_LEMLIST: &str = "x-lemlist-signature";
const HEADER_POSTMARK: &str = "x-postmark-signature";
const HEADER_PHANTOMBUSTER: &str = "x-phantombuster-token";
const HEADER_HEYGEN: &str = "x-heygen-signature";

/// Resolves an inbound webhook to the provider that can verify and parse it,
/// keyed by the header scheme present on the request rather than by channel.
pub struct WebhookProviders {
    postmark: Arc<PostmarkProvider>,
    lemlist: Arc<LemlistProvider>,
    phantombuster: Arc<PhantombusterProvider>,
    heygen: Arc<HeygenProvider>,
}

impl WebhookProviders {
    pub fn new(
        postmark: Arc<PostmarkProvider>,
        lemlist: Arc<LemlistProvider>,
        phantombuster: Arc<PhantombusterProvider>,
        heygen: Arc<HeygenProvider>,
    ) -> Self {
        WebhookProviders {
            postmark,
            lemlist,
            phantombuster,
            heygen,
        }
    }

    /// Picks the provider whose signature header is present on `headers`.
    /// `None` if none of the four recognized header names are present.
    pub fn resolve(&self, headers: &HeaderMap) -> Option<(&'static str, Arc<dyn Provider>)> {
        if headers.contains_key(HEADER_LEMLIST) {
            return Some(("lemlist", self.lemlist.clone() as Arc<dyn Provider>));
        }
        if headers.contains_key(HEADER_POSTMARK) {
            return Some(("postmark", self.postmark.clone() as Arc<dyn Provider>));
        }
        if headers.contains_key(HEADER_PHANTOMBUSTER) {
            return Some(("phantombuster", self.phantombuster.clone() as Arc<dyn Provider>));
        }
        if headers.contains_key(HEADER_HEYGEN) {
            return Some(("heygen", self.heygen.clone() as Arc<dyn Provider>));
        }
        None
    }
}

pub fn routes() -> Router<AppState> {
    Router::new().route("/api/campaigns/events/webhook", post(intake))
}

fn header_map_to_string_map(headers: &HeaderMap) -> HashMap<String, String> {
    headers
        .iter()
        .filter_map(|(name, value)| value.to_str().ok().map(|v| (name.as_str().to_lowercase(), v.to_string())))
        .collect()
}

/// Receives raw bytes (never a pre-parsed `Json<T>`) so the exact bytes a
/// provider signed are the exact bytes verified — a `Json` extractor would
/// re-serialize and break byte-for-byte signature verification.
async fn intake(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: axum::body::Bytes,
) -> Result<impl IntoResponse, EngineError> {
    state.webhook_limiter.try_acquire()?;

    let Some((provider_name, provider)) = state.webhook_providers.resolve(&headers) else {
        return Err(EngineError::Validation("unrecognized webhook signature header".into()));
    };

    let header_map = header_map_to_string_map(&headers);
    if !provider.verify_webhook(&body, &header_map)? {
        return Err(EngineError::SignatureVerificationFailed);
    }

    let raw = provider.parse_webhook_event(&body)?;
    let channel = provider.channel();

    let resolved = state
        .dal
        .enrollments()
        .find_by_provider_correlation_id(raw.provider_message_id.as_deref(), raw.provider_action_id.as_deref())?;

    let Some(enrollment) = resolved else {
        if raw.provider_message_id.is_some() || raw.provider_action_id.is_some() {
            orphan_correlation::enqueue(&state.dal, provider_name, channel, &raw)?;
            tracing::info!(provider = provider_name, channel, "webhook orphaned, queued for correlation");
            return Ok((
                StatusCode::ACCEPTED,
                Json(Envelope::new(serde_json::json!({"retryable": true}))),
            ));
        }
        tracing::warn!(provider = provider_name, channel, "webhook carries no correlation identifier, dropping");
        return Ok((
            StatusCode::ACCEPTED,
            Json(Envelope::new(serde_json::json!({"retryable": false}))),
        ));
    };

    let resolved_enrollment = ResolvedEnrollment {
        enrollment_id: enrollment.id,
        instance_id: enrollment.instance_id,
    };
    let new_event = normalize(raw, provider_name, channel, Some(resolved_enrollment))?;
    state.dal.events().record(&new_event)?;

    Ok((StatusCode::CREATED, Json(Envelope::new(serde_json::json!({})))))
}

/// Builds the shared intake-wide token bucket from config, independent of
/// any per-provider bucket the scheduler owns.
pub fn build_webhook_limiter(config: &campaign_utils::config::Settings) -> TokenBucket {
    TokenBucket::new(
        "webhook_intake",
        config.resilience.global_rate_limit_capacity,
        config.resilience.global_rate_limit_refill_per_sec,
    )
}
