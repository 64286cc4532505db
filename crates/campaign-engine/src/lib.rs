/*
 * Copyright (c) 2025 Dylan Storey
 * Licensed under the Elastic License 2.0.
 * See LICENSE file in the project root for full license text.
 */

//! # campaign-engine
//!
//! The campaign execution and event ingestion engine: webhook intake,
//! normalization and dedup, enrollment scheduling, the resilience fabric
//! around provider calls, and the HTTP API surface that fronts all of it.

pub mod api;
pub mod cli;
pub mod dal;
pub mod db;
pub mod error;
pub mod metrics;
pub mod normalizer;
pub mod orphan_correlation;
pub mod providers;
pub mod resilience;
pub mod scheduler;
pub mod utils;

use crate::api::middleware::AuthLimiter;
use crate::api::webhooks::WebhookProviders;
use crate::dal::DAL;
use crate::resilience::TokenBucket;
use campaign_utils::config::Settings;
use std::sync::Arc;

/// Shared state handed to every axum handler and middleware layer.
///
/// Cheap to clone: every field is an `Arc` or already `Clone`-cheap (`DAL`
/// wraps a pooled connection handle).
#[derive(Clone)]
pub struct AppState {
    pub dal: DAL,
    pub config: Arc<Settings>,
    pub webhook_limiter: Arc<TokenBucket>,
    pub webhook_providers: Arc<WebhookProviders>,
    pub auth_limiter: Arc<AuthLimiter>,
}
