/*
 * Copyright (c) 2025 Dylan Storey
 * Licensed under the Elastic License 2.0.
 * See LICENSE file in the project root for full license text.
 */

//! # Provider Abstraction
//!
//! Each outbound channel (email, LinkedIn, video) is fronted by a `Provider`
//! implementation. The engine never branches on provider identity: it
//! resolves `channel -> provider` through the `ProviderRegistry` and calls
//! the trait's methods uniformly.

pub mod email;
pub mod lemlist;
pub mod linkedin;
pub mod video;

use crate::error::EngineError;
use chrono::{DateTime, Utc};
use serde_json::Value;
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

/// The result of a successful `Provider::send`.
#[derive(Debug, Clone)]
pub struct SendOutcome {
    pub provider_message_id: String,
    pub provider_action_id: Option<String>,
}

/// The state of an in-flight asynchronous send (used by the video provider).
#[derive(Debug, Clone)]
pub struct ProviderStatus {
    pub status: String,
    pub video_url: Option<String>,
    pub progress: Option<i32>,
}

/// A provider-native webhook payload, translated to generic shape but not
/// yet normalized against database state. `crate::normalizer` takes this
/// the rest of the way to a `CampaignEvent`.
#[derive(Debug, Clone)]
pub struct RawEvent {
    pub event_type: String,
    pub provider_event_id: Option<String>,
    pub provider_message_id: Option<String>,
    pub provider_action_id: Option<String>,
    pub timestamp: Option<Value>,
    pub metadata: Value,
}

/// Quota/usage snapshot returned by `Provider::get_quota_status`.
#[derive(Debug, Clone)]
pub struct QuotaStatus {
    pub used: i64,
    pub limit: Option<i64>,
    pub resets_at: Option<DateTime<Utc>>,
}

/// Static capability flags a caller can use to decide whether a feature
/// (e.g. async status polling) is supported before invoking it.
#[derive(Debug, Clone, Copy)]
pub struct Capabilities {
    pub supports_status_polling: bool,
    pub supports_webhooks: bool,
}

type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, EngineError>> + Send + 'a>>;

/// What one sequence step asks a provider to do.
#[derive(Debug, Clone)]
pub struct SendRequest {
    pub enrollment_id: uuid::Uuid,
    pub step_number: i32,
    pub idempotency_key: String,
    pub content: Value,
    pub recipient: Value,
}

/// A single outbound channel's integration with its external service.
///
/// Methods return boxed futures by hand rather than depending on
/// `async-trait`, since `Arc<dyn Provider>` in the registry requires object
/// safety that native `async fn` in traits does not yet provide.
pub trait Provider: Send + Sync {
    /// Sends one sequence step. The idempotency key is caller-supplied
    /// (`enrollment_id`, `step_number`) so a scheduler restart never causes a
    /// duplicate external send.
    fn send<'a>(&'a self, request: SendRequest) -> BoxFuture<'a, SendOutcome>;

    /// Polls the status of a previously-submitted async asset (video render).
    /// Providers without an async asset model return `Unsupported`.
    fn get_status<'a>(&'a self, provider_video_id: &'a str) -> BoxFuture<'a, ProviderStatus>;

    /// Verifies a webhook's signature against the raw, unparsed body. MUST
    /// use timing-safe comparison and MUST fail closed (return `Ok(false)`)
    /// when no secret is configured.
    fn verify_webhook(&self, raw_body: &[u8], headers: &HashMap<String, String>) -> Result<bool, EngineError>;

    /// Parses a provider-native webhook payload into the provider-agnostic
    /// `RawEvent` shape. Does not look anything up in the database.
    fn parse_webhook_event(&self, raw_body: &[u8]) -> Result<RawEvent, EngineError>;

    /// Validates that this provider's own configuration (credentials, base
    /// URL, ...) is present and well-formed.
    fn validate_config(&self) -> Result<(), EngineError>;

    fn get_quota_status<'a>(&'a self) -> BoxFuture<'a, QuotaStatus>;

    fn get_capabilities(&self) -> Capabilities;

    /// The channel this provider serves, for registry lookups and logging.
    fn channel(&self) -> &'static str;
}

/// Resolves `channel -> provider`. The engine looks up the provider for a
/// send or webhook exclusively through this registry.
#[derive(Clone, Default)]
pub struct ProviderRegistry {
    providers: HashMap<&'static str, Arc<dyn Provider>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        ProviderRegistry {
            providers: HashMap::new(),
        }
    }

    pub fn register(&mut self, provider: Arc<dyn Provider>) {
        self.providers.insert(provider.channel(), provider);
    }

    pub fn get(&self, channel: &str) -> Result<Arc<dyn Provider>, EngineError> {
        self.providers
            .get(channel)
            .cloned()
            .ok_or_else(|| EngineError::Configuration(format!("no provider registered for channel '{channel}'")))
    }
}

/// Derives the idempotency key a scheduler send carries, so re-sends caused
/// by a scheduler restart are recognized by the provider as duplicates.
pub fn idempotency_key(enrollment_id: uuid::Uuid, step_number: i32) -> String {
    format!("{enrollment_id}:{step_number}")
}

/// How many more sends an instance may make before its daily cap trips,
/// given `sent_today` — the count of `sent` events recorded for the
/// instance since local midnight (see `EventsDAL::count_since`), not the
/// lifetime `total_sent` counter, which never resets and would otherwise
/// saturate the cap permanently after the first day.
pub fn daily_sends_remaining(sent_today: i64, daily_cap: i32) -> i32 {
    (daily_cap as i64 - sent_today).max(0) as i32
}
