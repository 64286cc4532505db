/*
 * Copyright (c) 2025 Dylan Storey
 * Licensed under the Elastic License 2.0.
 * See LICENSE file in the project root for full license text.
 */

//! Phantombuster-shaped LinkedIn automation provider.
//!
//! Sends launch a Phantombuster "agent" (connection request, message, or
//! profile visit) and return the agent's container id as the provider
//! action id; LinkedIn has no first-class message id to hand back.
//! Webhooks carry a shared-secret query parameter rather than a signature
//! header, compared with constant time.

use super::{Capabilities, Provider, ProviderStatus, QuotaStatus, RawEvent, SendOutcome, SendRequest};
use crate::error::EngineError;
use campaign_models::models::events::{
    CHANNEL_LINKEDIN, EVENT_CONNECTION_ACCEPTED, EVENT_CONNECTION_REJECTED, EVENT_CONNECTION_SENT,
    EVENT_MESSAGE_READ, EVENT_MESSAGE_REPLIED, EVENT_MESSAGE_SENT, EVENT_PROFILE_VISITED,
};
use serde_json::Value;
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use subtle::ConstantTimeEq;

pub struct PhantombusterProvider {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    webhook_secret: Option<String>,
}

impl PhantombusterProvider {
    pub fn new(base_url: impl Into<String>, api_key: Option<String>, webhook_secret: Option<String>) -> Self {
        PhantombusterProvider {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
            api_key,
            webhook_secret,
        }
    }

    fn phantombuster_type_to_event(event_type: &str) -> Option<&'static str> {
        match event_type {
            "connection_sent" => Some(EVENT_CONNECTION_SENT),
            "connection_accepted" => Some(EVENT_CONNECTION_ACCEPTED),
            "connection_rejected" => Some(EVENT_CONNECTION_REJECTED),
            "message_sent" => Some(EVENT_MESSAGE_SENT),
            "message_read" => Some(EVENT_MESSAGE_READ),
            "message_replied" => Some(EVENT_MESSAGE_REPLIED),
            "profile_visited" => Some(EVENT_PROFILE_VISITED),
            _ => None,
        }
    }
}

impl Provider for PhantombusterProvider {
    fn send<'a>(
        &'a self,
        request: SendRequest,
    ) -> Pin<Box<dyn Future<Output = Result<SendOutcome, EngineError>> + Send + 'a>> {
        Box::pin(async move {
            let api_key = self
                .api_key
                .as_deref()
                .ok_or_else(|| EngineError::Configuration("phantombuster api key not configured".into()))?;

            let body = serde_json::json!({
                "argument": {
                    "recipient": request.recipient,
                    "content": request.content,
                    "idempotencyKey": request.idempotency_key,
                },
            });

            let response = self
                .client
                .post(format!("{}/agents/launch", self.base_url))
                .header("X-Phantombuster-Key", api_key)
                .json(&body)
                .send()
                .await
                .map_err(|e| EngineError::Transient(format!("phantombuster request failed: {e}")))?;

            if !response.status().is_success() {
                let status = response.status();
                return if status.is_server_error() {
                    Err(EngineError::Transient(format!("phantombuster returned {status}")))
                } else {
                    Err(EngineError::Provider(format!("phantombuster returned {status}")))
                };
            }

            let payload: Value = response
                .json()
                .await
                .map_err(|e| EngineError::Provider(format!("phantombuster response not json: {e}")))?;

            let container_id = payload
                .get("containerId")
                .and_then(Value::as_str)
                .ok_or_else(|| EngineError::Provider("phantombuster response missing containerId".into()))?;

            Ok(SendOutcome {
                provider_message_id: container_id.to_string(),
                provider_action_id: Some(container_id.to_string()),
            })
        })
    }

    fn get_status<'a>(
        &'a self,
        _provider_video_id: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<ProviderStatus, EngineError>> + Send + 'a>> {
        Box::pin(async move { Err(EngineError::Provider("linkedin provider has no async asset status".into())) })
    }

    fn verify_webhook(&self, _raw_body: &[u8], headers: &HashMap<String, String>) -> Result<bool, EngineError> {
        let secret = match &self.webhook_secret {
            Some(secret) => secret,
            None => return Ok(false),
        };

        let provided = match headers.get("x-phantombuster-token") {
            Some(value) => value,
            None => return Ok(false),
        };

        Ok(bool::from(provided.as_bytes().ct_eq(secret.as_bytes())))
    }

    fn parse_webhook_event(&self, raw_body: &[u8]) -> Result<RawEvent, EngineError> {
        let payload: Value =
            serde_json::from_slice(raw_body).map_err(|e| EngineError::Validation(format!("invalid json: {e}")))?;

        let phantombuster_type = payload
            .get("type")
            .and_then(Value::as_str)
            .ok_or_else(|| EngineError::Validation("missing type".into()))?;

        let event_type = Self::phantombuster_type_to_event(phantombuster_type)
            .ok_or_else(|| EngineError::Validation(format!("unrecognized phantombuster event type '{phantombuster_type}'")))?
            .to_string();

        let container_id = payload.get("containerId").and_then(Value::as_str).map(str::to_string);

        Ok(RawEvent {
            event_type,
            provider_event_id: container_id
                .as_ref()
                .map(|id| format!("{id}:{phantombuster_type}")),
            provider_message_id: container_id.clone(),
            provider_action_id: container_id,
            timestamp: payload.get("timestamp").cloned(),
            metadata: payload,
        })
    }

    fn validate_config(&self) -> Result<(), EngineError> {
        if self.api_key.is_none() {
            return Err(EngineError::Configuration("phantombuster api key not configured".into()));
        }
        Ok(())
    }

    fn get_quota_status<'a>(&'a self) -> Pin<Box<dyn Future<Output = Result<QuotaStatus, EngineError>> + Send + 'a>> {
        Box::pin(async move {
            Ok(QuotaStatus {
                used: 0,
                limit: None,
                resets_at: None,
            })
        })
    }

    fn get_capabilities(&self) -> Capabilities {
        Capabilities {
            supports_status_polling: false,
            supports_webhooks: true,
        }
    }

    fn channel(&self) -> &'static str {
        CHANNEL_LINKEDIN
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verify_webhook_fails_closed_without_secret() {
        let provider = PhantombusterProvider::new("https://phantombuster.com/api", Some("key".into()), None);
        let mut headers = HashMap::new();
        headers.insert("x-phantombuster-token".to_string(), "whatever".to_string());
        assert!(!provider.verify_webhook(b"{}", &headers).unwrap());
    }

    #[test]
    fn verify_webhook_accepts_matching_secret() {
        let provider =
            PhantombusterProvider::new("https://phantombuster.com/api", Some("key".into()), Some("shh".into()));
        let mut headers = HashMap::new();
        headers.insert("x-phantombuster-token".to_string(), "shh".to_string());
        assert!(provider.verify_webhook(b"{}", &headers).unwrap());
    }

    #[test]
    fn parse_webhook_event_maps_connection_accepted() {
        let provider = PhantombusterProvider::new("https://phantombuster.com/api", None, None);
        let body = br#"{"type":"connection_accepted","containerId":"c-1","timestamp":1700000000}"#;
        let event = provider.parse_webhook_event(body).unwrap();
        assert_eq!(event.event_type, EVENT_CONNECTION_ACCEPTED);
        assert_eq!(event.provider_action_id.as_deref(), Some("c-1"));
    }
}
