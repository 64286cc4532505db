/*
 * Copyright (c) 2025 Dylan Storey
 * Licensed under the Elastic License 2.0.
 * See LICENSE file in the project root for full license text.
 */

//! Postmark-shaped email provider.
//!
//! Sends are a single POST to Postmark's transactional email endpoint.
//! Webhook signatures are delivered as a `X-Postmark-Signature` header:
//! HMAC-SHA256 over the raw body, hex-encoded.

use super::{Capabilities, Provider, ProviderStatus, QuotaStatus, RawEvent, SendOutcome, SendRequest};
use crate::error::EngineError;
use campaign_models::models::events::{
    CHANNEL_EMAIL, EVENT_BOUNCED, EVENT_CLICKED, EVENT_DELIVERED, EVENT_OPENED, EVENT_SPAM_REPORTED,
};
use hmac::{Hmac, Mac};
use serde_json::Value;
use sha2::Sha256;
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;

type HmacSha256 = Hmac<Sha256>;

pub struct PostmarkProvider {
    client: reqwest::Client,
    base_url: String,
    server_token: Option<String>,
    webhook_secret: Option<String>,
}

impl PostmarkProvider {
    pub fn new(base_url: impl Into<String>, server_token: Option<String>, webhook_secret: Option<String>) -> Self {
        PostmarkProvider {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
            server_token,
            webhook_secret,
        }
    }

    fn postmark_type_to_event(message_type: &str) -> Option<&'static str> {
        match message_type {
            "Delivery" => Some(EVENT_DELIVERED),
            "Open" => Some(EVENT_OPENED),
            "Click" => Some(EVENT_CLICKED),
            "Bounce" | "HardBounce" | "SoftBounce" => Some(EVENT_BOUNCED),
            "SpamComplaint" => Some(EVENT_SPAM_REPORTED),
            _ => None,
        }
    }
}

impl Provider for PostmarkProvider {
    fn send<'a>(
        &'a self,
        request: SendRequest,
    ) -> Pin<Box<dyn Future<Output = Result<SendOutcome, EngineError>> + Send + 'a>> {
        Box::pin(async move {
            let token = self
                .server_token
                .as_deref()
                .ok_or_else(|| EngineError::Configuration("postmark server token not configured".into()))?;

            let body = serde_json::json!({
                "To": request.recipient,
                "HtmlBody": request.content,
                "MessageStream": "outbound",
            });

            let response = self
                .client
                .post(format!("{}/email", self.base_url))
                .header("X-Postmark-Server-Token", token)
                .header("Idempotency-Key", &request.idempotency_key)
                .json(&body)
                .send()
                .await
                .map_err(|e| EngineError::Transient(format!("postmark request failed: {e}")))?;

            if !response.status().is_success() {
                let status = response.status();
                return if status.is_server_error() {
                    Err(EngineError::Transient(format!("postmark returned {status}")))
                } else {
                    Err(EngineError::Provider(format!("postmark returned {status}")))
                };
            }

            let payload: Value = response
                .json()
                .await
                .map_err(|e| EngineError::Provider(format!("postmark response not json: {e}")))?;

            let message_id = payload
                .get("MessageID")
                .and_then(Value::as_str)
                .ok_or_else(|| EngineError::Provider("postmark response missing MessageID".into()))?;

            Ok(SendOutcome {
                provider_message_id: message_id.to_string(),
                provider_action_id: None,
            })
        })
    }

    fn get_status<'a>(
        &'a self,
        _provider_video_id: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<ProviderStatus, EngineError>> + Send + 'a>> {
        Box::pin(async move { Err(EngineError::Provider("email provider has no async asset status".into())) })
    }

    fn verify_webhook(&self, raw_body: &[u8], headers: &HashMap<String, String>) -> Result<bool, EngineError> {
        let secret = match &self.webhook_secret {
            Some(secret) => secret,
            None => return Ok(false),
        };

        let signature_hex = match headers.get("x-postmark-signature") {
            Some(value) => value,
            None => return Ok(false),
        };

        let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
            .map_err(|e| EngineError::Internal(format!("invalid hmac key length: {e}")))?;
        mac.update(raw_body);

        let expected = match hex::decode(signature_hex) {
            Ok(bytes) => bytes,
            Err(_) => return Ok(false),
        };

        Ok(mac.verify_slice(&expected).is_ok())
    }

    fn parse_webhook_event(&self, raw_body: &[u8]) -> Result<RawEvent, EngineError> {
        let payload: Value =
            serde_json::from_slice(raw_body).map_err(|e| EngineError::Validation(format!("invalid json: {e}")))?;

        let message_type = payload
            .get("RecordType")
            .and_then(Value::as_str)
            .ok_or_else(|| EngineError::Validation("missing RecordType".into()))?;

        let event_type = Self::postmark_type_to_event(message_type)
            .ok_or_else(|| EngineError::Validation(format!("unrecognized postmark record type '{message_type}'")))?
            .to_string();

        let provider_event_id = payload
            .get("MessageID")
            .and_then(Value::as_str)
            .map(|s| format!("{s}:{message_type}"));

        Ok(RawEvent {
            event_type,
            provider_event_id,
            provider_message_id: payload.get("MessageID").and_then(Value::as_str).map(str::to_string),
            provider_action_id: None,
            timestamp: payload.get("ReceivedAt").or_else(|| payload.get("DeliveredAt")).cloned(),
            metadata: payload,
        })
    }

    fn validate_config(&self) -> Result<(), EngineError> {
        if self.server_token.is_none() {
            return Err(EngineError::Configuration("postmark server token not configured".into()));
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
        CHANNEL_EMAIL
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verify_webhook_fails_closed_without_secret() {
        let provider = PostmarkProvider::new("https://api.postmarkapp.com", Some("token".into()), None);
        let mut headers = HashMap::new();
        headers.insert("x-postmark-signature".to_string(), "deadbeef".to_string());
        assert!(!provider.verify_webhook(b"{}", &headers).unwrap());
    }

    #[test]
    fn verify_webhook_accepts_matching_signature() {
        let secret = "shh";
        let provider = PostmarkProvider::new("https://api.postmarkapp.com", Some("token".into()), Some(secret.into()));
        let body = b"{\"RecordType\":\"Delivery\"}";

        let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).unwrap();
        mac.update(body);
        let signature = hex::encode(mac.finalize().into_bytes());

        let mut headers = HashMap::new();
        headers.insert("x-postmark-signature".to_string(), signature);
        assert!(provider.verify_webhook(body, &headers).unwrap());
    }

    #[test]
    fn parse_webhook_event_maps_record_type() {
        let provider = PostmarkProvider::new("https://api.postmarkapp.com", None, None);
        let body = br#"{"RecordType":"Open","MessageID":"abc-123","ReceivedAt":"2026-01-01T00:00:00Z"}"#;
        let event = provider.parse_webhook_event(body).unwrap();
        assert_eq!(event.event_type, EVENT_OPENED);
        assert_eq!(event.provider_message_id.as_deref(), Some("abc-123"));
    }

    #[test]
    fn parse_webhook_event_rejects_unknown_record_type() {
        let provider = PostmarkProvider::new("https://api.postmarkapp.com", None, None);
        let body = br#"{"RecordType":"SubscriptionChange"}"#;
        assert!(provider.parse_webhook_event(body).is_err());
    }
}
