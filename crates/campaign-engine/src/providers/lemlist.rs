/*
 * Copyright (c) 2025 Dylan Storey
 * Licensed under the Elastic License 2.0.
 * See LICENSE file in the project root for full license text.
 */

//! Lemlist-shaped email provider.
//!
//! A second email-channel adapter alongside Postmark: Lemlist fronts its own
//! outbound sending API and reports engagement through `X-Lemlist-Signature`,
//! an HMAC-SHA256 hex digest over the raw body, structurally identical to
//! Postmark's scheme but with its own event-type vocabulary.

use super::{Capabilities, Provider, ProviderStatus, QuotaStatus, RawEvent, SendOutcome, SendRequest};
use crate::error::EngineError;
use campaign_models::models::events::{
    CHANNEL_EMAIL, EVENT_BOUNCED, EVENT_CLICKED, EVENT_DELIVERED, EVENT_OPENED, EVENT_REPLIED, EVENT_SENT,
    EVENT_SPAM_REPORTED, EVENT_UNSUBSCRIBED,
};
use hmac::{Hmac, Mac};
use serde_json::Value;
use sha2::Sha256;
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;

type HmacSha256 = Hmac<Sha256>;

pub struct LemlistProvider {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    webhook_secret: Option<String>,
}

impl LemlistProvider {
    pub fn new(base_url: impl Into<String>, api_key: Option<String>, webhook_secret: Option<String>) -> Self {
        LemlistProvider {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
            api_key,
            webhook_secret,
        }
    }

    fn lemlist_type_to_event(event_type: &str) -> Option<&'static str> {
        match event_type {
            "emailsSent" => Some(EVENT_SENT),
            "emailsDelivered" => Some(EVENT_DELIVERED),
            "emailsOpened" => Some(EVENT_OPENED),
            "emailsClicked" => Some(EVENT_CLICKED),
            "emailsReplied" => Some(EVENT_REPLIED),
            "emailsBounced" => Some(EVENT_BOUNCED),
            "emailsUnsubscribed" => Some(EVENT_UNSUBSCRIBED),
            "emailsSpammed" => Some(EVENT_SPAM_REPORTED),
            _ => None,
        }
    }
}

impl Provider for LemlistProvider {
    fn send<'a>(
        &'a self,
        request: SendRequest,
    ) -> Pin<Box<dyn Future<Output = Result<SendOutcome, EngineError>> + Send + 'a>> {
        Box::pin(async move {
            let api_key = self
                .api_key
                .as_deref()
                .ok_or_else(|| EngineError::Configuration("lemlist api key not configured".into()))?;

            let body = serde_json::json!({
                "to": request.recipient,
                "body": request.content,
                "idempotencyKey": request.idempotency_key,
            });

            let response = self
                .client
                .post(format!("{}/campaigns/emails", self.base_url))
                .basic_auth("", Some(api_key))
                .header("Idempotency-Key", &request.idempotency_key)
                .json(&body)
                .send()
                .await
                .map_err(|e| EngineError::Transient(format!("lemlist request failed: {e}")))?;

            if !response.status().is_success() {
                let status = response.status();
                return if status.is_server_error() {
                    Err(EngineError::Transient(format!("lemlist returned {status}")))
                } else {
                    Err(EngineError::Provider(format!("lemlist returned {status}")))
                };
            }

            let payload: Value = response
                .json()
                .await
                .map_err(|e| EngineError::Provider(format!("lemlist response not json: {e}")))?;

            let message_id = payload
                .get("_id")
                .and_then(Value::as_str)
                .ok_or_else(|| EngineError::Provider("lemlist response missing _id".into()))?;

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

        let signature_hex = match headers.get("x-lemlist-signature") {
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

        let lemlist_type = payload
            .get("type")
            .and_then(Value::as_str)
            .ok_or_else(|| EngineError::Validation("missing type".into()))?;

        let event_type = Self::lemlist_type_to_event(lemlist_type)
            .ok_or_else(|| EngineError::Validation(format!("unrecognized lemlist event type '{lemlist_type}'")))?
            .to_string();

        let message_id = payload
            .get("leadEmail")
            .and_then(Value::as_str)
            .or_else(|| payload.get("messageId").and_then(Value::as_str))
            .map(str::to_string);

        let provider_event_id = payload
            .get("_id")
            .and_then(Value::as_str)
            .map(|s| format!("{s}:{lemlist_type}"));

        Ok(RawEvent {
            event_type,
            provider_event_id,
            provider_message_id: message_id,
            provider_action_id: None,
            timestamp: payload.get("date").cloned(),
            metadata: payload,
        })
    }

    fn validate_config(&self) -> Result<(), EngineError> {
        if self.api_key.is_none() {
            return Err(EngineError::Configuration("lemlist api key not configured".into()));
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
        let provider = LemlistProvider::new("https://api.lemlist.com/api", Some("key".into()), None);
        let mut headers = HashMap::new();
        headers.insert("x-lemlist-signature".to_string(), "deadbeef".to_string());
        assert!(!provider.verify_webhook(b"{}", &headers).unwrap());
    }

    #[test]
    fn verify_webhook_accepts_matching_signature() {
        let secret = "shh";
        let provider = LemlistProvider::new("https://api.lemlist.com/api", Some("key".into()), Some(secret.into()));
        let body = b"{\"type\":\"emailsOpened\"}";

        let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).unwrap();
        mac.update(body);
        let signature = hex::encode(mac.finalize().into_bytes());

        let mut headers = HashMap::new();
        headers.insert("x-lemlist-signature".to_string(), signature);
        assert!(provider.verify_webhook(body, &headers).unwrap());
    }

    #[test]
    fn parse_webhook_event_maps_emails_opened() {
        let provider = LemlistProvider::new("https://api.lemlist.com/api", None, None);
        let body = br#"{"type":"emailsOpened","leadEmail":"a@example.com","_id":"evt-1"}"#;
        let event = provider.parse_webhook_event(body).unwrap();
        assert_eq!(event.event_type, EVENT_OPENED);
        assert_eq!(event.provider_message_id.as_deref(), Some("a@example.com"));
    }

    #[test]
    fn parse_webhook_event_rejects_unknown_type() {
        let provider = LemlistProvider::new("https://api.lemlist.com/api", None, None);
        let body = br#"{"type":"somethingElse"}"#;
        assert!(provider.parse_webhook_event(body).is_err());
    }
}
