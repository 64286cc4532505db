/*
 * Copyright (c) 2025 Dylan Storey
 * Licensed under the Elastic License 2.0.
 * See LICENSE file in the project root for full license text.
 */

//! HeyGen-shaped AI video provider.
//!
//! `send` submits a video generation job and returns immediately with the
//! provider's video id; the actual asset is produced asynchronously and
//! either polled via `get_status` or reported through a webhook. Webhook
//! signatures are `X-Heygen-Signature: t=<unix_secs>,v1=<hex hmac>`, where
//! the signed payload is `"{t}.{raw_body}"`; a request whose `t` drifts more
//! than `max_skew_secs` from now is rejected as a replay.

use super::{Capabilities, Provider, ProviderStatus, QuotaStatus, RawEvent, SendOutcome, SendRequest};
use crate::error::EngineError;
use campaign_models::models::events::{
    CHANNEL_VIDEO, EVENT_VIDEO_COMPLETED, EVENT_VIDEO_GENERATED, EVENT_VIDEO_GENERATION_FAILED, EVENT_VIDEO_SHARED,
    EVENT_VIDEO_VIEWED,
};
use chrono::Utc;
use hmac::{Hmac, Mac};
use serde_json::Value;
use sha2::Sha256;
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;

type HmacSha256 = Hmac<Sha256>;

pub struct HeygenProvider {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    webhook_secret: Option<String>,
    max_skew_secs: i64,
}

impl HeygenProvider {
    pub fn new(
        base_url: impl Into<String>,
        api_key: Option<String>,
        webhook_secret: Option<String>,
        max_skew_secs: i64,
    ) -> Self {
        HeygenProvider {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
            api_key,
            webhook_secret,
            max_skew_secs,
        }
    }

    fn heygen_type_to_event(event_type: &str) -> Option<&'static str> {
        match event_type {
            "video.generated" => Some(EVENT_VIDEO_GENERATED),
            "video.generation_failed" => Some(EVENT_VIDEO_GENERATION_FAILED),
            "video.viewed" => Some(EVENT_VIDEO_VIEWED),
            "video.completed" => Some(EVENT_VIDEO_COMPLETED),
            "video.shared" => Some(EVENT_VIDEO_SHARED),
            _ => None,
        }
    }

    /// Parses `t=<unix_secs>,v1=<hex>` into its two components.
    fn parse_signature_header(header: &str) -> Option<(i64, &str)> {
        let mut timestamp = None;
        let mut signature = None;
        for part in header.split(',') {
            let (key, value) = part.split_once('=')?;
            match key.trim() {
                "t" => timestamp = value.trim().parse::<i64>().ok(),
                "v1" => signature = Some(value.trim()),
                _ => {}
            }
        }
        Some((timestamp?, signature?))
    }
}

impl Provider for HeygenProvider {
    fn send<'a>(
        &'a self,
        request: SendRequest,
    ) -> Pin<Box<dyn Future<Output = Result<SendOutcome, EngineError>> + Send + 'a>> {
        Box::pin(async move {
            let api_key = self
                .api_key
                .as_deref()
                .ok_or_else(|| EngineError::Configuration("heygen api key not configured".into()))?;

            let body = serde_json::json!({
                "script": request.content,
                "recipient": request.recipient,
                "idempotency_key": request.idempotency_key,
            });

            let response = self
                .client
                .post(format!("{}/v2/video/generate", self.base_url))
                .header("X-Api-Key", api_key)
                .json(&body)
                .send()
                .await
                .map_err(|e| EngineError::Transient(format!("heygen request failed: {e}")))?;

            if !response.status().is_success() {
                let status = response.status();
                return if status.is_server_error() {
                    Err(EngineError::Transient(format!("heygen returned {status}")))
                } else {
                    Err(EngineError::Provider(format!("heygen returned {status}")))
                };
            }

            let payload: Value = response
                .json()
                .await
                .map_err(|e| EngineError::Provider(format!("heygen response not json: {e}")))?;

            let video_id = payload
                .get("video_id")
                .and_then(Value::as_str)
                .ok_or_else(|| EngineError::Provider("heygen response missing video_id".into()))?;

            Ok(SendOutcome {
                provider_message_id: video_id.to_string(),
                provider_action_id: Some(video_id.to_string()),
            })
        })
    }

    fn get_status<'a>(
        &'a self,
        provider_video_id: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<ProviderStatus, EngineError>> + Send + 'a>> {
        Box::pin(async move {
            let api_key = self
                .api_key
                .as_deref()
                .ok_or_else(|| EngineError::Configuration("heygen api key not configured".into()))?;

            let response = self
                .client
                .get(format!("{}/v1/video_status.get", self.base_url))
                .header("X-Api-Key", api_key)
                .query(&[("video_id", provider_video_id)])
                .send()
                .await
                .map_err(|e| EngineError::Transient(format!("heygen request failed: {e}")))?;

            if !response.status().is_success() {
                let status = response.status();
                return if status.is_server_error() {
                    Err(EngineError::Transient(format!("heygen returned {status}")))
                } else {
                    Err(EngineError::Provider(format!("heygen returned {status}")))
                };
            }

            let payload: Value = response
                .json()
                .await
                .map_err(|e| EngineError::Provider(format!("heygen response not json: {e}")))?;

            let status = payload
                .get("status")
                .and_then(Value::as_str)
                .ok_or_else(|| EngineError::Provider("heygen response missing status".into()))?
                .to_string();

            Ok(ProviderStatus {
                status,
                video_url: payload.get("video_url").and_then(Value::as_str).map(str::to_string),
                progress: payload.get("progress").and_then(Value::as_i64).map(|p| p as i32),
            })
        })
    }

    fn verify_webhook(&self, raw_body: &[u8], headers: &HashMap<String, String>) -> Result<bool, EngineError> {
        let secret = match &self.webhook_secret {
            Some(secret) => secret,
            None => return Ok(false),
        };

        let header = match headers.get("x-heygen-signature") {
            Some(value) => value,
            None => return Ok(false),
        };

        let (timestamp, signature_hex) = match Self::parse_signature_header(header) {
            Some(parsed) => parsed,
            None => return Ok(false),
        };

        if (Utc::now().timestamp() - timestamp).abs() > self.max_skew_secs {
            return Ok(false);
        }

        let signed_payload = [timestamp.to_string().as_bytes(), b".", raw_body].concat();

        let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
            .map_err(|e| EngineError::Internal(format!("invalid hmac key length: {e}")))?;
        mac.update(&signed_payload);

        let expected = match hex::decode(signature_hex) {
            Ok(bytes) => bytes,
            Err(_) => return Ok(false),
        };

        Ok(mac.verify_slice(&expected).is_ok())
    }

    fn parse_webhook_event(&self, raw_body: &[u8]) -> Result<RawEvent, EngineError> {
        let payload: Value =
            serde_json::from_slice(raw_body).map_err(|e| EngineError::Validation(format!("invalid json: {e}")))?;

        let heygen_type = payload
            .get("event_type")
            .and_then(Value::as_str)
            .ok_or_else(|| EngineError::Validation("missing event_type".into()))?;

        let event_type = Self::heygen_type_to_event(heygen_type)
            .ok_or_else(|| EngineError::Validation(format!("unrecognized heygen event type '{heygen_type}'")))?
            .to_string();

        let video_id = payload.get("video_id").and_then(Value::as_str).map(str::to_string);

        Ok(RawEvent {
            event_type,
            provider_event_id: video_id.as_ref().map(|id| format!("{id}:{heygen_type}")),
            provider_message_id: video_id.clone(),
            provider_action_id: video_id,
            timestamp: payload.get("timestamp").cloned(),
            metadata: payload,
        })
    }

    fn validate_config(&self) -> Result<(), EngineError> {
        if self.api_key.is_none() {
            return Err(EngineError::Configuration("heygen api key not configured".into()));
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
            supports_status_polling: true,
            supports_webhooks: true,
        }
    }

    fn channel(&self) -> &'static str {
        CHANNEL_VIDEO
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provider(secret: Option<&str>) -> HeygenProvider {
        HeygenProvider::new(
            "https://api.heygen.com",
            Some("key".into()),
            secret.map(String::from),
            300,
        )
    }

    #[test]
    fn verify_webhook_fails_closed_without_secret() {
        let provider = provider(None);
        let mut headers = HashMap::new();
        headers.insert("x-heygen-signature".to_string(), format!("t={},v1=deadbeef", Utc::now().timestamp()));
        assert!(!provider.verify_webhook(b"{}", &headers).unwrap());
    }

    #[test]
    fn verify_webhook_rejects_stale_timestamp() {
        let secret = "shh";
        let provider = provider(Some(secret));
        let body = b"{}";
        let stale_t = Utc::now().timestamp() - 10_000;
        let signed_payload = [stale_t.to_string().as_bytes(), b".", body.as_slice()].concat();
        let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).unwrap();
        mac.update(&signed_payload);
        let signature = hex::encode(mac.finalize().into_bytes());

        let mut headers = HashMap::new();
        headers.insert("x-heygen-signature".to_string(), format!("t={stale_t},v1={signature}"));
        assert!(!provider.verify_webhook(body, &headers).unwrap());
    }

    #[test]
    fn verify_webhook_accepts_fresh_matching_signature() {
        let secret = "shh";
        let provider = provider(Some(secret));
        let body = b"{\"event_type\":\"video.completed\"}";
        let t = Utc::now().timestamp();
        let signed_payload = [t.to_string().as_bytes(), b".", body.as_slice()].concat();
        let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).unwrap();
        mac.update(&signed_payload);
        let signature = hex::encode(mac.finalize().into_bytes());

        let mut headers = HashMap::new();
        headers.insert("x-heygen-signature".to_string(), format!("t={t},v1={signature}"));
        assert!(provider.verify_webhook(body, &headers).unwrap());
    }

    #[test]
    fn parse_webhook_event_maps_video_completed() {
        let provider = provider(None);
        let body = br#"{"event_type":"video.completed","video_id":"v-1"}"#;
        let event = provider.parse_webhook_event(body).unwrap();
        assert_eq!(event.event_type, EVENT_VIDEO_COMPLETED);
        assert_eq!(event.provider_action_id.as_deref(), Some("v-1"));
    }
}
