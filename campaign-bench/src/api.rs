/*
 * Copyright (c) 2025 Dylan Storey
 * Licensed under the Elastic License 2.0.
 * See LICENSE file in the project root for full license text.
 */

//! HTTP API client for the campaign engine.

#![allow(dead_code)]

use hmac::{Hmac, Mac};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use sha2::Sha256;
use std::time::Duration;
use uuid::Uuid;

pub type Result<T> = std::result::Result<T, Box<dyn std::error::Error>>;

/// API client for the campaign execution engine.
#[derive(Clone)]
pub struct Client {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

/// `{success:true, data:<...>}` / `{success:false, error, details?}` envelope.
#[derive(Debug, serde::Deserialize)]
struct Envelope {
    success: bool,
    data: Option<Value>,
    error: Option<String>,
}

impl Client {
    pub fn new(base_url: &str, api_key: &str) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.to_string(),
            api_key: api_key.to_string(),
        }
    }

    /// Wait for the engine to be ready.
    pub async fn wait_for_ready(&self, timeout_secs: u64) -> Result<()> {
        let start = std::time::Instant::now();
        loop {
            match self.http.get(format!("{}/health", self.base_url)).send().await {
                Ok(resp) if resp.status().is_success() => return Ok(()),
                _ => {
                    if start.elapsed() > Duration::from_secs(timeout_secs) {
                        return Err("Timeout waiting for campaign engine".into());
                    }
                    tokio::time::sleep(Duration::from_secs(1)).await;
                }
            }
        }
    }

    async fn envelope(&self, method: reqwest::Method, path: &str, body: Option<Value>) -> Result<Envelope> {
        let url = format!("{}{}", self.base_url, path);
        let mut req = self
            .http
            .request(method, &url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json");

        if let Some(b) = body {
            req = req.body(serde_json::to_string(&b)?);
        }

        let resp = req.send().await?;
        let status = resp.status();
        let text = resp.text().await?;
        let parsed: Envelope = serde_json::from_str(&text)
            .map_err(|e| format!("HTTP {} non-envelope body {}: {}", status, text, e))?;
        Ok(parsed)
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let env = self.envelope(reqwest::Method::GET, path, None).await?;
        Self::unwrap(env)
    }

    async fn post<T: DeserializeOwned>(&self, path: &str, body: Value) -> Result<T> {
        let env = self.envelope(reqwest::Method::POST, path, Some(body)).await?;
        Self::unwrap(env)
    }

    /// Like `post`, but returns the raw HTTP status alongside the envelope instead
    /// of treating `success:false` as an error — scenarios that expect rejection
    /// (e.g. a forbidden status transition) need the status code, not a `Result::Err`.
    pub async fn post_raw(&self, path: &str, body: Value) -> Result<(u16, Value)> {
        let url = format!("{}{}", self.base_url, path);
        let resp = self
            .http
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .body(serde_json::to_string(&body)?)
            .send()
            .await?;
        let status = resp.status().as_u16();
        let text = resp.text().await?;
        let value: Value = serde_json::from_str(&text).unwrap_or(Value::Null);
        Ok((status, value))
    }

    fn unwrap<T: DeserializeOwned>(env: Envelope) -> Result<T> {
        if !env.success {
            return Err(env.error.unwrap_or_else(|| "request failed".to_string()).into());
        }
        let data = env.data.unwrap_or(Value::Null);
        Ok(serde_json::from_value(data)?)
    }

    // =========================================================================
    // Templates / instances / enrollments
    // =========================================================================

    pub async fn create_template(&self, name: &str, channel_type: &str) -> Result<Value> {
        self.post(
            "/api/campaigns/templates",
            json!({
                "name": name,
                "description": null,
                "template_type": channel_type,
                "path_type": "structured",
                "steps": [
                    {"step_number": 1, "channel": "email", "content": "hello", "delay_after_previous_secs": 0},
                    {"step_number": 2, "channel": "email", "content": "follow up", "delay_after_previous_secs": 1}
                ]
            }),
        )
        .await
    }

    pub async fn list_templates(&self) -> Result<Vec<Value>> {
        self.get("/api/campaigns/templates").await
    }

    pub async fn create_instance(&self, template_id: Uuid) -> Result<Value> {
        self.post(
            "/api/campaigns/instances",
            json!({ "template_id": template_id }),
        )
        .await
    }

    pub async fn start_instance(&self, instance_id: Uuid) -> Result<Value> {
        self.post(&format!("/api/campaigns/instances/{}/start", instance_id), json!({}))
            .await
    }

    pub async fn complete_instance_raw(&self, instance_id: Uuid) -> Result<(u16, Value)> {
        self.post_raw(&format!("/api/campaigns/instances/{}/complete", instance_id), json!({}))
            .await
    }

    pub async fn metrics(&self, instance_id: Uuid) -> Result<Value> {
        self.get(&format!("/api/campaigns/instances/{}/metrics", instance_id)).await
    }

    pub async fn enroll(&self, instance_id: Uuid, contact_id: Uuid) -> Result<Value> {
        self.post(
            "/api/campaigns/enrollments",
            json!({ "instance_id": instance_id, "contact_id": contact_id }),
        )
        .await
    }

    // =========================================================================
    // Webhook intake
    // =========================================================================

    /// Post a raw webhook body with a valid Postmark-shaped HMAC signature.
    pub async fn post_webhook_signed(&self, raw_body: &str, secret: &str) -> Result<reqwest::Response> {
        let signature = sign(raw_body, secret);
        Ok(self
            .http
            .post(format!("{}/api/campaigns/events/webhook", self.base_url))
            .header("X-Postmark-Signature", signature)
            .header("Content-Type", "application/json")
            .body(raw_body.to_string())
            .send()
            .await?)
    }

    pub async fn post_webhook_unsigned(&self, raw_body: &str, bogus_signature: &str) -> Result<reqwest::Response> {
        Ok(self
            .http
            .post(format!("{}/api/campaigns/events/webhook", self.base_url))
            .header("X-Postmark-Signature", bogus_signature)
            .header("Content-Type", "application/json")
            .body(raw_body.to_string())
            .send()
            .await?)
    }

    // =========================================================================
    // DLQ
    // =========================================================================

    pub async fn list_dlq(&self) -> Result<Vec<Value>> {
        self.get("/api/admin/dlq").await
    }
}

fn sign(raw_body: &str, secret: &str) -> String {
    let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes()).expect("hmac accepts any key length");
    mac.update(raw_body.as_bytes());
    hex::encode(mac.finalize().into_bytes())
}
