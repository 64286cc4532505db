/*
 * Copyright (c) 2025 Dylan Storey
 * Licensed under the Elastic License 2.0.
 * See LICENSE file in the project root for full license text.
 */

//! Authentication, per-key rate limiting, and CSRF guarding for the API
//! surface. Three independent `axum::middleware::from_fn_with_state` layers,
//! composed in `api::build_router` so a request flows CSRF -> auth ->
//! rate limit -> handler.

use crate::error::EngineError;
use crate::utils::pak;
use crate::AppState;
use axum::extract::{Request, State};
use axum::http::Method;
use axum::middleware::Next;
use axum::response::Response;
use campaign_models::models::api_keys::ApiKey;
use moka::sync::Cache;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use uuid::Uuid;

/// Header a caller must send on any state-changing request. Browsers never
/// attach custom headers to a cross-site form submission, so requiring one
/// rules out CSRF without a token round-trip.
const CSRF_HEADER: &str = "x-campaign-csrf";

/// Per-key sliding-window rate limiter.
///
/// Backed by `moka` (the only cache crate in the workspace dependency
/// table) rather than a `HashMap` behind a single lock, so the entry set
/// for revoked/idle keys ages out on its own instead of growing forever.
pub struct AuthLimiter {
    requests: u32,
    window: Duration,
    hits: Cache<Uuid, Arc<Mutex<Vec<Instant>>>>,
}

impl AuthLimiter {
    pub fn new(requests: u32, window_secs: u64) -> Self {
        let window = Duration::from_secs(window_secs);
        AuthLimiter {
            requests,
            window,
            hits: Cache::builder().time_to_idle(window * 2).build(),
        }
    }

    /// Records one hit for `key_id` and returns `Ok(())` if it's still
    /// within the window's request budget, or `RateLimitExceeded` with
    /// the number of seconds until the oldest hit ages out.
    pub fn check(&self, key_id: Uuid) -> Result<(), EngineError> {
        let bucket = self
            .hits
            .get_with(key_id, || Arc::new(Mutex::new(Vec::new())));
        let now = Instant::now();
        let mut hits = bucket.lock().expect("auth limiter mutex poisoned");
        hits.retain(|at| now.duration_since(*at) < self.window);

        if hits.len() >= self.requests as usize {
            let oldest = hits[0];
            let retry_after = self.window.saturating_sub(now.duration_since(oldest));
            return Err(EngineError::RateLimitExceeded {
                retry_after_secs: retry_after.as_secs().max(1),
            });
        }

        hits.push(now);
        Ok(())
    }
}

/// Rejects any request without the CSRF header, except safe methods that
/// never mutate state and `/health`/`/metrics`, which operators and
/// load balancers hit without the header.
pub async fn csrf_middleware(request: Request, next: Next) -> Result<Response, EngineError> {
    let exempt_path = matches!(request.uri().path(), "/health" | "/metrics");
    let safe_method = matches!(request.method(), &Method::GET | &Method::HEAD | &Method::OPTIONS);

    if !exempt_path && !safe_method && !request.headers().contains_key(CSRF_HEADER) {
        return Err(EngineError::Validation(format!(
            "missing required {CSRF_HEADER} header"
        )));
    }

    Ok(next.run(request).await)
}

/// Verifies the bearer token in `Authorization` against every active key's
/// Argon2id hash and inserts the matching `ApiKey` into request extensions
/// for downstream handlers and `rate_limit_middleware`.
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, EngineError> {
    let header = request
        .headers()
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or(EngineError::Unauthorized)?;
    let presented = header.strip_prefix("Bearer ").unwrap_or(header);

    let active_keys = state.dal.api_keys().list_active()?;
    let matched = active_keys
        .into_iter()
        .find(|key| pak::verify_pak(presented, &key.pak_hash).unwrap_or(false));

    let Some(key) = matched else {
        return Err(EngineError::Unauthorized);
    };

    let _ = state.dal.api_keys().touch_last_used(key.id);
    request.extensions_mut().insert(key);
    Ok(next.run(request).await)
}

/// Enforces the per-key sliding-window budget. Must run after
/// `auth_middleware` has inserted an `ApiKey` into extensions.
pub async fn rate_limit_middleware(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, EngineError> {
    let key = request
        .extensions()
        .get::<ApiKey>()
        .ok_or(EngineError::Unauthorized)?;
    state.auth_limiter.check(key.id)?;
    Ok(next.run(request).await)
}

/// Builds the `AuthLimiter` from config, mirroring `webhooks::build_webhook_limiter`.
pub fn build_auth_limiter(config: &campaign_utils::config::Settings) -> AuthLimiter {
    AuthLimiter::new(config.auth.rate_limit_requests, config.auth.rate_limit_window_secs)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allows_up_to_the_configured_budget() {
        let limiter = AuthLimiter::new(3, 60);
        let key = Uuid::new_v4();
        assert!(limiter.check(key).is_ok());
        assert!(limiter.check(key).is_ok());
        assert!(limiter.check(key).is_ok());
        assert!(limiter.check(key).is_err());
    }

    #[test]
    fn tracks_keys_independently() {
        let limiter = AuthLimiter::new(1, 60);
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        assert!(limiter.check(a).is_ok());
        assert!(limiter.check(b).is_ok());
        assert!(limiter.check(a).is_err());
    }
}
