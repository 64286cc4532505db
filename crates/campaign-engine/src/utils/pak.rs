/*
 * Copyright (c) 2025 Dylan Storey
 * Licensed under the Elastic License 2.0.
 * See LICENSE file in the project root for full license text.
 */

//! Prefixed API Key (PAK) generation and verification.
//!
//! `prefixed-api-key` supplies the `{prefix}_{short}_{long}` key shape and
//! the singleton controller pattern; its own SHA-256 digest is discarded.
//! The value actually persisted as `pak_hash` is an Argon2id hash of the
//! full plaintext key, computed independently via the `argon2`/
//! `password_hash` crates, so a database leak never yields a
//! lookup-by-equality oracle the way a bare digest would.

use crate::error::EngineError;
use argon2::password_hash::rand_core::OsRng as PasswordHashOsRng;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use once_cell::sync::OnceCell;
use prefixed_api_key::PrefixedApiKeyController;
use rand::rngs::OsRng;
use sha2::Sha256;
use std::sync::Arc;

/// Characters in the short (publicly-visible) token segment.
const SHORT_TOKEN_LENGTH: u8 = 8;
/// Characters in the long (secret) token segment.
const LONG_TOKEN_LENGTH: u8 = 24;

static PAK_CONTROLLER: OnceCell<Arc<PrefixedApiKeyController<OsRng, Sha256>>> = OnceCell::new();

/// Builds (once) the controller responsible for the key's textual shape.
/// Its own digest is never consulted for verification; only
/// `try_generate_key_and_hash`'s plaintext half is used.
fn pak_controller(prefix: &str) -> Result<Arc<PrefixedApiKeyController<OsRng, Sha256>>, EngineError> {
    PAK_CONTROLLER
        .get_or_try_init(|| {
            PrefixedApiKeyController::configure()
                .prefix(prefix.to_owned())
                .short_token_length(SHORT_TOKEN_LENGTH)
                .short_token_prefix(None)
                .long_token_length(LONG_TOKEN_LENGTH)
                .rng_osrng()
                .digest_sha256()
                .finalize()
                .map(Arc::new)
                .map_err(|e| EngineError::Internal(format!("failed to build pak controller: {e}")))
        })
        .cloned()
}

/// Generates a new prefixed API key. Returns `(plaintext_key, argon2_hash)`;
/// the plaintext is shown to the caller exactly once and is never stored.
pub fn create_pak(prefix: &str) -> Result<(String, String), EngineError> {
    let controller = pak_controller(prefix)?;
    let (pak, _discarded_sha256_hash) = controller.try_generate_key_and_hash();
    let plaintext = pak.to_string();
    let hash = hash_pak(&plaintext)?;
    Ok((plaintext, hash))
}

/// Hashes a plaintext key with Argon2id under a fresh random salt. Calling
/// this twice on the same plaintext yields two different (both-valid)
/// stored hashes, since the salt differs each time.
pub fn hash_pak(plaintext: &str) -> Result<String, EngineError> {
    let salt = SaltString::generate(&mut PasswordHashOsRng);
    Argon2::default()
        .hash_password(plaintext.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| EngineError::Internal(format!("failed to hash api key: {e}")))
}

/// Verifies a plaintext key against a stored Argon2id PHC hash string.
/// Returns `Ok(false)` for a non-matching key; `Err` only when
/// `stored_hash` is not a well-formed PHC string, a data-integrity
/// problem rather than a credential mismatch.
pub fn verify_pak(plaintext: &str, stored_hash: &str) -> Result<bool, EngineError> {
    let parsed = PasswordHash::new(stored_hash)
        .map_err(|e| EngineError::Internal(format!("stored api key hash is malformed: {e}")))?;
    Ok(Argon2::default().verify_password(plaintext.as_bytes(), &parsed).is_ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn roundtrips_through_hash_and_verify() {
        let (plaintext, hash) = create_pak("campaign").unwrap();
        assert!(plaintext.starts_with("campaign_"));
        assert!(verify_pak(&plaintext, &hash).unwrap());
    }

    #[test]
    #[serial]
    fn rejects_wrong_plaintext() {
        let (_plaintext, hash) = create_pak("campaign").unwrap();
        assert!(!verify_pak("campaign_not_the_right_key", &hash).unwrap());
    }

    #[test]
    fn hashing_the_same_plaintext_twice_yields_different_salted_hashes() {
        let plaintext = "campaign_abcdefgh_abcdefghijklmnopqrstuvw";
        let first = hash_pak(plaintext).unwrap();
        let second = hash_pak(plaintext).unwrap();
        assert_ne!(first, second, "Argon2id salts must differ between calls");
        assert!(verify_pak(plaintext, &first).unwrap());
        assert!(verify_pak(plaintext, &second).unwrap());
    }

    #[test]
    fn verify_rejects_malformed_stored_hash() {
        assert!(verify_pak("whatever", "not-a-phc-string").is_err());
    }

    #[test]
    #[serial]
    fn controller_singleton_generates_distinct_keys() {
        let (first, _) = create_pak("campaign").unwrap();
        let (second, _) = create_pak("campaign").unwrap();
        assert_ne!(first, second);
    }
}
