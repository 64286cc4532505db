/*
 * Copyright (c) 2025 Dylan Storey
 * Licensed under the Elastic License 2.0.
 * See LICENSE file in the project root for full license text.
 */

//! Process-lifecycle helpers: first-run admin key bootstrap and graceful
//! shutdown.

use campaign_models::models::api_keys::NewApiKey;
use campaign_models::schema::api_keys;
use campaign_utils::config::Settings;
use diesel::prelude::*;
use std::fs;
use std::path::Path;
use tokio::sync::oneshot;
use tracing::info;

pub mod pak;

/// Waits for the shutdown signal, then removes the temporary admin-key file.
pub async fn shutdown(shutdown_rx: oneshot::Receiver<()>) {
    let _ = shutdown_rx.await;
    let _ = fs::remove_file("/tmp/campaign-keys/key.txt");
}

/// Called once, on the run that creates the `app_initialization` marker row:
/// mints the admin API key and writes it to a file the operator reads once
/// and discards, since the plaintext is never stored.
pub fn first_startup(conn: &mut PgConnection, config: &Settings) -> Result<(), Box<dyn std::error::Error>> {
    upsert_admin(conn, config)
}

/// Mints a fresh admin API key, inserts it, and writes the plaintext to a
/// well-known path so the operator can retrieve it once. Used both by
/// `first_startup` and by the `create-admin-key` CLI subcommand for
/// subsequent keys.
pub fn upsert_admin(conn: &mut PgConnection, config: &Settings) -> Result<(), Box<dyn std::error::Error>> {
    let (plaintext, hash) = pak::create_pak(&config.auth.api_key_prefix)?;

    let new_key = NewApiKey::new("admin".to_string(), hash, true)?;
    diesel::insert_into(api_keys::table).values(&new_key).execute(conn)?;

    info!("Writing admin API key to temporary file");
    let key_path = Path::new("/tmp/campaign-keys/key.txt");
    fs::create_dir_all(key_path.parent().unwrap())?;
    fs::write(key_path, plaintext)?;

    Ok(())
}
