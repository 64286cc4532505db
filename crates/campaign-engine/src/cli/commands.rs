/*
 * Copyright (c) 2025 Dylan Storey
 * Licensed under the Elastic License 2.0.
 * See LICENSE file in the project root for full license text.
 */

use crate::api;
use crate::dal::DAL;
use crate::db::create_shared_connection_pool;
use crate::orphan_correlation::OrphanCorrelationSweeper;
use crate::providers::email::PostmarkProvider;
use crate::providers::lemlist::LemlistProvider;
use crate::providers::linkedin::PhantombusterProvider;
use crate::providers::video::HeygenProvider;
use crate::providers::ProviderRegistry;
use crate::scheduler::Scheduler;
use crate::utils;
use crate::AppState;
use campaign_utils::config::Settings;
use campaign_utils::telemetry::prelude::*;
use diesel::prelude::*;
use diesel::result::Error as DieselError;
use diesel::sql_query;
use diesel::sql_types::BigInt;
use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};
use std::sync::Arc;
use tokio::signal;

pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!("../campaign-models/migrations");

#[derive(QueryableByName, Debug)]
struct Count {
    #[diesel(sql_type = BigInt)]
    count: i64,
}

/// Runs pending migrations against the configured database and exits.
pub fn migrate(config: &Settings) -> Result<(), Box<dyn std::error::Error>> {
    info!("Running pending database migrations");
    let mut conn = PgConnection::establish(&config.database.url)?;
    conn.run_pending_migrations(MIGRATIONS)
        .map_err(|e| format!("failed to run migrations: {e}"))?;
    info!("Database migrations completed successfully");
    Ok(())
}

/// Mints a new admin API key outside of first-run startup, for operators
/// rotating or adding an additional admin credential.
pub fn create_admin_key(config: &Settings) -> Result<(), Box<dyn std::error::Error>> {
    let mut conn = PgConnection::establish(&config.database.url)?;
    utils::upsert_admin(&mut conn, config)?;
    info!("Admin API key created; see /tmp/campaign-keys/key.txt");
    Ok(())
}

fn build_provider_registry(config: &Settings) -> ProviderRegistry {
    let mut registry = ProviderRegistry::new();
    registry.register(Arc::new(LemlistProvider::new(
        config.providers.lemlist_base_url.clone(),
        config.providers.lemlist_api_key.clone(),
        config.webhooks.lemlist_secret.clone(),
    )));
    registry.register(Arc::new(PhantombusterProvider::new(
        config.providers.phantombuster_base_url.clone(),
        config.providers.phantombuster_api_key.clone(),
        config.webhooks.phantombuster_secret.clone(),
    )));
    registry.register(Arc::new(HeygenProvider::new(
        config.providers.heygen_base_url.clone(),
        config.providers.heygen_api_key.clone(),
        config.webhooks.heygen_secret.clone(),
        config.webhooks.heygen_max_skew_secs,
    )));
    registry
}

/// Starts the database connection pool, migration check, scheduler, orphan
/// correlation sweeper, and HTTP API, and runs until a ctrl-c shutdown
/// signal.
pub async fn serve(config: Arc<Settings>) -> Result<(), Box<dyn std::error::Error>> {
    info!("Starting campaign engine");

    info!("Creating database connection pool");
    let connection_pool = create_shared_connection_pool(
        &config.database.url,
        "campaign",
        config.database.max_pool_size,
        config.database.schema.as_deref(),
    );

    if let Some(ref schema) = config.database.schema {
        info!("Setting up schema: {}", schema);
        connection_pool.setup_schema(schema).expect("Failed to set up schema");
    }

    info!("Running pending database migrations");
    let mut conn = connection_pool.get().expect("Failed to get DB connection");
    conn.run_pending_migrations(MIGRATIONS).expect("Failed to run migrations");

    let is_first_run = conn
        .transaction(|conn| {
            let result: Count = sql_query("SELECT COUNT(*) as count FROM app_initialization").get_result(conn)?;
            if result.count == 0 {
                sql_query("INSERT INTO app_initialization DEFAULT VALUES").execute(conn)?;
                Ok::<bool, DieselError>(true)
            } else {
                Ok::<bool, DieselError>(false)
            }
        })
        .expect("Failed to check initialization status");

    if is_first_run {
        info!("First time startup detected, minting admin API key");
        utils::first_startup(&mut conn, &config)?;
    }
    drop(conn);

    let dal = DAL::new(connection_pool);

    info!("Starting enrollment scheduler");
    let registry = build_provider_registry(&config);
    let scheduler = Arc::new(Scheduler::new(dal.clone(), registry, config.clone()));
    let (scheduler_cancel_tx, scheduler_cancel_rx) = tokio::sync::watch::channel(false);
    let scheduler_handle = {
        let scheduler = scheduler.clone();
        tokio::spawn(async move { scheduler.run_forever(scheduler_cancel_rx).await })
    };

    info!("Starting orphan correlation sweeper");
    let sweeper = Arc::new(OrphanCorrelationSweeper::new(dal.clone(), config.clone()));
    let (sweeper_cancel_tx, sweeper_cancel_rx) = tokio::sync::watch::channel(false);
    let sweeper_handle = {
        let sweeper = sweeper.clone();
        tokio::spawn(async move { sweeper.run_forever(sweeper_cancel_rx).await })
    };

    let webhook_providers = api::webhooks::WebhookProviders::new(
        Arc::new(PostmarkProvider::new(
            config.providers.postmark_base_url.clone(),
            config.providers.postmark_server_token.clone(),
            config.webhooks.postmark_secret.clone(),
        )),
        Arc::new(LemlistProvider::new(
            config.providers.lemlist_base_url.clone(),
            config.providers.lemlist_api_key.clone(),
            config.webhooks.lemlist_secret.clone(),
        )),
        Arc::new(PhantombusterProvider::new(
            config.providers.phantombuster_base_url.clone(),
            config.providers.phantombuster_api_key.clone(),
            config.webhooks.phantombuster_secret.clone(),
        )),
        Arc::new(HeygenProvider::new(
            config.providers.heygen_base_url.clone(),
            config.providers.heygen_api_key.clone(),
            config.webhooks.heygen_secret.clone(),
            config.webhooks.heygen_max_skew_secs,
        )),
    );

    let state = AppState {
        dal,
        webhook_limiter: Arc::new(api::webhooks::build_webhook_limiter(&config)),
        webhook_providers: Arc::new(webhook_providers),
        auth_limiter: Arc::new(api::middleware::build_auth_limiter(&config)),
        config: config.clone(),
    };

    info!("Configuring API routes");
    let app = api::build_router(state);

    let addr = config.server.bind_address.clone();
    info!("Starting server on {}", addr);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();
    tokio::spawn(async move {
        signal::ctrl_c().await.expect("Failed to listen for ctrl+c");
        shutdown_tx.send(()).ok();
    });

    info!("Campaign engine is now running");
    axum::serve(listener, app)
        .with_graceful_shutdown(utils::shutdown(shutdown_rx))
        .await?;

    let _ = scheduler_cancel_tx.send(true);
    let _ = sweeper_cancel_tx.send(true);
    let _ = scheduler_handle.await;
    let _ = sweeper_handle.await;

    Ok(())
}
