/*
 * Copyright (c) 2025 Dylan Storey
 * Licensed under the Elastic License 2.0.
 * See LICENSE file in the project root for full license text.
 */

//! Campaign engine CLI entry point.

use campaign_engine::cli::{parse_cli, commands, Commands};
use campaign_utils::config::Settings;
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = parse_cli();

    let config = Settings::new(None).expect("Failed to load configuration");
    let config = Arc::new(config);

    let telemetry_config = config.telemetry.resolve("campaign-engine");
    campaign_utils::telemetry::init(&telemetry_config, &config.log.level, &config.log.format)
        .expect("Failed to initialize telemetry");

    match cli.command {
        Commands::Migrate => commands::migrate(&config)?,
        Commands::Serve => commands::serve(config.clone()).await?,
        Commands::CreateAdminKey => commands::create_admin_key(&config)?,
    }

    campaign_utils::telemetry::shutdown();

    Ok(())
}
