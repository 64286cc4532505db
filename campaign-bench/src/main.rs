/*
 * Copyright (c) 2025 Dylan Storey
 * Licensed under the Elastic License 2.0.
 * See LICENSE file in the project root for full license text.
 */

//! Campaign Engine end-to-end scenario runner.
//!
//! Holistic tests that exercise a running campaign engine as a caller would:
//! create a template, enroll a contact, drive webhook delivery, and watch the
//! scheduler advance a step. These mirror the seed scenarios in the engine's
//! specification (section 8).
//!
//! Prerequisites:
//! - A running campaign-engine instance with Postgres behind it.
//! - An API key available via CAMPAIGN_API_KEY.
//! - The webhook signing secret the engine was started with, via CAMPAIGN_WEBHOOK_SECRET.
//!
//! Run with: cargo run -p campaign-bench

mod api;
mod scenarios;

use std::env;
use std::process::ExitCode;

#[tokio::main]
async fn main() -> ExitCode {
    let engine_url = env::var("ENGINE_URL").unwrap_or_else(|_| "http://localhost:3000".to_string());
    let api_key = env::var("CAMPAIGN_API_KEY").unwrap_or_else(|_| "dev-seed-key".to_string());
    let webhook_secret = env::var("CAMPAIGN_WEBHOOK_SECRET").unwrap_or_else(|_| "dev-webhook-secret".to_string());

    println!("========================================================");
    println!(" Campaign Engine End-to-End Scenario Suite");
    println!(" Engine URL: {}", engine_url);
    println!("========================================================\n");

    let client = api::Client::new(&engine_url, &api_key);

    println!("Waiting for engine to be ready...");
    if let Err(e) = client.wait_for_ready(30).await {
        eprintln!("Engine not ready: {}", e);
        return ExitCode::FAILURE;
    }
    println!("Engine is ready\n");

    let mut passed = 0;
    let mut failed = 0;

    macro_rules! run_scenario {
        ($name:expr, $scenario:expr) => {{
            println!("--- {} ---", $name);
            match $scenario.await {
                Ok(()) => {
                    println!("PASSED: {}\n", $name);
                    passed += 1;
                }
                Err(e) => {
                    println!("FAILED: {}: {}\n", $name, e);
                    failed += 1;
                }
            }
        }};
    }

    run_scenario!(
        "Scenario 1: idempotent webhook flurry",
        scenarios::test_idempotent_webhook_flurry(&client, &webhook_secret)
    );
    run_scenario!(
        "Scenario 2: mixed concurrent counters",
        scenarios::test_mixed_concurrent_counters(&client, &webhook_secret)
    );
    run_scenario!("Scenario 3: invalid HMAC rejected", scenarios::test_invalid_hmac(&client));
    run_scenario!(
        "Scenario 4: orphan requeue",
        scenarios::test_orphan_requeue(&client, &webhook_secret)
    );
    run_scenario!(
        "Scenario 5: forbidden status transition",
        scenarios::test_forbidden_transition(&client)
    );
    run_scenario!("Scenario 6: scheduler advance", scenarios::test_scheduler_advance(&client));

    println!("========================================================");
    println!(" Results: {} passed, {} failed", passed, failed);
    println!("========================================================");

    if failed > 0 {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}
