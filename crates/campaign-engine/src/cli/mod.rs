/*
 * Copyright (c) 2025 Dylan Storey
 * Licensed under the Elastic License 2.0.
 * See LICENSE file in the project root for full license text.
 */

pub mod commands;

use clap::{Parser, Subcommand};

/// Campaign execution and event ingestion engine CLI.
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run pending database migrations and exit.
    Migrate,

    /// Start the HTTP API, scheduler, and orphan-correlation sweeper.
    Serve,

    /// Mint a new admin API key and print it once.
    CreateAdminKey,
}

pub fn parse_cli() -> Cli {
    Cli::parse()
}
