//! Shopfloor CLI - replays workshop actions through the job sync core
#![cfg_attr(
    test,
    allow(
        clippy::expect_used,
        clippy::unwrap_used,
        clippy::missing_panics_doc,
        reason = "Allow for tests"
    )
)]

use anyhow::Result;
use clap::Parser as _;
use cli::{Cli, Commands};

mod cli;
mod handlers;
mod report;
mod script;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            script,
            seed,
            format,
            keep_going,
        } => {
            handlers::handle_run(cli.config.as_deref(), &script, seed, format, keep_going).await?;
        }
        Commands::InitConfig { path, force } => {
            handlers::handle_init_config(&path, force)?;
        }
    }

    Ok(())
}
