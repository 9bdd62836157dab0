//! Command handlers for CLI operations

use std::io::{self, Write as _};
use std::path::{Path, PathBuf};

use anyhow::{Context as _, Result, bail};
use chrono::Utc;
use shopfloor_core::{BackendKind, LoggingConfig, ShopfloorConfig};
use shopfloor_sync::connect;
use tracing_subscriber::{
    EnvFilter, Registry, fmt, layer::SubscriberExt as _, util::SubscriberInitExt as _,
};

use crate::cli::OutputFormat;
use crate::report::{render_json, render_summary};
use crate::script::{Replayer, Script};

/// Logs go to stderr so stdout carries only the job snapshot.
fn init_logging(logging: &LoggingConfig) {
    Registry::default()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.filter)))
        .with(
            fmt::layer()
                .with_writer(io::stderr)
                .with_ansi(false)
                .with_target(true)
                .with_level(true),
        )
        .init();
}

/// Replay a script and print the resulting jobs
///
/// # Errors
/// Returns an error if configuration, seed or script cannot be loaded, the
/// backend cannot be reached, or a step fails without `keep_going`.
pub async fn handle_run(
    config_path: Option<&Path>,
    script_path: &Path,
    seed: Option<PathBuf>,
    format: OutputFormat,
    keep_going: bool,
) -> Result<()> {
    let mut config = ShopfloorConfig::load_or_default(config_path)?;
    init_logging(&config.logging);

    if let Some(seed) = seed {
        if config.backend.kind == BackendKind::Http {
            tracing::warn!("Ignoring seed file {:?}: the HTTP backend cannot be seeded", seed);
        }
        config.backend.seed_path = Some(seed);
    }

    let script = Script::load(script_path)?;
    let remote = connect(&config.backend, config.api_key()).context("Failed to set up backend")?;
    let replayer = Replayer::new(
        remote,
        script.start_at.unwrap_or_else(Utc::now),
        script.actor.clone(),
        config.sync.refresh_lists,
    );

    let loaded = replayer.load().await.context("Failed to load jobs")?;
    tracing::info!("Replaying {} step(s) over {loaded} job(s)", script.steps.len());

    let mut failures = 0_usize;
    for (index, step) in script.steps.iter().enumerate() {
        let number = index + 1;
        match replayer.run_step(step).await {
            Ok(()) => tracing::debug!("Step {number} ({}) done", step.name()),
            Err(error) if keep_going => {
                failures += 1;
                tracing::warn!("Step {number} ({}) failed: {error}", step.name());
            }
            Err(error) => {
                return Err(error).with_context(|| format!("Step {number} ({}) failed", step.name()));
            }
        }
    }
    if failures > 0 {
        tracing::warn!("{failures} step(s) failed");
    }

    let jobs = replayer.snapshot().await.context("Failed to read final state")?;
    let rendered = match format {
        OutputFormat::Json => render_json(&jobs)?,
        OutputFormat::Summary => render_summary(&jobs, replayer.now())?,
    };

    let mut stdout = io::stdout().lock();
    writeln!(stdout, "{rendered}")?;
    Ok(())
}

/// Write a default configuration file
///
/// # Errors
/// Returns an error if the file exists and `force` is not set, or it cannot be written.
pub fn handle_init_config(path: &Path, force: bool) -> Result<()> {
    if path.exists() && !force {
        bail!("{} already exists (use --force to overwrite)", path.display());
    }
    ShopfloorConfig::default().save_to_file(path)?;

    let mut stdout = io::stdout().lock();
    writeln!(stdout, "Wrote {}", path.display())?;
    Ok(())
}
