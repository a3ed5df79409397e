//! Build commands: the full build and single tasks.

use std::path::{Path, PathBuf};

use anyhow::Result;
use marquee_static::Task;

use crate::config::load_config;

/// Run the build command.
pub async fn run(config_path: &Path, output: Option<PathBuf>) -> Result<()> {
    tracing::info!("Building site...");

    let mut config = load_config(config_path)?;
    if let Some(output) = output {
        config.site.output = output.to_string_lossy().into_owned();
    }

    let result = config.pipeline(false)?.run_default().await?;

    tracing::info!(
        "Built {} pages and copied {} assets in {}ms",
        result.pages,
        result.assets,
        result.duration_ms
    );

    tracing::info!("Output: {}", result.output_dir.display());

    Ok(())
}

/// Run one task by name.
pub async fn run_task(config_path: &Path, task: Task) -> Result<()> {
    let pipeline = load_config(config_path)?.pipeline(false)?;
    pipeline.run(task).await?;
    Ok(())
}

/// Fetch and group upcoming events, optionally printing them as JSON.
pub async fn fetch_events(config_path: &Path, json: bool) -> Result<()> {
    let pipeline = load_config(config_path)?.pipeline(false)?;

    if !json {
        pipeline.run(Task::FetchEvents).await?;
        return Ok(());
    }

    let events = pipeline.fetch_events().await?;
    println!("{}", serde_json::to_string_pretty(&events)?);

    Ok(())
}
