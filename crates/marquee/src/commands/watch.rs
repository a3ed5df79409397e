//! Watch command: rebuild on change with live reload.

use std::path::Path;
use std::sync::Arc;

use anyhow::Result;
use marquee_server::{WatchServer, WatchServerConfig};

use crate::config::load_config;

/// Run the watch command.
pub async fn run(config_path: &Path, port: Option<u16>, open: bool) -> Result<()> {
    let config = load_config(config_path)?;
    let pipeline = Arc::new(config.pipeline(true)?);

    let server_config = WatchServerConfig {
        source_dir: config.source_dir(),
        output_dir: config.output_dir(),
        host: config.server.host.clone(),
        port: port.unwrap_or(config.server.port),
        open,
    };

    tracing::info!("Starting watch server on port {}...", server_config.port);

    WatchServer::new(server_config).start(pipeline).await?;

    Ok(())
}
