//! `cleanbites serve` command.

use anyhow::{Context, Result};
use tracing::info;

use cleanbites::api::{start_server, AppState};
use cleanbites::config::Config;

/// Start the API server, applying CLI overrides on top of `config`.
pub(crate) async fn cmd_serve(
    mut config: Config,
    bind: Option<String>,
    port: Option<u16>,
) -> Result<()> {
    if let Some(bind) = bind {
        config.server.bind = bind;
    }
    if let Some(port) = port {
        config.server.port = port;
    }

    let state = AppState::from_config(&config).context("Failed to initialize API state")?;
    info!(
        data_dir = %config.storage.data_dir.display(),
        "Storage ready"
    );

    start_server(&config.server, state)
        .await
        .map_err(|e| anyhow::anyhow!("API server error: {e}"))
}
