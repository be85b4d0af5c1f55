use anyhow::Result;
use colored::Colorize;
use litellm_exporter::{config, init_tracing, server};
use std::path::Path;
use tracing::info;

/// Execute the start command
///
/// Configuration errors (including a malformed window) abort before the
/// server or the refresh loop start.
pub async fn execute(config_path: Option<&Path>) -> Result<()> {
    let cfg = config::load_config(config_path)?;

    init_tracing(&cfg.server.log_level, &cfg.server.log_format);

    if cfg.server.log_format == "text" {
        println!("{}", "Starting LiteLLM exporter...".green());
    }
    info!(
        db_host = %cfg.database.host,
        db_name = %cfg.database.name,
        "Configuration loaded"
    );

    // Blocks until shutdown
    server::start_server(cfg).await?;

    Ok(())
}
